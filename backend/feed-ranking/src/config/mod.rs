use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub ranking: RankingConfig,
    pub safety: SafetyConfig,
    pub clients: ClientsConfig,
    pub redis: RedisConfig,
}

/// Orchestrator tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Result size when the request does not specify a limit.
    pub default_result_size: usize,
    /// Hard cap on the merged candidate pool.
    pub max_candidates: usize,
    /// Per-component timeout. `None` disables timeout protection.
    pub component_timeout_ms: Option<u64>,
    /// Selector keeps `limit * oversample_factor` so post-selection
    /// filtering can still fill the page.
    pub oversample_factor: usize,
    /// Record per-component duration/error metrics.
    pub capture_component_metrics: bool,
    /// Keep removed candidates and score breakdowns in the result.
    pub debug: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_result_size: 20,
            max_candidates: 500,
            component_timeout_ms: Some(800),
            oversample_factor: 2,
            capture_component_metrics: true,
            debug: false,
        }
    }
}

/// Scoring-stage tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    pub diversity_decay: f64,
    pub diversity_floor: f64,
    pub oon_factor: f64,
    pub recency_half_life_hours: f64,
    pub recency_min_multiplier: f64,
    pub recency_max_multiplier: f64,
    pub age_window_days: i64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            diversity_decay: 0.8,
            diversity_floor: 0.3,
            oon_factor: 0.7,
            recency_half_life_hours: 6.0,
            recency_min_multiplier: 0.8,
            recency_max_multiplier: 1.5,
            age_window_days: 7,
        }
    }
}

/// Surface-aware visibility-filtering policy.
///
/// Out-of-network defaults stricter than in-network: low-risk content is
/// allowed from followed authors but not from discovery sources.
#[derive(Debug, Clone, Deserialize)]
pub struct SafetyConfig {
    pub in_network_allow_low_risk: bool,
    pub oon_allow_low_risk: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            in_network_allow_low_risk: true,
            oon_allow_low_risk: false,
        }
    }
}

/// External collaborator endpoints. Every endpoint is optional; an absent
/// endpoint disables the dependent stage rather than failing requests.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientsConfig {
    pub ann_endpoint: Option<String>,
    pub prediction_endpoint: Option<String>,
    pub safety_endpoint: Option<String>,
    pub graph_endpoint: Option<String>,
    pub request_timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RedisConfig {
    /// Absent URL means serve-cache and timeline reads fall back to their
    /// in-memory implementations.
    pub url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        Ok(Config {
            pipeline: PipelineConfig {
                default_result_size: env::var("FEED_DEFAULT_RESULT_SIZE")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()
                    .expect("FEED_DEFAULT_RESULT_SIZE must be a valid usize"),
                max_candidates: env::var("FEED_MAX_CANDIDATES")
                    .unwrap_or_else(|_| "500".to_string())
                    .parse()
                    .expect("FEED_MAX_CANDIDATES must be a valid usize"),
                component_timeout_ms: Some(
                    env::var("FEED_COMPONENT_TIMEOUT_MS")
                        .unwrap_or_else(|_| "800".to_string())
                        .parse()
                        .expect("FEED_COMPONENT_TIMEOUT_MS must be a valid u64"),
                ),
                oversample_factor: env::var("FEED_OVERSAMPLE_FACTOR")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .expect("FEED_OVERSAMPLE_FACTOR must be a valid usize"),
                capture_component_metrics: env::var("FEED_CAPTURE_COMPONENT_METRICS")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()
                    .expect("FEED_CAPTURE_COMPONENT_METRICS must be true/false"),
                debug: env::var("FEED_DEBUG")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .expect("FEED_DEBUG must be true/false"),
            },
            ranking: RankingConfig {
                diversity_decay: env::var("FEED_DIVERSITY_DECAY")
                    .unwrap_or_else(|_| "0.8".to_string())
                    .parse()
                    .expect("FEED_DIVERSITY_DECAY must be a valid f64"),
                diversity_floor: env::var("FEED_DIVERSITY_FLOOR")
                    .unwrap_or_else(|_| "0.3".to_string())
                    .parse()
                    .expect("FEED_DIVERSITY_FLOOR must be a valid f64"),
                oon_factor: env::var("FEED_OON_FACTOR")
                    .unwrap_or_else(|_| "0.7".to_string())
                    .parse()
                    .expect("FEED_OON_FACTOR must be a valid f64"),
                recency_half_life_hours: env::var("FEED_RECENCY_HALF_LIFE_HOURS")
                    .unwrap_or_else(|_| "6".to_string())
                    .parse()
                    .expect("FEED_RECENCY_HALF_LIFE_HOURS must be a valid f64"),
                recency_min_multiplier: env::var("FEED_RECENCY_MIN_MULTIPLIER")
                    .unwrap_or_else(|_| "0.8".to_string())
                    .parse()
                    .expect("FEED_RECENCY_MIN_MULTIPLIER must be a valid f64"),
                recency_max_multiplier: env::var("FEED_RECENCY_MAX_MULTIPLIER")
                    .unwrap_or_else(|_| "1.5".to_string())
                    .parse()
                    .expect("FEED_RECENCY_MAX_MULTIPLIER must be a valid f64"),
                age_window_days: env::var("FEED_AGE_WINDOW_DAYS")
                    .unwrap_or_else(|_| "7".to_string())
                    .parse()
                    .expect("FEED_AGE_WINDOW_DAYS must be a valid i64"),
            },
            safety: SafetyConfig {
                in_network_allow_low_risk: env::var("VF_IN_NETWORK_ALLOW_LOW_RISK")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()
                    .expect("VF_IN_NETWORK_ALLOW_LOW_RISK must be true/false"),
                oon_allow_low_risk: env::var("VF_OON_ALLOW_LOW_RISK")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .expect("VF_OON_ALLOW_LOW_RISK must be true/false"),
            },
            clients: ClientsConfig {
                ann_endpoint: env::var("ANN_ENDPOINT").ok(),
                prediction_endpoint: env::var("PREDICTION_ENDPOINT").ok(),
                safety_endpoint: env::var("SAFETY_ENDPOINT").ok(),
                graph_endpoint: env::var("GRAPH_ENDPOINT").ok(),
                request_timeout_ms: env::var("CLIENT_REQUEST_TIMEOUT_MS")
                    .unwrap_or_else(|_| "600".to_string())
                    .parse()
                    .expect("CLIENT_REQUEST_TIMEOUT_MS must be a valid u64"),
                retry_attempts: env::var("CLIENT_RETRY_ATTEMPTS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .expect("CLIENT_RETRY_ATTEMPTS must be a valid u32"),
                retry_base_delay_ms: env::var("CLIENT_RETRY_BASE_DELAY_MS")
                    .unwrap_or_else(|_| "200".to_string())
                    .parse()
                    .expect("CLIENT_RETRY_BASE_DELAY_MS must be a valid u64"),
            },
            redis: RedisConfig {
                url: env::var("REDIS_URL").ok(),
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            ranking: RankingConfig::default(),
            safety: SafetyConfig::default(),
            clients: ClientsConfig {
                request_timeout_ms: 600,
                retry_attempts: 2,
                retry_base_delay_ms: 200,
                ..ClientsConfig::default()
            },
            redis: RedisConfig::default(),
        }
    }
}
