// Experiment bucketing for pipeline stages.
//
// Assignments are resolved once per request with consistent hashing and
// attached to the query, so stages read flags synchronously instead of
// calling out mid-pipeline.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Experiment id carrying the per-stage rollout flags for the feed surface
/// (optional scorers, cluster dedup, visibility overrides).
pub const FEED_EXPERIMENT_ID: &str = "feed_ranking_experiment";

/// One bucket of an experiment: a name, a traffic share, and free-form
/// config knobs the winning stage reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentBucket {
    pub name: String,
    /// Percentage of traffic (0-100). Buckets are walked in declaration
    /// order; slots past the configured total stay unassigned.
    pub allocation: u8,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

/// Experiment definition held in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub enabled: bool,
    pub buckets: Vec<ExperimentBucket>,
}

/// Resolved assignment for one user in one experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentAssignment {
    pub bucket: String,
    #[serde(default)]
    pub config: HashMap<String, serde_json::Value>,
}

/// All assignments for one user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentContext {
    pub user_id: String,
    pub assignments: HashMap<String, ExperimentAssignment>,
}

impl ExperimentContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            assignments: HashMap::new(),
        }
    }

    /// Typed config lookup. Missing experiment, missing key, or a value of
    /// the wrong shape all yield `default`.
    pub fn get_config<T: DeserializeOwned>(
        &self,
        experiment_id: &str,
        key: &str,
        default: T,
    ) -> T {
        let Some(value) = self
            .assignments
            .get(experiment_id)
            .and_then(|assignment| assignment.config.get(key))
        else {
            return default;
        };
        match serde_json::from_value(value.clone()) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(
                    experiment_id,
                    key,
                    error = %err,
                    "experiment config value has unexpected type, using default"
                );
                default
            }
        }
    }

    pub fn is_in_bucket(&self, experiment_id: &str, bucket: &str) -> bool {
        self.assignments
            .get(experiment_id)
            .map(|assignment| assignment.bucket == bucket)
            .unwrap_or(false)
    }

    /// `experiment:bucket` pairs for training-record attribution, sorted so
    /// the output is stable across runs.
    pub fn experiment_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .assignments
            .iter()
            .map(|(id, assignment)| format!("{id}:{}", assignment.bucket))
            .collect();
        keys.sort();
        keys
    }

    /// Test helper for stages that gate on an assignment.
    pub fn with_assignment(
        mut self,
        experiment_id: impl Into<String>,
        bucket: impl Into<String>,
        config: HashMap<String, serde_json::Value>,
    ) -> Self {
        self.assignments.insert(
            experiment_id.into(),
            ExperimentAssignment {
                bucket: bucket.into(),
                config,
            },
        );
        self
    }
}

/// In-memory experiment registry with consistent-hash bucketing.
pub struct ExperimentRegistry {
    experiments: Vec<Experiment>,
}

impl ExperimentRegistry {
    pub fn new(experiments: Vec<Experiment>) -> Self {
        Self { experiments }
    }

    pub fn empty() -> Self {
        Self {
            experiments: Vec::new(),
        }
    }

    /// Resolves every enabled experiment for this user. Deterministic: the
    /// same user id always lands in the same bucket of an experiment.
    pub fn context_for(&self, user_id: &str) -> ExperimentContext {
        let mut context = ExperimentContext::new(user_id);
        for experiment in self
            .experiments
            .iter()
            .filter(|e| e.enabled && !e.buckets.is_empty())
        {
            let slot = Self::slot(user_id, &experiment.id) as u32;
            let mut cumulative = 0u32;
            for bucket in &experiment.buckets {
                cumulative += bucket.allocation as u32;
                if slot < cumulative {
                    context.assignments.insert(
                        experiment.id.clone(),
                        ExperimentAssignment {
                            bucket: bucket.name.clone(),
                            config: bucket.config.clone(),
                        },
                    );
                    break;
                }
            }
        }
        context
    }

    fn slot(user_id: &str, experiment_id: &str) -> u8 {
        let mut hasher = DefaultHasher::new();
        user_id.hash(&mut hasher);
        experiment_id.hash(&mut hasher);
        (hasher.finish() % 100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experiment(id: &str, buckets: Vec<ExperimentBucket>) -> Experiment {
        Experiment {
            id: id.to_string(),
            enabled: true,
            buckets,
        }
    }

    fn bucket(name: &str, allocation: u8) -> ExperimentBucket {
        ExperimentBucket {
            name: name.to_string(),
            allocation,
            config: HashMap::new(),
        }
    }

    #[test]
    fn assignment_is_deterministic() {
        let registry = ExperimentRegistry::new(vec![experiment(
            "ranker_v2",
            vec![bucket("control", 50), bucket("treatment", 50)],
        )]);

        let first = registry.context_for("user-42");
        let second = registry.context_for("user-42");
        assert_eq!(
            first.assignments["ranker_v2"].bucket,
            second.assignments["ranker_v2"].bucket
        );
    }

    #[test]
    fn full_allocation_assigns_everyone() {
        let registry = ExperimentRegistry::new(vec![experiment(
            "ranker_v2",
            vec![bucket("control", 50), bucket("treatment", 50)],
        )]);

        let mut seen = HashMap::new();
        for i in 0..200 {
            let context = registry.context_for(&format!("user-{i}"));
            let assignment = context.assignments.get("ranker_v2").expect("assigned");
            *seen.entry(assignment.bucket.clone()).or_insert(0) += 1;
        }
        assert!(seen["control"] > 0);
        assert!(seen["treatment"] > 0);
    }

    #[test]
    fn zero_allocation_assigns_nobody() {
        let registry =
            ExperimentRegistry::new(vec![experiment("dark_launch", vec![bucket("on", 0)])]);
        for i in 0..50 {
            let context = registry.context_for(&format!("user-{i}"));
            assert!(context.assignments.is_empty());
        }
    }

    #[test]
    fn disabled_experiments_are_skipped() {
        let registry = ExperimentRegistry::new(vec![Experiment {
            id: "off".to_string(),
            enabled: false,
            buckets: vec![bucket("all", 100)],
        }]);
        assert!(registry.context_for("user-1").assignments.is_empty());
    }

    #[test]
    fn typed_config_falls_back_on_bad_shape() {
        let mut config = HashMap::new();
        config.insert("cap".to_string(), serde_json::json!("not a number"));
        config.insert("enable".to_string(), serde_json::json!(true));
        let context = ExperimentContext::new("u1").with_assignment("exp", "treatment", config);

        assert_eq!(context.get_config("exp", "cap", 30_u64), 30);
        assert!(context.get_config("exp", "enable", false));
        assert!(context.is_in_bucket("exp", "treatment"));
        assert!(!context.is_in_bucket("exp", "control"));
    }
}
