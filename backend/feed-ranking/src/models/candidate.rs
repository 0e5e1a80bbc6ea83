use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::records::PostRecord;

/// Predicted action probabilities for one candidate.
///
/// Fields are independently optional on purpose: the ML scorer fills the
/// fields the model predicted, the heuristic scorer fills whatever is still
/// unset. `not_interested`/`dismiss` and `block_author`/`block` are paired
/// because the prediction service and the heuristic scorer use different
/// vocabularies for the same signal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhoenixScores {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quoted_click: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_click: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwell: Option<f64>,
    /// Continuous dwell-time signal (model output, seconds).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwell_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_via_dm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub share_via_copy_link: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_expand: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_author: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_quality_view: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_interested: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dismiss: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_author: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mute_author: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<f64>,
}

impl PhoenixScores {
    /// Fill every unset field from `other`. Set fields keep their value, so
    /// an upstream ML prediction is never overwritten by heuristics.
    pub fn fill_missing_from(&mut self, other: &PhoenixScores) {
        self.like = self.like.or(other.like);
        self.reply = self.reply.or(other.reply);
        self.repost = self.repost.or(other.repost);
        self.quote = self.quote.or(other.quote);
        self.click = self.click.or(other.click);
        self.quoted_click = self.quoted_click.or(other.quoted_click);
        self.profile_click = self.profile_click.or(other.profile_click);
        self.dwell = self.dwell.or(other.dwell);
        self.dwell_time = self.dwell_time.or(other.dwell_time);
        self.share = self.share.or(other.share);
        self.share_via_dm = self.share_via_dm.or(other.share_via_dm);
        self.share_via_copy_link = self.share_via_copy_link.or(other.share_via_copy_link);
        self.photo_expand = self.photo_expand.or(other.photo_expand);
        self.follow_author = self.follow_author.or(other.follow_author);
        self.video_quality_view = self.video_quality_view.or(other.video_quality_view);
        self.not_interested = self.not_interested.or(other.not_interested);
        self.dismiss = self.dismiss.or(other.dismiss);
        self.block_author = self.block_author.or(other.block_author);
        self.block = self.block.or(other.block);
        self.mute_author = self.mute_author.or(other.mute_author);
        self.report = self.report.or(other.report);
    }

    /// The not-interested signal under either vocabulary.
    pub fn not_interested_signal(&self) -> Option<f64> {
        self.not_interested.or(self.dismiss)
    }

    /// The block signal under either vocabulary.
    pub fn block_signal(&self) -> Option<f64> {
        self.block_author.or(self.block)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Id in the external news corpus (the ML id space).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

/// Visibility-filtering verdict attached during post-selection hydration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VfVerdict {
    pub safe: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// "safe" / "low_risk" / "medium" / "high" / "blocked".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
    #[serde(default)]
    pub requires_review: bool,
}

/// One content item moving through the pipeline.
///
/// Created once per source hit, enriched field by field; identity fields
/// never change after creation. Scoring fields are written in strict stage
/// order: `phoenix_scores` by the ML/heuristic scorers, `weighted_score` by
/// the weighted-combination scorer, `score` first by the diversity scorer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedCandidate {
    pub post_id: String,
    /// Id used by ML retrieval/ranking: the news-corpus external id for news
    /// posts, otherwise the local post id.
    pub model_post_id: String,
    pub author_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,

    pub is_reply: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_post_id: Option<String>,
    pub is_repost: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_post_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    /// True when the candidate came from the viewer's social graph.
    pub in_network: bool,
    /// Name of the source that retrieved this candidate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall_source: Option<String>,

    pub has_image: bool,
    pub has_video: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_duration_sec: Option<f64>,

    pub like_count: u64,
    pub comment_count: u64,
    pub repost_count: u64,
    pub view_count: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_affinity_score: Option<f64>,

    pub is_liked_by_user: bool,
    pub is_reposted_by_user: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phoenix_scores: Option<PhoenixScores>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weighted_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    pub is_nsfw: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vf_result: Option<VfVerdict>,

    pub is_news: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub news_metadata: Option<NewsMetadata>,
}

impl FeedCandidate {
    pub fn from_post(post: &PostRecord) -> Self {
        let external_id = post
            .news_metadata
            .as_ref()
            .and_then(|m| m.external_id.as_deref())
            .filter(|id| !id.is_empty());
        let model_post_id = match external_id {
            Some(id) if post.is_news => id.to_string(),
            _ => post.id.clone(),
        };

        Self {
            post_id: post.id.clone(),
            model_post_id,
            author_id: post.author_id.clone(),
            text: post.text.clone(),
            created_at: post.created_at,
            is_reply: post.is_reply,
            reply_to_post_id: post.reply_to_post_id.clone(),
            is_repost: post.is_repost,
            original_post_id: post.original_post_id.clone(),
            conversation_id: post.conversation_id.clone(),
            in_network: false,
            recall_source: None,
            has_image: post.has_image,
            has_video: post.has_video,
            video_duration_sec: post.video_duration_sec,
            like_count: post.like_count,
            comment_count: post.comment_count,
            repost_count: post.repost_count,
            view_count: post.view_count,
            author_username: None,
            author_avatar_url: None,
            author_affinity_score: None,
            is_liked_by_user: false,
            is_reposted_by_user: false,
            phoenix_scores: None,
            weighted_score: None,
            score: None,
            is_nsfw: post.is_nsfw,
            vf_result: None,
            is_news: post.is_news,
            news_metadata: post.news_metadata.clone(),
        }
    }

    /// Blended engagement signal shared by the popularity-style sources.
    pub fn engagement_score(&self) -> u64 {
        self.like_count + 2 * self.comment_count + 3 * self.repost_count
    }

    /// Ids under which this candidate counts as "the same exposure": its own
    /// id, the reposted original, the reply parent, and the thread root.
    /// Order-preserving, deduplicated.
    pub fn related_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::with_capacity(4);
        for id in [
            Some(self.post_id.as_str()),
            self.original_post_id.as_deref(),
            self.reply_to_post_id.as_deref(),
            self.conversation_id.as_deref(),
        ]
        .into_iter()
        .flatten()
        {
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Supply unit for diversity decay and cold-start caps.
    ///
    /// Social posts group by author. News posts share a handful of bot
    /// author ids, so they group by publisher domain, then topic cluster,
    /// then source name, and only as a last resort by author.
    pub fn supplier_key(&self) -> String {
        if self.is_news {
            let meta = self.news_metadata.as_ref();
            let url = meta
                .and_then(|m| m.source_url.as_deref().or(m.url.as_deref()))
                .unwrap_or("");
            if let Some(host) = https_host(url) {
                return format!("news:domain:{}", host);
            }
            if let Some(cluster_id) = meta.and_then(|m| m.cluster_id) {
                return format!("news:cluster:{}", cluster_id);
            }
            if let Some(source) = meta.and_then(|m| m.source.as_deref()) {
                return format!("news:source:{}", source);
            }
            return format!("news:author:{}", self.author_id);
        }
        format!("author:{}", self.author_id)
    }
}

/// Hostname of an http(s) URL. Synthetic schemes such as `mind://N1234`
/// carry corpus ids, not supplier domains, and return `None`.
fn https_host(url: &str) -> Option<&str> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host = host.rsplit('@').next().unwrap_or(host);
    let host = host.split(':').next().unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}
