//! Action-type vocabulary.
//!
//! Action types are plain strings end to end (client events, interaction
//! store, model payloads); the constants here are the single spelling of
//! each one.

pub const LIKE: &str = "like";
pub const REPLY: &str = "reply";
pub const REPOST: &str = "repost";
pub const QUOTE: &str = "quote";
pub const CLICK: &str = "click";
pub const PROFILE_CLICK: &str = "profile_click";
pub const SHARE: &str = "share";
pub const IMPRESSION: &str = "impression";
pub const VIDEO_VIEW: &str = "video_view";
pub const DISMISS: &str = "dismiss";
pub const BLOCK_AUTHOR: &str = "block_author";
pub const REPORT: &str = "report";
pub const DWELL: &str = "dwell";

/// Action types forwarded in the model-facing action sequence.
pub const MODEL_SEQUENCE_ACTION_TYPES: &[&str] = &[LIKE, REPLY, REPOST, CLICK, IMPRESSION];
