use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{FeedCandidate, FeedQuery};
use crate::pipeline::CandidateHydrator;
use crate::stores::UserStore;

/// Attaches display info (username, avatar) for each candidate's author.
pub struct AuthorInfoHydrator {
    users: Arc<dyn UserStore>,
}

impl AuthorInfoHydrator {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }
}

#[async_trait]
impl CandidateHydrator for AuthorInfoHydrator {
    fn name(&self) -> &'static str {
        "AuthorInfoHydrator"
    }

    async fn hydrate(
        &self,
        _query: &FeedQuery,
        candidates: &[FeedCandidate],
    ) -> anyhow::Result<Vec<FeedCandidate>> {
        let author_ids: Vec<String> = candidates
            .iter()
            .map(|c| c.author_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let profiles = self.users.profiles_by_ids(&author_ids).await?;
        let by_id: HashMap<&str, _> = profiles.iter().map(|p| (p.user_id.as_str(), p)).collect();

        Ok(candidates
            .iter()
            .map(|candidate| {
                let mut out = candidate.clone();
                if let Some(profile) = by_id.get(candidate.author_id.as_str()) {
                    out.author_username = Some(profile.username.clone());
                    out.author_avatar_url = profile.avatar_url.clone();
                }
                out
            })
            .collect())
    }

    fn update(&self, current: &mut FeedCandidate, hydrated: &FeedCandidate) {
        current.author_username = hydrated.author_username.clone();
        current.author_avatar_url = hydrated.author_avatar_url.clone();
    }
}
