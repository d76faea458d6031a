//! # Milestones
//!
//! Page view counts that earn the author a celebration email.
//!
//! ## Matching
//!
//! Exact equality against the freshly incremented count. Since the counter only goes up and
//! `INCR` hands each value to exactly one caller, every milestone fires at most once per article.
//!
//! A count that never lands on a milestone never fires it. If the store ever hands out values
//! that jump from 49 to 51, the 50 email is lost. That is accepted, matching is not widened to
//! "first count at or past".
//!
//! ## Dispatch
//!
//! Fire and forget on a detached tokio task. The caller's count is returned before the dispatch
//! starts, and a process exit may drop a dispatch in flight. Best effort, not at-least-once.
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::{articles::ArticleId, notify::NotificationDispatcher};

pub const MILESTONES: [u64; 4] = [10, 50, 100, 10_000];

#[derive(Clone, Debug)]
pub struct Milestones {
    thresholds: Arc<[u64]>,
}

impl Milestones {
    pub fn new(thresholds: impl IntoIterator<Item = u64>) -> Self {
        let mut thresholds: Vec<u64> = thresholds.into_iter().collect();
        thresholds.sort_unstable();
        thresholds.dedup();

        Self {
            thresholds: thresholds.into(),
        }
    }

    pub fn thresholds(&self) -> &[u64] {
        &self.thresholds
    }

    pub fn is_milestone(&self, count: u64) -> bool {
        self.thresholds.binary_search(&count).is_ok()
    }

    /// Spawns the dispatch when `count` is a milestone. The handle is only for observers,
    /// dropping it leaves the task running.
    pub fn check_and_notify(
        &self,
        article_id: ArticleId,
        count: u64,
        dispatcher: &Arc<dyn NotificationDispatcher>,
    ) -> Option<JoinHandle<()>> {
        if !self.is_milestone(count) {
            return None;
        }

        debug!("Article {article_id} reached milestone {count}");

        let dispatcher = dispatcher.clone();
        Some(tokio::spawn(async move {
            dispatcher.dispatch(article_id, count).await;
        }))
    }
}

impl Default for Milestones {
    fn default() -> Self {
        Self::new(MILESTONES)
    }
}
