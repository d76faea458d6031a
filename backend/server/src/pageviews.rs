use std::sync::Arc;

use crate::{
    articles::ArticleId, error::StoreError, milestones::Milestones,
    notify::NotificationDispatcher, store::CounterStore,
};

#[derive(Clone)]
pub struct PageViews {
    counter: Arc<dyn CounterStore>,
    milestones: Milestones,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl PageViews {
    pub fn new(
        counter: Arc<dyn CounterStore>,
        milestones: Milestones,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Self {
        Self {
            counter,
            milestones,
            dispatcher,
        }
    }

    /// Records one view and returns the new count. A milestone email is spawned, not awaited.
    pub async fn increment_page_view(&self, article_id: ArticleId) -> Result<u64, StoreError> {
        let count = self.counter.increment(article_id).await?;

        #[cfg(feature = "verbose")]
        tracing::info!("Article {article_id} at {count} views");

        self.milestones
            .check_and_notify(article_id, count, &self.dispatcher);

        Ok(count)
    }

    pub async fn page_views(&self, article_id: ArticleId) -> Result<u64, StoreError> {
        self.counter.count(article_id).await
    }
}
