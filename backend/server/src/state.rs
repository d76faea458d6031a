use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::{
    articles::{ArticleService, MemoryArticles},
    config::Config,
    database::{RedisStore, init_redis},
    milestones::Milestones,
    notify::{CelebrationDispatcher, LogMailer, Mailer, ResendMailer},
    pageviews::PageViews,
};

pub struct AppState {
    pub config: Config,
    pub page_views: PageViews,
    pub articles: ArticleService,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let redis_connection = init_redis(&config.redis_url)
            .await
            .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))?;
        let store = Arc::new(RedisStore::new(redis_connection));

        let repository = Arc::new(MemoryArticles::seeded().await);
        let articles = ArticleService::new(repository, store.clone());

        let mailer: Arc<dyn Mailer> = match &config.resend_key {
            Some(key) => Arc::new(ResendMailer::new(key.clone())),
            None => {
                warn!("RESEND_API_KEY missing, celebration emails will only be logged");
                Arc::new(LogMailer)
            }
        };
        let dispatcher = Arc::new(CelebrationDispatcher::new(
            articles.repository(),
            mailer,
            &config.base_url,
            &config.mail_from,
        ));

        let milestones = Milestones::default();
        info!("Milestones: {:?}", milestones.thresholds());

        let page_views = PageViews::new(store, milestones, dispatcher);

        Ok(Self::from_parts(config, page_views, articles))
    }

    pub fn from_parts(config: Config, page_views: PageViews, articles: ArticleService) -> Arc<Self> {
        Arc::new(Self {
            config,
            page_views,
            articles,
        })
    }
}
