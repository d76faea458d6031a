//! # Articles
//!
//! The relational database owns articles and authors, this module only sees them through
//! [`ArticleRepository`]. [`MemoryArticles`] stands in for it in tests and local runs.
//!
//! ## Listing Cache
//!
//! The home page lists every article. The listing is cached in `articles:all` for 60 seconds:
//! - Hit: decode the JSON and return
//! - Miss: read the repository, write the JSON back with the TTL
//! - Create/update/delete: delete the key so the next read repopulates it
//!
//! The cache is an optimization only. When the store is unreachable or the entry does not
//! decode, the listing is served straight from the repository.
use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::{
    database::{ARTICLES_KEY, ARTICLES_TTL},
    error::{AppError, StoreError},
    store::CacheStore,
};

pub type ArticleId = u32;
pub type UserId = u32;

pub const NO_SUMMARY: &str = "No summary yet";
pub const UNKNOWN_AUTHOR: &str = "Unknown";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: ArticleId,
    pub title: String,
    pub content: String,
    pub summary: String,
    pub image_url: Option<String>,
    pub author_id: UserId,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Author {
    pub id: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// What the celebration email needs to know about an article.
#[derive(Clone, Debug, PartialEq)]
pub struct AuthorContact {
    pub article_title: String,
    pub author: Author,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ArticleListing {
    pub id: ArticleId,
    pub title: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub summary: String,
}

impl ArticleListing {
    pub fn new(article: &Article, author_name: Option<&str>) -> Self {
        let summary = if article.summary.is_empty() {
            NO_SUMMARY.to_string()
        } else {
            article.summary.clone()
        };

        Self {
            id: article.id,
            title: article.title.clone(),
            author: author_name.unwrap_or(UNKNOWN_AUTHOR).to_string(),
            created_at: article.created_at,
            summary,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewArticle {
    pub title: String,
    pub content: String,
    pub author_id: UserId,
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
}

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<ArticleListing>, StoreError>;

    async fn get(&self, id: ArticleId) -> Result<Option<Article>, StoreError>;

    async fn create(&self, article: NewArticle) -> Result<Article, StoreError>;

    /// `None` when no article has that id.
    async fn update(&self, id: ArticleId, update: ArticleUpdate) -> Result<Option<Article>, StoreError>;

    /// `false` when no article has that id.
    async fn delete(&self, id: ArticleId) -> Result<bool, StoreError>;

    async fn author_contact(&self, id: ArticleId) -> Result<Option<AuthorContact>, StoreError>;
}

#[derive(Default)]
struct Catalogue {
    articles: BTreeMap<ArticleId, Article>,
    authors: BTreeMap<UserId, Author>,
    next_id: ArticleId,
}

#[derive(Default)]
pub struct MemoryArticles {
    catalogue: RwLock<Catalogue>,
}

impl MemoryArticles {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_author(&self, author: Author) {
        self.catalogue.write().await.authors.insert(author.id, author);
    }

    /// One author and a welcome article, enough to click around a local server.
    pub async fn seeded() -> Self {
        let articles = Self::new();

        articles
            .add_author(Author {
                id: 1,
                name: Some("Wiki Admin".to_string()),
                email: Some("example@gmail.com".to_string()),
            })
            .await;

        let welcome = NewArticle {
            title: "Getting Started with WikiFlow".to_string(),
            content: "# Getting Started with WikiFlow\n\nWelcome to your personal wiki system!"
                .to_string(),
            author_id: 1,
            image_url: None,
        };
        // MemoryArticles never fails
        let _ = articles.create(welcome).await;

        articles
    }
}

#[async_trait]
impl ArticleRepository for MemoryArticles {
    async fn list(&self) -> Result<Vec<ArticleListing>, StoreError> {
        let catalogue = self.catalogue.read().await;

        Ok(catalogue
            .articles
            .values()
            .map(|article| {
                let name = catalogue
                    .authors
                    .get(&article.author_id)
                    .and_then(|author| author.name.as_deref());

                ArticleListing::new(article, name)
            })
            .collect())
    }

    async fn get(&self, id: ArticleId) -> Result<Option<Article>, StoreError> {
        Ok(self.catalogue.read().await.articles.get(&id).cloned())
    }

    async fn create(&self, new: NewArticle) -> Result<Article, StoreError> {
        let mut catalogue = self.catalogue.write().await;
        catalogue.next_id += 1;

        let now = Utc::now();
        let article = Article {
            id: catalogue.next_id,
            title: new.title,
            content: new.content,
            summary: String::new(),
            image_url: new.image_url,
            author_id: new.author_id,
            published: true,
            created_at: now,
            updated_at: now,
        };
        catalogue.articles.insert(article.id, article.clone());

        Ok(article)
    }

    async fn update(&self, id: ArticleId, update: ArticleUpdate) -> Result<Option<Article>, StoreError> {
        let mut catalogue = self.catalogue.write().await;
        let Some(article) = catalogue.articles.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(title) = update.title {
            article.title = title;
        }
        if let Some(content) = update.content {
            article.content = content;
        }
        if update.image_url.is_some() {
            article.image_url = update.image_url;
        }
        article.updated_at = Utc::now();

        Ok(Some(article.clone()))
    }

    async fn delete(&self, id: ArticleId) -> Result<bool, StoreError> {
        Ok(self.catalogue.write().await.articles.remove(&id).is_some())
    }

    async fn author_contact(&self, id: ArticleId) -> Result<Option<AuthorContact>, StoreError> {
        let catalogue = self.catalogue.read().await;

        Ok(catalogue.articles.get(&id).and_then(|article| {
            catalogue
                .authors
                .get(&article.author_id)
                .map(|author| AuthorContact {
                    article_title: article.title.clone(),
                    author: author.clone(),
                })
        }))
    }
}

#[derive(Clone)]
pub struct ArticleService {
    repository: Arc<dyn ArticleRepository>,
    cache: Arc<dyn CacheStore>,
}

impl ArticleService {
    pub fn new(repository: Arc<dyn ArticleRepository>, cache: Arc<dyn CacheStore>) -> Self {
        Self { repository, cache }
    }

    pub fn repository(&self) -> Arc<dyn ArticleRepository> {
        self.repository.clone()
    }

    pub async fn list(&self) -> Result<Vec<ArticleListing>, AppError> {
        match self.cache.get(ARTICLES_KEY).await {
            Ok(Some(json)) => match serde_json::from_str::<Vec<ArticleListing>>(&json) {
                Ok(listings) => {
                    debug!("{ARTICLES_KEY} cache hit");
                    return Ok(listings);
                }
                Err(e) => warn!("Discarding {ARTICLES_KEY}: {}", StoreError::from(e)),
            },
            Ok(None) => debug!("{ARTICLES_KEY} cache miss"),
            Err(e) => warn!("Reading {ARTICLES_KEY} failed, falling back to repository: {e}"),
        }

        let listings = self.repository.list().await?;

        match serde_json::to_string(&listings) {
            Ok(json) => {
                if let Err(e) = self.cache.set_ex(ARTICLES_KEY, json, ARTICLES_TTL).await {
                    warn!("Caching {ARTICLES_KEY} failed: {e}");
                }
            }
            Err(e) => warn!("Encoding {ARTICLES_KEY} failed: {e}"),
        }

        Ok(listings)
    }

    pub async fn get(&self, id: ArticleId) -> Result<Article, AppError> {
        self.repository.get(id).await?.ok_or(AppError::NotFound)
    }

    pub async fn create(&self, new: NewArticle) -> Result<Article, AppError> {
        let article = self.repository.create(new).await?;
        info!("Article {} created", article.id);

        self.invalidate().await;
        Ok(article)
    }

    pub async fn update(&self, id: ArticleId, update: ArticleUpdate) -> Result<Article, AppError> {
        let article = self
            .repository
            .update(id, update)
            .await?
            .ok_or(AppError::NotFound)?;
        info!("Article {id} updated");

        self.invalidate().await;
        Ok(article)
    }

    pub async fn delete(&self, id: ArticleId) -> Result<(), AppError> {
        if !self.repository.delete(id).await? {
            return Err(AppError::NotFound);
        }
        info!("Article {id} deleted");

        self.invalidate().await;
        Ok(())
    }

    async fn invalidate(&self) {
        if let Err(e) = self.cache.del(ARTICLES_KEY).await {
            warn!("Invalidating {ARTICLES_KEY} failed, stale for up to {ARTICLES_TTL:?}: {e}");
        }
    }
}
