//! # Celebration Emails
//!
//! Authors get one email when an article reaches a page view milestone.
//!
//! A dispatch never reports failure to its caller. A missing article or author email is an
//! expected skip and logged at info, send failures are logged at error. Nothing is retried.
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};

use crate::articles::{ArticleId, ArticleRepository};

pub const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";
pub const DEFAULT_NAME: &str = "Friend";

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, article_id: ArticleId, page_views: u64);
}

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Mail transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Mail rejected with {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct Email {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

pub struct ResendMailer {
    client: Client,
    api_key: String,
}

impl ResendMailer {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let res = self
            .client
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(email)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(MailError::Rejected { status, body });
        }

        Ok(())
    }
}

/// Used when no mail API key is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        info!(to = ?email.to, subject = %email.subject, "Mail disabled, not sending");

        #[cfg(feature = "verbose")]
        info!("{}", email.html);

        Ok(())
    }
}

pub struct Celebration<'a> {
    pub name: &'a str,
    pub article_title: &'a str,
    pub article_url: String,
    pub page_views: u64,
}

impl Celebration<'_> {
    pub fn subject(&self) -> String {
        format!("Your article on Wikimasters got {} views", self.page_views)
    }

    pub fn html(&self) -> String {
        format!(
            "<h1>Congratulations, {name}!</h1>\
             <p>Your article <strong>{title}</strong> just reached {views} page views.</p>\
             <p><a href=\"{url}\">Read it again</a></p>",
            name = escape(self.name),
            title = escape(self.article_title),
            views = self.page_views,
            url = escape(&self.article_url),
        )
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

pub struct CelebrationDispatcher {
    articles: Arc<dyn ArticleRepository>,
    mailer: Arc<dyn Mailer>,
    base_url: String,
    from: String,
}

impl CelebrationDispatcher {
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        mailer: Arc<dyn Mailer>,
        base_url: &str,
        from: &str,
    ) -> Self {
        Self {
            articles,
            mailer,
            base_url: base_url.trim_end_matches('/').to_string(),
            from: from.to_string(),
        }
    }

    pub fn article_url(&self, article_id: ArticleId) -> String {
        format!("{}/wiki/{article_id}", self.base_url)
    }
}

#[async_trait]
impl NotificationDispatcher for CelebrationDispatcher {
    async fn dispatch(&self, article_id: ArticleId, page_views: u64) {
        let contact = match self.articles.author_contact(article_id).await {
            Ok(contact) => contact,
            Err(e) => {
                error!("Author lookup for article {article_id} failed: {e}");
                return;
            }
        };

        let Some((contact, email)) =
            contact.and_then(|c| c.author.email.clone().map(|email| (c, email)))
        else {
            info!(
                "Skipping celebration for article {article_id} at {page_views} views, no author email"
            );
            return;
        };

        let celebration = Celebration {
            name: contact.author.name.as_deref().unwrap_or(DEFAULT_NAME),
            article_title: &contact.article_title,
            article_url: self.article_url(article_id),
            page_views,
        };
        let message = Email {
            from: self.from.clone(),
            to: vec![email],
            subject: celebration.subject(),
            html: celebration.html(),
        };

        match self.mailer.send(&message).await {
            Ok(()) => info!(
                "Sent author {} a celebration email for {page_views} views on article {article_id}",
                contact.author.id
            ),
            Err(e) => error!(
                "Celebration email to author {} for article {article_id} failed: {e}",
                contact.author.id
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use reqwest::StatusCode;

    use super::{
        Celebration, CelebrationDispatcher, Email, MailError, Mailer, NotificationDispatcher,
    };
    use crate::articles::{ArticleRepository, Author, MemoryArticles, NewArticle};

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<Email>>,
        fail: bool,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &Email) -> Result<(), MailError> {
            self.sent.lock().unwrap().push(email.clone());

            if self.fail {
                return Err(MailError::Rejected {
                    status: StatusCode::TOO_MANY_REQUESTS,
                    body: "slow down".into(),
                });
            }
            Ok(())
        }
    }

    async fn articles_with(author: Author) -> Arc<MemoryArticles> {
        let articles = Arc::new(MemoryArticles::new());
        let author_id = author.id;
        articles.add_author(author).await;
        articles
            .create(NewArticle {
                title: "Borrow <Checker>".into(),
                content: "...".into(),
                author_id,
                image_url: None,
            })
            .await
            .unwrap();

        articles
    }

    fn dispatcher(articles: Arc<MemoryArticles>, mailer: Arc<RecordingMailer>) -> CelebrationDispatcher {
        CelebrationDispatcher::new(
            articles,
            mailer,
            "https://wiki.example.com/",
            "Wikimasters <noreply@updates.example.com>",
        )
    }

    #[tokio::test]
    async fn test_sends_celebration() {
        let articles = articles_with(Author {
            id: 4,
            name: Some("Grace".into()),
            email: Some("grace@example.com".into()),
        })
        .await;
        let mailer = Arc::new(RecordingMailer::default());

        dispatcher(articles, mailer.clone()).dispatch(1, 50).await;

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["grace@example.com".to_string()]);
        assert_eq!(sent[0].subject, "Your article on Wikimasters got 50 views");
        assert!(sent[0].html.contains("Grace"));
        assert!(sent[0].html.contains("Borrow &lt;Checker&gt;"));
        assert!(sent[0].html.contains("https://wiki.example.com/wiki/1"));
    }

    #[tokio::test]
    async fn test_missing_email_is_skipped() {
        let articles = articles_with(Author {
            id: 4,
            name: Some("Grace".into()),
            email: None,
        })
        .await;
        let mailer = Arc::new(RecordingMailer::default());

        dispatcher(articles, mailer.clone()).dispatch(1, 10).await;

        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_article_is_skipped() {
        let articles = Arc::new(MemoryArticles::new());
        let mailer = Arc::new(RecordingMailer::default());

        dispatcher(articles, mailer.clone()).dispatch(77, 10).await;

        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mail_failure_is_swallowed() {
        let articles = articles_with(Author {
            id: 4,
            name: None,
            email: Some("grace@example.com".into()),
        })
        .await;
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });

        dispatcher(articles, mailer.clone()).dispatch(1, 100).await;

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].html.contains("Friend"));
    }

    #[test]
    fn test_celebration_escapes_link() {
        let celebration = Celebration {
            name: "Ada",
            article_title: "Lifetimes",
            article_url: "https://wiki.example.com\"><script>/wiki/3".into(),
            page_views: 10,
        };

        let html = celebration.html();

        assert!(html.contains("href=\"https://wiki.example.com&quot;&gt;&lt;script&gt;/wiki/3\""));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn test_celebration_subject() {
        let celebration = Celebration {
            name: "Ada",
            article_title: "Lifetimes",
            article_url: "https://localhost:3000/wiki/3".into(),
            page_views: 10_000,
        };

        assert_eq!(
            celebration.subject(),
            "Your article on Wikimasters got 10000 views"
        );
    }
}
