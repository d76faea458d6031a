use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use tracing::warn;

use crate::{
    articles::{Article, ArticleId, ArticleListing, ArticleUpdate, NewArticle},
    error::AppError,
    state::AppState,
    utils::parse_article_id,
};

#[derive(Serialize)]
pub struct PageViewCount {
    pub article_id: ArticleId,
    pub page_views: u64,
}

#[derive(Serialize)]
pub struct ArticlePage {
    #[serde(flatten)]
    pub article: Article,
    pub page_views: Option<u64>,
}

pub async fn articles_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ArticleListing>>, AppError> {
    Ok(Json(state.articles.list().await?))
}

pub async fn create_article_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewArticle>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(new) = payload.map_err(|_| AppError::MalformedPayload)?;
    let article = state.articles.create(new).await?;

    Ok((StatusCode::CREATED, Json(article)))
}

pub async fn update_article_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<ArticleUpdate>, JsonRejection>,
) -> Result<Json<Article>, AppError> {
    let article_id = parse_article_id(&id)?;
    let Json(update) = payload.map_err(|_| AppError::MalformedPayload)?;

    Ok(Json(state.articles.update(article_id, update).await?))
}

pub async fn delete_article_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let article_id = parse_article_id(&id)?;
    state.articles.delete(article_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn article_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ArticlePage>, AppError> {
    let article_id = parse_article_id(&id)?;
    let article = state.articles.get(article_id).await?;

    let page_views = match state.page_views.increment_page_view(article_id).await {
        Ok(count) => Some(count),
        Err(e) => {
            warn!("View of article {article_id} not recorded: {e}");
            None
        }
    };

    Ok(Json(ArticlePage {
        article,
        page_views,
    }))
}

pub async fn record_view_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let article_id = parse_article_id(&id)?;
    let page_views = state.page_views.increment_page_view(article_id).await?;

    Ok((
        StatusCode::OK,
        Json(PageViewCount {
            article_id,
            page_views,
        }),
    ))
}

pub async fn views_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PageViewCount>, AppError> {
    let article_id = parse_article_id(&id)?;
    let page_views = state.page_views.page_views(article_id).await?;

    Ok(Json(PageViewCount {
        article_id,
        page_views,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header::CONTENT_TYPE},
    };
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::{
        articles::{ArticleId, ArticleService, Author, MemoryArticles, NewArticle},
        build_router,
        config::Config,
        database::ARTICLES_KEY,
        milestones::Milestones,
        notify::NotificationDispatcher,
        pageviews::PageViews,
        state::AppState,
        store::{CacheStore, MemoryStore},
    };

    struct Ignore;

    #[async_trait]
    impl NotificationDispatcher for Ignore {
        async fn dispatch(&self, _: ArticleId, _: u64) {}
    }

    async fn app() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let repository = Arc::new(MemoryArticles::new());
        repository
            .add_author(Author {
                id: 1,
                name: Some("Ada".into()),
                email: None,
            })
            .await;

        let articles = ArticleService::new(repository, store.clone());
        articles
            .create(NewArticle {
                title: "Ownership".into(),
                content: "# Ownership".into(),
                author_id: 1,
                image_url: None,
            })
            .await
            .unwrap();

        let page_views = PageViews::new(store.clone(), Milestones::default(), Arc::new(Ignore));
        let state = AppState::from_parts(Config::default(), page_views, articles);

        (build_router(state), store)
    }

    async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        send(app, request).await
    }

    async fn call_json(app: &Router, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        send(app, request).await
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, body)
    }

    #[tokio::test]
    async fn test_list_articles() {
        let (app, _) = app().await;

        let (status, body) = call(&app, Method::GET, "/articles").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["title"], "Ownership");
        assert_eq!(body[0]["author"], "Ada");
        assert_eq!(body[0]["summary"], "No summary yet");
    }

    #[tokio::test]
    async fn test_record_view() {
        let (app, _) = app().await;

        let (_, first) = call(&app, Method::POST, "/articles/1/views").await;
        let (status, second) = call(&app, Method::POST, "/articles/1/views").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["page_views"], 1);
        assert_eq!(second["article_id"], 1);
        assert_eq!(second["page_views"], 2);
    }

    #[tokio::test]
    async fn test_read_views_does_not_record() {
        let (app, store) = app().await;
        store.set_count(1, 41);

        let (status, body) = call(&app, Method::GET, "/articles/1/views").await;
        let (_, again) = call(&app, Method::GET, "/articles/1/views").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["page_views"], 41);
        assert_eq!(again["page_views"], 41);
    }

    #[tokio::test]
    async fn test_article_page_records_view() {
        let (app, _) = app().await;

        let (status, body) = call(&app, Method::GET, "/articles/1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Ownership");
        assert_eq!(body["page_views"], 1);
    }

    #[tokio::test]
    async fn test_article_page_degrades_without_store() {
        let (app, store) = app().await;
        store.set_online(false);

        let (status, body) = call(&app, Method::GET, "/articles/1").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Ownership");
        assert!(body["page_views"].is_null());
    }

    #[tokio::test]
    async fn test_record_view_without_store() {
        let (app, store) = app().await;
        store.set_online(false);

        let (status, _) = call(&app, Method::POST, "/articles/1/views").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_missing_article() {
        let (app, _) = app().await;

        let (status, _) = call(&app, Method::GET, "/articles/404").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_id() {
        let (app, _) = app().await;

        for uri in ["/articles/-1/views", "/articles/abc", "/articles/1.5/views"] {
            let method = if uri.ends_with("views") {
                Method::POST
            } else {
                Method::GET
            };
            let (status, _) = call(&app, method, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_create_article_clears_listing() {
        let (app, store) = app().await;
        call(&app, Method::GET, "/articles").await;
        assert!(store.get(ARTICLES_KEY).await.unwrap().is_some());

        let (status, body) = call_json(
            &app,
            Method::POST,
            "/articles",
            json!({ "title": "Borrowing", "content": "# Borrowing", "author_id": 1 }),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], 2);
        assert_eq!(store.get(ARTICLES_KEY).await.unwrap(), None);

        let (_, listings) = call(&app, Method::GET, "/articles").await;
        assert_eq!(listings.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_article_clears_listing() {
        let (app, store) = app().await;
        call(&app, Method::GET, "/articles").await;

        let (status, body) = call_json(
            &app,
            Method::PATCH,
            "/articles/1",
            json!({ "title": "Ownership and Moves" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Ownership and Moves");
        assert_eq!(body["content"], "# Ownership");
        assert_eq!(store.get(ARTICLES_KEY).await.unwrap(), None);

        let (_, listings) = call(&app, Method::GET, "/articles").await;
        assert_eq!(listings[0]["title"], "Ownership and Moves");
    }

    #[tokio::test]
    async fn test_delete_article_clears_listing() {
        let (app, store) = app().await;
        call(&app, Method::GET, "/articles").await;

        let (status, _) = call(&app, Method::DELETE, "/articles/1").await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(store.get(ARTICLES_KEY).await.unwrap(), None);

        let (_, listings) = call(&app, Method::GET, "/articles").await;
        assert!(listings.as_array().unwrap().is_empty());

        let (status, _) = call(&app, Method::DELETE, "/articles/1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_write_routes_reject_bad_payloads() {
        let (app, _) = app().await;

        let (status, _) = call_json(&app, Method::POST, "/articles", json!({ "title": 5 })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(&app, Method::PATCH, "/articles/1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call_json(&app, Method::PATCH, "/articles/404", json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
