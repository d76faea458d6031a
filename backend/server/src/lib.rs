//! Documentation of the Wikimasters backend.
//!
//! Readers browse summarized wiki articles, every article view bumps a counter, and authors get
//! an email when an article crosses a page view milestone.
//!
//!
//!
//! # General Infrastructure
//! - Frontend renders pages and calls this server for listings and page views
//! - Redis holds the page view counters and the short-lived articles list cache
//! - Articles and authors live in the relational database, reached through [`articles::ArticleRepository`]
//! - Celebration emails go out through the Resend API
//!
//!
//!
//! # Page View Pipeline
//!
//! **Goal**: Count every view exactly once and celebrate milestones without slowing the page down.
//!
//! - Request comes in for `/articles/{id}` or `/articles/{id}/views`
//! - `INCR pageviews:article<id>` returns the new count, Redis serializes concurrent increments
//! - If the new count is exactly one of 10, 50, 100 or 10000, a celebration is spawned on its own task
//! - The count is returned right away, the email may not even have started yet
//! - The celebration looks up the author email, skips quietly if there is none, logs any send failure
//!
//! Nothing is retried. A lost email is preferable to a slow page.
//!
//!
//!
//! # Notes
//!
//! ## Exact Milestones
//! Milestones match on equality. With `INCR` every value is handed to exactly one request, so each
//! milestone fires once. A store that ever skipped a value would skip that email too, and we keep
//! it that way rather than firing on "at or past".
//!
//! ## Store Outages
//! A failed increment surfaces as 503 on `/articles/{id}/views`. The article page itself still
//! renders, the view is just not counted.
//!
//!
//!
//! # Setup
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! `````
//!
//! Run locally against a Redis on the default port.
//! ```sh
//! RUST_LOG=info cargo run -p wiki
//! `````
//!
//! Hammer one article and check no views were lost.
//! ```sh
//! cargo run -p tester -- --article-id 1 --requests 500
//! `````
//!
//!
//!
//! # Environment
//!
//! - `RUST_PORT`: listen port, default 1111
//! - `REDIS_URL`: default `redis://127.0.0.1:6379`
//! - `BASE_URL`: used for links in emails, default `https://localhost:3000`
//! - `MAIL_FROM`: sender of celebration emails
//! - `RESEND_API_KEY`: read from `/run/secrets/RESEND_API_KEY` or the environment, emails are only logged without it
use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::get,
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod articles;
pub mod config;
pub mod database;
pub mod error;
pub mod milestones;
pub mod notify;
pub mod pageviews;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

use config::Config;
use routes::{
    article_handler, articles_handler, create_article_handler, delete_article_handler,
    record_view_handler, update_article_handler, views_handler,
};
use state::AppState;

pub async fn start_server() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load()?;

    info!("Initializing state...");
    let state = AppState::new(config).await?;

    info!("Starting server...");

    let address = format!("0.0.0.0:{}", state.config.port);
    let app = build_router(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");
    Ok(())
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/articles", get(articles_handler).post(create_article_handler))
        .route(
            "/articles/{id}",
            get(article_handler)
                .patch(update_article_handler)
                .delete(delete_article_handler),
        )
        .route(
            "/articles/{id}/views",
            get(views_handler).post(record_view_handler),
        )
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        ctrl_c().await.expect("Failed to install Ctrl+C handler");

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        signal(SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
