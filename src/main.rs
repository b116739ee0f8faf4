use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

mod ai;
mod config;
mod error;
mod handlers;
mod line;
mod models;
mod scheduler;
mod services;
mod store;

use ai::GeminiClient;
use config::Config;
use line::LineClient;
use services::streak::StreakEngine;
use store::notion::NotionLogStore;
use store::state::SqliteStateStore;
use store::{LogStore, StateStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub logs: Arc<dyn LogStore>,
    pub state_store: Arc<dyn StateStore>,
    pub streak: Arc<StreakEngine>,
    pub ai: Arc<GeminiClient>,
    pub line: Arc<LineClient>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz))
        .route("/line/webhook", post(handlers::webhook::line_webhook))
        .route("/trigger/weekly", post(handlers::reviews::trigger_weekly))
        .route("/trigger/monthly", post(handlers::reviews::trigger_monthly))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nikki_bot=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env());

    let state_db = SqliteStateStore::connect(&config.state_db_path)
        .await
        .expect("Failed to open state database");
    tracing::info!("State database ready at {}", config.state_db_path);

    let state_store: Arc<dyn StateStore> = Arc::new(state_db);
    let logs: Arc<dyn LogStore> = Arc::new(NotionLogStore::new(
        &config.notion_token,
        &config.notion_db_id,
    ));
    let streak = Arc::new(StreakEngine::new(
        logs.clone(),
        state_store.clone(),
        config.tz(),
    ));
    let ai = Arc::new(GeminiClient::new(
        &config.gemini_api_key,
        config.gemini_models.clone(),
    ));
    let line = Arc::new(LineClient::new(&config.line_token, &config.line_user_id));

    let state = AppState {
        config: config.clone(),
        logs,
        state_store,
        streak,
        ai,
        line,
    };

    scheduler::spawn_trigger_worker(state.clone());

    let app = app(state);
    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
