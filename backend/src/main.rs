use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nuri::config::{CommandLineArgs, Config};
use nuri::services::analytics::{AnalyticsClient, AnalyticsClientConfig};
use nuri::services::llm::{LlmClientConfig, LlmService};
use nuri::services::router::ChatService;
use nuri::{db, handlers, AppState};
use nuri::{AnalyticsPipeline, FileEngine, SemanticIndex, SqliteConversationStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = CommandLineArgs::parse();
    let config = Config::load(&args);

    init_tracing(&config);
    tracing::info!("Starting nuri on {}:{}", config.server.host, config.server.port);

    // Storage
    let pool = db::init_pool(&config.database.url).await?;
    let store = Arc::new(SqliteConversationStore::new(pool));

    // Ports
    let llm = Arc::new(LlmService::new(
        LlmClientConfig {
            api_base: config.llm.api_base.clone(),
            api_key: config.llm.api_key.clone(),
            model_name: config.llm.model_name.clone(),
            timeout_seconds: config.llm.timeout_seconds,
            temperature: config.llm.temperature,
        },
        config.llm.enabled,
    ));
    let analytics = Arc::new(AnalyticsClient::new(AnalyticsClientConfig {
        base_url: config.analytics.base_url.clone(),
        api_key: config.analytics.api_key.clone(),
        timeout_seconds: config.analytics.timeout_seconds,
    }));

    // Read-only indices, loaded once
    let semantic = Arc::new(SemanticIndex::from_registry());

    // Core services
    let pipeline =
        AnalyticsPipeline::new(semantic, llm.clone(), analytics, store.clone());
    let file_engine = FileEngine::new(llm.clone());
    let chat_service = Arc::new(ChatService::new(pipeline, file_engine, llm, store));

    let state = Arc::new(AppState { chat_service });

    let app = Router::new()
        .route("/api/chat", post(handlers::chat::chat))
        .route("/api/files", post(handlers::chat::register_file))
        .route("/api/health", get(handlers::chat::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));

    match &config.logging.file {
        Some(path) => {
            let appender = tracing_appender::rolling::daily(
                std::path::Path::new(path)
                    .parent()
                    .unwrap_or_else(|| std::path::Path::new(".")),
                std::path::Path::new(path)
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "nuri.log".to_string()),
            );
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(appender))
                .init();
        },
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        },
    }
}
