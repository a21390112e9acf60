use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::{info, warn};

use coderush_server::chat::{ChatEngine, RegistrationFlow};
use coderush_server::config::Settings;
use coderush_server::database::{connect, Repository};
use coderush_server::handlers;
use coderush_server::knowledge::KnowledgeStore;
use coderush_server::services::retrieval::{
    sync_knowledge_embeddings, FallbackRetriever, KeywordRetriever, Retriever, VectorRetriever,
};
use coderush_server::services::side_effects::{
    Ledger, Notifier, SideEffects, WebhookLedger, WebhookNotifier,
};
use coderush_server::services::{AnswerComposer, GeminiService, GenerationProvider};
use coderush_server::state::AppState;
use coderush_server::utils::RateLimiter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,coderush_server=debug".to_string()),
        )
        .with_target(true)
        .init();

    info!("🚀 Starting CodeRush 2025 registration assistant...");

    let settings = Settings::load()?;
    info!("✅ Configuration loaded");

    let db_pool = connect(&settings.database).await?;
    info!("✅ Database ready");

    let repository = Arc::new(Repository::new(db_pool.clone()));
    let knowledge = Arc::new(KnowledgeStore::bundled());
    let gemini = Arc::new(GeminiService::new(settings.gemini.clone()));

    // The vector path only comes up when a key is configured and the
    // embeddings sync; otherwise keyword retrieval serves everything.
    let keyword_retriever: Arc<dyn Retriever> =
        Arc::new(KeywordRetriever::new(knowledge.clone()));
    let vector_retriever: Option<Arc<dyn Retriever>> = if gemini.is_configured() {
        match sync_knowledge_embeddings(&knowledge, gemini.as_ref(), repository.as_ref()).await {
            Ok(count) => {
                info!(documents = count, "✅ Knowledge embeddings synced");
                Some(Arc::new(VectorRetriever::new(
                    gemini.clone(),
                    repository.clone(),
                    knowledge.clone(),
                    settings.rag.similarity_threshold,
                )))
            }
            Err(e) => {
                warn!(error = %e, "embedding sync failed, running keyword-only");
                None
            }
        }
    } else {
        info!("No Gemini API key configured, running keyword-only");
        None
    };
    let retriever: Arc<dyn Retriever> =
        Arc::new(FallbackRetriever::new(vector_retriever, keyword_retriever));

    let generator: Option<Arc<dyn GenerationProvider>> = if gemini.is_configured() {
        Some(gemini.clone())
    } else {
        None
    };
    let composer = AnswerComposer::new(
        retriever,
        generator,
        settings.prompts.answer_system_prompt.clone(),
        Duration::from_secs(settings.gemini.timeout_seconds),
        settings.rag.retrieval_top_k,
    );

    let webhook_timeout = Duration::from_secs(settings.side_effects.timeout_seconds);
    let notifier: Option<Arc<dyn Notifier>> = if settings.side_effects.notification_url.is_empty() {
        None
    } else {
        Some(Arc::new(WebhookNotifier::new(
            settings.side_effects.notification_url.clone(),
            webhook_timeout,
        )))
    };
    let ledger: Option<Arc<dyn Ledger>> = if settings.side_effects.ledger_url.is_empty() {
        None
    } else {
        Some(Arc::new(WebhookLedger::new(
            settings.side_effects.ledger_url.clone(),
            webhook_timeout,
        )))
    };
    let side_effects = Arc::new(SideEffects::new(notifier, ledger, webhook_timeout));

    let flow = RegistrationFlow::new(
        repository.clone(),
        side_effects,
        settings.registration.max_teams,
    );
    let rate_limiter = RateLimiter::new(
        settings.rate_limit.max_questions,
        Duration::from_secs(settings.rate_limit.window_seconds),
    );
    let engine = Arc::new(ChatEngine::new(
        repository.clone(),
        flow,
        composer,
        rate_limiter,
    ));

    let state = AppState {
        engine,
        repository,
        db_pool,
        settings: settings.clone(),
    };
    let app = build_router(state);

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));
    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check));

    let api_routes = Router::new()
        .route("/api/chat", post(handlers::chat::chat_handler))
        .route(
            "/api/registrations/{session_id}",
            get(handlers::registration::registration_status),
        );

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(Extension(state.engine))
        .layer(Extension(state.repository))
        .layer(Extension(state.db_pool))
        .layer(
            CorsLayer::permissive()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default()))
}
