//! Terasu Chat - persona chat front-end
//!
//! Serves a single chat page per visitor and relays each message, with a
//! short window of recent turns, to a hosted generation model.

mod api;
mod config;
mod llm;
mod persona;
mod render;
mod runtime;
mod session;
mod state_machine;
mod store;

use api::{create_router, AppState};
use config::AppConfig;
use llm::{GeminiService, LlmService, LoggingService};
use persona::Persona;
use runtime::{RuntimeManager, RuntimeSettings, ServiceGenerationClient};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use store::InMemorySessionStore;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often idle sessions are looked for
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "terasu_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = AppConfig::from_env()?;

    let persona = match &config.persona_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "Loading persona");
            Persona::from_file(path)?
        }
        None => Persona::default(),
    };
    tracing::info!(persona = %persona.name, "Persona ready");

    // Generation provider
    let service: Option<Arc<dyn LlmService>> =
        if config.gemini_api_key.is_some() || config.llm_gateway.is_some() {
            let gemini = GeminiService::new(
                config.gemini_api_key.clone().unwrap_or_default(),
                &config.gemini_model,
                config.llm_gateway.as_deref(),
            )?;
            tracing::info!(model = %config.gemini_model, "Generation provider initialized");
            Some(Arc::new(LoggingService::new(Arc::new(gemini))))
        } else {
            tracing::warn!("No generation credentials configured. Set GEMINI_API_KEY or LLM_GATEWAY.");
            None
        };

    let runtime = Arc::new(RuntimeManager::new(
        Arc::new(InMemorySessionStore::new()),
        Arc::new(ServiceGenerationClient::new(service)),
        RuntimeSettings {
            persona: Arc::new(persona),
            context_turns: config.context_turns,
            show_error_detail: config.show_error_detail,
        },
    ));

    // Abandon idle sessions in the background
    let sweeper = runtime.clone();
    let ttl = config.session_ttl;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            sweeper.sweep_expired(ttl).await;
        }
    });

    // Create router
    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(AppState::new(runtime))
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Terasu chat listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
