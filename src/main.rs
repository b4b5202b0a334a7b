use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use booking_agent::config::AppConfig;
use booking_agent::db;
use booking_agent::handlers;
use booking_agent::services::ai::intent::LlmClassifier;
use booking_agent::services::ai::providers::{GroqProvider, OllamaProvider};
use booking_agent::services::ai::rules::RuleClassifier;
use booking_agent::services::ai::IntentClassifier;
use booking_agent::services::calendar::google::GoogleCalendar;
use booking_agent::services::calendar::local::LocalCalendar;
use booking_agent::services::calendar::CalendarBackend;
use booking_agent::services::session::{InMemorySessionStore, TurnLocks};
use booking_agent::state::AppState;

const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    let policy = config.working_hours()?;
    let timezone = config.tz();
    tracing::info!(timezone = %timezone, hours = %policy.to_human_readable(), "working hours loaded");

    let classifier: Box<dyn IntentClassifier> = match config.intent_classifier.as_str() {
        "groq" => {
            anyhow::ensure!(
                !config.groq_api_key.is_empty(),
                "GROQ_API_KEY must be set when INTENT_CLASSIFIER=groq"
            );
            tracing::info!("using Groq intent classifier (model: {})", config.groq_model);
            Box::new(LlmClassifier::new(Box::new(GroqProvider::new(
                config.groq_api_key.clone(),
                config.groq_model.clone(),
            )))?)
        }
        "ollama" => {
            tracing::info!("using Ollama intent classifier (url: {})", config.ollama_url);
            Box::new(LlmClassifier::new(Box::new(OllamaProvider::new(
                config.ollama_url.clone(),
                config.ollama_model.clone(),
            )))?)
        }
        _ => {
            tracing::info!("using keyword intent classifier");
            Box::new(RuleClassifier::new()?)
        }
    };

    let calendar: Arc<dyn CalendarBackend> = match config.calendar_backend.as_str() {
        "google" => {
            anyhow::ensure!(
                !config.google_access_token.is_empty(),
                "GOOGLE_ACCESS_TOKEN must be set when CALENDAR_BACKEND=google"
            );
            tracing::info!("using Google calendar {}", config.google_calendar_id);
            Arc::new(GoogleCalendar::new(
                config.google_calendar_id.clone(),
                config.google_access_token.clone(),
                timezone,
            ))
        }
        _ => {
            let conn = db::init_db(&config.database_url)?;
            tracing::info!("using local calendar at {}", config.database_url);
            Arc::new(LocalCalendar::new(Arc::new(Mutex::new(conn)), timezone.name()))
        }
    };

    let state = Arc::new(AppState {
        config: config.clone(),
        policy,
        timezone,
        classifier,
        calendar,
        sessions: Box::new(InMemorySessionStore::new()),
        turn_locks: TurnLocks::new(),
    });

    let sweeper = Arc::clone(&state);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            let purged = sweeper.sessions.purge_expired(sweeper.now());
            sweeper.turn_locks.release_idle();
            if purged > 0 {
                tracing::debug!(purged, "expired sessions removed");
            }
        }
    });

    let app = Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health))
        .route("/chat", post(handlers::chat::chat))
        .route("/api/calendar/info", get(handlers::calendar::calendar_info))
        .route("/calendar/:event_id", get(handlers::calendar::download_ics))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
