use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use frontdesk::config::AppConfig;
use frontdesk::db;
use frontdesk::handlers;
use frontdesk::services::ai::ollama::OllamaProvider;
use frontdesk::services::ai::openai_compat::OpenAiCompatProvider;
use frontdesk::services::ai::LlmProvider;
use frontdesk::services::conversation;
use frontdesk::services::messaging::twilio::TwilioSmsProvider;
use frontdesk::services::registry::SessionRegistry;
use frontdesk::services::sheets::google::GoogleSheetsLogger;
use frontdesk::state::AppState;

fn build_llm(config: &AppConfig) -> anyhow::Result<Box<dyn LlmProvider>> {
    type Constructor = fn(String, String) -> OpenAiCompatProvider;

    let (api_key, key_name, constructor): (&String, &str, Constructor) =
        match config.llm_provider.as_str() {
            "ollama" => {
                tracing::info!(url = %config.ollama_url, model = %config.ollama_model, "using Ollama LLM provider");
                return Ok(Box::new(OllamaProvider::new(
                    config.ollama_url.clone(),
                    config.ollama_model.clone(),
                    config.ai_temperature,
                    config.ai_max_tokens,
                )));
            }
            "groq" => (&config.groq_api_key, "GROQ_API_KEY", OpenAiCompatProvider::groq),
            "openrouter" => (
                &config.openrouter_api_key,
                "OPENROUTER_API_KEY",
                OpenAiCompatProvider::openrouter,
            ),
            "openai" => (&config.openai_api_key, "OPENAI_API_KEY", OpenAiCompatProvider::openai),
            other => anyhow::bail!("unknown LLM_PROVIDER: {other}"),
        };

    anyhow::ensure!(
        !api_key.is_empty(),
        "{key_name} must be set when LLM_PROVIDER={}",
        config.llm_provider
    );

    tracing::info!(provider = %config.llm_provider, model = %config.ai_model, "using OpenAI-compatible LLM provider");
    Ok(Box::new(
        constructor(api_key.clone(), config.ai_model.clone())
            .with_sampling(config.ai_temperature, config.ai_max_tokens),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let llm = build_llm(&config)?;

    let messaging = TwilioSmsProvider::new(
        config.twilio_account_sid.clone(),
        config.twilio_auth_token.clone(),
        config.twilio_phone_number.clone(),
    );
    if !messaging.is_configured() {
        tracing::warn!("Twilio credentials not set, SMS notifications will fail and be logged");
    }

    let sheets = GoogleSheetsLogger::new(
        config.google_sheet_id.clone(),
        config.google_sheets_token.clone(),
        config.google_sheet_range.clone(),
    );
    if !sheets.is_configured() {
        tracing::warn!("Google Sheets not configured, booking rows will not be logged");
    }

    let state = Arc::new(AppState {
        db: db::shared(conn),
        config: config.clone(),
        llm,
        messaging: Box::new(messaging),
        sheets: Box::new(sheets),
        sessions: SessionRegistry::new(config.session_ttl_secs),
    });

    let sweeper = {
        let state = Arc::clone(&state);
        let period = Duration::from_secs(config.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let evicted = state.sessions.sweep_expired(chrono::Utc::now());
                if !evicted.is_empty() {
                    tracing::info!(count = evicted.len(), live = state.sessions.len(), "session sweep");
                }
            }
        })
    };

    let app = handlers::router(Arc::clone(&state))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    let saved = conversation::persist_all(&state);
    tracing::info!(saved, "persisted live sessions, shutting down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
