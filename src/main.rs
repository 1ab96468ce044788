use std::sync::Arc;

use mail_triage::config::TriageConfig;
use mail_triage::llm::create_backend;
use mail_triage::mailstore::{GmailStore, MailStore};
use mail_triage::pipeline::classifier::AiClassifier;
use mail_triage::pipeline::ranker::BatchRanker;
use mail_triage::server::{AppState, api_routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = TriageConfig::from_env();

    eprintln!("mail-triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   Batch size: {}", config.max_batch);
    if config.gemini_api_key.is_some() {
        eprintln!("   Gemini API key: configured");
    } else {
        eprintln!("   Warning: GEMINI_API_KEY not set, rule-based scoring only");
    }

    let backend = create_backend(&config);
    let policy = Arc::new(AiClassifier::new(backend.clone()));
    let ranker = Arc::new(BatchRanker::new(policy));
    let store: Arc<dyn MailStore> = Arc::new(GmailStore::new());

    let state = AppState {
        store,
        ranker,
        backend,
        max_batch: config.max_batch,
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "Server started");
    eprintln!("   Listening on http://{addr}\n");

    axum::serve(listener, api_routes(state)).await?;
    Ok(())
}
