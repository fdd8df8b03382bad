use std::path::Path;
use std::sync::Arc;

use trade_onboard::config::EngineConfig;
use trade_onboard::engine::Engine;
use trade_onboard::enrich::{
    BusinessRegistryClient, EnrichmentCoordinator, EnrichmentService, LicensingClient,
    WebSearchClient,
};
use trade_onboard::geo::{GeoDataset, GeoResolver};
use trade_onboard::llm::{LlmBackend, LlmConfig, create_provider};
use trade_onboard::server::routes;
use trade_onboard::session::{InMemorySessionStore, LibSqlSessionStore, SessionStore};
use trade_onboard::taxonomy::Taxonomy;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing. With ONBOARD_LOG_DIR set, logs roll daily into
    // that directory; the guard must outlive main.
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    let _log_guard = match std::env::var("ONBOARD_LOG_DIR") {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(&dir, "trade-onboard.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .init();
            Some(guard)
        }
        Err(_) => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .init();
            None
        }
    };

    // Read API key from environment
    let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_else(|_| {
        eprintln!("Error: ANTHROPIC_API_KEY not set");
        eprintln!("  export ANTHROPIC_API_KEY=sk-ant-...");
        std::process::exit(1);
    });

    let model = std::env::var("ONBOARD_MODEL")
        .unwrap_or_else(|_| "claude-haiku-4-5".to_string());

    let port: u16 = std::env::var("ONBOARD_PORT")
        .unwrap_or_else(|_| "8001".to_string())
        .parse()
        .unwrap_or(8001);

    let config = EngineConfig::from_env();

    eprintln!("🛠  Trade Onboard v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", model);
    eprintln!("   API: http://0.0.0.0:{}/api/sessions", port);

    // ── Collaborator ────────────────────────────────────────────────────
    let llm_config = LlmConfig {
        backend: LlmBackend::Anthropic,
        api_key: secrecy::SecretString::from(api_key),
        model,
    };
    let llm = create_provider(&llm_config)?;

    // ── Static datasets (loaded once, shared read-only) ─────────────────
    let dataset = match std::env::var("ONBOARD_LOCALITIES_PATH") {
        Ok(path) => Arc::new(GeoDataset::load(Path::new(&path))?),
        Err(_) => Arc::new(GeoDataset::bundled()),
    };
    let taxonomy = match std::env::var("ONBOARD_TAXONOMY_PATH") {
        Ok(path) => Arc::new(Taxonomy::load(Path::new(&path))?),
        Err(_) => Arc::new(Taxonomy::bundled()),
    };
    eprintln!(
        "   Datasets: {} localities, {} categories",
        dataset.len(),
        taxonomy.categories().len()
    );

    // ── External clients ────────────────────────────────────────────────
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(15))
        .build()?;

    let registry_guid = std::env::var("ABR_GUID")
        .ok()
        .filter(|v| !v.is_empty())
        .map(secrecy::SecretString::from);
    if registry_guid.is_none() {
        eprintln!("   Registry: mock mode (ABR_GUID not set)");
    }
    let registry = Arc::new(BusinessRegistryClient::new(
        http.clone(),
        registry_guid,
        config.max_candidates,
    ));

    let licensing_key = std::env::var("TRADES_API_KEY")
        .ok()
        .filter(|v| !v.is_empty())
        .map(secrecy::SecretString::from);
    let licensing_auth = std::env::var("TRADES_AUTH_HEADER")
        .ok()
        .filter(|v| !v.is_empty())
        .map(secrecy::SecretString::from);
    let web_key = std::env::var("WEB_SEARCH_API_KEY")
        .ok()
        .filter(|v| !v.is_empty())
        .map(secrecy::SecretString::from);

    let enrichment_services: Vec<Arc<dyn EnrichmentService>> = vec![
        Arc::new(LicensingClient::new(
            http.clone(),
            licensing_key,
            licensing_auth,
            config.licensing_timeout,
        )),
        Arc::new(WebSearchClient::new(http.clone(), web_key, config.web_timeout)),
    ];
    let enrichment = EnrichmentCoordinator::new(enrichment_services);
    eprintln!("   Enrichment: {}", enrichment.service_names().join(", "));

    // ── Session store ───────────────────────────────────────────────────
    let store: Arc<dyn SessionStore> = match std::env::var("ONBOARD_DB_PATH") {
        Ok(db_path) => {
            eprintln!("   Sessions: {}", db_path);
            Arc::new(LibSqlSessionStore::new_local(Path::new(&db_path)).await?)
        }
        Err(_) => {
            eprintln!("   Sessions: in-memory");
            Arc::new(InMemorySessionStore::new())
        }
    };

    // ── Engine + server ─────────────────────────────────────────────────
    let resolver = GeoResolver::new(Arc::clone(&dataset), &config);
    let engine = Arc::new(Engine::new(
        config,
        store,
        llm,
        registry,
        enrichment,
        resolver,
        taxonomy,
    ));

    let app = routes(engine);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!(port, "Onboarding server started");
    axum::serve(listener, app).await?;

    Ok(())
}
