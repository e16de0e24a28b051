use std::sync::Arc;

use app_intake::config::WatcherConfig;
use app_intake::decision::{DecisionEngine, Directory};
use app_intake::discord::DiscordClient;
use app_intake::http;
use app_intake::poller::{HeaderCache, Poller, spawn_poll_loop};
use app_intake::publish::Notifier;
use app_intake::registry::SourceRegistry;
use app_intake::sheets::{GoogleSheetsClient, SheetsApi, TokenProvider};
use app_intake::state::StateStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = WatcherConfig::from_env().unwrap_or_else(|e| {
        eprintln!("❌ {e}");
        std::process::exit(1);
    });

    eprintln!("📋 app-intake v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Sources: {}", config.sources.len());
    eprintln!("   Poll interval: {}s", config.poll_interval.as_secs());
    eprintln!("   DM on reject: {}", config.policy.dm_on_reject);
    eprintln!("   State file: {}", config.state_path.display());
    eprintln!("   Control API: http://0.0.0.0:{}\n", config.http_port);

    let registry = Arc::new(SourceRegistry::new(config.sources.clone()));
    let state = Arc::new(StateStore::load(&config.state_path));
    let headers = Arc::new(HeaderCache::new());

    let sheets: Arc<dyn SheetsApi> = Arc::new(GoogleSheetsClient::new(TokenProvider::new(
        config.sheets_auth,
    )));

    let discord = Arc::new(DiscordClient::new(
        config.discord.bot_token.clone(),
        config.discord.channel_id.clone(),
        config.discord.guild_id.clone(),
        config.discord.staff_ping_user_id.clone(),
    ));

    let poller = Arc::new(Poller::new(
        Arc::clone(&registry),
        Arc::clone(&sheets),
        Arc::clone(&discord) as Arc<dyn Notifier>,
        Arc::clone(&state),
        Arc::clone(&headers),
    ));

    let engine = Arc::new(DecisionEngine::new(
        registry,
        sheets,
        Arc::clone(&discord) as Arc<dyn Directory>,
        state,
        headers,
        config.policy,
    ));

    // Backlog pass runs on the loop's first (immediate) tick.
    let (_poll_handle, trigger, _shutdown) = spawn_poll_loop(poller, config.poll_interval);

    let app = http::routes(engine, trigger);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.http_port)).await?;
    tracing::info!(port = config.http_port, "Control API listening");
    axum::serve(listener, app).await?;

    Ok(())
}
