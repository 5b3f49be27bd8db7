use anyhow::Context;
use tempo_backend::{
    ai::AiParser,
    config::Config,
    start_server,
    store::{MemoryStore, RedisStore},
    AppState,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tempo_backend=info,tempo=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let parser = AiParser::new(config.gemini.as_ref()).context("building Gemini client")?;
    info!(
        "AI parsing {}, dev mode {}",
        if parser.is_enabled() { "enabled" } else { "disabled" },
        config.dev_mode
    );

    match config.redis_url.clone() {
        Some(url) => {
            info!("Redis URL: {}", url);
            let store = RedisStore::open(&url).context("opening Redis client")?;
            start_server(AppState::new(store, parser, config)).await?;
        }
        None => {
            warn!("REDIS_URL not set, tasks are kept in memory");
            start_server(AppState::new(MemoryStore::new(), parser, config)).await?;
        }
    }

    Ok(())
}
