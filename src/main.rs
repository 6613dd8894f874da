use std::{net::SocketAddr, process::ExitCode};

use foodgram_sdk::{
    actions::PgStore,
    error::Error,
    filters::{routes, AppState},
    memory::MemoryStore,
    store::Store,
    Config,
};

async fn serve<S: Store>(store: S, config: &Config, address: SocketAddr) {
    let state = AppState::new(
        store,
        config.jwt_secret.as_bytes(),
        config.media_root.to_owned(),
    );
    log::info!("Listening on {address}");
    warp::serve(routes(state)).run(address).await;
}

async fn run() -> Result<(), Error> {
    let config = Config::init()?;
    let address = config.address()?;

    match &config.database_url {
        Some(database_url) => {
            let store = PgStore::connect(database_url, config.database_max_connections).await?;
            store.migrate().await?;
            serve(store, &config, address).await;
        }
        None => {
            log::warn!("DATABASE_URL is not set, data is kept in memory only");
            serve(MemoryStore::new(), &config, address).await;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
