use std::path::Path;

use anyhow::Context;
use dashboard_app::config::{AppConfig, CONFIG_FILENAME};
use dashboard_app::logging::{self, LogDestination};
use dashboard_app::session::Session;
use dashboard_app::upstream::UpstreamClient;
use dashboard_app::{router, AppContext};
use dashboard_engine::EngineHandle;
use dashboard_logging::dashboard_info;
use log::LevelFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let destination = LogDestination::parse(std::env::var("DASHBOARD_LOG").ok().as_deref());
    logging::initialize(destination, LevelFilter::Info);

    let config = AppConfig::load(Path::new(CONFIG_FILENAME))?;
    let addr = config.bind_addr()?;

    let engine =
        EngineHandle::new(config.engine_config()).context("failed to start analysis engine")?;
    let upstream = UpstreamClient::new(&config.service_base_url, config.upload_timeout())
        .context("failed to build upstream client")?;
    let ctx = AppContext {
        dataset_root: config.dataset_root.clone(),
        upstream,
        session: Session::new(engine),
    };

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    dashboard_info!(
        "Dashboard listening on {} (analysis service {}, dataset {:?})",
        addr,
        config.service_base_url,
        config.dataset_root
    );
    axum::serve(listener, router(ctx)).await?;
    Ok(())
}
