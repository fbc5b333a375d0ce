use anyhow::Result;
use chrono::Local;
use spot_price_monitor::config::{Config, REGION, VAT_MULTIPLIER};
use spot_price_monitor::controller::RefreshScheduler;
use spot_price_monitor::presenter::{dashboard, WatchPresenter, WindowHandle};
use spot_price_monitor::prices::EleringPriceSource;
use spot_price_monitor::telemetry::{init_tracing, shutdown_signal};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cfg = Config::load()?;
    init_tracing(&cfg.telemetry);

    let source = Arc::new(EleringPriceSource::new(&cfg.feed, REGION, Local)?);
    let (presenter, views) = WatchPresenter::new();
    let window = WindowHandle::new();

    let scheduler = Arc::new(RefreshScheduler::new(
        source,
        Arc::new(presenter),
        Local,
        VAT_MULTIPLIER,
    ));

    info!(
        region = REGION,
        feed = %cfg.feed.base_url,
        period_secs = scheduler.period().as_secs(),
        "starting spot price monitor"
    );

    let refresh = scheduler.clone().start(window.shutdown_token());
    // The dashboard closes the window when it exits, for any reason
    let ui = tokio::spawn(dashboard::run(views, window.clone()));

    tokio::select! {
        _ = shutdown_signal() => window.close_window(),
        _ = window.closed() => {},
    }

    refresh.await?;
    ui.await??;

    warn!("shutdown complete");
    Ok(())
}
