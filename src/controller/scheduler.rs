use chrono::{DateTime, TimeZone, Utc};
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::REFRESH_PERIOD;
use crate::domain::ViewModel;
use crate::normalizer::normalize;
use crate::prices::{FetchError, MarketDataSource};
use crate::presenter::Presenter;

/// Why a cycle published nothing. Never fatal; the next tick retries.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("no top-of-hour samples among {records} records")]
    EmptyData { records: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// Task status tracking
#[derive(Debug, Clone, Default)]
pub struct TaskStatus {
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub run_count: u64,
    pub success_count: u64,
    pub error_count: u64,
}

/// Periodic fetch → normalize → publish loop.
///
/// Ticks are 900 s apart, start to start. A cycle always finishes before the
/// next tick is awaited, so cycles never overlap; one that overruns the
/// period delays the following tick instead of bunching them up.
pub struct RefreshScheduler<Tz: TimeZone> {
    source: Arc<dyn MarketDataSource>,
    presenter: Arc<dyn Presenter>,
    tz: Tz,
    vat_multiplier: f64,
    state: RwLock<RefreshState>,
    status: RwLock<TaskStatus>,
}

impl<Tz> RefreshScheduler<Tz>
where
    Tz: TimeZone + Send + Sync + 'static,
    Tz::Offset: Send + Sync + Display,
{
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        presenter: Arc<dyn Presenter>,
        tz: Tz,
        vat_multiplier: f64,
    ) -> Self {
        Self {
            source,
            presenter,
            tz,
            vat_multiplier,
            state: RwLock::new(RefreshState::Idle),
            status: RwLock::new(TaskStatus::default()),
        }
    }

    /// Run one cycle now and spawn the periodic loop behind it. Closing
    /// during the first cycle abandons it and skips the loop.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    *self.state.write().await = RefreshState::Idle;
                    info!("shutdown during initial refresh");
                    return;
                }
                _ = self.refresh_tick() => {}
            }
            self.run(shutdown).await;
        })
    }

    /// Periodic loop; the first tick is one full period from now
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + REFRESH_PERIOD, REFRESH_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(period_secs = REFRESH_PERIOD.as_secs(), "refresh loop started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => self.refresh_tick().await,
            }
        }
        info!("refresh loop stopped");
    }

    /// One fetch + normalize cycle. On success the view is published; on
    /// failure nothing is published and the previous view stays on screen.
    pub async fn refresh_once(&self) -> Result<Arc<ViewModel>, RefreshError> {
        *self.state.write().await = RefreshState::Refreshing;
        let started = Utc::now();
        {
            let mut status = self.status.write().await;
            status.last_run = Some(started);
            status.run_count += 1;
        }

        let result = self.fetch_and_normalize(started).await;

        match &result {
            Ok(view) => {
                self.presenter.update_ui(view.clone());
                let mut status = self.status.write().await;
                status.last_success = Some(started);
                status.success_count += 1;
                status.last_error = None;
                info!(
                    samples = view.hourly_series.len(),
                    current = %view.current_rate_cents,
                    "prices refreshed"
                );
            }
            Err(e) => {
                let mut status = self.status.write().await;
                status.error_count += 1;
                status.last_error = Some(e.to_string());
                warn!(error = %e, "price refresh skipped, keeping last view");
            }
        }

        *self.state.write().await = RefreshState::Idle;
        result
    }

    /// A loop-driven cycle. The error was already counted and logged by
    /// `refresh_once`; the next tick is the retry.
    async fn refresh_tick(&self) {
        if let Err(e) = self.refresh_once().await {
            debug!(error = %e, "waiting for next tick");
        }
    }

    async fn fetch_and_normalize(
        &self,
        reference: DateTime<Utc>,
    ) -> Result<Arc<ViewModel>, RefreshError> {
        let records = self.source.fetch(reference).await?;
        debug!(records = records.len(), "normalizing");
        let now = Utc::now().with_timezone(&self.tz);
        normalize(&records, &now, self.vat_multiplier)
            .map(Arc::new)
            .ok_or(RefreshError::EmptyData {
                records: records.len(),
            })
    }

    pub async fn state(&self) -> RefreshState {
        *self.state.read().await
    }

    pub async fn status(&self) -> TaskStatus {
        self.status.read().await.clone()
    }

    pub fn period(&self) -> Duration {
        REFRESH_PERIOD
    }
}
