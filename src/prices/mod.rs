pub mod elering;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use thiserror::Error;

use crate::domain::RawPriceRecord;

pub use elering::EleringPriceSource;

/// Anything that went wrong getting a day's prices.
///
/// Callers only need to know that the fetch failed; the variants exist for
/// diagnostics.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("price request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("price API error: HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("price JSON parse failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("price API reported an unsuccessful response")]
    Rejected,

    #[error("no prices for region '{0}' in response")]
    MissingRegion(String),

    #[error("cannot resolve local midnight for {0}")]
    InvalidWindow(NaiveDate),
}

/// Single-shot fetch of one local day of day-ahead prices
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch the records for the local day containing `reference`, in upstream
    /// order and unfiltered. No retries.
    async fn fetch(&self, reference: DateTime<Utc>) -> Result<Vec<RawPriceRecord>, FetchError>;
}

/// UTC bounds of one local calendar day, midnight to one second before the
/// next midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn containing<Tz: TimeZone>(reference: &DateTime<Tz>) -> Result<Self, FetchError> {
        let tz = reference.timezone();
        let date = reference.date_naive();
        let next = date.succ_opt().ok_or(FetchError::InvalidWindow(date))?;

        let start = local_midnight(&tz, date).ok_or(FetchError::InvalidWindow(date))?;
        let next_start = local_midnight(&tz, next).ok_or(FetchError::InvalidWindow(next))?;

        Ok(Self {
            start,
            end: next_start - Duration::seconds(1),
        })
    }

    /// Timestamps in the form the NPS API accepts, e.g. `2024-01-14T22:00:00.000Z`
    pub fn query_bounds(&self) -> (String, String) {
        const FMT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
        (
            self.start.format(FMT).to_string(),
            self.end.format(FMT).to_string(),
        )
    }
}

/// Start of `date` in `tz`. Zones that skip midnight on a DST change start
/// the day at the first valid instant after the gap.
fn local_midnight<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(midnight + Duration::hours(1)))
                .earliest()
        })
        .map(|dt| dt.with_timezone(&Utc))
}
