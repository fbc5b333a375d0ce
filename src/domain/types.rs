use chrono::{DateTime, FixedOffset, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Unit Conversion
// ============================================================================

/// Euro per MWh to euro cents per kWh: 1 €/MWh = 0.1 c/kWh
const MWH_TO_KWH_CENTS_DIVISOR: f64 = 10.0;

/// Round to two decimal places, the precision every display field uses
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Convert a wholesale €/MWh price to a retail c/kWh rate including VAT.
///
/// Not rounded; callers round once at the point of display.
pub fn rate_cents_per_kwh(price_per_mwh: f64, vat_multiplier: f64) -> f64 {
    (price_per_mwh / MWH_TO_KWH_CENTS_DIVISOR) * vat_multiplier
}

/// Format with exactly two decimals, rounding the unrounded value once
pub fn format2(value: f64) -> String {
    format!("{:.2}", value)
}

// ============================================================================
// Market Data
// ============================================================================

/// One interval as reported by the upstream day-ahead feed
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPriceRecord {
    pub timestamp_utc_seconds: i64,
    pub price_per_mwh: f64,
}

impl RawPriceRecord {
    pub fn new(timestamp_utc_seconds: i64, price_per_mwh: f64) -> Self {
        Self {
            timestamp_utc_seconds,
            price_per_mwh,
        }
    }

    /// The record's start instant in `tz`; `None` if the timestamp is out of range
    pub fn local_time<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        DateTime::<Utc>::from_timestamp(self.timestamp_utc_seconds, 0)
            .map(|utc| utc.with_timezone(tz))
    }
}

/// A top-of-hour price sample ready for display.
///
/// Carries both the numeric values (chart scaling) and the preformatted
/// strings (labels, tooltips) so a serialized series needs no client-side
/// formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySample {
    /// Local hour of day, 0-23
    pub hour: u32,
    /// Axis label, e.g. "07:00"
    pub hour_label: String,
    /// Retail rate in c/kWh incl. VAT, rounded to 2 decimals
    pub rate_cents: f64,
    pub rate_display: String,
    /// Raw wholesale price in €/MWh, unrounded
    pub price_per_mwh: f64,
    pub price_display: String,
    pub starts_at: DateTime<FixedOffset>,
}

impl HourlySample {
    pub fn from_local<Tz: TimeZone>(
        starts_at: &DateTime<Tz>,
        price_per_mwh: f64,
        vat_multiplier: f64,
    ) -> Self {
        let rate = rate_cents_per_kwh(price_per_mwh, vat_multiplier);
        let hour = starts_at.hour();
        Self {
            hour,
            hour_label: format!("{:02}:00", hour),
            rate_cents: round2(rate),
            rate_display: format2(rate),
            price_per_mwh,
            price_display: format2(price_per_mwh),
            starts_at: starts_at.fixed_offset(),
        }
    }
}

impl fmt::Display for HourlySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} c/kWh ({} €/MWh)",
            self.hour_label, self.rate_display, self.price_display
        )
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
