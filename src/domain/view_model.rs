use serde::{Deserialize, Serialize};

use super::types::HourlySample;

/// Shown in place of a price that is not (yet) known
pub const PLACEHOLDER: &str = "--.--";

/// Display-ready snapshot of one successful refresh.
///
/// Built once per cycle and replaced wholesale by the next one. Every price
/// field is a fixed two-decimal string; `hourly_series` keeps the numeric
/// values for chart and tooltip use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    pub current_rate_cents: String,
    pub current_price_per_mwh: String,
    pub min_rate_cents: String,
    pub min_price_per_mwh: String,
    pub avg_rate_cents: String,
    pub avg_price_per_mwh: String,
    pub max_rate_cents: String,
    pub max_price_per_mwh: String,
    pub hourly_series: Vec<HourlySample>,
    pub fetched_at_local_time: String,
}

impl ViewModel {
    pub fn has_current_price(&self) -> bool {
        self.current_rate_cents != PLACEHOLDER
    }

    /// JSON payload in the shape a web front end's `updateUI` expects
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
