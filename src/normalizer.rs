//! Raw feed records to a display-ready [`ViewModel`].
//!
//! Only top-of-hour records survive; sub-hourly granularity is dropped. Stats
//! are computed on unrounded €/MWh values and converted once at the end so
//! rounding never compounds.

use chrono::{DateTime, TimeZone, Timelike};

use crate::domain::{
    format2, rate_cents_per_kwh, HourlySample, RawPriceRecord, ViewModel, PLACEHOLDER,
};

/// min / mean / max over raw €/MWh prices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceStats {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}

impl PriceStats {
    /// `None` for an empty slice
    pub fn from_prices(prices: &[f64]) -> Option<Self> {
        if prices.is_empty() {
            return None;
        }
        let (min, max, sum) = prices.iter().fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(min, max, sum), &p| (min.min(p), max.max(p), sum + p),
        );
        // Keep the mean inside [min, max] despite float summation error
        let avg = (sum / prices.len() as f64).clamp(min, max);
        Some(Self { min, avg, max })
    }
}

/// Keep one sample per top-of-hour instant, in input order.
///
/// A repeated instant overwrites the earlier sample in place. Distinct
/// instants sharing an hour of day (the repeated hour when DST ends) are both
/// kept, so a day can have 23, 24 or 25 samples.
pub fn hourly_samples<Tz: TimeZone>(
    records: &[RawPriceRecord],
    tz: &Tz,
    vat_multiplier: f64,
) -> Vec<HourlySample> {
    let mut samples: Vec<HourlySample> = Vec::with_capacity(25);
    for record in records {
        let Some(local) = record.local_time(tz) else {
            continue;
        };
        if local.minute() != 0 || local.second() != 0 {
            continue;
        }
        let sample = HourlySample::from_local(&local, record.price_per_mwh, vat_multiplier);
        match samples.iter_mut().find(|s| s.starts_at == sample.starts_at) {
            Some(existing) => *existing = sample,
            None => samples.push(sample),
        }
    }
    samples
}

/// The sample displayed as "now": same hour of day as `now`. When the hour
/// occurs twice, the one covering `now` wins, else the last match.
fn current_sample<'a, Tz: TimeZone>(
    samples: &'a [HourlySample],
    now: &DateTime<Tz>,
) -> Option<&'a HourlySample> {
    let hour = now.hour();
    let now_ts = now.timestamp();
    let mut last = None;
    for sample in samples.iter().filter(|s| s.hour == hour) {
        let start = sample.starts_at.timestamp();
        if (start..start + 3600).contains(&now_ts) {
            return Some(sample);
        }
        last = Some(sample);
    }
    last
}

/// Build the view for `now`. `None` when no top-of-hour sample survives,
/// which callers treat the same as a failed fetch.
pub fn normalize<Tz: TimeZone>(
    records: &[RawPriceRecord],
    now: &DateTime<Tz>,
    vat_multiplier: f64,
) -> Option<ViewModel>
where
    Tz::Offset: std::fmt::Display,
{
    let samples = hourly_samples(records, &now.timezone(), vat_multiplier);
    let prices: Vec<f64> = samples.iter().map(|s| s.price_per_mwh).collect();
    let stats = PriceStats::from_prices(&prices)?;

    let (current_rate_cents, current_price_per_mwh) = match current_sample(&samples, now) {
        Some(s) => (s.rate_display.clone(), s.price_display.clone()),
        None => (PLACEHOLDER.to_string(), PLACEHOLDER.to_string()),
    };
    let rate = |mwh: f64| format2(rate_cents_per_kwh(mwh, vat_multiplier));

    Some(ViewModel {
        current_rate_cents,
        current_price_per_mwh,
        min_rate_cents: rate(stats.min),
        min_price_per_mwh: format2(stats.min),
        avg_rate_cents: rate(stats.avg),
        avg_price_per_mwh: format2(stats.avg),
        max_rate_cents: rate(stats.max),
        max_price_per_mwh: format2(stats.max),
        hourly_series: samples,
        fetched_at_local_time: now.format("%H:%M:%S").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::round2;
    use chrono::{FixedOffset, Utc};
    use chrono_tz::Europe::Tallinn;
    use proptest::prelude::*;
    use rstest::rstest;

    const VAT: f64 = 1.24;
    // 2024-01-15T00:00:00Z
    const DAY: i64 = 1_705_276_800;

    fn utc_at(hour: i64, minute: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(DAY + hour * 3600 + minute * 60, 0).unwrap()
    }

    fn full_day() -> Vec<RawPriceRecord> {
        (0..24)
            .map(|h| RawPriceRecord::new(DAY + h * 3600, 40.0 + h as f64 * 2.5))
            .collect()
    }

    #[test]
    fn test_end_to_end_example() {
        let records = vec![
            RawPriceRecord::new(DAY, 50.0),
            RawPriceRecord::new(DAY + 3600, 100.0),
            RawPriceRecord::new(DAY + 1800, 999.0),
        ];
        let view = normalize(&records, &utc_at(1, 20), VAT).unwrap();

        assert_eq!(view.hourly_series.len(), 2);
        assert_eq!(view.avg_price_per_mwh, "75.00");
        assert_eq!(view.current_rate_cents, "12.40");
        assert_eq!(view.current_price_per_mwh, "100.00");
        assert_eq!(view.min_rate_cents, "6.20");
        assert_eq!(view.max_rate_cents, "12.40");
        assert_eq!(view.min_price_per_mwh, "50.00");
        assert_eq!(view.max_price_per_mwh, "100.00");
        assert_eq!(view.avg_rate_cents, "9.30");
        assert_eq!(view.fetched_at_local_time, "01:20:00");
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(normalize(&[], &utc_at(12, 0), VAT).is_none());
    }

    #[test]
    fn test_only_sub_hourly_input_yields_nothing() {
        let records = vec![
            RawPriceRecord::new(DAY + 900, 10.0),
            RawPriceRecord::new(DAY + 1800, 20.0),
            RawPriceRecord::new(DAY + 3600 + 45 * 60, 30.0),
            RawPriceRecord::new(DAY + 1, 40.0),
        ];
        assert!(normalize(&records, &utc_at(0, 0), VAT).is_none());
    }

    #[test]
    fn test_quarter_hour_feed_is_reduced_to_hours() {
        let records: Vec<_> = (0..96)
            .map(|q| RawPriceRecord::new(DAY + q * 900, q as f64))
            .collect();
        let view = normalize(&records, &utc_at(5, 0), VAT).unwrap();
        let hours: Vec<u32> = view.hourly_series.iter().map(|s| s.hour).collect();
        assert_eq!(hours, (0..24).collect::<Vec<_>>());
        assert_eq!(view.current_price_per_mwh, "20.00");
    }

    #[rstest]
    #[case(14, "9.30")]
    #[case(0, "4.96")]
    #[case(23, "12.09")]
    fn test_current_hour_match(#[case] hour: i64, #[case] expected: &str) {
        let view = normalize(&full_day(), &utc_at(hour, 30), VAT).unwrap();
        let sample = &view.hourly_series[hour as usize];
        assert_eq!(view.current_rate_cents, expected);
        assert_eq!(view.current_rate_cents, sample.rate_display);
        assert!(view.has_current_price());
    }

    #[test]
    fn test_missing_current_hour_shows_placeholder() {
        let records: Vec<_> = full_day()
            .into_iter()
            .filter(|r| r.timestamp_utc_seconds != DAY + 14 * 3600)
            .collect();
        let view = normalize(&records, &utc_at(14, 10), VAT).unwrap();
        assert_eq!(view.current_rate_cents, PLACEHOLDER);
        assert_eq!(view.current_price_per_mwh, PLACEHOLDER);
        assert!(!view.has_current_price());
        assert_eq!(view.hourly_series.len(), 23);
    }

    #[test]
    fn test_filter_uses_local_time() {
        // +05:30 shifts UTC hour boundaries onto half hours
        let india = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let now = utc_at(3, 0).with_timezone(&india);
        let on_utc_hours = vec![
            RawPriceRecord::new(DAY, 1.0),
            RawPriceRecord::new(DAY + 3600, 2.0),
        ];
        assert!(normalize(&on_utc_hours, &now, VAT).is_none());

        let on_local_hours = vec![RawPriceRecord::new(DAY + 1800, 3.0)];
        let view = normalize(&on_local_hours, &now, VAT).unwrap();
        assert_eq!(view.hourly_series[0].hour, 6);
    }

    #[test]
    fn test_repeated_instant_last_write_wins() {
        let records = vec![
            RawPriceRecord::new(DAY, 10.0),
            RawPriceRecord::new(DAY + 3600, 20.0),
            RawPriceRecord::new(DAY, 30.0),
        ];
        let view = normalize(&records, &utc_at(0, 0), VAT).unwrap();
        assert_eq!(view.hourly_series.len(), 2);
        assert_eq!(view.hourly_series[0].price_per_mwh, 30.0);
        assert_eq!(view.hourly_series[0].hour, 0);
        assert_eq!(view.current_price_per_mwh, "30.00");
    }

    #[test]
    fn test_series_keeps_input_order() {
        let records = vec![
            RawPriceRecord::new(DAY + 2 * 3600, 1.0),
            RawPriceRecord::new(DAY, 2.0),
            RawPriceRecord::new(DAY + 3600, 3.0),
        ];
        let view = normalize(&records, &utc_at(0, 0), VAT).unwrap();
        let hours: Vec<u32> = view.hourly_series.iter().map(|s| s.hour).collect();
        assert_eq!(hours, vec![2, 0, 1]);
    }

    #[test]
    fn test_fall_back_day_keeps_both_repeated_hours() {
        // Tallinn 2024-10-27: 04:00 EEST -> 03:00 EET, hour 3 happens twice
        let start = Tallinn.with_ymd_and_hms(2024, 10, 27, 0, 0, 0).unwrap().timestamp();
        let records: Vec<_> = (0..25)
            .map(|h| RawPriceRecord::new(start + h * 3600, h as f64))
            .collect();

        // second 03:xx, after the clocks went back
        let now = DateTime::from_timestamp(start + 4 * 3600 + 600, 0)
            .unwrap()
            .with_timezone(&Tallinn);
        assert_eq!(now.hour(), 3);

        let view = normalize(&records, &now, VAT).unwrap();
        assert_eq!(view.hourly_series.len(), 25);
        assert_eq!(view.hourly_series.iter().filter(|s| s.hour == 3).count(), 2);
        assert_eq!(view.current_price_per_mwh, "4.00");
    }

    #[test]
    fn test_spring_forward_day_has_23_samples() {
        let start = Tallinn.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap().timestamp();
        let records: Vec<_> = (0..23)
            .map(|h| RawPriceRecord::new(start + h * 3600, 50.0))
            .collect();
        let now = Tallinn.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        let view = normalize(&records, &now, VAT).unwrap();
        assert_eq!(view.hourly_series.len(), 23);
        assert!(view.hourly_series.iter().all(|s| s.hour != 3));
        assert_eq!(view.current_rate_cents, "6.20");
    }

    #[test]
    fn test_negative_prices() {
        let records = vec![
            RawPriceRecord::new(DAY, -5.0),
            RawPriceRecord::new(DAY + 3600, 15.0),
        ];
        let view = normalize(&records, &utc_at(0, 0), VAT).unwrap();
        assert_eq!(view.min_price_per_mwh, "-5.00");
        assert_eq!(view.min_rate_cents, "-0.62");
        assert_eq!(view.current_rate_cents, "-0.62");
        assert_eq!(view.avg_price_per_mwh, "5.00");
    }

    #[test]
    fn test_average_rounds_half_to_even_once() {
        // mean 10.125 €/MWh is an exact binary tie
        let records = vec![
            RawPriceRecord::new(DAY, 10.0),
            RawPriceRecord::new(DAY + 3600, 10.25),
        ];
        let view = normalize(&records, &utc_at(0, 0), VAT).unwrap();
        assert_eq!(view.avg_price_per_mwh, "10.12");
        assert_eq!(view.hourly_series[1].price_display, "10.25");
    }

    #[test]
    fn test_stats_empty() {
        assert!(PriceStats::from_prices(&[]).is_none());
    }

    #[test]
    fn test_stats_single_value() {
        let stats = PriceStats::from_prices(&[42.0]).unwrap();
        assert_eq!(stats, PriceStats { min: 42.0, avg: 42.0, max: 42.0 });
    }

    fn arb_day() -> impl Strategy<Value = Vec<(i64, f64)>> {
        prop::collection::vec((0i64..24 * 4, -500.0f64..4000.0), 0..120)
    }

    proptest! {
        #[test]
        fn prop_series_len_matches_hour_boundaries(entries in arb_day()) {
            let mut seen = std::collections::HashSet::new();
            let records: Vec<_> = entries
                .iter()
                .map(|&(q, p)| RawPriceRecord::new(DAY + q * 900, p))
                .collect();
            for r in &records {
                if (r.timestamp_utc_seconds - DAY) % 3600 == 0 {
                    seen.insert(r.timestamp_utc_seconds);
                }
            }
            match normalize(&records, &utc_at(12, 0), VAT) {
                Some(view) => {
                    prop_assert_eq!(view.hourly_series.len(), seen.len());
                }
                None => {
                    prop_assert!(seen.is_empty());
                }
            }
        }

        #[test]
        fn prop_sample_rate_matches_conversion(entries in arb_day()) {
            let records: Vec<_> = entries
                .iter()
                .map(|&(q, p)| RawPriceRecord::new(DAY + q * 900, p))
                .collect();
            if let Some(view) = normalize(&records, &utc_at(12, 0), VAT) {
                for s in &view.hourly_series {
                    prop_assert_eq!(s.rate_cents, round2((s.price_per_mwh / 10.0) * VAT));
                }
            }
        }

        #[test]
        fn prop_min_avg_max_ordered(prices in prop::collection::vec(-500.0f64..4000.0, 1..30)) {
            let records: Vec<_> = prices
                .iter()
                .enumerate()
                .map(|(h, &p)| RawPriceRecord::new(DAY + h as i64 * 3600, p))
                .collect();
            let view = normalize(&records, &utc_at(0, 0), VAT).unwrap();
            let min: f64 = view.min_price_per_mwh.parse().unwrap();
            let avg: f64 = view.avg_price_per_mwh.parse().unwrap();
            let max: f64 = view.max_price_per_mwh.parse().unwrap();
            prop_assert!(min <= avg && avg <= max);

            let stats = PriceStats::from_prices(&prices).unwrap();
            prop_assert!(stats.min <= stats.avg && stats.avg <= stats.max);
        }
    }
}
