//! Windowed aggregation — per-(symbol, window) return, volatility, risk score.
//!
//! Every metric here is a pure function of the silver set. Volatility is the
//! sample (n−1) standard deviation of consecutive per-event returns, and the
//! risk score uses a fixed weighting, so identical input reproduces identical
//! gold rows on every run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::SilverEvent;

const RISK_WEIGHT_VOLATILITY: f64 = 0.7;
const RISK_WEIGHT_RETURN: f64 = 0.3;

/// One gold-layer row per `(symbol, window_start)` bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskSummaryRow {
    pub symbol: String,
    pub window_start: DateTime<Utc>,
    pub event_count: u64,
    pub open_price: f64,
    pub close_price: f64,
    pub window_return: f64,
    pub volatility: Option<f64>,
    pub risk_score: f64,
    pub contract_version: String,
    pub run_id: String,
}

/// Aggregate silver events into per-window risk summaries.
///
/// Buckets are keyed by `(symbol, window_start)`; events inside a bucket are
/// ordered by `(ts_event, event_id)`. Buckets with zero or one observation
/// are degenerate, not an error: return 0, volatility absent.
pub fn aggregate(
    silver: &[SilverEvent],
    contract_version: &str,
    run_id: &str,
) -> Vec<RiskSummaryRow> {
    let mut buckets: BTreeMap<(&str, DateTime<Utc>), Vec<&SilverEvent>> = BTreeMap::new();
    for event in silver {
        buckets
            .entry((event.symbol.as_str(), event.window_start))
            .or_default()
            .push(event);
    }

    buckets
        .into_iter()
        .map(|((symbol, window_start), mut events)| {
            events.sort_by(|a, b| {
                (a.ts_event, a.event_id.as_str()).cmp(&(b.ts_event, b.event_id.as_str()))
            });
            let prices: Vec<f64> = events.iter().map(|e| e.price).collect();
            let window_return = window_return(&prices);
            let volatility = volatility(&prices);
            RiskSummaryRow {
                symbol: symbol.to_string(),
                window_start,
                event_count: prices.len() as u64,
                open_price: prices.first().copied().unwrap_or(0.0),
                close_price: prices.last().copied().unwrap_or(0.0),
                window_return,
                volatility,
                risk_score: risk_score(window_return, volatility),
                contract_version: contract_version.to_string(),
                run_id: run_id.to_string(),
            }
        })
        .collect()
}

/// Relative price change from the first to the last observation.
///
/// Degenerate windows (fewer than two prices, or a zero first price)
/// return 0 rather than failing.
pub fn window_return(prices: &[f64]) -> f64 {
    if prices.len() < 2 {
        return 0.0;
    }
    let first = prices[0];
    if first == 0.0 {
        return 0.0;
    }
    (prices[prices.len() - 1] - first) / first
}

/// Sample standard deviation of consecutive per-event returns.
///
/// `None` until the window holds at least two returns (three prices) —
/// a single return has no dispersion to measure.
pub fn volatility(prices: &[f64]) -> Option<f64> {
    let returns = per_event_returns(prices);
    if returns.len() < 2 {
        return None;
    }
    Some(std_dev_sample(&returns))
}

/// Coarse risk score: `0.7 · volatility + 0.3 · |window_return|`.
///
/// Absent volatility contributes 0. Pure by construction — no external
/// state feeds the score.
pub fn risk_score(window_return: f64, volatility: Option<f64>) -> f64 {
    RISK_WEIGHT_VOLATILITY * volatility.unwrap_or(0.0)
        + RISK_WEIGHT_RETURN * window_return.abs()
}

fn per_event_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .filter(|pair| pair[0] != 0.0)
        .map(|pair| (pair[1] - pair[0]) / pair[0])
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev_sample(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::normalize::normalize;
    use crate::window::WindowSpec;
    use crate::domain::RawEvent;

    fn silver_event(event_id: &str, symbol: &str, minute: u32, price: f64) -> SilverEvent {
        let raw = RawEvent {
            event_id: event_id.into(),
            symbol: symbol.into(),
            price,
            volume: 10,
            ts_event: Utc.with_ymd_and_hms(2025, 1, 20, 10, minute, 0).unwrap(),
            ts_ingest: Utc.with_ymd_and_hms(2025, 1, 20, 10, minute, 2).unwrap(),
            source: "stooq".into(),
        };
        normalize(&[raw], "v1", WindowSpec::FIVE_MINUTES)
            .pop()
            .unwrap()
    }

    #[test]
    fn single_event_bucket_is_degenerate() {
        let rows = aggregate(&[silver_event("evt-1", "AAPL", 1, 100.0)], "v1", "run-1");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_count, 1);
        assert_eq!(rows[0].window_return, 0.0);
        assert_eq!(rows[0].volatility, None);
        assert_eq!(rows[0].risk_score, 0.0);
    }

    #[test]
    fn two_events_yield_return_but_no_volatility() {
        let silver = vec![
            silver_event("evt-1", "AAPL", 1, 100.0),
            silver_event("evt-2", "AAPL", 2, 110.0),
        ];
        let rows = aggregate(&silver, "v1", "run-1");
        assert_eq!(rows.len(), 1);
        assert!((rows[0].window_return - 0.1).abs() < 1e-12);
        assert_eq!(rows[0].volatility, None);
    }

    #[test]
    fn three_events_yield_sample_volatility() {
        let silver = vec![
            silver_event("evt-1", "AAPL", 1, 100.0),
            silver_event("evt-2", "AAPL", 2, 110.0),
            silver_event("evt-3", "AAPL", 3, 99.0),
        ];
        let rows = aggregate(&silver, "v1", "run-1");
        // returns: 0.1 and -0.1, sample std dev = 0.1414...
        let vol = rows[0].volatility.unwrap();
        assert!((vol - (0.02f64).sqrt()).abs() < 1e-12);
        assert!((rows[0].window_return - (-0.01)).abs() < 1e-12);
    }

    #[test]
    fn buckets_split_by_symbol_and_window() {
        let silver = vec![
            silver_event("evt-1", "AAPL", 1, 100.0),
            silver_event("evt-2", "MSFT", 1, 240.0),
            silver_event("evt-3", "AAPL", 7, 101.0),
        ];
        let rows = aggregate(&silver, "v1", "run-1");
        assert_eq!(rows.len(), 3);
        // BTreeMap keys give a deterministic symbol-then-window order
        assert_eq!(rows[0].symbol, "AAPL");
        assert_eq!(rows[1].symbol, "AAPL");
        assert_eq!(rows[2].symbol, "MSFT");
        assert!(rows[0].window_start < rows[1].window_start);
    }

    #[test]
    fn risk_score_weighs_volatility_and_return() {
        let score = risk_score(-0.2, Some(0.1));
        assert!((score - (0.7 * 0.1 + 0.3 * 0.2)).abs() < 1e-12);
        assert_eq!(risk_score(0.0, None), 0.0);
    }

    #[test]
    fn zero_first_price_does_not_divide() {
        assert_eq!(window_return(&[0.0, 10.0]), 0.0);
    }

    #[test]
    fn rows_carry_run_and_contract_tags() {
        let rows = aggregate(&[silver_event("evt-1", "AAPL", 1, 100.0)], "v2", "run-42");
        assert_eq!(rows[0].contract_version, "v2");
        assert_eq!(rows[0].run_id, "run-42");
    }
}
