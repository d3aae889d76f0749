//! Deduplication and normalization — validated events become the silver set.

use std::collections::BTreeMap;

use crate::domain::{RawEvent, SilverEvent};
use crate::window::{floor_to_window, WindowSpec};

/// Canonical symbol form: trimmed, uppercased.
pub fn canonical_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

/// Deduplicate by `event_id` and normalize into silver events.
///
/// Survivor per duplicate id: the record with the earliest `ts_ingest`; on
/// equal ingest times the first occurrence in input order wins, so reruns
/// over identical input always pick the same record. Output is sorted by
/// `(ts_event, event_id)` and is guaranteed to hold each `event_id` once.
pub fn normalize(
    events: &[RawEvent],
    contract_version: &str,
    window: WindowSpec,
) -> Vec<SilverEvent> {
    let mut survivors: BTreeMap<&str, &RawEvent> = BTreeMap::new();
    for event in events {
        match survivors.get(event.event_id.as_str()) {
            Some(kept) if kept.ts_ingest <= event.ts_ingest => {}
            _ => {
                survivors.insert(event.event_id.as_str(), event);
            }
        }
    }

    let mut silver: Vec<SilverEvent> = survivors
        .into_values()
        .map(|event| SilverEvent {
            event_id: event.event_id.clone(),
            symbol: canonical_symbol(&event.symbol),
            price: event.price,
            volume: event.volume,
            ts_event: event.ts_event,
            ts_ingest: event.ts_ingest,
            source: event.source.clone(),
            contract_version: contract_version.to_string(),
            window_start: floor_to_window(event.ts_event, window),
        })
        .collect();
    silver.sort_by(|a, b| {
        (a.ts_event, a.event_id.as_str()).cmp(&(b.ts_event, b.event_id.as_str()))
    });
    silver
}
