//! Contract validation — per-record checks and compatibility-mode coercion.
//!
//! Validation failure is always per-record: violations are accumulated and
//! reported, never raised for the batch as a whole. Whether a batch is fit
//! for downstream layers is the DQ gate's decision, not the validator's.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::contract::{Compatibility, Contract, LogicalType};
use crate::domain::RawEvent;

/// A loosely-typed record as handed over by an ingestion connector.
pub type RawPayload = Map<String, Value>;

/// Fallback `source` tag for producers that do not set one.
pub const DEFAULT_SOURCE: &str = "stooq";

/// Why a record was dropped during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationReason {
    MissingField,
    NullField,
    TypeMismatch,
}

/// One per-record validation failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub event_id: Option<String>,
    pub field: String,
    pub reason: ViolationReason,
}

/// Split of a raw batch into typed events and per-record violations.
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    pub events: Vec<RawEvent>,
    pub violations: Vec<Violation>,
}

/// Check every payload against the contract.
///
/// Order of checks per record: required-field presence, declared-type
/// conformance, then typed extraction. The first failed check drops the
/// record and records the reason.
pub fn validate(payloads: &[RawPayload], contract: &Contract) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    for payload in payloads {
        match check_record(payload, contract) {
            Ok(event) => outcome.events.push(event),
            Err(violation) => outcome.violations.push(violation),
        }
    }
    outcome
}

fn check_record(payload: &RawPayload, contract: &Contract) -> Result<RawEvent, Violation> {
    let id = payload
        .get("event_id")
        .and_then(Value::as_str)
        .map(str::to_owned);
    let compat = contract.compatibility;

    for field in &contract.required_fields {
        match payload.get(field) {
            None => return Err(violation(&id, field, ViolationReason::MissingField)),
            Some(Value::Null) => return Err(violation(&id, field, ViolationReason::NullField)),
            Some(_) => {}
        }
    }

    // Declared-type conformance over every present field, not only the ones
    // the typed record needs. Compatibility::None skips this entirely.
    if compat != Compatibility::None {
        for (field, ty) in &contract.field_types {
            if let Some(value) = payload.get(field) {
                if !value.is_null() && !coercible(value, *ty, compat) {
                    return Err(violation(&id, field, ViolationReason::TypeMismatch));
                }
            }
        }
    }

    Ok(RawEvent {
        event_id: field_string(payload, "event_id", &id, compat)?,
        symbol: field_string(payload, "symbol", &id, compat)?,
        price: field_float(payload, "price", &id, compat)?,
        volume: field_int(payload, "volume", &id, compat)?,
        ts_event: field_timestamp(payload, "ts_event", &id, compat)?,
        ts_ingest: field_timestamp(payload, "ts_ingest", &id, compat)?,
        source: match payload.get("source") {
            None | Some(Value::Null) => DEFAULT_SOURCE.to_string(),
            Some(value) => coerce_string(value)
                .ok_or_else(|| violation(&id, "source", ViolationReason::TypeMismatch))?,
        },
    })
}

fn violation(event_id: &Option<String>, field: &str, reason: ViolationReason) -> Violation {
    Violation {
        event_id: event_id.clone(),
        field: field.to_string(),
        reason,
    }
}

fn coercible(value: &Value, ty: LogicalType, compat: Compatibility) -> bool {
    match ty {
        LogicalType::Str => coerce_string(value).is_some(),
        LogicalType::Float => coerce_float(value, compat).is_some(),
        LogicalType::Int => coerce_int(value, compat).is_some(),
        LogicalType::Timestamp => coerce_timestamp(value, compat).is_some(),
    }
}

// ── Field extraction ────────────────────────────────────────────────

fn get_present<'v>(
    payload: &'v RawPayload,
    field: &str,
    id: &Option<String>,
) -> Result<&'v Value, Violation> {
    match payload.get(field) {
        None => Err(violation(id, field, ViolationReason::MissingField)),
        Some(Value::Null) => Err(violation(id, field, ViolationReason::NullField)),
        Some(value) => Ok(value),
    }
}

fn field_string(
    payload: &RawPayload,
    field: &str,
    id: &Option<String>,
    _compat: Compatibility,
) -> Result<String, Violation> {
    coerce_string(get_present(payload, field, id)?)
        .ok_or_else(|| violation(id, field, ViolationReason::TypeMismatch))
}

fn field_float(
    payload: &RawPayload,
    field: &str,
    id: &Option<String>,
    compat: Compatibility,
) -> Result<f64, Violation> {
    coerce_float(get_present(payload, field, id)?, compat)
        .ok_or_else(|| violation(id, field, ViolationReason::TypeMismatch))
}

fn field_int(
    payload: &RawPayload,
    field: &str,
    id: &Option<String>,
    compat: Compatibility,
) -> Result<u64, Violation> {
    coerce_int(get_present(payload, field, id)?, compat)
        .ok_or_else(|| violation(id, field, ViolationReason::TypeMismatch))
}

fn field_timestamp(
    payload: &RawPayload,
    field: &str,
    id: &Option<String>,
    compat: Compatibility,
) -> Result<DateTime<Utc>, Violation> {
    coerce_timestamp(get_present(payload, field, id)?, compat)
        .ok_or_else(|| violation(id, field, ViolationReason::TypeMismatch))
}

// ── Coercion ────────────────────────────────────────────────────────
//
// Strict accepts only the canonical JSON encoding of each logical type
// (timestamps are RFC 3339 strings). The lenient modes additionally accept
// the safe conversions: numeric string → number, integral float → int,
// epoch milliseconds → timestamp. Nothing is ever stringified silently.

fn lenient(compat: Compatibility) -> bool {
    compat != Compatibility::Strict
}

fn coerce_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_owned)
}

fn coerce_float(value: &Value, compat: Compatibility) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if lenient(compat) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_int(value: &Value, compat: Compatibility) -> Option<u64> {
    match value {
        Value::Number(n) => match n.as_u64() {
            Some(v) => Some(v),
            None if lenient(compat) => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64),
            None => None,
        },
        Value::String(s) if lenient(compat) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_timestamp(value: &Value, compat: Compatibility) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Value::Number(n) if lenient(compat) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}
