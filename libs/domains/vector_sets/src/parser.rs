//! Reply parsing
//!
//! Each operation has a dedicated parser over the raw [`redis::Value`]. Whole-reply shape
//! problems are [`GatewayError::Protocol`]; individual malformed items inside an otherwise
//! valid list reply are dropped (or zeroed, for vector components) with a warning and the
//! call still succeeds.
//!
//! Both RESP2 (flat `[k, v, k, v]` arrays) and RESP3 (maps) reply shapes are accepted.

use redis::Value;
use tracing::warn;

use crate::error::{GatewayError, GatewayResult};
use crate::metrics;
use crate::models::{InfoValue, NeighborLevels, VectorSetInfo, VectorTuple};

/// Text of a string-like reply item.
pub fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::BulkString(bytes) => Some(String::from_utf8_lossy(bytes).to_string()),
        Value::SimpleString(s) => Some(s.clone()),
        Value::VerbatimString { text, .. } => Some(text.clone()),
        Value::Okay => Some("OK".to_string()),
        Value::Int(n) => Some(n.to_string()),
        Value::Double(d) => Some(d.to_string()),
        _ => None,
    }
}

/// Numeric value of a reply item; numeric-looking strings are coerced.
pub fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Double(d) => Some(*d),
        Value::BulkString(_) | Value::SimpleString(_) | Value::VerbatimString { .. } => {
            value_to_string(value).and_then(|s| s.trim().parse::<f64>().ok())
        }
        _ => None,
    }
}

/// Non-negative integer reply (dimension, cardinality, memory usage, existence counts).
pub fn parse_count(value: &Value, operation: &str) -> GatewayResult<u64> {
    let parsed = match value {
        Value::Int(n) if *n >= 0 => Some(*n as u64),
        Value::Nil => None,
        other => value_to_f64(other)
            .filter(|n| n.is_finite() && *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as u64),
    };
    parsed.ok_or_else(|| {
        warn!(operation = %operation, reply = ?value, "Expected a numeric reply");
        GatewayError::protocol(format!("{} expected a numeric reply, got {:?}", operation, value))
    })
}

/// Integer `1`/`0` reply of writes (`VADD`, `VREM`, `VSETATTR`, `DEL`).
pub fn parse_flag(value: &Value, operation: &str) -> GatewayResult<bool> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Okay => Ok(true),
        other => parse_count(other, operation).map(|n| n > 0),
    }
}

/// Optional string reply; nil means absent.
pub fn parse_optional_string(value: &Value, operation: &str) -> GatewayResult<Option<String>> {
    match value {
        Value::Nil => Ok(None),
        other => value_to_string(other).map(Some).ok_or_else(|| {
            warn!(operation = %operation, reply = ?value, "Expected a string reply");
            GatewayError::protocol(format!("{} expected a string reply, got {:?}", operation, value))
        }),
    }
}

/// Key/value items of a flat array or map reply. Odd-length arrays lose their last item.
fn pairs<'a>(value: &'a Value, reply: &'static str) -> Option<Vec<(&'a Value, &'a Value)>> {
    match value {
        Value::Array(items) => {
            if items.len() % 2 != 0 {
                warn!(reply = reply, len = items.len(), "Odd-length pair reply, dropping last item");
                metrics::lenient_skip(reply);
            }
            Some(items.chunks_exact(2).map(|pair| (&pair[0], &pair[1])).collect())
        }
        Value::Map(entries) => Some(entries.iter().map(|(k, v)| (k, v)).collect()),
        _ => None,
    }
}

fn info_value(value: &Value) -> InfoValue {
    if let Some(n) = value_to_f64(value).filter(|n| n.is_finite()) {
        return InfoValue::Number(n);
    }
    match value_to_string(value) {
        Some(s) => InfoValue::Text(s),
        None => InfoValue::Text(format!("{:?}", value)),
    }
}

/// `VINFO` reply; nil means the key does not exist.
pub fn parse_info(value: &Value) -> GatewayResult<Option<VectorSetInfo>> {
    if let Value::Nil = value {
        return Ok(None);
    }
    let Some(pairs) = pairs(value, "info") else {
        warn!(reply = ?value, "Unexpected info reply shape");
        return Err(GatewayError::protocol("info expected a key/value reply"));
    };

    let mut info = VectorSetInfo::new();
    for (key, value) in pairs {
        match value_to_string(key) {
            Some(key) => {
                info.insert(key, info_value(value));
            }
            None => {
                warn!(key = ?key, "Skipping info field with a non-string name");
                metrics::lenient_skip("info");
            }
        }
    }
    Ok(Some(info))
}

/// Element/score pairs of a `VSIM ... WITHSCORES` reply or one `VLINKS` level.
///
/// Pairs with a missing element or a non-numeric score are skipped.
pub fn parse_scored_pairs(value: &Value, reply: &'static str) -> GatewayResult<Vec<VectorTuple>> {
    if let Value::Nil = value {
        return Ok(Vec::new());
    }
    let Some(pairs) = pairs(value, reply) else {
        warn!(reply = reply, raw = ?value, "Unexpected scored reply shape");
        return Err(GatewayError::protocol(format!("{} expected a list of scored pairs", reply)));
    };

    let mut tuples = Vec::with_capacity(pairs.len());
    for (element, score) in pairs {
        match (value_to_string(element), value_to_f64(score).filter(|s| s.is_finite())) {
            (Some(element), Some(score)) => tuples.push(VectorTuple::new(element, score)),
            _ => {
                warn!(reply = reply, element = ?element, score = ?score, "Skipping malformed scored pair");
                metrics::lenient_skip(reply);
            }
        }
    }
    Ok(tuples)
}

/// `VLINKS ... WITHSCORES` reply, highest layer first; nil means the key or element is missing.
pub fn parse_levels(value: &Value) -> GatewayResult<Option<NeighborLevels>> {
    let levels = match value {
        Value::Nil => return Ok(None),
        Value::Array(levels) => levels,
        other => {
            warn!(reply = ?other, "Unexpected links reply shape");
            return Err(GatewayError::protocol("links expected a list of levels"));
        }
    };

    let mut parsed = Vec::with_capacity(levels.len());
    for (index, level) in levels.iter().enumerate() {
        match level {
            Value::Array(_) | Value::Map(_) => parsed.push(parse_scored_pairs(level, "links")?),
            other => {
                warn!(level = index, reply = ?other, "Skipping non-list level");
                metrics::lenient_skip("links");
            }
        }
    }
    Ok(Some(parsed))
}

/// `VEMB` reply; nil means the element is missing.
///
/// Components that are not finite numbers become `0.0`.
pub fn parse_vector(value: &Value) -> GatewayResult<Option<Vec<f32>>> {
    let components = match value {
        Value::Nil => return Ok(None),
        Value::Array(components) => components,
        other => {
            warn!(reply = ?other, "Unexpected vector reply shape");
            return Err(GatewayError::protocol("vector fetch expected a list of numbers"));
        }
    };

    let vector = components
        .iter()
        .enumerate()
        .map(|(index, component)| match value_to_f64(component) {
            Some(n) if n.is_finite() => n as f32,
            _ => {
                warn!(index = index, component = ?component, "Replacing non-numeric vector component with 0");
                metrics::lenient_skip("emb");
                0.0
            }
        })
        .collect();
    Ok(Some(vector))
}

/// One `SCAN` page: next cursor and keys.
pub fn parse_scan(value: &Value) -> GatewayResult<(String, Vec<String>)> {
    let Value::Array(items) = value else {
        return Err(GatewayError::protocol("scan expected a [cursor, keys] reply"));
    };
    let [cursor, keys] = items.as_slice() else {
        return Err(GatewayError::protocol("scan expected a [cursor, keys] reply"));
    };
    let cursor = value_to_string(cursor)
        .ok_or_else(|| GatewayError::protocol("scan cursor is not a string"))?;
    let keys = match keys {
        Value::Array(keys) | Value::Set(keys) => keys.iter().filter_map(value_to_string).collect(),
        other => {
            return Err(GatewayError::protocol(format!(
                "scan expected a key list, got {:?}",
                other
            )));
        }
    };
    Ok((cursor, keys))
}
