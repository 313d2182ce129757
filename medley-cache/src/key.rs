//! Deterministic cache key encoding.
//!
//! Keys must be a pure function of their logical parameter values: two
//! equal parameter tuples always produce the same string, no matter how
//! the values were built, in which order map entries were inserted, or
//! what the host's time zone is. Hash-order, locale and formatting
//! artifacts must never leak into a key.
//!
//! # Format
//!
//! A key is `namespace` + `/` + comma-joined parameter encodings. Each
//! parameter carries a one-character type tag so encodings of different
//! variants can never collide:
//!
//! - `~` absent
//! - `i<digits>` integer
//! - `d<digits>` decimal, normalized (trailing zeros stripped)
//! - `t<escaped>` text
//! - `s<rfc3339-utc>` timestamp
//! - `r<lo>-<hi>` range
//! - `[a,b,...]` list
//! - `{k:v,...}` map, keys sorted
//!
//! Structural characters (`/ , [ ] { } : %`) are percent-escaped inside
//! text and map keys, so no element encoding can contain an unescaped
//! delimiter.

use chrono::{SecondsFormat, Utc};
use medley_core::{EncodeError, Timestamp};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Maximum nesting depth for lists and maps.
///
/// The parameter union is closed and acyclic, so depth is the only way an
/// encoding can fail to terminate in reasonable space.
const MAX_DEPTH: usize = 16;

/// A single cache key parameter.
///
/// The tagged union replaces runtime type dispatch: every value a caller
/// can pass is enumerated here, and `encode` is total over the union.
/// `Map` uses a [`BTreeMap`] so iteration is key-sorted by construction
/// and insertion order cannot influence the encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// An explicitly absent value, distinct from any real value.
    Absent,
    Int(i64),
    Decimal(Decimal),
    Text(String),
    Timestamp(Timestamp),
    /// An inclusive numeric range, encoded `lo-hi`.
    Range(i64, i64),
    List(Vec<ParamValue>),
    Map(BTreeMap<String, ParamValue>),
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Decimal> for ParamValue {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<Timestamp> for ParamValue {
    fn from(value: Timestamp) -> Self {
        Self::Timestamp(value)
    }
}

/// Encode a namespace and parameter tuple into a stable cache key.
pub fn encode(namespace: &str, params: &[ParamValue]) -> Result<String, EncodeError> {
    let mut out = key_prefix(namespace)?;
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        encode_value(param, 0, &mut out)?;
    }
    Ok(out)
}

/// The prefix shared by every key in a namespace, used for prefix deletes.
pub fn key_prefix(namespace: &str) -> Result<String, EncodeError> {
    if namespace.is_empty()
        || !namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(EncodeError::BadNamespace {
            namespace: namespace.to_string(),
        });
    }
    let mut out = String::with_capacity(namespace.len() + 16);
    out.push_str(namespace);
    out.push('/');
    Ok(out)
}

fn encode_value(value: &ParamValue, depth: usize, out: &mut String) -> Result<(), EncodeError> {
    if depth > MAX_DEPTH {
        return Err(EncodeError::TooDeep { max: MAX_DEPTH });
    }

    match value {
        ParamValue::Absent => out.push('~'),
        ParamValue::Int(i) => {
            out.push('i');
            out.push_str(&i.to_string());
        }
        ParamValue::Decimal(d) => {
            // Normalize so 29.8 and 29.80 (equal values) encode identically.
            out.push('d');
            out.push_str(&d.normalize().to_string());
        }
        ParamValue::Text(s) => {
            out.push('t');
            push_escaped(s, out);
        }
        ParamValue::Timestamp(ts) => {
            // Fixed RFC 3339 UTC rendering; the caller's zone never matters.
            out.push('s');
            out.push_str(
                &ts.with_timezone(&Utc)
                    .to_rfc3339_opts(SecondsFormat::Micros, true),
            );
        }
        ParamValue::Range(lo, hi) => {
            out.push('r');
            out.push_str(&lo.to_string());
            out.push('-');
            out.push_str(&hi.to_string());
        }
        ParamValue::List(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                encode_value(item, depth + 1, out)?;
            }
            out.push(']');
        }
        ParamValue::Map(map) => {
            // BTreeMap iterates in key order; nothing else to sort.
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                push_escaped(k, out);
                out.push(':');
                encode_value(v, depth + 1, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}

/// Percent-escape the structural characters of the key grammar.
fn push_escaped(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '%' | '/' | ',' | '[' | ']' | '{' | '}' | ':' | '~' => {
                out.push('%');
                out.push_str(&format!("{:02X}", c as u32));
            }
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn test_scalar_encodings() {
        let key = encode(
            "best_times",
            &[
                ParamValue::Int(42),
                ParamValue::Absent,
                ParamValue::Range(1990, 1995),
            ],
        )
        .unwrap();
        assert_eq!(key, "best_times/i42,~,r1990-1995");
    }

    #[test]
    fn test_decimal_normalization() {
        let a = encode("ns", &[ParamValue::Decimal(Decimal::new(298, 1))]).unwrap();
        let b = encode("ns", &[ParamValue::Decimal(Decimal::new(2980, 2))]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "ns/d29.8");
    }

    #[test]
    fn test_timestamp_is_utc_regardless_of_offset() {
        let utc = Utc.with_ymd_and_hms(2026, 8, 6, 12, 0, 0).unwrap();
        let offset = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 8, 6, 14, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(utc, offset);

        let a = encode("ns", &[ParamValue::Timestamp(utc)]).unwrap();
        let b = encode("ns", &[ParamValue::Timestamp(offset)]).unwrap();
        assert_eq!(a, b);
        assert!(a.ends_with('Z'));
    }

    #[test]
    fn test_map_key_order_does_not_matter() {
        let mut forward = BTreeMap::new();
        forward.insert("season".to_string(), ParamValue::Int(2026));
        forward.insert("squad".to_string(), ParamValue::Int(3));

        let mut reverse = BTreeMap::new();
        reverse.insert("squad".to_string(), ParamValue::Int(3));
        reverse.insert("season".to_string(), ParamValue::Int(2026));

        let a = encode("reports", &[ParamValue::Map(forward)]).unwrap();
        let b = encode("reports", &[ParamValue::Map(reverse)]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, "reports/{season:i2026,squad:i3}");
    }

    #[test]
    fn test_text_delimiters_are_escaped() {
        let tricky = ParamValue::Text("a,b/c[d]{e}:f~g%h".to_string());
        let key = encode("ns", &[tricky]).unwrap();
        // No unescaped structural character survives in the element.
        assert_eq!(key, "ns/ta%2Cb%2Fc%5Bd%5D%7Be%7D%3Af%7Eg%25h");
    }

    #[test]
    fn test_list_structure_cannot_be_forged_from_text() {
        let split = encode(
            "ns",
            &[ParamValue::List(vec![
                ParamValue::Text("a".to_string()),
                ParamValue::Text("b".to_string()),
            ])],
        )
        .unwrap();
        let joined = encode(
            "ns",
            &[ParamValue::List(vec![ParamValue::Text("a,b".to_string())])],
        )
        .unwrap();
        assert_ne!(split, joined);
    }

    #[test]
    fn test_absent_is_distinct_from_empty_text() {
        let absent = encode("ns", &[ParamValue::Absent]).unwrap();
        let empty = encode("ns", &[ParamValue::Text(String::new())]).unwrap();
        assert_ne!(absent, empty);
    }

    #[test]
    fn test_bad_namespace_rejected() {
        for ns in ["", "best times", "best/times", "reports,"] {
            assert!(matches!(
                encode(ns, &[]),
                Err(EncodeError::BadNamespace { .. })
            ));
        }
        assert!(encode("best_times", &[]).is_ok());
    }

    #[test]
    fn test_nesting_limit() {
        let mut value = ParamValue::Int(1);
        for _ in 0..32 {
            value = ParamValue::List(vec![value]);
        }
        assert!(matches!(
            encode("ns", &[value]),
            Err(EncodeError::TooDeep { .. })
        ));
    }

    #[test]
    fn test_prefix_is_prefix_of_keys() {
        let prefix = key_prefix("best_times").unwrap();
        let key = encode("best_times", &[ParamValue::Int(1)]).unwrap();
        assert!(key.starts_with(&prefix));
    }
}
