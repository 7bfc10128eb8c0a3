//! Component H: pure coercion from loosely typed input to `StandardData`.
//!
//! Structural detection mirrors §6: a `{successes, trials}` object, a plain
//! array of numbers, or an array of `{converted, value}` records.

use serde::{Deserialize, Serialize};

use super::{StandardData, UserRecord};
use crate::errors::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawUserRecord {
    converted: bool,
    value: f64,
}

/// Untyped input as it would arrive across an API boundary (JSON, a
/// dynamically-typed host language, ...). `serde(untagged)` gives us the
/// structural detection the spec asks for: whichever variant deserializes
/// without error wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawInput {
    BinomialCounts { successes: u64, trials: u64 },
    Numbers(Vec<f64>),
    UserRecords(Vec<RawUserRecord>),
}

/// Coerce `raw` into a `StandardData`, validating every invariant in §4.H.
///
/// Idempotent: re-canonicalizing an already-canonical `StandardData` (via
/// `StandardData`'s own validating constructors, which `canonicalize` always
/// routes through) reproduces the same value.
pub fn canonicalize(raw: RawInput) -> Result<StandardData> {
    match raw {
        RawInput::BinomialCounts { successes, trials } => {
            StandardData::binomial(successes, trials)
        }
        RawInput::Numbers(values) => {
            if values.is_empty() {
                return Err(Error::NotEnoughData { needed: 1, got: 0 });
            }
            StandardData::continuous(values)
        }
        RawInput::UserRecords(records) => {
            if records.is_empty() {
                return Err(Error::NotEnoughData { needed: 1, got: 0 });
            }
            let users = records
                .into_iter()
                .map(|r| UserRecord::new(r.converted, r.value))
                .collect::<Result<Vec<_>>>()?;
            StandardData::user_level(users)
        }
    }
}
