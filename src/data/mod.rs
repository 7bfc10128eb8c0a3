//! Canonical data model (component H's output type, §3).

pub mod normalize;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// A single user-level record: did the user convert, and if so what value
/// (e.g. revenue) did they generate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub converted: bool,
    pub value: f64,
}

impl UserRecord {
    pub fn new(converted: bool, value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(Error::invalid_data("user value must be finite"));
        }
        if value < 0.0 {
            return Err(Error::invalid_data("user value must be non-negative"));
        }
        if !converted && value > 0.0 {
            return Err(Error::invalid_data(
                "a non-converted user cannot have a positive value",
            ));
        }
        Ok(UserRecord { converted, value })
    }
}

/// The canonical, immutable, tagged representation every inference engine
/// consumes. Constructed exclusively through `normalize::canonicalize`, or
/// the `Binomial`/`Continuous`/`UserLevel`/`Summary` constructors below,
/// which re-run the same validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StandardData {
    Binomial {
        successes: u64,
        trials: u64,
    },
    Continuous {
        values: Vec<f64>,
        positive_only: bool,
    },
    UserLevel {
        users: Vec<UserRecord>,
    },
    Summary {
        n: u64,
        sum: f64,
        sum_sq: f64,
    },
}

impl StandardData {
    pub fn binomial(successes: u64, trials: u64) -> Result<Self> {
        if successes > trials {
            return Err(Error::invalid_data(format!(
                "successes ({}) must not exceed trials ({})",
                successes, trials
            )));
        }
        Ok(StandardData::Binomial { successes, trials })
    }

    pub fn continuous(values: Vec<f64>) -> Result<Self> {
        if values.iter().any(|v| v.is_nan() || v.is_infinite()) {
            return Err(Error::invalid_data("continuous values must be finite"));
        }
        let positive_only = values.iter().all(|&v| v > 0.0);
        Ok(StandardData::Continuous {
            values,
            positive_only,
        })
    }

    pub fn user_level(users: Vec<UserRecord>) -> Result<Self> {
        Ok(StandardData::UserLevel { users })
    }

    pub fn summary(n: u64, sum: f64, sum_sq: f64) -> Result<Self> {
        if n == 0 {
            return Err(Error::NotEnoughData { needed: 1, got: 0 });
        }
        Ok(StandardData::Summary { n, sum, sum_sq })
    }

    /// Number of observations backing this sample.
    pub fn len(&self) -> usize {
        match self {
            StandardData::Binomial { trials, .. } => *trials as usize,
            StandardData::Continuous { values, .. } => values.len(),
            StandardData::UserLevel { users } => users.len(),
            StandardData::Summary { n, .. } => *n as usize,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A short human-readable tag for error messages and router diagnostics.
    pub fn shape_name(&self) -> &'static str {
        match self {
            StandardData::Binomial { .. } => "binomial",
            StandardData::Continuous { .. } => "continuous",
            StandardData::UserLevel { .. } => "user-level",
            StandardData::Summary { .. } => "summary",
        }
    }
}
