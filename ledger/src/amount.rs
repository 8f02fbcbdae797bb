//! # Fixed-Point Money
//!
//! An [`Amount`] is a non-negative count of minor units (cents). All
//! arithmetic is integer arithmetic with explicit overflow checks; binary
//! floating point never touches a balance.
//!
//! Text form is `<major>.<minor>` with exactly [`AMOUNT_DECIMALS`] digits on
//! output. On input the fractional part is optional and may be shorter
//! (`"30"`, `"30.5"`, `"30.50"` are the same amount), but never longer, so a
//! caller can't silently lose precision.
//!
//! Serialization follows the format: human-readable formats (JSON) get the
//! decimal string, binary formats (bincode, on disk) get the raw `u64`.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::{AMOUNT_DECIMALS, MINOR_UNITS_PER_MAJOR};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a decimal string is not a valid [`Amount`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,

    #[error("malformed amount: {0:?}")]
    Malformed(String),

    #[error("amount {0:?} has more than two fractional digits")]
    TooPrecise(String),

    #[error("amount {0:?} is too large")]
    Overflow(String),
}

// ---------------------------------------------------------------------------
// Amount
// ---------------------------------------------------------------------------

/// A non-negative monetary value in minor units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Wraps a raw minor-unit count.
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Whole major units, or `None` if that overflows.
    pub fn from_major(major: u64) -> Option<Self> {
        major.checked_mul(MINOR_UNITS_PER_MAJOR).map(Self)
    }

    /// The raw minor-unit count.
    pub const fn minor(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}",
            self.0 / MINOR_UNITS_PER_MAJOR,
            self.0 % MINOR_UNITS_PER_MAJOR,
            width = AMOUNT_DECIMALS as usize
        )
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AmountError::Empty);
        }

        let (whole, frac) = match s.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (s, ""),
        };

        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || !all_digits(whole) || !all_digits(frac) {
            return Err(AmountError::Malformed(s.to_string()));
        }
        if s.contains('.') && frac.is_empty() {
            return Err(AmountError::Malformed(s.to_string()));
        }
        if frac.len() > AMOUNT_DECIMALS as usize {
            return Err(AmountError::TooPrecise(s.to_string()));
        }

        let overflow = || AmountError::Overflow(s.to_string());

        let major: u64 = whole.parse().map_err(|_| overflow())?;
        // Right-pad the fraction so "5" reads as 50 cents.
        let minor: u64 = if frac.is_empty() {
            0
        } else {
            let scale = 10u64.pow(AMOUNT_DECIMALS - frac.len() as u32);
            frac.parse::<u64>().map_err(|_| overflow())? * scale
        };

        major
            .checked_mul(MINOR_UNITS_PER_MAJOR)
            .and_then(|m| m.checked_add(minor))
            .map(Amount)
            .ok_or_else(overflow)
    }
}

// ---------------------------------------------------------------------------
// Serde
// ---------------------------------------------------------------------------

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_u64(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_any(DecimalVisitor)
        } else {
            u64::deserialize(deserializer).map(Amount)
        }
    }
}

/// Accepts a decimal string or a JSON number. Numbers go through their
/// shortest textual form and the same parser, never through arithmetic.
struct DecimalVisitor;

impl<'de> Visitor<'de> for DecimalVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative decimal amount with at most two fractional digits")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Amount::from_major(v).ok_or_else(|| E::custom(AmountError::Overflow(v.to_string())))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        if v < 0 {
            return Err(E::custom(AmountError::Malformed(v.to_string())));
        }
        self.visit_u64(v as u64)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        self.visit_str(&v.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
