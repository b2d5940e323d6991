//! Shared value types for the Inkwell domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (temperature is in `[0.0, 2.0]`, costs are
//! non-negative and finite) and participate in domain computations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Token and cost types
// ---------------------------------------------------------------------------

/// Number of tokens consumed by a model invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenCount(u64);

impl TokenCount {
    /// Creates a [`TokenCount`] from a raw integer.
    pub fn new(count: u64) -> Self {
        Self(count)
    }

    /// Returns the underlying integer value.
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns `true` if this count is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Rough token estimate for text a backend did not meter itself.
    ///
    /// Uses four characters per token, rounded up.
    pub fn estimate_for(text: &str) -> Self {
        let chars = text.chars().count() as u64;
        Self(chars.div_ceil(4))
    }
}

impl std::fmt::Display for TokenCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for TokenCount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for TokenCount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

// ---------------------------------------------------------------------------

/// Input/output token split reported for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens sent to the model (system text plus prompt).
    pub input: TokenCount,
    /// Tokens generated by the model.
    pub output: TokenCount,
}

impl TokenUsage {
    /// Creates a usage record from raw input/output counts.
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input: TokenCount::new(input),
            output: TokenCount::new(output),
        }
    }

    /// Total tokens in both directions.
    pub fn total(self) -> TokenCount {
        self.input + self.output
    }
}

// ---------------------------------------------------------------------------

/// Monetary cost of model token usage, expressed in US dollars.
///
/// Used for per-call and per-backend cost accounting. Callers are responsible
/// for rounding to suitable display precision.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenCost(f64);

impl TokenCost {
    /// Creates a [`TokenCost`] from a raw float value (USD).
    ///
    /// Returns `None` if `value` is negative, infinite, or NaN.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && value >= 0.0 {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Creates a [`TokenCost`] of exactly zero.
    pub fn zero() -> Self {
        Self(0.0)
    }

    /// Returns the underlying `f64` value (USD).
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Returns `true` if this cost is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }
}

impl Default for TokenCost {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for TokenCost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "${:.6}", self.0)
    }
}

impl std::ops::Add for TokenCost {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for TokenCost {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

// ---------------------------------------------------------------------------
// Sampling parameters
// ---------------------------------------------------------------------------

/// Sampling temperature in the range `[0.0, 2.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Temperature(f64);

impl Temperature {
    /// Upper bound accepted by every backend family.
    pub const MAX: f64 = 2.0;

    /// Creates a [`Temperature`], returning `None` if `value` is outside
    /// `[0.0, 2.0]` or not finite.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        if value.is_finite() && (0.0..=Self::MAX).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Returns the temperature as an `f64`.
    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl Default for Temperature {
    fn default() -> Self {
        Self(0.7)
    }
}

impl TryFrom<f64> for Temperature {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("temperature {value} is outside [0, 2]"))
    }
}

impl From<Temperature> for f64 {
    fn from(value: Temperature) -> Self {
        value.0
    }
}

impl std::fmt::Display for Temperature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_cost_rejects_negative_and_nan() {
        assert!(TokenCost::new(-0.01).is_none());
        assert!(TokenCost::new(f64::NAN).is_none());
        assert!(TokenCost::new(0.5).is_some());
    }

    #[test]
    fn test_temperature_bounds_are_inclusive() {
        assert!(Temperature::new(0.0).is_some());
        assert!(Temperature::new(2.0).is_some());
        assert!(Temperature::new(2.01).is_none());
        assert!(Temperature::new(-0.1).is_none());
    }

    #[test]
    fn test_token_estimate_rounds_up() {
        assert_eq!(TokenCount::estimate_for("").as_u64(), 0);
        assert_eq!(TokenCount::estimate_for("abc").as_u64(), 1);
        assert_eq!(TokenCount::estimate_for("abcdefgh").as_u64(), 2);
        assert_eq!(TokenCount::estimate_for("abcdefghi").as_u64(), 3);
    }

    #[test]
    fn test_token_usage_total() {
        assert_eq!(TokenUsage::new(10, 32).total().as_u64(), 42);
    }
}
