//! Prescription snapshot and its derived projections.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const HOURS_PER_DAY: i64 = 24;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// A stored prescription: quantity on hand as of `updated`, consumed at `rate` units per day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    pub name: String,
    pub quantity: f64,
    pub rate: f64,
    pub updated: DateTime<Utc>,
}

impl Prescription {
    pub fn new(name: impl Into<String>, quantity: f64, rate: f64, updated: DateTime<Utc>) -> Self {
        Prescription {
            name: name.into(),
            quantity,
            rate,
            updated,
        }
    }

    /// Units expected to remain at `now`.
    ///
    /// Only whole elapsed days count as consumed; the partial day is dropped.
    /// The result is floored at zero.
    pub fn expected_count(&self, now: DateTime<Utc>) -> f64 {
        let days_elapsed = (now - self.updated).num_hours() / HOURS_PER_DAY;
        let consumed = days_elapsed as f64 * self.rate;
        (self.quantity - consumed).max(0.0)
    }

    /// Instant at which the supply runs out, at millisecond resolution.
    ///
    /// Returns `None` when the supply never depletes: a zero or negative rate, or a
    /// depletion point beyond the representable timestamp range.
    pub fn refill_date(&self) -> Option<DateTime<Utc>> {
        if self.rate.is_nan() || self.rate <= 0.0 {
            return None;
        }

        let millis = (self.quantity / self.rate * MILLIS_PER_DAY).trunc();
        if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
            return None;
        }

        let supply = Duration::try_milliseconds(millis as i64)?;
        self.updated.checked_add_signed(supply)
    }

    /// Serializable form carrying both stored and derived fields, evaluated at `now`.
    pub fn view(&self, now: DateTime<Utc>) -> PrescriptionView {
        PrescriptionView {
            name: self.name.clone(),
            quantity: self.quantity,
            rate: self.rate,
            updated: self.updated,
            count: self.expected_count(now),
            refill: self.refill_date(),
        }
    }
}

/// Wire representation of a prescription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrescriptionView {
    pub name: String,
    pub quantity: f64,
    pub rate: f64,
    pub updated: DateTime<Utc>,
    pub count: f64,
    /// `null` when the supply never depletes.
    pub refill: Option<DateTime<Utc>>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("prescription name must not be empty")]
    EmptyName,
    #[error("prescription name must not start or end with whitespace: {0:?}")]
    UntrimmedName(String),
    #[error("quantity must be a finite, non-negative number, got {0}")]
    InvalidQuantity(f64),
    #[error("rate must be a finite number, got {0}")]
    InvalidRate(f64),
}

pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    // names are primary keys; " foo" and "foo" must not both exist
    if trimmed.len() != name.len() {
        return Err(ValidationError::UntrimmedName(name.to_string()));
    }
    Ok(())
}

pub fn validate_quantity(quantity: f64) -> Result<(), ValidationError> {
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(ValidationError::InvalidQuantity(quantity));
    }
    Ok(())
}

pub fn validate_rate(rate: f64) -> Result<(), ValidationError> {
    if !rate.is_finite() {
        return Err(ValidationError::InvalidRate(rate));
    }
    Ok(())
}
