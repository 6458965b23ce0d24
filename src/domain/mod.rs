//! Domain types for prescription tracking.
//!
//! This module provides:
//! - The `Prescription` snapshot and its derived projections (expected count, refill date)
//! - Input validation shared by the HTTP and CLI adapters
//! - An injectable `Clock` so derived values and timestamps are deterministic in tests

pub mod clock;
pub mod prescription;

pub use clock::{Clock, FixedClock, SystemClock};
pub use prescription::{
    validate_name, validate_quantity, validate_rate, Prescription, PrescriptionView,
    ValidationError,
};
