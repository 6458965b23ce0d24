pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;

pub use config::Config;
pub use db::{init_db, PrescriptionStore};
pub use domain::{Clock, FixedClock, Prescription, PrescriptionView, SystemClock};
pub use error::{AppError, StoreError};
