//! Shared types and models for the stock ledger platform
//!
//! This crate holds the ledger domain model and the balance replay logic so
//! that the backend, the browser (via WASM), and the test suites all compute
//! timelines the same way.

pub mod models;
pub mod reconciliation;
pub mod types;
pub mod validation;

pub use models::*;
pub use reconciliation::*;
pub use types::*;
pub use validation::*;
