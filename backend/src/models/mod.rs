//! API models for the stock ledger server
//!
//! Re-exports the ledger models from the shared crate and adds the response
//! envelope used by every successful handler.

use serde::Serialize;

pub use shared::models::*;

use crate::services::Served;

/// Success envelope; `message` explains degraded or partial data
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }
}

impl<T> From<Served<T>> for ApiResponse<T> {
    fn from(served: Served<T>) -> Self {
        Self {
            success: true,
            data: served.data,
            message: served.message,
        }
    }
}
