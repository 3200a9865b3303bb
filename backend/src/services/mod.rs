//! Business logic services for the stock ledger server

pub mod export;
pub mod movement_summary;
pub mod timeline;

pub use movement_summary::MovementSummaryService;
pub use timeline::LedgerTimelineService;

/// Service result that may have been served in a degraded state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served<T> {
    pub data: T,
    /// Explains any data that could not be loaded
    pub message: Option<String>,
    /// The primary data source was unavailable and `data` is empty
    pub degraded: bool,
}

impl<T> Served<T> {
    pub fn complete(data: T) -> Self {
        Self {
            data,
            message: None,
            degraded: false,
        }
    }

    pub fn degraded(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: Some(message.into()),
            degraded: true,
        }
    }
}
