//! Domain models for the stock ledger platform

mod dispatch;
mod ledger;
mod stock;
mod timeline;

pub use dispatch::*;
pub use ledger::*;
pub use stock::*;
pub use timeline::*;
