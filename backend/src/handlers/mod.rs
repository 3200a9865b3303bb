//! HTTP handlers

pub mod health;
pub mod ledger;

pub use health::health_check;
pub use ledger::{
    get_current_stock, get_movement_summary, get_product_timeline, get_timeline_by_query,
};
