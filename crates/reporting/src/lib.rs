//! Affiliate reporting — performance aggregation with small-number
//! suppression for privacy-safe output.

pub mod performance;
pub mod suppression;

pub use performance::{AffiliatePerformanceRow, AffiliateReportBuilder};
pub use suppression::{suppress_small_number, MaskedCount, SMALL_CELL_THRESHOLD};
