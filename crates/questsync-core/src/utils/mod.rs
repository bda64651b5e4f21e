//! Utility functions for timestamp and percentage formatting.

pub mod format;

// Re-export commonly used functions at module level
pub use format::{age_display, format_percent, iso8601, parse_timestamp};
