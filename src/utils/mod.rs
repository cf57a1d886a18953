//! Utility modules: numeric conversions.
pub mod num;
