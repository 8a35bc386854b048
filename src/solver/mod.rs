//! The sampling-run driver.

pub mod richardson;

pub use richardson::Richardson;
