//! Run report rendering.

pub mod generator;

pub use generator::write_report;
