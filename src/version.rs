//! Versioning: ranges, baselines, change detection, bump planning and
//! execution.
pub mod changed;
pub mod executor;
pub mod planner;
pub mod range;
pub mod resolve;
