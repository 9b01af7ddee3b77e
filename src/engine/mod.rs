//! The clearing engine: bucketing, closure strategies and group emission.

pub mod bucket;
pub mod clearing;
pub mod closure;
pub mod diagnostic;
pub mod group;
