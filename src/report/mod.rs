//! Per-company and per-user views of a clearing run.

pub mod aggregate;
pub mod org_chart;
