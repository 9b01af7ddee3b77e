//! Synthetic workloads for tests and benchmarks.

pub mod ledger_generator;
