//! # gl-clearing
//!
//! Automated clearing of General-Ledger open items.
//!
//! Given a ledger export of open debit and credit items, the engine
//! groups items that offset each other under configurable per company
//! code rules, dates each group on a business day, and reports what was
//! cleared per company code and per responsible user.
//!
//! ## Architecture
//!
//! - **core** — Amounts, scope keys, business calendar, open item store
//! - **rules** — Clearing rules and the YAML rules document
//! - **engine** — Bucketing, closure strategies, group emission
//! - **report** — Per-company and per-user run results
//! - **simulation** — Synthetic ledgers for stress testing

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod rules;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::amount::Amount;
    pub use crate::core::calendar::BusinessCalendar;
    pub use crate::core::item::{ItemId, OpenItem};
    pub use crate::core::scope::{CompanyCode, Country, ScopeKey};
    pub use crate::core::store::OpenItemStore;
    pub use crate::engine::clearing::{ClearingEngine, EngineOutput};
    pub use crate::engine::diagnostic::Diagnostic;
    pub use crate::engine::group::ClearingGroup;
    pub use crate::report::aggregate::{ClearingRunResult, ResultAggregator};
    pub use crate::report::org_chart::{OrgChart, User};
    pub use crate::rules::rule::{ClearingRule, ClosureStrategy, MatchKey, RuleScope};
    pub use crate::rules::rule_set::RuleSet;
}
