//! Clearing rules and their YAML rules document.

pub mod rule;
pub mod rule_set;
