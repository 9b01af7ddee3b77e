use crate::core::ledger_row::MalformedRowError;
use crate::core::scope::{CompanyCode, ScopeKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A per-row or per-scope problem met during a run.
///
/// Diagnostics never abort a run; they travel with the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    MalformedRow {
        row: usize,
        company_code: Option<CompanyCode>,
        reason: String,
    },
    ScopeSkipped {
        scope: ScopeKey,
        reason: String,
    },
    NoApplicableRule {
        scope: ScopeKey,
    },
    ClearingDateUnavailable {
        scope: ScopeKey,
        rule: String,
        reason: String,
    },
}

impl Diagnostic {
    /// The company code the diagnostic belongs to, if known.
    pub fn company_code(&self) -> Option<&CompanyCode> {
        match self {
            Diagnostic::MalformedRow { company_code, .. } => company_code.as_ref(),
            Diagnostic::ScopeSkipped { scope, .. }
            | Diagnostic::NoApplicableRule { scope }
            | Diagnostic::ClearingDateUnavailable { scope, .. } => Some(&scope.company_code),
        }
    }
}

impl From<&MalformedRowError> for Diagnostic {
    fn from(err: &MalformedRowError) -> Self {
        Diagnostic::MalformedRow {
            row: err.row,
            company_code: err.company_code.clone(),
            reason: err.reason.clone(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::MalformedRow {
                row,
                company_code: Some(code),
                reason,
            } => write!(f, "row {} of company code {} is malformed: {}", row, code, reason),
            Diagnostic::MalformedRow { row, reason, .. } => {
                write!(f, "row {} is malformed: {}", row, reason)
            }
            Diagnostic::ScopeSkipped { scope, reason } => {
                write!(f, "scope {} skipped: {}", scope, reason)
            }
            Diagnostic::NoApplicableRule { scope } => {
                write!(f, "no clearing rule applies to scope {}", scope)
            }
            Diagnostic::ClearingDateUnavailable {
                scope,
                rule,
                reason,
            } => write!(
                f,
                "scope {}: rule '{}' produced no clearing date: {}",
                scope, rule, reason
            ),
        }
    }
}
