use crate::core::amount::Amount;
use crate::core::item::{ItemId, OpenItem};
use crate::core::scope::{CompanyCode, Country};
use crate::rules::rule::{ClearingRule, ClosureStrategy};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A candidate group that must not be emitted.
///
/// Raised only inside the engine; candidates failing these checks are
/// discarded and never surface to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToleranceViolation {
    #[error("a clearing group needs at least two items, got {0}")]
    TooFewMembers(usize),
    #[error("net amount {net} exceeds the tolerance of {tolerance} minor units")]
    OutOfTolerance { net: Amount, tolerance: u64 },
    #[error("member amounts do not sum within the amount range")]
    AmountOverflow,
}

/// A set of open items cleared together.
///
/// Construction through [`ClearingGroup::new`] guarantees at least two
/// members and a net amount within the rule's tolerance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearingGroup {
    company_code: CompanyCode,
    country: Country,
    account: String,
    currency: String,
    member_item_ids: Vec<ItemId>,
    net_amount: Amount,
    gross_amount: Amount,
    clearing_date: NaiveDate,
    matched_rule_id: String,
    strategy: ClosureStrategy,
}

impl ClearingGroup {
    /// Build a group from `members`, which must share one bucket and be
    /// given in input order.
    pub fn new(
        rule: &ClearingRule,
        strategy: ClosureStrategy,
        members: &[&OpenItem],
        clearing_date: NaiveDate,
    ) -> Result<Self, ToleranceViolation> {
        let first = match members {
            [first, _, ..] => *first,
            _ => return Err(ToleranceViolation::TooFewMembers(members.len())),
        };

        let net_amount = Amount::checked_sum(members.iter().map(|m| m.amount()))
            .ok_or(ToleranceViolation::AmountOverflow)?;
        if !net_amount.within(rule.amount_tolerance) {
            return Err(ToleranceViolation::OutOfTolerance {
                net: net_amount,
                tolerance: rule.amount_tolerance,
            });
        }
        let gross_amount = Amount::checked_sum(
            members.iter().map(|m| m.amount()).filter(|a| a.is_debit()),
        )
        .ok_or(ToleranceViolation::AmountOverflow)?;

        Ok(Self {
            company_code: first.company_code().clone(),
            country: first.country().clone(),
            account: first.account().to_string(),
            currency: first.currency().to_string(),
            member_item_ids: members.iter().map(|m| m.id()).collect(),
            net_amount,
            gross_amount,
            clearing_date,
            matched_rule_id: rule.id.clone(),
            strategy,
        })
    }

    pub fn company_code(&self) -> &CompanyCode {
        &self.company_code
    }

    pub fn country(&self) -> &Country {
        &self.country
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn member_item_ids(&self) -> &[ItemId] {
        &self.member_item_ids
    }

    pub fn len(&self) -> usize {
        self.member_item_ids.len()
    }

    /// Always false for a constructed group.
    pub fn is_empty(&self) -> bool {
        self.member_item_ids.is_empty()
    }

    pub fn net_amount(&self) -> Amount {
        self.net_amount
    }

    /// Sum of the debit members.
    pub fn gross_amount(&self) -> Amount {
        self.gross_amount
    }

    pub fn clearing_date(&self) -> NaiveDate {
        self.clearing_date
    }

    /// Fiscal posting period `(year, month)` of the clearing date.
    pub fn posting_period(&self) -> (i32, u32) {
        (self.clearing_date.year(), self.clearing_date.month())
    }

    pub fn matched_rule_id(&self) -> &str {
        &self.matched_rule_id
    }

    pub fn strategy(&self) -> ClosureStrategy {
        self.strategy
    }
}
