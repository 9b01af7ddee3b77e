use crate::core::calendar::{BusinessCalendar, CalendarError};
use crate::core::item::OpenItem;
use crate::core::scope::ScopeKey;
use crate::core::store::OpenItemStore;
use crate::engine::bucket::BucketArena;
use crate::engine::closure;
use crate::engine::diagnostic::Diagnostic;
use crate::engine::group::{ClearingGroup, ToleranceViolation};
use crate::rules::rule::{ClearingDateBasis, ClearingRule, ClosureStrategy};
use crate::rules::rule_set::RuleSet;
use chrono::NaiveDate;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Groups, leftovers and diagnostics of one scope or one whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOutput {
    /// Groups in emission order.
    pub groups: Vec<ClearingGroup>,
    /// Items no rule could clear, in input order.
    pub unmatched: Vec<OpenItem>,
    pub diagnostics: Vec<Diagnostic>,
}

impl EngineOutput {
    fn append(&mut self, mut other: EngineOutput) {
        self.groups.append(&mut other.groups);
        self.unmatched.append(&mut other.unmatched);
        self.diagnostics.append(&mut other.diagnostics);
    }

    pub fn cleared_item_count(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }
}

/// Why a candidate never became a group.
enum Rejection {
    Tolerance(ToleranceViolation),
    Calendar(CalendarError),
}

/// The clearing engine.
///
/// Holds the read-only inputs of a run. Scopes share nothing mutable,
/// so [`ClearingEngine::run`] processes them in parallel.
///
/// # Algorithm
///
/// Per scope, each applicable rule in priority order:
///
/// 1. Filter the still-open items through the rule's account, partner
///    and age filters.
/// 2. Bucket them by account, currency and the rule's match keys.
/// 3. Run the rule's closure strategies in order over each bucket's
///    open members and emit every candidate that passes validation.
/// 4. A bucket that emitted a group belongs to this rule: its open
///    leftovers are withheld from every later rule.
///
/// Whatever is left after the last rule is unmatched.
pub struct ClearingEngine<'a> {
    rules: &'a RuleSet,
    calendar: &'a BusinessCalendar,
    as_of: NaiveDate,
    period_close: Result<NaiveDate, CalendarError>,
}

impl<'a> ClearingEngine<'a> {
    pub fn new(rules: &'a RuleSet, calendar: &'a BusinessCalendar, as_of: NaiveDate) -> Self {
        Self {
            rules,
            calendar,
            as_of,
            period_close: calendar.period_clearing_date(as_of),
        }
    }

    pub fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Clear every scope of `store`.
    ///
    /// Rejected rows become diagnostics. Scopes of a company code with a
    /// rejected row are not matched at all.
    pub fn run(&self, store: &OpenItemStore) -> EngineOutput {
        let mut output = EngineOutput {
            diagnostics: store.rejected().iter().map(Diagnostic::from).collect(),
            ..EngineOutput::default()
        };

        let scopes = store.scopes();
        let outcomes: Vec<EngineOutput> = scopes
            .par_iter()
            .map(|scope| {
                let items = store.scope_items(scope);
                if store.is_tainted(&scope.company_code) {
                    self.skip_scope(scope, &items)
                } else {
                    self.clear_scope(scope, &items)
                }
            })
            .collect();

        for outcome in outcomes {
            output.append(outcome);
        }

        info!(
            "Cleared {} items in {} groups across {} scopes, {} left open",
            output.cleared_item_count(),
            output.groups.len(),
            scopes.len(),
            output.unmatched.len()
        );
        output
    }

    fn skip_scope(&self, scope: &ScopeKey, items: &[&OpenItem]) -> EngineOutput {
        info!("Scope {}: skipped, the export holds malformed rows", scope);
        EngineOutput {
            groups: Vec::new(),
            unmatched: items.iter().map(|&item| item.clone()).collect(),
            diagnostics: vec![Diagnostic::ScopeSkipped {
                scope: scope.clone(),
                reason: "company code has malformed ledger rows".to_string(),
            }],
        }
    }

    /// Clear the items of one scope, given in input order.
    pub fn clear_scope(&self, scope: &ScopeKey, items: &[&OpenItem]) -> EngineOutput {
        let mut output = EngineOutput::default();
        let rules = self.rules.rules_for(&scope.company_code, &scope.country);

        if rules.is_empty() {
            info!("Scope {}: no clearing rule applies", scope);
            output.unmatched = items.iter().map(|&item| item.clone()).collect();
            output.diagnostics.push(Diagnostic::NoApplicableRule {
                scope: scope.clone(),
            });
            return output;
        }

        let mut consumed = vec![false; items.len()];
        let mut retired = vec![false; items.len()];

        for rule in rules {
            let candidates = (0..items.len()).filter(|&pos| {
                !consumed[pos] && !retired[pos] && rule.admits(items[pos], self.as_of)
            });
            let (arena, skipped) = BucketArena::build(rule, items, candidates);
            if !skipped.is_empty() {
                debug!(
                    "Scope {}: {} items lack a match key of rule '{}'",
                    scope,
                    skipped.len(),
                    rule.id
                );
            }

            let mut date_reported = false;
            for bucket in arena.buckets() {
                if bucket.members.len() < 2 {
                    continue;
                }
                let emitted = output.groups.len();
                for &strategy in &rule.strategies {
                    let open: Vec<usize> = bucket
                        .members
                        .iter()
                        .copied()
                        .filter(|&pos| !consumed[pos])
                        .collect();
                    if open.len() < 2 {
                        break;
                    }

                    for candidate in closure::propose(strategy, &open, items, rule.amount_tolerance)
                    {
                        let members: Vec<&OpenItem> =
                            candidate.iter().map(|&pos| items[pos]).collect();
                        match self.build_group(rule, strategy, &members) {
                            Ok(group) => {
                                for &pos in &candidate {
                                    consumed[pos] = true;
                                }
                                output.groups.push(group);
                            }
                            Err(Rejection::Tolerance(violation)) => {
                                debug!("Scope {}: candidate dropped: {}", scope, violation);
                            }
                            Err(Rejection::Calendar(err)) => {
                                if !date_reported {
                                    output.diagnostics.push(
                                        Diagnostic::ClearingDateUnavailable {
                                            scope: scope.clone(),
                                            rule: rule.id.clone(),
                                            reason: err.to_string(),
                                        },
                                    );
                                    date_reported = true;
                                }
                            }
                        }
                    }
                }
                if output.groups.len() > emitted {
                    for &pos in &bucket.members {
                        retired[pos] = true;
                    }
                }
            }
        }

        output.unmatched = items
            .iter()
            .zip(&consumed)
            .filter(|(_, &used)| !used)
            .map(|(&item, _)| item.clone())
            .collect();

        info!(
            "Scope {}: {} groups, {} items unmatched",
            scope,
            output.groups.len(),
            output.unmatched.len()
        );
        output
    }

    fn build_group(
        &self,
        rule: &ClearingRule,
        strategy: ClosureStrategy,
        members: &[&OpenItem],
    ) -> Result<ClearingGroup, Rejection> {
        let date = self.clearing_date(rule, members).map_err(Rejection::Calendar)?;
        ClearingGroup::new(rule, strategy, members, date).map_err(Rejection::Tolerance)
    }

    /// Clearing date of a candidate under `rule`.
    pub fn clearing_date(
        &self,
        rule: &ClearingRule,
        members: &[&OpenItem],
    ) -> Result<NaiveDate, CalendarError> {
        let latest = members
            .iter()
            .map(|m| m.posting_date())
            .max()
            .unwrap_or(self.as_of);

        let date = match rule.clearing_date {
            ClearingDateBasis::LatestPosting => latest,
            ClearingDateBasis::PeriodClose => latest.max(self.period_close.clone()?),
        };

        if rule.requires_business_day {
            self.calendar.roll_forward(date)
        } else {
            Ok(date)
        }
    }
}
