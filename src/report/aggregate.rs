use crate::core::amount::Amount;
use crate::core::item::OpenItem;
use crate::core::scope::CompanyCode;
use crate::engine::diagnostic::Diagnostic;
use crate::engine::group::ClearingGroup;
use crate::report::org_chart::OrgChart;
use crate::rules::rule_set::RuleSet;
use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Outcome of a clearing run for one company code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompanyStatus {
    /// At least one group was emitted.
    Cleared,
    /// Open items exist but none could be cleared.
    NothingCleared,
    /// The export held no items for the company code.
    NoOpenItems,
    /// A diagnostic was raised for the company code.
    Failed,
}

/// Which notification variant a user should receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    General,
    NoOpenItems,
}

/// Cleared and open item counts for one account and currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub account: String,
    pub currency: String,
    pub cleared_items: usize,
    pub open_items: usize,
    /// Gross (debit side) amount of the cleared groups.
    pub cleared_amount: Amount,
}

/// Everything one company code contributes to a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanySummary {
    pub company_code: CompanyCode,
    pub status: CompanyStatus,
    /// Groups in engine emission order.
    pub groups: Vec<ClearingGroup>,
    pub unmatched: Vec<OpenItem>,
    pub cleared_item_count: usize,
    pub unmatched_count: usize,
    /// One row per account and currency, ascending.
    pub accounts: Vec<AccountSummary>,
}

impl CompanySummary {
    fn new(company_code: CompanyCode) -> Self {
        Self {
            company_code,
            status: CompanyStatus::NoOpenItems,
            groups: Vec::new(),
            unmatched: Vec::new(),
            cleared_item_count: 0,
            unmatched_count: 0,
            accounts: Vec::new(),
        }
    }

    fn finish(&mut self) {
        let mut accounts: BTreeMap<(String, String), AccountSummary> = BTreeMap::new();
        for group in &self.groups {
            let row = accounts
                .entry((group.account().to_string(), group.currency().to_string()))
                .or_insert_with(|| AccountSummary::empty(group.account(), group.currency()));
            row.cleared_items += group.len();
            row.cleared_amount += group.gross_amount();
        }
        for item in &self.unmatched {
            accounts
                .entry((item.account().to_string(), item.currency().to_string()))
                .or_insert_with(|| AccountSummary::empty(item.account(), item.currency()))
                .open_items += 1;
        }

        self.cleared_item_count = self.groups.iter().map(|g| g.len()).sum();
        self.unmatched_count = self.unmatched.len();
        self.accounts = accounts.into_values().collect();
        self.status = if !self.groups.is_empty() {
            CompanyStatus::Cleared
        } else if !self.unmatched.is_empty() {
            CompanyStatus::NothingCleared
        } else {
            CompanyStatus::NoOpenItems
        };
    }

    /// Clearing rate as a fraction of the company's items.
    pub fn cleared_ratio(&self) -> f64 {
        let total = self.cleared_item_count + self.unmatched_count;
        if total == 0 {
            return 0.0;
        }
        self.cleared_item_count as f64 / total as f64
    }
}

impl AccountSummary {
    fn empty(account: &str, currency: &str) -> Self {
        Self {
            account: account.to_string(),
            currency: currency.to_string(),
            cleared_items: 0,
            open_items: 0,
            cleared_amount: Amount::ZERO,
        }
    }
}

/// One company code as seen by a notified user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCompany {
    pub company_code: CompanyCode,
    pub status: CompanyStatus,
    pub cleared_item_count: usize,
    pub unmatched_count: usize,
}

/// The companies a user is notified about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub name: String,
    pub surname: String,
    pub email: String,
    /// Ascending by company code.
    pub companies: Vec<UserCompany>,
}

impl UserSummary {
    pub fn notification_kind(&self) -> NotificationKind {
        if self
            .companies
            .iter()
            .all(|c| c.status == CompanyStatus::NoOpenItems)
        {
            NotificationKind::NoOpenItems
        } else {
            NotificationKind::General
        }
    }
}

/// The complete, renderable result of one clearing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearingRunResult {
    pub run_id: Uuid,
    pub as_of: NaiveDate,
    pub groups: Vec<ClearingGroup>,
    pub unmatched_items: Vec<OpenItem>,
    /// Ascending by company code.
    pub companies: Vec<CompanySummary>,
    /// Keyed by email.
    pub per_user_summary: BTreeMap<String, UserSummary>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ClearingRunResult {
    /// Attach run diagnostics, flagging every affected company as failed.
    pub fn with_diagnostics(mut self, diagnostics: Vec<Diagnostic>) -> Self {
        let failed: BTreeSet<CompanyCode> = diagnostics
            .iter()
            .filter_map(|d| d.company_code().cloned())
            .collect();

        for code in &failed {
            match self.companies.binary_search_by(|c| c.company_code.cmp(code)) {
                Ok(index) => self.companies[index].status = CompanyStatus::Failed,
                Err(index) => {
                    let mut summary = CompanySummary::new(code.clone());
                    summary.status = CompanyStatus::Failed;
                    self.companies.insert(index, summary);
                }
            }
        }
        for user in self.per_user_summary.values_mut() {
            for company in &mut user.companies {
                if failed.contains(&company.company_code) {
                    company.status = CompanyStatus::Failed;
                }
            }
        }

        self.diagnostics.extend(diagnostics);
        self
    }

    pub fn company(&self, code: &CompanyCode) -> Option<&CompanySummary> {
        self.companies.iter().find(|c| &c.company_code == code)
    }

    pub fn cleared_item_count(&self) -> usize {
        self.groups.iter().map(|g| g.len()).sum()
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

impl std::fmt::Display for ClearingRunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Clearing Run {} ===", self.run_id)?;
        writeln!(f, "As of:          {}", self.as_of)?;
        writeln!(f, "Groups:         {}", self.groups.len())?;
        writeln!(f, "Cleared items:  {}", self.cleared_item_count())?;
        writeln!(f, "Open items:     {}", self.unmatched_items.len())?;
        writeln!(f, "Diagnostics:    {}", self.diagnostics.len())?;

        for company in &self.companies {
            writeln!(f, "\n--- {} ({:?}) ---", company.company_code, company.status)?;
            writeln!(
                f,
                "  Cleared: {} items in {} groups ({:.1}%)",
                company.cleared_item_count,
                company.groups.len(),
                company.cleared_ratio() * 100.0
            )?;
            writeln!(f, "  Open:    {}", company.unmatched_count)?;
            for account in &company.accounts {
                writeln!(
                    f,
                    "  {} {}: {} cleared ({}), {} open",
                    account.account,
                    account.currency,
                    account.cleared_items,
                    account.cleared_amount,
                    account.open_items
                )?;
            }
        }

        if !self.per_user_summary.is_empty() {
            writeln!(f, "\nNotifications:")?;
            for (email, user) in &self.per_user_summary {
                let codes: Vec<&str> = user
                    .companies
                    .iter()
                    .map(|c| c.company_code.as_str())
                    .collect();
                writeln!(
                    f,
                    "  {} ({:?}): {}",
                    email,
                    user.notification_kind(),
                    codes.join(", ")
                )?;
            }
        }

        if !self.diagnostics.is_empty() {
            writeln!(f, "\nDiagnostics:")?;
            for diagnostic in &self.diagnostics {
                writeln!(f, "  {}", diagnostic)?;
            }
        }
        Ok(())
    }
}

/// Partitions engine output per company code and maps it to users.
pub struct ResultAggregator {
    as_of: NaiveDate,
}

impl ResultAggregator {
    pub fn new(as_of: NaiveDate) -> Self {
        Self { as_of }
    }

    /// Build the run result.
    ///
    /// Companies are the union of the codes in `groups`, in `unmatched`
    /// and named exactly by `rules`, so a company with nothing to clear
    /// still gets a summary.
    pub fn aggregate(
        &self,
        groups: Vec<ClearingGroup>,
        unmatched: Vec<OpenItem>,
        rules: &RuleSet,
        org_chart: &OrgChart,
    ) -> ClearingRunResult {
        let mut companies: BTreeMap<CompanyCode, CompanySummary> = rules
            .company_codes()
            .into_iter()
            .map(|code| (code.clone(), CompanySummary::new(code)))
            .collect();

        for group in &groups {
            companies
                .entry(group.company_code().clone())
                .or_insert_with(|| CompanySummary::new(group.company_code().clone()))
                .groups
                .push(group.clone());
        }
        for item in &unmatched {
            companies
                .entry(item.company_code().clone())
                .or_insert_with(|| CompanySummary::new(item.company_code().clone()))
                .unmatched
                .push(item.clone());
        }

        let mut companies: Vec<CompanySummary> = companies.into_values().collect();
        for company in &mut companies {
            company.finish();
        }

        let per_user_summary = Self::user_summaries(&companies, org_chart);
        info!(
            "Aggregated {} companies for {} users",
            companies.len(),
            per_user_summary.len()
        );

        ClearingRunResult {
            run_id: Uuid::new_v4(),
            as_of: self.as_of,
            groups,
            unmatched_items: unmatched,
            companies,
            per_user_summary,
            diagnostics: Vec::new(),
        }
    }

    fn user_summaries(
        companies: &[CompanySummary],
        org_chart: &OrgChart,
    ) -> BTreeMap<String, UserSummary> {
        let mut summaries = BTreeMap::new();

        for user in org_chart.users() {
            if !user.send {
                warn!("User {} is excluded from notifications", user.email);
                continue;
            }
            let covered: Vec<UserCompany> = companies
                .iter()
                .filter(|c| user.covers(&c.company_code))
                .map(|c| UserCompany {
                    company_code: c.company_code.clone(),
                    status: c.status,
                    cleared_item_count: c.cleared_item_count,
                    unmatched_count: c.unmatched_count,
                })
                .collect();
            if covered.is_empty() {
                warn!(
                    "User {} covers none of the cleared company codes {:?}",
                    user.email, user.company_codes
                );
                continue;
            }
            summaries.insert(
                user.email.clone(),
                UserSummary {
                    name: user.name.clone(),
                    surname: user.surname.clone(),
                    email: user.email.clone(),
                    companies: covered,
                },
            );
        }

        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::item::ItemId;
    use crate::core::scope::{Country, ScopeKey};
    use crate::report::org_chart::User;
    use crate::rules::rule::{ClearingRule, ClosureStrategy, RuleScope};
    use rust_decimal_macros::dec;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
    }

    fn item(id: usize, cocd: &str, account: &str, minor: i64) -> OpenItem {
        OpenItem::new(
            ItemId(id),
            id.to_string(),
            cocd,
            "DE",
            account,
            Amount::from_minor(minor),
            date(),
        )
        .with_currency("EUR")
    }

    fn group(rule: &ClearingRule, a: &OpenItem, b: &OpenItem) -> ClearingGroup {
        ClearingGroup::new(rule, ClosureStrategy::Pair, &[a, b], date()).unwrap()
    }

    fn rules() -> RuleSet {
        RuleSet::new(vec![
            ClearingRule::new("a", RuleScope::company("1000")),
            ClearingRule::new("b", RuleScope::company("3000")),
            ClearingRule::new("any", RuleScope::wildcard()),
        ])
    }

    fn chart() -> OrgChart {
        OrgChart::new(vec![
            User::new("Jana", "Novak", "jana@example.com").with_company_codes(["1000", "2000"]),
            User::new("Petr", "Svoboda", "petr@example.com").with_company_codes(["3000"]),
            User::new("Eva", "Dvorak", "eva@example.com")
                .with_company_codes(["1000"])
                .with_send(false),
            User::new("Karel", "Cerny", "karel@example.com").with_company_codes(["9000"]),
        ])
    }

    #[test]
    fn test_company_partition_and_status() {
        let rule = ClearingRule::new("a", RuleScope::company("1000"));
        let a = item(0, "1000", "24182000", 125_050);
        let b = item(1, "1000", "24182000", -125_050);
        let open = item(2, "1000", "24183000", 700);
        let stray = item(3, "2000", "24182000", 100);

        let result = ResultAggregator::new(date()).aggregate(
            vec![group(&rule, &a, &b)],
            vec![open, stray],
            &rules(),
            &chart(),
        );

        let codes: Vec<&str> = result
            .companies
            .iter()
            .map(|c| c.company_code.as_str())
            .collect();
        assert_eq!(codes, vec!["1000", "2000", "3000"]);

        let c1000 = &result.companies[0];
        assert_eq!(c1000.status, CompanyStatus::Cleared);
        assert_eq!(c1000.cleared_item_count, 2);
        assert_eq!(c1000.unmatched_count, 1);
        assert_eq!(c1000.accounts.len(), 2);
        assert_eq!(c1000.accounts[0].cleared_amount.to_decimal(), dec!(1250.50));
        assert_eq!(c1000.accounts[1].open_items, 1);

        assert_eq!(result.companies[1].status, CompanyStatus::NothingCleared);
        assert_eq!(result.companies[2].status, CompanyStatus::NoOpenItems);
    }

    #[test]
    fn test_user_summaries() {
        let result = ResultAggregator::new(date()).aggregate(
            Vec::new(),
            vec![item(0, "1000", "24182000", 100)],
            &rules(),
            &chart(),
        );

        let emails: Vec<&String> = result.per_user_summary.keys().collect();
        assert_eq!(emails, vec!["jana@example.com", "petr@example.com"]);

        let jana = &result.per_user_summary["jana@example.com"];
        assert_eq!(jana.companies.len(), 1);
        assert_eq!(jana.notification_kind(), NotificationKind::General);

        let petr = &result.per_user_summary["petr@example.com"];
        assert_eq!(petr.notification_kind(), NotificationKind::NoOpenItems);
    }

    #[test]
    fn test_diagnostics_flag_failed() {
        let result = ResultAggregator::new(date())
            .aggregate(Vec::new(), Vec::new(), &rules(), &chart())
            .with_diagnostics(vec![
                Diagnostic::ScopeSkipped {
                    scope: ScopeKey::new(CompanyCode::new("1000"), Country::new("DE")),
                    reason: "malformed rows".into(),
                },
                Diagnostic::MalformedRow {
                    row: 7,
                    company_code: Some(CompanyCode::new("2000")),
                    reason: "amount: empty amount".into(),
                },
            ]);

        let codes: Vec<(&str, CompanyStatus)> = result
            .companies
            .iter()
            .map(|c| (c.company_code.as_str(), c.status))
            .collect();
        assert_eq!(
            codes,
            vec![
                ("1000", CompanyStatus::Failed),
                ("2000", CompanyStatus::Failed),
                ("3000", CompanyStatus::NoOpenItems),
            ]
        );
        let jana = &result.per_user_summary["jana@example.com"];
        assert_eq!(jana.companies[0].status, CompanyStatus::Failed);
        assert!(result.has_diagnostics());
    }

    #[test]
    fn test_display_and_json() {
        let rule = ClearingRule::new("a", RuleScope::company("1000"));
        let a = item(0, "1000", "24182000", 500);
        let b = item(1, "1000", "24182000", -500);
        let result = ResultAggregator::new(date()).aggregate(
            vec![group(&rule, &a, &b)],
            Vec::new(),
            &rules(),
            &OrgChart::default(),
        );

        let text = result.to_string();
        assert!(text.contains("Groups:         1"));
        assert!(text.contains("--- 1000 (Cleared) ---"));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["companies"][0]["status"], "cleared");
        assert_eq!(json["groups"][0]["net_amount"], 0);
        assert_eq!(json["as_of"], "2024-06-28");
    }
}
