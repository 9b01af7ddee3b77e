use crate::core::item::OpenItem;
use crate::core::scope::{CompanyCode, Country};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which company codes a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompanyCodePattern {
    /// `*` or empty: every company code.
    Any,
    /// `10*`: every company code starting with the prefix.
    Prefix(String),
    /// A single company code.
    Exact(CompanyCode),
}

impl CompanyCodePattern {
    /// Parse a pattern. Returns `None` when `*` appears anywhere but at
    /// the end.
    pub fn parse(pattern: &str) -> Option<Self> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Some(Self::Any);
        }
        match trimmed.strip_suffix('*') {
            Some(prefix) if !prefix.contains('*') => Some(Self::Prefix(prefix.to_string())),
            Some(_) => None,
            None if trimmed.contains('*') => None,
            None => Some(Self::Exact(CompanyCode::new(trimmed))),
        }
    }

    pub fn matches(&self, code: &CompanyCode) -> bool {
        match self {
            Self::Any => true,
            Self::Prefix(prefix) => code.as_str().starts_with(prefix.as_str()),
            Self::Exact(exact) => exact == code,
        }
    }
}

impl fmt::Display for CompanyCodePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Prefix(prefix) => write!(f, "{}*", prefix),
            Self::Exact(code) => write!(f, "{}", code),
        }
    }
}

/// How narrowly a rule scope targets a company code.
///
/// Variants are declared from least to most specific, so the derived
/// ordering ranks them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Specificity {
    Wildcard,
    Country,
    CompanyPrefix,
    CompanyExact,
}

/// The organizational scope a rule applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleScope {
    pub company_code: CompanyCodePattern,
    pub country: Option<Country>,
}

impl RuleScope {
    pub fn new(company_code: CompanyCodePattern, country: Option<Country>) -> Self {
        Self {
            company_code,
            country,
        }
    }

    /// Scope matching exactly one company code in any country.
    pub fn company(code: &str) -> Self {
        Self::new(CompanyCodePattern::Exact(CompanyCode::new(code)), None)
    }

    /// Scope matching every company code of a country.
    pub fn country(country: &str) -> Self {
        Self::new(CompanyCodePattern::Any, Some(Country::new(country)))
    }

    pub fn wildcard() -> Self {
        Self::new(CompanyCodePattern::Any, None)
    }

    pub fn matches(&self, company_code: &CompanyCode, country: &Country) -> bool {
        self.company_code.matches(company_code)
            && self.country.as_ref().map_or(true, |c| c == country)
    }

    pub fn specificity(&self) -> Specificity {
        match (&self.company_code, &self.country) {
            (CompanyCodePattern::Exact(_), _) => Specificity::CompanyExact,
            (CompanyCodePattern::Prefix(_), _) => Specificity::CompanyPrefix,
            (CompanyCodePattern::Any, Some(_)) => Specificity::Country,
            (CompanyCodePattern::Any, None) => Specificity::Wildcard,
        }
    }
}

impl fmt::Display for RuleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.country {
            Some(country) => write!(f, "{}/{}", self.company_code, country),
            None => write!(f, "{}/*", self.company_code),
        }
    }
}

/// An item field used to bucket candidate items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchKey {
    Reference,
    AssignmentKey,
    DocumentId,
    DueDate,
    PostingDate,
    TradingPartner,
    Text,
}

impl MatchKey {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "reference" => Some(Self::Reference),
            "assignment_key" | "assignment" => Some(Self::AssignmentKey),
            "document_id" => Some(Self::DocumentId),
            "due_date" => Some(Self::DueDate),
            "posting_date" => Some(Self::PostingDate),
            "trading_partner" => Some(Self::TradingPartner),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::AssignmentKey => "assignment_key",
            Self::DocumentId => "document_id",
            Self::DueDate => "due_date",
            Self::PostingDate => "posting_date",
            Self::TradingPartner => "trading_partner",
            Self::Text => "text",
        }
    }

    /// The item's value for this key, or `None` when the field is blank.
    pub fn extract(&self, item: &OpenItem) -> Option<String> {
        let text = match self {
            Self::Reference => item.reference(),
            Self::AssignmentKey => item.assignment_key(),
            Self::DocumentId => item.document_id(),
            Self::TradingPartner => item.trading_partner(),
            Self::Text => item.text(),
            Self::DueDate => return item.due_date().map(|d| d.to_string()),
            Self::PostingDate => return Some(item.posting_date().to_string()),
        };
        (!text.trim().is_empty()).then(|| text.to_string())
    }
}

/// A way of finding a zero-sum subset inside one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureStrategy {
    /// Exact debit/credit offsets of equal magnitude.
    Pair,
    /// All still-open bucket members together.
    FullBucket,
    /// The longest posting-date-ordered prefix that nets to zero.
    RunningBalance,
}

impl ClosureStrategy {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "pair" => Some(Self::Pair),
            "full_bucket" => Some(Self::FullBucket),
            "running_balance" => Some(Self::RunningBalance),
            _ => None,
        }
    }
}

impl fmt::Display for ClosureStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pair => "pair",
            Self::FullBucket => "full_bucket",
            Self::RunningBalance => "running_balance",
        };
        write!(f, "{}", name)
    }
}

/// Where a group's clearing date comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearingDateBasis {
    /// The latest member posting date.
    #[default]
    LatestPosting,
    /// The run's period clearing date, never earlier than the latest
    /// member posting date.
    PeriodClose,
}

/// A validated clearing rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearingRule {
    pub id: String,
    pub scope: RuleScope,
    pub match_keys: Vec<MatchKey>,
    /// Maximum absolute net amount of a group, in minor units.
    pub amount_tolerance: u64,
    /// Items posted more than this many days before the run are ignored.
    pub max_age_days: Option<u32>,
    pub requires_business_day: bool,
    pub strategies: Vec<ClosureStrategy>,
    pub clearing_date: ClearingDateBasis,
    /// Restrict to these accounts; empty means every account.
    pub accounts: Vec<String>,
    /// Restrict to these trading partners; empty means every partner.
    pub trading_partners: Vec<String>,
}

impl ClearingRule {
    pub const DEFAULT_STRATEGIES: [ClosureStrategy; 2] =
        [ClosureStrategy::Pair, ClosureStrategy::FullBucket];

    pub fn new(id: impl Into<String>, scope: RuleScope) -> Self {
        Self {
            id: id.into(),
            scope,
            match_keys: Vec::new(),
            amount_tolerance: 0,
            max_age_days: None,
            requires_business_day: false,
            strategies: Self::DEFAULT_STRATEGIES.to_vec(),
            clearing_date: ClearingDateBasis::default(),
            accounts: Vec::new(),
            trading_partners: Vec::new(),
        }
    }

    pub fn with_match_keys(mut self, keys: impl IntoIterator<Item = MatchKey>) -> Self {
        self.match_keys = keys.into_iter().collect();
        self
    }

    pub fn with_tolerance(mut self, tolerance: u64) -> Self {
        self.amount_tolerance = tolerance;
        self
    }

    pub fn with_max_age_days(mut self, days: u32) -> Self {
        self.max_age_days = Some(days);
        self
    }

    pub fn with_business_day(mut self, required: bool) -> Self {
        self.requires_business_day = required;
        self
    }

    pub fn with_strategies(mut self, strategies: impl IntoIterator<Item = ClosureStrategy>) -> Self {
        self.strategies = strategies.into_iter().collect();
        self
    }

    pub fn with_clearing_date(mut self, basis: ClearingDateBasis) -> Self {
        self.clearing_date = basis;
        self
    }

    pub fn with_accounts<S: Into<String>>(mut self, accounts: impl IntoIterator<Item = S>) -> Self {
        self.accounts = accounts.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_trading_partners<S: Into<String>>(
        mut self,
        partners: impl IntoIterator<Item = S>,
    ) -> Self {
        self.trading_partners = partners.into_iter().map(Into::into).collect();
        self
    }

    /// Whether `item` is a candidate for this rule on a run dated `as_of`.
    pub fn admits(&self, item: &OpenItem, as_of: NaiveDate) -> bool {
        if !self.accounts.is_empty() && !self.accounts.iter().any(|a| a == item.account()) {
            return false;
        }
        if !self.trading_partners.is_empty()
            && !self.trading_partners.iter().any(|p| p == item.trading_partner())
        {
            return false;
        }
        match self.max_age_days {
            Some(max) => item.age_days(as_of) <= i64::from(max),
            None => true,
        }
    }

    /// Match key values for `item`, or `None` if any key field is blank.
    pub fn key_parts(&self, item: &OpenItem) -> Option<Vec<String>> {
        self.match_keys.iter().map(|k| k.extract(item)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::amount::Amount;
    use crate::core::item::ItemId;

    fn item() -> OpenItem {
        OpenItem::new(
            ItemId(0),
            "100",
            "1000",
            "DE",
            "24182000",
            Amount::from_minor(500),
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        )
        .with_reference("R1")
        .with_trading_partner("0073")
    }

    #[test]
    fn test_pattern_parse() {
        assert_eq!(CompanyCodePattern::parse("*"), Some(CompanyCodePattern::Any));
        assert_eq!(CompanyCodePattern::parse(""), Some(CompanyCodePattern::Any));
        assert_eq!(
            CompanyCodePattern::parse("10*"),
            Some(CompanyCodePattern::Prefix("10".into()))
        );
        assert_eq!(
            CompanyCodePattern::parse("1000"),
            Some(CompanyCodePattern::Exact(CompanyCode::new("1000")))
        );
        assert_eq!(CompanyCodePattern::parse("1*0"), None);
        assert_eq!(CompanyCodePattern::parse("**"), None);
    }

    #[test]
    fn test_scope_matching_and_specificity() {
        let code = CompanyCode::new("1052");
        let sk = Country::new("SK");
        let prefix = RuleScope::new(CompanyCodePattern::Prefix("10".into()), None);

        assert!(RuleScope::company("1052").matches(&code, &sk));
        assert!(prefix.matches(&code, &sk));
        assert!(RuleScope::country("SK").matches(&code, &sk));
        assert!(!RuleScope::country("CZ").matches(&code, &sk));
        assert!(RuleScope::wildcard().matches(&code, &sk));

        assert!(RuleScope::company("1052").specificity() > prefix.specificity());
        assert!(prefix.specificity() > RuleScope::country("SK").specificity());
        assert!(RuleScope::country("SK").specificity() > RuleScope::wildcard().specificity());
    }

    #[test]
    fn test_match_key_extraction() {
        let item = item();
        assert_eq!(MatchKey::Reference.extract(&item), Some("R1".to_string()));
        assert_eq!(MatchKey::AssignmentKey.extract(&item), None);
        assert_eq!(MatchKey::DueDate.extract(&item), None);
        assert_eq!(MatchKey::PostingDate.extract(&item), Some("2024-06-03".to_string()));
        assert_eq!(MatchKey::parse("assignment"), Some(MatchKey::AssignmentKey));
        assert_eq!(MatchKey::parse("colour"), None);
    }

    #[test]
    fn test_key_parts_require_every_field() {
        let rule = ClearingRule::new("r", RuleScope::wildcard())
            .with_match_keys([MatchKey::Reference, MatchKey::AssignmentKey]);
        assert_eq!(rule.key_parts(&item()), None);
        assert_eq!(
            rule.key_parts(&item().with_assignment_key("A")),
            Some(vec!["R1".to_string(), "A".to_string()])
        );
    }

    #[test]
    fn test_admits_filters() {
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 13).unwrap();
        let base = ClearingRule::new("r", RuleScope::wildcard());
        assert!(base.admits(&item(), as_of));
        assert!(!base.clone().with_accounts(["1"]).admits(&item(), as_of));
        assert!(base.clone().with_trading_partners(["0073"]).admits(&item(), as_of));
        assert!(!base.clone().with_trading_partners(["0099"]).admits(&item(), as_of));
        assert!(base.clone().with_max_age_days(10).admits(&item(), as_of));
        assert!(!base.with_max_age_days(9).admits(&item(), as_of));
    }
}
