use crate::core::scope::{CompanyCode, Country};
use crate::rules::rule::{
    ClearingDateBasis, ClearingRule, ClosureStrategy, CompanyCodePattern, MatchKey, RuleScope,
};
use log::{info, warn};
use serde::Deserialize;
use serde_yaml::Value;
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors arising from loading a rules document. All of them are fatal
/// to a clearing run.
#[derive(Debug, Error)]
pub enum RuleParseError {
    #[error("cannot read rules document: {0}")]
    Io(#[from] std::io::Error),
    #[error("rules document is malformed: {0}")]
    Syntax(#[from] serde_yaml::Error),
    #[error("rule #{index} has no id")]
    MissingId { index: usize },
    #[error("rule '{rule}' is declared more than once")]
    DuplicateId { rule: String },
    #[error("rule '{rule}' has no scope")]
    MissingScope { rule: String },
    #[error("rule '{rule}' has an invalid company code pattern '{pattern}'")]
    InvalidPattern { rule: String, pattern: String },
    #[error("rule '{rule}' has a non-numeric or negative amount tolerance '{value}'")]
    InvalidTolerance { rule: String, value: String },
    #[error("rule '{rule}' has an invalid max age '{value}'")]
    InvalidMaxAge { rule: String, value: String },
    #[error("rule '{rule}' references unknown field '{field}'")]
    UnknownField { rule: String, field: String },
    #[error("rule '{rule}' uses unknown closure strategy '{strategy}'")]
    UnknownStrategy { rule: String, strategy: String },
    #[error("rule '{rule}' lists no closure strategies")]
    EmptyStrategies { rule: String },
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    #[serde(default)]
    rules: Vec<RawRule>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRule {
    id: Option<Value>,
    scope: Option<RawScope>,
    #[serde(default)]
    match_keys: Vec<String>,
    amount_tolerance: Option<Value>,
    max_age_days: Option<Value>,
    #[serde(default)]
    requires_business_day: bool,
    strategies: Option<Vec<String>>,
    #[serde(default)]
    clearing_date: ClearingDateBasis,
    #[serde(default)]
    accounts: Vec<Value>,
    #[serde(default)]
    trading_partners: Vec<Value>,
    #[serde(default = "default_active")]
    active: bool,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawScope {
    company_code: Option<Value>,
    country: Option<String>,
}

fn default_active() -> bool {
    true
}

/// Render a YAML scalar as text. Unquoted account numbers and company
/// codes arrive as numbers.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    scalar_string(value).unwrap_or_else(|| format!("{:?}", value))
}

fn parse_unsigned(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl RawRule {
    fn validate(self, index: usize) -> Result<(ClearingRule, bool), RuleParseError> {
        let id = self
            .id
            .as_ref()
            .and_then(scalar_string)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(RuleParseError::MissingId { index })?;

        let raw_scope = self
            .scope
            .ok_or_else(|| RuleParseError::MissingScope { rule: id.clone() })?;
        let pattern_text = raw_scope
            .company_code
            .as_ref()
            .and_then(scalar_string)
            .unwrap_or_default();
        let pattern = CompanyCodePattern::parse(&pattern_text).ok_or_else(|| {
            RuleParseError::InvalidPattern {
                rule: id.clone(),
                pattern: pattern_text.clone(),
            }
        })?;
        let country = raw_scope
            .country
            .filter(|c| !c.trim().is_empty() && c.trim() != "*")
            .map(Country::new);

        let match_keys = self
            .match_keys
            .iter()
            .map(|name| {
                MatchKey::parse(name).ok_or_else(|| RuleParseError::UnknownField {
                    rule: id.clone(),
                    field: name.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let amount_tolerance = match &self.amount_tolerance {
            None | Some(Value::Null) => 0,
            Some(value) => parse_unsigned(value).ok_or_else(|| RuleParseError::InvalidTolerance {
                rule: id.clone(),
                value: describe(value),
            })?,
        };

        let max_age_days = match &self.max_age_days {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                parse_unsigned(value)
                    .and_then(|v| u32::try_from(v).ok())
                    .ok_or_else(|| RuleParseError::InvalidMaxAge {
                        rule: id.clone(),
                        value: describe(value),
                    })?,
            ),
        };

        let strategies = match self.strategies {
            None => ClearingRule::DEFAULT_STRATEGIES.to_vec(),
            Some(names) => {
                let mut parsed: Vec<ClosureStrategy> = Vec::new();
                for name in &names {
                    let strategy = ClosureStrategy::parse(name).ok_or_else(|| {
                        RuleParseError::UnknownStrategy {
                            rule: id.clone(),
                            strategy: name.clone(),
                        }
                    })?;
                    if !parsed.contains(&strategy) {
                        parsed.push(strategy);
                    }
                }
                if parsed.is_empty() {
                    return Err(RuleParseError::EmptyStrategies { rule: id });
                }
                parsed
            }
        };

        let accounts: Vec<String> = self.accounts.iter().filter_map(scalar_string).collect();
        let partners: Vec<String> = self
            .trading_partners
            .iter()
            .filter_map(scalar_string)
            .collect();

        let rule = ClearingRule::new(id, RuleScope::new(pattern, country))
            .with_match_keys(match_keys)
            .with_tolerance(amount_tolerance)
            .with_business_day(self.requires_business_day)
            .with_strategies(strategies)
            .with_clearing_date(self.clearing_date)
            .with_accounts(accounts)
            .with_trading_partners(partners);
        let rule = match max_age_days {
            Some(days) => rule.with_max_age_days(days),
            None => rule,
        };

        Ok((rule, self.active))
    }
}

/// The ordered, validated clearing rules of a run.
///
/// Declaration order is preserved; it is the tie-break between rules of
/// equal scope specificity.
///
/// # Examples
///
/// ```
/// use gl_clearing::rules::rule_set::RuleSet;
/// use gl_clearing::core::scope::{CompanyCode, Country};
///
/// let rules = RuleSet::load(r#"
/// rules:
///   - id: any
///     scope: { company_code: "*" }
///   - id: exact
///     scope: { company_code: "1000" }
///     match_keys: [reference]
/// "#).unwrap();
///
/// let ids: Vec<&str> = rules
///     .rules_for(&CompanyCode::new("1000"), &Country::new("DE"))
///     .iter()
///     .map(|r| r.id.as_str())
///     .collect();
/// assert_eq!(ids, vec!["exact", "any"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ClearingRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<ClearingRule>) -> Self {
        Self { rules }
    }

    /// Parse a YAML rules document.
    pub fn load(source: &str) -> Result<Self, RuleParseError> {
        let document: RawDocument = serde_yaml::from_str(source)?;

        let mut seen: HashSet<String> = HashSet::new();
        let mut rules = Vec::new();
        let mut inactive = 0usize;

        for (index, raw) in document.rules.into_iter().enumerate() {
            let (rule, active) = raw.validate(index)?;
            if !seen.insert(rule.id.clone()) {
                return Err(RuleParseError::DuplicateId { rule: rule.id });
            }
            if !active {
                warn!(
                    "Rule '{}' ({}) excluded from clearing according to the rules document",
                    rule.id, rule.scope
                );
                inactive += 1;
                continue;
            }
            rules.push(rule);
        }

        if rules.is_empty() {
            warn!("No active clearing rule found");
        }
        info!(
            "Loaded {} clearing rules ({} inactive skipped)",
            rules.len(),
            inactive
        );
        Ok(Self { rules })
    }

    /// Read and parse a YAML rules document from disk.
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, RuleParseError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::load(&content)
    }

    pub fn rules(&self) -> &[ClearingRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&ClearingRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Rules applying to a scope, most specific first. Rules of equal
    /// specificity keep their declaration order.
    pub fn rules_for(&self, company_code: &CompanyCode, country: &Country) -> Vec<&ClearingRule> {
        let mut matching: Vec<&ClearingRule> = self
            .rules
            .iter()
            .filter(|r| r.scope.matches(company_code, country))
            .collect();
        // sort_by_key is stable
        matching.sort_by_key(|r| Reverse(r.scope.specificity()));
        matching
    }

    /// Company codes named exactly by some rule, ascending.
    pub fn company_codes(&self) -> Vec<CompanyCode> {
        let codes: BTreeSet<CompanyCode> = self
            .rules
            .iter()
            .filter_map(|r| match &r.scope.company_code {
                CompanyCodePattern::Exact(code) => Some(code.clone()),
                _ => None,
            })
            .collect();
        codes.into_iter().collect()
    }
}
