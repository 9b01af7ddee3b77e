//! Synthetic ledger exports for stress testing the clearing engine.
//!
//! Generated ledgers mix offsetting pairs, split payments that only a
//! full-bucket closure can clear, and stray items with no counterpart.

use crate::core::amount::Amount;
use crate::core::ledger_row::LedgerRow;
use crate::core::scope::{CompanyCode, Country};
use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Configuration for generating a random ledger export.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Company codes with their countries.
    pub scopes: Vec<(CompanyCode, Country)>,
    pub accounts: Vec<String>,
    pub currencies: Vec<String>,
    /// Approximate number of rows to generate.
    pub item_count: usize,
    /// Share of documents generated as two-item offsets.
    pub pair_ratio: f64,
    /// Share of documents generated as one debit against two credits.
    pub split_ratio: f64,
    /// Posting dates are drawn from `start_date` onwards.
    pub start_date: NaiveDate,
    pub posting_days: i64,
    /// Amount range in minor units.
    pub min_minor: i64,
    pub max_minor: i64,
    /// Fixed seed for reproducible ledgers.
    pub seed: Option<u64>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            scopes: vec![
                (CompanyCode::new("1000"), Country::new("DE")),
                (CompanyCode::new("2000"), Country::new("FR")),
            ],
            accounts: vec!["24182000".to_string()],
            currencies: vec!["EUR".to_string()],
            item_count: 1_000,
            pair_ratio: 0.6,
            split_ratio: 0.2,
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_default(),
            posting_days: 28,
            min_minor: 1_00,
            max_minor: 1_000_000_00,
            seed: None,
        }
    }
}

impl LedgerConfig {
    /// Override the scopes from `CODE:COUNTRY` entries; a bare code gets
    /// country `DE`.
    pub fn with_scope_list(mut self, entries: &[String]) -> Self {
        self.scopes = entries
            .iter()
            .filter(|e| !e.trim().is_empty())
            .map(|entry| match entry.split_once(':') {
                Some((code, country)) => (CompanyCode::new(code), Country::new(country)),
                None => (CompanyCode::new(entry.as_str()), Country::new("DE")),
            })
            .collect();
        self
    }
}

struct RowFactory<'a> {
    config: &'a LedgerConfig,
    rng: StdRng,
    next_document: u64,
}

impl RowFactory<'_> {
    fn row(
        &mut self,
        scope: &(CompanyCode, Country),
        account: &str,
        currency: &str,
        minor: i64,
        reference: &str,
    ) -> LedgerRow {
        let offset = self.rng.gen_range(0..self.config.posting_days.max(1));
        let posted = self.config.start_date + Duration::days(offset);
        self.next_document += 1;
        LedgerRow {
            document_id: format!("19{:08}", self.next_document),
            company_code: scope.0.to_string(),
            country: scope.1.to_string(),
            account: account.to_string(),
            amount: Amount::from_minor(minor).to_string(),
            currency: currency.to_string(),
            posting_date: posted.format("%Y-%m-%d").to_string(),
            reference: reference.to_string(),
            ..Default::default()
        }
    }

    fn amount(&mut self) -> i64 {
        let low = self.config.min_minor.max(2);
        let high = self.config.max_minor.max(low + 1);
        self.rng.gen_range(low..high)
    }
}

/// Generate a shuffled ledger export.
pub fn generate_ledger(config: &LedgerConfig) -> Vec<LedgerRow> {
    if config.scopes.is_empty() || config.accounts.is_empty() || config.currencies.is_empty() {
        return Vec::new();
    }

    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut factory = RowFactory {
        config,
        rng,
        next_document: 0,
    };
    let mut rows = Vec::with_capacity(config.item_count + 2);
    let mut case = 0usize;

    while rows.len() < config.item_count {
        case += 1;
        let scope = &config.scopes[factory.rng.gen_range(0..config.scopes.len())];
        let account = &config.accounts[factory.rng.gen_range(0..config.accounts.len())];
        let currency = &config.currencies[factory.rng.gen_range(0..config.currencies.len())];
        let reference = format!("REF-{:06}", case);
        let amount = factory.amount();
        let draw: f64 = factory.rng.gen();

        if draw < config.pair_ratio {
            rows.push(factory.row(scope, account, currency, amount, &reference));
            rows.push(factory.row(scope, account, currency, -amount, &reference));
        } else if draw < config.pair_ratio + config.split_ratio {
            let part = factory.rng.gen_range(1..amount);
            rows.push(factory.row(scope, account, currency, amount, &reference));
            rows.push(factory.row(scope, account, currency, -part, &reference));
            rows.push(factory.row(scope, account, currency, part - amount, &reference));
        } else {
            let sign = if factory.rng.gen_bool(0.5) { 1 } else { -1 };
            rows.push(factory.row(scope, account, currency, sign * amount, &reference));
        }
    }

    rows.shuffle(&mut factory.rng);
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::OpenItemStore;

    #[test]
    fn test_generated_rows_are_valid() {
        let config = LedgerConfig {
            item_count: 200,
            seed: Some(7),
            ..Default::default()
        };
        let rows = generate_ledger(&config);
        assert!(rows.len() >= 200);

        let store = OpenItemStore::load(&rows).unwrap();
        assert_eq!(store.len(), rows.len());
        assert_eq!(store.company_codes().len(), 2);
    }

    #[test]
    fn test_seed_reproducible() {
        let config = LedgerConfig {
            item_count: 50,
            seed: Some(42),
            ..Default::default()
        };
        assert_eq!(generate_ledger(&config), generate_ledger(&config));
    }

    #[test]
    fn test_scope_list() {
        let config = LedgerConfig::default()
            .with_scope_list(&["1000:de".to_string(), "3000".to_string()]);
        assert_eq!(config.scopes[0].1, Country::new("DE"));
        assert_eq!(config.scopes[1].0, CompanyCode::new("3000"));
    }

    #[test]
    fn test_empty_scopes() {
        let config = LedgerConfig {
            scopes: Vec::new(),
            ..Default::default()
        };
        assert!(generate_ledger(&config).is_empty());
    }
}
