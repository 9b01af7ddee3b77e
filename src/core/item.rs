use crate::core::amount::Amount;
use crate::core::scope::{CompanyCode, Country, ScopeKey};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of an item in the imported ledger export.
///
/// Document numbers are not unique per line (one document can post
/// several open lines to the same account), so items are identified by
/// their input row instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub usize);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An unreconciled general-ledger line awaiting an offset.
///
/// Open items are immutable once imported. The clearing engine only
/// reads them and reports consumption through group membership.
///
/// # Examples
///
/// ```
/// use gl_clearing::core::amount::Amount;
/// use gl_clearing::core::item::{ItemId, OpenItem};
/// use chrono::NaiveDate;
///
/// let item = OpenItem::new(
///     ItemId(0),
///     "1900000001",
///     "1000",
///     "DE",
///     "24182000",
///     Amount::from_minor(100_000),
///     NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
/// )
/// .with_reference("INV-42");
///
/// assert!(item.amount().is_debit());
/// assert_eq!(item.reference(), "INV-42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenItem {
    id: ItemId,
    document_id: String,
    company_code: CompanyCode,
    country: Country,
    account: String,
    currency: String,
    amount: Amount,
    posting_date: NaiveDate,
    due_date: Option<NaiveDate>,
    reference: String,
    /// Right-trimmed only: leading whitespace is significant in SAP assignments.
    assignment_key: String,
    trading_partner: String,
    text: String,
}

impl OpenItem {
    pub fn new(
        id: ItemId,
        document_id: impl Into<String>,
        company_code: impl Into<CompanyCode>,
        country: impl Into<Country>,
        account: impl Into<String>,
        amount: Amount,
        posting_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            document_id: document_id.into().trim().to_string(),
            company_code: company_code.into(),
            country: country.into(),
            account: account.into().trim().to_string(),
            currency: String::new(),
            amount,
            posting_date,
            due_date: None,
            reference: String::new(),
            assignment_key: String::new(),
            trading_partner: String::new(),
            text: String::new(),
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into().trim().to_uppercase();
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into().trim().to_string();
        self
    }

    pub fn with_assignment_key(mut self, assignment_key: impl Into<String>) -> Self {
        self.assignment_key = assignment_key.into().trim_end().to_string();
        self
    }

    pub fn with_trading_partner(mut self, trading_partner: impl Into<String>) -> Self {
        self.trading_partner = trading_partner.into().trim().to_string();
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into().trim().to_string();
        self
    }

    // --- Accessors ---

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn company_code(&self) -> &CompanyCode {
        &self.company_code
    }

    pub fn country(&self) -> &Country {
        &self.country
    }

    pub fn scope(&self) -> ScopeKey {
        ScopeKey::new(self.company_code.clone(), self.country.clone())
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn posting_date(&self) -> NaiveDate {
        self.posting_date
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn assignment_key(&self) -> &str {
        &self.assignment_key
    }

    pub fn trading_partner(&self) -> &str {
        &self.trading_partner
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Calendar days between posting and `as_of`; negative for items
    /// posted after `as_of`.
    pub fn age_days(&self, as_of: NaiveDate) -> i64 {
        as_of.signed_duration_since(self.posting_date).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> OpenItem {
        OpenItem::new(
            ItemId(7),
            " 1900000001 ",
            "1000",
            "de",
            "24182000",
            Amount::from_minor(-2_500),
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
        )
    }

    #[test]
    fn test_item_creation() {
        let item = sample_item().with_currency("eur");
        assert_eq!(item.id(), ItemId(7));
        assert_eq!(item.document_id(), "1900000001");
        assert_eq!(item.country().as_str(), "DE");
        assert_eq!(item.currency(), "EUR");
        assert_eq!(item.amount(), Amount::from_minor(-2_500));
        assert_eq!(item.scope().to_string(), "1000/DE");
    }

    #[test]
    fn test_assignment_keeps_leading_whitespace() {
        let item = sample_item()
            .with_assignment_key("  0042  ")
            .with_reference("  REF ");
        assert_eq!(item.assignment_key(), "  0042");
        assert_eq!(item.reference(), "REF");
    }

    #[test]
    fn test_age_days() {
        let item = sample_item();
        let as_of = NaiveDate::from_ymd_opt(2024, 6, 13).unwrap();
        assert_eq!(item.age_days(as_of), 10);
        let before = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(item.age_days(before), -2);
    }

    #[test]
    fn test_item_id_display() {
        assert_eq!(ItemId(12).to_string(), "#12");
    }
}
