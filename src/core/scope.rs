use serde::{Deserialize, Serialize};
use std::fmt;

/// SAP company code identifying a legal entity in the ledger.
///
/// Company codes are four characters in practice ("1000", "499L") but
/// the engine treats them as opaque strings.
///
/// # Examples
///
/// ```
/// use gl_clearing::core::scope::CompanyCode;
///
/// let a = CompanyCode::new(" 1000 ");
/// assert_eq!(a.as_str(), "1000");
/// assert!(CompanyCode::new("1000") < CompanyCode::new("2000"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyCode(String);

impl CompanyCode {
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        Self(code.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CompanyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CompanyCode {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// ISO 3166-1 alpha-2 country of a company code, stored uppercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Country(String);

impl Country {
    pub fn new(code: impl Into<String>) -> Self {
        let code = code.into();
        Self(code.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Country {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The unit of independent clearing work: one company code in one country.
///
/// Ordering is company code first, so iterating a sorted set of scopes
/// visits company codes ascending.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey {
    pub company_code: CompanyCode,
    pub country: Country,
}

impl ScopeKey {
    pub fn new(company_code: CompanyCode, country: Country) -> Self {
        Self {
            company_code,
            country,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.company_code, self.country)
    }
}
