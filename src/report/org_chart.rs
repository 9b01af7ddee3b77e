use crate::core::scope::CompanyCode;
use serde::{Deserialize, Serialize};

/// A person responsible for one or more company codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub surname: String,
    pub email: String,
    #[serde(default)]
    pub company_codes: Vec<CompanyCode>,
    /// Whether the user receives clearing notifications.
    #[serde(default = "default_send")]
    pub send: bool,
}

fn default_send() -> bool {
    true
}

impl User {
    pub fn new(
        name: impl Into<String>,
        surname: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            surname: surname.into(),
            email: email.into(),
            company_codes: Vec::new(),
            send: true,
        }
    }

    pub fn with_company_codes<C: Into<CompanyCode>>(
        mut self,
        codes: impl IntoIterator<Item = C>,
    ) -> Self {
        self.company_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_send(mut self, send: bool) -> Self {
        self.send = send;
        self
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.surname)
    }

    pub fn covers(&self, code: &CompanyCode) -> bool {
        self.company_codes.contains(code)
    }
}

/// Who is responsible for which company code.
///
/// The relation is many-to-many: a user may cover several codes and a
/// code may notify several users.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrgChart {
    users: Vec<User>,
}

impl OrgChart {
    pub fn new(users: Vec<User>) -> Self {
        Self { users }
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Users covering `code`, in configuration order.
    pub fn users_for(&self, code: &CompanyCode) -> Vec<&User> {
        self.users.iter().filter(|u| u.covers(code)).collect()
    }
}
