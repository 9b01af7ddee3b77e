use crate::core::item::OpenItem;
use crate::core::ledger_row::{LedgerExport, LedgerRow, MalformedRowError};
use crate::core::scope::{CompanyCode, Country, ScopeKey};
use log::warn;
use std::collections::{BTreeMap, BTreeSet};

/// The imported open items of one clearing run, indexed by scope.
///
/// The store is a pure read side: the clearing engine never mutates
/// items and reports consumption through the groups it returns.
///
/// A store built with [`OpenItemStore::load_lenient`] or
/// [`OpenItemStore::load_export`] also remembers rejected rows. Company
/// codes that own a rejected row are *tainted* and their items must not
/// be cleared from an incomplete picture.
#[derive(Debug, Clone, Default)]
pub struct OpenItemStore {
    items: Vec<OpenItem>,
    by_scope: BTreeMap<ScopeKey, Vec<usize>>,
    rejected: Vec<MalformedRowError>,
    tainted: BTreeSet<CompanyCode>,
}

impl OpenItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strictly ingest ledger rows, stopping at the first schema violation.
    pub fn load(rows: &[LedgerRow]) -> Result<Self, MalformedRowError> {
        let mut store = Self::new();
        for (index, row) in rows.iter().enumerate() {
            store.add(row.to_open_item(index)?);
        }
        Ok(store)
    }

    /// Ingest every valid row, recording the rest as rejected.
    pub fn load_lenient(rows: &[LedgerRow]) -> Self {
        Self::ingest(rows.iter().map(Ok))
    }

    /// Leniently ingest a CSV export, including lines that never decoded.
    pub fn load_export(export: &LedgerExport) -> Self {
        Self::ingest(export.records().iter().map(Result::as_ref))
    }

    fn ingest<'a>(
        records: impl Iterator<Item = Result<&'a LedgerRow, &'a MalformedRowError>>,
    ) -> Self {
        let mut store = Self::new();
        for (index, record) in records.enumerate() {
            match record.map_err(Clone::clone).and_then(|row| row.to_open_item(index)) {
                Ok(item) => store.add(item),
                Err(err) => store.reject(err),
            }
        }
        store
    }

    fn reject(&mut self, err: MalformedRowError) {
        warn!("{}", err);
        if let Some(code) = &err.company_code {
            self.tainted.insert(code.clone());
        }
        self.rejected.push(err);
    }

    /// Add an already validated item.
    pub fn add(&mut self, item: OpenItem) {
        let index = self.items.len();
        self.by_scope.entry(item.scope()).or_default().push(index);
        self.items.push(item);
    }

    pub fn items(&self) -> &[OpenItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items of one scope in input order.
    pub fn items_for(&self, company_code: &CompanyCode, country: &Country) -> Vec<&OpenItem> {
        let key = ScopeKey::new(company_code.clone(), country.clone());
        self.scope_items(&key)
    }

    pub(crate) fn scope_items(&self, scope: &ScopeKey) -> Vec<&OpenItem> {
        self.by_scope
            .get(scope)
            .map(|indices| indices.iter().map(|&i| &self.items[i]).collect())
            .unwrap_or_default()
    }

    /// All scopes present in the store, ascending.
    pub fn scopes(&self) -> Vec<ScopeKey> {
        self.by_scope.keys().cloned().collect()
    }

    /// All company codes present in the store, ascending.
    pub fn company_codes(&self) -> Vec<CompanyCode> {
        let codes: BTreeSet<CompanyCode> = self
            .by_scope
            .keys()
            .map(|s| s.company_code.clone())
            .collect();
        codes.into_iter().collect()
    }

    /// Rows rejected by a lenient load.
    pub fn rejected(&self) -> &[MalformedRowError] {
        &self.rejected
    }

    pub fn is_tainted(&self, company_code: &CompanyCode) -> bool {
        self.tainted.contains(company_code)
    }
}

impl FromIterator<OpenItem> for OpenItemStore {
    fn from_iter<T: IntoIterator<Item = OpenItem>>(iter: T) -> Self {
        let mut store = Self::new();
        for item in iter {
            store.add(item);
        }
        store
    }
}
