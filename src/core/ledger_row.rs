//! Raw ledger export rows and their conversion into open items.
//!
//! The export is CSV with a header line:
//! `document_id,company_code,country,account,amount,currency,posting_date,due_date,reference,assignment,trading_partner,text`.
//! Trailing columns may be omitted. Fields are read untrimmed so that
//! leading whitespace in assignments survives.

use crate::core::amount::Amount;
use crate::core::calendar::parse_date;
use crate::core::item::{ItemId, OpenItem};
use crate::core::scope::CompanyCode;
use csv::{ByteRecord, ReaderBuilder, Trim, Writer};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

/// One unparsed line of a ledger export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub document_id: String,
    pub company_code: String,
    pub country: String,
    pub account: String,
    pub amount: String,
    #[serde(default)]
    pub currency: String,
    pub posting_date: String,
    #[serde(default)]
    pub due_date: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default, alias = "assignment_key")]
    pub assignment: String,
    #[serde(default)]
    pub trading_partner: String,
    #[serde(default)]
    pub text: String,
}

/// A ledger row that violates the open item schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed ledger row {row}{}: {reason}", owner_suffix(.company_code))]
pub struct MalformedRowError {
    /// Zero-based index of the row in the export.
    pub row: usize,
    /// Owning company code, when it could be read.
    pub company_code: Option<CompanyCode>,
    pub reason: String,
}

fn owner_suffix(company_code: &Option<CompanyCode>) -> String {
    company_code
        .as_ref()
        .map(|c| format!(" (company code {})", c))
        .unwrap_or_default()
}

impl LedgerRow {
    /// Validate and convert into an open item identified by `row`.
    pub fn to_open_item(&self, row: usize) -> Result<OpenItem, MalformedRowError> {
        let company_code = CompanyCode::new(self.company_code.as_str());
        let owner = (!company_code.is_empty()).then(|| company_code.clone());
        let malformed = |reason: String| MalformedRowError {
            row,
            company_code: owner.clone(),
            reason,
        };

        if company_code.is_empty() {
            return Err(malformed("missing company code".to_string()));
        }
        if self.account.trim().is_empty() {
            return Err(malformed("missing account".to_string()));
        }
        if self.document_id.trim().is_empty() {
            return Err(malformed("missing document id".to_string()));
        }

        let amount = Amount::parse(&self.amount)
            .map_err(|e| malformed(format!("amount: {}", e)))?;
        let posting_date = parse_date(&self.posting_date)
            .map_err(|e| malformed(format!("posting date: {}", e)))?;

        let mut item = OpenItem::new(
            ItemId(row),
            self.document_id.as_str(),
            company_code,
            self.country.as_str(),
            self.account.as_str(),
            amount,
            posting_date,
        )
        .with_currency(self.currency.as_str())
        .with_reference(self.reference.as_str())
        .with_assignment_key(self.assignment.as_str())
        .with_trading_partner(self.trading_partner.as_str())
        .with_text(self.text.as_str());

        if !self.due_date.trim().is_empty() {
            let due_date = parse_date(&self.due_date)
                .map_err(|e| malformed(format!("due date: {}", e)))?;
            item = item.with_due_date(due_date);
        }

        Ok(item)
    }
}

/// A ledger export as read from CSV, one record per data line.
///
/// Lines that cannot be decoded into a [`LedgerRow`] are kept in place as
/// [`MalformedRowError`]s, so row indices stay aligned with the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerExport {
    records: Vec<Result<LedgerRow, MalformedRowError>>,
}

impl LedgerExport {
    pub fn records(&self) -> &[Result<LedgerRow, MalformedRowError>] {
        &self.records
    }

    /// Rows that decoded, in file order.
    pub fn rows(&self) -> impl Iterator<Item = &LedgerRow> {
        self.records.iter().filter_map(|r| r.as_ref().ok())
    }

    /// Lines that could not be decoded.
    pub fn rejected(&self) -> impl Iterator<Item = &MalformedRowError> {
        self.records.iter().filter_map(|r| r.as_ref().err())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<LedgerRow>> for LedgerExport {
    fn from(rows: Vec<LedgerRow>) -> Self {
        Self {
            records: rows.into_iter().map(Ok).collect(),
        }
    }
}

/// Read a ledger export from CSV.
///
/// A line that does not decode is rejected on its own; only I/O failures
/// and an unreadable header fail the whole export.
pub fn read_ledger_csv<R: Read>(reader: R) -> Result<LedgerExport, csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::None)
        .from_reader(reader);
    let headers = rdr.byte_headers()?.clone();
    let owner_column = headers
        .iter()
        .position(|h| h == b"company_code")
        .unwrap_or(1);

    let mut records = Vec::new();
    for (row, result) in rdr.byte_records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(err) if err.is_io_error() => return Err(err),
            Err(err) => {
                records.push(Err(MalformedRowError {
                    row,
                    company_code: None,
                    reason: err.to_string(),
                }));
                continue;
            }
        };
        let decoded = record
            .deserialize::<LedgerRow>(Some(&headers))
            .map_err(|err| MalformedRowError {
                row,
                company_code: record_owner(&record, owner_column),
                reason: err.to_string(),
            });
        records.push(decoded);
    }
    Ok(LedgerExport { records })
}

fn record_owner(record: &ByteRecord, column: usize) -> Option<CompanyCode> {
    let field = std::str::from_utf8(record.get(column)?).ok()?;
    let code = CompanyCode::new(field);
    (!code.is_empty()).then_some(code)
}

/// Read a ledger export from a CSV file on disk.
pub fn read_ledger_file(path: impl AsRef<Path>) -> Result<LedgerExport, csv::Error> {
    let file = File::open(path.as_ref())?;
    read_ledger_csv(file)
}

/// Write ledger rows as CSV with a header line.
pub fn write_ledger_csv<W: Write>(rows: &[LedgerRow], writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row() -> LedgerRow {
        LedgerRow {
            document_id: "1900000001".into(),
            company_code: "1000".into(),
            country: "DE".into(),
            account: "24182000".into(),
            amount: "1.000,00-".into(),
            currency: "EUR".into(),
            posting_date: "03.06.2024".into(),
            reference: "INV-42".into(),
            assignment: "  A1 ".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_row_conversion() {
        let item = row().to_open_item(4).unwrap();
        assert_eq!(item.id(), ItemId(4));
        assert_eq!(item.amount(), Amount::from_minor(-100_000));
        assert_eq!(item.posting_date(), NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
        assert_eq!(item.assignment_key(), "  A1");
        assert_eq!(item.due_date(), None);
    }

    #[test]
    fn test_missing_company_code() {
        let mut bad = row();
        bad.company_code = "  ".into();
        let err = bad.to_open_item(2).unwrap_err();
        assert_eq!(err.row, 2);
        assert_eq!(err.company_code, None);
        assert!(err.reason.contains("company code"));
    }

    #[test]
    fn test_bad_amount_keeps_owner() {
        let mut bad = row();
        bad.amount = "n/a".into();
        let err = bad.to_open_item(9).unwrap_err();
        assert_eq!(err.company_code, Some(CompanyCode::new("1000")));
        assert!(err.to_string().contains("row 9 (company code 1000)"));
    }

    #[test]
    fn test_bad_due_date() {
        let mut bad = row();
        bad.due_date = "31.02.2024".into();
        assert!(bad.to_open_item(0).unwrap_err().reason.starts_with("due date"));
    }

    #[test]
    fn test_read_csv_with_optional_columns() {
        let data = "\
document_id,company_code,country,account,amount,currency,posting_date,due_date,reference,assignment
100,1000,DE,24182000,250.00,EUR,2024-06-03,,R1,  X
101,1000,DE,24182000,-250.00,EUR,2024-06-04,2024-07-04,R1,  X
";
        let export = read_ledger_csv(data.as_bytes()).unwrap();
        let rows: Vec<&LedgerRow> = export.rows().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].assignment, "  X");
        assert_eq!(rows[1].due_date, "2024-07-04");
        assert_eq!(rows[1].text, "");
    }

    #[test]
    fn test_write_then_read() {
        let mut out = Vec::new();
        write_ledger_csv(&[row()], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("document_id,company_code,country"));

        let export = read_ledger_csv(text.as_bytes()).unwrap();
        assert_eq!(export, LedgerExport::from(vec![row()]));
    }

    #[test]
    fn test_truncated_line_rejected_alone() {
        let data = "\
document_id,company_code,country,account,amount,currency,posting_date
1,1000,DE,24182000,10.00,EUR,2024-06-03
2,1000,DE,24182000
3,2000,FR,24182000,5.00,EUR,2024-06-03
4,2000,FR,24182000,-5.00,EUR,2024-06-04
";
        let export = read_ledger_csv(data.as_bytes()).unwrap();
        assert_eq!(export.len(), 4);
        assert_eq!(export.rows().count(), 3);

        let rejected: Vec<&MalformedRowError> = export.rejected().collect();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].row, 1);
        assert_eq!(rejected[0].company_code, Some(CompanyCode::new("1000")));
    }

    #[test]
    fn test_invalid_utf8_rejected_alone() {
        let mut data = b"document_id,company_code,country,account,amount,currency,posting_date\n".to_vec();
        data.extend_from_slice(b"1,2000,FR,24182000,5.00,EUR,2024-06-03\n");
        data.extend_from_slice(b"2,1000,DE,24182000,5.00,\xff\xfe,2024-06-03\n");
        let export = read_ledger_csv(data.as_slice()).unwrap();

        assert_eq!(export.rows().count(), 1);
        let rejected: Vec<&MalformedRowError> = export.rejected().collect();
        assert_eq!(rejected[0].row, 1);
        assert_eq!(rejected[0].company_code, Some(CompanyCode::new("1000")));
    }
}
