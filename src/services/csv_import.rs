//! Bank statement CSV analysis.
//!
//! The local parse is preview-only: headers are mapped onto the known import
//! fields with name heuristics, the first few rows are shown for the user to
//! confirm, and then the original bytes go upstream for authoritative
//! parsing and reconciliation.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Rows shown in the mapping preview.
pub const PREVIEW_ROWS: usize = 5;

/// Column indices for each import field, as detected or as overridden by the
/// user in the mapping step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub date: Option<usize>,
    pub description: Option<usize>,
    pub amount: Option<usize>,
    pub reference: Option<usize>,
    pub balance: Option<usize>,
}

impl ColumnMapping {
    /// Fields the upstream import cannot work without.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.date.is_none() {
            missing.push("date");
        }
        if self.amount.is_none() {
            missing.push("amount");
        }
        missing
    }
}

/// Guess the column mapping from header names.
///
/// Fields are claimed in a fixed order (date, balance, reference,
/// description, amount) so that e.g. "Value Date" is taken by `date` before
/// "value" could be mistaken for an amount, and "Running Balance" by
/// `balance` before "amount" scans run.
pub fn detect_column_mapping(headers: &[String]) -> ColumnMapping {
    let mut mapping = ColumnMapping::default();
    let mut claimed = vec![false; headers.len()];

    let fields: [(&[&str], fn(&mut ColumnMapping, usize)); 5] = [
        (&["date"], |m, i| m.date = Some(i)),
        (&["balance"], |m, i| m.balance = Some(i)),
        (&["reference", "ref"], |m, i| m.reference = Some(i)),
        (
            &["description", "narrative", "details", "memo"],
            |m, i| m.description = Some(i),
        ),
        (&["amount", "debit", "credit", "value"], |m, i| {
            m.amount = Some(i)
        }),
    ];

    for (needles, assign) in fields {
        for (index, header) in headers.iter().enumerate() {
            if claimed[index] {
                continue;
            }
            let normalized = header.trim().to_ascii_lowercase();
            if needles.iter().any(|needle| normalized.contains(needle)) {
                assign(&mut mapping, index);
                claimed[index] = true;
                break;
            }
        }
    }

    mapping
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedRow {
    pub date: String,
    pub description: String,
    pub amount: Option<f64>,
    pub reference: String,
    pub balance: Option<f64>,
    /// Deterministic fingerprint over date|amount|reference, so re-uploads
    /// of the same statement produce identical row identities.
    pub fingerprint: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CsvPreview {
    pub headers: Vec<String>,
    pub mapping: ColumnMapping,
    pub rows: Vec<MappedRow>,
    pub total_rows: usize,
    pub missing_required: Vec<&'static str>,
}

/// Parse an uploaded CSV into a mapping preview. A file that is not valid
/// CSV is the caller's error; a mapping gap is reported, not fatal.
pub fn analyze(bytes: &[u8], mapping_override: Option<ColumnMapping>) -> AppResult<CsvPreview> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|error| AppError::BadRequest(format!("Could not read CSV headers: {error}")))?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();

    let mapping = mapping_override.unwrap_or_else(|| detect_column_mapping(&headers));

    let mut rows = Vec::new();
    let mut total_rows = 0usize;
    for record in reader.records() {
        let record = record
            .map_err(|error| AppError::BadRequest(format!("Could not parse CSV row: {error}")))?;
        total_rows += 1;
        if rows.len() < PREVIEW_ROWS {
            rows.push(map_row(&record, &mapping));
        }
    }

    Ok(CsvPreview {
        headers,
        missing_required: mapping.missing_required(),
        mapping,
        rows,
        total_rows,
    })
}

fn map_row(record: &csv::StringRecord, mapping: &ColumnMapping) -> MappedRow {
    let date = cell(record, mapping.date);
    let reference = cell(record, mapping.reference);
    let amount_raw = cell(record, mapping.amount);

    MappedRow {
        fingerprint: row_fingerprint(&date, &amount_raw, &reference),
        amount: parse_amount(&amount_raw),
        balance: parse_amount(&cell(record, mapping.balance)),
        description: cell(record, mapping.description),
        date,
        reference,
    }
}

fn cell(record: &csv::StringRecord, index: Option<usize>) -> String {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

/// Parse a bank-formatted amount: currency symbols, thousands separators,
/// and parenthesised negatives are tolerated.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let negative = trimmed.starts_with('(') && trimmed.ends_with(')');
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    let value: f64 = cleaned.parse().ok()?;
    Some(if negative { -value.abs() } else { value })
}

fn row_fingerprint(date: &str, amount_raw: &str, reference: &str) -> Uuid {
    let key = format!("{date}|{amount_raw}|{reference}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::{analyze, detect_column_mapping, parse_amount, ColumnMapping, PREVIEW_ROWS};

    fn headers(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|h| h.to_string()).collect()
    }

    #[test]
    fn detects_plain_headers() {
        let mapping = detect_column_mapping(&headers(&[
            "Date",
            "Description",
            "Amount",
            "Reference",
            "Balance",
        ]));
        assert_eq!(mapping.date, Some(0));
        assert_eq!(mapping.description, Some(1));
        assert_eq!(mapping.amount, Some(2));
        assert_eq!(mapping.reference, Some(3));
        assert_eq!(mapping.balance, Some(4));
        assert!(mapping.missing_required().is_empty());
    }

    #[test]
    fn detects_bank_flavoured_headers() {
        let mapping = detect_column_mapping(&headers(&[
            "Posting Date",
            "Transaction Details",
            "Debit Amount",
            "Ref No",
            "Running Balance",
        ]));
        assert_eq!(mapping.date, Some(0));
        assert_eq!(mapping.description, Some(1));
        assert_eq!(mapping.amount, Some(2));
        assert_eq!(mapping.reference, Some(3));
        assert_eq!(mapping.balance, Some(4));
    }

    #[test]
    fn value_date_is_not_mistaken_for_amount() {
        let mapping = detect_column_mapping(&headers(&["Value Date", "Narrative", "Value"]));
        assert_eq!(mapping.date, Some(0));
        assert_eq!(mapping.description, Some(1));
        assert_eq!(mapping.amount, Some(2));
    }

    #[test]
    fn reports_missing_required_fields() {
        let mapping = detect_column_mapping(&headers(&["Narrative", "Ref"]));
        assert_eq!(mapping.missing_required(), vec!["date", "amount"]);
    }

    #[test]
    fn parses_bank_amount_formats() {
        assert_eq!(parse_amount("R 1,234.56"), Some(1234.56));
        assert_eq!(parse_amount("4000"), Some(4000.0));
        assert_eq!(parse_amount("-250.00"), Some(-250.0));
        assert_eq!(parse_amount("(250.00)"), Some(-250.0));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("n/a"), None);
    }

    #[test]
    fn previews_first_five_rows_only() {
        let mut csv = String::from("Date,Description,Amount,Reference,Balance\n");
        for day in 1..=8 {
            csv.push_str(&format!(
                "2024-03-{day:02},Rent {day},R {day}00.00,REF{day},1000.00\n"
            ));
        }

        let preview = analyze(csv.as_bytes(), None).expect("valid csv");
        assert_eq!(preview.total_rows, 8);
        assert_eq!(preview.rows.len(), PREVIEW_ROWS);
        assert_eq!(preview.rows[0].description, "Rent 1");
        assert_eq!(preview.rows[0].amount, Some(100.0));
        assert!(preview.missing_required.is_empty());
    }

    #[test]
    fn fingerprints_are_deterministic_per_row() {
        let csv = "Date,Description,Amount\n2024-03-01,Rent,100.00\n2024-03-01,Rent again,200.00\n";
        let first = analyze(csv.as_bytes(), None).expect("valid csv");
        let second = analyze(csv.as_bytes(), None).expect("valid csv");

        assert_eq!(first.rows[0].fingerprint, second.rows[0].fingerprint);
        assert_ne!(first.rows[0].fingerprint, first.rows[1].fingerprint);
    }

    #[test]
    fn honours_a_caller_supplied_mapping() {
        let csv = "A,B,C\n2024-03-01,Rent,100.00\n";
        let mapping = ColumnMapping {
            date: Some(0),
            description: Some(1),
            amount: Some(2),
            reference: None,
            balance: None,
        };
        let preview = analyze(csv.as_bytes(), Some(mapping.clone())).expect("valid csv");
        assert_eq!(preview.mapping, mapping);
        assert_eq!(preview.rows[0].amount, Some(100.0));
    }
}
