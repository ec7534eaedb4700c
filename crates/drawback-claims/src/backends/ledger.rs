use std::io::Read;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::workflows::claim::{ExportRecord, ImportRecord};

const IMPORT_COLUMNS: [&str; 5] = [
    "entry_number",
    "product_id",
    "import_date",
    "quantity",
    "duty_paid",
];
const EXPORT_COLUMNS: [&str; 5] = [
    "export_reference",
    "product_id",
    "export_date",
    "quantity",
    "destination",
];

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("missing required column: {0}")]
    MissingColumn(&'static str),
    #[error("row {row}: unrecognised date '{value}'")]
    InvalidDate { row: usize, value: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Deserialize)]
struct ImportRow {
    entry_number: String,
    product_id: String,
    import_date: String,
    quantity: u32,
    duty_paid: f64,
}

#[derive(Debug, Deserialize)]
struct ExportRow {
    export_reference: String,
    product_id: String,
    export_date: String,
    quantity: u32,
    destination: String,
}

pub fn parse_imports<R: Read>(reader: R) -> Result<Vec<ImportRecord>, LedgerError> {
    let mut csv_reader = reader_for(reader);
    require_columns(&mut csv_reader, &IMPORT_COLUMNS)?;

    let mut records = Vec::new();
    for (index, row) in csv_reader.deserialize::<ImportRow>().enumerate() {
        let row = row?;
        records.push(ImportRecord {
            import_date: row_date(index, &row.import_date)?,
            entry_number: row.entry_number,
            product_id: row.product_id,
            quantity: row.quantity,
            duty_paid: row.duty_paid,
        });
    }
    Ok(records)
}

pub fn parse_exports<R: Read>(reader: R) -> Result<Vec<ExportRecord>, LedgerError> {
    let mut csv_reader = reader_for(reader);
    require_columns(&mut csv_reader, &EXPORT_COLUMNS)?;

    let mut records = Vec::new();
    for (index, row) in csv_reader.deserialize::<ExportRow>().enumerate() {
        let row = row?;
        records.push(ExportRecord {
            export_date: row_date(index, &row.export_date)?,
            export_reference: row.export_reference,
            product_id: row.product_id,
            quantity: row.quantity,
            destination: row.destination,
        });
    }
    Ok(records)
}

fn reader_for<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

fn require_columns<R: Read>(
    reader: &mut csv::Reader<R>,
    required: &[&'static str],
) -> Result<(), LedgerError> {
    let headers = reader.headers()?;
    for column in required {
        if !headers.iter().any(|header| header == *column) {
            return Err(LedgerError::MissingColumn(column));
        }
    }
    Ok(())
}

fn row_date(index: usize, value: &str) -> Result<NaiveDate, LedgerError> {
    parse_date(value).ok_or_else(|| LedgerError::InvalidDate {
        row: index + 1,
        value: value.to_string(),
    })
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    NaiveDate::parse_from_str(trimmed, "%m/%d/%Y").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_imports_with_mixed_date_formats() {
        let csv = "entry_number,product_id,import_date,quantity,duty_paid\n\
                   E-1, WIDGET ,2024-03-01,10,100.00\n\
                   E-2,GEAR,2024-04-02 09:30:00,4,25.5\n\
                   E-3,GEAR,05/06/2024,1,2\n";
        let records = parse_imports(csv.as_bytes()).expect("imports parse");

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].product_id, "WIDGET");
        assert_eq!(
            records[1].import_date,
            NaiveDate::from_ymd_opt(2024, 4, 2).expect("valid date")
        );
        assert_eq!(
            records[2].import_date,
            NaiveDate::from_ymd_opt(2024, 5, 6).expect("valid date")
        );
    }

    #[test]
    fn missing_export_column_is_named() {
        let csv = "export_reference,product_id,export_date,quantity\nX-1,WIDGET,2024-05-01,3\n";
        let error = parse_exports(csv.as_bytes()).expect_err("destination missing");
        assert!(matches!(error, LedgerError::MissingColumn("destination")));
    }

    #[test]
    fn unparseable_date_reports_row() {
        let csv = "entry_number,product_id,import_date,quantity,duty_paid\nE-1,W,soon,1,1.0\n";
        match parse_imports(csv.as_bytes()) {
            Err(LedgerError::InvalidDate { row, value }) => {
                assert_eq!(row, 1);
                assert_eq!(value, "soon");
            }
            other => panic!("expected invalid date, got {other:?}"),
        }
    }
}
