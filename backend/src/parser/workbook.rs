//! Excel workbook reader.
//!
//! Only the first worksheet is read. Its first row holds the column names.

use calamine::{open_workbook_auto_from_rs, Data, ExcelDateTime, Reader};
use serde_json::{Number, Value};
use std::io::Cursor;

use crate::error::{CsvError, CsvResult};
use crate::models::Row;

/// Read the first sheet of an `.xlsx`/`.xls` workbook into rows.
///
/// Blank rows are skipped and every row carries every header.
pub fn parse_workbook(bytes: &[u8]) -> CsvResult<(Vec<String>, Vec<Row>)> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| CsvError::WorkbookError(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| CsvError::WorkbookError("workbook has no worksheet".to_string()))?
        .map_err(|e| CsvError::WorkbookError(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(first) => first.iter().map(|cell| cell.to_string().trim().to_string()).collect(),
        None => return Err(CsvError::EmptyFile),
    };
    if headers.iter().all(String::is_empty) {
        return Err(CsvError::NoHeaders);
    }

    let mut records = Vec::new();
    for cells in rows {
        if cells.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        let mut row = Row::new();
        for (i, header) in headers.iter().enumerate() {
            let value = cells.get(i).map(cell_value).unwrap_or(Value::Null);
            row.insert(header.clone(), value);
        }
        records.push(row);
    }

    Ok((headers, records))
}

/// One cell as a JSON value.
///
/// Dates become ISO text and durations `H:MM:SS[.fff]`, the layouts the
/// coercer reads back.
pub fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(i) => Value::from(*i),
        Data::Float(f) => float_value(*f),
        Data::String(s) => Value::String(s.clone()),
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => excel_datetime(dt),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
    }
}

/// Excel stores every number as a float; whole values come back as integers.
fn float_value(f: f64) -> Value {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        return Value::from(f as i64);
    }
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}

fn excel_datetime(dt: &ExcelDateTime) -> Value {
    if dt.is_duration() {
        return Value::String(format_duration(dt.as_f64() * 86_400.0));
    }
    match dt.as_datetime() {
        Some(naive) => Value::String(naive.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        None => float_value(dt.as_f64()),
    }
}

/// `5400.0` → `"1:30:00"`, `3723.5` → `"1:02:03.500"`.
fn format_duration(seconds: f64) -> String {
    let millis = (seconds * 1000.0).round() as i64;
    let sign = if millis < 0 { "-" } else { "" };
    let millis = millis.abs();
    let (hours, rest) = (millis / 3_600_000, millis % 3_600_000);
    let (minutes, rest) = (rest / 60_000, rest % 60_000);
    let (secs, frac) = (rest / 1000, rest % 1000);
    if frac == 0 {
        format!("{}{}:{:02}:{:02}", sign, hours, minutes, secs)
    } else {
        format!("{}{}:{:02}:{:02}.{:03}", sign, hours, minutes, secs, frac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIXTURE: &[u8] = include_bytes!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/fixtures/telemetry.xlsx"
    ));

    #[test]
    fn test_fixture_workbook() {
        let (headers, rows) = parse_workbook(FIXTURE).unwrap();

        assert_eq!(headers, vec!["Date", "WTG01 kW", "Status", "Downtime"]);
        // The trailing blank row is skipped.
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0]["Date"], json!("2024-01-15T12:00:00"));
        assert_eq!(rows[0]["WTG01 kW"], json!(1520.5));
        assert_eq!(rows[0]["Status"], json!("Run"));
        assert_eq!(rows[0]["Downtime"], json!("1:30:00"));

        assert_eq!(rows[1]["Date"], json!("2024-01-15T18:00:00"));
        assert_eq!(rows[1]["WTG01 kW"], json!(0));
        assert_eq!(rows[1]["Status"], Value::Null);
        assert_eq!(rows[1]["Downtime"], Value::Null);
    }

    #[test]
    fn test_not_a_workbook() {
        assert!(matches!(
            parse_workbook(b"Date;Power\n1;2\n"),
            Err(CsvError::WorkbookError(_))
        ));
    }

    #[test]
    fn test_cell_values() {
        assert_eq!(cell_value(&Data::Empty), Value::Null);
        assert_eq!(cell_value(&Data::Int(7)), json!(7));
        assert_eq!(cell_value(&Data::Float(42.0)), json!(42));
        assert_eq!(cell_value(&Data::Float(12.25)), json!(12.25));
        assert_eq!(cell_value(&Data::String("N/A".into())), json!("N/A"));
        assert_eq!(cell_value(&Data::Bool(true)), json!(true));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(5400.0), "1:30:00");
        assert_eq!(format_duration(3723.5), "1:02:03.500");
        assert_eq!(format_duration(90000.0), "25:00:00");
    }
}
