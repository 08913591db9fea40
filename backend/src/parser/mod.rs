//! Generic table reader with encoding and delimiter auto-detection.
//!
//! Turns a CSV export, an Excel workbook or a JSON array of objects into
//! rows keyed by column name. No protocol logic here.

pub mod workbook;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use std::str::FromStr;

use crate::error::{CsvError, CsvResult};
use crate::models::Row;

pub use workbook::parse_workbook;

/// Source file layout.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    #[default]
    Csv,
    Json,
    /// Excel workbook, first sheet
    Xlsx,
}

impl InputFormat {
    /// `.json` files are JSON, `.xlsx`/`.xlsm`/`.xls` are workbooks,
    /// everything else is read as CSV.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        match path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("json") => InputFormat::Json,
            Some("xlsx" | "xlsm" | "xls") => InputFormat::Xlsx,
            _ => InputFormat::Csv,
        }
    }
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(InputFormat::Csv),
            "json" => Ok(InputFormat::Json),
            "xlsx" | "xls" | "excel" => Ok(InputFormat::Xlsx),
            other => Err(format!(
                "unknown input format '{}' (expected csv, json or xlsx)",
                other
            )),
        }
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed rows
    pub records: Vec<Row>,
    /// Detected or used encoding (`utf-8` for workbooks)
    pub encoding: String,
    /// Detected or used delimiter (`,` for JSON and workbook input)
    pub delimiter: char,
    /// Column headers, in source order
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        // Undetectable single-byte content: SCADA exports are mostly cp1252.
        "" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the specified encoding.
///
/// Unknown encodings fall back to lossy UTF-8. A leading BOM is dropped.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        // windows-1252 agrees with Latin-1 on every printable byte.
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the header line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [';', ',', '\t', '|'];
    let mut best_sep = ';';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text with an explicit delimiter.
///
/// Cells are trimmed and kept as strings. Short rows are padded with blank
/// cells, extra cells are ignored, fully blank rows are skipped.
///
/// # Example
/// ```ignore
/// use scada2protocol::parse_csv_str;
///
/// let (headers, rows) = parse_csv_str("code;label\n42;Overspeed", ';').unwrap();
/// assert_eq!(headers, vec!["code", "label"]);
/// assert_eq!(rows[0]["code"], "42");
/// ```
pub fn parse_csv_str(content: &str, delimiter: char) -> CsvResult<(Vec<String>, Vec<Row>)> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }
    if !delimiter.is_ascii() {
        return Err(CsvError::ParseError {
            line: 1,
            message: format!("delimiter '{}' is not a single-byte character", delimiter),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_parse_error)?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(String::is_empty) {
        return Err(CsvError::NoHeaders);
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_parse_error)?;
        if record.iter().all(str::is_empty) {
            continue;
        }

        let mut row = Row::new();
        for (i, header) in headers.iter().enumerate() {
            let cell = record.get(i).unwrap_or("");
            row.insert(header.clone(), Value::String(cell.to_string()));
        }
        records.push(row);
    }

    Ok((headers, records))
}

fn csv_parse_error(err: csv::Error) -> CsvError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    CsvError::ParseError {
        line,
        message: err.to_string(),
    }
}

/// Parse a JSON array of objects. Headers are the union of keys in first-sight order.
pub fn parse_json_str(content: &str) -> CsvResult<(Vec<String>, Vec<Row>)> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }
    let value: Value =
        serde_json::from_str(content).map_err(|e| CsvError::JsonError(e.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        other => {
            return Err(CsvError::JsonError(format!(
                "expected an array of objects, found {}",
                json_kind(&other)
            )))
        }
    };

    let mut headers: Vec<String> = Vec::new();
    let mut records = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let row = match item {
            Value::Object(row) => row,
            other => {
                return Err(CsvError::JsonError(format!(
                    "element {} is {}, expected an object",
                    i,
                    json_kind(&other)
                )))
            }
        };
        for key in row.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
        records.push(row);
    }

    Ok((headers, records))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse bytes with auto-detection of encoding (and delimiter, for CSV).
pub fn parse_bytes(bytes: &[u8], format: InputFormat, delimiter: Option<char>) -> CsvResult<ParseResult> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }

    if format == InputFormat::Xlsx {
        let (headers, records) = parse_workbook(bytes)?;
        return Ok(ParseResult {
            records,
            encoding: "utf-8".to_string(),
            delimiter: ',',
            headers,
        });
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);

    let (delimiter, (headers, records)) = if format == InputFormat::Json {
        (',', parse_json_str(&content)?)
    } else {
        let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&content));
        (delimiter, parse_csv_str(&content, delimiter)?)
    };

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
    })
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    parse_bytes(bytes, InputFormat::Csv, None)
}

/// Parse a file; the format defaults to the one implied by its extension.
///
/// # Example
/// ```ignore
/// let result = parse_file("scada.csv", None, None)?;
/// println!("Encoding: {}, Delimiter: '{}'", result.encoding, result.delimiter);
/// println!("Rows: {}", result.records.len());
/// ```
pub fn parse_file<P: AsRef<Path>>(
    path: P,
    format: Option<InputFormat>,
    delimiter: Option<char>,
) -> CsvResult<ParseResult> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let format = format.unwrap_or_else(|| InputFormat::from_path(path));
    parse_bytes(&bytes, format, delimiter)
}

/// Printable name of a delimiter.
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_simple_csv() {
        let (headers, rows) = parse_csv_str("name;age\nAlice;30\nBob;25", ';').unwrap();

        assert_eq!(headers, vec!["name", "age"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["name"], "Alice");
        assert_eq!(rows[0]["age"], "30");
        assert_eq!(rows[1]["name"], "Bob");
    }

    #[test]
    fn test_quoted_values_keep_delimiter() {
        let csv = "code;label\n42;\"Pitch; blade 2\"";
        let (_, rows) = parse_csv_str(csv, ';').unwrap();
        assert_eq!(rows[0]["label"], "Pitch; blade 2");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let (_, rows) = parse_csv_str("a;b\n1;2\n\n;\n3;4\n", ';').unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_short_and_long_rows() {
        let (_, rows) = parse_csv_str("a;b;c\n1\n1;2;3;4", ';').unwrap();
        assert_eq!(rows[0]["b"], "");
        assert_eq!(rows[0]["c"], "");
        assert_eq!(rows[1]["c"], "3");
        assert_eq!(rows[1].len(), 3);
    }

    #[test]
    fn test_cells_trimmed() {
        let (headers, rows) = parse_csv_str(" Date , Power \n 2024-01-01 , 12.5 ", ',').unwrap();
        assert_eq!(headers, vec!["Date", "Power"]);
        assert_eq!(rows[0]["Power"], "12.5");
    }

    #[test]
    fn test_empty_csv_error() {
        assert!(matches!(parse_csv_str("", ';'), Err(CsvError::EmptyFile)));
        assert!(matches!(parse_bytes(b"", InputFormat::Csv, None), Err(CsvError::EmptyFile)));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single"), ';');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_bytes_auto("name;age\nAlice;30\nBob;25".as_bytes()).unwrap();

        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.delimiter, ';');
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.headers, vec!["name", "age"]);
    }

    #[test]
    fn test_explicit_delimiter_wins() {
        let result = parse_bytes(b"a;b,c\n1;2,3", InputFormat::Csv, Some(',')).unwrap();
        assert_eq!(result.headers, vec!["a;b", "c"]);
    }

    #[test]
    fn test_bom_stripped() {
        let result = parse_bytes_auto("\u{feff}Date;Power\nx;1".as_bytes()).unwrap();
        assert_eq!(result.headers[0], "Date");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
    }

    #[test]
    fn test_latin1_fraction_and_currency_signs() {
        // "½ kW ¤" in ISO-8859-1
        let bytes: &[u8] = &[0xBD, 0x20, 0x6B, 0x57, 0x20, 0xA4];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "½ kW ¤");
        assert_eq!(decode_content(&[0xBC, 0xBE], "latin1"), "¼¾");
    }

    #[test]
    fn test_json_records() {
        let json = r#"[{"Code": 42, "Desc": "Overspeed"}, {"Code": 7, "Extra": null}]"#;
        let result = parse_bytes(json.as_bytes(), InputFormat::Json, None).unwrap();

        assert_eq!(result.headers, vec!["Code", "Desc", "Extra"]);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0]["Code"], 42);
        assert_eq!(result.records[1]["Extra"], Value::Null);
    }

    #[test]
    fn test_json_must_be_array_of_objects() {
        assert!(matches!(parse_json_str(r#"{"a": 1}"#), Err(CsvError::JsonError(_))));
        assert!(matches!(parse_json_str("[1, 2]"), Err(CsvError::JsonError(_))));
        assert!(matches!(parse_json_str("[{"), Err(CsvError::JsonError(_))));
    }

    #[test]
    fn test_format_from_path_and_str() {
        assert_eq!(InputFormat::from_path("rows.JSON"), InputFormat::Json);
        assert_eq!(InputFormat::from_path("export.csv"), InputFormat::Csv);
        assert_eq!(InputFormat::from_path("export"), InputFormat::Csv);
        assert_eq!(InputFormat::from_path("scada.XLSX"), InputFormat::Xlsx);
        assert_eq!(InputFormat::from_path("legacy.xls"), InputFormat::Xlsx);
        assert_eq!("json".parse::<InputFormat>(), Ok(InputFormat::Json));
        assert_eq!("xlsx".parse::<InputFormat>(), Ok(InputFormat::Xlsx));
        assert!("ods".parse::<InputFormat>().is_err());
    }

    #[test]
    fn test_parse_file() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "Code,Desc\n1,Start\n2,Stop\n").unwrap();

        let result = parse_file(file.path(), None, None).unwrap();
        assert_eq!(result.delimiter, ',');
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[1]["Desc"], "Stop");
    }

    #[test]
    fn test_parse_workbook_file() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/telemetry.xlsx");
        let result = parse_file(path, None, None).unwrap();
        assert_eq!(result.encoding, "utf-8");
        assert_eq!(result.headers[..2], ["Date", "WTG01 kW"]);
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0]["WTG01 kW"], 1520.5);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            parse_file("/nonexistent/scada.csv", None, None),
            Err(CsvError::IoError(_))
        ));
    }
}
