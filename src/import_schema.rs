//! Declared spreadsheet schema for trip imports.
//!
//! The upload and sync paths share one external contract: an ordered list of
//! typed column definitions, validated on read. Each source row either parses
//! into a typed [`TripRow`] or produces a structured [`RowError`] carrying the
//! row number and offending column. Nothing here is duck-typed.

use crate::errors::AppError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::fmt;
use std::str::FromStr;

/// Value type a column must parse as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    /// Monetary value, parsed as an arbitrary-precision decimal.
    Decimal,
    Float,
    /// RFC 3339, `YYYY-MM-DD HH:MM:SS` or bare `YYYY-MM-DD` (midnight UTC).
    Timestamp,
}

/// One column of the trip spreadsheet contract.
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
    /// Required columns reject empty values; optional ones default them.
    pub required: bool,
}

/// The trip spreadsheet contract, in column order.
pub const TRIP_COLUMNS: [ColumnDef; 8] = [
    ColumnDef {
        name: "external_id",
        kind: ColumnKind::Text,
        required: true,
    },
    ColumnDef {
        name: "municipio_codigo",
        kind: ColumnKind::Text,
        required: true,
    },
    ColumnDef {
        name: "municipio_nome",
        kind: ColumnKind::Text,
        required: false,
    },
    ColumnDef {
        name: "origem",
        kind: ColumnKind::Text,
        required: false,
    },
    ColumnDef {
        name: "destino",
        kind: ColumnKind::Text,
        required: false,
    },
    ColumnDef {
        name: "started_at",
        kind: ColumnKind::Timestamp,
        required: true,
    },
    ColumnDef {
        name: "distancia_km",
        kind: ColumnKind::Float,
        required: true,
    },
    ColumnDef {
        name: "valor",
        kind: ColumnKind::Decimal,
        required: true,
    },
];

/// The expected header line, comma-joined.
pub fn expected_header() -> String {
    TRIP_COLUMNS
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(",")
}

/// A source row parsed against [`TRIP_COLUMNS`].
#[derive(Debug, Clone, PartialEq)]
pub struct TripRow {
    pub external_id: String,
    pub municipio_codigo: String,
    pub municipio_nome: String,
    pub origem: String,
    pub destino: String,
    pub started_at: DateTime<Utc>,
    pub distancia_km: f64,
    pub valor: BigDecimal,
}

/// Structured per-row parse failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// 1-based data row number (header excluded).
    pub row: usize,
    /// Offending column, when the failure is column-specific.
    pub column: Option<&'static str>,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.column {
            Some(col) => write!(f, "row {}, column '{}': {}", self.row, col, self.message),
            None => write!(f, "row {}: {}", self.row, self.message),
        }
    }
}

/// Result of parsing a whole sheet: typed rows (with their 1-based data row
/// numbers) plus per-row failures.
#[derive(Debug, Default)]
pub struct ParsedSheet {
    pub rows: Vec<(usize, TripRow)>,
    pub failures: Vec<RowError>,
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }
    None
}

/// Parses one record against the declared schema.
///
/// `row` is the 1-based data row number used in error reporting.
pub fn parse_record(record: &csv::StringRecord, row: usize) -> Result<TripRow, RowError> {
    if record.len() != TRIP_COLUMNS.len() {
        return Err(RowError {
            row,
            column: None,
            message: format!(
                "expected {} columns, found {}",
                TRIP_COLUMNS.len(),
                record.len()
            ),
        });
    }

    let mut fields: Vec<&str> = Vec::with_capacity(TRIP_COLUMNS.len());
    for (idx, def) in TRIP_COLUMNS.iter().enumerate() {
        let value = record.get(idx).unwrap_or("").trim();
        if def.required && value.is_empty() {
            return Err(RowError {
                row,
                column: Some(def.name),
                message: "required value is empty".to_string(),
            });
        }
        fields.push(value);
    }

    let column_err = |column: &'static str, message: String| RowError {
        row,
        column: Some(column),
        message,
    };

    let started_at = parse_timestamp(fields[5]).ok_or_else(|| {
        column_err(
            "started_at",
            format!("'{}' is not a recognized timestamp", fields[5]),
        )
    })?;

    let distancia_km = fields[6].parse::<f64>().map_err(|_| {
        column_err(
            "distancia_km",
            format!("'{}' is not a valid number", fields[6]),
        )
    })?;
    if !distancia_km.is_finite() || distancia_km < 0.0 {
        return Err(column_err(
            "distancia_km",
            format!("'{}' must be a non-negative finite number", fields[6]),
        ));
    }

    let valor = BigDecimal::from_str(fields[7])
        .map_err(|_| column_err("valor", format!("'{}' is not a valid decimal", fields[7])))?;
    if valor < BigDecimal::from(0) {
        return Err(column_err(
            "valor",
            format!("'{}' must not be negative", fields[7]),
        ));
    }

    Ok(TripRow {
        external_id: fields[0].to_string(),
        municipio_codigo: fields[1].to_string(),
        // Optional name falls back to the code so upserts always have a label
        municipio_nome: if fields[2].is_empty() {
            fields[1].to_string()
        } else {
            fields[2].to_string()
        },
        origem: fields[3].to_string(),
        destino: fields[4].to_string(),
        started_at,
        distancia_km,
        valor,
    })
}

/// Parses a CSV document against the declared schema.
///
/// The header must match [`TRIP_COLUMNS`] exactly (case-insensitive); a
/// mismatch fails the whole sheet. After the header, a bad row never aborts
/// parsing: it is recorded in `failures` and reading continues.
pub fn parse_csv<R: std::io::Read>(reader: R) -> Result<ParsedSheet, AppError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| AppError::BadRequest(format!("Unreadable header: {}", e)))?;

    if headers.len() != TRIP_COLUMNS.len()
        || headers
            .iter()
            .zip(TRIP_COLUMNS.iter())
            .any(|(got, def)| !got.trim().eq_ignore_ascii_case(def.name))
    {
        return Err(AppError::BadRequest(format!(
            "Header must be '{}'",
            expected_header()
        )));
    }

    let mut sheet = ParsedSheet::default();
    for (idx, result) in csv_reader.records().enumerate() {
        let row = idx + 1;
        match result {
            Ok(record) => {
                // Blank lines are not data rows
                if record.iter().all(|f| f.trim().is_empty()) {
                    continue;
                }
                match parse_record(&record, row) {
                    Ok(trip) => sheet.rows.push((row, trip)),
                    Err(err) => sheet.failures.push(err),
                }
            }
            Err(e) => sheet.failures.push(RowError {
                row,
                column: None,
                message: format!("unreadable row: {}", e),
            }),
        }
    }

    Ok(sheet)
}
