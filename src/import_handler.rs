//! Spreadsheet upload endpoint.
//!
//! Accepts a multipart CSV upload, parses it against the declared trip
//! schema and upserts each row by external id. One bad row never aborts the
//! batch: parse and store failures are skipped and reported per row.

use crate::errors::AppError;
use crate::handlers::AppState;
use crate::import_schema::{parse_csv, RowError};
use crate::models::{ImportReport, RowFailure};
use crate::storage::TripStorage;
use axum::{
    extract::{Multipart, State},
    Json,
};
use std::sync::Arc;

/// Checks the upload against the external contract: a `.csv` filename or a
/// CSV content type.
fn validate_upload(filename: &str, content_type: Option<&str>) -> Result<(), AppError> {
    let extension_ok = filename
        .rsplit('.')
        .next()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);
    let content_type_ok = matches!(content_type, Some("text/csv") | Some("application/csv"));

    if extension_ok || content_type_ok {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Only CSV uploads are accepted (.csv or text/csv), got '{}'",
            filename
        )))
    }
}

fn failure_message(err: &RowError) -> String {
    match err.column {
        Some(column) => format!("column '{}': {}", column, err.message),
        None => err.message.clone(),
    }
}

/// POST /api/import/upload
///
/// Multipart body with a `file` field holding the spreadsheet. Responds with
/// imported/failed counts and one entry per rejected row.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ImportReport>, AppError> {
    tracing::info!("POST /api/import/upload");

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") && field.file_name().is_none() {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(|ct| ct.to_string());
        validate_upload(&filename, content_type.as_deref())?;

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
        upload = Some((filename, data));
        break;
    }

    let (filename, data) = upload
        .ok_or_else(|| AppError::BadRequest("Missing 'file' field in multipart body".to_string()))?;

    let sheet = parse_csv(data.as_ref())?;
    tracing::info!(
        "Upload '{}': {} parsed rows, {} rejected rows",
        filename,
        sheet.rows.len(),
        sheet.failures.len()
    );

    let mut report = ImportReport {
        imported: 0,
        failed: sheet.failures.len(),
        failures: sheet
            .failures
            .iter()
            .map(|e| RowFailure {
                row: e.row,
                error: failure_message(e),
            })
            .collect(),
    };

    let storage = TripStorage::new(state.db.clone());
    for (row, trip) in &sheet.rows {
        match storage.upsert_single(trip).await {
            Ok(()) => report.imported += 1,
            Err(e) => {
                tracing::warn!("Row {} failed to store: {}", row, e);
                report.failed += 1;
                report.failures.push(RowFailure {
                    row: *row,
                    error: e.to_string(),
                });
            }
        }
    }

    if report.imported > 0 {
        storage.recompute_metricas_standalone().await?;
    }

    tracing::info!(
        "Upload '{}' done. imported: {}, failed: {}",
        filename,
        report.imported,
        report.failed
    );

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_csv_extension_or_content_type() {
        assert!(validate_upload("corridas.csv", None).is_ok());
        assert!(validate_upload("CORRIDAS.CSV", None).is_ok());
        assert!(validate_upload("upload", Some("text/csv")).is_ok());
        assert!(validate_upload("upload", Some("application/csv")).is_ok());
    }

    #[test]
    fn rejects_other_uploads() {
        assert!(validate_upload("corridas.xlsx", None).is_err());
        assert!(validate_upload("upload", Some("application/pdf")).is_err());
        assert!(validate_upload("upload", None).is_err());
    }
}
