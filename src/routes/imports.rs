use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    routing::post,
    Json, Router,
};

use crate::client::finance_api::{self, bearer_token};
use crate::error::{AppError, AppResult};
use crate::models::BankImportOutcome;
use crate::schemas::parse_mapping_field;
use crate::services::csv_import::{self, ColumnMapping, CsvPreview};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bank-imports/analyze", post(analyze_bank_csv))
        .route("/bank-imports", post(submit_bank_csv))
}

struct BankCsvUpload {
    file_name: String,
    file_bytes: Vec<u8>,
    bank_name: Option<String>,
    mapping: Option<ColumnMapping>,
}

async fn read_upload(mut multipart: Multipart) -> AppResult<BankCsvUpload> {
    let mut file_name = String::from("statement.csv");
    let mut file_bytes: Vec<u8> = Vec::new();
    let mut bank_name = None;
    let mut mapping = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| AppError::BadRequest(format!("Malformed multipart upload: {error}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if let Some(original) = field.file_name() {
                    file_name = original.to_string();
                }
                file_bytes = field
                    .bytes()
                    .await
                    .map_err(|error| {
                        AppError::BadRequest(format!("Could not read uploaded file: {error}"))
                    })?
                    .to_vec();
            }
            "bank_name" => {
                bank_name = Some(field.text().await.map_err(|error| {
                    AppError::BadRequest(format!("Could not read bank_name field: {error}"))
                })?);
            }
            "mapping" => {
                let raw = field.text().await.map_err(|error| {
                    AppError::BadRequest(format!("Could not read mapping field: {error}"))
                })?;
                mapping = Some(parse_mapping_field(&raw)?);
            }
            _ => {}
        }
    }

    if file_bytes.is_empty() {
        return Err(AppError::BadRequest(
            "A non-empty 'file' field is required.".to_string(),
        ));
    }

    Ok(BankCsvUpload {
        file_name,
        file_bytes,
        bank_name,
        mapping,
    })
}

/// Local, preview-only parse of an uploaded bank CSV: detected (or caller
/// supplied) column mapping plus the first rows, so the user can confirm
/// before committing the import.
async fn analyze_bank_csv(multipart: Multipart) -> AppResult<Json<CsvPreview>> {
    let upload = read_upload(multipart).await?;
    let preview = csv_import::analyze(&upload.file_bytes, upload.mapping)?;
    Ok(Json(preview))
}

/// Commit the import: forward the original bytes upstream for authoritative
/// parsing and reconciliation, with the confirmed mapping alongside.
async fn submit_bank_csv(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> AppResult<Json<BankImportOutcome>> {
    let upload = read_upload(multipart).await?;
    let bank_name = upload
        .bank_name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("A 'bank_name' field is required.".to_string()))?;

    // Pre-flight the file locally so an unreadable CSV or an incomplete
    // mapping fails fast instead of round-tripping upstream.
    let preview = csv_import::analyze(&upload.file_bytes, upload.mapping.clone())?;
    if !preview.missing_required.is_empty() {
        return Err(AppError::UnprocessableEntity(format!(
            "Column mapping is missing required fields: {}.",
            preview.missing_required.join(", ")
        )));
    }

    let mapping_json = match &upload.mapping {
        Some(mapping) => Some(serde_json::to_string(mapping).map_err(|error| {
            AppError::Internal(format!("Could not serialize column mapping: {error}"))
        })?),
        None => None,
    };

    let bearer = bearer_token(&headers);
    let outcome = finance_api::submit_bank_import(
        &state,
        bearer.as_deref(),
        &bank_name,
        mapping_json,
        &upload.file_name,
        upload.file_bytes,
    )
    .await?;

    if !outcome.success {
        tracing::warn!(bank_name = %bank_name, error = ?outcome.error, "Upstream rejected bank import");
    }

    Ok(Json(outcome))
}
