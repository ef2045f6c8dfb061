use serde::Deserialize;
use validator::Validate;

use crate::error::AppError;
use crate::services::csv_import::ColumnMapping;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

fn default_false() -> bool {
    false
}

#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct AllocationEntryInput {
    #[validate(length(min = 1))]
    pub invoice_id: String,
    pub amount: f64,
    pub notes: Option<String>,
}

/// An allocation instruction as submitted by the dashboard. Exactly one of
/// `payment_id` / `bank_transaction_id` identifies the funds; the route
/// enforces that since `validator` cannot express it.
#[derive(Debug, Clone, Deserialize, serde::Serialize, Validate)]
pub struct AllocatePaymentInput {
    pub payment_id: Option<String>,
    pub bank_transaction_id: Option<String>,
    #[validate(length(min = 1))]
    pub lease_id: String,
    #[validate(range(min = 0.01))]
    pub payment_amount: f64,
    #[validate(nested)]
    pub allocations: Vec<AllocationEntryInput>,
    #[serde(default = "default_false")]
    pub create_credit: bool,
    pub notes: Option<String>,
}

/// Wire body forwarded to the upstream allocate endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AllocationSubmission {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_transaction_id: Option<String>,
    pub allocations: Vec<AllocationEntryInput>,
    pub create_credit: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllocationPrefillQuery {
    pub lease_id: String,
    pub amount: f64,
}

/// A manually edited plan as typed, before clamping.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AllocationPreviewInput {
    #[validate(length(min = 1))]
    pub lease_id: String,
    #[validate(range(min = 0.01))]
    pub payment_amount: f64,
    #[validate(nested)]
    pub allocations: Vec<AllocationEntryInput>,
}

/// Prefill for an unmatched bank transaction or manual payment: the tenant
/// identifies whose open invoices to load.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconciliationPrefillQuery {
    pub tenant_id: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnderpaymentAlertsQuery {
    pub strategy: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertPath {
    pub alert_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatementPath {
    pub lease_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatementQuery {
    pub start: String,
    pub end: String,
}

/// Optional user-corrected column mapping sent alongside a CSV upload, as a
/// JSON string form field.
pub fn parse_mapping_field(raw: &str) -> Result<ColumnMapping, AppError> {
    serde_json::from_str(raw)
        .map_err(|error| AppError::BadRequest(format!("Invalid column mapping: {error}")))
}

#[cfg(test)]
mod tests {
    use super::{parse_mapping_field, validate_input, AllocatePaymentInput};

    #[test]
    fn rejects_non_positive_payment_amount() {
        let input = AllocatePaymentInput {
            payment_id: Some("pay-1".to_string()),
            bank_transaction_id: None,
            lease_id: "lease-1".to_string(),
            payment_amount: 0.0,
            allocations: Vec::new(),
            create_credit: true,
            notes: None,
        };
        assert!(validate_input(&input).is_err());
    }

    #[test]
    fn parses_mapping_field() {
        let mapping = parse_mapping_field(r#"{"date":0,"amount":2}"#).expect("valid mapping");
        assert_eq!(mapping.date, Some(0));
        assert_eq!(mapping.amount, Some(2));
        assert_eq!(mapping.description, None);
        assert!(parse_mapping_field("not json").is_err());
    }
}
