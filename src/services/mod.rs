pub mod allocation;
pub mod csv_import;
pub mod reconciliation;
pub mod statement;
pub mod underpayment;
