pub mod finance_api;
