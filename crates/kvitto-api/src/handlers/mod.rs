pub mod health;
pub mod process;
pub mod receipt_files;
pub mod receipts;
pub mod upload;
pub mod validate;
