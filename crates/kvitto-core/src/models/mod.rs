pub mod receipt;
pub mod receipt_file;

pub use receipt::{ExtractedReceipt, Receipt, ReceiptResponse};
pub use receipt_file::{ReceiptFile, ReceiptFileResponse, Validity};

#[cfg(feature = "sqlx")]
pub use receipt::ReceiptRow;
#[cfg(feature = "sqlx")]
pub use receipt_file::ReceiptFileRow;
