pub mod case_result;
pub mod case_type;
pub mod document;
pub mod query;

pub use case_result::{CaseResult, DocumentRef, STATUS_UNKNOWN};
pub use case_type::CaseType;
pub use document::{DownloadedDocument, PdfInfo};
pub use query::{CaseQuery, MIN_FILING_YEAR};
