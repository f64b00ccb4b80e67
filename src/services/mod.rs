pub mod direct_search;
pub mod document_fetcher;
pub mod form_filler;
pub mod result_parser;

pub use direct_search::DirectSearch;
pub use document_fetcher::DocumentFetcher;
pub use form_filler::FormFiller;
pub use result_parser::ResultParser;
