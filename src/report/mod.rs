pub mod decompress;
pub mod fetch;
pub mod parser;

pub use decompress::decompress;
pub use fetch::{DocumentFetcher, HttpDocumentFetcher};
pub use parser::{decode_text, parse_delimited};
