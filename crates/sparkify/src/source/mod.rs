//! Input side: discovery, download, decompression and decoding of the raw
//! song and log corpora.

mod compression;
mod listing;
mod reader;

pub use compression::CompressionFormat;
pub use listing::{INPUT_EXTENSIONS, list_input_files};
pub use reader::{CorpusReader, DEFAULT_MAX_CONCURRENT_FILES, RawFile, decode_files};
