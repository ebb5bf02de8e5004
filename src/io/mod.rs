//! Collaborators built on the stream roles: byte sources, compression codecs,
//! record parsers and whole-file pipelines.

pub mod compression;
pub mod data_file;
pub mod parser;
pub mod read;

pub use compression::{compress, decompress, Compression};
pub use data_file::{read_data_file, read_data_file_as, write_file, DataFileOptions};
pub use parser::{parser, Format};
pub use read::read;
