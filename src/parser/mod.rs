mod grammar;

pub use grammar::{AlbLineParser, LogRecord, SENTINEL};
