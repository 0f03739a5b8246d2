/// Native follower for the live access log
pub mod log_tailer;

/// Field extraction for access log lines
pub mod line_parser;

pub use line_parser::parse_line;
pub use log_tailer::LogTailer;
