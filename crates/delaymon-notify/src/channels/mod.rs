pub mod json_lines;
pub mod log;
pub mod webhook;
