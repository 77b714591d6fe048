//! Input and output file formats: visibility dumps in, flag command lists out.

pub mod error;
pub mod flag_cmd;
pub mod vis_csv;

pub use flag_cmd::write_flag_commands;
pub use vis_csv::{read_visibility_csv, write_visibility_csv};
