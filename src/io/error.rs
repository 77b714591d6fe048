//! Errors that can occur in the io module

use thiserror::Error;

#[derive(Error, Debug)]
#[allow(clippy::upper_case_acronyms)]
/// All the errors that can occur in file io operations
pub enum IOError {
    /// A visibility dump is missing some required columns
    #[error("{source_file}:{source_line}\n{file} is missing columns {missing:?}")]
    MissingColumns {
        /// The file which was being read
        file: String,
        /// Names of the missing columns
        missing: Vec<String>,
        /// The file where the error originated (usually `file!()`)
        source_file: &'static str,
        /// The line number where the error originated (usually `line!()`)
        source_line: u32,
    },

    /// A cell of a visibility dump could not be parsed
    #[error("Invalid value {value:?} in column {column} of {file} line {line}, expected {expected}")]
    InvalidValue {
        /// The file which was being read
        file: String,
        /// The line number in the file
        line: u64,
        /// The column name
        column: String,
        /// What was expected
        expected: String,
        /// The value that was found
        value: String,
    },

    #[error("{0}")]
    /// Error derived from [`csv::Error`]
    CsvError(#[from] csv::Error),

    #[error("{0}")]
    /// Error derived from [`std::io::Error`]
    StdIOError(#[from] std::io::Error),
}
