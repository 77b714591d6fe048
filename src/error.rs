//! Errors that can occur in Artip

use thiserror::Error;

use crate::{config::FlagConfigBuilderError, io::error::IOError, types::Polarization, ScanId};

#[derive(Error, Debug)]
#[allow(clippy::upper_case_acronyms)]
/// Errors relating to command line argument parsing
pub enum CLIError {
    #[error("Invalid command line argument for option {option}. Expected {expected}, received {received}")]
    /// An argument was provided that is not valid for the option
    InvalidCommandLineArgument {
        /// The option the argument was provided for
        option: String,
        /// What was expected
        expected: String,
        /// What was received
        received: String,
    },
}

/// An enum of all the errors possible in Artip
#[derive(Error, Debug)]
#[allow(clippy::upper_case_acronyms)]
pub enum ArtipError {
    /// The measurement set has no rows at all for a selection. This is fatal to
    /// a single (polarization, scan) pass.
    #[error("{source_file}:{source_line}\nNo readings available for polarization {polarization} in scan {scan_id}")]
    DataUnavailable {
        /// The polarization that was requested
        polarization: Polarization,
        /// The scan that was requested
        scan_id: ScanId,
        /// The file where the error originated (usually `file!()`)
        source_file: &'static str,
        /// The line number where the error originated (usually `line!()`)
        source_line: u32,
    },

    /// A source type was requested which has no entry in the configuration
    #[error("No configuration for source type {source_type}")]
    UnknownSource {
        /// The name of the source type
        source_type: String,
    },

    /// A channel range could not be parsed
    #[error("Invalid channel range {received:?}, expected <start>~<end> with start <= end")]
    InvalidChannelRange {
        /// The string that could not be parsed
        received: String,
    },

    #[error(transparent)]
    /// Error derived from [`FlagConfigBuilderError`]
    FlagConfigBuilderError(#[from] FlagConfigBuilderError),

    #[error(transparent)]
    /// Error derived from [`CLIError`]
    CLIError(#[from] CLIError),

    #[cfg(feature = "cli")]
    #[error(transparent)]
    /// Error derived from [`clap::Error`]
    ClapError(#[from] clap::Error),

    #[error("Dry run")]
    /// Only print the summary, do no work
    DryRun {},

    #[error(transparent)]
    /// Error derived from [`IOError`]
    IOError(#[from] IOError),
}
