//! # Error Handling
//!
//! This module defines the centralized error type for the `linuxuapi` library.
//! It uses `thiserror` to build a single `Error` enum covering every failure
//! the library can report, with a `Result<T>` alias used throughout.
//!
//! ## Step failures
//!
//! Applying a step sequence stops at the first failing step. The resulting
//! [`Error::Step`] carries the zero-based index of that step, the step itself
//! (action and arguments), a [`FailureKind`] classifying the failure, and the
//! underlying I/O error. Nothing that ran before the failure is undone; the
//! caller decides whether to tear down what was already applied.
//!
//! ## Other failures
//!
//! - Descriptor file parsing and structural checks (`ConfigParse`).
//! - No USB device controller available for binding (`NoUdc`).
//! - Characters without a keymap entry when typing text (`UnmappedCharacter`).
//! - Character device problems in the I2C and HID transports.
//! - Wrapped I/O, YAML and glob pattern errors.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::step::{Action, Step};

/// Classification of a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Strict directory creation against a path that already exists.
    AlreadyExists,
    /// Write, mkdir or symlink below a directory that was never created.
    MissingParent,
    /// The caller lacks permission for the operation.
    PermissionDenied,
    /// Removal of a path that is not there.
    NotFound,
    /// Symlink creation where the link path is already occupied.
    LinkConflict,
    /// Anything the kernel reports that fits none of the above.
    Other,
}

impl FailureKind {
    /// Classify an I/O error raised while executing a step of kind `action`.
    pub fn classify(action: Action, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::AlreadyExists if action == Action::Symlink => FailureKind::LinkConflict,
            io::ErrorKind::AlreadyExists => FailureKind::AlreadyExists,
            io::ErrorKind::NotFound if matches!(action, Action::Rmdir | Action::Remove) => {
                FailureKind::NotFound
            }
            io::ErrorKind::NotFound => FailureKind::MissingParent,
            io::ErrorKind::PermissionDenied => FailureKind::PermissionDenied,
            _ => FailureKind::Other,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::AlreadyExists => "already exists",
            FailureKind::MissingParent => "missing parent",
            FailureKind::PermissionDenied => "permission denied",
            FailureKind::NotFound => "not found",
            FailureKind::LinkConflict => "link conflict",
            FailureKind::Other => "failed",
        };
        f.write_str(s)
    }
}

/// Main error type for linuxuapi operations
#[derive(Error, Debug)]
pub enum Error {
    /// A step in a sequence failed to execute.
    #[error("step {index} `{step}`: {kind}: {source}")]
    Step {
        index: usize,
        step: Step,
        kind: FailureKind,
        #[source]
        source: io::Error,
    },

    /// A gadget descriptor file could not be parsed or is structurally invalid.
    #[error("Descriptor parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the descriptor
        hint: Option<String>,
    },

    /// No USB device controller matched the discovery pattern.
    #[error("no UDC found matching {pattern}")]
    NoUdc { pattern: String },

    /// A character in typed text has no entry in the keymap.
    #[error("Missing mapping for character `{}`", .0.escape_debug())]
    UnmappedCharacter(char),

    /// A character device rejected an operation.
    #[error("Device error on {}: {message}", path.display())]
    Device { path: PathBuf, message: String },

    /// More I2C messages than the kernel accepts in one transfer.
    #[error("too many I2C messages in one transfer: {count} (max {max})")]
    TooManyMessages { count: usize, max: usize },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

impl Error {
    /// The failure classification, if this is a step failure.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Error::Step { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
