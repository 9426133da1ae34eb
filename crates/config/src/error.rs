//! Error types for settings loading.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or loading [`Settings`](crate::Settings).
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error parsing TOML syntax or shape.
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Error reading a settings file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		/// Path to the file that failed to read.
		path: PathBuf,
		/// The underlying I/O error.
		error: std::io::Error,
	},

	/// An override was keyed by something other than an absolute actor path.
	#[error("invalid actor path '{0}' (override paths must start with '/')")]
	InvalidPath(String),

	/// A value is out of range.
	#[error("invalid value for {field}: {reason}")]
	InvalidValue {
		/// Kebab-case name of the offending field.
		field: &'static str,
		/// Why the value was rejected.
		reason: String,
	},
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
