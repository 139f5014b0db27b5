// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the Snag SDK.

use std::path::PathBuf;

use snag_core::EventError;
use thiserror::Error;

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, SnagError>;

/// Errors that can occur in the SDK.
///
/// Reporting itself never returns these to the application; they surface from
/// client construction and from [`Delivery`](crate::Delivery) implementations.
#[derive(Debug, Error)]
pub enum SnagError {
	/// Client configuration is missing or invalid.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// The event could not be built or serialized.
	#[error("event error: {0}")]
	Event(#[from] EventError),

	/// The delivery collaborator rejected the payload.
	#[error("delivery failed: {0}")]
	Delivery(String),
}

/// Errors that can occur while loading and validating [`ClientConfig`](crate::ClientConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
	/// I/O error reading config file
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// TOML parsing error in a file
	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// TOML parsing error in inline text
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),

	/// Missing required field
	#[error("Missing required field: {0}")]
	MissingField(String),

	/// Invalid value
	#[error("Invalid value for {field}: {message}")]
	InvalidValue { field: String, message: String },
}

impl ConfigError {
	pub fn missing_field(field: impl Into<String>) -> Self {
		Self::MissingField(field.into())
	}

	pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			field: field.into(),
			message: message.into(),
		}
	}
}
