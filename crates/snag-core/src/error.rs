// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for event construction and serialization.

use thiserror::Error;

/// Errors that can occur while building or serializing an event.
///
/// Truncated strings and missing optional inputs are not errors; they are
/// absorbed silently.
#[derive(Debug, Error)]
pub enum EventError {
	#[error("invalid severity: {0}")]
	InvalidSeverity(String),

	#[error("invalid severity reason: {0}")]
	InvalidSeverityReason(String),

	#[error("severity reason {0} cannot be used to create an event")]
	DerivedSeverityReason(String),

	#[error("severity reason {0} requires an attribute value")]
	MissingAttribute(String),

	#[error("invalid breadcrumb type: {0}")]
	InvalidBreadcrumbType(String),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

/// Result type for event operations.
pub type Result<T> = std::result::Result<T, EventError>;
