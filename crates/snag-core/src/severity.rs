// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Severity levels and the handled/unhandled classification of an event.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{EventError, Result};

/// How serious an event is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
	Error,
	Warning,
	Info,
}

impl fmt::Display for Severity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Error => write!(f, "error"),
			Self::Warning => write!(f, "warning"),
			Self::Info => write!(f, "info"),
		}
	}
}

impl FromStr for Severity {
	type Err = EventError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"error" => Ok(Self::Error),
			"warning" => Ok(Self::Warning),
			"info" => Ok(Self::Info),
			_ => Err(EventError::InvalidSeverity(s.to_string())),
		}
	}
}

/// Why an event was reported with its severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeverityReason {
	/// Reported explicitly with a caller-chosen severity.
	UserSpecified,
	/// A caught error reported without an explicit severity.
	HandledException,
	/// An error nothing caught, e.g. a panic.
	UnhandledException,
	/// A fatal signal.
	Signal,
	/// A policy violation detected at runtime.
	StrictMode,
	/// Reported from a log call.
	Log,
	UnhandledPromiseRejection,
	/// The application stopped responding.
	AnrError,
	/// Only produced on the wire, when a callback changed the severity.
	UserCallbackSetSeverity,
}

impl SeverityReason {
	/// Key under which the attribute value of this reason is reported.
	pub fn attribute_key(self) -> Option<&'static str> {
		match self {
			Self::Log => Some("level"),
			Self::StrictMode => Some("violationType"),
			Self::Signal => Some("signalType"),
			_ => None,
		}
	}
}

impl fmt::Display for SeverityReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::UserSpecified => "userSpecifiedSeverity",
			Self::HandledException => "handledException",
			Self::UnhandledException => "unhandledException",
			Self::Signal => "signal",
			Self::StrictMode => "strictMode",
			Self::Log => "log",
			Self::UnhandledPromiseRejection => "unhandledPromiseRejection",
			Self::AnrError => "anrError",
			Self::UserCallbackSetSeverity => "userCallbackSetSeverity",
		};
		f.write_str(s)
	}
}

impl FromStr for SeverityReason {
	type Err = EventError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"userSpecifiedSeverity" => Ok(Self::UserSpecified),
			"handledException" => Ok(Self::HandledException),
			"unhandledException" => Ok(Self::UnhandledException),
			"signal" => Ok(Self::Signal),
			"strictMode" => Ok(Self::StrictMode),
			"log" => Ok(Self::Log),
			"unhandledPromiseRejection" => Ok(Self::UnhandledPromiseRejection),
			"anrError" => Ok(Self::AnrError),
			"userCallbackSetSeverity" => Ok(Self::UserCallbackSetSeverity),
			_ => Err(EventError::InvalidSeverityReason(s.to_string())),
		}
	}
}

/// The handled/unhandled classification of one event.
///
/// Resolved once when the event is built and never changed afterwards. If a
/// callback later changes the event's severity, the serialized reason is
/// derived from the difference instead of mutating this value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandledState {
	reason: SeverityReason,
	original_severity: Severity,
	unhandled: bool,
	attribute_value: Option<String>,
}

impl HandledState {
	/// Resolves the handled state from how the event originated.
	///
	/// `severity` is honoured only for reasons where the caller chooses it
	/// ([`SeverityReason::UserSpecified`] and [`SeverityReason::Log`]); every
	/// other reason implies its own severity.
	pub fn new(
		reason: SeverityReason,
		severity: Severity,
		attribute_value: Option<String>,
	) -> Result<Self> {
		let (original_severity, unhandled) = match reason {
			SeverityReason::UserSpecified | SeverityReason::Log => (severity, false),
			SeverityReason::HandledException => (Severity::Warning, false),
			SeverityReason::UnhandledException
			| SeverityReason::Signal
			| SeverityReason::UnhandledPromiseRejection
			| SeverityReason::AnrError => (Severity::Error, true),
			SeverityReason::StrictMode => {
				if attribute_value.is_none() {
					return Err(EventError::MissingAttribute(reason.to_string()));
				}
				(Severity::Warning, true)
			}
			SeverityReason::UserCallbackSetSeverity => {
				return Err(EventError::DerivedSeverityReason(reason.to_string()));
			}
		};

		let attribute_value = if reason.attribute_key().is_some() {
			attribute_value
		} else {
			None
		};

		Ok(Self {
			reason,
			original_severity,
			unhandled,
			attribute_value,
		})
	}

	pub fn reason(&self) -> SeverityReason {
		self.reason
	}

	pub fn original_severity(&self) -> Severity {
		self.original_severity
	}

	pub fn is_unhandled(&self) -> bool {
		self.unhandled
	}

	pub fn attribute_value(&self) -> Option<&str> {
		self.attribute_value.as_deref()
	}

	/// Wire view of this state for an event currently at `current` severity.
	pub fn reason_for(&self, current: Severity) -> SeverityReasonView<'_> {
		SeverityReasonView {
			state: self,
			current,
		}
	}
}

/// Serializes as `{"type": ..., "attributes": {...}}`.
#[derive(Debug, Clone, Copy)]
pub struct SeverityReasonView<'a> {
	state: &'a HandledState,
	current: Severity,
}

impl SeverityReasonView<'_> {
	pub fn reason(&self) -> SeverityReason {
		if self.current != self.state.original_severity {
			SeverityReason::UserCallbackSetSeverity
		} else {
			self.state.reason
		}
	}
}

impl Serialize for SeverityReasonView<'_> {
	fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		let reason = self.reason();
		let attribute = match (reason.attribute_key(), self.state.attribute_value()) {
			(Some(key), Some(value)) => Some((key, value)),
			_ => None,
		};

		let mut map = serializer.serialize_map(None)?;
		map.serialize_entry("type", &reason.to_string())?;
		if let Some((key, value)) = attribute {
			let mut attributes = std::collections::BTreeMap::new();
			attributes.insert(key, value);
			map.serialize_entry("attributes", &attributes)?;
		}
		map.end()
	}
}
