// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Exception and stack frame types supplied by the capture site.
//!
//! Frames arrive already unwound and symbolicated; this module only carries
//! them and decides which ones belong to the project.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// One stack frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
	pub method: Option<String>,
	pub file: Option<String>,
	pub line_number: Option<u32>,
	/// Set by the unwinder when it already knows the frame is app code.
	pub in_project: bool,
}

impl Frame {
	fn is_in_project(&self, project_packages: &[String]) -> bool {
		self.in_project
			|| self.method.as_deref().is_some_and(|method| {
				project_packages
					.iter()
					.any(|package| method.starts_with(package.as_str()))
			})
	}
}

/// Stack trace, innermost frame first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stacktrace {
	pub frames: Vec<Frame>,
}

impl Stacktrace {
	pub fn is_empty(&self) -> bool {
		self.frames.is_empty()
	}

	/// Serializable view that marks frames under `project_packages`.
	pub fn with_packages<'a>(&'a self, project_packages: &'a [String]) -> StacktraceView<'a> {
		StacktraceView {
			stacktrace: self,
			project_packages,
		}
	}
}

/// Description of an error as captured, before it becomes an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exception {
	pub error_class: String,
	pub message: Option<String>,
	/// Origin of the error, e.g. `rust` or `c`.
	pub error_type: String,
	pub stacktrace: Stacktrace,
	/// Underlying causes, outermost first.
	pub causes: Vec<Exception>,
}

impl Exception {
	pub fn new(error_class: impl Into<String>, message: impl Into<String>) -> Self {
		Self {
			error_class: error_class.into(),
			message: Some(message.into()),
			error_type: "rust".to_string(),
			..Default::default()
		}
	}

	/// Builds an exception chain from a `std::error::Error` and its sources.
	pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
		let mut exception = Self::new(short_type_name(error), error.to_string());
		let mut source = error.source();
		while let Some(cause) = source {
			exception
				.causes
				.push(Self::new(short_type_name(cause), cause.to_string()));
			source = cause.source();
		}
		exception
	}

	pub fn with_stacktrace(mut self, stacktrace: Stacktrace) -> Self {
		self.stacktrace = stacktrace;
		self
	}

	pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
		self.error_type = error_type.into();
		self
	}
}

/// Best-effort type name taken from the leading identifier of the error's
/// `Debug` output. Errors whose `Debug` does not start with an identifier,
/// such as boxed string errors, are named `Error`.
fn short_type_name(error: &dyn std::error::Error) -> String {
	let debug = format!("{error:?}");
	let end = debug
		.find(|c: char| !(c.is_alphanumeric() || c == '_'))
		.unwrap_or(debug.len());
	let name = &debug[..end];
	match name.chars().next() {
		Some(first) if first.is_alphabetic() || first == '_' => name.to_string(),
		_ => "Error".to_string(),
	}
}

/// Wire view of a stack trace: `[{method, file, lineNumber, inProject}]`.
#[derive(Debug, Clone, Copy)]
pub struct StacktraceView<'a> {
	stacktrace: &'a Stacktrace,
	project_packages: &'a [String],
}

impl Serialize for StacktraceView<'_> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut seq = serializer.serialize_seq(Some(self.stacktrace.frames.len()))?;
		for frame in &self.stacktrace.frames {
			seq.serialize_element(&FrameView {
				frame,
				in_project: frame.is_in_project(self.project_packages),
			})?;
		}
		seq.end()
	}
}

struct FrameView<'a> {
	frame: &'a Frame,
	in_project: bool,
}

impl Serialize for FrameView<'_> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(None)?;
		map.serialize_entry("method", &self.frame.method)?;
		map.serialize_entry("file", &self.frame.file)?;
		map.serialize_entry("lineNumber", &self.frame.line_number)?;
		if self.in_project {
			map.serialize_entry("inProject", &true)?;
		}
		map.end()
	}
}

/// Wire view of one exception in the chain.
#[derive(Debug, Clone, Copy)]
pub struct ExceptionView<'a> {
	pub error_class: &'a str,
	pub message: &'a str,
	pub error_type: &'a str,
	pub stacktrace: StacktraceView<'a>,
}

impl Serialize for ExceptionView<'_> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(4))?;
		map.serialize_entry("errorClass", self.error_class)?;
		map.serialize_entry("message", self.message)?;
		map.serialize_entry("type", self.error_type)?;
		map.serialize_entry("stacktrace", &self.stacktrace)?;
		map.end()
	}
}
