// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Snapshot of the process's threads at the time of an event.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::exception::Stacktrace;

/// One thread in a [`ThreadState`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadInfo {
	pub id: u64,
	pub name: String,
	/// True for the thread on which the error happened.
	pub error_reporting_thread: bool,
	pub stacktrace: Stacktrace,
}

/// Threads captured alongside an event, supplied by the unwinder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadState {
	pub threads: Vec<ThreadInfo>,
}

impl ThreadState {
	pub fn new(threads: Vec<ThreadInfo>) -> Self {
		Self { threads }
	}

	/// A state holding only the calling thread, marked as the reporting one.
	pub fn current_thread(stacktrace: Stacktrace) -> Self {
		let thread = std::thread::current();
		let id = format!("{:?}", thread.id())
			.chars()
			.filter(char::is_ascii_digit)
			.collect::<String>()
			.parse()
			.unwrap_or(0);
		Self::new(vec![ThreadInfo {
			id,
			name: thread.name().unwrap_or("unnamed").to_string(),
			error_reporting_thread: true,
			stacktrace,
		}])
	}

	pub fn with_packages<'a>(&'a self, project_packages: &'a [String]) -> ThreadStateView<'a> {
		ThreadStateView {
			state: self,
			project_packages,
		}
	}
}

/// Wire view: `[{id, name, errorReportingThread?, stacktrace}]`.
#[derive(Debug, Clone, Copy)]
pub struct ThreadStateView<'a> {
	state: &'a ThreadState,
	project_packages: &'a [String],
}

impl Serialize for ThreadStateView<'_> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut seq = serializer.serialize_seq(Some(self.state.threads.len()))?;
		for thread in &self.state.threads {
			seq.serialize_element(&ThreadView {
				thread,
				project_packages: self.project_packages,
			})?;
		}
		seq.end()
	}
}

struct ThreadView<'a> {
	thread: &'a ThreadInfo,
	project_packages: &'a [String],
}

impl Serialize for ThreadView<'_> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(None)?;
		map.serialize_entry("id", &self.thread.id)?;
		map.serialize_entry("name", &self.thread.name)?;
		if self.thread.error_reporting_thread {
			map.serialize_entry("errorReportingThread", &true)?;
		}
		map.serialize_entry(
			"stacktrace",
			&self.thread.stacktrace.with_packages(self.project_packages),
		)?;
		map.end()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::exception::Frame;
	use serde_json::json;

	#[test]
	fn current_thread_is_reporting_thread() {
		let state = ThreadState::current_thread(Stacktrace::default());
		assert_eq!(state.threads.len(), 1);
		assert!(state.threads[0].error_reporting_thread);
	}

	#[test]
	fn thread_wire_shape() {
		let state = ThreadState::new(vec![
			ThreadInfo {
				id: 1,
				name: "main".to_string(),
				error_reporting_thread: true,
				stacktrace: Stacktrace {
					frames: vec![Frame {
						method: Some("app::run".to_string()),
						..Default::default()
					}],
				},
			},
			ThreadInfo {
				id: 7,
				name: "worker".to_string(),
				..Default::default()
			},
		]);
		let packages = vec!["app".to_string()];

		assert_eq!(
			serde_json::to_value(state.with_packages(&packages)).unwrap(),
			json!([
				{
					"id": 1,
					"name": "main",
					"errorReportingThread": true,
					"stacktrace": [{"method": "app::run", "file": null, "lineNumber": null, "inProject": true}]
				},
				{"id": 7, "name": "worker", "stacktrace": []}
			])
		);
	}
}
