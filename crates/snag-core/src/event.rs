// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A finished event and its transport serialization.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::breadcrumb::Breadcrumb;
use crate::error::Result;
use crate::exception::{Exception, ExceptionView, Stacktrace};
use crate::metadata::MetadataSet;
use crate::record::EventRecord;
use crate::session::SessionSnapshot;
use crate::severity::{HandledState, Severity};
use crate::thread::ThreadState;
use crate::user::User;

/// One captured error with everything needed to report it.
///
/// The shape of an event (which parts exist) is fixed when it is built. Field
/// values stay editable through the accessors until it is serialized, which
/// is how on-error callbacks inspect and change it.
#[derive(Debug, Clone)]
pub struct Event {
	pub(crate) record: EventRecord,
	pub(crate) severity: Severity,
	pub(crate) handled_state: HandledState,
	pub(crate) session: Option<SessionSnapshot>,
	pub(crate) metadata: MetadataSet,
	pub(crate) user: User,
	pub(crate) breadcrumbs: Vec<Breadcrumb>,
	pub(crate) grouping_hash: Option<String>,
	pub(crate) project_packages: Option<Vec<String>>,
	pub(crate) stacktrace: Stacktrace,
	pub(crate) causes: Vec<Exception>,
	pub(crate) threads: Option<ThreadState>,
	pub(crate) send_threads: bool,
	pub(crate) redacted_keys: Vec<String>,
}

impl Event {
	/// The fixed-size context/app/device/error record.
	pub fn record(&self) -> &EventRecord {
		&self.record
	}

	/// Exclusive access to the record for the per-field setters.
	pub fn record_mut(&mut self) -> &mut EventRecord {
		&mut self.record
	}

	pub fn context(&self) -> &str {
		self.record.context()
	}

	pub fn set_context(&mut self, context: &str) {
		self.record.set_context(context);
	}

	pub fn severity(&self) -> Severity {
		self.severity
	}

	/// Changes the reported severity. The handled state is untouched; the
	/// serialized severity reason reflects the change instead.
	pub fn set_severity(&mut self, severity: Severity) {
		self.severity = severity;
	}

	pub fn handled_state(&self) -> &HandledState {
		&self.handled_state
	}

	pub fn is_unhandled(&self) -> bool {
		self.handled_state.is_unhandled()
	}

	pub fn session(&self) -> Option<&SessionSnapshot> {
		self.session.as_ref()
	}

	pub fn metadata(&self) -> &MetadataSet {
		&self.metadata
	}

	pub fn add_metadata(
		&mut self,
		section: impl Into<String>,
		key: impl Into<String>,
		value: impl Into<Value>,
	) {
		self.metadata.add_metadata(section, key, value);
	}

	pub fn clear_metadata(&mut self, section: &str, key: Option<&str>) {
		self.metadata.clear_metadata(section, key);
	}

	pub fn get_metadata(&self, section: &str, key: &str) -> Option<&Value> {
		self.metadata.get_metadata(section, key)
	}

	pub fn user(&self) -> &User {
		&self.user
	}

	pub fn set_user(&mut self, id: Option<String>, email: Option<String>, name: Option<String>) {
		self.user = User::new(id, email, name);
	}

	pub fn set_user_id(&mut self, id: Option<String>) {
		self.user.id = id;
	}

	pub fn set_user_email(&mut self, email: Option<String>) {
		self.user.email = email;
	}

	pub fn set_user_name(&mut self, name: Option<String>) {
		self.user.name = name;
	}

	pub fn breadcrumbs(&self) -> &[Breadcrumb] {
		&self.breadcrumbs
	}

	pub fn set_breadcrumbs(&mut self, breadcrumbs: Vec<Breadcrumb>) {
		self.breadcrumbs = breadcrumbs;
	}

	pub fn grouping_hash(&self) -> Option<&str> {
		self.grouping_hash.as_deref()
	}

	/// Overrides how the collector groups this event with others.
	pub fn set_grouping_hash(&mut self, grouping_hash: Option<String>) {
		self.grouping_hash = grouping_hash;
	}

	pub fn project_packages(&self) -> Option<&[String]> {
		self.project_packages.as_deref()
	}

	pub fn set_project_packages(&mut self, packages: Option<Vec<String>>) {
		self.project_packages = packages;
	}

	pub fn exception_name(&self) -> &str {
		self.record.error_class()
	}

	pub fn set_exception_name(&mut self, name: &str) {
		self.record.set_error_class(name);
	}

	pub fn exception_message(&self) -> &str {
		self.record.error_message()
	}

	pub fn set_exception_message(&mut self, message: &str) {
		self.record.set_error_message(message);
	}

	pub fn stacktrace(&self) -> &Stacktrace {
		&self.stacktrace
	}

	pub fn causes(&self) -> &[Exception] {
		&self.causes
	}

	pub fn threads(&self) -> Option<&ThreadState> {
		self.threads.as_ref()
	}

	/// Serializes the event to its JSON transport form.
	///
	/// Never mutates the event; repeated calls give identical output.
	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string(self)?)
	}

	pub fn to_json_value(&self) -> Result<Value> {
		Ok(serde_json::to_value(self)?)
	}

	fn packages(&self) -> &[String] {
		self.project_packages.as_deref().unwrap_or(&[])
	}

	fn exception_chain(&self) -> Vec<ExceptionView<'_>> {
		let packages = self.packages();
		let mut chain = vec![ExceptionView {
			error_class: self.record.error_class(),
			message: self.record.error_message(),
			error_type: self.record.error_type(),
			stacktrace: self.stacktrace.with_packages(packages),
		}];
		let mut pending: Vec<&Exception> = self.causes.iter().rev().collect();
		while let Some(cause) = pending.pop() {
			chain.push(ExceptionView {
				error_class: &cause.error_class,
				message: cause.message.as_deref().unwrap_or(""),
				error_type: &cause.error_type,
				stacktrace: cause.stacktrace.with_packages(packages),
			});
			pending.extend(cause.causes.iter().rev());
		}
		chain
	}
}

impl Serialize for Event {
	fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		let context = match self.record.context() {
			"" => None,
			context => Some(context),
		};

		let mut map = serializer.serialize_map(None)?;
		map.serialize_entry("context", &context)?;
		map.serialize_entry("metaData", &self.metadata.redacted(&self.redacted_keys))?;
		map.serialize_entry("severity", &self.severity)?;
		map.serialize_entry("severityReason", &self.handled_state.reason_for(self.severity))?;
		map.serialize_entry("unhandled", &self.handled_state.is_unhandled())?;
		if let Some(packages) = &self.project_packages {
			map.serialize_entry("projectPackages", packages)?;
		}
		map.serialize_entry("exceptions", &self.exception_chain())?;
		map.serialize_entry("user", &self.user)?;
		map.serialize_entry("app", self.record.app())?;
		map.serialize_entry("device", self.record.device())?;
		map.serialize_entry("breadcrumbs", &self.breadcrumbs)?;
		map.serialize_entry("groupingHash", &self.grouping_hash)?;
		if self.send_threads {
			let threads = self
				.threads
				.as_ref()
				.map(|threads| threads.with_packages(self.packages()));
			map.serialize_entry("threads", &threads)?;
		}
		if let Some(session) = &self.session {
			map.serialize_entry("session", session)?;
		}
		map.end()
	}
}
