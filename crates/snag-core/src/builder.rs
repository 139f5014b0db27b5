// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Assembles an [`Event`] from a captured error and its surrounding context.

use crate::breadcrumb::Breadcrumb;
use crate::error::Result;
use crate::event::Event;
use crate::exception::Exception;
use crate::metadata::MetadataSet;
use crate::record::EventRecord;
use crate::session::SessionTracker;
use crate::severity::{HandledState, Severity, SeverityReason};
use crate::thread::ThreadState;
use crate::user::User;

/// Builder for [`Event`].
///
/// The error description comes either from an [`Exception`] (ordinary
/// reporting) or from a record whose error fields were already written at
/// the capture site.
#[derive(Debug, Clone)]
pub struct EventBuilder<'a> {
	exception: Option<Exception>,
	record: EventRecord,
	severity: Severity,
	reason: SeverityReason,
	attribute_value: Option<String>,
	sessions: Option<&'a SessionTracker>,
	auto_track_sessions: bool,
	threads: Option<ThreadState>,
	metadata: MetadataSet,
	global_metadata: Option<&'a MetadataSet>,
	user: User,
	breadcrumbs: Vec<Breadcrumb>,
	grouping_hash: Option<String>,
	project_packages: Option<Vec<String>>,
	send_threads: bool,
	redacted_keys: Vec<String>,
}

impl<'a> EventBuilder<'a> {
	pub fn new(exception: Exception) -> Self {
		Self::with_parts(Some(exception), EventRecord::new())
	}

	/// Starts from a record filled in at the capture site, error included.
	pub fn from_record(record: EventRecord) -> Self {
		Self::with_parts(None, record)
	}

	fn with_parts(exception: Option<Exception>, record: EventRecord) -> Self {
		Self {
			exception,
			record,
			severity: Severity::Warning,
			reason: SeverityReason::UserSpecified,
			attribute_value: None,
			sessions: None,
			auto_track_sessions: true,
			threads: None,
			metadata: MetadataSet::new(),
			global_metadata: None,
			user: User::default(),
			breadcrumbs: Vec::new(),
			grouping_hash: None,
			project_packages: None,
			send_threads: true,
			redacted_keys: vec!["password".to_string()],
		}
	}

	/// Baseline app/device/context fields. Error fields written here are
	/// replaced by the exception's, if one was given.
	pub fn record(mut self, record: EventRecord) -> Self {
		self.record = record;
		self
	}

	pub fn severity(mut self, severity: Severity) -> Self {
		self.severity = severity;
		self
	}

	pub fn severity_reason(mut self, reason: SeverityReason) -> Self {
		self.reason = reason;
		self
	}

	/// Value for the reason's attribute (`level`, `signalType`,
	/// `violationType`).
	pub fn attribute_value(mut self, value: impl Into<String>) -> Self {
		self.attribute_value = Some(value.into());
		self
	}

	pub fn sessions(mut self, tracker: &'a SessionTracker, auto_track_sessions: bool) -> Self {
		self.sessions = Some(tracker);
		self.auto_track_sessions = auto_track_sessions;
		self
	}

	pub fn threads(mut self, threads: ThreadState) -> Self {
		self.threads = Some(threads);
		self
	}

	/// Metadata specific to this event.
	pub fn metadata(mut self, metadata: MetadataSet) -> Self {
		self.metadata = metadata;
		self
	}

	/// Process-wide metadata. Read once at build time.
	pub fn global_metadata(mut self, global: &'a MetadataSet) -> Self {
		self.global_metadata = Some(global);
		self
	}

	pub fn user(mut self, user: User) -> Self {
		self.user = user;
		self
	}

	pub fn breadcrumbs(mut self, breadcrumbs: Vec<Breadcrumb>) -> Self {
		self.breadcrumbs = breadcrumbs;
		self
	}

	pub fn grouping_hash(mut self, grouping_hash: impl Into<String>) -> Self {
		self.grouping_hash = Some(grouping_hash.into());
		self
	}

	pub fn project_packages(mut self, packages: Option<Vec<String>>) -> Self {
		self.project_packages = packages;
		self
	}

	pub fn send_threads(mut self, send_threads: bool) -> Self {
		self.send_threads = send_threads;
		self
	}

	pub fn redacted_keys(mut self, keys: Vec<String>) -> Self {
		self.redacted_keys = keys;
		self
	}

	/// Resolves the handled state, snapshots the session and merges metadata.
	///
	/// Fails only for an invalid severity reason, in which case no session
	/// counter has been touched.
	pub fn build(self) -> Result<Event> {
		let handled_state = HandledState::new(self.reason, self.severity, self.attribute_value)?;

		let session = self
			.sessions
			.and_then(SessionTracker::current_session)
			.filter(|session| self.auto_track_sessions || !session.is_auto_captured())
			.map(|session| session.increment_and_copy(handled_state.is_unhandled()));

		let metadata = match self.global_metadata {
			Some(global) => MetadataSet::merge(global, &self.metadata),
			None => self.metadata,
		};

		let mut record = self.record;
		let (stacktrace, causes) = match self.exception {
			Some(exception) => {
				record.set_error_class(&exception.error_class);
				record.set_error_message(exception.message.as_deref().unwrap_or(""));
				record.set_error_type(&exception.error_type);
				(exception.stacktrace, exception.causes)
			}
			None => Default::default(),
		};

		Ok(Event {
			record,
			severity: handled_state.original_severity(),
			handled_state,
			session,
			metadata,
			user: self.user,
			breadcrumbs: self.breadcrumbs,
			grouping_hash: self.grouping_hash,
			project_packages: self.project_packages,
			stacktrace,
			causes,
			threads: self.threads,
			send_threads: self.send_threads,
			redacted_keys: self.redacted_keys,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::EventError;
	use serde_json::json;

	fn exception() -> Exception {
		Exception::new("IoError", "disk full")
	}

	#[test]
	fn exception_fields_land_in_record() {
		let event = EventBuilder::new(exception().with_type("c")).build().unwrap();
		assert_eq!(event.record().error_class(), "IoError");
		assert_eq!(event.record().error_message(), "disk full");
		assert_eq!(event.record().error_type(), "c");
	}

	#[test]
	fn captured_record_keeps_its_error_fields() {
		let mut record = EventRecord::new();
		record.set_error_class("SIGSEGV");
		record.set_error_message("Segmentation violation");

		let event = EventBuilder::from_record(record)
			.severity_reason(SeverityReason::Signal)
			.attribute_value("SIGSEGV")
			.build()
			.unwrap();

		assert_eq!(event.exception_name(), "SIGSEGV");
		assert_eq!(event.exception_message(), "Segmentation violation");
		assert!(event.is_unhandled());
		assert_eq!(event.severity(), Severity::Error);
	}

	#[test]
	fn handled_event_increments_handled_counter() {
		let tracker = SessionTracker::new();
		tracker.start_session(false);

		let event = EventBuilder::new(exception())
			.sessions(&tracker, true)
			.build()
			.unwrap();

		let snapshot = event.session().unwrap();
		assert_eq!(snapshot.handled_count, 1);
		assert_eq!(snapshot.unhandled_count, 0);
	}

	#[test]
	fn unhandled_event_increments_unhandled_counter() {
		let tracker = SessionTracker::new();
		let session = tracker.start_session(false);

		let event = EventBuilder::new(exception())
			.severity_reason(SeverityReason::UnhandledException)
			.sessions(&tracker, true)
			.build()
			.unwrap();

		assert_eq!(event.session().unwrap().unhandled_count, 1);
		assert_eq!(session.handled_count(), 0);
		assert_eq!(session.unhandled_count(), 1);
	}

	#[test]
	fn auto_captured_session_skipped_when_auto_tracking_off() {
		let tracker = SessionTracker::new();
		let session = tracker.start_session(true);

		let event = EventBuilder::new(exception())
			.sessions(&tracker, false)
			.build()
			.unwrap();

		assert!(event.session().is_none());
		assert_eq!(session.handled_count(), 0);
	}

	#[test]
	fn manual_session_tracked_when_auto_tracking_off() {
		let tracker = SessionTracker::new();
		tracker.start_session(false);

		let event = EventBuilder::new(exception())
			.sessions(&tracker, false)
			.build()
			.unwrap();

		assert!(event.session().is_some());
	}

	#[test]
	fn paused_session_is_not_attached() {
		let tracker = SessionTracker::new();
		tracker.start_session(false);
		tracker.pause_session();

		let event = EventBuilder::new(exception())
			.sessions(&tracker, true)
			.build()
			.unwrap();

		assert!(event.session().is_none());
	}

	#[test]
	fn invalid_reason_leaves_session_untouched() {
		let tracker = SessionTracker::new();
		let session = tracker.start_session(false);

		let result = EventBuilder::new(exception())
			.severity_reason(SeverityReason::StrictMode)
			.sessions(&tracker, true)
			.build();

		assert!(matches!(result, Err(EventError::MissingAttribute(_))));
		assert_eq!(session.handled_count(), 0);
		assert_eq!(session.unhandled_count(), 0);
	}

	#[test]
	fn local_metadata_wins_over_global() {
		let mut global = MetadataSet::new();
		global.add_metadata("device", "foo", "bar");
		global.add_metadata("app", "flag", true);
		let mut local = MetadataSet::new();
		local.add_metadata("device", "foo", "baz");

		let event = EventBuilder::new(exception())
			.global_metadata(&global)
			.metadata(local)
			.build()
			.unwrap();

		assert_eq!(event.get_metadata("device", "foo"), Some(&json!("baz")));
		assert_eq!(event.get_metadata("app", "flag"), Some(&json!(true)));
		assert_eq!(global.get_metadata("device", "foo"), Some(&json!("bar")));
	}

	#[test]
	fn missing_global_metadata_keeps_local() {
		let mut local = MetadataSet::new();
		local.add_metadata("request", "path", "/login");

		let event = EventBuilder::new(exception()).metadata(local.clone()).build().unwrap();

		assert_eq!(event.metadata(), &local);
	}
}
