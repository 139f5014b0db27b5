// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client for capturing errors and reporting them as events.

use std::cell::Cell;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use snag_core::{
	Breadcrumb, BreadcrumbType, CaptureSlot, Event, EventBuilder, EventRecord, Exception,
	MetadataSet, Session, SessionTracker, Severity, SeverityReason, ThreadState, User,
};
use tracing::{debug, error, info, warn};

use crate::backtrace::capture_backtrace;
use crate::config::ClientConfig;
use crate::delivery::{Delivery, LoggingDelivery};
use crate::error::Result;
use crate::panic_hook::install_panic_hook;

/// How long a report raised from the panic hook waits for client state
/// before falling back to an empty value.
const HOOK_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

thread_local! {
	static REPORTING: Cell<bool> = const { Cell::new(false) };
}

/// Whether the current thread is inside a report.
pub(crate) fn is_reporting() -> bool {
	REPORTING.with(Cell::get)
}

/// Marks the current thread as reporting until dropped.
struct ReportingGuard {
	previous: bool,
}

impl ReportingGuard {
	fn enter() -> Self {
		Self {
			previous: REPORTING.with(|flag| flag.replace(true)),
		}
	}
}

impl Drop for ReportingGuard {
	fn drop(&mut self) {
		REPORTING.with(|flag| flag.set(self.previous));
	}
}

/// Callback run against every event before it is sent. Returning `false`
/// discards the event.
pub type OnErrorCallback = dyn Fn(&mut Event) -> bool + Send + Sync;

/// What happened to a reported error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
	/// Serialized and accepted by the delivery.
	Delivered,
	/// An on-error callback returned `false`.
	Vetoed,
	/// Filtered out by `ignore_classes` or the release stage.
	Ignored,
	/// Building, serializing or delivering the event failed.
	Dropped,
}

/// Builder for constructing a [`Client`].
pub struct ClientBuilder {
	config: ClientConfig,
	delivery: Option<Box<dyn Delivery>>,
}

impl ClientBuilder {
	pub fn new() -> Self {
		Self {
			config: ClientConfig::default(),
			delivery: None,
		}
	}

	pub fn config(mut self, config: ClientConfig) -> Self {
		self.config = config;
		self
	}

	/// Sets where finished events go. Defaults to [`LoggingDelivery`].
	pub fn delivery(mut self, delivery: impl Delivery + 'static) -> Self {
		self.delivery = Some(Box::new(delivery));
		self
	}

	/// Validates the configuration and builds the client.
	///
	/// Starts an automatic session when `auto_track_sessions` is set.
	pub fn build(self) -> Result<Client> {
		self.config.validate()?;

		let mut baseline = EventRecord::new();
		if let Some(version) = &self.config.app_version {
			baseline.set_app_version(version);
		}
		if let Some(app_type) = &self.config.app_type {
			baseline.set_app_type(app_type);
		}
		baseline.set_app_release_stage(&self.config.release_stage);
		baseline.set_app_binary_arch(std::env::consts::ARCH);
		baseline.set_device_os_name(std::env::consts::OS);

		let inner = Arc::new(ClientInner {
			delivery: self
				.delivery
				.unwrap_or_else(|| Box::new(LoggingDelivery)),
			baseline: RwLock::new(baseline),
			metadata: RwLock::new(MetadataSet::new()),
			user: RwLock::new(User::default()),
			breadcrumbs: Mutex::new(VecDeque::with_capacity(self.config.max_breadcrumbs)),
			on_error: RwLock::new(Vec::new()),
			sessions: SessionTracker::new(),
			started: Instant::now(),
			config: self.config,
		});

		if inner.config.auto_track_sessions {
			inner.sessions.start_session(true);
		}

		info!(
			release_stage = %inner.config.release_stage,
			auto_track_sessions = inner.config.auto_track_sessions,
			"Snag client initialized"
		);

		Ok(Client { inner })
	}
}

impl Default for ClientBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct ClientInner {
	config: ClientConfig,
	delivery: Box<dyn Delivery>,
	baseline: RwLock<EventRecord>,
	metadata: RwLock<MetadataSet>,
	user: RwLock<User>,
	breadcrumbs: Mutex<VecDeque<Breadcrumb>>,
	on_error: RwLock<Vec<Arc<OnErrorCallback>>>,
	sessions: SessionTracker,
	started: Instant,
}

enum Origin {
	Exception(Exception),
	Captured(EventRecord),
}

struct Report {
	origin: Origin,
	severity: Severity,
	reason: SeverityReason,
	attribute: Option<String>,
	/// Raised from the panic hook, where the panicking thread may hold a
	/// client lock.
	from_hook: bool,
}

/// Client for capturing errors and reporting them.
///
/// Cheap to clone; clones share state.
///
/// # Example
///
/// ```ignore
/// use snag::{Client, ClientConfig};
///
/// let client = Client::builder()
///     .config(ClientConfig::new("0123456789abcdef0123456789abcdef"))
///     .build()?;
///
/// client.install_panic_hook();
/// client.add_metadata("account", "plan", "pro");
///
/// if let Err(e) = do_something() {
///     client.notify(&e);
/// }
/// ```
#[derive(Clone)]
pub struct Client {
	inner: Arc<ClientInner>,
}

impl Client {
	pub fn builder() -> ClientBuilder {
		ClientBuilder::new()
	}

	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Installs a panic hook that reports panics as unhandled events.
	pub fn install_panic_hook(&self) {
		install_panic_hook(self.clone());
		info!("Panic hook installed");
	}

	/// Adds global metadata attached to every later event.
	pub fn add_metadata(
		&self,
		section: impl Into<String>,
		key: impl Into<String>,
		value: impl Into<Value>,
	) {
		let (section, key, value) = (section.into(), key.into(), value.into());
		self.inner.metadata.write().add_metadata(section, key, value);
	}

	pub fn clear_metadata(&self, section: &str, key: Option<&str>) {
		self.inner.metadata.write().clear_metadata(section, key);
	}

	pub fn get_metadata(&self, section: &str, key: &str) -> Option<Value> {
		self.inner.metadata.read().get_metadata(section, key).cloned()
	}

	pub fn set_user(&self, user: User) {
		*self.inner.user.write() = user;
	}

	pub fn user(&self) -> User {
		self.inner.user.read().clone()
	}

	pub fn set_context(&self, context: &str) {
		self.inner.baseline.write().set_context(context);
	}

	/// Edits the baseline record copied into every event.
	pub fn update_baseline(&self, update: impl FnOnce(&mut EventRecord)) {
		let mut record = *self.inner.baseline.read();
		update(&mut record);
		*self.inner.baseline.write() = record;
	}

	/// Baseline record with the current time and app duration filled in.
	pub fn baseline_record(&self) -> EventRecord {
		self.stamp(*self.inner.baseline.read())
	}

	fn stamp(&self, mut record: EventRecord) -> EventRecord {
		record.set_device_time(Utc::now().timestamp());
		record.set_app_duration(
			i64::try_from(self.inner.started.elapsed().as_millis()).unwrap_or(i64::MAX),
		);
		record
	}

	/// Copies the baseline into `slot` so a later capture only has to write
	/// the error fields.
	pub fn prime(&self, slot: &CaptureSlot) -> bool {
		slot.prime(&self.baseline_record())
	}

	/// Adds a breadcrumb, dropping the oldest once `max_breadcrumbs` is reached.
	pub fn leave_breadcrumb(&self, breadcrumb: Breadcrumb) {
		if self.inner.config.max_breadcrumbs == 0 {
			return;
		}
		self.push_breadcrumb(&mut self.inner.breadcrumbs.lock(), breadcrumb);
	}

	fn push_breadcrumb(&self, breadcrumbs: &mut VecDeque<Breadcrumb>, breadcrumb: Breadcrumb) {
		let max = self.inner.config.max_breadcrumbs;
		breadcrumbs.push_back(breadcrumb);
		while breadcrumbs.len() > max {
			breadcrumbs.pop_front();
		}
	}

	pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
		self.inner.breadcrumbs.lock().iter().cloned().collect()
	}

	pub fn clear_breadcrumbs(&self) {
		self.inner.breadcrumbs.lock().clear();
	}

	/// Registers a callback run against every event before it is sent.
	pub fn add_on_error<F>(&self, callback: F)
	where
		F: Fn(&mut Event) -> bool + Send + Sync + 'static,
	{
		self.inner.on_error.write().push(Arc::new(callback));
	}

	/// Starts a new session that events are counted against.
	pub fn start_session(&self) -> Arc<Session> {
		self.inner.sessions.start_session(false)
	}

	pub fn pause_session(&self) {
		self.inner.sessions.pause_session();
	}

	/// Resumes the paused session or starts a new one. Returns `true` if a
	/// paused session was resumed.
	pub fn resume_session(&self) -> bool {
		self.inner.sessions.resume_session()
	}

	pub fn current_session(&self) -> Option<Arc<Session>> {
		self.inner.sessions.current_session()
	}

	/// Reports a handled error, with its source chain as causes.
	pub fn notify(&self, error: &(dyn std::error::Error + 'static)) -> NotifyOutcome {
		let exception = Exception::from_error(error).with_stacktrace(capture_backtrace());
		self.report(
			Report {
				origin: Origin::Exception(exception),
				severity: Severity::Warning,
				reason: SeverityReason::HandledException,
				attribute: None,
				from_hook: false,
			},
			|_| true,
		)
	}

	/// Reports an exception at a caller-chosen severity. `on_error` runs after
	/// the global callbacks.
	pub fn notify_exception<F>(
		&self,
		exception: Exception,
		severity: Severity,
		on_error: F,
	) -> NotifyOutcome
	where
		F: FnOnce(&mut Event) -> bool,
	{
		self.report(
			Report {
				origin: Origin::Exception(exception),
				severity,
				reason: SeverityReason::UserSpecified,
				attribute: None,
				from_hook: false,
			},
			on_error,
		)
	}

	/// Reports an error that terminated (or is about to terminate) the program.
	pub fn notify_unhandled<F>(&self, exception: Exception, on_error: F) -> NotifyOutcome
	where
		F: FnOnce(&mut Event) -> bool,
	{
		self.report(
			Report {
				origin: Origin::Exception(exception),
				severity: Severity::Error,
				reason: SeverityReason::UnhandledException,
				attribute: None,
				from_hook: false,
			},
			on_error,
		)
	}

	/// Sends the record written into `slot` by the capture context as an
	/// unhandled signal event. Returns `None` if nothing was captured.
	pub fn deliver_captured(&self, slot: &CaptureSlot, signal_type: &str) -> Option<NotifyOutcome> {
		let record = slot.take()?;
		Some(self.report(
			Report {
				origin: Origin::Captured(record),
				severity: Severity::Error,
				reason: SeverityReason::Signal,
				attribute: Some(signal_type.to_string()),
				from_hook: false,
			},
			|_| true,
		))
	}

	/// Reports a panic from the panic hook. Client state held by the
	/// panicking thread is skipped rather than waited on.
	pub(crate) fn notify_panic<F>(&self, exception: Exception, on_error: F) -> NotifyOutcome
	where
		F: FnOnce(&mut Event) -> bool,
	{
		self.report(
			Report {
				origin: Origin::Exception(exception),
				severity: Severity::Error,
				reason: SeverityReason::UnhandledException,
				attribute: None,
				from_hook: true,
			},
			on_error,
		)
	}

	fn report<F>(&self, report: Report, on_error: F) -> NotifyOutcome
	where
		F: FnOnce(&mut Event) -> bool,
	{
		let config = &self.inner.config;
		let _reporting = ReportingGuard::enter();

		if !config.should_notify_for_release_stage() {
			debug!(release_stage = %config.release_stage, "Release stage not enabled");
			return NotifyOutcome::Ignored;
		}
		let from_hook = report.from_hook;

		let mut event = match self.build_event(report) {
			Ok(event) => event,
			Err(e) => {
				warn!(error = %e, "Failed to build event, dropping");
				return NotifyOutcome::Dropped;
			}
		};

		let callbacks = read_snapshot(&self.inner.on_error, from_hook);
		for callback in &callbacks {
			if !run_callback(|| callback(&mut event)) {
				debug!(error_class = %event.exception_name(), "Event discarded by on_error callback");
				return NotifyOutcome::Vetoed;
			}
		}
		if !run_callback(|| on_error(&mut event)) {
			debug!(error_class = %event.exception_name(), "Event discarded by on_error callback");
			return NotifyOutcome::Vetoed;
		}

		if config.should_ignore_class(event.exception_name()) {
			debug!(error_class = %event.exception_name(), "Event class ignored");
			return NotifyOutcome::Ignored;
		}

		let breadcrumb = Breadcrumb::new(event.exception_name(), BreadcrumbType::Error)
			.with_metadata("errorClass", event.exception_name())
			.with_metadata("message", event.exception_message())
			.with_metadata("unhandled", event.is_unhandled())
			.with_metadata("severity", event.severity().to_string());
		if !from_hook {
			self.leave_breadcrumb(breadcrumb);
		} else if config.max_breadcrumbs > 0 {
			if let Some(mut breadcrumbs) = self.inner.breadcrumbs.try_lock_for(HOOK_LOCK_TIMEOUT) {
				self.push_breadcrumb(&mut breadcrumbs, breadcrumb);
			}
		}

		let payload = match event.to_json() {
			Ok(payload) => payload,
			Err(e) => {
				warn!(error = %e, "Failed to serialize event, dropping");
				return NotifyOutcome::Dropped;
			}
		};

		let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
			self.inner.delivery.deliver(&config.api_key, &event, &payload)
		}));
		match delivered {
			Ok(Ok(())) => {
				debug!(
					error_class = %event.exception_name(),
					unhandled = event.is_unhandled(),
					"Event delivered"
				);
				NotifyOutcome::Delivered
			}
			Ok(Err(e)) => {
				warn!(error = %e, "Event delivery failed");
				NotifyOutcome::Dropped
			}
			Err(_) => {
				error!("Event delivery panicked");
				NotifyOutcome::Dropped
			}
		}
	}

	fn build_event(&self, report: Report) -> snag_core::Result<Event> {
		let config = &self.inner.config;
		let from_hook = report.from_hook;
		let global = read_snapshot(&self.inner.metadata, from_hook);
		let user = read_snapshot(&self.inner.user, from_hook);
		let breadcrumbs = if from_hook {
			self.inner
				.breadcrumbs
				.try_lock_for(HOOK_LOCK_TIMEOUT)
				.map(|breadcrumbs| breadcrumbs.iter().cloned().collect::<Vec<_>>())
				.unwrap_or_default()
		} else {
			self.breadcrumbs()
		};

		let mut builder = match report.origin {
			Origin::Exception(exception) => {
				let threads = ThreadState::current_thread(exception.stacktrace.clone());
				EventBuilder::new(exception)
					.record(self.stamp(read_snapshot(&self.inner.baseline, from_hook)))
					.threads(threads)
			}
			Origin::Captured(record) => EventBuilder::from_record(record),
		};
		if let Some(attribute) = report.attribute {
			builder = builder.attribute_value(attribute);
		}

		builder
			.severity(report.severity)
			.severity_reason(report.reason)
			.sessions(&self.inner.sessions, config.auto_track_sessions)
			.global_metadata(&global)
			.user(user)
			.breadcrumbs(breadcrumbs)
			.project_packages(config.project_packages.clone())
			.send_threads(config.send_threads)
			.redacted_keys(config.redacted_keys.clone())
			.build()
	}
}

/// Clones the value behind `lock`. From the panic hook the wait is bounded
/// and a lock that stays held yields the default value.
fn read_snapshot<T: Clone + Default>(lock: &RwLock<T>, from_hook: bool) -> T {
	if !from_hook {
		return lock.read().clone();
	}
	match lock.try_read_for(HOOK_LOCK_TIMEOUT) {
		Some(value) => value.clone(),
		None => {
			warn!("Client state locked during panic report, using default");
			T::default()
		}
	}
}

/// Runs one callback, treating a panic as "keep the event".
fn run_callback(callback: impl FnOnce() -> bool) -> bool {
	match panic::catch_unwind(AssertUnwindSafe(callback)) {
		Ok(keep) => keep,
		Err(_) => {
			error!("on_error callback panicked, skipping it");
			true
		}
	}
}
