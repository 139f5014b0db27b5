// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end reporting through a recording delivery.

use std::fmt;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use serde_json::Value;
use snag::{
	Breadcrumb, BreadcrumbType, CaptureSlot, Client, ClientConfig, Delivery, Event, Exception,
	NotifyOutcome, Severity, SnagError, User,
};

#[derive(Clone, Default)]
struct RecordingDelivery {
	payloads: Arc<Mutex<Vec<(String, Value)>>>,
}

impl RecordingDelivery {
	fn last(&self) -> Value {
		self.payloads.lock().last().map(|(_, v)| v.clone()).unwrap()
	}

	fn count(&self) -> usize {
		self.payloads.lock().len()
	}
}

impl Delivery for RecordingDelivery {
	fn deliver(&self, api_key: &str, _event: &Event, payload: &str) -> snag::Result<()> {
		let value = serde_json::from_str(payload).unwrap();
		self.payloads.lock().push((api_key.to_string(), value));
		Ok(())
	}
}

struct FailingDelivery;

impl Delivery for FailingDelivery {
	fn deliver(&self, _api_key: &str, _event: &Event, _payload: &str) -> snag::Result<()> {
		Err(SnagError::Delivery("collector unreachable".to_string()))
	}
}

fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter("snag=debug")
		.with_test_writer()
		.try_init();
}

fn client(config: ClientConfig) -> (Client, RecordingDelivery) {
	init_tracing();
	let delivery = RecordingDelivery::default();
	let client = Client::builder()
		.config(config)
		.delivery(delivery.clone())
		.build()
		.unwrap();
	(client, delivery)
}

fn config() -> ClientConfig {
	ClientConfig {
		app_version: Some("1.0".to_string()),
		project_packages: Some(vec!["notify_test".to_string()]),
		..ClientConfig::new("0123456789abcdef0123456789abcdef")
	}
}

#[derive(Debug)]
struct ConnectError(std::io::Error);

impl fmt::Display for ConnectError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "could not connect to database")
	}
}

impl std::error::Error for ConnectError {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		Some(&self.0)
	}
}

#[test]
fn notify_delivers_handled_event() {
	let (client, delivery) = client(config());
	client.add_metadata("account", "plan", "pro");
	client.set_user(User::new(Some("u-1".to_string()), None, None));
	client.set_context("Checkout");
	client.leave_breadcrumb(Breadcrumb::new("Opened cart", BreadcrumbType::Navigation));

	let error = ConnectError(std::io::Error::other("connection refused"));
	let outcome = client.notify(&error);

	assert_eq!(outcome, NotifyOutcome::Delivered);
	let (api_key, _) = delivery.payloads.lock()[0].clone();
	assert_eq!(api_key, "0123456789abcdef0123456789abcdef");

	let event = delivery.last();
	assert_eq!(event["context"], "Checkout");
	assert_eq!(event["severity"], "warning");
	assert_eq!(event["severityReason"]["type"], "handledException");
	assert_eq!(event["unhandled"], false);
	assert_eq!(event["exceptions"][0]["errorClass"], "ConnectError");
	assert_eq!(event["exceptions"][0]["message"], "could not connect to database");
	assert_eq!(event["exceptions"][1]["message"], "connection refused");
	assert_eq!(event["metaData"]["account"]["plan"], "pro");
	assert_eq!(event["user"]["id"], "u-1");
	assert_eq!(event["app"]["version"], "1.0");
	assert_eq!(event["breadcrumbs"][0]["name"], "Opened cart");
	assert_eq!(event["session"]["events"]["handled"], 1);
	assert!(event["threads"].is_array());
}

#[test]
fn per_call_metadata_overrides_global_without_leaking() {
	let (client, delivery) = client(config());
	client.add_metadata("device", "foo", "bar");

	client.notify_exception(Exception::new("E", "m"), Severity::Info, |event| {
		event.add_metadata("device", "foo", "baz");
		event.add_metadata("device", "extra", "qux");
		true
	});

	let event = delivery.last();
	assert_eq!(event["metaData"]["device"]["foo"], "baz");
	assert_eq!(event["metaData"]["device"]["extra"], "qux");
	assert_eq!(client.get_metadata("device", "foo"), Some(Value::from("bar")));
	assert_eq!(client.get_metadata("device", "extra"), None);
}

#[test]
fn global_callback_can_veto() {
	let (client, delivery) = client(config());
	client.add_on_error(|event| event.exception_name() != "Noise");

	let outcome = client.notify_exception(Exception::new("Noise", "m"), Severity::Info, |_| true);

	assert_eq!(outcome, NotifyOutcome::Vetoed);
	assert_eq!(delivery.count(), 0);
}

#[test]
fn callback_severity_change_is_reflected() {
	let (client, delivery) = client(config());

	client.notify_unhandled(Exception::new("E", "m"), |event| {
		event.set_severity(Severity::Info);
		event.set_grouping_hash(Some("grouped".to_string()));
		true
	});

	let event = delivery.last();
	assert_eq!(event["severity"], "info");
	assert_eq!(event["severityReason"]["type"], "userCallbackSetSeverity");
	assert_eq!(event["unhandled"], true);
	assert_eq!(event["groupingHash"], "grouped");
	assert_eq!(event["session"]["events"]["unhandled"], 1);
}

#[test]
fn ignored_classes_are_not_sent() {
	let (client, delivery) = client(ClientConfig {
		ignore_classes: vec!["Timeout".to_string()],
		..config()
	});

	let outcome = client.notify_exception(Exception::new("Timeout", "slow"), Severity::Error, |_| true);

	assert_eq!(outcome, NotifyOutcome::Ignored);
	assert_eq!(delivery.count(), 0);
}

#[test]
fn disabled_release_stage_is_not_sent() {
	let (client, delivery) = client(ClientConfig {
		release_stage: "development".to_string(),
		enabled_release_stages: Some(vec!["production".to_string()]),
		..config()
	});

	let outcome = client.notify_exception(Exception::new("E", "m"), Severity::Error, |_| true);

	assert_eq!(outcome, NotifyOutcome::Ignored);
	assert_eq!(delivery.count(), 0);
}

#[test]
fn redacted_keys_are_masked() {
	let (client, delivery) = client(config());
	client.add_metadata("login", "user_password", "hunter2");

	client.notify_exception(Exception::new("E", "m"), Severity::Error, |_| true);

	assert_eq!(delivery.last()["metaData"]["login"]["user_password"], "[REDACTED]");
}

#[test]
fn send_threads_disabled_omits_threads() {
	let (client, delivery) = client(ClientConfig {
		send_threads: false,
		..config()
	});

	client.notify_exception(Exception::new("E", "m"), Severity::Error, |_| true);

	assert!(delivery.last().get("threads").is_none());
}

#[test]
fn no_session_without_auto_tracking() {
	let (client, delivery) = client(ClientConfig {
		auto_track_sessions: false,
		..config()
	});

	client.notify_exception(Exception::new("E", "m"), Severity::Error, |_| true);
	assert!(delivery.last().get("session").is_none());

	client.start_session();
	client.notify_exception(Exception::new("E", "m"), Severity::Error, |_| true);
	assert_eq!(delivery.last()["session"]["events"]["handled"], 1);
}

#[test]
fn paused_session_is_not_counted() {
	let (client, delivery) = client(config());
	client.pause_session();

	client.notify_exception(Exception::new("E", "m"), Severity::Error, |_| true);
	assert!(delivery.last().get("session").is_none());

	assert!(client.resume_session());
	client.notify_exception(Exception::new("E", "m"), Severity::Error, |_| true);
	assert_eq!(delivery.last()["session"]["events"]["handled"], 1);
}

#[test]
fn concurrent_notifies_count_every_event() {
	let (client, delivery) = client(config());

	let handles: Vec<_> = (0..8)
		.map(|_| {
			let client = client.clone();
			thread::spawn(move || {
				for _ in 0..10 {
					client.notify_exception(Exception::new("E", "m"), Severity::Error, |_| true);
				}
			})
		})
		.collect();
	for handle in handles {
		handle.join().unwrap();
	}

	assert_eq!(delivery.count(), 80);
	assert_eq!(client.current_session().unwrap().handled_count(), 80);

	let mut seen: Vec<u64> = delivery
		.payloads
		.lock()
		.iter()
		.map(|(_, event)| event["session"]["events"]["handled"].as_u64().unwrap())
		.collect();
	seen.sort_unstable();
	assert_eq!(seen, (1..=80).collect::<Vec<_>>());
}

#[test]
fn failed_delivery_is_dropped_not_raised() {
	init_tracing();
	let client = Client::builder()
		.config(config())
		.delivery(FailingDelivery)
		.build()
		.unwrap();

	let outcome = client.notify_exception(Exception::new("E", "m"), Severity::Error, |_| true);

	assert_eq!(outcome, NotifyOutcome::Dropped);
}

#[test]
fn captured_record_is_sent_as_signal() {
	static SLOT: CaptureSlot = CaptureSlot::new();
	let (client, delivery) = client(config());

	assert!(client.prime(&SLOT));
	{
		let mut record = SLOT.begin_capture().unwrap();
		record.set_error_class("SIGSEGV");
		record.set_error_message("Segmentation violation (invalid memory reference)");
		record.set_error_type("c");
	}

	let outcome = client.deliver_captured(&SLOT, "SIGSEGV");
	assert_eq!(outcome, Some(NotifyOutcome::Delivered));
	assert_eq!(client.deliver_captured(&SLOT, "SIGSEGV"), None);

	let event = delivery.last();
	assert_eq!(event["exceptions"][0]["errorClass"], "SIGSEGV");
	assert_eq!(event["exceptions"][0]["type"], "c");
	assert_eq!(event["severityReason"]["type"], "signal");
	assert_eq!(event["severityReason"]["attributes"]["signalType"], "SIGSEGV");
	assert_eq!(event["unhandled"], true);
	assert_eq!(event["app"]["version"], "1.0");
	assert_eq!(event["threads"], Value::Null);
}
