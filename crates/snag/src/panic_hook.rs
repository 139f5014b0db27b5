// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Panic hook integration for automatic crash reporting.

use std::backtrace::Backtrace;
use std::panic::PanicHookInfo;

use snag_core::Exception;
use tracing::debug;

use crate::backtrace::parse_backtrace;
use crate::client::{is_reporting, Client};

/// Error class used for panics.
pub const PANIC_ERROR_CLASS: &str = "panic";

/// Install a panic hook that reports panics as unhandled events.
///
/// The previously installed hook still runs after the report. Panics raised
/// while this thread is already reporting, such as from an on-error callback
/// or a delivery, are left to the previous hook and the caller's
/// `catch_unwind`.
pub fn install_panic_hook(client: Client) {
	let previous_hook = std::panic::take_hook();

	std::panic::set_hook(Box::new(move |info| {
		if is_reporting() {
			debug!("Panic raised while reporting, not reported");
		} else {
			let backtrace = Backtrace::force_capture();
			report_panic(&client, info, &backtrace);
		}
		previous_hook(info);
	}));
}

fn report_panic(client: &Client, info: &PanicHookInfo<'_>, backtrace: &Backtrace) {
	let message = extract_panic_message(info);
	let location = info
		.location()
		.map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
	let thread = std::thread::current()
		.name()
		.unwrap_or("unnamed")
		.to_string();

	let exception = Exception::new(PANIC_ERROR_CLASS, message).with_stacktrace(parse_backtrace(backtrace));

	let outcome = client.notify_panic(exception, |event| {
		if let Some(location) = &location {
			event.add_metadata("panic", "location", location.as_str());
		}
		event.add_metadata("panic", "thread", thread.as_str());
		true
	});
	debug!(?outcome, "Panic reported");
}

/// Extract the panic message from panic info.
fn extract_panic_message(info: &PanicHookInfo<'_>) -> String {
	if let Some(s) = info.payload().downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = info.payload().downcast_ref::<String>() {
		s.clone()
	} else {
		"Box<dyn Any>".to_string()
	}
}
