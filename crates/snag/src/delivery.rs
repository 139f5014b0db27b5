// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Hand-off of serialized events to whatever transports them.

use snag_core::Event;
use tracing::info;

use crate::error::Result;

/// Receives finished events from the client.
///
/// Implementations own transport, batching and retries. `deliver` is called
/// synchronously on the reporting thread, including from the panic hook, so
/// it should not block for long.
pub trait Delivery: Send + Sync {
	/// `payload` is the event's JSON transport form.
	fn deliver(&self, api_key: &str, event: &Event, payload: &str) -> Result<()>;
}

/// Delivery that writes each event to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDelivery;

impl Delivery for LoggingDelivery {
	fn deliver(&self, _api_key: &str, event: &Event, payload: &str) -> Result<()> {
		info!(
			error_class = %event.exception_name(),
			severity = %event.severity(),
			unhandled = event.is_unhandled(),
			payload = %payload,
			"Event ready for delivery"
		);
		Ok(())
	}
}
