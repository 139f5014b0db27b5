// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash and error reporting SDK for Rust applications.
//!
//! Builds events with [`snag_core`], runs on-error callbacks, filters, and
//! hands the serialized payload to a [`Delivery`].
//!
//! # Example
//!
//! ```ignore
//! use snag::{Client, ClientConfig};
//!
//! let config = ClientConfig::load(Some("snag.toml".as_ref()))?;
//! let client = Client::builder().config(config).build()?;
//! client.install_panic_hook();
//!
//! client.add_on_error(|event| {
//!     event.add_metadata("build", "commit", env!("GIT_COMMIT"));
//!     true
//! });
//! ```
//!
//! # Signal handlers
//!
//! Prime a static [`CaptureSlot`] from ordinary code, write the error into it
//! from the handler with [`CaptureSlot::begin_capture`], then report it later
//! with [`Client::deliver_captured`].

pub mod backtrace;
pub mod client;
pub mod config;
pub mod delivery;
pub mod error;
pub mod panic_hook;

pub use backtrace::{capture_backtrace, parse_backtrace};
pub use client::{Client, ClientBuilder, NotifyOutcome, OnErrorCallback};
pub use config::ClientConfig;
pub use delivery::{Delivery, LoggingDelivery};
pub use error::{ConfigError, Result, SnagError};
pub use panic_hook::install_panic_hook;

pub use snag_core::{
	Breadcrumb, BreadcrumbType, CaptureSlot, Event, EventRecord, Exception, Frame, Severity,
	SeverityReason, Stacktrace, User,
};
