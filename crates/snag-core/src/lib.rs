// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Snag crash reporter.
//!
//! This crate holds the event data model shared by the capture site and the
//! reporting client (`snag`). It does no I/O and no logging.
//!
//! # Overview
//!
//! - [`EventRecord`]: fixed-capacity context/app/device/error fields that can
//!   be written without allocating, e.g. from a signal handler
//! - [`CaptureSlot`]: lock-free handoff of a record out of the capture context
//! - [`EventBuilder`]: resolves the handled state, snapshots the session and
//!   merges global with per-event metadata
//! - [`Event`]: the finished event, editable by callbacks, serialized with a
//!   fixed key order
//!
//! String fields are truncated silently when too long; capacities are listed
//! in [`record::capacity`].

pub mod bounded;
pub mod breadcrumb;
pub mod builder;
pub mod capture;
pub mod error;
pub mod event;
pub mod exception;
pub mod metadata;
pub mod record;
pub mod session;
pub mod severity;
pub mod thread;
pub mod user;

pub use bounded::{read_bounded, write_bounded, BoundedStr};
pub use breadcrumb::{Breadcrumb, BreadcrumbType};
pub use builder::EventBuilder;
pub use capture::{CaptureGuard, CaptureSlot, SlotState};
pub use error::{EventError, Result};
pub use event::Event;
pub use exception::{Exception, Frame, Stacktrace};
pub use metadata::{MetadataSet, REDACTED};
pub use record::{AppInfo, DeviceInfo, ErrorInfo, EventRecord};
pub use session::{Session, SessionId, SessionSnapshot, SessionTracker};
pub use severity::{HandledState, Severity, SeverityReason};
pub use thread::{ThreadInfo, ThreadState};
pub use user::User;
