// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The fixed-size event record and its accessor surface.
//!
//! An [`EventRecord`] owns all of its storage inline: every string field is a
//! [`BoundedStr`] and every other field is a plain scalar, so a record can be
//! created and filled in without touching the allocator. All reads and writes
//! from outside this crate go through the per-field accessors on
//! [`EventRecord`], which route string writes through
//! [`write_bounded`](crate::bounded::write_bounded).
//!
//! Numeric fields start at zero/false. An unset scalar cannot be told apart
//! from one explicitly set to zero.

use serde::Serialize;

use crate::bounded::BoundedStr;

/// Byte capacities of every bounded field, terminator included.
///
/// These are part of the external contract: anything that reads or writes a
/// record across a process boundary must agree on them.
pub mod capacity {
	pub const CONTEXT: usize = 64;

	pub const APP_ID: usize = 64;
	pub const APP_RELEASE_STAGE: usize = 64;
	pub const APP_TYPE: usize = 32;
	pub const APP_VERSION: usize = 32;
	pub const APP_BUILD_UUID: usize = 64;
	pub const APP_BINARY_ARCH: usize = 32;

	pub const DEVICE_ID: usize = 64;
	pub const DEVICE_LOCALE: usize = 32;
	pub const DEVICE_MANUFACTURER: usize = 64;
	pub const DEVICE_MODEL: usize = 64;
	pub const DEVICE_OS_NAME: usize = 64;
	pub const DEVICE_OS_VERSION: usize = 64;
	pub const DEVICE_ORIENTATION: usize = 32;

	pub const ERROR_CLASS: usize = 64;
	pub const ERROR_MESSAGE: usize = 256;
	pub const ERROR_TYPE: usize = 32;
}

/// Application state at the time of the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[repr(C)]
pub struct AppInfo {
	pub(crate) id: BoundedStr<{ capacity::APP_ID }>,
	pub(crate) release_stage: BoundedStr<{ capacity::APP_RELEASE_STAGE }>,
	#[serde(rename = "type")]
	pub(crate) app_type: BoundedStr<{ capacity::APP_TYPE }>,
	pub(crate) version: BoundedStr<{ capacity::APP_VERSION }>,
	pub(crate) version_code: i32,
	#[serde(rename = "buildUUID")]
	pub(crate) build_uuid: BoundedStr<{ capacity::APP_BUILD_UUID }>,
	pub(crate) binary_arch: BoundedStr<{ capacity::APP_BINARY_ARCH }>,
	/// Milliseconds since launch.
	pub(crate) duration: i64,
	/// Milliseconds spent in the foreground.
	pub(crate) duration_in_foreground: i64,
	pub(crate) in_foreground: bool,
}

impl AppInfo {
	pub const fn new() -> Self {
		Self {
			id: BoundedStr::new(),
			release_stage: BoundedStr::new(),
			app_type: BoundedStr::new(),
			version: BoundedStr::new(),
			version_code: 0,
			build_uuid: BoundedStr::new(),
			binary_arch: BoundedStr::new(),
			duration: 0,
			duration_in_foreground: 0,
			in_foreground: false,
		}
	}
}

impl Default for AppInfo {
	fn default() -> Self {
		Self::new()
	}
}

/// Device state at the time of the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[repr(C)]
pub struct DeviceInfo {
	pub(crate) id: BoundedStr<{ capacity::DEVICE_ID }>,
	pub(crate) locale: BoundedStr<{ capacity::DEVICE_LOCALE }>,
	pub(crate) manufacturer: BoundedStr<{ capacity::DEVICE_MANUFACTURER }>,
	pub(crate) model: BoundedStr<{ capacity::DEVICE_MODEL }>,
	pub(crate) os_name: BoundedStr<{ capacity::DEVICE_OS_NAME }>,
	pub(crate) os_version: BoundedStr<{ capacity::DEVICE_OS_VERSION }>,
	pub(crate) orientation: BoundedStr<{ capacity::DEVICE_ORIENTATION }>,
	pub(crate) jailbroken: bool,
	/// Bytes.
	pub(crate) total_memory: i64,
	/// Unix timestamp, seconds.
	pub(crate) time: i64,
}

impl DeviceInfo {
	pub const fn new() -> Self {
		Self {
			id: BoundedStr::new(),
			locale: BoundedStr::new(),
			manufacturer: BoundedStr::new(),
			model: BoundedStr::new(),
			os_name: BoundedStr::new(),
			os_version: BoundedStr::new(),
			orientation: BoundedStr::new(),
			jailbroken: false,
			total_memory: 0,
			time: 0,
		}
	}
}

impl Default for DeviceInfo {
	fn default() -> Self {
		Self::new()
	}
}

/// The primary error of the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct ErrorInfo {
	pub(crate) error_class: BoundedStr<{ capacity::ERROR_CLASS }>,
	pub(crate) error_message: BoundedStr<{ capacity::ERROR_MESSAGE }>,
	pub(crate) error_type: BoundedStr<{ capacity::ERROR_TYPE }>,
}

impl ErrorInfo {
	pub const fn new() -> Self {
		Self {
			error_class: BoundedStr::new(),
			error_message: BoundedStr::new(),
			error_type: BoundedStr::new(),
		}
	}
}

impl Default for ErrorInfo {
	fn default() -> Self {
		Self::new()
	}
}

/// Fixed-size store for one event's context, app, device and error data.
///
/// `EventRecord` is `Copy` and holds no pointers, so it is safe to build in a
/// signal handler and to move between the capture and callback contexts by
/// value. Exactly one owner may mutate a record at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct EventRecord {
	pub(crate) context: BoundedStr<{ capacity::CONTEXT }>,
	pub(crate) app: AppInfo,
	pub(crate) device: DeviceInfo,
	pub(crate) error: ErrorInfo,
}

macro_rules! bounded_accessors {
	($($(#[$meta:meta])* $get:ident, $set:ident => $($path:ident).+;)*) => {
		$(
			$(#[$meta])*
			pub fn $get(&self) -> &str {
				self.$($path).+.as_str()
			}

			pub fn $set(&mut self, value: &str) {
				self.$($path).+.set(value);
			}
		)*
	};
}

macro_rules! scalar_accessors {
	($($(#[$meta:meta])* $get:ident, $set:ident: $ty:ty => $($path:ident).+;)*) => {
		$(
			$(#[$meta])*
			pub fn $get(&self) -> $ty {
				self.$($path).+
			}

			pub fn $set(&mut self, value: $ty) {
				self.$($path).+ = value;
			}
		)*
	};
}

impl EventRecord {
	/// A zeroed record. Usable in `const` and `static` items.
	pub const fn new() -> Self {
		Self {
			context: BoundedStr::new(),
			app: AppInfo::new(),
			device: DeviceInfo::new(),
			error: ErrorInfo::new(),
		}
	}

	pub fn app(&self) -> &AppInfo {
		&self.app
	}

	pub fn device(&self) -> &DeviceInfo {
		&self.device
	}

	pub fn error(&self) -> &ErrorInfo {
		&self.error
	}

	bounded_accessors! {
		/// What the application was doing when the event happened.
		context, set_context => context;

		app_binary_arch, set_app_binary_arch => app.binary_arch;
		app_build_uuid, set_app_build_uuid => app.build_uuid;
		app_id, set_app_id => app.id;
		app_release_stage, set_app_release_stage => app.release_stage;
		app_type, set_app_type => app.app_type;
		app_version, set_app_version => app.version;

		device_id, set_device_id => device.id;
		device_locale, set_device_locale => device.locale;
		device_manufacturer, set_device_manufacturer => device.manufacturer;
		device_model, set_device_model => device.model;
		device_os_name, set_device_os_name => device.os_name;
		device_os_version, set_device_os_version => device.os_version;
		device_orientation, set_device_orientation => device.orientation;

		error_class, set_error_class => error.error_class;
		error_message, set_error_message => error.error_message;
		error_type, set_error_type => error.error_type;
	}

	scalar_accessors! {
		app_version_code, set_app_version_code: i32 => app.version_code;
		/// Milliseconds since the app launched.
		app_duration, set_app_duration: i64 => app.duration;
		app_duration_in_foreground, set_app_duration_in_foreground: i64 => app.duration_in_foreground;
		app_in_foreground, set_app_in_foreground: bool => app.in_foreground;

		device_jailbroken, set_device_jailbroken: bool => device.jailbroken;
		/// Total device memory in bytes.
		device_total_memory, set_device_total_memory: i64 => device.total_memory;
		device_time, set_device_time: i64 => device.time;
	}
}

impl Default for EventRecord {
	fn default() -> Self {
		Self::new()
	}
}
