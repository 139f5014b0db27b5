// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fixed-capacity string storage and the bounded copy used by every mutator.
//!
//! Nothing in this module allocates or locks, so all of it may run in the
//! capture context (signal handler, panic hook, faulted thread).

use std::fmt;

use serde::{Serialize, Serializer};

/// Copies `src` into `dest`, truncating so the copied bytes plus a trailing
/// NUL always fit. Returns the number of bytes copied, not counting the
/// terminator.
///
/// - `None` leaves `dest` holding an empty string.
/// - A zero-length `dest` is left untouched and `0` is returned.
/// - Truncation backs off to the nearest UTF-8 boundary, so the stored bytes
///   are always a valid prefix of `src`.
/// - Every byte after the terminator is zeroed.
///
/// Truncation is silent and never reported as an error.
pub fn write_bounded(dest: &mut [u8], src: Option<&str>) -> usize {
	let Some(max) = dest.len().checked_sub(1) else {
		return 0;
	};
	let src = src.unwrap_or("");

	let mut len = src.len().min(max);
	while !src.is_char_boundary(len) {
		len -= 1;
	}

	dest[..len].copy_from_slice(&src.as_bytes()[..len]);
	dest[len..].fill(0);
	len
}

/// Reads the string stored in a NUL-terminated buffer.
///
/// Stops at the first NUL (or the end of the buffer). Bytes that are not
/// valid UTF-8, which can only appear if something other than
/// [`write_bounded`] filled the buffer, cut the result at the last valid
/// character.
pub fn read_bounded(src: &[u8]) -> &str {
	let end = src.iter().position(|&b| b == 0).unwrap_or(src.len());
	let bytes = &src[..end];
	match std::str::from_utf8(bytes) {
		Ok(s) => s,
		Err(e) => std::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
	}
}

/// An inline string of at most `N - 1` bytes, NUL-terminated in place.
///
/// The layout is a plain byte array so a record made of these can be written
/// where the allocator is unusable and handed across a process boundary.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct BoundedStr<const N: usize> {
	bytes: [u8; N],
}

impl<const N: usize> BoundedStr<N> {
	/// Total capacity in bytes, including the terminator.
	pub const CAPACITY: usize = N;

	/// An empty string.
	pub const fn new() -> Self {
		Self { bytes: [0; N] }
	}

	/// Replaces the contents with `value`, truncating if needed.
	pub fn set(&mut self, value: &str) -> usize {
		write_bounded(&mut self.bytes, Some(value))
	}

	pub fn clear(&mut self) {
		write_bounded(&mut self.bytes, None);
	}

	pub fn as_str(&self) -> &str {
		read_bounded(&self.bytes)
	}

	pub fn len(&self) -> usize {
		self.as_str().len()
	}

	pub fn is_empty(&self) -> bool {
		self.bytes.first().map_or(true, |&b| b == 0)
	}

	/// The raw backing storage, terminator included.
	pub fn as_bytes_with_nul(&self) -> &[u8; N] {
		&self.bytes
	}
}

impl<const N: usize> Default for BoundedStr<N> {
	fn default() -> Self {
		Self::new()
	}
}

impl<const N: usize> From<&str> for BoundedStr<N> {
	fn from(value: &str) -> Self {
		let mut s = Self::new();
		s.set(value);
		s
	}
}

impl<const N: usize> AsRef<str> for BoundedStr<N> {
	fn as_ref(&self) -> &str {
		self.as_str()
	}
}

impl<const N: usize> fmt::Debug for BoundedStr<N> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self.as_str(), f)
	}
}

impl<const N: usize> fmt::Display for BoundedStr<N> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl<const N: usize> Serialize for BoundedStr<N> {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}
