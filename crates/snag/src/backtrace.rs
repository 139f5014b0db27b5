// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Backtrace capture and parsing into event stack frames.

use rustc_demangle::demangle;
use snag_core::{Frame, Stacktrace};
use std::backtrace::Backtrace;

/// Parse a Rust backtrace into a Stacktrace, dropping the leading frames
/// that belong to the runtime and the capture machinery.
pub fn parse_backtrace(backtrace: &Backtrace) -> Stacktrace {
	let bt_string = format!("{backtrace:#}");
	let mut frames = parse_backtrace_string(&bt_string);
	let first_app_frame = frames
		.iter()
		.position(|frame| frame.method.as_deref().is_some_and(|m| !is_runtime_frame(m)))
		.unwrap_or(0);
	frames.drain(..first_app_frame);
	Stacktrace { frames }
}

/// Parse backtrace string output into frames.
///
/// The format is `N: function` lines, each optionally followed by an
/// `at file:line:column` line.
fn parse_backtrace_string(bt_string: &str) -> Vec<Frame> {
	let mut frames: Vec<Frame> = Vec::new();

	for line in bt_string.lines() {
		let line = line.trim();
		if line.is_empty() {
			continue;
		}

		if let Some(location) = line.strip_prefix("at ") {
			if let Some(frame) = frames.last_mut() {
				let (file, line_number) = parse_location(location);
				frame.file = Some(file);
				frame.line_number = line_number;
			}
			continue;
		}

		if let Some(frame) = parse_frame_line(line) {
			frames.push(frame);
		}
	}

	frames
}

/// Parse a single `N: function` line into a Frame.
fn parse_frame_line(line: &str) -> Option<Frame> {
	let function_part = match line.split_once(':') {
		Some((prefix, rest)) if prefix.trim().parse::<u32>().is_ok() => rest.trim(),
		_ => line,
	};

	if function_part.is_empty() {
		return None;
	}

	Some(Frame {
		method: Some(demangle(function_part).to_string()),
		..Default::default()
	})
}

/// Split `path:line:column` into the path and line number.
fn parse_location(location: &str) -> (String, Option<u32>) {
	let mut parts = location.rsplitn(3, ':');
	let last = parts.next();
	let middle = parts.next();
	let rest = parts.next();

	match (rest, middle, last) {
		(Some(file), Some(line), Some(_column)) if line.parse::<u32>().is_ok() => {
			(file.to_string(), line.parse().ok())
		}
		(_, Some(file), Some(line)) if line.parse::<u32>().is_ok() => {
			let file = match rest {
				Some(head) => format!("{head}:{file}"),
				None => file.to_string(),
			};
			(file, line.parse().ok())
		}
		_ => (location.to_string(), None),
	}
}

/// Whether a frame belongs to the standard library or the capture path
/// rather than the code that raised the error.
fn is_runtime_frame(function: &str) -> bool {
	const RUNTIME_PREFIXES: &[&str] = &[
		"std::",
		"core::",
		"alloc::",
		"<std::",
		"<core::",
		"<alloc::",
		"snag::",
		"<snag::",
		"rustc_demangle::",
		"rust_begin_unwind",
		"rust_panic",
		"__rust_",
		"_rust_",
	];

	const RUNTIME_CONTAINS: &[&str] = &["::panic::", "::panicking::", "::backtrace::"];

	RUNTIME_PREFIXES
		.iter()
		.any(|prefix| function.starts_with(prefix))
		|| RUNTIME_CONTAINS
			.iter()
			.any(|needle| function.contains(needle))
}

/// Capture a fresh backtrace of the calling thread and parse it.
pub fn capture_backtrace() -> Stacktrace {
	parse_backtrace(&Backtrace::force_capture())
}
