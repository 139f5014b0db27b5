// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sessions and the snapshot of a session embedded in an event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::now_v7())
	}
}

impl Default for SessionId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for SessionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for SessionId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

// Both counters share one word so a single fetch_add updates one and reads a
// consistent pair. More than u32::MAX unhandled events in one session would
// carry into the handled half.
const HANDLED_ONE: u64 = 1 << 32;
const UNHANDLED_ONE: u64 = 1;

fn unpack(word: u64) -> (u32, u32) {
	((word >> 32) as u32, word as u32)
}

/// A period of application use during which event counts accumulate.
///
/// Shared between reporting threads. The only way to change the counters is
/// [`Session::increment_and_copy`].
#[derive(Debug)]
pub struct Session {
	id: SessionId,
	started_at: DateTime<Utc>,
	auto_captured: bool,
	counts: AtomicU64,
}

impl Session {
	pub fn new(started_at: DateTime<Utc>, auto_captured: bool) -> Self {
		Self::with_id(SessionId::new(), started_at, auto_captured)
	}

	pub fn with_id(id: SessionId, started_at: DateTime<Utc>, auto_captured: bool) -> Self {
		Self {
			id,
			started_at,
			auto_captured,
			counts: AtomicU64::new(0),
		}
	}

	pub fn id(&self) -> SessionId {
		self.id
	}

	pub fn started_at(&self) -> DateTime<Utc> {
		self.started_at
	}

	/// Whether the session was started automatically rather than by the app.
	pub fn is_auto_captured(&self) -> bool {
		self.auto_captured
	}

	pub fn handled_count(&self) -> u32 {
		unpack(self.counts.load(Ordering::Acquire)).0
	}

	pub fn unhandled_count(&self) -> u32 {
		unpack(self.counts.load(Ordering::Acquire)).1
	}

	/// Atomically bumps the handled or unhandled counter and returns a copy
	/// of the session that includes this increment.
	pub fn increment_and_copy(&self, unhandled: bool) -> SessionSnapshot {
		let delta = if unhandled { UNHANDLED_ONE } else { HANDLED_ONE };
		let word = self.counts.fetch_add(delta, Ordering::AcqRel).wrapping_add(delta);
		let (handled_count, unhandled_count) = unpack(word);
		SessionSnapshot {
			id: self.id,
			started_at: self.started_at,
			handled_count,
			unhandled_count,
		}
	}

	/// A copy of the session without touching the counters.
	pub fn snapshot(&self) -> SessionSnapshot {
		let (handled_count, unhandled_count) = unpack(self.counts.load(Ordering::Acquire));
		SessionSnapshot {
			id: self.id,
			started_at: self.started_at,
			handled_count,
			unhandled_count,
		}
	}
}

/// Session state copied into an event when it is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
	pub id: SessionId,
	pub started_at: DateTime<Utc>,
	pub handled_count: u32,
	pub unhandled_count: u32,
}

impl Serialize for SessionSnapshot {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		#[derive(Serialize)]
		struct Counts {
			handled: u32,
			unhandled: u32,
		}

		let mut map = serializer.serialize_map(Some(3))?;
		map.serialize_entry("id", &self.id.to_string())?;
		map.serialize_entry(
			"startedAt",
			&self.started_at.to_rfc3339_opts(SecondsFormat::Millis, true),
		)?;
		map.serialize_entry(
			"events",
			&Counts {
				handled: self.handled_count,
				unhandled: self.unhandled_count,
			},
		)?;
		map.end()
	}
}

#[derive(Debug, Default)]
struct TrackerState {
	current: Option<Arc<Session>>,
	paused: Option<Arc<Session>>,
}

/// Owns the current session for a client.
#[derive(Debug, Default)]
pub struct SessionTracker {
	state: Mutex<TrackerState>,
}

impl SessionTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Starts a new session, replacing any current or paused one.
	pub fn start_session(&self, auto_captured: bool) -> Arc<Session> {
		let session = Arc::new(Session::new(Utc::now(), auto_captured));
		let mut state = self.state.lock();
		state.current = Some(Arc::clone(&session));
		state.paused = None;
		session
	}

	/// Stops counting events against the current session.
	pub fn pause_session(&self) {
		let mut state = self.state.lock();
		if let Some(session) = state.current.take() {
			state.paused = Some(session);
		}
	}

	/// Resumes the paused session, or starts a new one if there is none.
	///
	/// Returns `true` if a paused session was resumed.
	pub fn resume_session(&self) -> bool {
		let mut state = self.state.lock();
		if state.current.is_some() {
			return false;
		}
		match state.paused.take() {
			Some(session) => {
				state.current = Some(session);
				true
			}
			None => {
				state.current = Some(Arc::new(Session::new(Utc::now(), false)));
				false
			}
		}
	}

	pub fn current_session(&self) -> Option<Arc<Session>> {
		self.state.lock().current.clone()
	}

	pub fn increment_handled_and_copy(&self) -> Option<SessionSnapshot> {
		self.current_session().map(|s| s.increment_and_copy(false))
	}

	pub fn increment_unhandled_and_copy(&self) -> Option<SessionSnapshot> {
		self.current_session().map(|s| s.increment_and_copy(true))
	}
}
