// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pre-allocated record storage for the capture context.
//!
//! A [`CaptureSlot`] is meant to live in a `static`. The application primes it
//! with baseline app/device data while the process is healthy; a signal
//! handler or faulting thread later claims it with
//! [`CaptureSlot::begin_capture`], which only performs atomic operations, and
//! fills in the error fields. Once the process is in an ordinary context
//! again, [`CaptureSlot::take`] hands the record to the event builder.

use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::record::EventRecord;

const EMPTY: u8 = 0;
const PRIMED: u8 = 1;
const WRITING: u8 = 2;
const CAPTURED: u8 = 3;

const STATE_MASK: u8 = 0b011;
const ACTIVE_BIT: u8 = 0b100;

fn state_of(word: u8) -> u8 {
	word & STATE_MASK
}

fn active_of(word: u8) -> usize {
	usize::from(word & ACTIVE_BIT != 0)
}

fn pack(state: u8, active: usize) -> u8 {
	if active == 0 {
		state
	} else {
		state | ACTIVE_BIT
	}
}

/// Observable state of a [`CaptureSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
	Empty,
	Primed,
	Writing,
	Captured,
}

/// A double-buffered [`EventRecord`] guarded by an atomic state machine.
///
/// Captures always go to the active buffer. Priming fills the inactive
/// buffer and then flips it active, so a capture that starts while a prime
/// is still copying is never refused.
pub struct CaptureSlot {
	/// Slot state in the low bits, active buffer index in `ACTIVE_BIT`.
	word: AtomicU8,
	priming: AtomicBool,
	records: [UnsafeCell<EventRecord>; 2],
}

// SAFETY: the active record is only accessed by whoever moved the state into
// WRITING via compare_exchange. The inactive record is only written by the
// primer holding `priming`, and becomes active only through a
// compare_exchange that fails once a capture has claimed the slot.
unsafe impl Sync for CaptureSlot {}

impl CaptureSlot {
	pub const fn new() -> Self {
		Self {
			word: AtomicU8::new(EMPTY),
			priming: AtomicBool::new(false),
			records: [
				UnsafeCell::new(EventRecord::new()),
				UnsafeCell::new(EventRecord::new()),
			],
		}
	}

	pub fn state(&self) -> SlotState {
		match state_of(self.word.load(Ordering::Acquire)) {
			EMPTY => SlotState::Empty,
			PRIMED => SlotState::Primed,
			WRITING => SlotState::Writing,
			_ => SlotState::Captured,
		}
	}

	/// Copies `baseline` into the slot so a later capture starts from it.
	///
	/// Returns `false` when another prime is running, or when the slot is
	/// being written or already holds a captured record; the captured data
	/// is never overwritten.
	pub fn prime(&self, baseline: &EventRecord) -> bool {
		self.prime_then(baseline, || {})
	}

	/// Primes the inactive buffer, runs `before_publish`, then flips it active.
	fn prime_then(&self, baseline: &EventRecord, before_publish: impl FnOnce()) -> bool {
		if self
			.priming
			.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
			.is_err()
		{
			return false;
		}

		let word = self.word.load(Ordering::Acquire);
		let published = if matches!(state_of(word), EMPTY | PRIMED) {
			let target = 1 - active_of(word);
			// SAFETY: captures only touch the active buffer and other primers
			// are excluded by `priming`.
			unsafe { *self.records[target].get() = *baseline };
			before_publish();
			self.publish(pack(PRIMED, target))
		} else {
			false
		};

		self.priming.store(false, Ordering::Release);
		published
	}

	fn publish(&self, primed: u8) -> bool {
		let mut current = self.word.load(Ordering::Acquire);
		loop {
			if !matches!(state_of(current), EMPTY | PRIMED) {
				return false;
			}
			match self.word.compare_exchange_weak(
				current,
				primed,
				Ordering::AcqRel,
				Ordering::Acquire,
			) {
				Ok(_) => return true,
				Err(actual) => current = actual,
			}
		}
	}

	/// Claims the slot for writing from the capture context.
	///
	/// Performs no allocation and takes no lock. The record keeps whatever
	/// baseline was last published; an unprimed slot yields a zeroed record.
	/// Returns `None` if another capture is in progress or already finished.
	pub fn begin_capture(&self) -> Option<CaptureGuard<'_>> {
		let (prev, active) = self.claim(&[PRIMED, EMPTY])?;
		if prev == EMPTY {
			// SAFETY: this thread holds the WRITING state.
			unsafe { *self.records[active].get() = EventRecord::new() };
		}
		Some(CaptureGuard { slot: self, active })
	}

	/// Moves a captured record out and resets the slot to empty.
	pub fn take(&self) -> Option<EventRecord> {
		let (_, active) = self.claim(&[CAPTURED])?;
		// SAFETY: this thread holds the WRITING state.
		let record = unsafe { *self.records[active].get() };
		self.word.store(pack(EMPTY, active), Ordering::Release);
		Some(record)
	}

	/// Moves the slot into WRITING from one of `from`, keeping the active
	/// buffer. Returns the previous state and the active index.
	fn claim(&self, from: &[u8]) -> Option<(u8, usize)> {
		let mut current = self.word.load(Ordering::Acquire);
		loop {
			let state = state_of(current);
			if !from.contains(&state) {
				return None;
			}
			let active = active_of(current);
			match self.word.compare_exchange_weak(
				current,
				pack(WRITING, active),
				Ordering::Acquire,
				Ordering::Acquire,
			) {
				Ok(_) => return Some((state, active)),
				Err(actual) => current = actual,
			}
		}
	}
}

impl Default for CaptureSlot {
	fn default() -> Self {
		Self::new()
	}
}

/// Exclusive access to a slot's record during capture.
///
/// Dropping the guard publishes the record as captured.
pub struct CaptureGuard<'a> {
	slot: &'a CaptureSlot,
	active: usize,
}

impl Deref for CaptureGuard<'_> {
	type Target = EventRecord;

	fn deref(&self) -> &EventRecord {
		// SAFETY: the guard exists only while the slot is in WRITING for us.
		unsafe { &*self.slot.records[self.active].get() }
	}
}

impl DerefMut for CaptureGuard<'_> {
	fn deref_mut(&mut self) -> &mut EventRecord {
		// SAFETY: as above, and `&mut self` keeps the borrow unique.
		unsafe { &mut *self.slot.records[self.active].get() }
	}
}

impl Drop for CaptureGuard<'_> {
	fn drop(&mut self) {
		self.slot
			.word
			.store(pack(CAPTURED, self.active), Ordering::Release);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::AtomicUsize;
	use std::sync::Arc;
	use std::thread;

	fn baseline() -> EventRecord {
		let mut record = EventRecord::new();
		record.set_app_id("com.example.app");
		record.set_app_version("3.1.4");
		record.set_device_model("Pixel");
		record
	}

	#[test]
	fn capture_keeps_primed_baseline() {
		let slot = CaptureSlot::new();
		assert!(slot.prime(&baseline()));
		assert_eq!(slot.state(), SlotState::Primed);

		{
			let mut record = slot.begin_capture().unwrap();
			record.set_error_class("SIGSEGV");
			record.set_error_message("Segmentation violation (invalid memory reference)");
			record.set_error_type("c");
		}
		assert_eq!(slot.state(), SlotState::Captured);

		let record = slot.take().unwrap();
		assert_eq!(record.app_id(), "com.example.app");
		assert_eq!(record.device_model(), "Pixel");
		assert_eq!(record.error_class(), "SIGSEGV");
		assert_eq!(slot.state(), SlotState::Empty);
	}

	#[test]
	fn capture_during_prime_is_not_lost() {
		let slot = CaptureSlot::new();
		assert!(slot.prime(&baseline()));

		let mut newer = baseline();
		newer.set_app_version("3.2.0");
		let published = slot.prime_then(&newer, || {
			let mut record = slot.begin_capture().unwrap();
			record.set_error_class("SIGSEGV");
		});

		assert!(!published);
		assert_eq!(slot.state(), SlotState::Captured);
		let record = slot.take().unwrap();
		assert_eq!(record.error_class(), "SIGSEGV");
		assert_eq!(record.app_version(), "3.1.4");
	}

	#[test]
	fn reprime_replaces_baseline() {
		let slot = CaptureSlot::new();
		assert!(slot.prime(&baseline()));
		let mut newer = baseline();
		newer.set_app_version("3.2.0");
		assert!(slot.prime(&newer));
		assert!(slot.prime(&baseline()));
		assert!(slot.prime(&newer));

		slot.begin_capture().unwrap().set_error_class("SIGABRT");
		assert_eq!(slot.take().unwrap().app_version(), "3.2.0");
	}

	#[test]
	fn unprimed_capture_starts_zeroed() {
		let slot = CaptureSlot::new();
		{
			let mut record = slot.begin_capture().unwrap();
			record.set_error_class("SIGABRT");
		}
		let record = slot.take().unwrap();
		assert_eq!(record.app_id(), "");
		assert_eq!(record.error_class(), "SIGABRT");
	}

	#[test]
	fn second_capture_is_refused() {
		let slot = CaptureSlot::new();
		let first = slot.begin_capture();
		assert!(first.is_some());
		assert!(slot.begin_capture().is_none());
		drop(first);
		assert!(slot.begin_capture().is_none());
	}

	#[test]
	fn prime_does_not_overwrite_captured_record() {
		let slot = CaptureSlot::new();
		slot.begin_capture().unwrap().set_error_class("SIGBUS");
		assert!(!slot.prime(&baseline()));
		assert_eq!(slot.take().unwrap().error_class(), "SIGBUS");
	}

	#[test]
	fn take_on_empty_slot_is_none() {
		let slot = CaptureSlot::new();
		assert!(slot.take().is_none());
		slot.prime(&baseline());
		assert!(slot.take().is_none());
	}

	#[test]
	fn slot_works_as_static() {
		static SLOT: CaptureSlot = CaptureSlot::new();
		SLOT.begin_capture().unwrap().set_error_class("SIGILL");
		assert_eq!(SLOT.take().unwrap().error_class(), "SIGILL");
	}

	#[test]
	fn only_one_racing_thread_captures() {
		let slot = Arc::new(CaptureSlot::new());
		let winners = Arc::new(AtomicUsize::new(0));

		let handles: Vec<_> = (0..8)
			.map(|i| {
				let slot = Arc::clone(&slot);
				let winners = Arc::clone(&winners);
				thread::spawn(move || {
					if let Some(mut record) = slot.begin_capture() {
						record.set_error_message(&format!("thread {i}"));
						winners.fetch_add(1, Ordering::SeqCst);
					}
				})
			})
			.collect();
		for handle in handles {
			handle.join().unwrap();
		}

		assert_eq!(winners.load(Ordering::SeqCst), 1);
		assert!(slot.take().unwrap().error_message().starts_with("thread "));
	}
}
