// Copyright © SurrealDB Ltd
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! This module stores the cooperative stop signal shared by all tasks.

use crate::area::WaitingArea;
use parking_lot::{Condvar, Mutex};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// A one-way flag which takes every linked task offline when raised.
///
/// Raising the signal wakes tasks sleeping on it and closes every
/// linked [`WaitingArea`], which cancels tasks blocked on its
/// semaphores.
#[derive(Default)]
pub struct StopSignal {
	/// Whether the signal has been raised
	stopped: Mutex<bool>,
	/// Condition variable for sleeping tasks
	condvar: Condvar,
	/// Waiting areas closed when the signal is raised
	linked: Mutex<Vec<Weak<WaitingArea>>>,
}

impl StopSignal {
	/// Create a new, lowered stop signal
	pub fn new() -> Self {
		Self::default()
	}

	/// Close `area` when this signal is raised.
	///
	/// If the signal has already been raised the area is closed
	/// immediately.
	pub fn link(&self, area: &Arc<WaitingArea>) {
		let mut linked = self.linked.lock();
		if self.is_triggered() {
			area.close();
			return;
		}
		// Skip areas which are already linked
		if !linked.iter().any(|l| l.as_ptr() == Arc::as_ptr(area)) {
			linked.retain(|l| l.strong_count() > 0);
			linked.push(Arc::downgrade(area));
		}
	}

	/// Raise the signal, waking sleeping tasks and closing linked areas
	pub fn trigger(&self) {
		// Raise the flag and wake sleepers
		{
			let mut stopped = self.stopped.lock();
			*stopped = true;
			self.condvar.notify_all();
		}
		// Cancel every task blocked in a linked area
		let linked = std::mem::take(&mut *self.linked.lock());
		for area in linked.iter().filter_map(Weak::upgrade) {
			area.close();
		}
	}

	/// Check if the signal has been raised
	pub fn is_triggered(&self) -> bool {
		*self.stopped.lock()
	}

	/// Sleep for `duration`, returning early if the signal is raised.
	///
	/// Returns `true` only if a stop cut the sleep short.
	pub fn sleep(&self, duration: Duration) -> bool {
		self.sleep_until(Instant::now() + duration)
	}

	/// Sleep until `deadline`, returning early if the signal is raised.
	///
	/// Returns `true` only if a stop cut the sleep short.
	pub fn sleep_until(&self, deadline: Instant) -> bool {
		let mut stopped = self.stopped.lock();
		loop {
			// A sleep which ran its full course was not interrupted
			if Instant::now() >= deadline {
				return false;
			}
			if *stopped {
				return true;
			}
			if self.condvar.wait_until(&mut stopped, deadline).timed_out() {
				return false;
			}
		}
	}
}
