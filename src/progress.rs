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

//! This module stores the authoritative station progress tracker.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Counts of cars at each stage of their journey
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Counts {
	/// Cars which have been spawned
	pub spawned: u64,
	/// Cars which entered the waiting area
	pub enqueued: u64,
	/// Cars which completed service
	pub served: u64,
	/// Cars whose service was cut short by a stop
	pub aborted: u64,
	/// Cars which never entered the waiting area due to a stop
	pub cancelled: u64,
}

impl Counts {
	/// Check if every spawned car has reached a terminal state
	pub fn is_drained(&self) -> bool {
		self.served + self.aborted + self.cancelled >= self.spawned
	}
}

#[derive(Default)]
struct State {
	counts: Counts,
	halted: bool,
}

/// Tracks car progress and wakes the controller when work runs out
#[derive(Default)]
pub struct Progress {
	state: Mutex<State>,
	condvar: Condvar,
}

impl Progress {
	/// Create a new empty progress tracker
	pub fn new() -> Self {
		Self::default()
	}

	/// A copy of the current counts
	pub fn counts(&self) -> Counts {
		self.state.lock().counts
	}

	pub(crate) fn record_spawned(&self) {
		self.update(|c| c.spawned += 1);
	}

	pub(crate) fn record_enqueued(&self) {
		self.update(|c| c.enqueued += 1);
	}

	pub(crate) fn record_served(&self) {
		self.update(|c| c.served += 1);
	}

	pub(crate) fn record_aborted(&self) {
		self.update(|c| c.aborted += 1);
	}

	pub(crate) fn record_cancelled(&self) {
		self.update(|c| c.cancelled += 1);
	}

	/// Block until every spawned car has reached a terminal state.
	///
	/// Returns `false` if `timeout` expired or the tracker was halted
	/// before the station drained.
	pub fn wait_drained(&self, timeout: Option<Duration>) -> bool {
		let deadline = timeout.map(|t| Instant::now() + t);
		let mut state = self.state.lock();
		while !state.counts.is_drained() && !state.halted {
			match deadline {
				None => self.condvar.wait(&mut state),
				Some(deadline) => {
					if self.condvar.wait_until(&mut state, deadline).timed_out() {
						break;
					}
				}
			}
		}
		state.counts.is_drained()
	}

	/// Release every waiter, whether or not the station has drained
	pub(crate) fn halt(&self) {
		let mut state = self.state.lock();
		state.halted = true;
		self.condvar.notify_all();
	}

	fn update(&self, f: impl FnOnce(&mut Counts)) {
		let mut state = self.state.lock();
		f(&mut state.counts);
		self.condvar.notify_all();
	}
}

#[cfg(test)]
mod tests {

	use super::*;
	use std::sync::Arc;
	use std::thread;

	#[test]
	fn drained_once_all_cars_finish() {
		let progress = Progress::new();
		assert!(progress.wait_drained(Some(Duration::from_millis(1))));
		progress.record_spawned();
		progress.record_spawned();
		progress.record_enqueued();
		progress.record_served();
		assert!(!progress.wait_drained(Some(Duration::from_millis(20))));
		progress.record_cancelled();
		assert!(progress.wait_drained(None));
		let counts = progress.counts();
		assert_eq!(counts.spawned, 2);
		assert_eq!(counts.enqueued, 1);
		assert_eq!(counts.served, 1);
		assert_eq!(counts.cancelled, 1);
	}

	#[test]
	fn waiter_wakes_on_last_service() {
		let progress = Arc::new(Progress::new());
		progress.record_spawned();
		let handle = {
			let progress = progress.clone();
			thread::spawn(move || progress.wait_drained(None))
		};
		thread::sleep(Duration::from_millis(20));
		progress.record_aborted();
		assert!(handle.join().unwrap());
	}

	#[test]
	fn halt_releases_waiter_early() {
		let progress = Arc::new(Progress::new());
		progress.record_spawned();
		let handle = {
			let progress = progress.clone();
			thread::spawn(move || progress.wait_drained(None))
		};
		thread::sleep(Duration::from_millis(20));
		progress.halt();
		assert!(!handle.join().unwrap());
	}
}
