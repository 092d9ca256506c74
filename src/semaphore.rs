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

//! This module stores the counting semaphore used by the waiting area.

use crate::err::Error;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A thread blocked on the semaphore
struct Waiter {
	/// The ticket identifying this waiter
	ticket: u64,
	/// The condition variable this waiter sleeps on
	condvar: Arc<Condvar>,
}

/// The shared state protected by the semaphore lock
struct State {
	/// Number of available permits
	permits: usize,
	/// Whether the semaphore has been closed
	closed: bool,
	/// The next ticket handed to a blocked waiter
	ticket: u64,
	/// Blocked waiters, in arrival order
	queue: VecDeque<Waiter>,
}

impl State {
	/// Check if the waiter holding `ticket` may take a permit
	fn is_next(&self, ticket: u64) -> bool {
		self.permits > 0 && self.queue.front().map(|w| w.ticket) == Some(ticket)
	}

	/// Wake the waiter at the front of the queue, if a permit is free
	fn wake_head(&self) {
		if self.permits > 0 {
			if let Some(head) = self.queue.front() {
				head.condvar.notify_one();
			}
		}
	}

	/// Remove a ticket from the waiter queue
	fn forget(&mut self, ticket: u64) {
		if let Some(pos) = self.queue.iter().position(|w| w.ticket == ticket) {
			self.queue.remove(pos);
			// A new waiter may now be at the front
			if pos == 0 {
				self.wake_head();
			}
		}
	}
}

/// A blocking counting semaphore.
///
/// Blocked waiters are granted permits strictly in the order in which
/// they started waiting, so a waiter is never overtaken by a thread
/// which arrived after it. Each waiter sleeps on its own condition
/// variable and only the head of the queue is woken by a release.
/// Closing the semaphore wakes every waiter with [`Error::Cancelled`]
/// without consuming a permit.
pub struct Semaphore {
	state: Mutex<State>, // Permit counter and waiter queue
}

impl Semaphore {
	/// Create a new semaphore with `permits` available
	pub fn new(permits: usize) -> Self {
		Self {
			state: Mutex::new(State {
				permits,
				closed: false,
				ticket: 0,
				queue: VecDeque::new(),
			}),
		}
	}

	/// Acquire a permit (blocking if none are available)
	pub fn acquire(&self) -> Result<(), Error> {
		self.wait(None).map(|_| ())
	}

	/// Acquire a permit, giving up once `timeout` has elapsed.
	///
	/// Returns `Ok(false)` if the timeout expired before a permit
	/// could be granted.
	pub fn acquire_timeout(&self, timeout: Duration) -> Result<bool, Error> {
		self.wait(Some(Instant::now() + timeout))
	}

	/// Acquire a permit only if one is immediately available
	pub fn try_acquire(&self) -> bool {
		let mut state = self.state.lock();
		if state.closed || !state.queue.is_empty() || state.permits == 0 {
			return false;
		}
		state.permits -= 1;
		true
	}

	/// Release a permit, allowing the longest waiting thread to proceed
	pub fn release(&self) {
		let mut state = self.state.lock();
		state.permits += 1;
		state.wake_head();
	}

	/// Close the semaphore, cancelling all current and future waits
	pub fn close(&self) {
		let mut state = self.state.lock();
		state.closed = true;
		for waiter in state.queue.iter() {
			waiter.condvar.notify_one();
		}
	}

	/// Check if the semaphore has been closed
	pub fn is_closed(&self) -> bool {
		self.state.lock().closed
	}

	/// The number of currently available permits.
	///
	/// This is a point-in-time observation which may be stale by the
	/// time it is returned, so it must not drive acquire decisions.
	pub fn value(&self) -> usize {
		self.state.lock().permits
	}

	/// The number of threads currently blocked on this semaphore
	pub fn waiters(&self) -> usize {
		self.state.lock().queue.len()
	}

	/// Wait for a permit until granted, cancelled, or past the deadline
	fn wait(&self, deadline: Option<Instant>) -> Result<bool, Error> {
		// Lock the permit state
		let mut state = self.state.lock();
		// A closed semaphore never grants permits
		if state.closed {
			return Err(Error::Cancelled);
		}
		// Take a permit straight away if nobody is queued
		if state.queue.is_empty() && state.permits > 0 {
			state.permits -= 1;
			return Ok(true);
		}
		// Join the back of the waiter queue
		let ticket = state.ticket;
		let condvar = Arc::new(Condvar::new());
		state.ticket = state.ticket.wrapping_add(1);
		state.queue.push_back(Waiter {
			ticket,
			condvar: condvar.clone(),
		});
		// Wait until this ticket is at the front with a permit free
		loop {
			if state.closed {
				state.forget(ticket);
				return Err(Error::Cancelled);
			}
			if state.is_next(ticket) {
				state.queue.pop_front();
				state.permits -= 1;
				// Hand any leftover permits on to the next waiter
				state.wake_head();
				return Ok(true);
			}
			match deadline {
				None => condvar.wait(&mut state),
				Some(deadline) => {
					if condvar.wait_until(&mut state, deadline).timed_out()
						&& !state.is_next(ticket)
						&& !state.closed
					{
						state.forget(ticket);
						return Ok(false);
					}
				}
			}
		}
	}
}
