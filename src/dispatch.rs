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

//! This module stores the background event dispatcher.

use crate::event::{Event, EventSink};
use crossbeam_queue::SegQueue;
use parking_lot::{Condvar, Mutex};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, Thread};
use std::time::Duration;

/// How long the dispatcher sleeps when there are no events
const IDLE_TIMEOUT: Duration = Duration::from_millis(10);

/// State shared between emitters and the dispatcher thread
struct Shared {
	/// Events waiting to be delivered
	queue: SegQueue<Event>,
	/// Specifies whether the dispatcher thread is running
	enabled: AtomicBool,
	/// The number of events emitted so far
	sent: AtomicU64,
	/// The number of events delivered so far
	delivered: Mutex<u64>,
	/// Condition variable for threads waiting on delivery
	condvar: Condvar,
}

/// Delivers station events to a sink on a dedicated thread.
///
/// Cars and pumps only push onto a lock-free queue, so a slow or
/// panicking sink can never hold up the simulation.
pub struct Dispatcher {
	/// State shared with every emitter
	shared: Arc<Shared>,
	/// Handle to the background dispatcher thread
	handle: Option<JoinHandle<()>>,
}

/// A cheap handle used by tasks to queue events for delivery
#[derive(Clone)]
pub struct Emitter {
	/// State shared with the dispatcher
	shared: Arc<Shared>,
	/// The dispatcher thread, unparked on every event
	worker: Thread,
}

impl Dispatcher {
	/// Start a new dispatcher delivering events to `sink`
	pub fn new(sink: Arc<dyn EventSink>) -> Self {
		// Create the shared dispatcher state
		let shared = Arc::new(Shared {
			queue: SegQueue::new(),
			enabled: AtomicBool::new(true),
			sent: AtomicU64::new(0),
			delivered: Mutex::new(0),
			condvar: Condvar::new(),
		});
		// Clone the state for the worker thread
		let state = shared.clone();
		// Spawn the background worker thread
		let handle = thread::spawn(move || {
			// Check whether the dispatcher is enabled
			while state.enabled.load(Ordering::Acquire) {
				// Deliver everything queued so far
				state.deliver(&*sink);
				// Sleep until more events arrive
				thread::park_timeout(IDLE_TIMEOUT);
			}
			// Deliver any events left after shutdown
			state.deliver(&*sink);
		});
		// Return the dispatcher
		Self {
			shared,
			handle: Some(handle),
		}
	}

	/// Create a new emitter feeding this dispatcher
	pub fn emitter(&self) -> Emitter {
		Emitter {
			shared: self.shared.clone(),
			worker: self.worker().clone(),
		}
	}

	/// Block until every event emitted so far has been delivered
	pub fn flush(&self) {
		// Get the number of events emitted so far
		let target = self.shared.sent.load(Ordering::Acquire);
		// Wait for the worker to catch up
		let mut delivered = self.shared.delivered.lock();
		while *delivered < target {
			self.worker().unpark();
			self.shared.condvar.wait_for(&mut delivered, IDLE_TIMEOUT);
		}
	}

	fn worker(&self) -> &Thread {
		match &self.handle {
			Some(handle) => handle.thread(),
			None => unreachable!("dispatcher thread is only taken on drop"),
		}
	}
}

impl Drop for Dispatcher {
	fn drop(&mut self) {
		// Signal shutdown to the worker thread
		self.shared.enabled.store(false, Ordering::Release);
		// Stop the worker thread, letting it drain the queue
		if let Some(handle) = self.handle.take() {
			handle.thread().unpark();
			let _ = handle.join();
		}
	}
}

impl Shared {
	/// Hand every queued event to the sink
	fn deliver(&self, sink: &dyn EventSink) {
		while let Some(event) = self.queue.pop() {
			// A panicking sink must not take the dispatcher down
			if panic::catch_unwind(AssertUnwindSafe(|| sink.emit(event))).is_err() {
				tracing::error!("Event sink panicked while handling: {event}");
			}
			// Record the delivery and wake any flushers
			let mut delivered = self.delivered.lock();
			*delivered += 1;
			self.condvar.notify_all();
		}
	}
}

impl Emitter {
	/// Queue an event for delivery without waiting for the sink
	pub fn emit(&self, event: Event) {
		self.shared.sent.fetch_add(1, Ordering::AcqRel);
		self.shared.queue.push(event);
		self.worker.unpark();
	}
}
