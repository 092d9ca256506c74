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

//! This module stores the car producer task.

use crate::area::WaitingArea;
use crate::err::Error;
use crate::dispatch::Emitter;
use crate::event::{Event, EventKind};
use crate::progress::Progress;
use crate::ring::CarId;
use crate::stop::StopSignal;
use std::sync::Arc;

/// The lifecycle of a single car
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarState {
	Created,
	Arrived,
	Enqueued,
	Done,
}

/// An arriving car which inserts itself into the waiting area
pub struct Car {
	/// The identifier of this car
	pub(crate) id: CarId,
	/// The waiting area this car queues in
	pub(crate) area: Arc<WaitingArea>,
	/// The queue receiving this car's events
	pub(crate) events: Emitter,
	/// The station progress tracker
	pub(crate) progress: Arc<Progress>,
}

impl Car {
	/// Create a new car which will queue in `area`.
	///
	/// Raising `stop` cancels the car if it is still waiting for a slot.
	pub fn new(
		id: CarId,
		area: Arc<WaitingArea>,
		events: Emitter,
		progress: Arc<Progress>,
		stop: &StopSignal,
	) -> Self {
		// Ensure a stop reaches the car while it is blocked
		stop.link(&area);
		Self {
			id,
			area,
			events,
			progress,
		}
	}

	/// The identifier of this car
	pub fn id(&self) -> CarId {
		self.id
	}

	/// Arrive at the station and enter the waiting area.
	///
	/// Blocks while the waiting area is full. The only error is
	/// [`Error::Cancelled`], returned if the station stops first.
	pub fn run(self) -> Result<CarState, Error> {
		let id = self.id;
		let mut state = CarState::Created;
		tracing::trace!(car = id, ?state, "Car created");
		// Announce the arrival
		state = CarState::Arrived;
		tracing::debug!(car = id, ?state, "Car arrived");
		self.events.emit(Event::car(id, EventKind::Arrived));
		// Join the waiting area
		match self.area.produce(id) {
			Ok(()) => {
				state = CarState::Enqueued;
				tracing::debug!(car = id, ?state, "Car entered the waiting area");
				self.progress.record_enqueued();
				self.events.emit(Event::car(id, EventKind::Enqueued));
			}
			Err(e) => {
				if e.is_cancelled() {
					tracing::debug!(car = id, "Car left before entering the waiting area");
					self.progress.record_cancelled();
				}
				return Err(e);
			}
		}
		// The car's work is complete
		state = CarState::Done;
		tracing::trace!(car = id, ?state, "Car done");
		Ok(state)
	}
}
