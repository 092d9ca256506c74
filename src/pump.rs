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

//! This module stores the pump consumer task.

use crate::area::WaitingArea;
use crate::dispatch::Emitter;
use crate::err::Error;
use crate::event::{Event, EventKind};
use crate::progress::Progress;
use crate::ring::CarId;
use crate::stop::StopSignal;
use std::sync::Arc;
use std::time::Duration;

/// An identifier assigned to each pump
pub type PumpId = u64;

/// The state of a single pump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
	Idle,
	WaitingForCar,
	WaitingForBay,
	Serving(CarId),
	Offline,
}

/// The final tally of a pump once it goes offline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PumpReport {
	/// The identifier of the pump
	pub id: PumpId,
	/// The number of cars fully served
	pub served: u64,
	/// The state the pump was in when it was taken offline
	pub last: PumpState,
}

/// A long-lived pump which repeatedly serves cars from the waiting area
pub struct Pump {
	/// The identifier of this pump
	pub(crate) id: PumpId,
	/// The waiting area this pump drains
	pub(crate) area: Arc<WaitingArea>,
	/// The queue receiving this pump's events
	pub(crate) events: Emitter,
	/// The station progress tracker
	pub(crate) progress: Arc<Progress>,
	/// The signal which takes this pump offline
	pub(crate) stop: Arc<StopSignal>,
	/// How long each car occupies a bay
	pub(crate) service_time: Duration,
}

impl Pump {
	/// Create a new pump serving cars from `area`.
	///
	/// Raising `stop` takes the pump offline wherever it is blocked.
	pub fn new(
		id: PumpId,
		area: Arc<WaitingArea>,
		events: Emitter,
		progress: Arc<Progress>,
		stop: Arc<StopSignal>,
		service_time: Duration,
	) -> Self {
		// Ensure a stop reaches the pump while it is blocked
		stop.link(&area);
		Self {
			id,
			area,
			events,
			progress,
			stop,
			service_time,
		}
	}

	/// The identifier of this pump
	pub fn id(&self) -> PumpId {
		self.id
	}

	/// Serve cars until the station stops.
	///
	/// Cancellation is the normal way for a pump to finish, so it is
	/// reported as a successful [`PumpReport`]. Only invariant
	/// violations are returned as errors.
	pub fn run(self) -> Result<PumpReport, Error> {
		let id = self.id;
		let mut served = 0;
		let mut state = PumpState::Idle;
		loop {
			// Check if the station is shutting down
			if self.stop.is_triggered() {
				break;
			}
			// Wait for a car to arrive
			state = PumpState::WaitingForCar;
			tracing::trace!(pump = id, ?state);
			let pending = match self.area.await_car() {
				Ok(pending) => pending,
				Err(Error::Cancelled) => break,
				Err(e) => return Err(e),
			};
			// Wait for a bay and take the car
			state = PumpState::WaitingForBay;
			tracing::trace!(pump = id, ?state);
			let bay = match pending.claim_bay() {
				Ok(bay) => bay,
				Err(Error::Cancelled) => break,
				Err(e) => return Err(e),
			};
			let car = bay.car();
			state = PumpState::Serving(car);
			tracing::debug!(pump = id, car, "Pump occupied");
			self.events.emit(Event::pump(id, Some(car), EventKind::Occupied));
			self.events.emit(Event::pump(id, Some(car), EventKind::ServiceBegin));
			// Serve the car, unless interrupted
			if self.stop.sleep(self.service_time) {
				bay.release();
				tracing::warn!(pump = id, car, "Pump stopped during service");
				self.progress.record_aborted();
				self.events.emit(Event::pump(id, Some(car), EventKind::ServiceAborted));
				break;
			}
			// Free the bay for the next car
			bay.release();
			tracing::debug!(pump = id, car, "Pump finished service");
			self.events.emit(Event::pump(id, Some(car), EventKind::ServiceEnd));
			self.events.emit(Event::pump(id, Some(car), EventKind::BayFree));
			served += 1;
			self.progress.record_served();
			state = PumpState::Idle;
			tracing::trace!(pump = id, ?state);
		}
		// Take the pump offline
		tracing::debug!(pump = id, served, last = ?state, "Pump offline");
		self.events.emit(Event::pump(id, None, EventKind::Offline));
		Ok(PumpReport {
			id,
			served,
			last: state,
		})
	}
}
