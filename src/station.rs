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

//! This module stores the station controller which runs cars and pumps.

use crate::area::{Snapshot, WaitingArea};
use crate::car::{Car, CarState};
use crate::dispatch::Dispatcher;
use crate::err::Error;
use crate::event::{Discard, EventSink};
use crate::options::StationOptions;
use crate::progress::{Counts, Progress};
use crate::pump::{Pump, PumpId, PumpReport};
use crate::ring::CarId;
use crate::stop::StopSignal;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// The outcome of a completed station run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationReport {
	/// The final report of every pump, ordered by pump id
	pub pumps: Vec<PumpReport>,
	/// The final car counts
	pub counts: Counts,
}

impl StationReport {
	/// The total number of cars served across all pumps
	pub fn served(&self) -> u64 {
		self.pumps.iter().map(|p| p.served).sum()
	}
}

/// A service station, owning the waiting area and its tasks
pub struct Station {
	/// The options this station was created with
	options: StationOptions,
	/// The waiting area shared by cars and pumps
	area: Arc<WaitingArea>,
	/// The dispatcher delivering task events to the sink
	events: Dispatcher,
	/// The authoritative progress tracker
	progress: Arc<Progress>,
	/// The cooperative stop signal
	stop: Arc<StopSignal>,
}

impl Station {
	/// Create a new station which discards its events
	pub fn new(options: StationOptions) -> Result<Self, Error> {
		Self::with_events(options, Arc::new(Discard))
	}

	/// Create a new station which emits events to `events`.
	///
	/// Events are delivered on a background thread, so the sink never
	/// runs on a car or pump task.
	pub fn with_events(options: StationOptions, events: Arc<dyn EventSink>) -> Result<Self, Error> {
		// Check the station configuration
		options.validate()?;
		// Create the shared waiting area
		let area = Arc::new(WaitingArea::new(options.capacity, options.bays())?);
		// Link the area to the stop signal
		let stop = Arc::new(StopSignal::new());
		stop.link(&area);
		// Create the station
		Ok(Self {
			options,
			area,
			events: Dispatcher::new(events),
			progress: Arc::new(Progress::new()),
			stop,
		})
	}

	/// The options this station was created with
	pub fn options(&self) -> &StationOptions {
		&self.options
	}

	/// The waiting area shared by this station's tasks
	pub fn area(&self) -> &Arc<WaitingArea> {
		&self.area
	}

	/// Spawn a car task which arrives and joins the waiting area
	pub fn spawn_car(&self, id: CarId) -> JoinHandle<Result<CarState, Error>> {
		// Track the car before it starts
		self.progress.record_spawned();
		// Create the car task
		let car = Car::new(
			id,
			self.area.clone(),
			self.events.emitter(),
			self.progress.clone(),
			&self.stop,
		);
		// Spawn the car thread
		thread::spawn(move || car.run())
	}

	/// Spawn a pump task which serves cars until the station stops
	pub fn spawn_pump(&self, id: PumpId) -> JoinHandle<Result<PumpReport, Error>> {
		// Create the pump task
		let pump = Pump::new(
			id,
			self.area.clone(),
			self.events.emitter(),
			self.progress.clone(),
			self.stop.clone(),
			self.options.service_time,
		);
		// Clone the tracker for failure reporting
		let progress = self.progress.clone();
		// Spawn the pump thread
		thread::spawn(move || {
			let res = pump.run();
			// A failed pump can no longer drain the station
			if let Err(e) = &res {
				tracing::error!("Pump {id} failed: {e}");
				progress.halt();
			}
			res
		})
	}

	/// Ask every car and pump to stop as soon as possible
	pub fn request_stop(&self) {
		// Wake sleeping tasks and cancel all blocked semaphore waits
		self.stop.trigger();
		// Release anyone waiting for completion
		self.progress.halt();
	}

	/// Check if a stop has been requested
	pub fn is_stopped(&self) -> bool {
		self.stop.is_triggered()
	}

	/// Take a best-effort snapshot of the waiting area
	pub fn snapshot(&self) -> Snapshot {
		self.area.snapshot()
	}

	/// The current car counts
	pub fn counts(&self) -> Counts {
		self.progress.counts()
	}

	/// Block until every spawned car has been served or cancelled.
	///
	/// Returns `false` if the timeout expired or the station was
	/// stopped before all cars finished.
	pub fn wait_until_drained(&self, timeout: Option<Duration>) -> bool {
		self.progress.wait_drained(timeout)
	}

	/// Block until every event emitted so far has reached the sink
	pub fn flush_events(&self) {
		self.events.flush();
	}

	/// Run a complete simulation and stop once every car is served
	pub fn run(&self) -> Result<StationReport, Error> {
		let mut failure = None;
		// Start all of the pumps
		let pumps: Vec<_> = (1..=self.options.pumps as PumpId).map(|id| self.spawn_pump(id)).collect();
		tracing::debug!("Started {} pump thread(s)", pumps.len());
		// Spawn the arriving cars
		let mut cars = Vec::new();
		for id in 1..=self.options.cars {
			if self.stop.is_triggered() {
				break;
			}
			cars.push(self.spawn_car(id));
			// Leave a gap before the next arrival
			if id < self.options.cars && self.stop.sleep(self.options.arrival_interval) {
				break;
			}
		}
		// Wait for every car to join the waiting area
		for handle in cars {
			match join(handle) {
				Ok(_) | Err(Error::Cancelled) => {}
				Err(e) => {
					failure.get_or_insert(e);
				}
			}
		}
		// Wait for the pumps to serve every queued car
		if failure.is_none() && !self.wait_until_drained(None) {
			tracing::debug!("Station stopped before all cars were served");
		}
		// Take every pump offline
		self.request_stop();
		let mut reports = Vec::with_capacity(pumps.len());
		for handle in pumps {
			match join(handle) {
				Ok(report) => reports.push(report),
				Err(e) => {
					failure.get_or_insert(e);
				}
			}
		}
		// Deliver every outstanding event
		self.flush_events();
		// Check for any task failures
		if let Some(e) = failure {
			return Err(e);
		}
		// Return the station report
		Ok(StationReport {
			pumps: reports,
			counts: self.progress.counts(),
		})
	}
}

impl Drop for Station {
	fn drop(&mut self) {
		self.request_stop();
	}
}

/// Join a task thread, treating a panic as an invariant violation
fn join<T>(handle: JoinHandle<Result<T, Error>>) -> Result<T, Error> {
	match handle.join() {
		Ok(res) => res,
		Err(_) => {
			tracing::error!("Station task panicked");
			Err(Error::Internal("station task panicked".into()))
		}
	}
}

#[cfg(test)]
mod tests {

	use super::*;
	use crate::event::{Event, EventKind, EventLog};
	use std::time::Instant;

	fn quick() -> StationOptions {
		StationOptions::new()
			.with_service_time(Duration::from_millis(5))
			.with_arrival_interval(Duration::from_millis(1))
	}

	#[test]
	fn invalid_options_never_start() {
		let res = Station::new(quick().with_capacity(0));
		assert!(matches!(res, Err(Error::InvalidConfig(_))));
		let res = Station::new(quick().with_bays(0));
		assert!(matches!(res, Err(Error::InvalidConfig(_))));
	}

	#[test]
	fn run_serves_every_car() {
		let station = Station::new(quick().with_capacity(2).with_pumps(3).with_cars(12)).unwrap();
		let report = station.run().unwrap();
		assert_eq!(report.served(), 12);
		assert_eq!(report.pumps.len(), 3);
		assert_eq!(report.counts.spawned, 12);
		assert_eq!(report.counts.served, 12);
		let snap = station.snapshot();
		assert_eq!(snap.occupancy, 0);
		assert_eq!(snap.bays_in_use, 0);
		assert!(station.is_stopped());
	}

	#[test]
	fn pump_count_may_exceed_bays() {
		let log = Arc::new(EventLog::new());
		let opts = quick().with_pumps(4).with_bays(1).with_cars(6);
		let station = Station::with_events(opts, log.clone()).unwrap();
		assert_eq!(station.area().bay_limit(), 1);
		let report = station.run().unwrap();
		assert_eq!(report.served(), 6);
		assert_eq!(report.pumps.len(), 4);
		// Every pump reports going offline
		let offline = log.drain().into_iter().filter(|e| e.kind == EventKind::Offline).count();
		assert_eq!(offline, 4);
	}

	#[test]
	fn stop_interrupts_a_long_run() {
		let opts = quick()
			.with_capacity(1)
			.with_pumps(1)
			.with_cars(50)
			.with_service_time(Duration::from_secs(30));
		let station = Arc::new(Station::new(opts).unwrap());
		let handle = {
			let station = station.clone();
			thread::spawn(move || station.run())
		};
		while station.snapshot().bays_in_use == 0 {
			thread::sleep(Duration::from_millis(1));
		}
		station.request_stop();
		let report = handle.join().unwrap().unwrap();
		assert_eq!(report.served(), 0);
		assert_eq!(report.counts.aborted, 1);
		let snap = station.snapshot();
		assert_eq!(snap.bays_in_use, 0);
		assert_eq!(snap.empty_slots + snap.occupancy, 1);
		assert_eq!(snap.filled_slots, snap.occupancy);
	}

	#[test]
	fn slow_sink_does_not_hold_bays() {
		let sink = |event: Event| {
			if event.kind == EventKind::Occupied {
				thread::sleep(Duration::from_millis(500));
			}
		};
		let opts = quick().with_pumps(1).with_bays(1).with_service_time(Duration::from_millis(1));
		let station = Station::with_events(opts, Arc::new(sink)).unwrap();
		let pump = station.spawn_pump(1);
		let start = Instant::now();
		station.spawn_car(1).join().unwrap().unwrap();
		// The car is served while the sink is still busy with it
		assert!(station.wait_until_drained(Some(Duration::from_millis(400))));
		assert!(start.elapsed() < Duration::from_millis(400));
		assert_eq!(station.snapshot().bays_in_use, 0);
		station.request_stop();
		assert_eq!(pump.join().unwrap().unwrap().served, 1);
	}

	#[test]
	fn run_delivers_every_event() {
		let log = Arc::new(EventLog::new());
		let opts = quick().with_pumps(2).with_cars(4);
		let station = Station::with_events(opts, log.clone()).unwrap();
		station.run().unwrap();
		let events = log.drain();
		let count = |kind| events.iter().filter(|e| e.kind == kind).count();
		assert_eq!(count(EventKind::Arrived), 4);
		assert_eq!(count(EventKind::Enqueued), 4);
		assert_eq!(count(EventKind::ServiceEnd), 4);
		assert_eq!(count(EventKind::Offline), 2);
	}
}
