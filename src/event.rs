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

//! This module stores the observable station events and their sinks.

use crate::ring::CarId;
use crossbeam_queue::SegQueue;
use std::fmt;

/// The kind of task which emitted an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actor {
	Car,
	Pump,
}

/// An observable transition in the station
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
	/// A car arrived at the station
	Arrived,
	/// A car entered the waiting area
	Enqueued,
	/// A pump took a car from the waiting area
	Occupied,
	/// A pump started serving a car
	ServiceBegin,
	/// A pump finished serving a car
	ServiceEnd,
	/// A pump freed its bay
	BayFree,
	/// A pump stopped part way through serving a car
	ServiceAborted,
	/// A pump shut down
	Offline,
}

/// A single event emitted by a car or pump task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
	/// The kind of task emitting the event
	pub actor: Actor,
	/// The identifier of the car or pump emitting the event
	pub actor_id: u64,
	/// The car this event concerns, if any
	pub car: Option<CarId>,
	/// What happened
	pub kind: EventKind,
}

impl Event {
	pub(crate) fn car(car: CarId, kind: EventKind) -> Self {
		Self {
			actor: Actor::Car,
			actor_id: car,
			car: Some(car),
			kind,
		}
	}

	pub(crate) fn pump(pump: u64, car: Option<CarId>, kind: EventKind) -> Self {
		Self {
			actor: Actor::Pump,
			actor_id: pump,
			car,
			kind,
		}
	}
}

impl fmt::Display for Event {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let id = self.actor_id;
		let car = self.car.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string());
		match self.kind {
			EventKind::Arrived => write!(f, "Car #{id} arrived."),
			EventKind::Enqueued => write!(f, "Car #{id} entered the queue."),
			EventKind::Occupied => write!(f, "Pump {id}: Car {car} Occupied"),
			EventKind::ServiceBegin => write!(f, "Pump {id}: begins service at Bay {id}"),
			EventKind::ServiceEnd => write!(f, "Pump {id}: finishes service for Car {car}"),
			EventKind::BayFree => write!(f, "Pump {id}: ends service at Bay {id}"),
			EventKind::ServiceAborted => write!(f, "Pump {id}: abandons service for Car {car}"),
			EventKind::Offline => write!(f, "Pump {id}: offline"),
		}
	}
}

/// A receiver of station events.
///
/// Sinks are invoked on the station's dispatcher thread, never on a
/// car or pump task, so a slow sink only delays event delivery.
pub trait EventSink: Send + Sync {
	fn emit(&self, event: Event);
}

impl<F> EventSink for F
where
	F: Fn(Event) + Send + Sync,
{
	fn emit(&self, event: Event) {
		self(event)
	}
}

/// An event sink which discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl EventSink for Discard {
	fn emit(&self, _: Event) {}
}

/// A lock-free, unbounded event log
#[derive(Debug, Default)]
pub struct EventLog {
	queue: SegQueue<Event>,
}

impl EventLog {
	/// Create a new empty event log
	pub fn new() -> Self {
		Self::default()
	}

	/// The number of events waiting to be drained
	pub fn len(&self) -> usize {
		self.queue.len()
	}

	/// Check if there are no events waiting to be drained
	pub fn is_empty(&self) -> bool {
		self.queue.is_empty()
	}

	/// Remove and return all logged events in emission order
	pub fn drain(&self) -> Vec<Event> {
		let mut out = Vec::with_capacity(self.queue.len());
		while let Some(event) = self.queue.pop() {
			out.push(event);
		}
		out
	}
}

impl EventSink for EventLog {
	fn emit(&self, event: Event) {
		self.queue.push(event);
	}
}

#[cfg(test)]
mod tests {

	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[test]
	fn event_log_preserves_order() {
		let log = EventLog::new();
		log.emit(Event::car(1, EventKind::Arrived));
		log.emit(Event::car(1, EventKind::Enqueued));
		log.emit(Event::pump(2, Some(1), EventKind::Occupied));
		assert_eq!(log.len(), 3);
		let events = log.drain();
		assert!(log.is_empty());
		let kinds: Vec<_> = events.iter().map(|e| e.kind).collect();
		assert_eq!(kinds, vec![EventKind::Arrived, EventKind::Enqueued, EventKind::Occupied]);
		assert_eq!(events[2].actor, Actor::Pump);
		assert_eq!(events[2].car, Some(1));
	}

	#[test]
	fn closures_are_sinks() {
		let count = AtomicUsize::new(0);
		let sink = |_: Event| {
			count.fetch_add(1, Ordering::Relaxed);
		};
		sink.emit(Event::car(3, EventKind::Arrived));
		sink.emit(Event::car(3, EventKind::Enqueued));
		assert_eq!(count.load(Ordering::Relaxed), 2);
	}

	#[test]
	fn events_render_as_log_lines() {
		assert_eq!(Event::car(4, EventKind::Arrived).to_string(), "Car #4 arrived.");
		assert_eq!(
			Event::pump(2, Some(9), EventKind::Occupied).to_string(),
			"Pump 2: Car 9 Occupied"
		);
		assert_eq!(
			Event::pump(2, Some(9), EventKind::BayFree).to_string(),
			"Pump 2: ends service at Bay 2"
		);
		assert_eq!(Event::pump(1, None, EventKind::Offline).to_string(), "Pump 1: offline");
	}
}
