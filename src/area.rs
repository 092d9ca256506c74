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

//! This module stores the bounded waiting area shared by cars and pumps.

use crate::err::Error;
use crate::ring::{CarId, Ring};
use crate::semaphore::Semaphore;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A best-effort view of the waiting area for display purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
	/// The number of cars currently waiting
	pub occupancy: usize,
	/// The number of free slots available to arriving cars
	pub empty_slots: usize,
	/// The number of waiting cars not yet claimed by a pump
	pub filled_slots: usize,
	/// The number of bays currently serving a car
	pub bays_in_use: usize,
}

/// A bounded circular buffer of waiting cars.
///
/// Access is coordinated by four semaphores: `empty` counts free
/// slots, `filled` counts waiting cars, `mutex` guards the ring
/// indices, and `bays` limits how many cars are in service at once.
pub struct WaitingArea {
	/// The circular car storage, only touched while `mutex` is held
	ring: Mutex<Ring>,
	/// The number of occupied slots, mirrored for snapshots
	occupancy: AtomicUsize,
	/// The number of slots in the ring
	capacity: usize,
	/// The number of bays which may serve cars concurrently
	bay_limit: usize,
	/// Free slots in the ring
	empty: Semaphore,
	/// Occupied slots in the ring
	filled: Semaphore,
	/// Exclusive access to the ring indices
	mutex: Semaphore,
	/// Concurrently usable service bays
	bays: Semaphore,
}

/// A car announced by the `filled` semaphore but not yet removed.
///
/// Dropping this guard without claiming a bay gives the `filled`
/// permit back, leaving the car in the waiting area.
#[must_use = "dropping a pending car returns it to the waiting area"]
pub struct PendingCar<'a> {
	area: &'a WaitingArea,
	armed: bool,
}

/// A service bay held by a pump while it serves a car.
///
/// The bay is released exactly once, either through [`Bay::release`]
/// or when the guard is dropped.
#[must_use = "dropping a bay immediately frees it"]
pub struct Bay<'a> {
	area: &'a WaitingArea,
	car: CarId,
	armed: bool,
}

impl WaitingArea {
	/// Create a new waiting area with `capacity` slots and `bays` service bays
	pub fn new(capacity: usize, bays: usize) -> Result<Self, Error> {
		// Check the waiting area configuration
		if capacity < 1 {
			return Err(Error::InvalidConfig("waiting area capacity must be at least 1"));
		}
		if bays < 1 {
			return Err(Error::InvalidConfig("pump concurrency must be at least 1"));
		}
		// Create the waiting area
		Ok(Self {
			ring: Mutex::new(Ring::new(capacity)),
			occupancy: AtomicUsize::new(0),
			capacity,
			bay_limit: bays,
			empty: Semaphore::new(capacity),
			filled: Semaphore::new(0),
			mutex: Semaphore::new(1),
			bays: Semaphore::new(bays),
		})
	}

	/// The number of slots in the waiting area
	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// The number of bays which may serve cars concurrently
	pub fn bay_limit(&self) -> usize {
		self.bay_limit
	}

	/// Insert a car, blocking while the waiting area is full
	pub fn produce(&self, car: CarId) -> Result<(), Error> {
		// Wait for a free slot
		self.empty.acquire()?;
		// Store the car in the ring
		if let Err(e) = self.exclusive(|ring| ring.push(car)) {
			if e.is_cancelled() {
				// Give the unused slot back
				self.empty.release();
			}
			return Err(e);
		}
		// Announce the car to waiting pumps
		self.filled.release();
		// All ok
		Ok(())
	}

	/// Wait for a car to become available, blocking while the area is empty
	pub fn await_car(&self) -> Result<PendingCar<'_>, Error> {
		// Wait for an occupied slot
		self.filled.acquire()?;
		// Return the pending car
		Ok(PendingCar {
			area: self,
			armed: true,
		})
	}

	/// Wait for a bay and remove the next car from the waiting area
	pub fn consume(&self) -> Result<Bay<'_>, Error> {
		self.await_car()?.claim_bay()
	}

	/// Close every semaphore, cancelling all blocked and future waits
	pub fn close(&self) {
		self.empty.close();
		self.filled.close();
		self.mutex.close();
		self.bays.close();
	}

	/// Check if the waiting area has been closed
	pub fn is_closed(&self) -> bool {
		self.mutex.is_closed()
	}

	/// Take a best-effort snapshot of the waiting area
	pub fn snapshot(&self) -> Snapshot {
		Snapshot {
			occupancy: self.occupancy.load(Ordering::Acquire),
			empty_slots: self.empty.value(),
			filled_slots: self.filled.value(),
			bays_in_use: self.bay_limit.saturating_sub(self.bays.value()),
		}
	}

	/// Run `f` against the ring while holding the `mutex` semaphore
	fn exclusive<T>(&self, f: impl FnOnce(&mut Ring) -> Result<T, Error>) -> Result<T, Error> {
		// Enter the critical section
		self.mutex.acquire()?;
		// The ring lock can never be contended while the mutex is held
		let res = match self.ring.try_lock() {
			Some(mut ring) => {
				let res = f(&mut *ring);
				self.occupancy.store(ring.occupancy(), Ordering::Release);
				res
			}
			None => Err(Error::Internal("ring accessed outside the critical section".into())),
		};
		// Leave the critical section
		self.mutex.release();
		// Surface invariant violations loudly
		if let Err(Error::Internal(e)) = &res {
			tracing::error!("Waiting area invariant violated: {e}");
		}
		res
	}
}

impl<'a> PendingCar<'a> {
	/// Wait for a free bay, then remove the next car from the waiting area
	pub fn claim_bay(mut self) -> Result<Bay<'a>, Error> {
		let area = self.area;
		// Wait for a bay before taking the car
		area.bays.acquire()?;
		// Remove the car from the ring
		let car = match area.exclusive(|ring| ring.pop()) {
			Ok(car) => car,
			Err(e) => {
				if e.is_cancelled() {
					area.bays.release();
				}
				return Err(e);
			}
		};
		// The filled permit has now been consumed
		self.armed = false;
		// Free the slot for waiting cars
		area.empty.release();
		// Return the claimed bay
		Ok(Bay {
			area,
			car,
			armed: true,
		})
	}
}

impl Drop for PendingCar<'_> {
	fn drop(&mut self) {
		if self.armed {
			self.area.filled.release();
		}
	}
}

impl Bay<'_> {
	/// The car being served in this bay
	pub fn car(&self) -> CarId {
		self.car
	}

	/// Free the bay once service has completed
	pub fn release(mut self) {
		self.free();
	}

	fn free(&mut self) {
		if self.armed {
			self.armed = false;
			self.area.bays.release();
		}
	}
}

impl Drop for Bay<'_> {
	fn drop(&mut self) {
		self.free();
	}
}

#[cfg(test)]
mod tests {

	use super::*;
	use std::sync::atomic::AtomicUsize;
	use std::sync::{mpsc, Arc};
	use std::thread;
	use std::time::Duration;

	fn assert_quiescent(area: &WaitingArea) {
		let snap = area.snapshot();
		assert_eq!(snap.empty_slots + snap.occupancy, area.capacity());
		assert_eq!(snap.filled_slots, snap.occupancy);
	}

	#[test]
	fn invalid_capacity_is_rejected() {
		let res = WaitingArea::new(0, 1);
		assert!(matches!(res, Err(Error::InvalidConfig(_))));
		let res = WaitingArea::new(1, 0);
		assert!(matches!(res, Err(Error::InvalidConfig(_))));
	}

	#[test]
	fn cars_are_consumed_in_fifo_order() {
		let area = WaitingArea::new(3, 1).unwrap();
		for car in 1..=3 {
			area.produce(car).unwrap();
			assert_quiescent(&area);
		}
		assert_eq!(area.snapshot().occupancy, 3);
		for car in 1..=3 {
			let bay = area.consume().unwrap();
			assert_eq!(bay.car(), car);
			bay.release();
			assert_quiescent(&area);
		}
		let snap = area.snapshot();
		assert_eq!(snap.occupancy, 0);
		assert_eq!(snap.bays_in_use, 0);
	}

	#[test]
	fn bay_is_held_until_released() {
		let area = WaitingArea::new(2, 1).unwrap();
		area.produce(1).unwrap();
		let bay = area.consume().unwrap();
		assert_eq!(area.snapshot().bays_in_use, 1);
		bay.release();
		assert_eq!(area.snapshot().bays_in_use, 0);
		// ----------
		area.produce(2).unwrap();
		{
			let _bay = area.consume().unwrap();
			assert_eq!(area.snapshot().bays_in_use, 1);
		}
		assert_eq!(area.snapshot().bays_in_use, 0);
	}

	#[test]
	fn dropped_pending_car_stays_waiting() {
		let area = WaitingArea::new(2, 1).unwrap();
		area.produce(7).unwrap();
		let pending = area.await_car().unwrap();
		assert_eq!(area.snapshot().filled_slots, 0);
		drop(pending);
		assert_quiescent(&area);
		assert_eq!(area.consume().unwrap().car(), 7);
	}

	#[test]
	fn producer_blocks_while_full() {
		let area = Arc::new(WaitingArea::new(2, 1).unwrap());
		area.produce(1).unwrap();
		area.produce(2).unwrap();
		// ----------
		let (tx, rx) = mpsc::channel();
		let handle = {
			let area = area.clone();
			thread::spawn(move || {
				area.produce(3).unwrap();
				tx.send(()).unwrap();
			})
		};
		// Car 3 must wait for a free slot
		assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
		// ----------
		let bay = area.consume().unwrap();
		assert_eq!(bay.car(), 1);
		rx.recv_timeout(Duration::from_secs(5)).unwrap();
		handle.join().unwrap();
		bay.release();
		// ----------
		assert_eq!(area.consume().unwrap().car(), 2);
		assert_eq!(area.consume().unwrap().car(), 3);
		assert_quiescent(&area);
	}

	#[test]
	fn consumer_waits_for_free_bay() {
		let area = Arc::new(WaitingArea::new(3, 1).unwrap());
		area.produce(1).unwrap();
		area.produce(2).unwrap();
		let bay = area.consume().unwrap();
		// ----------
		let (tx, rx) = mpsc::channel();
		let handle = {
			let area = area.clone();
			thread::spawn(move || {
				let bay = area.consume().unwrap();
				tx.send(bay.car()).unwrap();
			})
		};
		// Car 2 stays in the waiting area until the bay is free
		assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
		assert_eq!(area.snapshot().occupancy, 1);
		bay.release();
		assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 2);
		handle.join().unwrap();
		assert_eq!(area.snapshot().occupancy, 0);
	}

	#[test]
	fn close_unblocks_consumer_without_decrement() {
		let area = Arc::new(WaitingArea::new(2, 1).unwrap());
		let handle = {
			let area = area.clone();
			thread::spawn(move || area.consume().map(|bay| bay.car()))
		};
		thread::sleep(Duration::from_millis(50));
		area.close();
		assert_eq!(handle.join().unwrap(), Err(Error::Cancelled));
		assert!(area.is_closed());
		assert_eq!(area.snapshot().filled_slots, 0);
		assert_quiescent(&area);
	}

	#[test]
	fn close_while_waiting_for_bay_returns_car() {
		let area = Arc::new(WaitingArea::new(2, 1).unwrap());
		area.produce(1).unwrap();
		area.produce(2).unwrap();
		let bay = area.consume().unwrap();
		// ----------
		let handle = {
			let area = area.clone();
			thread::spawn(move || area.consume().map(|bay| bay.car()))
		};
		while area.snapshot().filled_slots != 0 {
			thread::yield_now();
		}
		area.close();
		assert_eq!(handle.join().unwrap(), Err(Error::Cancelled));
		bay.release();
		// Car 2 is still accounted for
		let snap = area.snapshot();
		assert_eq!(snap.occupancy, 1);
		assert_eq!(snap.filled_slots, 1);
		assert_eq!(snap.bays_in_use, 0);
		assert_quiescent(&area);
	}

	#[test]
	fn concurrent_producers_and_consumers_drain() {
		const CARS: u64 = 400;
		let area = Arc::new(WaitingArea::new(4, 2).unwrap());
		let seen = Arc::new(AtomicUsize::new(0));
		let mut handles = Vec::new();
		for p in 0..4u64 {
			let area = area.clone();
			handles.push(thread::spawn(move || {
				for i in 0..CARS / 4 {
					area.produce(p * 1000 + i).unwrap();
				}
			}));
		}
		for _ in 0..4 {
			let area = area.clone();
			let seen = seen.clone();
			handles.push(thread::spawn(move || {
				for _ in 0..CARS / 4 {
					area.consume().unwrap().release();
					seen.fetch_add(1, Ordering::SeqCst);
				}
			}));
		}
		for handle in handles {
			handle.join().unwrap();
		}
		assert_eq!(seen.load(Ordering::SeqCst), CARS as usize);
		let snap = area.snapshot();
		assert_eq!(snap.occupancy, 0);
		assert_eq!(snap.empty_slots, 4);
		assert_eq!(snap.bays_in_use, 0);
	}
}
