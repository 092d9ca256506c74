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

//! This module stores the circular slot storage of the waiting area.

use crate::err::Error;

/// An opaque identifier assigned to each arriving car
pub type CarId = u64;

/// A fixed-size circular store of car identifiers.
///
/// The ring performs no synchronization of its own. Callers must hold
/// exclusive access for the duration of each `push` or `pop`.
pub(crate) struct Ring {
	/// The slots of the ring, `None` when free
	slots: Box<[Option<CarId>]>,
	/// The next slot to write to
	write: usize,
	/// The next slot to read from
	read: usize,
	/// The number of occupied slots
	occupancy: usize,
}

impl Ring {
	/// Create a new ring with `capacity` free slots
	pub(crate) fn new(capacity: usize) -> Self {
		Self {
			slots: vec![None; capacity].into_boxed_slice(),
			write: 0,
			read: 0,
			occupancy: 0,
		}
	}

	/// The number of occupied slots in this ring
	pub(crate) fn occupancy(&self) -> usize {
		self.occupancy
	}

	/// Store a car in the next write slot and advance the write index
	pub(crate) fn push(&mut self, car: CarId) -> Result<(), Error> {
		// Refuse to overwrite an occupied slot
		let index = self.write;
		if let Some(existing) = self.slots[index] {
			return Err(Error::Internal(format!(
				"slot {index} already holds car {existing} while storing car {car}"
			)));
		}
		self.slots[index] = Some(car);
		self.write = (index + 1) % self.slots.len();
		self.occupancy += 1;
		Ok(())
	}

	/// Take the car from the next read slot and advance the read index
	pub(crate) fn pop(&mut self) -> Result<CarId, Error> {
		match self.slots[self.read].take() {
			Some(car) => {
				self.read = (self.read + 1) % self.slots.len();
				self.occupancy -= 1;
				Ok(car)
			}
			None => Err(Error::Internal(format!("slot {} is empty on removal", self.read))),
		}
	}
}
