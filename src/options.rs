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

//! This module stores the station configuration options.

use crate::err::Error;
use std::time::Duration;

/// Default number of slots in the waiting area.
pub const DEFAULT_CAPACITY: usize = 5;

/// Default number of pump tasks.
pub const DEFAULT_PUMPS: usize = 3;

/// Default number of cars arriving during a run.
pub const DEFAULT_CARS: u64 = 10;

/// Default time a car occupies a bay.
pub const DEFAULT_SERVICE_TIME: Duration = Duration::from_millis(1000);

/// Default delay between consecutive car arrivals.
pub const DEFAULT_ARRIVAL_INTERVAL: Duration = Duration::from_millis(250);

/// Configuration options for [`Station`](crate::Station).
#[derive(Debug, Clone)]
pub struct StationOptions {
	/// Number of slots in the waiting area.
	pub capacity: usize,
	/// Number of pump tasks draining the waiting area.
	pub pumps: usize,
	/// Number of bays which may serve cars at once, defaulting to `pumps`.
	pub bays: Option<usize>,
	/// Number of cars arriving during a run.
	pub cars: u64,
	/// Time a car occupies a bay.
	pub service_time: Duration,
	/// Delay between consecutive car arrivals.
	pub arrival_interval: Duration,
}

impl Default for StationOptions {
	fn default() -> Self {
		Self {
			capacity: DEFAULT_CAPACITY,
			pumps: DEFAULT_PUMPS,
			bays: None,
			cars: DEFAULT_CARS,
			service_time: DEFAULT_SERVICE_TIME,
			arrival_interval: DEFAULT_ARRIVAL_INTERVAL,
		}
	}
}

impl StationOptions {
	/// Create new station options with default values
	pub fn new() -> Self {
		Self::default()
	}

	/// Set the number of slots in the waiting area
	pub fn with_capacity(mut self, capacity: usize) -> Self {
		self.capacity = capacity;
		self
	}

	/// Set the number of pump tasks
	pub fn with_pumps(mut self, pumps: usize) -> Self {
		self.pumps = pumps;
		self
	}

	/// Set the number of bays which may serve cars at once
	pub fn with_bays(mut self, bays: usize) -> Self {
		self.bays = Some(bays);
		self
	}

	/// Set the number of cars arriving during a run
	pub fn with_cars(mut self, cars: u64) -> Self {
		self.cars = cars;
		self
	}

	/// Set the time a car occupies a bay
	pub fn with_service_time(mut self, service_time: Duration) -> Self {
		self.service_time = service_time;
		self
	}

	/// Set the delay between consecutive car arrivals
	pub fn with_arrival_interval(mut self, arrival_interval: Duration) -> Self {
		self.arrival_interval = arrival_interval;
		self
	}

	/// The effective number of bays
	pub fn bays(&self) -> usize {
		self.bays.unwrap_or(self.pumps)
	}

	/// Check that these options describe a runnable station
	pub fn validate(&self) -> Result<(), Error> {
		if self.capacity < 1 {
			return Err(Error::InvalidConfig("waiting area capacity must be at least 1"));
		}
		if self.pumps < 1 {
			return Err(Error::InvalidConfig("pump count must be at least 1"));
		}
		if self.bays() < 1 {
			return Err(Error::InvalidConfig("pump concurrency must be at least 1"));
		}
		Ok(())
	}
}
