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

//! This library provides the synchronization core of a service station
//! simulation. Arriving cars queue in a bounded waiting area and a pool
//! of pumps drains it, with a separate limit on how many cars may be in
//! service at once. Everything is coordinated through a blocking,
//! cancellable counting [`Semaphore`].

#![forbid(unsafe_code)]

mod area;
mod car;
mod dispatch;
mod err;
mod event;
mod options;
mod progress;
mod pump;
mod ring;
mod semaphore;
mod station;
mod stop;

pub use crate::area::{Bay, PendingCar, Snapshot, WaitingArea};
pub use crate::car::{Car, CarState};
pub use crate::dispatch::{Dispatcher, Emitter};
pub use crate::err::Error;
pub use crate::event::{Actor, Discard, Event, EventKind, EventLog, EventSink};
pub use crate::options::*;
pub use crate::progress::{Counts, Progress};
pub use crate::pump::{Pump, PumpId, PumpReport, PumpState};
pub use crate::ring::CarId;
pub use crate::semaphore::Semaphore;
pub use crate::station::{Station, StationReport};
pub use crate::stop::StopSignal;
