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

//! This module stores the station error types.

use thiserror::Error;

/// The errors which can be emitted from the station core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
	/// The station was configured with an unusable value.
	#[error("Invalid configuration: {0}")]
	InvalidConfig(&'static str),

	/// A blocking operation was interrupted by a stop request.
	#[error("Operation was cancelled by a stop request")]
	Cancelled,

	/// A synchronization invariant was violated.
	#[error("Internal invariant violated: {0}")]
	Internal(String),
}

impl Error {
	/// Check if this error is a cooperative cancellation
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Error::Cancelled)
	}
}
