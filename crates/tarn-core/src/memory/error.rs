// Copyright 2025 eraflo
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

//! Error types for the memory subsystem.
//!
//! Only cold paths (initialization, standalone allocator construction)
//! return typed errors. Allocation hot paths signal failure through
//! `Option`, never through errors or panics, so that failure handling
//! stays off the fast path.

use std::fmt::{self, Display};

use super::budget::MemoryZone;

/// A specialized `Result` type for memory subsystem operations.
pub type MemoryResult<T> = Result<T, MemoryError>;

/// An error that can occur while setting up or tearing down the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// The OS refused the backing reservation.
    ReservationFailed {
        /// The number of bytes that were requested.
        size: usize,
    },
    /// The clamped zone sizes do not fit inside the reserved arena.
    ZoneLayoutOverflow {
        /// Total bytes the zone layout needs.
        required: usize,
        /// Bytes actually reserved.
        available: usize,
    },
    /// The budget itself is unusable (e.g. a zero total size).
    InvalidBudget(String),
    /// A zone has no capacity left for the requested carve-out.
    ZoneExhausted {
        /// The zone that ran out of space.
        zone: MemoryZone,
        /// Bytes requested from the zone.
        requested: usize,
        /// Bytes still available in the zone.
        available: usize,
    },
}

impl Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::ReservationFailed { size } => {
                write!(f, "OS memory reservation of {size} bytes failed")
            }
            MemoryError::ZoneLayoutOverflow {
                required,
                available,
            } => {
                write!(
                    f,
                    "zone layout needs {required} bytes but only {available} were reserved"
                )
            }
            MemoryError::InvalidBudget(msg) => write!(f, "invalid memory budget: {msg}"),
            MemoryError::ZoneExhausted {
                zone,
                requested,
                available,
            } => {
                write!(
                    f,
                    "zone {zone} exhausted: requested {requested} bytes, {available} available"
                )
            }
        }
    }
}

impl std::error::Error for MemoryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_zone() {
        let err = MemoryError::ZoneExhausted {
            zone: MemoryZone::Rendering,
            requested: 4096,
            available: 128,
        };
        let msg = err.to_string();
        assert!(msg.contains("Rendering"));
        assert!(msg.contains("4096"));
    }
}
