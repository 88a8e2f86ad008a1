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

//! Core memory contracts shared by every allocator kind.
//!
//! This module defines the capability contract (`Allocator`), the zone
//! budget data model (`MemoryBudget`), the size-policy constants, and the
//! error type. Concrete allocators and the arena manager live in the
//! `tarn-memory` crate; everything here is either a trait or plain data so
//! that higher layers can depend on the contract without pulling in the
//! implementation.

pub mod allocator;
pub mod budget;
pub mod error;
pub mod sizing;

pub use allocator::{align_up, is_power_of_two, DEFAULT_ALIGNMENT};
pub use allocator::{Allocator, AllocatorKind, AllocatorStats};
pub use budget::{MemoryBudget, MemoryZone, ZoneAllocation};
pub use error::{MemoryError, MemoryResult};
pub use sizing::sizes;
