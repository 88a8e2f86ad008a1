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

//! # Tarn Memory
//!
//! Concrete implementations of the `tarn-core` memory contracts: the
//! global arena manager that carves one OS-backed reservation into
//! fixed-purpose zones, the lock-free stack (bump) allocator built on top
//! of those zones, and the arena resource monitor.

#![warn(missing_docs)]

pub mod manager;
pub mod monitor;
pub mod platform;
pub mod stack;

pub use manager::{AllocatorId, GlobalStats, MemoryManager};
pub use monitor::ArenaMonitor;
pub use stack::{Marker, StackAllocator, StackAllocatorScope};
