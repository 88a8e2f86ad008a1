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

//! The capability contract every allocator kind implements.
//!
//! The contract is deliberately wider than any single allocator: kinds
//! that cannot support an operation (a bump allocator cannot free
//! individual blocks) implement it as a documented no-op and report the
//! fact through the capability flags, which callers are expected to
//! branch on.

use std::fmt::Debug;
use std::ptr::NonNull;

/// The closed set of allocator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocatorKind {
    /// LIFO bump allocator with markers and rewind.
    Stack,
    /// Fixed-size-object pool.
    Pool,
    /// General-purpose heap.
    Heap,
    /// Per-thread scratch allocator.
    ThreadLocal,
    /// Frame-scoped linear allocator.
    Linear,
}

impl std::fmt::Display for AllocatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AllocatorKind::Stack => "Stack",
            AllocatorKind::Pool => "Pool",
            AllocatorKind::Heap => "Heap",
            AllocatorKind::ThreadLocal => "ThreadLocal",
            AllocatorKind::Linear => "Linear",
        };
        f.write_str(name)
    }
}

/// A snapshot of one allocator's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AllocatorStats {
    /// Total capacity managed by the allocator, in bytes.
    pub total_allocated: usize,
    /// Bytes currently in use.
    pub total_used: usize,
    /// High-water mark of `total_used`.
    pub peak_usage: usize,
    /// Number of allocation calls served.
    pub allocation_count: usize,
    /// Number of deallocation calls served.
    pub deallocation_count: usize,
    /// Allocations not yet freed (`allocation_count - deallocation_count`).
    pub active_allocations: usize,
    /// Mean size of a served allocation, in bytes.
    pub average_allocation_size: f64,
    /// Internal fragmentation estimate in `[0.0, 1.0]`.
    pub fragmentation_ratio: f64,
}

/// Default alignment applied when callers have no stricter requirement.
pub const DEFAULT_ALIGNMENT: usize = 16;

/// The allocator capability contract.
///
/// Implementations must be shareable across threads; allocators that are
/// not internally synchronized report `is_thread_safe() == false` and
/// leave external synchronization to the caller.
pub trait Allocator: Send + Sync + Debug {
    /// Allocates `size` bytes aligned to `alignment` (a power of two).
    ///
    /// Returns `None` on capacity exhaustion or misuse (zero size,
    /// non-power-of-two alignment); both are logged, never panics.
    fn allocate(&self, size: usize, alignment: usize) -> Option<NonNull<u8>>;

    /// Returns a previously allocated block to the allocator.
    ///
    /// Kinds without individual reclamation implement this as a no-op and
    /// report it via [`Allocator::supports_deallocate`].
    fn deallocate(&self, ptr: NonNull<u8>);

    /// Re-allocates `ptr` to `new_size` bytes.
    ///
    /// The default implementation allocates fresh space and releases the
    /// old block. It cannot copy the old contents because the original
    /// size is unknown at this layer; kinds that track sizes override
    /// this.
    fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        new_size: usize,
        alignment: usize,
    ) -> Option<NonNull<u8>> {
        let Some(old) = ptr else {
            return self.allocate(new_size, alignment);
        };
        if new_size == 0 {
            self.deallocate(old);
            return None;
        }
        let fresh = self.allocate(new_size, alignment);
        if fresh.is_some() {
            self.deallocate(old);
        }
        fresh
    }

    /// Releases every allocation at once, restoring full capacity.
    fn reset(&self);

    /// Bytes currently in use.
    fn used_memory(&self) -> usize;

    /// Total capacity in bytes.
    fn total_memory(&self) -> usize;

    /// Bytes still available.
    fn available_memory(&self) -> usize {
        self.total_memory().saturating_sub(self.used_memory())
    }

    /// The allocator's kind.
    fn kind(&self) -> AllocatorKind;

    /// Debug name given at construction.
    fn name(&self) -> &str;

    /// Snapshot of the allocator's counters.
    fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            total_allocated: self.total_memory(),
            total_used: self.used_memory(),
            peak_usage: self.used_memory(),
            ..Default::default()
        }
    }

    /// Whether `ptr` lies inside the memory range this allocator manages.
    fn owns_pointer(&self, ptr: NonNull<u8>) -> bool;

    /// Consistency check; `false` means internal state is corrupted.
    fn validate(&self) -> bool {
        true
    }

    /// One-line human-readable summary for log dumps.
    fn debug_info(&self) -> String {
        format!(
            "{} [used: {} / total: {}]",
            self.name(),
            self.used_memory(),
            self.total_memory()
        )
    }

    /// Whether concurrent calls are internally synchronized.
    fn is_thread_safe(&self) -> bool {
        false
    }

    /// Whether [`Allocator::deallocate`] actually reclaims memory.
    fn supports_deallocate(&self) -> bool {
        true
    }

    /// Whether [`Allocator::reallocate`] is better than allocate-and-drop.
    fn supports_realloc(&self) -> bool {
        false
    }
}

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
#[inline]
pub const fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}

/// Whether `value` is a power of two.
#[inline]
pub const fn is_power_of_two(value: usize) -> bool {
    value > 0 && value & (value - 1) == 0
}
