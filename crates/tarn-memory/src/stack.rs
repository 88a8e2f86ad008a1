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

//! Lock-free stack (bump) allocator.
//!
//! Allocation advances a single atomic offset through a compare-and-swap
//! retry loop, so concurrent allocations never block and never receive
//! overlapping ranges. Individual deallocation is unsupported by design;
//! reclamation happens in bulk through [`StackAllocator::reset`] or in
//! LIFO order through markers and [`StackAllocator::rewind`].
//!
//! With the `debug-headers` feature enabled, every allocation is preceded
//! by a small header (size, padding, magic, allocation id) that
//! [`StackAllocator::validate`] walks to detect corruption.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use tarn_core::memory::{
    is_power_of_two, Allocator, AllocatorKind, AllocatorStats, MemoryError, MemoryResult,
};

use crate::platform;

/// Per-allocation bookkeeping written immediately before the aligned
/// payload when `debug-headers` is enabled.
///
/// The header is write-once metadata used only by [`StackAllocator::validate`];
/// it never enables individual free.
#[repr(C)]
#[cfg_attr(not(feature = "debug-headers"), allow(dead_code))]
#[derive(Debug, Clone, Copy)]
struct AllocationHeader {
    size: usize,
    padding: usize,
    magic: u32,
    alloc_id: u32,
}

#[cfg_attr(not(feature = "debug-headers"), allow(dead_code))]
const ALLOCATION_MAGIC: u32 = 0xDEAD_BEEF;

/// An opaque snapshot of the allocator's offset.
///
/// Valid only while it does not exceed the allocator's current offset,
/// and only for LIFO-ordered rewinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker(usize);

#[derive(Debug)]
enum Backing {
    /// Memory lent by a zone or an external buffer; not released on drop.
    Borrowed,
    /// Memory reserved by this allocator; released on drop.
    Owned,
}

/// A thread-safe, non-blocking bump allocator over one contiguous range.
///
/// The range is typically a sub-range of an arena zone (borrowed, the
/// zone outlives the allocator) or a standalone reservation owned by the
/// allocator itself. Two concurrent `allocate` calls are guaranteed
/// disjoint byte ranges; their relative order is unspecified.
///
/// `reset` and `rewind` are *not* synchronized against concurrent
/// `allocate`: callers must quiesce allocation before rewinding (e.g.
/// only rewind at a frame boundary when no worker threads are active).
#[derive(Debug)]
pub struct StackAllocator {
    base: NonNull<u8>,
    size: usize,
    offset: AtomicUsize,
    peak_usage: AtomicUsize,
    allocation_count: AtomicUsize,
    cas_retries: AtomicUsize,
    #[cfg_attr(not(feature = "debug-headers"), allow(dead_code))]
    next_alloc_id: AtomicU32,
    name: String,
    backing: Backing,
}

// SAFETY: the allocator only hands out disjoint ranges claimed through
// the atomic offset; the base pointer itself is never mutated.
unsafe impl Send for StackAllocator {}
unsafe impl Sync for StackAllocator {}

impl StackAllocator {
    /// Creates a stack allocator that owns a fresh `size`-byte
    /// reservation, released when the allocator is dropped.
    pub fn with_capacity(size: usize, name: &str) -> MemoryResult<Self> {
        let base = platform::reserve(size).ok_or_else(|| {
            log::error!("StackAllocator '{name}': reservation of {size} bytes failed");
            MemoryError::ReservationFailed { size }
        })?;
        Ok(Self::from_parts(base, size, name, Backing::Owned))
    }

    /// Creates a stack allocator over memory owned by someone else
    /// (an arena zone, or any caller-supplied buffer).
    ///
    /// # Safety
    ///
    /// `base` must point to at least `size` writable bytes that stay
    /// valid and unused by others for the allocator's whole lifetime.
    pub unsafe fn from_raw_parts(base: NonNull<u8>, size: usize, name: &str) -> Self {
        Self::from_parts(base, size, name, Backing::Borrowed)
    }

    fn from_parts(base: NonNull<u8>, size: usize, name: &str, backing: Backing) -> Self {
        Self {
            base,
            size,
            offset: AtomicUsize::new(0),
            peak_usage: AtomicUsize::new(0),
            allocation_count: AtomicUsize::new(0),
            cas_retries: AtomicUsize::new(0),
            next_alloc_id: AtomicU32::new(0),
            name: name.to_string(),
            backing,
        }
    }

    const fn header_size() -> usize {
        if cfg!(feature = "debug-headers") {
            std::mem::size_of::<AllocationHeader>()
        } else {
            0
        }
    }

    /// Allocates `size` bytes aligned to `alignment`.
    ///
    /// This is the hot path of the subsystem: a lock-free bump with CAS
    /// retry. Capacity failures return `None` without advancing the
    /// offset; a lost CAS race reloads and retries.
    pub fn allocate(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            log::warn!("StackAllocator '{}': refused zero-size allocation", self.name);
            return None;
        }
        if !is_power_of_two(alignment) {
            log::error!(
                "StackAllocator '{}': alignment {alignment} is not a power of two",
                self.name
            );
            return None;
        }

        let header = Self::header_size();
        let base_addr = self.base.as_ptr() as usize;
        let mut current = self.offset.load(Ordering::Acquire);
        loop {
            // Align the address that follows the (possibly empty) header.
            let unaligned = base_addr + current + header;
            let Some(aligned) = unaligned.checked_next_multiple_of(alignment) else {
                log::error!(
                    "StackAllocator '{}': alignment {alignment} overflows the address space",
                    self.name
                );
                return None;
            };
            let padding = aligned - unaligned;
            let Some(new_offset) = current
                .checked_add(header)
                .and_then(|v| v.checked_add(padding))
                .and_then(|v| v.checked_add(size))
            else {
                log::error!(
                    "StackAllocator '{}': refused oversized request of {size} bytes",
                    self.name
                );
                return None;
            };

            if new_offset > self.size {
                log::error!(
                    "StackAllocator '{}' exhausted: requested {size} (align {alignment}), \
                     available {}",
                    self.name,
                    self.size - current
                );
                return None;
            }

            match self.offset.compare_exchange_weak(
                current,
                new_offset,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    self.allocation_count.fetch_add(1, Ordering::Relaxed);
                    self.peak_usage.fetch_max(new_offset, Ordering::Relaxed);
                    #[cfg(feature = "debug-headers")]
                    {
                        let alloc_id = self.next_alloc_id.fetch_add(1, Ordering::Relaxed);
                        let header_at = (base_addr + current) as *mut AllocationHeader;
                        // SAFETY: [current, new_offset) was exclusively
                        // claimed by the successful CAS above.
                        unsafe {
                            header_at.write_unaligned(AllocationHeader {
                                size,
                                padding,
                                magic: ALLOCATION_MAGIC,
                                alloc_id,
                            });
                        }
                    }
                    // SAFETY: aligned lies within the claimed range, which
                    // is inside the non-null base mapping.
                    return Some(unsafe { NonNull::new_unchecked(aligned as *mut u8) });
                }
                Err(observed) => {
                    self.cas_retries.fetch_add(1, Ordering::Relaxed);
                    current = observed;
                }
            }
        }
    }

    /// Releases every allocation at once by rewinding the offset to zero.
    ///
    /// Invalidates every previously returned pointer. Intended for frame
    /// or phase boundaries; must not race with concurrent `allocate`.
    pub fn reset(&self) {
        self.offset.store(0, Ordering::Release);
    }

    /// Snapshots the current offset for a later [`StackAllocator::rewind`].
    pub fn marker(&self) -> Marker {
        Marker(self.offset.load(Ordering::Acquire))
    }

    /// Rewinds the offset to a previously taken marker, reclaiming every
    /// allocation made after it.
    ///
    /// Refused (logged, no-op) if the marker exceeds the capacity or the
    /// current offset: rewinding forward is a caller ordering bug.
    /// Correct use requires strict LIFO nesting and external quiescing of
    /// concurrent allocation.
    pub fn rewind(&self, marker: Marker) {
        if marker.0 > self.size {
            log::error!(
                "StackAllocator '{}': rewind marker {} exceeds capacity {}",
                self.name,
                marker.0,
                self.size
            );
            return;
        }
        let current = self.offset.load(Ordering::Acquire);
        if marker.0 > current {
            log::error!(
                "StackAllocator '{}': rewind marker {} is ahead of current offset {current}",
                self.name,
                marker.0
            );
            return;
        }
        self.offset.store(marker.0, Ordering::Release);
    }

    /// High-water mark of the offset.
    pub fn peak_usage(&self) -> usize {
        self.peak_usage.load(Ordering::Relaxed)
    }

    /// Number of CAS retries caused by allocation contention.
    pub fn cas_retries(&self) -> usize {
        self.cas_retries.load(Ordering::Relaxed)
    }

    #[cfg(feature = "debug-headers")]
    fn walk_headers(&self) -> bool {
        let end = self.offset.load(Ordering::Acquire);
        let header = Self::header_size();
        let mut pos = 0usize;
        while pos < end {
            if pos + header > end {
                return false;
            }
            let at = unsafe { self.base.as_ptr().add(pos) } as *const AllocationHeader;
            // SAFETY: [pos, pos + header) is inside the claimed range.
            let rec = unsafe { at.read_unaligned() };
            if rec.magic != ALLOCATION_MAGIC {
                return false;
            }
            let Some(next) = pos
                .checked_add(header)
                .and_then(|p| p.checked_add(rec.padding))
                .and_then(|p| p.checked_add(rec.size))
            else {
                return false;
            };
            if next <= pos || next > end {
                return false;
            }
            pos = next;
        }
        true
    }
}

impl Allocator for StackAllocator {
    fn allocate(&self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        StackAllocator::allocate(self, size, alignment)
    }

    /// Unsupported by design: a bump allocator cannot reclaim individual
    /// blocks. Callers must use `reset` or markers.
    fn deallocate(&self, _ptr: NonNull<u8>) {}

    fn reallocate(
        &self,
        ptr: Option<NonNull<u8>>,
        new_size: usize,
        alignment: usize,
    ) -> Option<NonNull<u8>> {
        let Some(_old) = ptr else {
            return self.allocate(new_size, alignment);
        };
        if new_size == 0 {
            // No reclamation possible; the original range stays allocated.
            return None;
        }
        // The original size is unknown here, so the old contents are not
        // copied. Callers needing true realloc must track sizes or use a
        // different allocator kind.
        log::warn!(
            "StackAllocator '{}': reallocate allocates fresh space without copying; \
             the old range is not reclaimed",
            self.name
        );
        self.allocate(new_size, alignment)
    }

    fn reset(&self) {
        StackAllocator::reset(self);
    }

    fn used_memory(&self) -> usize {
        self.offset.load(Ordering::Acquire)
    }

    fn total_memory(&self) -> usize {
        self.size
    }

    fn kind(&self) -> AllocatorKind {
        AllocatorKind::Stack
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stats(&self) -> AllocatorStats {
        let total_used = self.offset.load(Ordering::Acquire);
        let allocation_count = self.allocation_count.load(Ordering::Relaxed);
        AllocatorStats {
            total_allocated: self.size,
            total_used,
            peak_usage: self.peak_usage.load(Ordering::Relaxed),
            allocation_count,
            // Nothing is ever individually freed.
            deallocation_count: 0,
            active_allocations: allocation_count,
            average_allocation_size: if allocation_count > 0 {
                total_used as f64 / allocation_count as f64
            } else {
                0.0
            },
            // A bump allocator cannot fragment internally.
            fragmentation_ratio: 0.0,
        }
    }

    fn owns_pointer(&self, ptr: NonNull<u8>) -> bool {
        let addr = ptr.as_ptr() as usize;
        let base = self.base.as_ptr() as usize;
        addr >= base && addr < base + self.size
    }

    fn validate(&self) -> bool {
        let offset = self.offset.load(Ordering::Acquire);
        if offset > self.size {
            return false;
        }
        // Without debug headers this is a shallow bounds check only.
        #[cfg(feature = "debug-headers")]
        if !self.walk_headers() {
            return false;
        }
        true
    }

    fn debug_info(&self) -> String {
        format!(
            "{} [used: {} / total: {}, peak: {}, allocations: {}, cas retries: {}]",
            self.name,
            self.used_memory(),
            self.size,
            self.peak_usage(),
            self.allocation_count.load(Ordering::Relaxed),
            self.cas_retries()
        )
    }

    fn is_thread_safe(&self) -> bool {
        true
    }

    fn supports_deallocate(&self) -> bool {
        false
    }

    fn supports_realloc(&self) -> bool {
        false
    }
}

impl Drop for StackAllocator {
    fn drop(&mut self) {
        if let Backing::Owned = self.backing {
            // SAFETY: base/size came from platform::reserve in
            // with_capacity and are released exactly once.
            unsafe { platform::release(self.base, self.size) };
        }
    }
}

/// RAII guard that snapshots the allocator's offset on construction and
/// rewinds to it on drop.
///
/// Gives scoped, nested, early-return-safe temporary allocations. The
/// guard is tied to one allocator and one point in its timeline; it is
/// deliberately not clonable.
pub struct StackAllocatorScope<'a> {
    allocator: &'a StackAllocator,
    marker: Marker,
}

impl<'a> StackAllocatorScope<'a> {
    /// Snapshots `allocator`'s current offset.
    pub fn new(allocator: &'a StackAllocator) -> Self {
        Self {
            allocator,
            marker: allocator.marker(),
        }
    }

    /// The allocator this scope rewinds.
    pub fn allocator(&self) -> &StackAllocator {
        self.allocator
    }
}

impl Drop for StackAllocatorScope<'_> {
    fn drop(&mut self) {
        self.allocator.rewind(self.marker);
    }
}
