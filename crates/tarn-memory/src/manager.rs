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

//! The global arena manager.
//!
//! A [`MemoryManager`] owns one OS-backed reservation for its whole
//! initialized lifetime and slices it into fixed-purpose zones according
//! to a [`MemoryBudget`]. Zones are bump-allocated under a per-zone lock
//! (zone carve-outs only happen at allocator-creation time, so the lock
//! is never hot); the allocators carved from a zone run lock-free.
//!
//! The manager is an explicitly constructed object: share it through an
//! `Arc` instead of a global singleton, and construct independent
//! instances in tests.

use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::time::Instant;

use tarn_core::memory::sizes::MB;
use tarn_core::memory::sizing::{adjust_to_recommended, default_size};
use tarn_core::memory::{
    Allocator, AllocatorKind, MemoryBudget, MemoryError, MemoryResult, MemoryZone,
    DEFAULT_ALIGNMENT,
};

use crate::platform;
use crate::stack::StackAllocator;

/// Identity of a registered allocator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocatorId(u64);

/// Aggregated usage statistics across the whole arena.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalStats {
    /// Bytes reserved from the OS.
    pub total_reserved: usize,
    /// Bytes currently carved out of zones.
    pub total_used: usize,
    /// Bytes still available across all zones.
    pub total_available: usize,
    /// High-water mark of `total_used`.
    pub peak_usage: usize,
    /// Live registered allocators.
    pub allocator_count: usize,
    /// Sum of active allocations across registered allocators.
    pub active_allocation_count: usize,
    /// Per-zone used bytes, indexed by [`MemoryZone::index`].
    pub zone_usage: [usize; MemoryZone::COUNT],
    /// Per-zone reserved bytes, indexed by [`MemoryZone::index`].
    pub zone_reserved: [usize; MemoryZone::COUNT],
}

/// One zone's slice of the arena.
///
/// `cursor` is the bump offset for carve-outs and is guarded by its own
/// mutex (multi-step check-then-commit); `used` is read lock-free by the
/// stats paths.
#[derive(Debug, Default)]
struct ZoneState {
    base_offset: usize,
    total: usize,
    used: AtomicUsize,
    cursor: Mutex<usize>,
    can_grow: bool,
}

#[derive(Debug)]
struct Arena {
    base: NonNull<u8>,
    size: usize,
    zones: [ZoneState; MemoryZone::COUNT],
}

// SAFETY: the base pointer is only dereferenced through offsets handed
// out under zone cursor locks; the mapping itself is immutable between
// initialize and shutdown.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

/// A weak, non-owning record of a live allocator.
///
/// The manager never owns allocator lifetime; records exist for stats,
/// validation sweeps, and shutdown-time leak warnings.
struct AllocatorRecord {
    id: AllocatorId,
    zone: MemoryZone,
    size: usize,
    name: String,
    created: Instant,
    handle: Weak<dyn Allocator>,
}

/// The global arena manager. See the module docs.
pub struct MemoryManager {
    arena: RwLock<Option<Arena>>,
    registry: Mutex<Vec<AllocatorRecord>>,
    total_used: AtomicUsize,
    peak_usage: AtomicUsize,
    next_allocator_id: AtomicU64,
}

impl Default for MemoryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryManager {
    /// Creates an uninitialized manager. Call [`MemoryManager::initialize`]
    /// before carving allocators from it.
    pub fn new() -> Self {
        Self {
            arena: RwLock::new(None),
            registry: Mutex::new(Vec::new()),
            total_used: AtomicUsize::new(0),
            peak_usage: AtomicUsize::new(0),
            next_allocator_id: AtomicU64::new(0),
        }
    }

    /// Reserves the budget's total size from the OS and lays the zones
    /// out back-to-back in budget declaration order.
    ///
    /// Double initialization is idempotent: it logs a warning and
    /// returns `Ok`. Budgets are validated and laid out before the OS
    /// reservation is made, so a rejected budget never leaks memory and
    /// the manager stays uninitialized.
    pub fn initialize(&self, budget: &MemoryBudget) -> MemoryResult<()> {
        let mut arena = self.arena.write().unwrap_or_else(|e| e.into_inner());
        if arena.is_some() {
            log::warn!("MemoryManager::initialize called twice; keeping existing arena");
            return Ok(());
        }

        if budget.total_size == 0 {
            return Err(MemoryError::InvalidBudget("total_size is zero".into()));
        }
        for alloc in &budget.zone_allocations {
            if alloc.min_size > alloc.max_size {
                return Err(MemoryError::InvalidBudget(format!(
                    "zone {}: min_size {} exceeds max_size {}",
                    alloc.zone, alloc.min_size, alloc.max_size
                )));
            }
        }

        // Lay the zones out before touching the OS so a rejected budget
        // never leaves a reservation behind. Zone sizes are rounded up to
        // the default alignment, keeping every carve-out base aligned.
        let mut zones: [ZoneState; MemoryZone::COUNT] = Default::default();
        let mut next_offset = 0usize;
        for alloc in &budget.zone_allocations {
            let slot = &mut zones[alloc.zone.index()];
            if slot.total != 0 {
                log::warn!("duplicate budget entry for zone {}; ignoring", alloc.zone);
                continue;
            }
            let padded = budget
                .zone_size(alloc.zone)
                .checked_next_multiple_of(DEFAULT_ALIGNMENT);
            let Some(size) = padded else {
                return Err(MemoryError::InvalidBudget(format!(
                    "zone {}: layout size overflows",
                    alloc.zone
                )));
            };
            let Some(end) = next_offset.checked_add(size) else {
                return Err(MemoryError::InvalidBudget(format!(
                    "zone {}: layout size overflows",
                    alloc.zone
                )));
            };
            slot.base_offset = next_offset;
            slot.total = size;
            slot.can_grow = alloc.can_grow;
            next_offset = end;
        }
        if next_offset > budget.total_size {
            log::error!(
                "zone layout needs {next_offset} bytes but the budget reserves only {}",
                budget.total_size
            );
            return Err(MemoryError::ZoneLayoutOverflow {
                required: next_offset,
                available: budget.total_size,
            });
        }

        let base = platform::reserve(budget.total_size).ok_or_else(|| {
            log::error!(
                "OS reservation of {} bytes for the arena failed",
                budget.total_size
            );
            MemoryError::ReservationFailed {
                size: budget.total_size,
            }
        })?;

        log::info!(
            "memory manager initialized: {} MB reserved, {} MB laid out across {} zones",
            budget.total_size / MB,
            next_offset / MB,
            budget.zone_allocations.len()
        );

        *arena = Some(Arena {
            base,
            size: budget.total_size,
            zones,
        });
        Ok(())
    }

    /// Whether [`MemoryManager::initialize`] has succeeded and
    /// [`MemoryManager::shutdown`] has not yet run.
    pub fn is_initialized(&self) -> bool {
        self.arena
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Reports final statistics, warns about still-registered allocators,
    /// releases the OS reservation, and resets to the uninitialized
    /// state. No-op if not initialized.
    pub fn shutdown(&self) {
        let mut arena_guard = self.arena.write().unwrap_or_else(|e| e.into_inner());
        let Some(arena) = arena_guard.take() else {
            return;
        };

        let used: usize = arena
            .zones
            .iter()
            .map(|z| z.used.load(Ordering::Relaxed))
            .sum();
        log::info!(
            "memory manager shutting down: {} MB of {} MB still in use, peak {} MB",
            used / MB,
            arena.size / MB,
            self.peak_usage.load(Ordering::Relaxed) / MB
        );

        {
            let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.retain(|record| record.handle.strong_count() > 0);
            for record in registry.iter() {
                log::warn!(
                    "allocator '{}' ({} bytes, zone {}, created {:?} ago) still alive at shutdown",
                    record.name,
                    record.size,
                    record.zone,
                    record.created.elapsed()
                );
            }
            registry.clear();
        }

        // SAFETY: base/size are the reservation made in initialize; the
        // arena was just taken so nothing can hand out new ranges.
        unsafe { platform::release(arena.base, arena.size) };

        self.total_used.store(0, Ordering::Relaxed);
        self.peak_usage.store(0, Ordering::Relaxed);
    }

    // === Zone-level allocation ===

    /// Carves `size` bytes (rounded up to [`DEFAULT_ALIGNMENT`]) out of
    /// `zone` under the zone's lock.
    ///
    /// This is a bump allocation with no individual free: the zone's
    /// offset only ever advances. Infrequent by design (allocator
    /// creation time), hence the coarse lock.
    pub fn allocate_from_zone(&self, zone: MemoryZone, size: usize) -> Option<NonNull<u8>> {
        if size == 0 {
            log::warn!("refused zero-size carve-out from zone {zone}");
            return None;
        }
        // Round up so the next carve-out base stays aligned. Overflowing
        // requests are refused like any other capacity failure.
        let Some(size) = size.checked_next_multiple_of(DEFAULT_ALIGNMENT) else {
            log::error!("refused oversized carve-out of {size} bytes from zone {zone}");
            return None;
        };
        let arena_guard = self.arena.read().unwrap_or_else(|e| e.into_inner());
        let Some(arena) = arena_guard.as_ref() else {
            log::error!("allocate_from_zone({zone}) called before initialization");
            return None;
        };
        let state = &arena.zones[zone.index()];

        let mut cursor = state.cursor.lock().unwrap_or_else(|e| e.into_inner());
        let current = *cursor;
        let new_offset = match current.checked_add(size) {
            Some(end) if end <= state.total => end,
            _ => {
                let err = MemoryError::ZoneExhausted {
                    zone,
                    requested: size,
                    available: state.total - current,
                };
                log::error!("{err}");
                return None;
            }
        };
        *cursor = new_offset;
        state.used.fetch_add(size, Ordering::Relaxed);
        drop(cursor);

        let total = self.total_used.fetch_add(size, Ordering::Relaxed) + size;
        self.peak_usage.fetch_max(total, Ordering::Relaxed);

        // SAFETY: [base_offset + current, base_offset + new_offset) is
        // inside the reservation and was claimed under the cursor lock.
        Some(unsafe { NonNull::new_unchecked(arena.base.as_ptr().add(state.base_offset + current)) })
    }

    /// Returns `size` bytes of bookkeeping to `zone`.
    ///
    /// Statistics only: zone space is bump-allocated and never compacted,
    /// so the byte range itself is not reclaimed. `ptr` is a trusted
    /// input and is not bounds-checked.
    pub fn deallocate_to_zone(&self, zone: MemoryZone, _ptr: NonNull<u8>, size: usize) {
        // Mirror the carve-out rounding so the counters balance.
        let Some(size) = size.checked_next_multiple_of(DEFAULT_ALIGNMENT) else {
            log::warn!("deallocate_to_zone({zone}, {size}) is not a plausible carve-out size");
            return;
        };
        let arena_guard = self.arena.read().unwrap_or_else(|e| e.into_inner());
        let Some(arena) = arena_guard.as_ref() else {
            log::error!("deallocate_to_zone({zone}) called before initialization");
            return;
        };
        let state = &arena.zones[zone.index()];
        let result = state
            .used
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(size)
            });
        if result.is_err() {
            log::warn!(
                "deallocate_to_zone({zone}, {size}) would underflow the zone's usage counter"
            );
            return;
        }
        let _ = self
            .total_used
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(size)
            });
    }

    // === Allocator factories ===

    /// Creates a [`StackAllocator`] backed by `size` bytes carved from
    /// `zone`. A zero `size` selects the recommended default; an
    /// out-of-range size is readjusted to the default with a warning.
    pub fn create_stack_allocator(
        &self,
        zone: MemoryZone,
        size: usize,
        name: &str,
    ) -> Option<Arc<StackAllocator>> {
        let adjusted = self.resolve_size(size, AllocatorKind::Stack, name);
        let base = self.allocate_from_zone(zone, adjusted)?;
        // SAFETY: the carve-out is exclusively ours and the zone outlives
        // the allocator by the subsystem's lending contract.
        let allocator = Arc::new(unsafe { StackAllocator::from_raw_parts(base, adjusted, name) });
        // Bind the concrete Weak first; the unsized coercion to the trait
        // object happens on the annotated rebinding.
        let weak = Arc::downgrade(&allocator);
        let handle: Weak<dyn Allocator> = weak;
        let id = self.register_allocator(handle, zone, adjusted, name);
        log::info!(
            "created stack allocator '{name}' ({} KB) in zone {zone} (id {id:?})",
            adjusted / 1024
        );
        Some(allocator)
    }

    /// Placeholder: pool allocators are not implemented yet.
    pub fn create_pool_allocator(
        &self,
        zone: MemoryZone,
        element_size: usize,
        element_count: usize,
        name: &str,
    ) -> Option<Arc<dyn Allocator>> {
        let _ = self.resolve_size(
            element_size.saturating_mul(element_count),
            AllocatorKind::Pool,
            name,
        );
        log::error!("pool allocators are not implemented ('{name}', zone {zone})");
        None
    }

    /// Placeholder: heap allocators are not implemented yet.
    pub fn create_heap_allocator(
        &self,
        zone: MemoryZone,
        size: usize,
        name: &str,
    ) -> Option<Arc<dyn Allocator>> {
        let _ = self.resolve_size(size, AllocatorKind::Heap, name);
        log::error!("heap allocators are not implemented ('{name}', zone {zone})");
        None
    }

    /// Placeholder: linear allocators are not implemented yet.
    pub fn create_linear_allocator(
        &self,
        zone: MemoryZone,
        size: usize,
        name: &str,
    ) -> Option<Arc<dyn Allocator>> {
        let _ = self.resolve_size(size, AllocatorKind::Linear, name);
        log::error!("linear allocators are not implemented ('{name}', zone {zone})");
        None
    }

    fn resolve_size(&self, requested: usize, kind: AllocatorKind, name: &str) -> usize {
        if requested == 0 {
            return default_size(kind);
        }
        let adjusted = adjust_to_recommended(requested, kind);
        if adjusted != requested {
            log::warn!(
                "allocator '{name}': requested size {requested} is out of range for {kind}; \
                 substituting the default of {adjusted}"
            );
        }
        adjusted
    }

    // === Registry ===

    /// Records a live allocator for stats, validation, and leak sweeps.
    /// The factories call this automatically; it is public for allocators
    /// constructed outside the manager.
    pub fn register_allocator(
        &self,
        handle: Weak<dyn Allocator>,
        zone: MemoryZone,
        size: usize,
        name: &str,
    ) -> AllocatorId {
        let id = AllocatorId(self.next_allocator_id.fetch_add(1, Ordering::Relaxed));
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry.push(AllocatorRecord {
            id,
            zone,
            size,
            name: name.to_string(),
            created: Instant::now(),
            handle,
        });
        id
    }

    /// Removes an allocator's registration record.
    pub fn unregister_allocator(&self, id: AllocatorId) {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let before = registry.len();
        registry.retain(|record| record.id != id);
        if registry.len() == before {
            log::warn!("unregister_allocator: no record for {id:?}");
        }
    }

    // === Statistics ===

    /// Aggregated arena statistics. Read-only, no side effects.
    pub fn global_stats(&self) -> GlobalStats {
        let arena_guard = self.arena.read().unwrap_or_else(|e| e.into_inner());
        let mut stats = GlobalStats::default();
        if let Some(arena) = arena_guard.as_ref() {
            stats.total_reserved = arena.size;
            for zone in MemoryZone::ALL {
                let state = &arena.zones[zone.index()];
                stats.zone_usage[zone.index()] = state.used.load(Ordering::Relaxed);
                stats.zone_reserved[zone.index()] = state.total;
            }
            stats.total_used = stats.zone_usage.iter().sum();
            stats.total_available = stats.total_reserved - stats.total_used;
        }
        stats.peak_usage = self.peak_usage.load(Ordering::Relaxed);

        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        for record in registry.iter() {
            if let Some(allocator) = record.handle.upgrade() {
                stats.allocator_count += 1;
                stats.active_allocation_count += allocator.stats().active_allocations;
            }
        }
        stats
    }

    /// Bytes currently carved out of `zone`.
    pub fn zone_usage(&self, zone: MemoryZone) -> usize {
        let arena_guard = self.arena.read().unwrap_or_else(|e| e.into_inner());
        arena_guard
            .as_ref()
            .map(|arena| arena.zones[zone.index()].used.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Bytes reserved for `zone` at initialization.
    pub fn zone_reserved(&self, zone: MemoryZone) -> usize {
        let arena_guard = self.arena.read().unwrap_or_else(|e| e.into_inner());
        arena_guard
            .as_ref()
            .map(|arena| arena.zones[zone.index()].total)
            .unwrap_or(0)
    }

    /// Plain-text multi-line usage summary, intended for log dumps. The
    /// exact layout is not a compatibility contract.
    pub fn debug_report(&self) -> String {
        use std::fmt::Write;

        let stats = self.global_stats();
        let mut report = String::new();
        let _ = writeln!(report, "=== Memory Manager Report ===");
        let _ = writeln!(report, "Reserved:  {} MB", stats.total_reserved / MB);
        let _ = writeln!(
            report,
            "Used:      {} MB ({:.1}%)",
            stats.total_used / MB,
            percentage(stats.total_used, stats.total_reserved)
        );
        let _ = writeln!(report, "Available: {} MB", stats.total_available / MB);
        let _ = writeln!(report, "Peak:      {} MB", stats.peak_usage / MB);
        let _ = writeln!(
            report,
            "Allocators: {} ({} active allocations)",
            stats.allocator_count, stats.active_allocation_count
        );
        let _ = writeln!(report, "Zones:");
        for zone in MemoryZone::ALL {
            let used = stats.zone_usage[zone.index()];
            let reserved = stats.zone_reserved[zone.index()];
            let _ = writeln!(
                report,
                "  {zone:<12} {} / {} MB ({:.1}%)",
                used / MB,
                reserved / MB,
                percentage(used, reserved)
            );
        }
        report
    }

    // === Debugging and validation ===

    /// Runs every live registered allocator's own consistency check.
    /// Failures are logged and reported through the return value, never
    /// raised.
    pub fn validate_all_allocators(&self) -> bool {
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let mut all_valid = true;
        for record in registry.iter() {
            if let Some(allocator) = record.handle.upgrade() {
                if !allocator.validate() {
                    log::error!(
                        "allocator '{}' (zone {}) failed validation",
                        record.name,
                        record.zone
                    );
                    all_valid = false;
                }
            }
        }
        all_valid
    }

    /// Sweeps the registry, pruning records of dropped allocators and
    /// warning about each still-live one. Returns the number of live
    /// allocators found.
    pub fn check_memory_leaks(&self) -> usize {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry.retain(|record| record.handle.strong_count() > 0);
        for record in registry.iter() {
            let active = record
                .handle
                .upgrade()
                .map(|a| a.stats().active_allocations)
                .unwrap_or(0);
            log::warn!(
                "live allocator '{}' in zone {}: {} bytes, {} active allocations",
                record.name,
                record.zone,
                record.size,
                active
            );
        }
        registry.len()
    }

    /// Computes per-zone usage ratios, logs them sorted descending, and
    /// returns them. Statistics only: no memory moves between zones.
    pub fn report_zone_utilization(&self) -> Vec<(MemoryZone, f64)> {
        let stats = self.global_stats();
        let mut ratios: Vec<(MemoryZone, f64)> = MemoryZone::ALL
            .iter()
            .filter(|zone| stats.zone_reserved[zone.index()] > 0)
            .map(|&zone| {
                let used = stats.zone_usage[zone.index()] as f64;
                let reserved = stats.zone_reserved[zone.index()] as f64;
                (zone, used / reserved)
            })
            .collect();
        ratios.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (zone, ratio) in &ratios {
            log::info!("zone {zone}: {:.1}% used", ratio * 100.0);
        }
        ratios
    }
}

impl Drop for MemoryManager {
    fn drop(&mut self) {
        // Owners that forget an explicit shutdown still get a clean
        // teardown (with its leak warnings).
        self.shutdown();
    }
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("initialized", &self.is_initialized())
            .field("peak_usage", &self.peak_usage.load(Ordering::Relaxed))
            .finish()
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole > 0 {
        part as f64 / whole as f64 * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarn_core::memory::sizes::{DEFAULT_STACK_SIZE, KB};
    use tarn_core::memory::ZoneAllocation;

    /// 64 MiB budget with two zones, enough for a handful of default
    /// sized stack allocators.
    fn small_budget() -> MemoryBudget {
        MemoryBudget {
            total_size: 64 * MB,
            zone_allocations: vec![
                ZoneAllocation {
                    zone: MemoryZone::FrameTemp,
                    percentage: 0.25,
                    min_size: MB,
                    max_size: 16 * MB,
                    can_grow: true,
                },
                ZoneAllocation {
                    zone: MemoryZone::General,
                    percentage: 0.5,
                    min_size: MB,
                    max_size: 32 * MB,
                    can_grow: true,
                },
            ],
        }
    }

    #[test]
    fn initialize_then_shutdown_is_clean() {
        let manager = MemoryManager::new();
        assert!(!manager.is_initialized());
        manager.initialize(&small_budget()).unwrap();
        assert!(manager.is_initialized());
        manager.shutdown();
        assert!(!manager.is_initialized());
    }

    #[test]
    fn double_initialize_is_idempotent() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        assert!(manager.initialize(&small_budget()).is_ok());
        assert!(manager.is_initialized());
    }

    #[test]
    fn shutdown_without_initialize_is_a_noop() {
        let manager = MemoryManager::new();
        manager.shutdown();
        assert!(!manager.is_initialized());
    }

    #[test]
    fn initialize_rejects_zero_total_size() {
        let manager = MemoryManager::new();
        let budget = MemoryBudget {
            total_size: 0,
            zone_allocations: vec![],
        };
        assert!(matches!(
            manager.initialize(&budget),
            Err(MemoryError::InvalidBudget(_))
        ));
        assert!(!manager.is_initialized());
    }

    #[test]
    fn initialize_rejects_oversubscribed_layout() {
        let manager = MemoryManager::new();
        // 30% of 1 MiB min-clamps to 10 MiB, which cannot fit.
        let budget = MemoryBudget {
            total_size: MB,
            zone_allocations: vec![ZoneAllocation {
                zone: MemoryZone::Assets,
                percentage: 0.30,
                min_size: 10 * MB,
                max_size: 50 * MB,
                can_grow: false,
            }],
        };
        assert!(matches!(
            manager.initialize(&budget),
            Err(MemoryError::ZoneLayoutOverflow { .. })
        ));
        assert!(!manager.is_initialized());
    }

    #[test]
    fn initialize_rejects_inverted_zone_clamp() {
        let manager = MemoryManager::new();
        let budget = MemoryBudget {
            total_size: 64 * MB,
            zone_allocations: vec![ZoneAllocation {
                zone: MemoryZone::General,
                percentage: 0.5,
                min_size: 16 * MB,
                max_size: 8 * MB,
                can_grow: true,
            }],
        };
        assert!(matches!(
            manager.initialize(&budget),
            Err(MemoryError::InvalidBudget(_))
        ));
        assert!(!manager.is_initialized());
    }

    #[test]
    fn oversized_carve_out_is_refused_without_panicking() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        manager.allocate_from_zone(MemoryZone::General, 64).unwrap();
        // Sizes whose offset arithmetic would wrap are capacity failures,
        // not panics.
        assert!(manager
            .allocate_from_zone(MemoryZone::General, usize::MAX - 8)
            .is_none());
        assert!(manager
            .allocate_from_zone(MemoryZone::General, usize::MAX)
            .is_none());
        assert_eq!(manager.zone_usage(MemoryZone::General), 64);
    }

    #[test]
    fn carve_outs_are_rounded_to_default_alignment() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        let first = manager.allocate_from_zone(MemoryZone::General, 100).unwrap();
        let second = manager.allocate_from_zone(MemoryZone::General, 100).unwrap();
        assert_eq!(manager.zone_usage(MemoryZone::General), 224);
        assert_eq!(second.as_ptr() as usize - first.as_ptr() as usize, 112);
        assert_eq!(first.as_ptr() as usize % DEFAULT_ALIGNMENT, 0);
        assert_eq!(second.as_ptr() as usize % DEFAULT_ALIGNMENT, 0);

        // Returning the original request size balances the counters.
        manager.deallocate_to_zone(MemoryZone::General, first, 100);
        manager.deallocate_to_zone(MemoryZone::General, second, 100);
        assert_eq!(manager.zone_usage(MemoryZone::General), 0);
    }

    #[test]
    fn zones_are_laid_out_back_to_back() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        // FrameTemp is declared first, General starts right after it.
        let first = manager
            .allocate_from_zone(MemoryZone::FrameTemp, 64)
            .unwrap();
        let second = manager.allocate_from_zone(MemoryZone::General, 64).unwrap();
        let frame_temp_size = manager.zone_reserved(MemoryZone::FrameTemp);
        assert_eq!(
            second.as_ptr() as usize - first.as_ptr() as usize,
            frame_temp_size
        );
    }

    #[test]
    fn allocate_from_zone_tracks_usage_and_fails_on_exhaustion() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        let reserved = manager.zone_reserved(MemoryZone::FrameTemp);

        assert!(manager
            .allocate_from_zone(MemoryZone::FrameTemp, reserved)
            .is_some());
        assert_eq!(manager.zone_usage(MemoryZone::FrameTemp), reserved);

        // Exhausted: the offset must not move.
        assert!(manager.allocate_from_zone(MemoryZone::FrameTemp, 1).is_none());
        assert_eq!(manager.zone_usage(MemoryZone::FrameTemp), reserved);
    }

    #[test]
    fn allocate_from_unbudgeted_zone_fails() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        assert!(manager.allocate_from_zone(MemoryZone::Audio, 64).is_none());
    }

    #[test]
    fn allocate_before_initialize_fails() {
        let manager = MemoryManager::new();
        assert!(manager.allocate_from_zone(MemoryZone::General, 64).is_none());
    }

    #[test]
    fn deallocate_to_zone_is_bookkeeping_only() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        let ptr = manager.allocate_from_zone(MemoryZone::General, 512).unwrap();
        assert_eq!(manager.zone_usage(MemoryZone::General), 512);

        manager.deallocate_to_zone(MemoryZone::General, ptr, 512);
        assert_eq!(manager.zone_usage(MemoryZone::General), 0);

        // Underflow is refused, not wrapped.
        manager.deallocate_to_zone(MemoryZone::General, ptr, 512);
        assert_eq!(manager.zone_usage(MemoryZone::General), 0);
    }

    #[test]
    fn zero_size_factory_request_selects_the_default() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        let allocator = manager
            .create_stack_allocator(MemoryZone::General, 0, "default-sized")
            .unwrap();
        assert_eq!(allocator.total_memory(), DEFAULT_STACK_SIZE);
    }

    #[test]
    fn out_of_range_factory_request_is_readjusted() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        // 8 KiB is below the stack allocator minimum.
        let allocator = manager
            .create_stack_allocator(MemoryZone::General, 8 * KB, "tiny")
            .unwrap();
        assert_eq!(allocator.total_memory(), DEFAULT_STACK_SIZE);
    }

    #[test]
    fn factory_fails_when_the_zone_cannot_fit_the_allocator() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        // FrameTemp holds 16 MiB; a 12 MiB allocator fits once, not twice.
        assert!(manager
            .create_stack_allocator(MemoryZone::FrameTemp, 12 * MB, "first")
            .is_some());
        assert!(manager
            .create_stack_allocator(MemoryZone::FrameTemp, 12 * MB, "second")
            .is_none());
    }

    #[test]
    fn placeholder_factories_return_none() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        assert!(manager
            .create_pool_allocator(MemoryZone::General, 64, 1024, "pool")
            .is_none());
        assert!(manager
            .create_heap_allocator(MemoryZone::General, 2 * MB, "heap")
            .is_none());
        assert!(manager
            .create_linear_allocator(MemoryZone::General, 2 * MB, "linear")
            .is_none());
        // Placeholders must not consume zone space.
        assert_eq!(manager.zone_usage(MemoryZone::General), 0);
    }

    #[test]
    fn leak_sweep_counts_only_live_allocators() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        let allocator = manager
            .create_stack_allocator(MemoryZone::General, 0, "leaky")
            .unwrap();
        assert_eq!(manager.check_memory_leaks(), 1);
        drop(allocator);
        assert_eq!(manager.check_memory_leaks(), 0);
    }

    #[test]
    fn unregister_removes_the_record() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        let allocator = manager
            .create_stack_allocator(MemoryZone::General, 0, "transient")
            .unwrap();
        let stats = manager.global_stats();
        assert_eq!(stats.allocator_count, 1);

        // The factory's record is the only one; find its id via a fresh
        // registration round-trip.
        let weak = Arc::downgrade(&allocator);
        let handle: Weak<dyn Allocator> = weak;
        let id = manager.register_allocator(handle, MemoryZone::General, 64, "extra");
        manager.unregister_allocator(id);
        assert_eq!(manager.global_stats().allocator_count, 1);
    }

    #[test]
    fn validate_all_allocators_passes_on_healthy_state() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        let allocator = manager
            .create_stack_allocator(MemoryZone::General, 0, "healthy")
            .unwrap();
        allocator.allocate(256, 16).unwrap();
        assert!(manager.validate_all_allocators());
    }

    #[test]
    fn global_stats_aggregate_zones_and_allocators() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        let allocator = manager
            .create_stack_allocator(MemoryZone::General, 0, "stats")
            .unwrap();
        allocator.allocate(100, 4).unwrap();
        allocator.allocate(100, 4).unwrap();

        let stats = manager.global_stats();
        assert_eq!(stats.total_reserved, 64 * MB);
        assert_eq!(stats.total_used, DEFAULT_STACK_SIZE);
        assert_eq!(stats.total_available, 64 * MB - DEFAULT_STACK_SIZE);
        assert_eq!(stats.zone_usage[MemoryZone::General.index()], DEFAULT_STACK_SIZE);
        assert_eq!(stats.allocator_count, 1);
        assert_eq!(stats.active_allocation_count, 2);
        assert!(stats.peak_usage >= stats.total_used);
    }

    #[test]
    fn debug_report_lists_zone_lines() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        let report = manager.debug_report();
        assert!(report.contains("Memory Manager Report"));
        assert!(report.contains("General"));
        assert!(report.contains("MB"));
    }

    #[test]
    fn zone_utilization_is_sorted_descending() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        manager.allocate_from_zone(MemoryZone::FrameTemp, MB).unwrap();
        let ratios = manager.report_zone_utilization();
        assert_eq!(ratios.len(), 2);
        assert_eq!(ratios[0].0, MemoryZone::FrameTemp);
        assert!(ratios[0].1 >= ratios[1].1);
    }

    #[test]
    fn peak_usage_survives_deallocation() {
        let manager = MemoryManager::new();
        manager.initialize(&small_budget()).unwrap();
        let ptr = manager.allocate_from_zone(MemoryZone::General, MB).unwrap();
        let peak_before = manager.global_stats().peak_usage;
        manager.deallocate_to_zone(MemoryZone::General, ptr, MB);
        assert_eq!(manager.global_stats().peak_usage, peak_before);
        assert_eq!(manager.global_stats().total_used, 0);
    }
}
