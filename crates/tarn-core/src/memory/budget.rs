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

//! Zone budget configuration for the global arena.
//!
//! A [`MemoryBudget`] is immutable configuration, constructed once and
//! handed to the arena manager at initialization. It describes the total
//! arena size and, per zone, a percentage share of the total plus a
//! min/max clamp. Budgets derive serde so they can be loaded from config
//! files instead of being hardcoded.

use serde::{Deserialize, Serialize};

use super::sizing::sizes::{GB, MB};

/// The fixed-purpose zones the global arena is carved into.
///
/// This is a closed enumeration used as a dense array index, never as a
/// lookup key. `ALL` and `index` exist for table-driven iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MemoryZone {
    /// Per-frame temporary memory, reset every frame.
    FrameTemp = 0,
    /// Thread-local scratch memory.
    ThreadLocal,
    /// Entities and components.
    Entities,
    /// Physics simulation state.
    Physics,
    /// Rendering buffers.
    Rendering,
    /// Assets (textures, models, ...).
    Assets,
    /// Audio buffers.
    Audio,
    /// General-purpose heap.
    General,
    /// Debug-only allocations.
    Debug,
}

impl MemoryZone {
    /// Number of zone kinds. Zone tables are dense arrays of this length.
    pub const COUNT: usize = 9;

    /// Every zone kind, in index order.
    pub const ALL: [MemoryZone; Self::COUNT] = [
        MemoryZone::FrameTemp,
        MemoryZone::ThreadLocal,
        MemoryZone::Entities,
        MemoryZone::Physics,
        MemoryZone::Rendering,
        MemoryZone::Assets,
        MemoryZone::Audio,
        MemoryZone::General,
        MemoryZone::Debug,
    ];

    /// Dense array index of this zone.
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for MemoryZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MemoryZone::FrameTemp => "FrameTemp",
            MemoryZone::ThreadLocal => "ThreadLocal",
            MemoryZone::Entities => "Entities",
            MemoryZone::Physics => "Physics",
            MemoryZone::Rendering => "Rendering",
            MemoryZone::Assets => "Assets",
            MemoryZone::Audio => "Audio",
            MemoryZone::General => "General",
            MemoryZone::Debug => "Debug",
        };
        f.write_str(name)
    }
}

/// The budget entry for a single zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneAllocation {
    /// The zone this entry applies to.
    pub zone: MemoryZone,
    /// Share of the total arena size, in `[0.0, 1.0]`.
    pub percentage: f32,
    /// Minimum guaranteed size in bytes.
    pub min_size: usize,
    /// Maximum size cap in bytes.
    pub max_size: usize,
    /// Whether this zone may borrow from sibling zones under pressure.
    pub can_grow: bool,
}

/// The global arena budget: total size plus one entry per zone.
///
/// Percentages need not sum to 1.0; the min/max clamp absorbs the slack.
/// Zones are laid out back-to-back in the order the entries are declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryBudget {
    /// Total arena size in bytes.
    pub total_size: usize,
    /// Per-zone budget entries, in layout order.
    pub zone_allocations: Vec<ZoneAllocation>,
}

impl MemoryBudget {
    /// Default budget for a shipping game: 1 GiB split across all zones.
    pub fn default_game_engine() -> Self {
        Self {
            total_size: GB,
            zone_allocations: vec![
                //              zone                     share  min        max         grow
                ZoneAllocation { zone: MemoryZone::FrameTemp,   percentage: 0.05, min_size: 4 * MB,   max_size: 32 * MB,  can_grow: true },
                ZoneAllocation { zone: MemoryZone::ThreadLocal, percentage: 0.03, min_size: 2 * MB,   max_size: 16 * MB,  can_grow: true },
                ZoneAllocation { zone: MemoryZone::Entities,    percentage: 0.20, min_size: 32 * MB,  max_size: 256 * MB, can_grow: true },
                ZoneAllocation { zone: MemoryZone::Physics,     percentage: 0.10, min_size: 16 * MB,  max_size: 128 * MB, can_grow: true },
                ZoneAllocation { zone: MemoryZone::Rendering,   percentage: 0.20, min_size: 64 * MB,  max_size: 384 * MB, can_grow: true },
                ZoneAllocation { zone: MemoryZone::Assets,      percentage: 0.25, min_size: 128 * MB, max_size: 512 * MB, can_grow: false },
                ZoneAllocation { zone: MemoryZone::Audio,       percentage: 0.05, min_size: 8 * MB,   max_size: 64 * MB,  can_grow: true },
                ZoneAllocation { zone: MemoryZone::General,     percentage: 0.10, min_size: 16 * MB,  max_size: 128 * MB, can_grow: true },
                ZoneAllocation { zone: MemoryZone::Debug,       percentage: 0.02, min_size: 2 * MB,   max_size: 16 * MB,  can_grow: true },
            ],
        }
    }

    /// Budget for the editor: 2 GiB with a heavier Assets share.
    pub fn default_editor() -> Self {
        Self {
            total_size: 2 * GB,
            zone_allocations: vec![
                ZoneAllocation { zone: MemoryZone::FrameTemp,   percentage: 0.03, min_size: 8 * MB,   max_size: 64 * MB,  can_grow: true },
                ZoneAllocation { zone: MemoryZone::ThreadLocal, percentage: 0.02, min_size: 4 * MB,   max_size: 32 * MB,  can_grow: true },
                ZoneAllocation { zone: MemoryZone::Entities,    percentage: 0.15, min_size: 64 * MB,  max_size: 384 * MB, can_grow: true },
                ZoneAllocation { zone: MemoryZone::Physics,     percentage: 0.05, min_size: 16 * MB,  max_size: 128 * MB, can_grow: true },
                ZoneAllocation { zone: MemoryZone::Rendering,   percentage: 0.20, min_size: 128 * MB, max_size: 512 * MB, can_grow: true },
                ZoneAllocation { zone: MemoryZone::Assets,      percentage: 0.40, min_size: 256 * MB, max_size: GB,       can_grow: false },
                ZoneAllocation { zone: MemoryZone::Audio,       percentage: 0.03, min_size: 8 * MB,   max_size: 64 * MB,  can_grow: true },
                ZoneAllocation { zone: MemoryZone::General,     percentage: 0.10, min_size: 32 * MB,  max_size: 256 * MB, can_grow: true },
                ZoneAllocation { zone: MemoryZone::Debug,       percentage: 0.02, min_size: 4 * MB,   max_size: 32 * MB,  can_grow: true },
            ],
        }
    }

    /// Budget for memory-constrained mobile targets: 512 MiB, no Debug zone.
    pub fn default_mobile() -> Self {
        Self {
            total_size: 512 * MB,
            zone_allocations: vec![
                ZoneAllocation { zone: MemoryZone::FrameTemp,   percentage: 0.05, min_size: 2 * MB,  max_size: 8 * MB,   can_grow: true },
                ZoneAllocation { zone: MemoryZone::ThreadLocal, percentage: 0.02, min_size: MB,      max_size: 4 * MB,   can_grow: true },
                ZoneAllocation { zone: MemoryZone::Entities,    percentage: 0.20, min_size: 16 * MB, max_size: 64 * MB,  can_grow: true },
                ZoneAllocation { zone: MemoryZone::Physics,     percentage: 0.10, min_size: 8 * MB,  max_size: 32 * MB,  can_grow: true },
                ZoneAllocation { zone: MemoryZone::Rendering,   percentage: 0.25, min_size: 32 * MB, max_size: 128 * MB, can_grow: true },
                ZoneAllocation { zone: MemoryZone::Assets,      percentage: 0.30, min_size: 64 * MB, max_size: 192 * MB, can_grow: false },
                ZoneAllocation { zone: MemoryZone::Audio,       percentage: 0.05, min_size: 4 * MB,  max_size: 16 * MB,  can_grow: true },
                ZoneAllocation { zone: MemoryZone::General,     percentage: 0.08, min_size: 8 * MB,  max_size: 32 * MB,  can_grow: true },
                ZoneAllocation { zone: MemoryZone::Debug,       percentage: 0.00, min_size: 0,       max_size: 0,        can_grow: false },
            ],
        }
    }

    /// Returns the budget entry for `zone`, if one was declared.
    pub fn allocation_for(&self, zone: MemoryZone) -> Option<&ZoneAllocation> {
        self.zone_allocations.iter().find(|a| a.zone == zone)
    }

    /// Effective byte size of `zone`: `total_size * percentage`, clamped
    /// to the entry's `[min_size, max_size]`. Returns 0 for zones without
    /// a budget entry, and for entries whose clamp is inverted
    /// (`min_size > max_size`) — those budgets are rejected outright at
    /// arena initialization.
    pub fn zone_size(&self, zone: MemoryZone) -> usize {
        let Some(alloc) = self.allocation_for(zone) else {
            return 0;
        };
        if alloc.min_size > alloc.max_size {
            log::error!(
                "zone {zone}: min_size {} exceeds max_size {}; entry is unusable",
                alloc.min_size,
                alloc.max_size
            );
            return 0;
        }
        let scaled = (self.total_size as f64 * f64::from(alloc.percentage)) as usize;
        scaled.clamp(alloc.min_size, alloc.max_size)
    }

    /// Sum of all effective zone sizes. The arena layout needs this to fit
    /// inside `total_size`; min-clamps can push it past the total on small
    /// budgets, which the manager rejects at initialization.
    pub fn required_size(&self) -> usize {
        self.zone_allocations
            .iter()
            .map(|a| self.zone_size(a.zone))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zone_size_applies_min_clamp() {
        // 30% of 1 MiB is far below the 10 MiB floor.
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
        assert_eq!(budget.zone_size(MemoryZone::Assets), 10 * MB);
    }

    #[test]
    fn zone_size_applies_max_clamp() {
        // 5% of 1 GiB is ~51 MiB, above the 32 MiB cap.
        let budget = MemoryBudget {
            total_size: GB,
            zone_allocations: vec![ZoneAllocation {
                zone: MemoryZone::FrameTemp,
                percentage: 0.05,
                min_size: 4 * MB,
                max_size: 32 * MB,
                can_grow: true,
            }],
        };
        assert_eq!(budget.zone_size(MemoryZone::FrameTemp), 32 * MB);
    }

    #[test]
    fn zone_size_within_bounds_is_scaled() {
        let budget = MemoryBudget {
            total_size: GB,
            zone_allocations: vec![ZoneAllocation {
                zone: MemoryZone::Assets,
                percentage: 0.25,
                min_size: 128 * MB,
                max_size: 512 * MB,
                can_grow: false,
            }],
        };
        // 0.25 is exact in binary: exactly a quarter of the arena.
        assert_eq!(budget.zone_size(MemoryZone::Assets), 256 * MB);
    }

    #[test]
    fn inverted_clamp_entry_is_unusable_not_a_panic() {
        // min > max can arrive from hand-written config files.
        let budget = MemoryBudget {
            total_size: GB,
            zone_allocations: vec![ZoneAllocation {
                zone: MemoryZone::General,
                percentage: 0.10,
                min_size: 16 * MB,
                max_size: 8 * MB,
                can_grow: true,
            }],
        };
        assert_eq!(budget.zone_size(MemoryZone::General), 0);
        assert_eq!(budget.required_size(), 0);
    }

    #[test]
    fn zone_without_entry_has_zero_size() {
        let budget = MemoryBudget {
            total_size: GB,
            zone_allocations: vec![],
        };
        assert_eq!(budget.zone_size(MemoryZone::Physics), 0);
    }

    #[test]
    fn default_game_engine_covers_every_zone() {
        let budget = MemoryBudget::default_game_engine();
        assert_eq!(budget.zone_allocations.len(), MemoryZone::COUNT);
        for zone in MemoryZone::ALL {
            assert!(budget.allocation_for(zone).is_some(), "missing {zone}");
        }
        // Every zone size respects its own clamp.
        for alloc in &budget.zone_allocations {
            let size = budget.zone_size(alloc.zone);
            assert!(size >= alloc.min_size && size <= alloc.max_size);
        }
    }

    #[test]
    fn presets_fit_their_own_reservation() {
        for budget in [
            MemoryBudget::default_game_engine(),
            MemoryBudget::default_editor(),
            MemoryBudget::default_mobile(),
        ] {
            assert!(
                budget.required_size() <= budget.total_size,
                "preset over-subscribes: {} > {}",
                budget.required_size(),
                budget.total_size
            );
        }
    }

    #[test]
    fn mobile_budget_disables_debug_zone() {
        let budget = MemoryBudget::default_mobile();
        assert_eq!(budget.zone_size(MemoryZone::Debug), 0);
        assert!(budget.required_size() <= budget.total_size);
    }

    #[test]
    fn budget_round_trips_through_json() {
        let budget = MemoryBudget::default_game_engine();
        let json = serde_json::to_string(&budget).unwrap();
        let parsed: MemoryBudget = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, budget);
    }

    #[test]
    fn budget_loads_from_handwritten_config() {
        let json = r#"{
            "total_size": 67108864,
            "zone_allocations": [
                {"zone": "General", "percentage": 0.5,
                 "min_size": 1048576, "max_size": 33554432, "can_grow": true}
            ]
        }"#;
        let budget: MemoryBudget = serde_json::from_str(json).unwrap();
        assert_eq!(budget.zone_size(MemoryZone::General), 32 * MB);
    }

    #[test]
    fn zone_indices_are_dense() {
        for (i, zone) in MemoryZone::ALL.iter().enumerate() {
            assert_eq!(zone.index(), i);
        }
    }
}
