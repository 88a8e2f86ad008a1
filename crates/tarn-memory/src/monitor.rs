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

//! A [`ResourceMonitor`] that samples the arena manager.

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tarn_core::telemetry::{
    ArenaReport, MonitoredResourceType, ResourceMonitor, ResourceUsageReport,
};

use crate::manager::MemoryManager;

/// Polls a [`MemoryManager`] and caches the latest [`ArenaReport`].
///
/// The monitor holds a shared handle to the manager, not ownership: a
/// telemetry service can keep sampling while the rest of the engine
/// drives allocations.
#[derive(Debug)]
pub struct ArenaMonitor {
    manager: Arc<MemoryManager>,
    latest: Mutex<ArenaReport>,
    sample_count: AtomicU64,
}

impl ArenaMonitor {
    /// Creates a monitor over `manager`. No sampling happens until the
    /// first [`ResourceMonitor::update`] call.
    pub fn new(manager: Arc<MemoryManager>) -> Self {
        Self {
            manager,
            latest: Mutex::new(ArenaReport::default()),
            sample_count: AtomicU64::new(0),
        }
    }

    /// The most recent sampled report. Zeroed before the first `update`.
    pub fn latest_report(&self) -> ArenaReport {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ResourceMonitor for ArenaMonitor {
    fn monitor_id(&self) -> Cow<'static, str> {
        Cow::Borrowed("arena_monitor")
    }

    fn resource_type(&self) -> MonitoredResourceType {
        MonitoredResourceType::Arena
    }

    fn get_usage_report(&self) -> ResourceUsageReport {
        let report = self.latest_report();
        ResourceUsageReport {
            current_bytes: report.current_usage_bytes as u64,
            peak_bytes: Some(report.peak_usage_bytes as u64),
            total_capacity_bytes: Some(report.reserved_bytes as u64),
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn update(&self) {
        let stats = self.manager.global_stats();
        let samples = self.sample_count.fetch_add(1, Ordering::Relaxed) + 1;
        let report = ArenaReport {
            current_usage_bytes: stats.total_used,
            peak_usage_bytes: stats.peak_usage,
            reserved_bytes: stats.total_reserved,
            allocator_count: stats.allocator_count,
            active_allocations: stats.active_allocation_count,
            sample_count: samples,
        };
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = report;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarn_core::memory::sizes::MB;
    use tarn_core::memory::{MemoryBudget, MemoryZone, ZoneAllocation};

    fn initialized_manager() -> Arc<MemoryManager> {
        let manager = Arc::new(MemoryManager::new());
        let budget = MemoryBudget {
            total_size: 32 * MB,
            zone_allocations: vec![ZoneAllocation {
                zone: MemoryZone::General,
                percentage: 0.5,
                min_size: MB,
                max_size: 16 * MB,
                can_grow: true,
            }],
        };
        manager.initialize(&budget).unwrap();
        manager
    }

    #[test]
    fn report_is_zero_before_first_update() {
        let monitor = ArenaMonitor::new(initialized_manager());
        let report = monitor.latest_report();
        assert_eq!(report.current_usage_bytes, 0);
        assert_eq!(report.sample_count, 0);
    }

    #[test]
    fn update_samples_the_manager() {
        let manager = initialized_manager();
        let monitor = ArenaMonitor::new(Arc::clone(&manager));

        manager.allocate_from_zone(MemoryZone::General, MB).unwrap();
        monitor.update();

        let report = monitor.latest_report();
        assert_eq!(report.current_usage_bytes, MB);
        assert_eq!(report.reserved_bytes, 32 * MB);
        assert_eq!(report.sample_count, 1);

        monitor.update();
        assert_eq!(monitor.latest_report().sample_count, 2);
    }

    #[test]
    fn usage_report_mirrors_the_latest_sample() {
        let manager = initialized_manager();
        let monitor = ArenaMonitor::new(Arc::clone(&manager));
        manager.allocate_from_zone(MemoryZone::General, 2 * MB).unwrap();
        monitor.update();

        let usage = monitor.get_usage_report();
        assert_eq!(usage.current_bytes, (2 * MB) as u64);
        assert_eq!(usage.total_capacity_bytes, Some((32 * MB) as u64));
    }

    #[test]
    fn monitor_identity() {
        let monitor = ArenaMonitor::new(initialized_manager());
        assert_eq!(monitor.monitor_id(), "arena_monitor");
        assert_eq!(monitor.resource_type(), MonitoredResourceType::Arena);
        assert!(monitor.as_any().downcast_ref::<ArenaMonitor>().is_some());
    }
}
