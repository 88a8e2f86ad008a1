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

//! Traits and data structures for active resource monitoring.
//!
//! A monitor actively polls a resource (here: the global arena) to get a
//! snapshot of its state. Monitors live in the implementation crate; this
//! module only defines the contract so telemetry consumers can hold a
//! collection of `dyn ResourceMonitor` without knowing the concrete types.

use std::borrow::Cow;
use std::fmt::Debug;

/// The core trait for a resource monitor.
///
/// A `ResourceMonitor` is a stateful object that knows how to query one
/// specific resource. A telemetry service holds a collection of these and
/// periodically calls `update` followed by `get_usage_report`.
pub trait ResourceMonitor: Send + Sync + Debug + 'static {
    /// Returns a unique, human-readable identifier for this monitor.
    fn monitor_id(&self) -> Cow<'static, str>;

    /// Returns the general type of resource being monitored.
    fn resource_type(&self) -> MonitoredResourceType;

    /// Returns a snapshot of the current usage of the monitored resource.
    fn get_usage_report(&self) -> ResourceUsageReport;

    /// Allows downcasting to a concrete monitor type.
    fn as_any(&self) -> &dyn std::any::Any;

    /// Polls the resource and refreshes internal state. The default is a
    /// no-op for monitors that update passively.
    fn update(&self) {}
}

/// The types of resources that can be monitored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonitoredResourceType {
    /// Main system RAM.
    SystemRam,
    /// The engine's zone-partitioned arena.
    Arena,
}

/// A generic, unified report of resource usage in bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceUsageReport {
    /// Bytes currently in use.
    pub current_bytes: u64,
    /// Peak bytes ever in use simultaneously, if tracked.
    pub peak_bytes: Option<u64>,
    /// Total capacity of the resource in bytes, if known.
    pub total_capacity_bytes: Option<u64>,
}

/// A detailed report of arena usage and allocator activity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArenaReport {
    /// Bytes of arena memory currently handed out to allocators.
    pub current_usage_bytes: usize,
    /// Peak bytes ever handed out simultaneously.
    pub peak_usage_bytes: usize,
    /// Total bytes reserved from the OS.
    pub reserved_bytes: usize,
    /// Number of live registered allocators.
    pub allocator_count: usize,
    /// Sum of active allocations across registered allocators.
    pub active_allocations: usize,
    /// Number of times this report has been sampled.
    pub sample_count: u64,
}

impl ArenaReport {
    /// Current usage in mebibytes.
    pub fn current_usage_mb(&self) -> f64 {
        self.current_usage_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Peak usage in mebibytes.
    pub fn peak_usage_mb(&self) -> f64 {
        self.peak_usage_bytes as f64 / (1024.0 * 1024.0)
    }

    /// Fraction of the reservation currently in use, in `[0.0, 1.0]`.
    pub fn utilization(&self) -> f64 {
        if self.reserved_bytes > 0 {
            self.current_usage_bytes as f64 / self.reserved_bytes as f64
        } else {
            0.0
        }
    }
}
