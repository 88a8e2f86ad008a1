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

// Tarn Memory Sandbox
// Drives the arena manager through a simulated game session.

use std::sync::Arc;

use anyhow::{Context, Result};
use tarn_core::memory::sizes::KB;
use tarn_core::memory::{Allocator, MemoryBudget, MemoryZone};
use tarn_core::telemetry::ResourceMonitor;
use tarn_memory::{ArenaMonitor, MemoryManager, StackAllocatorScope};

const FRAMES: usize = 120;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let manager = Arc::new(MemoryManager::new());
    manager
        .initialize(&MemoryBudget::default_game_engine())
        .context("arena initialization failed")?;

    let monitor = ArenaMonitor::new(Arc::clone(&manager));

    let frame_temp = manager
        .create_stack_allocator(MemoryZone::FrameTemp, 0, "frame_temp")
        .context("creating the frame-temp allocator")?;
    let entities = manager
        .create_stack_allocator(MemoryZone::Entities, 8 * 1024 * KB, "entity_storage")
        .context("creating the entity allocator")?;

    for frame in 0..FRAMES {
        let scope = StackAllocatorScope::new(&frame_temp);

        // Per-frame scratch: command lists, sort keys, culling output.
        for _ in 0..256 {
            if frame_temp.allocate(640, 16).is_none() {
                log::warn!("frame {frame}: frame-temp scratch exhausted");
                break;
            }
        }

        // A trickle of persistent spawns.
        if frame % 10 == 0 && entities.allocate(4 * KB, 64).is_none() {
            log::warn!("frame {frame}: entity storage exhausted");
        }

        drop(scope);

        if frame % 30 == 0 {
            monitor.update();
            let report = monitor.latest_report();
            log::info!(
                "frame {frame}: arena {:.1} MB used ({:.1}%), {} allocators",
                report.current_usage_mb(),
                report.utilization() * 100.0,
                report.allocator_count
            );
        }
    }

    if !manager.validate_all_allocators() {
        anyhow::bail!("allocator validation failed");
    }

    println!("{}", manager.debug_report());
    log::info!(
        "frame-temp peak: {} KB, entity storage: {} KB live",
        frame_temp.stats().peak_usage / KB,
        entities.used_memory() / KB
    );

    drop(frame_temp);
    drop(entities);
    let leaks = manager.check_memory_leaks();
    if leaks > 0 {
        log::warn!("{leaks} allocators still live before shutdown");
    }
    manager.shutdown();
    Ok(())
}
