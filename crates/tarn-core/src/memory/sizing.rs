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

//! Size constants and the per-kind size policy for allocator creation.

use super::allocator::AllocatorKind;

/// Byte-size constants used across the memory subsystem.
pub mod sizes {
    /// One kibibyte.
    pub const KB: usize = 1024;
    /// One mebibyte.
    pub const MB: usize = 1024 * KB;
    /// One gibibyte.
    pub const GB: usize = 1024 * MB;

    /// Recommended minimum for very small systems.
    pub const MIN_TINY_ALLOCATOR: usize = 64 * KB;
    /// Recommended minimum for small systems.
    pub const MIN_SMALL_ALLOCATOR: usize = 256 * KB;
    /// Recommended minimum for medium systems.
    pub const MIN_MEDIUM_ALLOCATOR: usize = MB;
    /// Recommended minimum for large systems.
    pub const MIN_LARGE_ALLOCATOR: usize = 16 * MB;
    /// Recommended minimum for huge systems.
    pub const MIN_HUGE_ALLOCATOR: usize = 64 * MB;

    /// Upper bound for a single allocator.
    pub const MAX_ALLOCATOR_SIZE: usize = 256 * MB;

    /// Default stack allocator size.
    pub const DEFAULT_STACK_SIZE: usize = 2 * MB;
    /// Default pool allocator size.
    pub const DEFAULT_POOL_SIZE: usize = 4 * MB;
    /// Default heap allocator size.
    pub const DEFAULT_HEAP_SIZE: usize = 32 * MB;
    /// Default thread-local allocator size.
    pub const DEFAULT_THREAD_SIZE: usize = MB;

    /// Absolute floor below which no allocator is worth creating.
    pub const ABSOLUTE_MIN: usize = 4 * KB;
}

/// Returns the default size used when a caller passes `size == 0` (or an
/// out-of-range size) to an allocator factory.
pub const fn default_size(kind: AllocatorKind) -> usize {
    match kind {
        AllocatorKind::Stack => sizes::DEFAULT_STACK_SIZE,
        AllocatorKind::Pool => sizes::DEFAULT_POOL_SIZE,
        AllocatorKind::Heap => sizes::DEFAULT_HEAP_SIZE,
        AllocatorKind::ThreadLocal => sizes::DEFAULT_THREAD_SIZE,
        AllocatorKind::Linear => sizes::MIN_MEDIUM_ALLOCATOR,
    }
}

/// Checks a requested allocator size against the per-kind recommended
/// bounds.
pub fn validate_size(requested: usize, kind: AllocatorKind) -> bool {
    if requested < sizes::ABSOLUTE_MIN {
        return false;
    }
    match kind {
        AllocatorKind::Stack => {
            (sizes::MIN_SMALL_ALLOCATOR..=sizes::MAX_ALLOCATOR_SIZE).contains(&requested)
        }
        // Pools hold fixed-size objects and may legitimately be tiny.
        AllocatorKind::Pool => {
            (sizes::ABSOLUTE_MIN..=sizes::MAX_ALLOCATOR_SIZE).contains(&requested)
        }
        AllocatorKind::Heap => {
            (sizes::MIN_MEDIUM_ALLOCATOR..=sizes::MAX_ALLOCATOR_SIZE).contains(&requested)
        }
        AllocatorKind::ThreadLocal => {
            (sizes::MIN_SMALL_ALLOCATOR..=sizes::MIN_LARGE_ALLOCATOR).contains(&requested)
        }
        AllocatorKind::Linear => {
            (sizes::MIN_TINY_ALLOCATOR..=sizes::MAX_ALLOCATOR_SIZE).contains(&requested)
        }
    }
}

/// Substitutes the kind's default for out-of-range sizes.
///
/// This mirrors the engine's fast-prototyping policy: an invalid request
/// is readjusted rather than refused. Callers that want a hard failure
/// should check [`validate_size`] themselves; the factories log a warning
/// whenever a substitution happens.
pub fn adjust_to_recommended(requested: usize, kind: AllocatorKind) -> usize {
    if validate_size(requested, kind) {
        requested
    } else {
        default_size(kind)
    }
}
