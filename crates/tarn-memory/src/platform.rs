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

//! OS memory reservation.
//!
//! The two functions here are the only points where the memory subsystem
//! touches the platform: one call to reserve a read/write range and one
//! to release it. Reservations are cache-line aligned; debug builds get
//! zero-initialized memory so stale-data bugs surface deterministically.

use std::alloc::{alloc, alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use tarn_core::memory::align_up;

/// Alignment of every reservation (one cache line).
pub const RESERVATION_ALIGN: usize = 64;

/// Reserves `size` read/write bytes from the OS.
///
/// Returns `None` if `size` is zero or the OS refuses the allocation.
pub fn reserve(size: usize) -> Option<NonNull<u8>> {
    if size == 0 {
        return None;
    }
    let padded = align_up(size, RESERVATION_ALIGN);
    let layout = Layout::from_size_align(padded, RESERVATION_ALIGN).ok()?;
    // SAFETY: layout has non-zero size and a valid power-of-two alignment.
    let ptr = unsafe {
        if cfg!(debug_assertions) {
            alloc_zeroed(layout)
        } else {
            alloc(layout)
        }
    };
    NonNull::new(ptr)
}

/// Releases a range previously returned by [`reserve`] with the same
/// `size`.
///
/// # Safety
///
/// `ptr` must come from a [`reserve`] call with this exact `size`, and
/// must not be used afterwards.
pub unsafe fn release(ptr: NonNull<u8>, size: usize) {
    let padded = align_up(size, RESERVATION_ALIGN);
    // The layout recomputes identically to the one used in reserve().
    let layout = Layout::from_size_align_unchecked(padded, RESERVATION_ALIGN);
    dealloc(ptr.as_ptr(), layout);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_and_release_round_trip() {
        let ptr = reserve(4096).expect("reservation failed");
        assert_eq!(ptr.as_ptr() as usize % RESERVATION_ALIGN, 0);
        // The range must be writable.
        unsafe {
            ptr.as_ptr().write(0xAB);
            ptr.as_ptr().add(4095).write(0xCD);
            release(ptr, 4096);
        }
    }

    #[test]
    fn zero_size_reservation_is_refused() {
        assert!(reserve(0).is_none());
    }

    #[cfg(debug_assertions)]
    #[test]
    fn debug_reservations_are_zeroed() {
        let ptr = reserve(1024).expect("reservation failed");
        let all_zero = (0..1024).all(|i| unsafe { ptr.as_ptr().add(i).read() } == 0);
        assert!(all_zero);
        unsafe { release(ptr, 1024) };
    }
}
