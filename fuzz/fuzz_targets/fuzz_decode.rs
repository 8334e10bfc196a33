// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use anidex::intelligence::{OrientationPolicy, Photo};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must fail cleanly, never panic
    if let Ok(photo) = Photo::decode(data) {
        let (w, h) = photo.dimensions();
        if w <= 512 && h <= 512 {
            let _ = photo.to_upright(OrientationPolicy::Strict);
        }
    }
});
