// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_is_monotonic() {
    let clock = SystemClock::new();
    let t1 = clock.monotonic_ms();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let t2 = clock.monotonic_ms();
    assert!(t2 >= t1);
}

#[test]
fn fake_clock_can_be_advanced() {
    let clock = FakeClock::new();
    let t1 = clock.monotonic_ms();
    clock.advance(Duration::from_secs(10));
    assert_eq!(clock.monotonic_ms(), t1 + 10_000);
}

#[test]
fn fake_clock_is_cloneable_and_shared() {
    let clock1 = FakeClock::new();
    let clock2 = clock1.clone();
    clock2.set_ms(500);
    assert_eq!(clock1.monotonic_ms(), 500);
}
