//! Fuzz target: wake scheduler
//!
//! Builds a scheduler from arbitrary targets and lead window and queries it
//! with an arbitrary hour, verifying:
//! - No panics for any float, including NaN and infinities
//! - A configured scheduler always produces a plan
//! - The plan never exceeds a day plus the lead window
//!
//! cargo fuzz run fuzz_wake_schedule

#![no_main]

use feedfish::scheduler::WakeScheduler;
use libfuzzer_sys::fuzz_target;

fn f32_at(data: &[u8], i: usize) -> f32 {
    let mut b = [0u8; 4];
    for (k, slot) in b.iter_mut().enumerate() {
        *slot = data.get(i * 4 + k).copied().unwrap_or(0);
    }
    f32::from_le_bytes(b)
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 12 {
        return;
    }
    let hour = f32_at(data, 0);
    let lead = f32_at(data, 1);
    let targets: Vec<f32> = (2..6).map(|i| f32_at(data, i)).collect();

    let s = WakeScheduler::new(&targets, lead);
    let Some(t) = s.next_wake_target(hour) else {
        assert!(s.targets().is_empty());
        return;
    };
    assert!(s.targets().contains(&t.target_hour));
    if lead.is_finite() && lead >= 0.0 {
        assert!(t.seconds as f64 <= (24.0 + f64::from(lead)) * 3600.0 + 1.0);
    }
});
