//! Fuzz target: retained-memory image decoder
//!
//! RTC memory after a brown-out or a firmware change can hold anything.
//! Drives `retained::decode` with arbitrary bytes and verifies:
//! - No panics under arbitrary byte inputs
//! - Any image that decodes re-encodes to an image that decodes to the
//!   same state
//!
//! cargo fuzz run fuzz_retained_image

#![no_main]

use feedfish::retained;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(state) = retained::decode(data) else {
        return;
    };
    let image = retained::encode(&state).expect("decoded state must re-encode");
    let again = retained::decode(&image).expect("re-encoded image must decode");
    // NaN battery readings never compare equal; compare the bits instead.
    assert_eq!(
        again.last_battery_level.to_bits(),
        state.last_battery_level.to_bits()
    );
    assert_eq!(again.boot_count, state.boot_count);
    assert_eq!(again.last_sync_time, state.last_sync_time);
    assert_eq!(again.last_wakeup_reason, state.last_wakeup_reason);
    assert_eq!(again.feed_button_state, state.feed_button_state);
});
