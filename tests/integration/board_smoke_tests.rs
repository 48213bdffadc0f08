//! Smoke tests running the real adapter stack in host simulation.
//!
//! `FeederBoard::simulated` wires the battery sensor, indicator, Wi-Fi,
//! clock, MQTT, sleep controller, and RTC store twins together, so these
//! tests cover the same composition `main` builds on hardware.

use feedfish::adapters::board::FeederBoard;
use feedfish::adapters::log_sink::LogEventSink;
use feedfish::adapters::retained_store::RtcRetainedStore;
use feedfish::app::service::BootDispatcher;
use feedfish::adapters::wifi::WifiState;
use feedfish::config::FeederConfig;
use feedfish::retained::{self, Level, WakeCause, WallClock};
use feedfish::scheduler::SleepReason;

const HALF_SIX: WallClock = WallClock::new(2025, 3, 14, 6, 30, 0);

fn config() -> FeederConfig {
    FeederConfig {
        wifi_ssid: heapless::String::try_from("FeederNet").unwrap(),
        wifi_password: heapless::String::try_from("fishfood8").unwrap(),
        ..Default::default()
    }
}

#[test]
fn simulated_board_completes_a_timer_cycle() {
    let cfg = config();
    let board = FeederBoard::simulated(&cfg, WakeCause::Timer, Level::High, Some(HALF_SIX));
    let mut dispatcher = BootDispatcher::new(cfg, board, LogEventSink::new());
    let plan = dispatcher.run();

    assert_eq!(plan.reason, SleepReason::Scheduled { target_hour: 19.0 });
    assert_eq!(plan.seconds, 45_000);

    let (board, _sink) = dispatcher.into_parts();
    assert_eq!(board.sleep.armed_timer_secs(), Some(45_000));
    assert_eq!(board.sleep.armed_level(), Some(Level::Low));
    assert_eq!(board.sleep.suspend_count(), 1);
    assert!(board.indicator.is_on() && board.indicator.is_held());
    assert_eq!(board.wifi.state(), WifiState::Disconnected);

    let sent = board.mqtt.sim_published();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0],
        r#"{"time":"2025-03-14 06:30:00","wakeup_reason":4,"battery":3.9}"#
    );

    let state = retained::decode(board.store.image()).unwrap();
    assert_eq!(state.boot_count, 1);
    assert_eq!(state.last_sync_time, HALF_SIX);
    assert_eq!(state.last_wakeup_reason, WakeCause::Timer);

    // Only the post-measure settle; the clock was valid on the first poll.
    assert_eq!(board.sim_elapsed_ms(), 900);
}

#[test]
fn identical_timer_cycles_schedule_identically() {
    let cfg = config();
    let board = FeederBoard::simulated(&cfg, WakeCause::Timer, Level::High, Some(HALF_SIX));
    let mut first = BootDispatcher::new(cfg.clone(), board, LogEventSink::new());
    let first_plan = first.run();
    let (board, _) = first.into_parts();
    let image = *board.store.image();

    let mut next = FeederBoard::simulated(&cfg, WakeCause::Timer, Level::High, Some(HALF_SIX));
    next.store = RtcRetainedStore::with_image(image);
    let mut second = BootDispatcher::new(cfg, next, LogEventSink::new());
    let second_plan = second.run();

    assert_eq!(second.retained().last_sync_time, HALF_SIX);
    assert_eq!(second.retained().boot_count, 2);
    assert_eq!(second_plan.seconds, first_plan.seconds);
    assert_eq!(second_plan.reason, first_plan.reason);
    assert_eq!(second_plan, first_plan);
}

#[test]
fn retained_image_carries_into_the_next_cycle() {
    let cfg = config();
    let board = FeederBoard::simulated(&cfg, WakeCause::Undefined, Level::High, Some(HALF_SIX));
    let mut first = BootDispatcher::new(cfg.clone(), board, LogEventSink::new());
    first.run();
    let (board, _) = first.into_parts();
    let image = *board.store.image();

    let mut next = FeederBoard::simulated(&cfg, WakeCause::ExternalSignal, Level::Low, Some(HALF_SIX));
    next.store = RtcRetainedStore::with_image(image);
    let mut second = BootDispatcher::new(cfg, next, LogEventSink::new());
    second.run();

    assert_eq!(second.retained().boot_count, 2);
    assert_eq!(second.retained().feed_button_state, Level::Low);
    let (board, _) = second.into_parts();
    let state = retained::decode(board.store.image()).unwrap();
    assert_eq!(state.boot_count, 2);
    assert_eq!(state.last_wakeup_reason, WakeCause::ExternalSignal);
}

#[test]
fn missing_credentials_fall_back_to_recovery() {
    let cfg = FeederConfig {
        wifi_ssid: heapless::String::new(),
        ..Default::default()
    };
    let board = FeederBoard::simulated(&cfg, WakeCause::Timer, Level::High, Some(HALF_SIX));
    let mut dispatcher = BootDispatcher::new(cfg, board, LogEventSink::new());
    let plan = dispatcher.run();

    assert_eq!(plan.reason, SleepReason::Recovery);
    assert_eq!(plan.seconds, 600);
    assert!(dispatcher.retained().wifi_failed);
    assert!(dispatcher.device().mqtt.sim_published().is_empty());
}

#[test]
fn unreachable_network_and_low_cell_still_sleep() {
    let cfg = FeederConfig {
        low_battery_alert_limit: Some(2),
        ..config()
    };
    let mut board = FeederBoard::simulated(&cfg, WakeCause::Timer, Level::High, Some(HALF_SIX));
    board.wifi.sim_set_reachable(false);
    board.battery.sim_set_volts(2.9);
    let mut dispatcher = BootDispatcher::new(cfg, board, LogEventSink::new());
    let plan = dispatcher.run();

    assert_eq!(plan.reason, SleepReason::BatteryExhausted);
    let board = dispatcher.device();
    assert!(!board.indicator.is_on());
    assert_eq!(board.sleep.suspend_count(), 1);
    // settle + two blinks of 2 × 500 ms
    assert_eq!(board.sim_elapsed_ms(), 900 + 2_000);
}
