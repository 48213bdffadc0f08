//! Integration tests for the BootDispatcher → FSM → ports pipeline.
//!
//! Each test runs one full wake cycle against a [`MockDevice`] and checks
//! the plan it armed, the snapshot it persisted, and the port calls it made.

use crate::mock_device::{DeviceCall, MockDevice, RecordingSink};

use feedfish::app::events::CycleEvent;
use feedfish::app::service::BootDispatcher;
use feedfish::config::FeederConfig;
use feedfish::error::{ConnectivityError, Error, PublishError, StorageError, TimeSyncError};
use feedfish::fsm::StateId;
use feedfish::retained::{Level, RetainedState, WakeCause, WallClock};
use feedfish::scheduler::{SleepPlan, SleepReason};

const HALF_SIX: WallClock = WallClock::new(2025, 3, 14, 6, 30, 0);
const TEN_AM: WallClock = WallClock::new(2025, 3, 14, 10, 0, 0);
const LAST_EVENING: WallClock = WallClock::new(2025, 3, 13, 19, 0, 0);

fn run_cycle(config: FeederConfig, dev: MockDevice) -> (SleepPlan, MockDevice, RecordingSink) {
    let mut dispatcher = BootDispatcher::new(config, dev, RecordingSink::new());
    let plan = dispatcher.run();
    assert_eq!(dispatcher.state(), StateId::Sleeping);
    let (dev, sink) = dispatcher.into_parts();
    (plan, dev, sink)
}

fn stale_history() -> RetainedState {
    RetainedState {
        boot_count: 41,
        wifi_failed: true,
        mqtt_failed: true,
        sync_time_failed: true,
        last_sync_time: LAST_EVENING,
        last_wakeup_reason: WakeCause::Timer,
        last_battery_level: 3.7,
        feed_button_state: Level::High,
    }
}

// ── Happy paths ──────────────────────────────────────────────

#[test]
fn timer_wake_runs_the_whole_cycle_in_order() {
    let dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX));
    let (plan, dev, _sink) = run_cycle(FeederConfig::default(), dev);

    let payload = r#"{"time":"2025-03-14 06:30:00","wakeup_reason":4,"battery":3.9}"#;
    let persisted = dev.persisted().expect("snapshot persisted");
    assert_eq!(
        dev.calls(),
        vec![
            DeviceCall::ReadButton,
            DeviceCall::Restore,
            DeviceCall::ReadWakeCause,
            DeviceCall::SampleBattery,
            DeviceCall::DelayMs(900),
            DeviceCall::Join,
            DeviceCall::BeginSync,
            DeviceCall::Now,
            DeviceCall::Connect,
            DeviceCall::Publish(payload.to_string()),
            DeviceCall::Disconnect,
            DeviceCall::Leave,
            DeviceCall::SetIndicator(true),
            DeviceCall::Now,
            DeviceCall::Persist(persisted),
            DeviceCall::ArmSignal(Level::Low),
            DeviceCall::ArmTimer(45_000),
            DeviceCall::Suspend,
        ]
    );

    // 06:30 is inside the 3 h lead window of 07:00, so 19:00 is next.
    assert_eq!(
        plan,
        SleepPlan {
            reason: SleepReason::Scheduled { target_hour: 19.0 },
            seconds: 45_000,
            wake_level: Level::Low,
        }
    );
}

#[test]
fn button_wake_turns_indicator_off_and_schedules() {
    let dev = MockDevice::new(WakeCause::ExternalSignal, Level::Low, Some(TEN_AM));
    let (plan, dev, _sink) = run_cycle(FeederConfig::default(), dev);

    assert_eq!(dev.indicator_writes(), vec![false]);
    assert_eq!(plan.reason, SleepReason::Scheduled { target_hour: 19.0 });
    assert_eq!(plan.seconds, 9 * 3600);
    // Button was LOW at boot, so the next HIGH wakes the device.
    assert_eq!(plan.wake_level, Level::High);
    assert_eq!(dev.count(&DeviceCall::ArmSignal(Level::High)), 1);

    let persisted = dev.persisted().unwrap();
    assert_eq!(persisted.feed_button_state, Level::Low);
    assert_eq!(persisted.last_wakeup_reason, WakeCause::ExternalSignal);
}

#[test]
fn first_boot_pulses_indicator_and_sleeps_briefly() {
    let dev = MockDevice::new(WakeCause::Undefined, Level::High, Some(TEN_AM));
    let (plan, dev, sink) = run_cycle(FeederConfig::default(), dev);

    assert_eq!(
        plan,
        SleepPlan::fixed(SleepReason::ColdBoot, 20, Level::Low)
    );
    let on = dev.position(|c| *c == DeviceCall::SetIndicator(true)).unwrap();
    assert_eq!(dev.calls()[on + 1], DeviceCall::DelayMs(1000));
    assert_eq!(dev.calls()[on + 2], DeviceCall::SetIndicator(false));

    let persisted = dev.persisted().unwrap();
    assert_eq!(persisted.boot_count, 1);
    assert_eq!(persisted.last_wakeup_reason, WakeCause::Undefined);

    assert!(sink.events.iter().any(|e| matches!(
        e,
        CycleEvent::Booted { boot_count: 1, restored: false, .. }
    )));
}

#[test]
fn restored_history_is_carried_and_refreshed() {
    let dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX))
        .with_stored(stale_history());
    let (_plan, dev, sink) = run_cycle(FeederConfig::default(), dev);

    let p = dev.persisted().unwrap();
    assert_eq!(p.boot_count, 42);
    assert!(!p.wifi_failed && !p.sync_time_failed && !p.mqtt_failed);
    assert_eq!(p.last_sync_time, HALF_SIX);
    assert!((p.last_battery_level - 3.9).abs() < 1e-6);

    assert!(sink.events.iter().any(|e| matches!(
        e,
        CycleEvent::Booted {
            boot_count: 42,
            previous_cause: WakeCause::Timer,
            last_sync,
            restored: true,
            ..
        } if *last_sync == LAST_EVENING
    )));
}

#[test]
fn boot_count_saturates() {
    let history = RetainedState {
        boot_count: u32::MAX,
        ..Default::default()
    };
    let dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX)).with_stored(history);
    let (_plan, dev, _sink) = run_cycle(FeederConfig::default(), dev);
    assert_eq!(dev.persisted().unwrap().boot_count, u32::MAX);
}

#[test]
fn button_is_read_before_anything_else() {
    let dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX));
    let (_plan, dev, _sink) = run_cycle(FeederConfig::default(), dev);
    assert_eq!(dev.calls()[0], DeviceCall::ReadButton);
}

#[test]
fn state_changes_follow_the_nominal_path() {
    let dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX));
    let (_plan, _dev, sink) = run_cycle(FeederConfig::default(), dev);

    let path: Vec<(StateId, StateId)> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            CycleEvent::StateChanged { from, to } => Some((*from, *to)),
            _ => None,
        })
        .collect();
    assert_eq!(
        path,
        vec![
            (StateId::ColdStart, StateId::Measuring),
            (StateId::Measuring, StateId::Networking),
            (StateId::Networking, StateId::Evaluating),
            (StateId::Evaluating, StateId::Scheduling),
            (StateId::Scheduling, StateId::Sleeping),
        ]
    );
}

// ── Degradation ──────────────────────────────────────────────

#[test]
fn wifi_failure_latches_every_flag_and_takes_recovery_sleep() {
    let mut dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX))
        .with_stored(RetainedState {
            last_sync_time: LAST_EVENING,
            ..Default::default()
        });
    dev.join_result = Err(ConnectivityError::Timeout);
    let (plan, dev, sink) = run_cycle(FeederConfig::default(), dev);

    assert_eq!(plan, SleepPlan::fixed(SleepReason::Recovery, 600, Level::Low));

    let p = dev.persisted().unwrap();
    assert!(p.wifi_failed && p.sync_time_failed && p.mqtt_failed);
    assert_eq!(p.last_sync_time, LAST_EVENING);

    assert_eq!(dev.count(&DeviceCall::BeginSync), 0);
    assert_eq!(dev.count(&DeviceCall::Connect), 0);
    assert_eq!(dev.count(&DeviceCall::Now), 0);
    assert_eq!(dev.count(&DeviceCall::Leave), 1);
    // Recovery leaves the indicator alone.
    assert!(dev.indicator_writes().is_empty());

    assert_eq!(
        sink.failures(),
        vec![Error::Connectivity(ConnectivityError::Timeout)]
    );
}

#[test]
fn sync_timeout_keeps_stale_time_and_still_publishes() {
    let config = FeederConfig {
        time_sync_attempts: 3,
        ..Default::default()
    };
    let dev = MockDevice::new(WakeCause::Timer, Level::High, None).with_stored(RetainedState {
        last_sync_time: LAST_EVENING,
        ..Default::default()
    });
    let (plan, dev, sink) = run_cycle(config, dev);

    assert_eq!(plan.reason, SleepReason::Recovery);
    assert_eq!(plan.seconds, 600);

    let p = dev.persisted().unwrap();
    assert!(p.sync_time_failed);
    assert!(!p.wifi_failed);
    assert!(!p.mqtt_failed);
    assert_eq!(p.last_sync_time, LAST_EVENING);

    assert_eq!(dev.count(&DeviceCall::Now), 3);
    assert_eq!(dev.count(&DeviceCall::DelayMs(500)), 2);
    assert_eq!(
        dev.published(),
        vec![r#"{"time":"2025-03-13 19:00:00","wakeup_reason":4,"battery":3.9}"#.to_string()]
    );
    assert_eq!(
        sink.failures(),
        vec![Error::TimeSync(TimeSyncError::Timeout { attempts: 3 })]
    );
}

#[test]
fn slow_clock_is_polled_until_plausible() {
    let mut dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX));
    dev.clock_polls_needed = 5;
    let (_plan, _dev, sink) = run_cycle(FeederConfig::default(), dev);

    assert!(sink.events.iter().any(|e| matches!(
        e,
        CycleEvent::TimeSynced { attempts: 5, .. }
    )));
}

#[test]
fn sntp_start_failure_counts_as_sync_failure() {
    let mut dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX));
    dev.begin_sync_result = Err(TimeSyncError::StartFailed);
    let (plan, dev, _sink) = run_cycle(FeederConfig::default(), dev);

    assert_eq!(plan.reason, SleepReason::Recovery);
    assert!(dev.persisted().unwrap().sync_time_failed);
    assert_eq!(dev.count(&DeviceCall::Now), 0);
}

#[test]
fn publish_failure_is_recorded_but_never_shortens_sleep() {
    let mut dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX));
    dev.publish_result = Err(PublishError::Rejected);
    let (plan, dev, sink) = run_cycle(FeederConfig::default(), dev);

    assert_eq!(plan.reason, SleepReason::Scheduled { target_hour: 19.0 });
    assert_eq!(plan.seconds, 45_000);
    assert!(dev.persisted().unwrap().mqtt_failed);
    assert_eq!(dev.count(&DeviceCall::Disconnect), 1);
    assert_eq!(sink.failures(), vec![Error::Publish(PublishError::Rejected)]);
}

#[test]
fn broker_unreachable_skips_publish_but_disconnects() {
    let mut dev = MockDevice::new(WakeCause::ExternalSignal, Level::High, Some(TEN_AM));
    dev.connect_result = Err(PublishError::ConnectFailed);
    let (plan, dev, _sink) = run_cycle(FeederConfig::default(), dev);

    assert!(dev.published().is_empty());
    assert_eq!(dev.count(&DeviceCall::Disconnect), 1);
    assert!(dev.persisted().unwrap().mqtt_failed);
    assert_eq!(plan.reason, SleepReason::Scheduled { target_hour: 19.0 });
}

#[test]
fn recovery_takes_precedence_over_the_wake_cause() {
    for cause in [WakeCause::Timer, WakeCause::ExternalSignal, WakeCause::Undefined] {
        let mut dev = MockDevice::new(cause, Level::High, None);
        dev.join_result = Err(ConnectivityError::NoCredentials);
        let (plan, _dev, _sink) = run_cycle(FeederConfig::default(), dev);
        assert_eq!(plan.reason, SleepReason::Recovery, "cause {cause}");
    }
}

// ── Persistence and arming ──────────────────────────────────

#[test]
fn snapshot_is_written_before_wake_sources_and_suspend() {
    let dev = MockDevice::new(WakeCause::ExternalSignal, Level::High, Some(TEN_AM));
    let (_plan, dev, _sink) = run_cycle(FeederConfig::default(), dev);

    let persist = dev.position(|c| matches!(c, DeviceCall::Persist(_))).unwrap();
    let signal = dev.position(|c| matches!(c, DeviceCall::ArmSignal(_))).unwrap();
    let timer = dev.position(|c| matches!(c, DeviceCall::ArmTimer(_))).unwrap();
    let suspend = dev.position(|c| *c == DeviceCall::Suspend).unwrap();
    assert!(persist < signal && signal < timer && timer < suspend);
    assert_eq!(suspend, dev.calls().len() - 1);
}

#[test]
fn persist_failure_still_sleeps() {
    let mut dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX));
    dev.persist_result = Err(StorageError::IoError);
    let (plan, dev, sink) = run_cycle(FeederConfig::default(), dev);

    assert_eq!(dev.count(&DeviceCall::Suspend), 1);
    assert_eq!(dev.count(&DeviceCall::ArmTimer(plan.seconds)), 1);
    assert_eq!(sink.failures(), vec![Error::Storage(StorageError::IoError)]);
}

#[test]
fn sleep_scheduled_event_carries_the_armed_plan() {
    let dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX));
    let (plan, _dev, sink) = run_cycle(FeederConfig::default(), dev);
    assert_eq!(sink.events.last(), Some(&CycleEvent::StateChanged {
        from: StateId::Scheduling,
        to: StateId::Sleeping,
    }));
    assert!(sink.events.contains(&CycleEvent::SleepScheduled(plan)));
}
