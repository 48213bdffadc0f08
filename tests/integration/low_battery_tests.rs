//! Integration tests for the low-battery alert.
//!
//! The alert blinks the indicator while re-sampling the battery.  It exits
//! to Scheduling only on a sample at or above the threshold, or gives up
//! and sleeps once its cycle limit is reached.

use crate::mock_device::{DeviceCall, MockDevice, RecordingSink};

use feedfish::app::events::CycleEvent;
use feedfish::app::service::BootDispatcher;
use feedfish::config::FeederConfig;
use feedfish::fsm::StateId;
use feedfish::error::Error;
use feedfish::retained::{Level, RetainedState, WakeCause, WallClock};
use feedfish::scheduler::{SleepPlan, SleepReason};

const HALF_SIX: WallClock = WallClock::new(2025, 3, 14, 6, 30, 0);

fn run_cycle(config: FeederConfig, dev: MockDevice) -> (SleepPlan, MockDevice, RecordingSink) {
    let mut dispatcher = BootDispatcher::new(config, dev, RecordingSink::new());
    let plan = dispatcher.run();
    let (dev, sink) = dispatcher.into_parts();
    (plan, dev, sink)
}

fn entered(sink: &RecordingSink, state: StateId) -> bool {
    sink.events
        .iter()
        .any(|e| matches!(e, CycleEvent::StateChanged { to, .. } if *to == state))
}

#[test]
fn alert_blinks_until_voltage_recovers() {
    let dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX))
        .with_battery(&[3.0, 3.0, 3.05, 3.2]);
    let (plan, dev, sink) = run_cycle(FeederConfig::default(), dev);

    // Two low re-samples → two full blinks, then the exit turns it off and
    // the timer branch turns it back on for the feed.
    assert_eq!(
        dev.indicator_writes(),
        vec![true, false, true, false, false, true]
    );
    assert_eq!(dev.count(&DeviceCall::SampleBattery), 4);
    assert_eq!(dev.count(&DeviceCall::DelayMs(500)), 4);
    assert!(entered(&sink, StateId::LowBatteryAlert));
    assert!(entered(&sink, StateId::Scheduling));
    assert_eq!(plan.reason, SleepReason::Scheduled { target_hour: 19.0 });

    // The cycle's battery record is the Measuring sample, not the alert's.
    let p = dev.persisted().unwrap();
    assert!((p.last_battery_level - 3.0).abs() < 1e-6);
}

#[test]
fn sample_at_threshold_does_not_alert() {
    let dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX)).with_battery(&[3.1]);
    let (_plan, dev, sink) = run_cycle(FeederConfig::default(), dev);

    assert!(!entered(&sink, StateId::LowBatteryAlert));
    assert_eq!(dev.count(&DeviceCall::SampleBattery), 1);
}

#[test]
fn alert_never_reaches_scheduling_without_recovery() {
    let config = FeederConfig {
        low_battery_alert_limit: Some(3),
        ..Default::default()
    };
    let dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX)).with_battery(&[2.9]);
    let (plan, dev, sink) = run_cycle(config, dev);

    assert!(!entered(&sink, StateId::Scheduling));
    assert_eq!(
        plan,
        SleepPlan::fixed(SleepReason::BatteryExhausted, 3600, Level::Low)
    );
    assert_eq!(dev.indicator_writes().last(), Some(&false));
    assert_eq!(dev.count(&DeviceCall::SetIndicator(true)), 3);
    // Measuring + three blinking samples + the one that gives up.
    assert_eq!(dev.count(&DeviceCall::SampleBattery), 5);
    assert!(sink.events.iter().any(|e| matches!(
        e,
        CycleEvent::LowBatteryAbandoned { cycles: 3, .. }
    )));

    // Abandoning still persists and arms both wake sources.
    assert!(dev.persisted().is_some());
    assert_eq!(dev.count(&DeviceCall::ArmTimer(3600)), 1);
    assert_eq!(dev.count(&DeviceCall::ArmSignal(Level::Low)), 1);
}

#[test]
fn unbounded_alert_waits_as_long_as_it_takes() {
    let config = FeederConfig {
        low_battery_alert_limit: None,
        ..Default::default()
    };
    let mut samples = vec![2.8; 200];
    samples.push(3.3);
    let dev = MockDevice::new(WakeCause::ExternalSignal, Level::High, Some(HALF_SIX))
        .with_battery(&samples);
    let (plan, dev, sink) = run_cycle(config, dev);

    assert_eq!(dev.count(&DeviceCall::SetIndicator(true)), 199);
    assert!(entered(&sink, StateId::Scheduling));
    assert_eq!(plan.reason, SleepReason::Scheduled { target_hour: 19.0 });
}

#[test]
fn alert_half_period_is_configurable() {
    let config = FeederConfig {
        alert_half_period_ms: 250,
        ..Default::default()
    };
    let dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX))
        .with_battery(&[3.0, 3.0, 3.5]);
    let (_plan, dev, sink) = run_cycle(config, dev);

    assert_eq!(dev.count(&DeviceCall::DelayMs(250)), 2);
    assert!(sink.events.iter().any(|e| matches!(
        e,
        CycleEvent::LowBattery { volts, .. } if (*volts - 3.0).abs() < 1e-6
    )));
}

#[test]
fn unread_battery_on_first_boot_does_not_alert() {
    let dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX))
        .with_battery_readings(&[None]);
    let (plan, dev, sink) = run_cycle(FeederConfig::default(), dev);

    assert!(!entered(&sink, StateId::LowBatteryAlert));
    assert_eq!(plan.reason, SleepReason::Scheduled { target_hour: 19.0 });
    assert_eq!(dev.count(&DeviceCall::SampleBattery), 1);
    assert!(sink.failures().iter().any(|e| matches!(e, Error::BatteryUnread)));
}

#[test]
fn unread_battery_keeps_the_previous_level() {
    let history = RetainedState {
        last_battery_level: 3.7,
        ..Default::default()
    };
    let dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX))
        .with_stored(history)
        .with_battery_readings(&[None]);
    let (_plan, dev, sink) = run_cycle(FeederConfig::default(), dev);

    assert!(!entered(&sink, StateId::LowBatteryAlert));
    assert!((dev.persisted().unwrap().last_battery_level - 3.7).abs() < 1e-6);
    assert!(dev.published()[0].contains("\"battery\":3.7"));
}

#[test]
fn failed_resample_does_not_end_the_alert() {
    let dev = MockDevice::new(WakeCause::Timer, Level::High, Some(HALF_SIX))
        .with_battery_readings(&[Some(3.0), None, Some(3.2)]);
    let (plan, dev, sink) = run_cycle(FeederConfig::default(), dev);

    // One blink for the failed resample, then the feed indicator.
    assert_eq!(dev.indicator_writes(), vec![true, false, false, true]);
    assert_eq!(dev.count(&DeviceCall::SampleBattery), 3);
    assert!(entered(&sink, StateId::Scheduling));
    assert_eq!(plan.reason, SleepReason::Scheduled { target_hour: 19.0 });
}
