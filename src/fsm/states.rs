//! Concrete state handler functions and table builder.
//!
//! Each state is defined by plain `fn` pointers, monomorphised for the
//! device and sink types.  No closures in the table, no dynamic dispatch.
//!
//! ```text
//!  COLD START ──▶ MEASURING ──▶ NETWORKING ──▶ EVALUATING
//!                                                  │
//!                           [battery >= threshold] │ [battery < threshold]
//!                                  ┌───────────────┴──────────┐
//!                                  ▼                          ▼
//!                             SCHEDULING ◀──[recovered]── LOW BATTERY ALERT
//!                                  │                          │
//!                                  ▼                    [limit reached]
//!                              SLEEPING ◀─────────────────────┘
//! ```
//!
//! Sleeping is terminal: the next thing that runs is a fresh cold start.

use log::{info, warn};

use super::context::CycleContext;
use super::{StateDescriptor, StateId};
use crate::app::events::{CycleEvent, TelemetryPayload};
use crate::app::ports::{DevicePorts, EventSink};
use crate::error::{Error, TimeSyncError};
use crate::retained::{RetainedState, WakeCause};
use crate::retry::{RetryExhausted, poll_until};
use crate::scheduler::{SleepPlan, SleepReason};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the state table.  Called once per boot.
pub fn build_state_table<D: DevicePorts, S: EventSink>()
-> [StateDescriptor<CycleContext<D, S>>; StateId::COUNT] {
    [
        // Index 0: ColdStart
        StateDescriptor {
            id: StateId::ColdStart,
            name: "ColdStart",
            on_enter: Some(cold_start_enter),
            on_exit: None,
            on_update: cold_start_update,
        },
        // Index 1: Measuring
        StateDescriptor {
            id: StateId::Measuring,
            name: "Measuring",
            on_enter: Some(measuring_enter),
            on_exit: None,
            on_update: measuring_update,
        },
        // Index 2: Networking
        StateDescriptor {
            id: StateId::Networking,
            name: "Networking",
            on_enter: Some(networking_enter),
            on_exit: None,
            on_update: networking_update,
        },
        // Index 3: Evaluating
        StateDescriptor {
            id: StateId::Evaluating,
            name: "Evaluating",
            on_enter: None,
            on_exit: None,
            on_update: evaluating_update,
        },
        // Index 4: LowBatteryAlert
        StateDescriptor {
            id: StateId::LowBatteryAlert,
            name: "LowBatteryAlert",
            on_enter: Some(low_battery_enter),
            on_exit: Some(low_battery_exit),
            on_update: low_battery_update,
        },
        // Index 5: Scheduling
        StateDescriptor {
            id: StateId::Scheduling,
            name: "Scheduling",
            on_enter: Some(scheduling_enter),
            on_exit: None,
            on_update: scheduling_update,
        },
        // Index 6: Sleeping
        StateDescriptor {
            id: StateId::Sleeping,
            name: "Sleeping",
            on_enter: Some(sleeping_enter),
            on_exit: None,
            on_update: sleeping_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  COLD START: capture the button, restore history, identify the wake
// ═══════════════════════════════════════════════════════════════════════════

fn cold_start_enter<D: DevicePorts, S: EventSink>(ctx: &mut CycleContext<D, S>) {
    // The button level goes first: anything else may take long enough for
    // the user to release it.
    let button = ctx.dev.signal_level();

    let (retained, restored) = match ctx.dev.restore() {
        Some(state) => (state, true),
        None => {
            warn!("COLD START: no valid retained state, starting from defaults");
            (RetainedState::default(), false)
        }
    };
    let previous_cause = retained.last_wakeup_reason;

    ctx.retained = retained;
    ctx.restored = restored;
    ctx.retained.feed_button_state = button;
    ctx.retained.boot_count = ctx.retained.boot_count.saturating_add(1);
    ctx.wake_cause = ctx.dev.wake_cause();

    info!(
        "COLD START: boot #{} woke by {} (previous: {}, last sync {}, button {})",
        ctx.retained.boot_count,
        ctx.wake_cause,
        previous_cause,
        ctx.retained.last_sync_time,
        button
    );
    ctx.emit(CycleEvent::Booted {
        boot_count: ctx.retained.boot_count,
        wake_cause: ctx.wake_cause,
        previous_cause,
        last_sync: ctx.retained.last_sync_time,
        button,
        restored,
    });
}

fn cold_start_update<D: DevicePorts, S: EventSink>(_ctx: &mut CycleContext<D, S>) -> Option<StateId> {
    Some(StateId::Measuring)
}

// ═══════════════════════════════════════════════════════════════════════════
//  MEASURING: one battery sample, then let the rail settle
// ═══════════════════════════════════════════════════════════════════════════

fn measuring_enter<D: DevicePorts, S: EventSink>(ctx: &mut CycleContext<D, S>) {
    match ctx.dev.sample_volts() {
        Some(volts) => {
            ctx.retained.last_battery_level = volts;
            ctx.battery_sampled = true;
            info!("MEASURING: battery at {:.2} V", volts);
            ctx.emit(CycleEvent::BatterySampled { volts });
        }
        None => {
            // Telemetry carries the previous cycle's level.
            ctx.battery_sampled = false;
            ctx.step_failed(Error::BatteryUnread);
        }
    }
    ctx.dev.delay_ms(ctx.config.settle_ms);
}

fn measuring_update<D: DevicePorts, S: EventSink>(_ctx: &mut CycleContext<D, S>) -> Option<StateId> {
    Some(StateId::Networking)
}

// ═══════════════════════════════════════════════════════════════════════════
//  NETWORKING: join, sync the clock, publish status, leave
// ═══════════════════════════════════════════════════════════════════════════

fn networking_enter<D: DevicePorts, S: EventSink>(ctx: &mut CycleContext<D, S>) {
    match ctx.dev.join() {
        Ok(()) => ctx.retained.wifi_failed = false,
        Err(e) => {
            // Nothing else can succeed without a network this cycle.
            ctx.retained.wifi_failed = true;
            ctx.retained.sync_time_failed = true;
            ctx.retained.mqtt_failed = true;
            ctx.step_failed(e);
            ctx.dev.leave();
            return;
        }
    }

    sync_clock(ctx);
    publish_status(ctx);
    ctx.dev.leave();
}

fn sync_clock<D: DevicePorts, S: EventSink>(ctx: &mut CycleContext<D, S>) {
    if let Err(e) = ctx.dev.begin_sync() {
        ctx.retained.sync_time_failed = true;
        ctx.step_failed(e);
        return;
    }

    let policy = ctx.config.retry_policy_for_time_sync();
    let mut synced = None;
    let outcome = poll_until(policy, &mut ctx.dev, |dev| {
        synced = dev.now();
        synced.is_some()
    });

    match (outcome, synced) {
        (Ok(attempts), Some(time)) => {
            ctx.retained.last_sync_time = time;
            ctx.retained.sync_time_failed = false;
            info!("NETWORKING: clock synced to {} after {} polls", time, attempts);
            ctx.emit(CycleEvent::TimeSynced { time, attempts });
        }
        (Ok(attempts), None) | (Err(RetryExhausted { attempts }), _) => {
            // last_sync_time stays at the previous good value.
            ctx.retained.sync_time_failed = true;
            ctx.step_failed(TimeSyncError::Timeout { attempts });
        }
    }
}

fn publish_status<D: DevicePorts, S: EventSink>(ctx: &mut CycleContext<D, S>) {
    let payload = TelemetryPayload::new(
        ctx.retained.last_sync_time,
        ctx.wake_cause,
        ctx.retained.last_battery_level,
    );

    let outcome = payload.to_json().and_then(|json| {
        let sent = ctx
            .dev
            .connect()
            .and_then(|()| ctx.dev.publish(&json))
            .map(|()| json.len());
        ctx.dev.disconnect();
        sent
    });

    match outcome {
        Ok(bytes) => {
            ctx.retained.mqtt_failed = false;
            info!("NETWORKING: status published ({} bytes)", bytes);
            ctx.emit(CycleEvent::TelemetrySent { bytes });
        }
        Err(e) => {
            // Recorded only; a missed report never shortens the sleep.
            ctx.retained.mqtt_failed = true;
            ctx.step_failed(e);
        }
    }
}

fn networking_update<D: DevicePorts, S: EventSink>(_ctx: &mut CycleContext<D, S>) -> Option<StateId> {
    Some(StateId::Evaluating)
}

// ═══════════════════════════════════════════════════════════════════════════
//  EVALUATING: battery gate
// ═══════════════════════════════════════════════════════════════════════════

fn evaluating_update<D: DevicePorts, S: EventSink>(ctx: &mut CycleContext<D, S>) -> Option<StateId> {
    if ctx.battery_sampled && ctx.retained.last_battery_level < ctx.config.low_battery_threshold_v {
        Some(StateId::LowBatteryAlert)
    } else {
        Some(StateId::Scheduling)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  LOW BATTERY ALERT: blink until the voltage recovers
// ═══════════════════════════════════════════════════════════════════════════
//
// Each tick is one full blink.  With `low_battery_alert_limit = None` this
// state can run forever if the battery never recovers.

fn low_battery_enter<D: DevicePorts, S: EventSink>(ctx: &mut CycleContext<D, S>) {
    ctx.alert_cycles = 0;
    ctx.alert_volts = ctx.retained.last_battery_level;
    let threshold = ctx.config.low_battery_threshold_v;
    warn!(
        "LOW BATTERY: {:.2} V < {:.2} V, alerting (limit {:?} cycles)",
        ctx.alert_volts, threshold, ctx.config.low_battery_alert_limit
    );
    ctx.emit(CycleEvent::LowBattery {
        volts: ctx.alert_volts,
        threshold,
    });
}

fn low_battery_exit<D: DevicePorts, S: EventSink>(ctx: &mut CycleContext<D, S>) {
    ctx.dev.set_indicator(false);
}

fn low_battery_update<D: DevicePorts, S: EventSink>(ctx: &mut CycleContext<D, S>) -> Option<StateId> {
    // A failed resample is no evidence of recovery.
    let volts = ctx.dev.sample_volts().unwrap_or(ctx.alert_volts);
    ctx.alert_volts = volts;

    if volts >= ctx.config.low_battery_threshold_v {
        info!(
            "LOW BATTERY: recovered to {:.2} V after {} cycles",
            volts, ctx.alert_cycles
        );
        return Some(StateId::Scheduling);
    }

    if let Some(limit) = ctx.config.low_battery_alert_limit {
        if ctx.alert_cycles >= limit {
            warn!(
                "LOW BATTERY: still {:.2} V after {} cycles, sleeping {} s",
                volts, ctx.alert_cycles, ctx.config.low_battery_sleep_secs
            );
            ctx.plan = Some(SleepPlan::fixed(
                SleepReason::BatteryExhausted,
                u64::from(ctx.config.low_battery_sleep_secs),
                ctx.wake_level(),
            ));
            ctx.emit(CycleEvent::LowBatteryAbandoned {
                cycles: ctx.alert_cycles,
                volts,
            });
            return Some(StateId::Sleeping);
        }
    }

    let half = ctx.config.alert_half_period_ms;
    ctx.dev.set_indicator(true);
    ctx.dev.delay_ms(half);
    ctx.dev.set_indicator(false);
    ctx.dev.delay_ms(half);
    ctx.alert_cycles += 1;
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  SCHEDULING: failure flags first, then wake cause
// ═══════════════════════════════════════════════════════════════════════════

fn scheduling_enter<D: DevicePorts, S: EventSink>(ctx: &mut CycleContext<D, S>) {
    let wake_level = ctx.wake_level();

    let plan = if ctx.needs_recovery() {
        info!(
            "SCHEDULING: wifi_failed={} sync_time_failed={}, recovery sleep",
            ctx.retained.wifi_failed, ctx.retained.sync_time_failed
        );
        SleepPlan::fixed(
            SleepReason::Recovery,
            u64::from(ctx.config.recovery_sleep_secs),
            wake_level,
        )
    } else {
        match ctx.wake_cause {
            WakeCause::Timer => {
                ctx.dev.set_indicator(true);
                schedule_next_target(ctx)
            }
            WakeCause::ExternalSignal => {
                ctx.dev.set_indicator(false);
                schedule_next_target(ctx)
            }
            WakeCause::Undefined => {
                ctx.dev.set_indicator(true);
                ctx.dev.delay_ms(ctx.config.cold_boot_pulse_ms);
                ctx.dev.set_indicator(false);
                SleepPlan::fixed(
                    SleepReason::ColdBoot,
                    u64::from(ctx.config.cold_boot_sleep_secs),
                    wake_level,
                )
            }
        }
    };

    ctx.plan = Some(plan);
}

fn schedule_next_target<D: DevicePorts, S: EventSink>(ctx: &mut CycleContext<D, S>) -> SleepPlan {
    let now = ctx.dev.now().unwrap_or(ctx.retained.last_sync_time);
    let hour = now.hour_of_day();
    match ctx.scheduler.next_wake_target(hour) {
        Some(target) => {
            info!(
                "SCHEDULING: {} (hour {:.2}) -> target {:.2}h in {} s",
                now, hour, target.target_hour, target.seconds
            );
            SleepPlan::scheduled(target, ctx.wake_level())
        }
        None => {
            warn!("SCHEDULING: no wake targets configured, recovery sleep");
            SleepPlan::fixed(
                SleepReason::Recovery,
                u64::from(ctx.config.recovery_sleep_secs),
                ctx.wake_level(),
            )
        }
    }
}

fn scheduling_update<D: DevicePorts, S: EventSink>(_ctx: &mut CycleContext<D, S>) -> Option<StateId> {
    Some(StateId::Sleeping)
}

// ═══════════════════════════════════════════════════════════════════════════
//  SLEEPING: persist, arm both wake sources
// ═══════════════════════════════════════════════════════════════════════════

fn sleeping_enter<D: DevicePorts, S: EventSink>(ctx: &mut CycleContext<D, S>) {
    let plan = ctx.plan.unwrap_or_else(|| {
        SleepPlan::fixed(
            SleepReason::Recovery,
            u64::from(ctx.config.recovery_sleep_secs),
            ctx.wake_level(),
        )
    });

    // Nothing runs after suspension except a fresh cold start, so the
    // snapshot has to be written now.
    ctx.retained.last_wakeup_reason = ctx.wake_cause;
    if let Err(e) = ctx.dev.persist(&ctx.retained) {
        ctx.step_failed(e);
    }

    ctx.dev.arm_signal(plan.wake_level);
    ctx.dev.arm_timer(plan.seconds);
    ctx.plan = Some(plan);

    info!(
        "SLEEPING: {:?} for {} s, wake on button {}",
        plan.reason, plan.seconds, plan.wake_level
    );
    ctx.emit(CycleEvent::SleepScheduled(plan));
}

fn sleeping_update<D: DevicePorts, S: EventSink>(_ctx: &mut CycleContext<D, S>) -> Option<StateId> {
    None
}
