//! Boot dispatcher: the hexagonal core.
//!
//! [`BootDispatcher`] owns the FSM and the cycle context.  One call to
//! [`run`](BootDispatcher::run) is one wake cycle: it drives the FSM from
//! cold start to sleeping and then suspends the device.  All I/O flows
//! through port traits, making the entire cycle testable with mock
//! adapters.
//!
//! ```text
//!  BatteryPort ──────▶ ┌────────────────────────┐ ──▶ EventSink
//!  ConnectivityPort ◀─▶│                        │
//!  TimePort ─────────▶ │     BootDispatcher     │ ──▶ IndicatorPort
//!  TelemetryPort ◀──── │   FSM · Scheduler      │ ──▶ WakeSourcePort
//!  RetainedStorePort ◀▶│                        │
//!                      └────────────────────────┘
//! ```

use log::{error, info};

use crate::config::FeederConfig;
use crate::fsm::context::CycleContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::retained::{RetainedState, WakeCause};
use crate::scheduler::{SleepPlan, SleepReason};

use super::events::CycleEvent;
use super::ports::{DevicePorts, EventSink};

// ───────────────────────────────────────────────────────────────
// BootDispatcher
// ───────────────────────────────────────────────────────────────

/// Runs one wake cycle.
pub struct BootDispatcher<D: DevicePorts, S: EventSink> {
    fsm: Fsm<CycleContext<D, S>>,
    ctx: CycleContext<D, S>,
}

impl<D: DevicePorts, S: EventSink> BootDispatcher<D, S> {
    /// Construct the dispatcher.  Nothing touches the device until
    /// [`run`](Self::run).
    pub fn new(config: FeederConfig, dev: D, sink: S) -> Self {
        Self {
            fsm: Fsm::new(build_state_table(), StateId::ColdStart),
            ctx: CycleContext::new(config, dev, sink),
        }
    }

    /// Execute the cycle and suspend.
    ///
    /// On hardware this never returns.  Where suspension does return (host
    /// simulation, tests) the plan that was armed is handed back.
    pub fn run(&mut self) -> SleepPlan {
        self.fsm.start(&mut self.ctx);

        while self.fsm.current_state() != StateId::Sleeping {
            if let Some((from, to)) = self.fsm.tick(&mut self.ctx) {
                self.ctx.emit(CycleEvent::StateChanged { from, to });
            }
        }

        let plan = self.ctx.plan.unwrap_or_else(|| {
            error!("Sleeping reached without a plan");
            SleepPlan::fixed(
                SleepReason::Recovery,
                u64::from(self.ctx.config.recovery_sleep_secs),
                self.ctx.wake_level(),
            )
        });

        info!("BootDispatcher: suspending for {} s", plan.seconds);
        self.ctx.dev.suspend();
        plan
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// The state that was (or will be) persisted for the next cycle.
    pub fn retained(&self) -> &RetainedState {
        &self.ctx.retained
    }

    /// Wake cause captured at cold start.
    pub fn wake_cause(&self) -> WakeCause {
        self.ctx.wake_cause
    }

    pub fn config(&self) -> &FeederConfig {
        &self.ctx.config
    }

    pub fn device(&self) -> &D {
        &self.ctx.dev
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.ctx.dev
    }

    pub fn sink(&self) -> &S {
        &self.ctx.sink
    }

    /// Give back the device and sink, e.g. to run the next simulated cycle
    /// on the same board.
    pub fn into_parts(self) -> (D, S) {
        (self.ctx.dev, self.ctx.sink)
    }
}
