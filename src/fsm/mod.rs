//! Function-pointer finite state machine engine.
//!
//! Classic embedded FSM pattern ported to Rust:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │  StateTable                                                    │
//! │  ┌─────────────────┬───────────┬──────────┬─────────────────┐  │
//! │  │ StateId         │ on_enter  │ on_exit  │ on_update       │  │
//! │  ├─────────────────┼───────────┼──────────┼─────────────────┤  │
//! │  │ ColdStart       │ fn(ctx)   │    -     │ fn(ctx)->Option │  │
//! │  │ Measuring       │ fn(ctx)   │    -     │ fn(ctx)->Option │  │
//! │  │ Networking      │ fn(ctx)   │    -     │ fn(ctx)->Option │  │
//! │  │ Evaluating      │    -      │    -     │ fn(ctx)->Option │  │
//! │  │ LowBatteryAlert │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option │  │
//! │  │ Scheduling      │ fn(ctx)   │    -     │ fn(ctx)->Option │  │
//! │  │ Sleeping        │ fn(ctx)   │    -     │ fn(ctx)->Option │  │
//! │  └─────────────────┴───────────┴──────────┴─────────────────┘  │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.
//! If it returns `Some(next_id)`, the engine runs `on_exit` for the
//! current state, then `on_enter` for the next, and updates the
//! current pointer.  The engine is generic over the context type `C`
//! that every handler receives as `&mut C`.

pub mod context;
pub mod states;

use log::info;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// The steps of one wake cycle.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    ColdStart = 0,
    Measuring = 1,
    Networking = 2,
    Evaluating = 3,
    LowBatteryAlert = 4,
    Scheduling = 5,
    Sleeping = 6,
}

impl StateId {
    /// Total number of states: used to size the table array.
    pub const COUNT: usize = 7;

    /// Convert a table index back to `StateId`.  Out-of-range indices map
    /// to `Sleeping`, the one state every cycle ends in.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::ColdStart,
            1 => Self::Measuring,
            2 => Self::Networking,
            3 => Self::Evaluating,
            4 => Self::LowBatteryAlert,
            5 => Self::Scheduling,
            6 => Self::Sleeping,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Sleeping
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once on each state transition.
pub type StateActionFn<C> = fn(&mut C);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type StateUpdateFn<C> = fn(&mut C) -> Option<StateId>;

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single FSM state.
/// Stored in a fixed-size array: no heap, no `dyn`.
pub struct StateDescriptor<C> {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn<C>>,
    pub on_exit: Option<StateActionFn<C>>,
    pub on_update: StateUpdateFn<C>,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The finite state machine engine.
///
/// Owns the state table (array of [`StateDescriptor`]); the context is
/// passed into every call so the caller keeps ownership of it.
pub struct Fsm<C> {
    /// Fixed-size table indexed by `StateId as usize`.
    table: [StateDescriptor<C>; StateId::COUNT],
    /// Index of the currently active state.
    current: usize,
}

impl<C> Fsm<C> {
    /// Construct a new FSM with the given state table, starting in `initial`.
    pub fn new(table: [StateDescriptor<C>; StateId::COUNT], initial: StateId) -> Self {
        debug_assert!(
            table.iter().enumerate().all(|(i, d)| d.id as usize == i),
            "state table out of order"
        );
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting state.
    /// Call once after construction, before the first `tick()`.
    pub fn start(&mut self, ctx: &mut C) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the FSM by one tick.
    ///
    /// 1. Call `on_update` for the current state.
    /// 2. If it returns `Some(next)`, execute the transition:
    ///    `on_exit(current)` → update pointer → `on_enter(next)`.
    ///
    /// Returns the transition taken, if any.
    pub fn tick(&mut self, ctx: &mut C) -> Option<(StateId, StateId)> {
        let from = self.current_state();
        let next = (self.table[self.current].on_update)(ctx)?;
        self.transition(next, ctx);
        Some((from, next))
    }

    /// The current state's identity.
    pub fn current_state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: StateId, ctx: &mut C) {
        let next_idx = next_id as usize;

        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
