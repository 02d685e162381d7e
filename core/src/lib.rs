//! # Ticketsync Core
//!
//! Core traits and types for rebuilding local marketplace state from ledger logs.
//!
//! The ledger only exposes two things: an append-only stream of emitted log
//! entries and on-demand contract reads. This crate provides the abstractions
//! used to fold those entries into aggregates:
//!
//! ## Core Concepts
//!
//! - **State**: an aggregate's local model (an event's catalog, a user's holdings)
//! - **Action**: every input a reducer accepts (replayed log entries, fetched metadata)
//! - **Reducer**: pure function `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: description of follow-up I/O (content fetches), not its execution
//! - **Environment**: injected collaborators ([`content_store::ContentStore`] and friends)
//!
//! ## Collaborators
//!
//! - [`event_log::EventLog`]: past log queries by block range
//! - [`content_store::ContentStore`]: payload lookup by content hash
//! - [`contract::ContractReader`]: catalog reads (nonces, price, supply)
//! - [`snapshot_store::SnapshotStore`]: opaque key-value cache between sessions
//!
//! ## Example
//!
//! ```ignore
//! use ticketsync_core::*;
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!     type Environment = ();
//!
//!     fn reduce(
//!         &self,
//!         state: &mut CounterState,
//!         action: CounterAction,
//!         _env: &(),
//!     ) -> SmallVec<[Effect<CounterAction>; 4]> {
//!         state.count += 1;
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

// Re-export commonly used types
pub use alloy_primitives::{Address, U256};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

pub mod content_store;
pub mod contract;
pub mod event;
pub mod event_log;
pub mod position;
pub mod snapshot_store;

/// Reducer module - The core trait for folding actions into state
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all replay logic and are deterministic and testable. Any I/O a
/// fold step needs is returned as an [`Effect`](super::effect::Effect) and driven
/// by the caller, so a reader between two fold steps never sees half an entry applied.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for replay logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The aggregate state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for EventReducer {
    ///     type State = EventState;
    ///     type Action = EventAction;
    ///     type Environment = EventEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut EventState,
    ///         action: EventAction,
    ///         env: &EventEnvironment,
    ///     ) -> SmallVec<[Effect<EventAction>; 4]> {
    ///         match action {
    ///             EventAction::Replayed { event, .. } => {
    ///                 // Fold the entry
    ///                 smallvec![Effect::None]
    ///             }
    ///             _ => smallvec![Effect::None],
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// # Returns
        ///
        /// A small vector of effects to be driven by the caller
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe follow-up work to be performed by whoever drives the
/// reducer. They are values (not execution) and are composable.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and driven to completion by the replay loop.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects sequentially, in order
        Sequential(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Wrap an async computation whose result is fed back into the reducer
        #[must_use]
        pub fn future<F>(future: F) -> Effect<Action>
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(future))
        }

        /// Returns `true` for [`Effect::None`] and for sequences made only of no-ops.
        #[must_use]
        pub fn is_noop(&self) -> bool {
            match self {
                Effect::None => true,
                Effect::Sequential(effects) => effects.iter().all(Effect::is_noop),
                Effect::Future(_) => false,
            }
        }
    }
}
