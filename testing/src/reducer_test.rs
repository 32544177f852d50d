//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use event_planner_core::reducer::Reducer;

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// Actions are applied in the order they were given.
///
/// # Example
///
/// ```ignore
/// use event_planner_testing::ReducerTest;
///
/// ReducerTest::new(CollectionReducer::<EventItem>::new())
///     .given_state(CollectionState::default())
///     .when_action(CollectionAction::Started)
///     .then_state(|state| {
///         assert!(state.loading);
///     })
///     .run();
/// ```
pub struct ReducerTest<R, S, A>
where
    R: Reducer<State = S, Action = A>,
{
    reducer: R,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
}

impl<R, S, A> ReducerTest<R, S, A>
where
    R: Reducer<State = S, Action = A>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
        }
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Add an action to apply (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state or action is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        assert!(
            !self.actions.is_empty(),
            "At least one action must be set with when_action()"
        );

        for action in self.actions {
            self.reducer.reduce(&mut state, action);
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_planner_core::model::BookingStatus;

    /// Applies a status change only when the transition table allows it.
    struct StatusReducer;

    impl Reducer for StatusReducer {
        type State = BookingStatus;
        type Action = BookingStatus;

        fn reduce(&self, state: &mut Self::State, next: Self::Action) {
            if let Ok(next) = state.transition(next) {
                *state = next;
            }
        }
    }

    #[test]
    fn applies_a_single_action() {
        ReducerTest::new(StatusReducer)
            .given_state(BookingStatus::Pending)
            .when_action(BookingStatus::Accepted)
            .then_state(|state| assert_eq!(*state, BookingStatus::Accepted))
            .run();
    }

    #[test]
    fn actions_apply_in_order() {
        ReducerTest::new(StatusReducer)
            .given_state(BookingStatus::Pending)
            .when_action(BookingStatus::Accepted)
            .when_action(BookingStatus::Pending)
            .when_action(BookingStatus::Completed)
            .then_state(|state| assert!(state.is_terminal()))
            .then_state(|state| assert_eq!(*state, BookingStatus::Completed))
            .run();
    }

    #[test]
    #[should_panic(expected = "Initial state must be set")]
    fn missing_initial_state_panics() {
        ReducerTest::new(StatusReducer)
            .when_action(BookingStatus::Accepted)
            .run();
    }
}
