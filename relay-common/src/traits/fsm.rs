/// A state machine driven by discrete inputs.
///
/// Each transition consumes the current state and yields the next one, with
/// any side effects applied to the shared `Context`.
pub trait FiniteStateMachine {
    type Input;
    type Context;

    #[must_use]
    fn transition(self, input: Self::Input, context: &mut Self::Context) -> Self;
}
