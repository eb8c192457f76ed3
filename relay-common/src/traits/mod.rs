pub mod fsm;

pub use self::fsm::FiniteStateMachine;
