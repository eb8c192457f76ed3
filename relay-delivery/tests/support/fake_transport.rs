//! Scriptable [`UpstreamTransport`] that records every call.

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_common::{GateConfig, Mail, MailAccount};
use relay_delivery::{DeliveryError, UpstreamTransport};
use relay_transport::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Gate { host: String },
    Deliver { host: String, sender: String },
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    /// Outcomes for upcoming deliveries; empty means success
    deliveries: VecDeque<bool>,
    gates: VecDeque<bool>,
    fail_all_deliveries: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<State>>,
}

fn refused() -> ClientError {
    ClientError::Rejected {
        command: "MAIL FROM".to_string(),
        code: 451,
        message: "Try again later".to_string(),
    }
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let transport = Self::default();
        transport.state.lock().fail_all_deliveries = true;
        transport
    }

    pub fn fail_next_gate(&self) {
        self.state.lock().gates.push_back(false);
    }

    pub fn fail_next_delivery(&self) {
        self.state.lock().deliveries.push_back(false);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn gate_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Gate { .. }))
            .count()
    }

    pub fn deliveries(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Deliver { .. }))
            .count()
    }
}

#[async_trait]
impl UpstreamTransport for FakeTransport {
    async fn authenticate_gate(&self, gate: &GateConfig) -> Result<(), DeliveryError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Gate {
            host: gate.host.clone(),
        });

        if state.gates.pop_front().unwrap_or(true) {
            Ok(())
        } else {
            Err(DeliveryError::GateAuth {
                host: gate.host.clone(),
                port: gate.port,
                source: ClientError::Pop3 {
                    command: "PASS".to_string(),
                    message: "Invalid login".to_string(),
                },
            })
        }
    }

    async fn deliver(&self, account: &MailAccount, mail: &Mail) -> Result<(), DeliveryError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Deliver {
            host: account.host.clone(),
            sender: mail.sender().to_string(),
        });

        let succeed = !state.fail_all_deliveries && state.deliveries.pop_front().unwrap_or(true);
        if succeed {
            Ok(())
        } else {
            Err(DeliveryError::Delivery {
                host: account.host.clone(),
                port: account.port,
                source: refused(),
            })
        }
    }
}
