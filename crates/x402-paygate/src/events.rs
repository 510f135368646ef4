//! Structured protocol events.
//!
//! Both state machines report every transition to an injected
//! [`PaymentObserver`] instead of logging directly, so hosts can route them
//! to tracing, metrics, or a test recorder.

use std::fmt;
use std::sync::{Arc, Mutex};

/// Server-side gate states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateState {
    NoPayment,
    AwaitingVerification,
    Settled,
    Rejected,
    Unavailable,
}

impl GateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateState::NoPayment => "no_payment",
            GateState::AwaitingVerification => "awaiting_verification",
            GateState::Settled => "settled",
            GateState::Rejected => "rejected",
            GateState::Unavailable => "unavailable",
        }
    }
}

/// Client-side fetch states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchState {
    Initial,
    ChallengeReceived,
    Authorizing,
    Retrying,
    Done,
}

impl FetchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchState::Initial => "initial",
            FetchState::ChallengeReceived => "challenge_received",
            FetchState::Authorizing => "authorizing",
            FetchState::Retrying => "retrying",
            FetchState::Done => "done",
        }
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FetchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state transition in one of the two machines.
///
/// `from` is `None` for the entry into the initial state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    Gate {
        resource: String,
        from: Option<GateState>,
        to: GateState,
        detail: Option<String>,
    },
    Fetch {
        url: String,
        from: Option<FetchState>,
        to: FetchState,
        detail: Option<String>,
    },
}

/// Receives protocol events. Must be cheap and must not block.
pub trait PaymentObserver: Send + Sync {
    fn observe(&self, event: &PaymentEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PaymentObserver for NoopObserver {
    fn observe(&self, _event: &PaymentEvent) {}
}

/// Emits each event as a `tracing` record under the `x402::events` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl PaymentObserver for TracingObserver {
    fn observe(&self, event: &PaymentEvent) {
        match event {
            PaymentEvent::Gate {
                resource,
                from,
                to,
                detail,
            } => tracing::info!(
                target: "x402::events",
                machine = "gate",
                resource = %resource,
                from = from.map(|s| s.as_str()).unwrap_or("-"),
                to = %to,
                detail = detail.as_deref().unwrap_or(""),
                "state transition"
            ),
            PaymentEvent::Fetch {
                url,
                from,
                to,
                detail,
            } => tracing::info!(
                target: "x402::events",
                machine = "fetch",
                url = %url,
                from = from.map(|s| s.as_str()).unwrap_or("-"),
                to = %to,
                detail = detail.as_deref().unwrap_or(""),
                "state transition"
            ),
        }
    }
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PaymentEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PaymentEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Target states of recorded gate transitions.
    pub fn gate_states(&self) -> Vec<GateState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PaymentEvent::Gate { to, .. } => Some(to),
                PaymentEvent::Fetch { .. } => None,
            })
            .collect()
    }

    /// Target states of recorded fetch transitions.
    pub fn fetch_states(&self) -> Vec<FetchState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                PaymentEvent::Fetch { to, .. } => Some(to),
                PaymentEvent::Gate { .. } => None,
            })
            .collect()
    }
}

impl PaymentObserver for RecordingObserver {
    fn observe(&self, event: &PaymentEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Forwards each event to several observers.
#[derive(Default, Clone)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PaymentObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn PaymentObserver>>) -> Self {
        Self { observers }
    }

    pub fn push(&mut self, observer: Arc<dyn PaymentObserver>) {
        self.observers.push(observer);
    }
}

impl PaymentObserver for CompositeObserver {
    fn observe(&self, event: &PaymentEvent) {
        for observer in &self.observers {
            observer.observe(event);
        }
    }
}
