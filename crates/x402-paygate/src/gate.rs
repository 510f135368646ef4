//! Server-side payment gate.
//!
//! One run of [`PaymentGate::process`] per inbound request:
//!
//! ```text
//! NoPayment ──header──> AwaitingVerification ──> Settled | Rejected | Unavailable
//!     │  └──undecodable──> Rejected
//!     └──no header──> 402 challenge
//! ```
//!
//! Every settlement outcome maps onto a [`GateOutcome`]; nothing escapes as a
//! fault. The resource may only be released for [`GateOutcome::Settled`].

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::codec::{self, DecodeError};
use crate::events::{GateState, NoopObserver, PaymentEvent, PaymentObserver};
use crate::nonce_store::NonceStore;
use crate::route::RouteDescriptor;
use crate::scheme::SettlementService;
use crate::settlement::SettlementClient;
use crate::{PaymentChallenge, SettlementReceipt, SettlementResult};

/// Reason code for an authorization whose nonce the replay guard has seen.
pub const NONCE_REUSED: &str = "nonce_reused";

/// Terminal result of one gate run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// No payment header: 402 with a fresh challenge.
    PaymentRequired(PaymentChallenge),
    /// Header present but undecodable or unacceptable: 402, client can re-pay.
    Malformed(PaymentChallenge),
    /// Facilitator declined: 402 carrying its reason code.
    Rejected(PaymentChallenge),
    /// Payment settled; the resource may be released.
    Settled {
        receipt: SettlementReceipt,
        timestamp: DateTime<Utc>,
    },
    /// Infrastructure failure, not billed to the client: 502.
    Unavailable { cause: String },
}

impl GateOutcome {
    /// HTTP status code for this outcome.
    pub fn status_code(&self) -> u16 {
        match self {
            GateOutcome::PaymentRequired(_)
            | GateOutcome::Malformed(_)
            | GateOutcome::Rejected(_) => 402,
            GateOutcome::Settled { .. } => 200,
            GateOutcome::Unavailable { .. } => 502,
        }
    }

    /// Final state of the gate machine.
    pub fn state(&self) -> GateState {
        match self {
            GateOutcome::PaymentRequired(_) => GateState::NoPayment,
            GateOutcome::Malformed(_) | GateOutcome::Rejected(_) => GateState::Rejected,
            GateOutcome::Settled { .. } => GateState::Settled,
            GateOutcome::Unavailable { .. } => GateState::Unavailable,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, GateOutcome::Settled { .. })
    }
}

/// Per-request payment state machine in front of a protected resource.
///
/// Holds no per-request state. The optional replay guard is the only shared
/// mutable structure.
pub struct PaymentGate<S> {
    settlement: SettlementClient<S>,
    observer: Arc<dyn PaymentObserver>,
    replay_guard: Option<Arc<dyn NonceStore>>,
}

impl<S: SettlementService + 'static> PaymentGate<S> {
    pub fn new(settlement: SettlementClient<S>) -> Self {
        Self {
            settlement,
            observer: Arc::new(NoopObserver),
            replay_guard: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn PaymentObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Reject authorizations whose nonce was already claimed at this gate.
    pub fn with_replay_guard(mut self, store: Arc<dyn NonceStore>) -> Self {
        self.replay_guard = Some(store);
        self
    }

    pub fn settlement(&self) -> &SettlementClient<S> {
        &self.settlement
    }

    /// Run the gate for one request using the current time.
    pub async fn process(&self, route: &RouteDescriptor, payment_header: Option<&str>) -> GateOutcome {
        self.process_at(route, payment_header, codec::unix_now()).await
    }

    /// Run the gate for one request; `now` is unix seconds, used for the
    /// expiry pre-check.
    pub async fn process_at(
        &self,
        route: &RouteDescriptor,
        payment_header: Option<&str>,
        now: u64,
    ) -> GateOutcome {
        let resource = format!("{} {}", route.method, route.resource_url);
        self.emit(&resource, None, GateState::NoPayment, None);

        let Some(header) = payment_header else {
            return GateOutcome::PaymentRequired(route.describe());
        };

        let authorization = match codec::decode(header, route, now) {
            Ok(authorization) => authorization,
            Err(e) => {
                tracing::warn!(resource = %resource, error = %e, "invalid payment header");
                self.emit(
                    &resource,
                    Some(GateState::NoPayment),
                    GateState::Rejected,
                    Some(e.code().to_string()),
                );
                return GateOutcome::Malformed(rejection(route, &e));
            }
        };

        let nonce = authorization.payload.nonce;
        if let Some(guard) = &self.replay_guard {
            if !guard.try_use(nonce, authorization.payload.valid_before) {
                tracing::warn!(
                    resource = %resource,
                    payer = %authorization.payload.from,
                    nonce = %nonce,
                    "replayed payment authorization"
                );
                self.emit(
                    &resource,
                    Some(GateState::NoPayment),
                    GateState::Rejected,
                    Some(NONCE_REUSED.to_string()),
                );
                return GateOutcome::Rejected(challenge_with_reason(
                    route,
                    "payment authorization already used",
                    NONCE_REUSED,
                ));
            }
        }

        self.emit(
            &resource,
            Some(GateState::NoPayment),
            GateState::AwaitingVerification,
            None,
        );
        tracing::info!(
            resource = %resource,
            payer = %authorization.payload.from,
            nonce = %nonce,
            "payment attempt"
        );

        match self.settlement.settle(route, &authorization).await {
            SettlementResult::Settled { receipt, timestamp } => {
                self.emit(
                    &resource,
                    Some(GateState::AwaitingVerification),
                    GateState::Settled,
                    receipt.transaction.clone(),
                );
                GateOutcome::Settled { receipt, timestamp }
            }
            SettlementResult::Rejected { reason_code } => {
                // no funds moved, so the authorization may be presented again
                if let Some(guard) = &self.replay_guard {
                    guard.release(&nonce);
                }
                tracing::warn!(
                    resource = %resource,
                    payer = %authorization.payload.from,
                    reason = %reason_code,
                    "payment rejected"
                );
                self.emit(
                    &resource,
                    Some(GateState::AwaitingVerification),
                    GateState::Rejected,
                    Some(reason_code.clone()),
                );
                GateOutcome::Rejected(challenge_with_reason(
                    route,
                    "payment rejected by facilitator",
                    &reason_code,
                ))
            }
            SettlementResult::FacilitatorUnavailable { cause } => {
                tracing::error!(resource = %resource, cause = %cause, "facilitator unavailable");
                self.emit(
                    &resource,
                    Some(GateState::AwaitingVerification),
                    GateState::Unavailable,
                    Some(cause.clone()),
                );
                GateOutcome::Unavailable { cause }
            }
        }
    }

    fn emit(&self, resource: &str, from: Option<GateState>, to: GateState, detail: Option<String>) {
        self.observer.observe(&PaymentEvent::Gate {
            resource: resource.to_string(),
            from,
            to,
            detail,
        });
    }
}

fn rejection(route: &RouteDescriptor, error: &DecodeError) -> PaymentChallenge {
    challenge_with_reason(route, &error.to_string(), error.code())
}

fn challenge_with_reason(route: &RouteDescriptor, error: &str, reason_code: &str) -> PaymentChallenge {
    let mut challenge = route.describe();
    challenge.error = Some(error.to_string());
    challenge.reason_code = Some(reason_code.to_string());
    challenge
}
