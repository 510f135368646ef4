use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};
use std::sync::LazyLock;
use x402::{GateState, PaymentEvent, PaymentObserver};

pub static REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "x402_server_requests_total",
        "Total HTTP requests",
        &["endpoint", "status"]
    )
    .expect("x402_server_requests_total registers once")
});

pub static PAYMENT_OUTCOMES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "x402_server_payment_outcomes_total",
        "Terminal payment gate outcomes for requests that carried a payment header",
        &["outcome"]
    )
    .expect("x402_server_payment_outcomes_total registers once")
});

/// Counts terminal gate transitions in [`PAYMENT_OUTCOMES`].
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsObserver;

impl PaymentObserver for MetricsObserver {
    fn observe(&self, event: &PaymentEvent) {
        if let PaymentEvent::Gate {
            from: Some(_), to, ..
        } = event
        {
            if matches!(
                to,
                GateState::Settled | GateState::Rejected | GateState::Unavailable
            ) {
                PAYMENT_OUTCOMES.with_label_values(&[to.as_str()]).inc();
            }
        }
    }
}

pub fn metrics_output() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observer_counts_terminal_transitions_only() {
        let before = PAYMENT_OUTCOMES.with_label_values(&["settled"]).get();

        let observer = MetricsObserver;
        for (from, to) in [
            (None, GateState::NoPayment),
            (Some(GateState::NoPayment), GateState::AwaitingVerification),
            (Some(GateState::AwaitingVerification), GateState::Settled),
        ] {
            observer.observe(&PaymentEvent::Gate {
                resource: "GET /metrics-test".to_string(),
                from,
                to,
                detail: None,
            });
        }

        // other tests in this binary may settle concurrently
        assert!(PAYMENT_OUTCOMES.with_label_values(&["settled"]).get() > before);
        assert!(metrics_output().contains("x402_server_payment_outcomes_total"));
    }
}
