//! Hand-off of terminal payments.
//!
//! The router's caller submits every terminal payment to a [`PaymentSink`].
//! [`QueueSink`] pushes onto an in-process queue that a recorder task drains
//! into a [`PaymentStore`], which answers summary queries. Nothing here is
//! durable.

use crate::payment::{Payment, PaymentSummary, SummaryFilter};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Accepts terminal payments; fire-and-forget
pub trait PaymentSink: Send + Sync {
    fn submit(&self, payment: Payment);
}

/// Sink backed by an unbounded in-process queue
#[derive(Debug, Clone)]
pub struct QueueSink {
    tx: mpsc::UnboundedSender<Payment>,
}

impl QueueSink {
    /// Create the sink and the receiving end of its queue
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Payment>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PaymentSink for QueueSink {
    fn submit(&self, payment: Payment) {
        if let Err(e) = self.tx.send(payment) {
            warn!(
                correlation_id = %e.0.correlation_id,
                "Payment queue closed, dropping payment"
            );
        }
    }
}

/// In-memory record of terminal payments
#[derive(Debug, Default)]
pub struct PaymentStore {
    payments: RwLock<Vec<Payment>>,
}

impl PaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a payment; non-terminal payments are ignored
    pub fn record(&self, payment: Payment) {
        if !payment.is_terminal() {
            warn!(
                correlation_id = %payment.correlation_id,
                "Ignoring non-terminal payment"
            );
            return;
        }
        self.payments.write().push(payment);
    }

    pub fn len(&self) -> usize {
        self.payments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.payments.read().is_empty()
    }

    /// Totals of processed payments inside `filter`
    pub fn summary(&self, filter: &SummaryFilter) -> PaymentSummary {
        self.payments
            .read()
            .iter()
            .filter(|payment| filter.contains(payment))
            .fold(PaymentSummary::new(), |mut summary, payment| {
                summary.add_payment(payment);
                summary
            })
    }
}

impl PaymentSink for PaymentStore {
    fn submit(&self, payment: Payment) {
        self.record(payment);
    }
}

/// Drain `rx` into `store` until the queue closes or `shutdown` fires.
/// Payments already queued at shutdown are still recorded.
pub fn spawn_recorder(
    mut rx: mpsc::UnboundedReceiver<Payment>,
    store: Arc<PaymentStore>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Payment recorder started");

        loop {
            tokio::select! {
                biased;
                maybe = rx.recv() => match maybe {
                    Some(payment) => {
                        debug!(correlation_id = %payment.correlation_id, "Recording payment");
                        store.record(payment);
                    }
                    None => break,
                },
                _ = shutdown.cancelled() => {
                    rx.close();
                    while let Some(payment) = rx.recv().await {
                        store.record(payment);
                    }
                    break;
                }
            }
        }

        info!(recorded = store.len(), "Payment recorder stopped");
    })
}
