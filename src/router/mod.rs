//! Payment routing strategy.
//!
//! This is not an HTTP router: it decides which processor handles a payment.
//! The default processor is always tried first; any failure, including a
//! breaker rejection, falls through to the fallback processor. Attempts are
//! strictly sequential and split the caller's deadline, so a hung default
//! still leaves the fallback its share of the budget.

use crate::circuit_breaker::{BreakerError, CircuitBreaker, CircuitState};
use crate::error::{GatewayError, Result};
use crate::metrics;
use crate::payment::{Payment, ProcessorType};
use crate::processor::{CallContext, PaymentProcessor};
use std::sync::Arc;
use tracing::{error, info, warn};

/// A processor client paired with the breaker guarding it
#[derive(Clone)]
pub struct Processor {
    kind: ProcessorType,
    client: Arc<dyn PaymentProcessor>,
    breaker: Arc<CircuitBreaker>,
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("kind", &self.kind)
            .field("client", &self.client.name())
            .field("breaker", &self.breaker)
            .finish()
    }
}

impl Processor {
    pub fn new(
        kind: ProcessorType,
        client: Arc<dyn PaymentProcessor>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            kind,
            client,
            breaker,
        }
    }

    /// One breaker-gated submission
    async fn attempt(
        &self,
        ctx: &CallContext,
        payment: &Payment,
    ) -> std::result::Result<(), BreakerError<GatewayError>> {
        self.breaker
            .execute(|| self.client.process_payment(ctx, payment))
            .await
    }
}

/// Routes payments across the default and fallback processors
#[derive(Debug, Clone)]
pub struct PaymentRouter {
    default: Processor,
    fallback: Processor,
}

impl PaymentRouter {
    pub fn new(default: Processor, fallback: Processor) -> Self {
        Self { default, fallback }
    }

    /// Drive `payment` to a terminal state.
    ///
    /// Fails only when the payment was already terminal on entry; every
    /// upstream failure is folded into the payment itself.
    pub async fn route_payment(&self, ctx: &CallContext, payment: &mut Payment) -> Result<()> {
        if payment.is_terminal() {
            return Err(GatewayError::InvalidTransition(format!(
                "payment {} was already routed",
                payment.correlation_id
            )));
        }

        info!(correlation_id = %payment.correlation_id, "Routing payment");

        let default_result = self.default.attempt(&ctx.for_attempt(2), payment).await;
        let default_err = match default_result {
            Ok(()) => return self.finish_processed(payment, self.default.kind),
            Err(e) => e,
        };

        if default_err.is_rejected() {
            warn!(
                correlation_id = %payment.correlation_id,
                processor = %self.default.kind,
                "Default processor skipped, circuit open; trying fallback"
            );
        } else {
            warn!(
                correlation_id = %payment.correlation_id,
                processor = %self.default.kind,
                error = %default_err,
                "Default processor failed; trying fallback"
            );
        }

        let fallback_result = self.fallback.attempt(&ctx.for_attempt(1), payment).await;
        let fallback_err = match fallback_result {
            Ok(()) => return self.finish_processed(payment, self.fallback.kind),
            Err(e) => e,
        };

        let message = format!(
            "{} processor failed [{}]; {} processor also failed [{}]",
            self.default.kind, default_err, self.fallback.kind, fallback_err
        );
        payment.mark_failed(message)?;
        metrics::record_payment_outcome("failed");

        error!(
            correlation_id = %payment.correlation_id,
            reason = payment.error_message.as_deref().unwrap_or_default(),
            "Payment failed on both processors"
        );

        Ok(())
    }

    /// Current breaker states, default first
    pub fn breaker_states(&self) -> [(ProcessorType, CircuitState); 2] {
        [
            (self.default.kind, self.default.breaker.state()),
            (self.fallback.kind, self.fallback.breaker.state()),
        ]
    }

    fn finish_processed(&self, payment: &mut Payment, by: ProcessorType) -> Result<()> {
        payment.mark_processed(by)?;
        metrics::record_payment_outcome(by.as_str());
        info!(
            correlation_id = %payment.correlation_id,
            processor = %by,
            "Payment processed"
        );
        Ok(())
    }
}
