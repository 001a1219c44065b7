//! Upstream payment processors.
//!
//! [`PaymentProcessor`] is the submit-payment capability the router drives
//! through each processor's circuit breaker. [`HttpPaymentProcessor`] is the
//! production implementation; tests substitute their own.

pub mod client;
pub mod context;

pub use client::{ClientConfig, HttpPaymentProcessor};
pub use context::CallContext;

use crate::error::Result;
use crate::payment::Payment;
use async_trait::async_trait;

/// Performs one payment submission against one upstream. Implementations
/// never retry; retry and fallback belong to the router.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Processor name used in logs and metrics
    fn name(&self) -> &str;

    /// Submit `payment`, honoring the deadline and cancellation in `ctx`
    async fn process_payment(&self, ctx: &CallContext, payment: &Payment) -> Result<()>;
}
