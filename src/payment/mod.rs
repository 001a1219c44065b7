//! Payment intents and their lifecycle.
//!
//! A [`Payment`] is created `Pending` and reaches exactly one terminal state,
//! `Processed` (with the processor that handled it) or `Failed`.

pub mod summary;

pub use summary::{PaymentSummary, ProcessorSummary, SummaryFilter, SummaryRequest, SummaryStats};

use crate::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which upstream processor handled a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessorType {
    Default,
    Fallback,
}

impl ProcessorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessorType::Default => "default",
            ProcessorType::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ProcessorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processed => "processed",
            PaymentStatus::Failed => "failed",
        }
    }
}

/// A single payment intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub correlation_id: String,
    pub amount: f64,
    pub requested_at: DateTime<Utc>,
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<ProcessorType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Inbound payment intent as received from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub correlation_id: String,
    pub amount: f64,
}

/// Body sent to an upstream processor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProcessorRequest {
    pub correlation_id: String,
    pub amount: f64,
    pub requested_at: DateTime<Utc>,
}

impl PaymentRequest {
    /// Correlation ID must be a UUID and the amount a positive finite number
    pub fn validate(&self) -> Result<()> {
        if self.correlation_id.is_empty() {
            return Err(GatewayError::InvalidPayment(
                "correlationId is required".to_string(),
            ));
        }

        Uuid::parse_str(&self.correlation_id).map_err(|e| {
            GatewayError::InvalidPayment(format!(
                "correlationId '{}' is not a valid UUID: {}",
                self.correlation_id, e
            ))
        })?;

        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(GatewayError::InvalidPayment(format!(
                "amount must be greater than zero, got {}",
                self.amount
            )));
        }

        Ok(())
    }

    pub fn into_payment(self) -> Payment {
        Payment::new(self.correlation_id, self.amount)
    }
}

impl Payment {
    /// Create a pending payment stamped with the current time
    pub fn new(correlation_id: impl Into<String>, amount: f64) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            amount,
            requested_at: Utc::now(),
            status: PaymentStatus::Pending,
            processed_by: None,
            processed_at: None,
            error_message: None,
        }
    }

    /// Processed or Failed
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, PaymentStatus::Processed | PaymentStatus::Failed)
    }

    pub fn mark_processed(&mut self, processor: ProcessorType) -> Result<()> {
        self.ensure_pending()?;
        self.status = PaymentStatus::Processed;
        self.processed_by = Some(processor);
        self.processed_at = Some(Utc::now());
        self.error_message = None;
        Ok(())
    }

    pub fn mark_failed(&mut self, error_message: impl Into<String>) -> Result<()> {
        self.ensure_pending()?;
        self.status = PaymentStatus::Failed;
        self.processed_by = None;
        self.processed_at = Some(Utc::now());
        self.error_message = Some(error_message.into());
        Ok(())
    }

    pub fn to_processor_request(&self) -> PaymentProcessorRequest {
        PaymentProcessorRequest {
            correlation_id: self.correlation_id.clone(),
            amount: self.amount,
            requested_at: self.requested_at,
        }
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.is_terminal() {
            return Err(GatewayError::InvalidTransition(format!(
                "payment {} is already {}",
                self.correlation_id,
                self.status.as_str()
            )));
        }
        Ok(())
    }
}
