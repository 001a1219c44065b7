use super::{Payment, PaymentStatus, ProcessorType};
use crate::error::{GatewayError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Running totals for one processor
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorSummary {
    pub total_requests: u64,
    pub total_amount: f64,
}

impl ProcessorSummary {
    fn add(&mut self, amount: f64) {
        self.total_requests += 1;
        self.total_amount += amount;
    }

    fn merge(&mut self, other: &ProcessorSummary) {
        self.total_requests += other.total_requests;
        self.total_amount += other.total_amount;
    }
}

/// Per-processor totals of successfully processed payments
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentSummary {
    pub default: ProcessorSummary,
    pub fallback: ProcessorSummary,
}

/// Summary with derived percentages and averages
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    #[serde(flatten)]
    pub summary: PaymentSummary,
    pub default_percentage: f64,
    pub fallback_percentage: f64,
    pub average_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_range: Option<String>,
}

/// Raw `from`/`to` query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryRequest {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Inclusive time window; an absent bound is unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SummaryFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl SummaryRequest {
    /// Parse RFC3339 bounds and check `to` is not before `from`
    pub fn parse(&self) -> Result<SummaryFilter> {
        let from = parse_bound("from", self.from.as_deref())?;
        let to = parse_bound("to", self.to.as_deref())?;

        if let (Some(from), Some(to)) = (from, to) {
            if to < from {
                return Err(GatewayError::InvalidRange(
                    "'to' parameter must be after 'from' parameter".to_string(),
                ));
            }
        }

        Ok(SummaryFilter { from, to })
    }
}

fn parse_bound(name: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| GatewayError::InvalidRange(format!("invalid '{}' parameter: {}", name, e))),
    }
}

impl SummaryFilter {
    /// Checks the processed-at time, or requested-at when not yet terminal
    pub fn contains(&self, payment: &Payment) -> bool {
        let at = payment.processed_at.unwrap_or(payment.requested_at);
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }

    fn label(&self) -> Option<String> {
        if self.from.is_none() && self.to.is_none() {
            return None;
        }
        let fmt = |bound: Option<DateTime<Utc>>| {
            bound.map_or_else(
                || "*".to_string(),
                |dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true),
            )
        };
        Some(format!("{} to {}", fmt(self.from), fmt(self.to)))
    }
}

impl PaymentSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a payment if it was processed; other statuses are ignored
    pub fn add_payment(&mut self, payment: &Payment) {
        if payment.status != PaymentStatus::Processed {
            return;
        }

        match payment.processed_by {
            Some(ProcessorType::Default) => self.default.add(payment.amount),
            Some(ProcessorType::Fallback) => self.fallback.add(payment.amount),
            None => {}
        }
    }

    pub fn merge(&mut self, other: &PaymentSummary) {
        self.default.merge(&other.default);
        self.fallback.merge(&other.fallback);
    }

    pub fn total_requests(&self) -> u64 {
        self.default.total_requests + self.fallback.total_requests
    }

    pub fn total_amount(&self) -> f64 {
        self.default.total_amount + self.fallback.total_amount
    }

    pub fn is_empty(&self) -> bool {
        self.total_requests() == 0
    }

    pub fn stats(&self, filter: Option<&SummaryFilter>) -> SummaryStats {
        let total = self.total_requests();
        let (default_percentage, fallback_percentage, average_amount) = if total > 0 {
            let total = total as f64;
            (
                self.default.total_requests as f64 / total * 100.0,
                self.fallback.total_requests as f64 / total * 100.0,
                self.total_amount() / total,
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        SummaryStats {
            summary: *self,
            default_percentage,
            fallback_percentage,
            average_amount,
            time_range: filter.and_then(SummaryFilter::label),
        }
    }
}
