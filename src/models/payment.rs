use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::Plan;

/// A payment created with the processor and awaiting execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPayment {
    pub user_id: Uuid,
    pub plan: Plan,
    pub created_at: DateTime<Utc>,
}

/// A payment as created by the processor.
#[derive(Debug, Clone)]
pub struct CreatedPayment {
    pub id: String,
    /// Where the payer approves the payment.
    pub approval_url: String,
}

/// What the bridge asks the processor to charge.
#[derive(Debug, Clone)]
pub struct PaymentIntent {
    /// Amount in USD, formatted with two decimals.
    pub total: String,
    pub description: String,
    pub return_url: String,
    pub cancel_url: String,
}

/// Processor-side payment state as reported by `find`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRecord {
    pub id: String,
    /// `created`, `approved`, `failed`...
    pub state: String,
}
