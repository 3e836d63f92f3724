use dashmap::DashMap;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Settled,
    Rejected,
}

/// Opaque payment gateway seam. Proof verification is delegated entirely:
/// the core only refuses to finalize an online order until `confirm`
/// reports `Settled`.
pub trait PaymentProvider: Send + Sync {
    fn create_intent(&self, amount: u64) -> Result<String, AppError>;
    fn confirm(&self, provider_ref: &str, proof: &str) -> PaymentOutcome;
}

/// Stand-in gateway used in development and tests: issues local refs and
/// settles any non-empty proof for a known ref.
#[derive(Default)]
pub struct InProcessPayments {
    intents: DashMap<String, u64>,
}

impl InProcessPayments {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PaymentProvider for InProcessPayments {
    fn create_intent(&self, amount: u64) -> Result<String, AppError> {
        let provider_ref = format!("pi_{}", Uuid::new_v4().simple());
        self.intents.insert(provider_ref.clone(), amount);
        Ok(provider_ref)
    }

    fn confirm(&self, provider_ref: &str, proof: &str) -> PaymentOutcome {
        if proof.trim().is_empty() || !self.intents.contains_key(provider_ref) {
            return PaymentOutcome::Rejected;
        }
        PaymentOutcome::Settled
    }
}
