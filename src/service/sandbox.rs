//! Sandbox payment processor.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::ports::{CaptureOutcome, CaptureRequest, ProcessorError};
use crate::domain::{PaymentProcessor, SessionId};

/// Processor that approves every capture with a synthetic reference.
///
/// Captures are keyed by session: repeating one returns the reference
/// issued the first time.
#[derive(Debug, Clone, Default)]
pub struct SandboxProcessor {
    captured: Arc<Mutex<HashMap<SessionId, String>>>,
}

impl SandboxProcessor {
    /// Creates a new `SandboxProcessor`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentProcessor for SandboxProcessor {
    async fn capture(&self, request: &CaptureRequest) -> Result<CaptureOutcome, ProcessorError> {
        let mut captured = self.captured.lock().await;
        if let Some(reference) = captured.get(&request.session_id) {
            tracing::debug!(
                session_id = %request.session_id,
                %reference,
                "sandbox capture replayed"
            );
            return Ok(CaptureOutcome {
                success: true,
                reference: reference.clone(),
            });
        }

        let reference = format!("pi_sandbox_{}", Uuid::new_v4().simple());
        tracing::debug!(
            session_id = %request.session_id,
            amount_minor = request.amount_minor,
            currency = %request.currency,
            %reference,
            "sandbox capture"
        );
        captured.insert(request.session_id, reference.clone());
        Ok(CaptureOutcome {
            success: true,
            reference,
        })
    }
}
