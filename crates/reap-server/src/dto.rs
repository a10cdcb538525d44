use serde::Serialize;

use reap_core::InvocationOutcome;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub success: bool,
}

impl From<InvocationOutcome> for RunResponse {
    fn from(outcome: InvocationOutcome) -> Self {
        Self {
            success: outcome.success,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
