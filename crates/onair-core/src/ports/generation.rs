use async_trait::async_trait;

use crate::domain::Turn;
use crate::error::ShowError;

/// Language model collaborator.
///
/// Implementations classify their failures with
/// [`FailureKind`](crate::error::FailureKind) so the agent can decide whether
/// to retry. They must not retry internally.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Produce the next line for a persona.
    ///
    /// `history` is a snapshot of the shared conversation; the implementation
    /// decides how to render it into the provider's message format.
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[Turn],
        user_prompt: &str,
    ) -> Result<String, ShowError>;
}
