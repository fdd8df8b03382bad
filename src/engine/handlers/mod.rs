//! Node handlers. Behavior lives here; the node entities themselves are
//! stateless descriptors.

pub mod area;
pub mod identity;
pub mod plan;
pub mod review;
pub mod services;

use crate::engine::Engine;
use crate::error::InvariantViolation;
use crate::llm::{ChatMessage, CompletionRequest};
use crate::normalize::StepResult;
use crate::session::model::{FinalRecord, Session};

use super::prompts;

/// Greeting — the collaborator writes the welcome; a fixed fallback covers
/// collaborator outages.
pub(super) async fn greeting(engine: &Engine, session: &mut Session) -> StepResult {
    let request = CompletionRequest::new(vec![
        ChatMessage::system(prompts::greeting_prompt()),
        ChatMessage::user("Hi, I'd like to get set up."),
    ])
    .with_max_tokens(512);

    let message = match engine.llm.complete(request).await {
        Ok(response) => response.content,
        Err(e) => {
            tracing::warn!(error = %e, "Greeting collaborator call failed, using fallback");
            prompts::GREETING_FALLBACK.to_string()
        }
    };

    session.greeted = true;
    StepResult::message(message).complete()
}

/// Complete — assemble the final record exactly once.
pub(super) fn complete(session: &mut Session) -> StepResult {
    if session.final_record.is_some() {
        // Final records are immutable; a second arrival here is a bug.
        let violation = InvariantViolation::FinalRecordRewrite { id: session.id };
        tracing::error!(session = %session.id, error = %violation, "Refusing to rewrite final record");
        session.completed = true;
        return StepResult::message("Your profile is already live.").complete();
    }

    let record = FinalRecord::from_facts(&session.facts);
    tracing::info!(
        session = %session.id,
        business = %record.business_name,
        services = record.services.len(),
        "Onboarding complete, final record produced"
    );
    session.final_record = Some(record);
    session.completed = true;

    StepResult::message(
        "You're all set! Your profile is ready — you'll start getting matched with \
         relevant jobs in your area soon. Welcome aboard!",
    )
    .complete()
}
