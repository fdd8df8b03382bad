//! Plan selection — tier presentation and deterministic selection.

use crate::engine::Engine;
use crate::engine::prompts;
use crate::llm::{ChatMessage, CompletionRequest};
use crate::normalize::{PlanChoice, QuickReply, StepResult};
use crate::session::model::{PlanFacts, Session};

/// Offered tiers: (key, display name, monthly price).
const PLANS: &[(&str, &str, &str)] = &[
    ("standard", "Standard", "$49/mo"),
    ("plus", "Plus", "$79/mo"),
    ("pro", "Pro", "$129/mo"),
];

pub(crate) async fn run(engine: &Engine, session: &mut Session, input: Option<&str>) -> StepResult {
    if session.facts.plan.is_some() {
        return StepResult::message("Plan locked in!").complete();
    }

    let Some(input) = input else {
        return present_plans();
    };

    // Quick-match on the structured option values.
    if let Some(key) = input.strip_prefix("plan:") {
        if let Some(result) = select(session, key) {
            tracing::debug!(plan = %key, "Quick-match: plan selected");
            return result;
        }
    }

    // Plain mentions of a tier are just as deterministic.
    let lower = input.to_lowercase();
    for (key, _, _) in PLANS {
        if lower.contains(key) {
            if let Some(result) = select(session, key) {
                return result;
            }
        }
    }
    if lower.contains("skip") || lower.contains("later") {
        return select(session, "skip").expect("skip is always valid");
    }

    // Free text — let the collaborator decide which tier they meant.
    let request = CompletionRequest::new(vec![
        ChatMessage::system(prompts::plan_intent_prompt()),
        ChatMessage::user(input),
    ])
    .with_max_tokens(8)
    .with_temperature(0.0);

    let intent = match engine.llm.complete(request).await {
        Ok(response) => response.content.trim().to_lowercase(),
        Err(e) => {
            tracing::warn!(error = %e, "Plan intent classification failed");
            return present_plans();
        }
    };

    for key in ["standard", "plus", "pro", "skip"] {
        if intent.contains(key) {
            if let Some(result) = select(session, key) {
                return result;
            }
        }
    }

    present_plans()
}

fn present_plans() -> StepResult {
    let lines: Vec<String> = PLANS
        .iter()
        .map(|(_, name, price)| format!("- {name}: {price}"))
        .collect();
    let mut options: Vec<QuickReply> = PLANS
        .iter()
        .map(|(key, name, price)| QuickReply::new(format!("{name} ({price})"), format!("plan:{key}")))
        .collect();
    options.push(QuickReply::new("Skip for now", "plan:skip"));

    StepResult::message(format!(
        "Last step — pick a plan:\n\n{}\n\nYou can change or cancel any time, or skip \
         for now and decide later.",
        lines.join("\n")
    ))
    .with_options(options)
}

fn select(session: &mut Session, key: &str) -> Option<StepResult> {
    if key == "skip" {
        session.facts.plan = Some(PlanFacts {
            choice: PlanChoice {
                plan: "skip".to_string(),
                billing: None,
                price: None,
            },
        });
        tracing::info!(session = %session.id, "Plan selection skipped");
        return Some(
            StepResult::message("No worries — you can pick a plan any time from your profile.")
                .complete(),
        );
    }

    let (_, name, price) = PLANS.iter().find(|(k, _, _)| *k == key)?;
    session.facts.plan = Some(PlanFacts {
        choice: PlanChoice {
            plan: key.to_string(),
            billing: Some("monthly".to_string()),
            price: Some(price.to_string()),
        },
    });
    tracing::info!(session = %session.id, plan = %key, "Plan selected");
    Some(StepResult::message(format!("You're on the {name} plan ({price}).")).complete())
}
