//! Service discovery — map the tradie's services against the taxonomy
//! through natural conversation, with a clarification round cap.

use crate::engine::Engine;
use crate::engine::prompts;
use crate::llm::{ChatMessage, CompletionRequest};
use crate::normalize::{QuickReply, ServiceSelection, StepResult, normalize};
use crate::session::model::Session;

pub(crate) const DONE_EDITING: &str = "Keep current services, confirm and complete";

pub(crate) async fn run(engine: &Engine, session: &mut Session, input: Option<&str>) -> StepResult {
    if session
        .facts
        .services
        .as_ref()
        .is_some_and(|s| s.confirmed)
    {
        return StepResult::message("Services locked in!").complete();
    }

    // Deterministic edit paths (quick-match from the review edit buttons).
    if let Some(input) = input {
        if input == DONE_EDITING {
            session.facts.services_mut().confirmed = true;
            return StepResult::message("Services locked in!").complete();
        }
        if let Some(name) = input.strip_prefix("Remove ") {
            let services = session.facts.services_mut();
            let before = services.services.len();
            services.services.retain(|s| s.display_name() != name);
            if services.services.len() < before {
                tracing::debug!(service = %name, "Quick-match: service removed");
                let options = removal_options(&services.services);
                return StepResult::message(format!(
                    "Removed {name}. Anything else to change?"
                ))
                .with_options(options);
            }
        }
    }

    let business_name = session.facts.business_name().to_string();
    let current: Vec<ServiceSelection> = session
        .facts
        .services
        .as_ref()
        .map(|s| s.services.clone())
        .unwrap_or_default();
    let is_follow_up = !current.is_empty();

    let licence = session
        .facts
        .enrichment
        .as_ref()
        .and_then(|e| e.licence().cloned());
    let licence_classes = licence
        .as_ref()
        .map(|l| l.classes.clone())
        .unwrap_or_default();
    let web_hits = session
        .facts
        .enrichment
        .as_ref()
        .map(|e| e.web_hits())
        .unwrap_or_default();

    let prompt = if is_follow_up {
        let current_categories: Vec<String> = {
            let mut names: Vec<String> = current
                .iter()
                .map(|s| s.category_name.clone())
                .filter(|n| !n.is_empty())
                .collect();
            names.sort();
            names.dedup();
            names
        };
        prompts::service_update_prompt(
            &business_name,
            &current,
            &engine.taxonomy.as_prompt_text_for(&current_categories),
        )
    } else {
        let mut prompt = prompts::service_discovery_prompt(
            &business_name,
            &current,
            &engine.taxonomy.as_prompt_text(),
            licence.as_ref(),
            &web_hits,
            &session.recent_conversation(4),
        );
        let gaps = engine
            .taxonomy
            .gaps(&current, &business_name, &licence_classes);
        if !gaps.is_empty() {
            let names: Vec<&str> = gaps.iter().take(8).map(|g| g.subcategory_name.as_str()).collect();
            prompt.push_str(&format!(
                "\n\nSUBCATEGORIES NOT YET MAPPED FOR THIS TRADE (gap question material): {}",
                names.join(", ")
            ));
        }
        prompt
    };

    let user_content = input.unwrap_or("Let's set up my services");
    let request = CompletionRequest::new(vec![
        ChatMessage::system(prompt),
        ChatMessage::user(user_content),
    ])
    .with_max_tokens(2048);

    let response = match engine.llm.complete(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Service discovery collaborator call failed");
            return StepResult::message(format!(
                "What services does {business_name} offer? Just tell me in your own words."
            ));
        }
    };

    let mut result = normalize(&response.content);

    {
        let services = session.facts.services_mut();
        if let Some(ref updated) = result.facts.services {
            services.services = updated.clone();
        }
        services.raw_input = input
            .map(String::from)
            .unwrap_or_else(|| format!("Inferred from: {business_name}"));
        services.confirmed = result.step_complete;

        if !result.step_complete {
            services.rounds += 1;
            if services.rounds >= engine.config.service_round_cap {
                tracing::warn!(
                    session = %session.id,
                    rounds = services.rounds,
                    "Service discovery round cap reached, forcing completion"
                );
                services.confirmed = true;
                result.step_complete = true;
            }
        }

        tracing::info!(
            mapped = services.services.len(),
            complete = services.confirmed,
            follow_up = is_follow_up,
            "Service discovery turn settled"
        );
    }

    result
}

/// Removal buttons for the edit flow: one per mapped service, plus done.
pub(crate) fn removal_options(services: &[ServiceSelection]) -> Vec<QuickReply> {
    let mut options: Vec<QuickReply> = services
        .iter()
        .map(|s| {
            QuickReply::new(
                format!("\u{2715} {}", s.display_name()),
                format!("Remove {}", s.display_name()),
            )
        })
        .collect();
    options.push(QuickReply::new("Done editing", DONE_EDITING));
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal_options_cover_every_service() {
        let services = vec![
            ServiceSelection {
                subcategory_name: "Blocked Drains".into(),
                ..Default::default()
            },
            ServiceSelection {
                input: "odd jobs".into(),
                ..Default::default()
            },
        ];
        let options = removal_options(&services);
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].value, "Remove Blocked Drains");
        // Falls back to the raw input when unmapped
        assert_eq!(options[1].value, "Remove odd jobs");
        assert_eq!(options[2].value, DONE_EDITING);
    }
}
