//! Profile review — summary, confirmation, and edit routing.
//!
//! Edit edges re-enter earlier nodes with merge semantics: the target node
//! keeps the session's current facts and only its confirmed flag is
//! cleared, so removals and additions are deltas, never resets.

use regex::Regex;

use crate::engine::Engine;
use crate::engine::node::NodeId;
use crate::engine::prompts;
use crate::llm::{ChatMessage, CompletionRequest};
use crate::normalize::{QuickReply, StepResult};
use crate::session::model::Session;

use super::{area, services};

pub(crate) const CONFIRM: &str = "Yes, confirm and complete";
pub(crate) const EDIT_SERVICES: &str = "I want to change my services";
pub(crate) const EDIT_AREAS: &str = "I want to change my service areas";

pub(crate) async fn run(engine: &Engine, session: &mut Session, input: Option<&str>) -> StepResult {
    // First entry (auto-chained) always shows the summary; intent is only
    // classified once the user has seen it.
    let Some(input) = input else {
        return summary(session);
    };

    // Quick-match: the offered option values resolve deterministically.
    match input {
        _ if input == CONFIRM => return confirm(session),
        _ if input == EDIT_SERVICES => return edit_services(session),
        _ if input == EDIT_AREAS => return edit_areas(session),
        _ => {}
    }

    // Structured removal fast path from the review UI:
    // "Keep ... confirm and complete. Remove services: X, Y. Remove areas: Z."
    if input.to_lowercase().contains("confirm and complete")
        && (input.to_lowercase().contains("remove services:")
            || input.to_lowercase().contains("remove areas:"))
    {
        return apply_structured_removals(engine, session, input);
    }

    // Free text — classify intent with the collaborator.
    let summary_text = summary_text(session);
    let request = CompletionRequest::new(vec![
        ChatMessage::system(prompts::review_intent_prompt(&summary_text)),
        ChatMessage::user(input),
    ])
    .with_max_tokens(16)
    .with_temperature(0.0);

    let intent = match engine.llm.complete(request).await {
        Ok(response) => response.content.trim().to_uppercase(),
        Err(e) => {
            tracing::warn!(error = %e, "Review intent classification failed");
            return StepResult::message(
                "Sorry, I missed that — tap a button below or tell me what to change.",
            );
        }
    };
    tracing::debug!(intent = %intent, "Review intent classified");

    if intent.contains("EDIT_SERVICES") {
        return edit_services(session);
    }
    if intent.contains("EDIT_AREAS") {
        return edit_areas(session);
    }
    if intent.contains("EDIT_BUSINESS") {
        return edit_business(session);
    }
    if intent.contains("CONFIRMED") {
        return confirm(session);
    }

    summary(session)
}

fn confirm(session: &mut Session) -> StepResult {
    session.reviewed = true;
    StepResult::message("Locked in!").complete()
}

/// Route back into ServiceDiscovery. Facts are kept; only the confirmed
/// flag and the round counter reset.
fn edit_services(session: &mut Session) -> StepResult {
    let options = {
        let facts = session.facts.services_mut();
        facts.confirmed = false;
        facts.rounds = 0;
        services::removal_options(&facts.services)
    };
    session.current_node = NodeId::ServiceDiscovery;
    tracing::info!(session = %session.id, "Edit edge: re-entering service discovery");
    StepResult::message("Tap any services to remove, or type to add more:").with_options(options)
}

/// Route back into ServiceArea, same merge semantics.
fn edit_areas(session: &mut Session) -> StepResult {
    let options = {
        let facts = session.facts.coverage_mut();
        facts.confirmed = false;
        facts.rounds = 0;
        let included: Vec<&str> = facts
            .area
            .as_ref()
            .map(|a| a.included_names())
            .unwrap_or_default();
        area::removal_options(&included)
    };
    session.current_node = NodeId::ServiceArea;
    tracing::info!(session = %session.id, "Edit edge: re-entering service area");
    StepResult::message("Tap any areas to remove, or type to add more:").with_options(options)
}

fn edit_business(session: &mut Session) -> StepResult {
    if let Some(identity) = session.facts.identity.as_mut() {
        identity.verified = false;
        identity.candidates.clear();
    }
    session.current_node = NodeId::IdentityVerification;
    tracing::info!(session = %session.id, "Edit edge: re-entering identity verification");
    StepResult::message("No worries — what's the correct business name or ABN?")
}

/// Apply "Remove services: ..." / "Remove areas: ..." deltas and confirm in
/// one deterministic step.
fn apply_structured_removals(
    engine: &Engine,
    session: &mut Session,
    input: &str,
) -> StepResult {
    let service_re = Regex::new(r"(?i)Remove services?:\s*(.+?)(?:\.|$)").expect("static regex");
    if let Some(captures) = service_re.captures(input) {
        let removed: Vec<String> = captures[1]
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let facts = session.facts.services_mut();
        facts
            .services
            .retain(|s| !removed.iter().any(|r| r == s.display_name()));
        facts.confirmed = true;
        tracing::info!(removed = removed.len(), "Structured service removal applied");
    }

    let area_re = Regex::new(r"(?i)Remove areas?:\s*(.+?)(?:\.|$)").expect("static regex");
    if let Some(captures) = area_re.captures(input) {
        let removed: Vec<String> = captures[1]
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let (base_query, radius, exclusions, travel_notes) = {
            let facts = session.facts.coverage_mut();
            for region in &removed {
                if !facts.user_exclusions.contains(region) {
                    facts.user_exclusions.push(region.clone());
                }
            }
            facts.confirmed = true;
            (
                facts
                    .area
                    .as_ref()
                    .map(|a| a.base.postcode.clone())
                    .unwrap_or_default(),
                facts.area.as_ref().map(|a| a.radius_km),
                facts.user_exclusions.clone(),
                facts
                    .area
                    .as_ref()
                    .map(|a| a.travel_notes.clone())
                    .unwrap_or_default(),
            )
        };

        if let Ok(base) = engine.resolver.resolve_base(&base_query) {
            let area = engine.resolver.resolve(
                &base,
                radius,
                &crate::geo::Adjustments {
                    exclude_regions: exclusions,
                    travel_notes,
                    ..Default::default()
                },
            );
            session.facts.coverage_mut().area = Some(area);
        }
        tracing::info!(removed = removed.len(), "Structured area removal applied");
    }

    confirm(session)
}

fn summary_text(session: &Session) -> String {
    let facts = &session.facts;
    let identity = facts.confirmed_identity().cloned().unwrap_or_default();

    let services = facts
        .services
        .as_ref()
        .map(|s| s.services.as_slice())
        .unwrap_or_default();
    let services_text = if services.is_empty() {
        "Not set".to_string()
    } else {
        services
            .iter()
            .map(|s| s.display_name().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut trades: Vec<&str> = services
        .iter()
        .map(|s| s.category_name.as_str())
        .filter(|c| !c.is_empty())
        .collect();
    trades.dedup();
    let trade_text = if trades.is_empty() {
        "Not set".to_string()
    } else {
        trades.join(", ")
    };

    let mut lines = vec![
        "Here's a summary of your setup:".to_string(),
        String::new(),
        format!("- Business: {}", identity.business_name),
        format!("- ABN: {}", identity.abn),
        format!("- Trade: {trade_text}"),
    ];

    if let Some(enrichment) = facts.enrichment.as_ref() {
        if !enrichment.contact_name.is_empty() {
            lines.push(format!("- Contact: {}", enrichment.contact_name));
        }
        if !enrichment.contact_phone.is_empty() {
            lines.push(format!("- Phone: {}", enrichment.contact_phone));
        }
    }

    lines.push(format!("- Services: {services_text}"));

    if let Some(area) = facts.coverage.as_ref().and_then(|c| c.area.as_ref()) {
        let included = area.included_names().join(", ");
        lines.push(format!("- Based in: {}", area.base.suburb));
        lines.push(format!(
            "- Coverage: {} (within {}km)",
            if included.is_empty() { "Not set" } else { &included },
            area.radius_km
        ));
        if !area.regions_excluded.is_empty() {
            lines.push(format!("- Excluding: {}", area.regions_excluded.join(", ")));
        }
    }

    lines.push(String::new());
    lines.push("Everything look good?".to_string());
    lines.join("\n")
}

fn summary(session: &Session) -> StepResult {
    StepResult::message(summary_text(session)).with_options(vec![
        QuickReply::new("All good, let's go", CONFIRM),
        QuickReply::new("Edit Services", EDIT_SERVICES),
        QuickReply::new("Edit Service Areas", EDIT_AREAS),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::ConfirmedIdentity;
    use crate::normalize::ServiceSelection;

    fn seeded_session() -> Session {
        let mut session = Session::new();
        session.facts.identity_mut().confirmed = Some(ConfirmedIdentity {
            business_name: "SAMPLE PLUMBING".into(),
            abn: "51824753556".into(),
            entity_type: "Company".into(),
            gst_registered: true,
            state: "NSW".into(),
            postcode: "2095".into(),
        });
        session.facts.services_mut().services = vec![ServiceSelection {
            category_name: "Plumber".into(),
            subcategory_name: "Blocked Drains".into(),
            ..Default::default()
        }];
        session
    }

    #[test]
    fn summary_lists_key_facts() {
        let session = seeded_session();
        let result = summary(&session);
        assert!(result.message.contains("SAMPLE PLUMBING"));
        assert!(result.message.contains("51824753556"));
        assert!(result.message.contains("Blocked Drains"));
        assert!(result.message.contains("Everything look good?"));
        let options = result.options.unwrap();
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].value, CONFIRM);
    }

    #[test]
    fn edit_services_clears_only_the_confirmed_flag() {
        let mut session = seeded_session();
        session.facts.services_mut().confirmed = true;
        session.current_node = NodeId::ProfileReview;

        let result = edit_services(&mut session);
        assert_eq!(session.current_node, NodeId::ServiceDiscovery);
        let facts = session.facts.services.as_ref().unwrap();
        assert!(!facts.confirmed);
        // The mapped services survive the edit re-entry
        assert_eq!(facts.services.len(), 1);
        assert!(result.options.unwrap().len() >= 2);
    }

    #[test]
    fn confirm_sets_reviewed() {
        let mut session = seeded_session();
        let result = confirm(&mut session);
        assert!(session.reviewed);
        assert!(result.step_complete);
    }
}
