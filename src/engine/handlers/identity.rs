//! Identity verification — registry search, disambiguation, confirmation,
//! and the enrichment fan-out on confirm.

use regex::Regex;

use crate::engine::Engine;
use crate::engine::prompts;
use crate::enrich::{Candidate, ConfirmedIdentity, SearchKind};
use crate::llm::{ChatMessage, CompletionRequest};
use crate::normalize::{QuickReply, StepResult};
use crate::session::model::Session;

const YES_SINGLE: &str = "Yes, that's my business";
const NO_SINGLE: &str = "No, that's not my business";
const NONE_OF_THESE: &str = "No, none of those are my business";

pub(crate) async fn run(engine: &Engine, session: &mut Session, input: Option<&str>) -> StepResult {
    let Some(input) = input else {
        return StepResult::message("What's your business name or ABN?");
    };

    let candidates: Vec<Candidate> = session
        .facts
        .identity
        .as_ref()
        .map(|i| i.candidates.clone())
        .unwrap_or_default();

    if candidates.is_empty() {
        return search_and_present(engine, session, input).await;
    }

    // Quick-match: a turn that deterministically selects or rejects a
    // previously offered option never goes through the collaborator.
    let lower = input.to_lowercase();
    if lower == YES_SINGLE.to_lowercase() && candidates.len() == 1 {
        tracing::debug!("Quick-match: single candidate confirmed");
        return confirm(engine, session, candidates[0].clone()).await;
    }
    if let Some(candidate) = candidates.iter().find(|c| {
        !c.abn.is_empty()
            && input.contains(&c.abn)
            && (lower.contains("yes") || lower.contains("it's"))
    }) {
        tracing::debug!(abn = %candidate.abn, "Quick-match: candidate selected by embedded ABN");
        return confirm(engine, session, candidate.clone()).await;
    }
    if lower == NO_SINGLE.to_lowercase() || lower == NONE_OF_THESE.to_lowercase() {
        return reject(session);
    }

    // Ambiguous reply — classify intent with the collaborator.
    let candidates_json = serde_json::to_string(&candidates).unwrap_or_else(|_| "[]".to_string());
    let request = CompletionRequest::new(vec![
        ChatMessage::system(prompts::identity_intent_prompt(&candidates_json)),
        ChatMessage::user(input),
    ])
    .with_max_tokens(16)
    .with_temperature(0.0);

    let intent = match engine.llm.complete(request).await {
        Ok(response) => response.content.trim().to_uppercase(),
        Err(e) => {
            tracing::warn!(error = %e, "Identity intent classification failed");
            return StepResult::message(
                "Sorry, I hit a snag there — could you try that again?",
            );
        }
    };
    tracing::debug!(intent = %intent, "Identity intent classified");

    if intent.contains("CONFIRMED") {
        let selected = candidates
            .iter()
            .find(|c| !c.abn.is_empty() && input.contains(&c.abn))
            .cloned()
            .unwrap_or_else(|| candidates[0].clone());
        return confirm(engine, session, selected).await;
    }
    if intent.contains("REJECTED") {
        return reject(session);
    }

    // NEWSEARCH — treat the message as a fresh search term.
    search_and_present(engine, session, input).await
}

/// Search the registry and present candidates. A trailing 4-digit postcode
/// narrows the results and auto-confirms a unique match.
async fn search_and_present(engine: &Engine, session: &mut Session, input: &str) -> StepResult {
    let trimmed = input.trim();
    let kind = SearchKind::detect(trimmed);

    let mut term = trimmed.to_string();
    let mut user_postcode: Option<String> = None;
    if kind == SearchKind::Name {
        let postcode_re = Regex::new(r"\b(\d{4})\s*$").expect("static regex");
        if let Some(captures) = postcode_re.captures(trimmed) {
            let stripped = trimmed[..captures.get(0).expect("match").start()].trim();
            if !stripped.is_empty() {
                user_postcode = Some(captures[1].to_string());
                term = stripped.to_string();
                tracing::debug!(postcode = %captures[1], term = %term, "Detected trailing postcode in search input");
            }
        }
    }

    let mut candidates = match engine.registry.search(&term, kind).await {
        Ok(candidates) => candidates,
        Err(e) => {
            // Transient registry failure: retry prompt, turn consumed,
            // state unchanged.
            tracing::warn!(error = %e, "Registry search failed");
            return StepResult::message(
                "I couldn't reach the business register just now — mind trying that \
                 again in a moment?",
            );
        }
    };

    {
        let identity = session.facts.identity_mut();
        identity.search_input = term.clone();
        identity.candidates.clear();
    }

    if candidates.is_empty() {
        return StepResult::message(format!(
            "I couldn't find a business matching '{term}' on the register. Could you \
             try a different name, or enter your ABN directly?"
        ));
    }

    if let Some(ref postcode) = user_postcode {
        let filtered: Vec<Candidate> = candidates
            .iter()
            .filter(|c| c.postcode == *postcode)
            .cloned()
            .collect();
        if filtered.len() == 1 {
            tracing::info!(postcode = %postcode, "Single match in postcode, auto-confirming");
            return confirm(engine, session, filtered.into_iter().next().expect("one")).await;
        }
        if !filtered.is_empty() {
            candidates = filtered;
        }
    }

    candidates.truncate(engine.config.max_candidates);
    let result = present_candidates(&candidates, &term);
    session.facts.identity_mut().candidates = candidates;
    result
}

fn present_candidates(candidates: &[Candidate], term: &str) -> StepResult {
    if candidates.len() == 1 {
        let c = &candidates[0];
        let gst = if c.gst_registered { "Yes" } else { "No" };
        let location = if c.postcode.is_empty() {
            c.state.clone()
        } else {
            format!("{} {}", c.state, c.postcode)
        };
        let message = format!(
            "I found a match on the register:\n\n\
             - Business: {}\n\
             - ABN: {}\n\
             - Type: {}\n\
             - GST Registered: {gst}\n\
             - Location: {location}\n\n\
             Is this your business?",
            c.entity_name, c.abn, c.entity_type
        );
        return StepResult::message(message).with_options(vec![
            QuickReply::new("Yes, that's me", YES_SINGLE),
            QuickReply::new("No, that's not right", NO_SINGLE),
        ]);
    }

    let mut options: Vec<QuickReply> = candidates
        .iter()
        .map(|c| {
            let location = if c.postcode.is_empty() {
                c.state.clone()
            } else {
                format!("{} {}", c.state, c.postcode)
            };
            let mut label = if location.is_empty() {
                c.entity_name.clone()
            } else {
                format!("{} ({location})", c.entity_name)
            };
            if label.len() > 45 {
                let short: String = c.entity_name.chars().take(30).collect();
                label = format!("{short}... ({location})");
            }
            QuickReply::new(label, format!("Yes, it's {} (ABN: {})", c.entity_name, c.abn))
        })
        .collect();
    options.push(QuickReply::new("None of these", NONE_OF_THESE));

    StepResult::message(format!(
        "I found {} matches for '{term}'. Which one is yours?",
        candidates.len()
    ))
    .with_options(options)
}

/// Confirm a candidate: record the identity, then fan out enrichment. Any
/// subset of enrichment may fail without blocking the turn.
async fn confirm(engine: &Engine, session: &mut Session, candidate: Candidate) -> StepResult {
    let identity = ConfirmedIdentity {
        business_name: candidate.entity_name,
        abn: candidate.abn,
        entity_type: candidate.entity_type,
        gst_registered: candidate.gst_registered,
        state: candidate.state,
        postcode: candidate.postcode,
    };

    {
        let slot = session.facts.identity_mut();
        slot.confirmed = Some(identity.clone());
        slot.verified = true;
        slot.candidates.clear();
    }

    let results = engine.enrichment.enrich(&identity).await;

    let contact_name = results
        .values()
        .find_map(|r| r.licence())
        .and_then(|l| l.contact_name.clone())
        .unwrap_or_default();
    let contact_phone = results
        .values()
        .find_map(|r| r.web_presence())
        .and_then(|w| w.contact_phone.clone())
        .unwrap_or_default();

    if !contact_name.is_empty() {
        tracing::info!(contact = %contact_name, "Contact person extracted from licence");
    }
    if !contact_phone.is_empty() {
        tracing::info!(phone = %contact_phone, "Contact phone extracted from web presence");
    }

    let enrichment = session.facts.enrichment_mut();
    enrichment.results = results;
    enrichment.contact_name = contact_name;
    enrichment.contact_phone = contact_phone;

    StepResult::message(format!(
        "Great, {} is confirmed!",
        identity.business_name
    ))
    .complete()
}

/// Rejection self-loop: clear the candidates and ask again.
fn reject(session: &mut Session) -> StepResult {
    let identity = session.facts.identity_mut();
    identity.candidates.clear();
    identity.verified = false;
    StepResult::message(
        "No worries! Could you try a different business name, or enter your ABN directly?",
    )
}
