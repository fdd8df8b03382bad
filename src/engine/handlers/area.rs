//! Service area — deterministic geo resolution refined by the
//! collaborator's qualitative read of the conversation.
//!
//! The resolver stays authoritative: the collaborator only nominates
//! regions, barriers, and exclusions, and the area is recomputed wholesale
//! from those signals on every run. User-added exclusions persist across
//! recomputations for the life of the session.

use crate::engine::Engine;
use crate::engine::prompts;
use crate::geo::{Adjustments, BasePoint};
use crate::llm::{ChatMessage, CompletionRequest};
use crate::normalize::{CoveragePatch, QuickReply, StepResult, normalize};
use crate::session::model::Session;

pub(crate) const DONE_EDITING: &str = "Keep current areas, confirm and complete";

pub(crate) async fn run(engine: &Engine, session: &mut Session, input: Option<&str>) -> StepResult {
    if session
        .facts
        .coverage
        .as_ref()
        .is_some_and(|c| c.confirmed)
    {
        return StepResult::message("Service areas confirmed!").complete();
    }

    // Resolve the base point from the confirmed identity, falling back to
    // the user's message as a locality. Unresolvable input is an input
    // error: corrective prompt, state unchanged.
    let base = match resolve_base(engine, session, input) {
        Ok(base) => base,
        Err(result) => return *result,
    };

    // Deterministic edit paths (quick-match from the review edit buttons).
    if let Some(input) = input {
        if input == DONE_EDITING {
            session.facts.coverage_mut().confirmed = true;
            return StepResult::message("Service areas confirmed!").complete();
        }
        if let Some(region) = input
            .strip_prefix("Remove ")
            .and_then(|rest| rest.strip_suffix(" from my areas"))
        {
            let known_region = session
                .facts
                .coverage
                .as_ref()
                .and_then(|c| c.area.as_ref())
                .is_some_and(|a| a.included_names().contains(&region));
            if known_region {
                tracing::debug!(region = %region, "Quick-match: region excluded");
                let (exclusions, radius) = {
                    let coverage = session.facts.coverage_mut();
                    if !coverage.user_exclusions.iter().any(|r| r == region) {
                        coverage.user_exclusions.push(region.to_string());
                    }
                    (
                        coverage.user_exclusions.clone(),
                        coverage.area.as_ref().map(|a| a.radius_km),
                    )
                };
                let travel_notes = session
                    .facts
                    .coverage
                    .as_ref()
                    .and_then(|c| c.area.as_ref())
                    .map(|a| a.travel_notes.clone())
                    .unwrap_or_default();
                let area = engine.resolver.resolve(
                    &base,
                    radius,
                    &Adjustments {
                        exclude_regions: exclusions,
                        travel_notes,
                        ..Default::default()
                    },
                );
                let options = removal_options(&area.included_names());
                session.facts.coverage_mut().area = Some(area);
                return StepResult::message(format!(
                    "Dropped {region}. Anything else to change?"
                ))
                .with_options(options);
            }
        }
    }

    // Baseline resolution feeds the collaborator's region summary. Persisted
    // user exclusions always apply.
    let user_exclusions = session
        .facts
        .coverage
        .as_ref()
        .map(|c| c.user_exclusions.clone())
        .unwrap_or_default();
    let baseline = engine.resolver.resolve(
        &base,
        None,
        &Adjustments {
            exclude_regions: user_exclusions.clone(),
            ..Default::default()
        },
    );

    let is_follow_up = session
        .facts
        .coverage
        .as_ref()
        .is_some_and(|c| c.area.is_some());

    let prompt = if is_follow_up {
        let (included, excluded) = session
            .facts
            .coverage
            .as_ref()
            .and_then(|c| c.area.as_ref())
            .map(|a| {
                (
                    a.included_names().iter().map(|s| s.to_string()).collect(),
                    a.regions_excluded.clone(),
                )
            })
            .unwrap_or((Vec::new(), Vec::new()));
        prompts::area_update_prompt(&baseline, &included, &excluded, input.unwrap_or_default())
    } else {
        let barrier_names: Vec<String> = engine
            .resolver
            .dataset()
            .barriers()
            .iter()
            .filter(|b| b.state == base.state)
            .map(|b| b.name.clone())
            .collect();
        prompts::service_area_prompt(&baseline, &barrier_names)
    };

    let user_content = input.unwrap_or("Let's set up my service area");
    let request = CompletionRequest::new(vec![
        ChatMessage::system(prompt),
        ChatMessage::user(user_content),
    ])
    .with_max_tokens(2048);

    let response = match engine.llm.complete(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Service area collaborator call failed");
            return StepResult::message(format!(
                "Where do you typically work? You're based in {} — do you mainly work \
                 locally or travel further afield?",
                base.suburb
            ));
        }
    };

    let mut result = normalize(&response.content);

    // Recompute the coverage area wholesale from the collaborator's
    // qualitative signals.
    if let Some(ref patch) = result.facts.coverage {
        let area = recompute(engine, &base, &baseline.included_names(), patch, &user_exclusions);
        let coverage = session.facts.coverage_mut();
        // Only the user's own exclusions persist across recomputations;
        // barrier-derived ones are recomputed fresh each time.
        for exclusion in &patch.regions_excluded {
            if !coverage.user_exclusions.contains(exclusion) {
                coverage.user_exclusions.push(exclusion.clone());
            }
        }
        tracing::info!(
            included = area.regions_included.len(),
            excluded = area.regions_excluded.len(),
            complete = result.step_complete,
            follow_up = is_follow_up,
            "Service area turn settled"
        );
        coverage.area = Some(area);
    }

    {
        let coverage = session.facts.coverage_mut();
        coverage.confirmed = result.step_complete;
        if !result.step_complete {
            coverage.rounds += 1;
            if coverage.rounds >= engine.config.area_round_cap {
                tracing::warn!(
                    session = %session.id,
                    rounds = coverage.rounds,
                    "Service area round cap reached, forcing completion"
                );
                coverage.confirmed = true;
                result.step_complete = true;
            }
        }
    }

    result
}

/// Translate the collaborator's patch into resolver adjustments and
/// recompute. Regions nominated beyond the radius become high-demand
/// inclusions; regions within radius but not selected become exclusions.
fn recompute(
    engine: &Engine,
    base: &BasePoint,
    baseline_regions: &[&str],
    patch: &CoveragePatch,
    persisted_exclusions: &[String],
) -> crate::geo::CoverageArea {
    let mut exclude_regions: Vec<String> = persisted_exclusions.to_vec();
    for region in &patch.regions_excluded {
        if !exclude_regions.contains(region) {
            exclude_regions.push(region.clone());
        }
    }

    let boost_regions: Vec<String> = patch
        .regions_included
        .iter()
        .filter(|r| !baseline_regions.contains(&r.as_str()))
        .cloned()
        .collect();

    let adjustments = Adjustments {
        barriers: patch.barriers.clone(),
        boost_regions,
        exclude_regions,
        everywhere: patch.everywhere,
        travel_notes: patch.travel_notes.clone(),
    };

    engine.resolver.resolve(base, patch.radius_km, &adjustments)
}

fn resolve_base(
    engine: &Engine,
    session: &Session,
    input: Option<&str>,
) -> Result<BasePoint, Box<StepResult>> {
    let postcode = session
        .facts
        .confirmed_identity()
        .map(|i| i.postcode.clone())
        .unwrap_or_default();

    if !postcode.is_empty() {
        if let Ok(base) = engine.resolver.resolve_base(&postcode) {
            return Ok(base);
        }
    }
    if let Some(input) = input {
        if let Ok(base) = engine.resolver.resolve_base(input) {
            return Ok(base);
        }
    }

    tracing::debug!(postcode = %postcode, "Could not resolve a base locality");
    Err(Box::new(StepResult::message(
        "I couldn't place your home base on the map. Which suburb or postcode are you \
         based in?",
    )))
}

/// Removal buttons for the edit flow: one per included region, plus done.
pub(crate) fn removal_options(included: &[&str]) -> Vec<QuickReply> {
    let mut options: Vec<QuickReply> = included
        .iter()
        .map(|region| {
            QuickReply::new(
                format!("\u{2715} {region}"),
                format!("Remove {region} from my areas"),
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
    fn removal_options_cover_every_region() {
        let options = removal_options(&["Northern Beaches", "North Shore"]);
        assert_eq!(options.len(), 3);
        assert_eq!(options[0].value, "Remove Northern Beaches from my areas");
        assert_eq!(options[2].value, DONE_EDITING);
    }
}
