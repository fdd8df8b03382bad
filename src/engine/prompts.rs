//! Collaborator prompt builders.
//!
//! No scripting: the collaborator gets goals, guides, and context, and
//! figures out the conversation itself. Every structured reply follows the
//! same JSON contract the normalizer parses.

use crate::enrich::{LicenceProfile, WebHit};
use crate::geo::CoverageArea;
use crate::normalize::ServiceSelection;

/// System prompt for the greeting turn.
pub fn greeting_prompt() -> String {
    "You are the onboarding assistant for a trade-services marketplace. You help \
     Australian tradies get set up on the platform. You are warm, friendly, and speak \
     in natural Australian English.\n\n\
     Write a welcome message that:\n\
     - Greets them warmly\n\
     - Briefly explains what's about to happen: you'll look up their business, figure \
     out what services they offer, and sort out where they work — all in a couple of minutes\n\
     - Mentions you'll do most of the heavy lifting by pulling in their details automatically\n\
     - Asks for their business name or ABN to kick things off\n\
     - Feels like a real person, not a corporate form. Keep it concise — 3-4 short sentences.\n\
     - If they include a postcode with their business name (e.g. \"dans plumbing 2155\") \
     you can match them faster"
        .to_string()
}

/// Fallback greeting when the collaborator is unavailable.
pub const GREETING_FALLBACK: &str =
    "G'day! Let's get your business set up. What's your business name or ABN?";

/// Intent classification for a reply to identity candidates.
pub fn identity_intent_prompt(candidates_json: &str) -> String {
    format!(
        "You are the onboarding assistant. A tradie is verifying their business details.\n\n\
         REGISTRY RESULTS ON FILE: {candidates_json}\n\n\
         The user has responded to the registry results. Determine what they want:\n\
         - If they're confirming or selecting a business (yes, that's me, correct, selecting \
         by name, \"Yes, it's [NAME]\", etc): respond with JUST the word CONFIRMED\n\
         - If they're rejecting ALL options (no, wrong, not me, none of these, etc): respond \
         with JUST the word REJECTED\n\
         - If they're providing a new search term: respond with JUST the word NEWSEARCH\n\n\
         Respond with ONLY one word: CONFIRMED, REJECTED, or NEWSEARCH"
    )
}

/// Shared JSON contract text for service discovery replies.
const SERVICE_JSON_CONTRACT: &str = r#"Return a JSON object:
{"response": "your conversational message", "services": [array of mapped services with input, category_name, category_id, subcategory_name, subcategory_id, confidence], "buttons": ["2-4 button options that let the tradie answer your gap question with a tap"], "step_complete": true/false}

Return ONLY the JSON object."#;

/// First-turn service discovery prompt: full taxonomy plus enrichment
/// context.
pub fn service_discovery_prompt(
    business_name: &str,
    services: &[ServiceSelection],
    taxonomy_text: &str,
    licence: Option<&LicenceProfile>,
    web_hits: &[WebHit],
    conversation: &str,
) -> String {
    let mut licence_context = String::new();
    if let Some(licence) = licence {
        if !licence.classes.is_empty() {
            licence_context = format!(
                "\nLICENCE CLASSES ON RECORD: {}",
                licence.classes.join(", ")
            );
            if !licence.licence_number.is_empty() {
                licence_context.push_str(&format!(
                    "\nLicence #{} — Status: {}, Expiry: {}",
                    licence.licence_number, licence.status, licence.expiry_date
                ));
            }
            if !licence.compliance_clean {
                licence_context.push_str("\nCompliance issues on record");
            }
        }
    }

    let mut web_context = String::new();
    if !web_hits.is_empty() {
        let lines: Vec<String> = web_hits
            .iter()
            .take(3)
            .map(|hit| format!("- {}: {}", hit.title, hit.url))
            .collect();
        web_context = format!("\nWEB PRESENCE:\n{}", lines.join("\n"));
    }

    let services_json = serde_json::to_string(services).unwrap_or_else(|_| "[]".to_string());
    let mapped = if services.is_empty() {
        "None yet".to_string()
    } else {
        services_json
    };

    format!(
        "You are the onboarding assistant helping a tradie set up their services.\n\n\
         GOAL: Figure out what services this tradie offers and map them to the category \
         taxonomy. Ask smart questions about gaps — don't ask scripted questions, ask \
         relevant ones based on what you know about this trade.\n\n\
         CATEGORY TAXONOMY:\n{taxonomy_text}\n\n\
         GUIDELINES:\n\
         - This flows directly from business confirmation — the conversation is already \
         going. Don't re-introduce yourself.\n\
         - Be conversational and Australian. Keep it short — tradies are busy.\n\
         - Licence classes are your strongest signal — they tell you exactly what this \
         tradie is licensed for. Web results and business name add context.\n\
         - Map as many services as you can in one go. Keep the summary to a sentence or \
         two: mention the total count and group names, not every individual service.\n\
         - Then ask ONE short gap question — a service they likely offer but you haven't \
         mapped yet. Just the question, no preamble.\n\
         - When the tradie answers your gap question, update the list and wrap up. Two \
         turns max — be decisive.\n\n\
         {SERVICE_JSON_CONTRACT}\n\n\
         step_complete = true when: the tradie has confirmed or responded to the gap \
         question, or hasn't raised issues with the mapped services.\n\n\
         BUSINESS: {business_name}\n\
         SERVICES MAPPED SO FAR: {mapped}\
         {licence_context}\
         {web_context}\n\n\
         CONVERSATION SO FAR:\n{conversation}"
    )
}

/// Trimmed follow-up prompt: just update the list.
pub fn service_update_prompt(
    business_name: &str,
    services: &[ServiceSelection],
    relevant_taxonomy: &str,
) -> String {
    let services_json = serde_json::to_string(services).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You are updating a tradie's mapped services.\n\n\
         BUSINESS: {business_name}\n\
         CURRENT SERVICES: {services_json}\n\n\
         RELEVANT TAXONOMY (for looking up IDs if adding new services):\n{relevant_taxonomy}\n\n\
         The user responded to your gap question. Update the services list:\n\
         - If they want to add a service, add it with correct category_id/subcategory_id \
         from the taxonomy\n\
         - If they want to remove something, remove it\n\
         - Keep all existing services unless they explicitly asked to remove them\n\
         - Set step_complete = true — you're done\n\n\
         {SERVICE_JSON_CONTRACT}"
    )
}

/// Shared JSON contract text for service area replies.
const AREA_JSON_CONTRACT: &str = r#"Return a JSON object:
{"response": "your conversational message", "service_areas": {"base_suburb": "", "base_postcode": "", "radius_km": 20, "regions_included": ["region names they cover"], "regions_excluded": ["region names within radius they don't cover"], "barriers": ["relevant named barriers, if any"], "everywhere": false, "travel_notes": "brief note on coverage shape"}, "buttons": ["2-4 options matching likely region groupings — a tap beats typing"], "step_complete": true/false}

Set everywhere = true only if the tradie says they cover the whole city/state.

Use REAL region names from the grouped data above for regions_included and regions_excluded.
Return ONLY the JSON object."#;

/// First-turn service area prompt: nearby regions plus barrier context.
pub fn service_area_prompt(area: &CoverageArea, barrier_names: &[String]) -> String {
    let region_lines: Vec<String> = area
        .regions_included
        .iter()
        .map(|group| {
            let sample: Vec<&str> = group
                .localities
                .iter()
                .take(3)
                .map(|l| l.name.as_str())
                .collect();
            format!(
                "  - {} ({} suburbs, e.g. {})",
                group.name,
                group.localities.len(),
                sample.join(", ")
            )
        })
        .collect();
    let region_list = if region_lines.is_empty() {
        "No region data available".to_string()
    } else {
        region_lines.join("\n")
    };

    let total: usize = area
        .regions_included
        .iter()
        .map(|g| g.localities.len())
        .sum();

    let barrier_context = if barrier_names.is_empty() {
        String::new()
    } else {
        format!(
            "\nKNOWN BARRIERS NEAR THE BASE: {}",
            barrier_names.join(", ")
        )
    };

    format!(
        "You are the onboarding assistant helping a tradie define their service area.\n\n\
         GOAL: Figure out which REGIONS this tradie covers. Real coverage isn't a perfect \
         circle — it's a blob shaped by traffic, barriers, and preferences. Your job is to \
         identify which regions they include and which they exclude.\n\n\
         REGIONS WITHIN {radius}KM OF BASE ({base}):\n{region_list}\n\
         Total: {total} suburbs across these regions\
         {barrier_context}\n\n\
         GUIDELINES:\n\
         - This step flows directly from the service confirmation — the conversation is \
         already going. Don't re-introduce yourself.\n\
         - Be conversational and Australian. Keep it short.\n\
         - Talk in terms of regions/areas, not individual suburbs.\n\
         - Present the nearby regions and ask which ones they cover. One simple question, \
         no preamble. Offer buttons for likely groupings.\n\
         - When they tell you their areas, lock it in and move on. Two turns max — be \
         decisive, don't ask for confirmation of what they just told you.\n\n\
         {AREA_JSON_CONTRACT}\n\n\
         step_complete = true when the tradie has indicated which regions they cover.",
        radius = area.radius_km,
        base = area.base.suburb,
    )
}

/// Trimmed follow-up prompt: lock in the selection.
pub fn area_update_prompt(
    area: &CoverageArea,
    included: &[String],
    excluded: &[String],
    user_message: &str,
) -> String {
    let all_regions: Vec<&str> = area.included_names();
    format!(
        "You are finalizing a tradie's service area.\n\n\
         BASE: {base} ({postcode})\n\
         ALL REGIONS WITHIN {radius}KM: {all:?}\n\
         CURRENT SELECTION: included={included:?}, excluded={excluded:?}\n\n\
         USER SAID: \"{user_message}\"\n\n\
         Set regions_included to the regions they selected. Set regions_excluded to ALL \
         remaining regions from the list above. Set step_complete = true.\n\n\
         {AREA_JSON_CONTRACT}",
        base = area.base.suburb,
        postcode = area.base.postcode,
        radius = area.radius_km,
        all = all_regions,
    )
}

/// Intent classification for a reply to the review summary.
pub fn review_intent_prompt(summary: &str) -> String {
    format!(
        "A tradie is reviewing their setup summary. Determine their intent.\n\n\
         SUMMARY:\n{summary}\n\n\
         If they want to confirm/complete: respond CONFIRMED\n\
         If they want to edit services: respond EDIT_SERVICES\n\
         If they want to edit service areas: respond EDIT_AREAS\n\
         If they want to edit business details: respond EDIT_BUSINESS\n\n\
         Respond with ONLY one word."
    )
}

/// Intent classification for a free-text plan reply.
pub fn plan_intent_prompt() -> String {
    "A tradie is choosing a subscription plan: standard, plus, or pro (monthly billing), \
     or they can skip for now.\n\n\
     Determine which plan the user's message refers to. Respond with ONLY one word: \
     STANDARD, PLUS, PRO, or SKIP."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Adjustments, GeoDataset, GeoResolver};
    use crate::config::EngineConfig;
    use std::sync::Arc;

    fn sample_area() -> CoverageArea {
        let resolver =
            GeoResolver::new(Arc::new(GeoDataset::bundled()), &EngineConfig::default());
        let base = resolver.resolve_base("2095").unwrap();
        resolver.resolve(&base, Some(20.0), &Adjustments::default())
    }

    #[test]
    fn greeting_prompt_mentions_the_flow() {
        let prompt = greeting_prompt();
        assert!(prompt.contains("business name or ABN"));
        assert!(prompt.contains("postcode"));
    }

    #[test]
    fn identity_intent_prompt_lists_outcomes() {
        let prompt = identity_intent_prompt("[{\"abn\":\"111\"}]");
        assert!(prompt.contains("CONFIRMED"));
        assert!(prompt.contains("REJECTED"));
        assert!(prompt.contains("NEWSEARCH"));
        assert!(prompt.contains("111"));
    }

    #[test]
    fn service_discovery_prompt_carries_context() {
        let licence = LicenceProfile {
            classes: vec!["Plumber".into(), "Gasfitter".into()],
            licence_number: "123456C".into(),
            status: "Current".into(),
            expiry_date: "2027-03-14".into(),
            ..Default::default()
        };
        let hits = vec![WebHit {
            title: "Sample Plumbing".into(),
            url: "https://sampleplumbing.com.au".into(),
            snippet: String::new(),
        }];
        let prompt = service_discovery_prompt(
            "SAMPLE PLUMBING",
            &[],
            "Plumber (id: 2):\n  - General Plumbing (id: 201)",
            Some(&licence),
            &hits,
            "(No conversation yet)",
        );
        assert!(prompt.contains("SAMPLE PLUMBING"));
        assert!(prompt.contains("Plumber, Gasfitter"));
        assert!(prompt.contains("sampleplumbing.com.au"));
        assert!(prompt.contains("step_complete"));
        assert!(prompt.contains("None yet"));
    }

    #[test]
    fn service_update_prompt_is_trimmed() {
        let prompt = service_update_prompt("SAMPLE PLUMBING", &[], "Plumber (id: 2)");
        assert!(prompt.contains("CURRENT SERVICES: []"));
        assert!(prompt.contains("step_complete = true"));
        assert!(!prompt.contains("GOAL:"));
    }

    #[test]
    fn area_prompt_lists_regions_with_counts() {
        let area = sample_area();
        let prompt = service_area_prompt(&area, &["Sydney Harbour".to_string()]);
        assert!(prompt.contains("Northern Beaches"));
        assert!(prompt.contains("suburbs, e.g."));
        assert!(prompt.contains("KNOWN BARRIERS"));
        assert!(prompt.contains("service_areas"));
    }

    #[test]
    fn area_update_prompt_echoes_selection() {
        let area = sample_area();
        let prompt = area_update_prompt(
            &area,
            &["Northern Beaches".to_string()],
            &[],
            "just the beaches thanks",
        );
        assert!(prompt.contains("just the beaches thanks"));
        assert!(prompt.contains("Northern Beaches"));
    }

    #[test]
    fn review_intent_prompt_lists_edit_paths() {
        let prompt = review_intent_prompt("- Business: SAMPLE PLUMBING");
        assert!(prompt.contains("EDIT_SERVICES"));
        assert!(prompt.contains("EDIT_AREAS"));
        assert!(prompt.contains("EDIT_BUSINESS"));
        assert!(prompt.contains("SAMPLE PLUMBING"));
    }
}
