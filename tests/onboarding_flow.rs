//! End-to-end engine tests with a scripted collaborator and stub external
//! services — no network, no real LLM.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use trade_onboard::config::EngineConfig;
use trade_onboard::engine::Engine;
use trade_onboard::engine::node::NodeId;
use trade_onboard::enrich::{
    Candidate, ConfirmedIdentity, EnrichmentCoordinator, EnrichmentPayload, EnrichmentResult,
    EnrichmentService, IdentityRegistry, LicenceProfile, SearchKind, WebHit, WebPresence,
};
use trade_onboard::error::{CollaboratorError, EnrichmentFailure, RegistryError};
use trade_onboard::geo::{GeoDataset, GeoResolver};
use trade_onboard::llm::{CompletionRequest, CompletionResponse, LlmProvider};
use trade_onboard::session::{InMemorySessionStore, SessionStore};
use trade_onboard::taxonomy::Taxonomy;

// ── Stubs ───────────────────────────────────────────────────────────────

struct ScriptedCollaborator {
    responses: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedCollaborator {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedCollaborator {
    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, CollaboratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.responses.lock().unwrap().pop_front() {
            Some(content) => Ok(CompletionResponse { content }),
            None => Err(CollaboratorError::RequestFailed {
                provider: "scripted".to_string(),
                reason: "script exhausted".to_string(),
            }),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct StubRegistry {
    candidates: Vec<Candidate>,
    fail: bool,
}

impl StubRegistry {
    fn with_sample() -> Self {
        Self {
            candidates: vec![Candidate {
                abn: "51824753556".to_string(),
                entity_name: "SAMPLE PLUMBING PTY LTD".to_string(),
                entity_type: "Australian Private Company".to_string(),
                gst_registered: true,
                state: "NSW".to_string(),
                postcode: "2095".to_string(),
                status: "Active".to_string(),
                score: None,
                entity_start_date: None,
            }],
            fail: false,
        }
    }

    fn empty() -> Self {
        Self {
            candidates: Vec::new(),
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            candidates: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl IdentityRegistry for StubRegistry {
    async fn search(
        &self,
        _term: &str,
        _kind: SearchKind,
    ) -> Result<Vec<Candidate>, RegistryError> {
        if self.fail {
            return Err(RegistryError::RequestFailed {
                reason: "connection refused".to_string(),
            });
        }
        Ok(self.candidates.clone())
    }

    async fn fetch(&self, _abn: &str) -> Result<Option<Candidate>, RegistryError> {
        Ok(self.candidates.first().cloned())
    }
}

struct StubLicence;

#[async_trait]
impl EnrichmentService for StubLicence {
    fn name(&self) -> &str {
        "licensing"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn lookup(&self, _identity: &ConfirmedIdentity) -> EnrichmentResult {
        EnrichmentResult::Success(EnrichmentPayload::Licence(LicenceProfile {
            licensee: "SAMPLE PLUMBING PTY LTD".to_string(),
            licence_number: "123456C".to_string(),
            licence_type: "Contractor Licence".to_string(),
            status: "Current".to_string(),
            expiry_date: "2027-03-14".to_string(),
            classes: vec!["Plumber".to_string(), "Gasfitter".to_string()],
            compliance_clean: true,
            contact_name: Some("Dan Sample".to_string()),
        }))
    }
}

struct StubWebFailure;

#[async_trait]
impl EnrichmentService for StubWebFailure {
    fn name(&self) -> &str {
        "web"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn lookup(&self, _identity: &ConfirmedIdentity) -> EnrichmentResult {
        EnrichmentResult::Failure(EnrichmentFailure::Transport {
            service: "web".to_string(),
            reason: "connection refused".to_string(),
        })
    }
}

struct StubWebSuccess;

#[async_trait]
impl EnrichmentService for StubWebSuccess {
    fn name(&self) -> &str {
        "web"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(1)
    }

    async fn lookup(&self, _identity: &ConfirmedIdentity) -> EnrichmentResult {
        EnrichmentResult::Success(EnrichmentPayload::WebPresence(WebPresence {
            hits: vec![WebHit {
                title: "Sample Plumbing — Northern Beaches".to_string(),
                url: "https://sampleplumbing.com.au".to_string(),
                snippet: "Call us on 0412 345 678 for a free quote".to_string(),
            }],
            contact_phone: Some("0412 345 678".to_string()),
        }))
    }
}

fn build_engine(
    llm: Arc<ScriptedCollaborator>,
    registry: StubRegistry,
    config: EngineConfig,
) -> Engine {
    let dataset = Arc::new(GeoDataset::bundled());
    let resolver = GeoResolver::new(Arc::clone(&dataset), &config);
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let enrichment = EnrichmentCoordinator::new(vec![
        Arc::new(StubLicence) as Arc<dyn EnrichmentService>,
        Arc::new(StubWebFailure) as Arc<dyn EnrichmentService>,
    ]);
    Engine::new(
        config,
        store,
        llm,
        Arc::new(registry),
        enrichment,
        resolver,
        Arc::new(Taxonomy::bundled()),
    )
}

// ── Scripted payloads ───────────────────────────────────────────────────

const GREETING: &str = "G'day! Let's get you set up. What's your business name or ABN?";

const SVC_TURN_1: &str = r#"{"response": "I've mapped 2 plumbing services from your licence. Do you also do gas fitting?", "services": [{"input": "plumbing", "category_name": "Plumber", "category_id": 2, "subcategory_name": "General Plumbing", "subcategory_id": 201, "confidence": 0.9}, {"input": "drains", "category_name": "Plumber", "category_id": 2, "subcategory_name": "Blocked Drains", "subcategory_id": 202, "confidence": 0.85}], "buttons": ["Yes, gas fitting too", "No, that's all"], "step_complete": false}"#;

const SVC_TURN_2: &str = r#"{"response": "Added gas fitting — you're set.", "services": [{"input": "plumbing", "category_name": "Plumber", "category_id": 2, "subcategory_name": "General Plumbing", "subcategory_id": 201}, {"input": "drains", "category_name": "Plumber", "category_id": 2, "subcategory_name": "Blocked Drains", "subcategory_id": 202}, {"input": "gas", "category_name": "Plumber", "category_id": 2, "subcategory_name": "Gas Fitting", "subcategory_id": 204}], "buttons": [], "step_complete": true}"#;

const AREA_TURN_1: &str = r#"{"response": "You're based in Manly — which of these areas do you cover?", "service_areas": {"base_suburb": "Manly", "base_postcode": "2095", "radius_km": 20, "regions_included": [], "regions_excluded": [], "barriers": [], "travel_notes": ""}, "buttons": ["Northern Beaches + North Shore", "Everywhere within 20km"], "step_complete": false}"#;

const AREA_TURN_2: &str = r#"{"response": "Locked in — north side it is.", "service_areas": {"base_suburb": "Manly", "base_postcode": "2095", "radius_km": 20, "regions_included": ["Northern Beaches", "North Shore"], "regions_excluded": ["Sydney City", "Eastern Suburbs", "Inner West"], "barriers": [], "travel_notes": "Sticks to the north side of the harbour"}, "buttons": [], "step_complete": true}"#;

const SVC_ONE_SHOT: &str = r#"{"response": "Mapped your services.", "services": [{"input": "plumbing", "category_name": "Plumber", "category_id": 2, "subcategory_name": "General Plumbing", "subcategory_id": 201}, {"input": "gas", "category_name": "Plumber", "category_id": 2, "subcategory_name": "Gas Fitting", "subcategory_id": 204}, {"input": "drains", "category_name": "Plumber", "category_id": 2, "subcategory_name": "Blocked Drains", "subcategory_id": 202}], "buttons": [], "step_complete": true}"#;

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_flow_reaches_completion() {
    let llm = ScriptedCollaborator::new(&[
        GREETING,
        SVC_TURN_1,
        SVC_TURN_2,
        AREA_TURN_1,
        AREA_TURN_2,
    ]);
    let engine = build_engine(Arc::clone(&llm), StubRegistry::with_sample(), EngineConfig::default());

    // Session creation delivers the greeting and rests at identity.
    let outcome = engine.create_session().await.unwrap();
    let id = outcome.session_id;
    assert_eq!(outcome.node, NodeId::IdentityVerification);
    assert_eq!(outcome.results.len(), 1);
    assert!(outcome.results[0].message.contains("business name or ABN"));

    // ABN search presents the single candidate for confirmation.
    let outcome = engine.post_turn(id, "51824753556").await.unwrap();
    assert_eq!(outcome.node, NodeId::IdentityVerification);
    assert!(outcome.results[0].message.contains("Is this your business?"));
    assert_eq!(outcome.options.len(), 2);

    // Confirming auto-chains into service discovery within the same turn.
    let outcome = engine.post_turn(id, "Yes, that's my business").await.unwrap();
    assert_eq!(outcome.node, NodeId::ServiceDiscovery);
    assert_eq!(outcome.results.len(), 2);
    assert!(outcome.results[0].message.contains("SAMPLE PLUMBING"));
    assert!(outcome.results[1].message.contains("gas fitting"));

    // The enrichment join recorded both services: one success, one typed
    // failure — and the failure didn't block anything.
    let snapshot = engine.session_snapshot(id).await.unwrap();
    let enrichment = snapshot.facts.enrichment.as_ref().unwrap();
    assert!(enrichment.results["licensing"].is_success());
    assert!(matches!(
        enrichment.results["web"],
        EnrichmentResult::Failure(EnrichmentFailure::Transport { .. })
    ));
    assert_eq!(enrichment.contact_name, "Dan Sample");

    // Gap answer completes services and chains into the area question.
    let outcome = engine.post_turn(id, "Yes, gas fitting too").await.unwrap();
    assert_eq!(outcome.node, NodeId::ServiceArea);
    assert_eq!(outcome.results.len(), 2);

    // Area selection completes and chains into the review summary.
    let outcome = engine
        .post_turn(id, "Just the Northern Beaches and North Shore")
        .await
        .unwrap();
    assert_eq!(outcome.node, NodeId::ProfileReview);
    let summary = &outcome.results[1].message;
    assert!(summary.contains("SAMPLE PLUMBING"));
    assert!(summary.contains("Gas Fitting"));
    assert!(summary.contains("Manly"));

    let snapshot = engine.session_snapshot(id).await.unwrap();
    let area = snapshot.facts.coverage.as_ref().unwrap().area.as_ref().unwrap();
    assert_eq!(area.included_names(), vec!["Northern Beaches", "North Shore"]);
    assert!(area.regions_excluded.contains(&"Sydney City".to_string()));

    // Review confirm chains into plan presentation.
    let outcome = engine.post_turn(id, "Yes, confirm and complete").await.unwrap();
    assert_eq!(outcome.node, NodeId::PlanSelection);
    assert!(outcome.options.iter().any(|o| o.value == "plan:pro"));

    // Plan quick-match chains straight through to completion.
    let outcome = engine.post_turn(id, "plan:pro").await.unwrap();
    assert!(outcome.completed);
    assert_eq!(outcome.node, NodeId::Complete);

    let record = engine.final_output(id).await.unwrap().unwrap();
    assert_eq!(record.business_name, "SAMPLE PLUMBING PTY LTD");
    assert_eq!(record.abn, "51824753556");
    assert_eq!(record.services.len(), 1);
    assert_eq!(record.services[0].category, "Plumber");
    assert_eq!(record.services[0].subcategories.len(), 3);
    assert_eq!(record.plan.as_ref().unwrap().plan, "pro");
    assert_eq!(record.contact_name, "Dan Sample");
    let coverage = record.coverage.as_ref().unwrap();
    assert_eq!(coverage.base.suburb, "Manly");
    assert_eq!(coverage.travel_notes, "Sticks to the north side of the harbour");

    // Exactly the scripted collaborator calls ran: greeting, two service
    // turns, two area turns. Identity confirm, review confirm, and plan
    // selection were all quick-matched — zero collaborator involvement.
    assert_eq!(llm.calls(), 5);
}

#[tokio::test]
async fn auto_chain_turn_never_repeats_a_node() {
    let llm = ScriptedCollaborator::new(&[GREETING, SVC_ONE_SHOT, AREA_TURN_2]);
    let engine = build_engine(Arc::clone(&llm), StubRegistry::with_sample(), EngineConfig::default());

    let id = engine.create_session().await.unwrap().session_id;
    engine.post_turn(id, "51824753556").await.unwrap();

    // One inbound turn: identity confirm → services (one shot) → area
    // (one shot) → review summary. Four steps, four distinct nodes.
    let outcome = engine.post_turn(id, "Yes, that's my business").await.unwrap();
    assert_eq!(outcome.results.len(), 4);
    assert_eq!(outcome.node, NodeId::ProfileReview);
    assert!(!outcome.completed);
}

#[tokio::test]
async fn zero_candidates_keeps_session_at_identity() {
    let llm = ScriptedCollaborator::new(&[GREETING]);
    let engine = build_engine(Arc::clone(&llm), StubRegistry::empty(), EngineConfig::default());

    let id = engine.create_session().await.unwrap().session_id;
    let outcome = engine.post_turn(id, "totally unknown business").await.unwrap();

    assert_eq!(outcome.node, NodeId::IdentityVerification);
    assert_eq!(outcome.results.len(), 1);
    assert!(!outcome.results[0].step_complete);
    assert!(outcome.results[0].message.contains("couldn't find"));

    let snapshot = engine.session_snapshot(id).await.unwrap();
    assert_eq!(snapshot.turn_counter, 1);
    assert!(!snapshot.facts.identity.as_ref().unwrap().verified);
}

#[tokio::test]
async fn registry_outage_consumes_turn_without_advancing() {
    let llm = ScriptedCollaborator::new(&[GREETING]);
    let engine = build_engine(Arc::clone(&llm), StubRegistry::failing(), EngineConfig::default());

    let id = engine.create_session().await.unwrap().session_id;
    let outcome = engine.post_turn(id, "sample plumbing").await.unwrap();

    assert_eq!(outcome.node, NodeId::IdentityVerification);
    assert!(outcome.results[0].message.contains("business register"));
    assert!(!outcome.results[0].step_complete);

    let snapshot = engine.session_snapshot(id).await.unwrap();
    assert_eq!(snapshot.turn_counter, 1);
    assert!(snapshot.facts.identity.is_none());
}

#[tokio::test]
async fn malformed_collaborator_output_degrades_without_corruption() {
    let llm = ScriptedCollaborator::new(&[
        GREETING,
        "I reckon you do plumbing mate, sounds about right?",
    ]);
    let engine = build_engine(Arc::clone(&llm), StubRegistry::with_sample(), EngineConfig::default());

    let id = engine.create_session().await.unwrap().session_id;
    engine.post_turn(id, "51824753556").await.unwrap();
    let outcome = engine.post_turn(id, "Yes, that's my business").await.unwrap();

    // The degraded output becomes the message verbatim, explicitly without
    // options, and the step stays incomplete.
    assert_eq!(outcome.node, NodeId::ServiceDiscovery);
    let degraded = &outcome.results[1];
    assert_eq!(degraded.message, "I reckon you do plumbing mate, sounds about right?");
    assert_eq!(degraded.options, Some(Vec::new()));
    assert!(!degraded.step_complete);

    let snapshot = engine.session_snapshot(id).await.unwrap();
    let services = snapshot.facts.services.as_ref().unwrap();
    assert!(services.services.is_empty());
    assert!(!services.confirmed);
}

#[tokio::test]
async fn round_cap_forces_completion_and_chains_onward() {
    let config = EngineConfig {
        service_round_cap: 2,
        ..Default::default()
    };
    let llm = ScriptedCollaborator::new(&[
        GREETING,
        SVC_TURN_1, // round 1, incomplete
        SVC_TURN_1, // round 2, incomplete → forced complete
        AREA_TURN_1,
    ]);
    let engine = build_engine(Arc::clone(&llm), StubRegistry::with_sample(), config);

    let id = engine.create_session().await.unwrap().session_id;
    engine.post_turn(id, "51824753556").await.unwrap();
    engine.post_turn(id, "Yes, that's my business").await.unwrap();

    let outcome = engine.post_turn(id, "hmm not sure yet").await.unwrap();
    // The forced completion auto-chained into the area node.
    assert_eq!(outcome.node, NodeId::ServiceArea);

    let snapshot = engine.session_snapshot(id).await.unwrap();
    assert!(snapshot.facts.services.as_ref().unwrap().confirmed);
}

#[tokio::test]
async fn edit_merge_removes_one_service_and_keeps_the_rest() {
    let llm = ScriptedCollaborator::new(&[GREETING, SVC_ONE_SHOT, AREA_TURN_2]);
    let engine = build_engine(Arc::clone(&llm), StubRegistry::with_sample(), EngineConfig::default());

    let id = engine.create_session().await.unwrap().session_id;
    engine.post_turn(id, "51824753556").await.unwrap();
    // Confirms and chains all the way to the review summary.
    engine.post_turn(id, "Yes, that's my business").await.unwrap();

    // Edit edge back into service discovery — quick-matched, no collaborator.
    let outcome = engine.post_turn(id, "I want to change my services").await.unwrap();
    assert_eq!(outcome.node, NodeId::ServiceDiscovery);
    assert!(outcome.options.iter().any(|o| o.value == "Remove Gas Fitting"));

    // Remove one service; the siblings survive.
    let outcome = engine.post_turn(id, "Remove Gas Fitting").await.unwrap();
    assert!(outcome.results[0].message.contains("Removed Gas Fitting"));

    let snapshot = engine.session_snapshot(id).await.unwrap();
    let names: Vec<String> = snapshot
        .facts
        .services
        .as_ref()
        .unwrap()
        .services
        .iter()
        .map(|s| s.subcategory_name.clone())
        .collect();
    assert_eq!(names, vec!["General Plumbing", "Blocked Drains"]);

    // Done editing re-confirms and skips the still-confirmed area node,
    // landing straight back on the review summary.
    let outcome = engine
        .post_turn(id, "Keep current services, confirm and complete")
        .await
        .unwrap();
    assert_eq!(outcome.node, NodeId::ProfileReview);
    let summary = &outcome.results.last().unwrap().message;
    assert!(summary.contains("General Plumbing"));
    assert!(!summary.contains("Gas Fitting"));

    // Coverage survived the service edit untouched.
    let snapshot = engine.session_snapshot(id).await.unwrap();
    let area = snapshot.facts.coverage.as_ref().unwrap().area.as_ref().unwrap();
    assert_eq!(area.included_names(), vec!["Northern Beaches", "North Shore"]);

    // Only the three scripted calls ever ran.
    assert_eq!(llm.calls(), 3);
}

#[tokio::test]
async fn area_edit_exclusions_persist_across_recomputation() {
    let llm = ScriptedCollaborator::new(&[GREETING, SVC_ONE_SHOT, AREA_TURN_2]);
    let engine = build_engine(Arc::clone(&llm), StubRegistry::with_sample(), EngineConfig::default());

    let id = engine.create_session().await.unwrap().session_id;
    engine.post_turn(id, "51824753556").await.unwrap();
    engine.post_turn(id, "Yes, that's my business").await.unwrap();

    // Edit areas, drop North Shore via quick-match.
    let outcome = engine.post_turn(id, "I want to change my service areas").await.unwrap();
    assert_eq!(outcome.node, NodeId::ServiceArea);
    let outcome = engine
        .post_turn(id, "Remove North Shore from my areas")
        .await
        .unwrap();
    assert!(outcome.results[0].message.contains("Dropped North Shore"));

    let snapshot = engine.session_snapshot(id).await.unwrap();
    let coverage = snapshot.facts.coverage.as_ref().unwrap();
    assert!(coverage.user_exclusions.contains(&"North Shore".to_string()));
    let area = coverage.area.as_ref().unwrap();
    assert_eq!(area.included_names(), vec!["Northern Beaches"]);
    assert!(area.regions_excluded.contains(&"North Shore".to_string()));

    // Done editing confirms and returns to review; no collaborator calls
    // were needed for any of the edit turns.
    let outcome = engine
        .post_turn(id, "Keep current areas, confirm and complete")
        .await
        .unwrap();
    assert_eq!(outcome.node, NodeId::ProfileReview);
    assert_eq!(llm.calls(), 3);
}

#[tokio::test]
async fn plan_quick_match_without_collaborator() {
    let llm = ScriptedCollaborator::new(&[GREETING, SVC_ONE_SHOT, AREA_TURN_2]);
    let engine = build_engine(Arc::clone(&llm), StubRegistry::with_sample(), EngineConfig::default());

    let id = engine.create_session().await.unwrap().session_id;
    engine.post_turn(id, "51824753556").await.unwrap();
    engine.post_turn(id, "Yes, that's my business").await.unwrap();
    engine.post_turn(id, "Yes, confirm and complete").await.unwrap();

    // The script is exhausted: any collaborator call from here would fail
    // the turn. Quick-matched plan selection must not need one.
    let outcome = engine.post_turn(id, "plan:standard").await.unwrap();
    assert!(outcome.completed);
    let record = engine.final_output(id).await.unwrap().unwrap();
    assert_eq!(record.plan.as_ref().unwrap().plan, "standard");
    assert_eq!(llm.calls(), 3);
}

#[tokio::test]
async fn completed_session_rejects_further_turns_gracefully() {
    let llm = ScriptedCollaborator::new(&[GREETING, SVC_ONE_SHOT, AREA_TURN_2]);
    let engine = build_engine(Arc::clone(&llm), StubRegistry::with_sample(), EngineConfig::default());

    let id = engine.create_session().await.unwrap().session_id;
    engine.post_turn(id, "51824753556").await.unwrap();
    engine.post_turn(id, "Yes, that's my business").await.unwrap();
    engine.post_turn(id, "Yes, confirm and complete").await.unwrap();
    engine.post_turn(id, "plan:skip").await.unwrap();

    let record_before = engine.final_output(id).await.unwrap().unwrap();
    let outcome = engine.post_turn(id, "actually change everything").await.unwrap();
    assert!(outcome.completed);
    assert!(outcome.results[0].message.contains("already complete"));

    // The final record is immutable.
    let record_after = engine.final_output(id).await.unwrap().unwrap();
    assert_eq!(
        serde_json::to_string(&record_before).unwrap(),
        serde_json::to_string(&record_after).unwrap()
    );
}

#[tokio::test]
async fn unknown_session_is_an_error() {
    let llm = ScriptedCollaborator::new(&[]);
    let engine = build_engine(llm, StubRegistry::with_sample(), EngineConfig::default());
    let result = engine.post_turn(uuid::Uuid::new_v4(), "hello").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn web_success_contributes_contact_phone() {
    let config = EngineConfig::default();
    let dataset = Arc::new(GeoDataset::bundled());
    let resolver = GeoResolver::new(Arc::clone(&dataset), &config);
    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let enrichment = EnrichmentCoordinator::new(vec![
        Arc::new(StubLicence) as Arc<dyn EnrichmentService>,
        Arc::new(StubWebSuccess) as Arc<dyn EnrichmentService>,
    ]);
    let llm = ScriptedCollaborator::new(&[GREETING, SVC_ONE_SHOT, AREA_TURN_2]);
    let engine = Engine::new(
        config,
        store,
        llm,
        Arc::new(StubRegistry::with_sample()),
        enrichment,
        resolver,
        Arc::new(Taxonomy::bundled()),
    );

    let id = engine.create_session().await.unwrap().session_id;
    engine.post_turn(id, "51824753556").await.unwrap();
    let outcome = engine.post_turn(id, "Yes, that's my business").await.unwrap();

    // Summary (last chained step) shows contact details from both
    // enrichment sources.
    let summary = &outcome.results.last().unwrap().message;
    assert!(summary.contains("Dan Sample"));
    assert!(summary.contains("0412 345 678"));
}
