//! The onboarding orchestration engine.
//!
//! Owns per-session state, the node graph, auto-chain logic, and
//! edit/rollback routing. Each inbound turn is handled by a single
//! coordinating task holding the session's writer lock; concurrency lives
//! inside the enrichment fan-out and across independent sessions.

mod handlers;
pub mod node;
pub mod prompts;

use std::collections::HashSet;
use std::sync::Arc;

use uuid::Uuid;

use crate::config::EngineConfig;
use crate::enrich::{EnrichmentCoordinator, IdentityRegistry};
use crate::error::{InvariantViolation, Result, SessionError};
use crate::geo::GeoResolver;
use crate::llm::LlmProvider;
use crate::normalize::{QuickReply, StepResult};
use crate::session::model::{FinalRecord, Session};
use crate::session::store::SessionStore;
use crate::taxonomy::Taxonomy;

use node::NodeId;

/// Everything produced for one inbound request, including auto-chained
/// steps.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: Uuid,
    /// The node the session rests at after the turn.
    pub node: NodeId,
    /// StepResults in chain order.
    pub results: Vec<StepResult>,
    /// Effective options after absent-options inheritance.
    pub options: Vec<QuickReply>,
    pub completed: bool,
}

/// The orchestration engine.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) llm: Arc<dyn LlmProvider>,
    pub(crate) registry: Arc<dyn IdentityRegistry>,
    pub(crate) enrichment: EnrichmentCoordinator,
    pub(crate) resolver: GeoResolver,
    pub(crate) taxonomy: Arc<Taxonomy>,
}

impl Engine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn SessionStore>,
        llm: Arc<dyn LlmProvider>,
        registry: Arc<dyn IdentityRegistry>,
        enrichment: EnrichmentCoordinator,
        resolver: GeoResolver,
        taxonomy: Arc<Taxonomy>,
    ) -> Self {
        Self {
            config,
            store,
            llm,
            registry,
            enrichment,
            resolver,
            taxonomy,
        }
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Create a session and run the greeting.
    pub async fn create_session(&self) -> Result<TurnOutcome> {
        let handle = self.store.create().await?;
        let mut session = handle.lock().await;
        let results = self.run_chain(&mut session, None).await;
        self.persist_best_effort(&session).await;
        Ok(outcome(&session, results))
    }

    /// Post one inbound user turn and run the active node plus any
    /// auto-chained successors. Turns for the same session are serialized
    /// by the session's writer lock, held for the whole turn.
    pub async fn post_turn(&self, session_id: Uuid, message: &str) -> Result<TurnOutcome> {
        let handle = self
            .store
            .get(session_id)
            .await?
            .ok_or(SessionError::NotFound { id: session_id })?;
        let mut session = handle.lock().await;

        if session.completed {
            let result = StepResult::message(
                "Onboarding is already complete — your profile is live.",
            )
            .complete();
            return Ok(outcome(&session, vec![result]));
        }

        session.push_user_turn(message);
        let results = self.run_chain(&mut session, Some(message)).await;
        self.persist_best_effort(&session).await;
        Ok(outcome(&session, results))
    }

    /// The final structured output, once the session is complete.
    pub async fn final_output(&self, session_id: Uuid) -> Result<Option<FinalRecord>> {
        let handle = self
            .store
            .get(session_id)
            .await?
            .ok_or(SessionError::NotFound { id: session_id })?;
        let session = handle.lock().await;
        Ok(session.final_record.clone())
    }

    /// A snapshot of the session (read-only view for the surface).
    pub async fn session_snapshot(&self, session_id: Uuid) -> Result<Session> {
        let handle = self
            .store
            .get(session_id)
            .await?
            .ok_or(SessionError::NotFound { id: session_id })?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    /// Run the active node, then auto-chain while completion predicates
    /// hold. The per-request visited set makes any revisit a loud
    /// invariant violation that aborts the chain (the results so far are
    /// still returned).
    async fn run_chain(&self, session: &mut Session, input: Option<&str>) -> Vec<StepResult> {
        let mut results: Vec<StepResult> = Vec::new();
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut input = input;

        loop {
            let node = session.current_node;
            if !visited.insert(node) {
                let violation = InvariantViolation::ChainCycle {
                    node: node.to_string(),
                };
                tracing::error!(
                    session = %session.id,
                    error = %violation,
                    "Invariant violation in auto-chain; aborting chain"
                );
                break;
            }

            tracing::debug!(session = %session.id, node = %node, "Running node handler");
            let result = self.run_node(node, session, input.take()).await;

            if let Err(violation) = result.validate() {
                tracing::error!(
                    session = %session.id,
                    node = %node,
                    error = %violation,
                    "Invariant violation: StepResult schema violated after normalization; aborting chain"
                );
                break;
            }

            session.push_assistant_turn(&result.message);
            if let Some(ref options) = result.options {
                session.last_options = Some(options.clone());
            }

            let complete = result.step_complete;
            results.push(result);

            if !complete {
                break;
            }
            if session.current_node != node {
                // An edit edge rerouted the session mid-turn; the chain
                // stops here and the next inbound turn lands on the target.
                break;
            }
            let Some(next) = node.next_unsatisfied(session) else {
                break;
            };
            session.current_node = next;
            if !next.runs_unprompted() {
                break;
            }
        }

        results
    }

    async fn run_node(
        &self,
        node: NodeId,
        session: &mut Session,
        input: Option<&str>,
    ) -> StepResult {
        match node {
            NodeId::Greeting => handlers::greeting(self, session).await,
            NodeId::IdentityVerification => handlers::identity::run(self, session, input).await,
            NodeId::ServiceDiscovery => handlers::services::run(self, session, input).await,
            NodeId::ServiceArea => handlers::area::run(self, session, input).await,
            NodeId::ProfileReview => handlers::review::run(self, session, input).await,
            NodeId::PlanSelection => handlers::plan::run(self, session, input).await,
            NodeId::Complete => handlers::complete(session),
        }
    }

    async fn persist_best_effort(&self, session: &Session) {
        if let Err(e) = self.store.persist(session).await {
            tracing::warn!(session = %session.id, error = %e, "Failed to persist session snapshot");
        }
    }
}

fn outcome(session: &Session, results: Vec<StepResult>) -> TurnOutcome {
    TurnOutcome {
        session_id: session.id,
        node: session.current_node,
        options: session.last_options.clone().unwrap_or_default(),
        completed: session.completed,
        results,
    }
}
