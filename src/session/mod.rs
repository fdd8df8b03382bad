//! Session state and storage.
//!
//! A session is the unit of conversation: owned exclusively by the engine,
//! created on first contact, mutated only by node handlers, retained for
//! resumption and result retrieval. Storage goes through an explicit
//! `SessionStore` abstraction with a single-writer-per-id contract.

pub mod libsql_store;
pub mod model;
pub mod store;

pub use libsql_store::LibSqlSessionStore;
pub use model::{
    CollectedFacts, CoverageFacts, EnrichmentFacts, FinalRecord, IdentityFacts, PlanFacts,
    ServiceCategoryOutput, ServiceFacts, Session, SubcategoryOutput, Turn, TurnRole,
};
pub use store::{InMemorySessionStore, SessionHandle, SessionStore};
