//! Catalog collaborator contract (§6): `getScenario(id) -> Scenario | absent`,
//! safe to call concurrently. Scenario definition parsing, schema
//! validation, and disk persistence are explicitly out of scope (§1) — the
//! engine only ever asks a Catalog for an already-validated `Scenario`.
//!
//! No teacher module owns this shape (the teacher loads a single plan file
//! at startup via `loader/mod.rs` and never looks one up by id again). The
//! trait is new; `InMemoryCatalog` is grounded on the teacher's
//! `retry/mod.rs` test-fake texture — a trivial `HashMap`-backed double
//! good enough to drive engine tests without a real collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::protocol::Scenario;

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_scenario(&self, id: &str) -> Option<Scenario>;
}

#[derive(Default)]
pub struct InMemoryCatalog {
    scenarios: RwLock<HashMap<String, Arc<Scenario>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, scenario: Scenario) {
        self.scenarios.write().await.insert(scenario.id.clone(), Arc::new(scenario));
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_scenario(&self, id: &str) -> Option<Scenario> {
        self.scenarios.read().await.get(id).map(|s| (**s).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Scenario;

    fn scenario(id: &str) -> Scenario {
        Scenario { id: id.to_string(), name: id.to_string(), steps: Vec::new() }
    }

    #[tokio::test]
    async fn registered_scenario_is_retrievable_by_id() {
        let catalog = InMemoryCatalog::new();
        catalog.register(scenario("s1")).await;
        assert!(catalog.get_scenario("s1").await.is_some());
    }

    #[tokio::test]
    async fn unknown_id_is_absent() {
        let catalog = InMemoryCatalog::new();
        assert!(catalog.get_scenario("nope").await.is_none());
    }
}
