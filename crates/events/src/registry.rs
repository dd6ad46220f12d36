//! Read-only projection registry captured at event-store construction.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::projection::ProjectionDefinition;

/// An immutable list of [`ProjectionDefinition`]s. Definitions are captured
/// by value — they never hold a reference back to the store, avoiding a
/// cyclic dependency between the projection engine and the stream store.
#[derive(Debug, Clone, Default)]
pub struct ProjectionRegistry {
    definitions: Vec<ProjectionDefinition>,
}

impl ProjectionRegistry {
    /// Warns on duplicate projection names — [`find`](Self::find) would
    /// silently return the first match and the second definition would
    /// never be reachable by name.
    pub fn new(definitions: Vec<ProjectionDefinition>) -> Self {
        let mut seen = HashSet::new();
        for definition in &definitions {
            if !seen.insert(definition.name.as_str()) {
                warn!(name = %definition.name, "duplicate projection name registered; only the first is reachable via find()");
            }
        }
        Self { definitions }
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn all(&self) -> &[ProjectionDefinition] {
        &self.definitions
    }

    /// Definitions whose `can_handle` intersects `event_types`, in
    /// registration order.
    pub fn applicable_for(&self, event_types: &HashSet<String>) -> Vec<&ProjectionDefinition> {
        let applicable: Vec<&ProjectionDefinition> = self
            .definitions
            .iter()
            .filter(|def| def.handles_any(event_types))
            .collect();
        debug!(
            matched = applicable.len(),
            registered = self.definitions.len(),
            "resolved applicable projections for event batch"
        );
        applicable
    }

    pub fn find(&self, name: &str) -> Option<&ProjectionDefinition> {
        self.definitions.iter().find(|def| def.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Bson;

    fn def(name: &str, can_handle: &[&str]) -> ProjectionDefinition {
        ProjectionDefinition::new(
            name,
            can_handle.to_vec(),
            |s, _| s,
            || Bson::Null,
        )
    }

    #[test]
    fn applicable_for_filters_by_event_type_intersection() {
        let registry = ProjectionRegistry::new(vec![
            def("A", &["foo.created"]),
            def("B", &["bar.created"]),
            def("C", &["foo.created", "bar.created"]),
        ]);

        let mut types = HashSet::new();
        types.insert("bar.created".to_string());

        let applicable: Vec<&str> = registry
            .applicable_for(&types)
            .into_iter()
            .map(|d| d.name.as_str())
            .collect();

        assert_eq!(applicable, vec!["B", "C"]);
    }

    #[test]
    fn find_looks_up_by_name() {
        let registry = ProjectionRegistry::new(vec![def("A", &["foo.created"])]);
        assert!(registry.find("A").is_some());
        assert!(registry.find("missing").is_none());
    }

    #[test]
    fn duplicate_names_keep_both_definitions_but_find_only_reaches_the_first() {
        let registry = ProjectionRegistry::new(vec![
            def("A", &["foo.created"]),
            def("A", &["bar.created"]),
        ]);
        assert_eq!(registry.all().len(), 2);
        assert_eq!(registry.find("A").unwrap().can_handle, {
            let mut set = HashSet::new();
            set.insert("foo.created".to_string());
            set
        });
    }
}
