//! Rule-based item filtering.
//!
//! User-supplied predicates are registered per data group and combined with
//! logical AND: an item survives only if every registered predicate accepts
//! it. Predicates must be pure functions of the item; registration order does
//! not affect the outcome.
//!
//! A built-in guard rejects a fixed set of internal bookkeeping types on the
//! entities and links groups regardless of user configuration, so a transfer
//! can never corrupt the destination's own system tables.

use crate::core::{ConfigRecord, Entity, Link};

/// Entity types that never cross the boundary, regardless of configuration.
pub const PROTECTED_TYPES: &[&str] = &[
    "system::migration",
    "system::webhook",
    "system::api-token",
    "system::audit-log",
];

/// Whether an entity type is one of the protected internal types.
pub fn is_protected_type(entity_type: &str) -> bool {
    PROTECTED_TYPES.contains(&entity_type)
}

pub type EntityRule = Box<dyn Fn(&Entity) -> bool + Send + Sync>;
pub type LinkRule = Box<dyn Fn(&Link) -> bool + Send + Sync>;
pub type ConfigRule = Box<dyn Fn(&ConfigRecord) -> bool + Send + Sync>;

/// Per-group predicate sets applied before items cross the boundary.
#[derive(Default)]
pub struct RuleFilterEngine {
    entity_rules: Vec<EntityRule>,
    link_rules: Vec<LinkRule>,
    config_rules: Vec<ConfigRule>,
}

impl RuleFilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_entity_rule(&mut self, rule: impl Fn(&Entity) -> bool + Send + Sync + 'static) {
        self.entity_rules.push(Box::new(rule));
    }

    pub fn register_link_rule(&mut self, rule: impl Fn(&Link) -> bool + Send + Sync + 'static) {
        self.link_rules.push(Box::new(rule));
    }

    pub fn register_config_rule(
        &mut self,
        rule: impl Fn(&ConfigRecord) -> bool + Send + Sync + 'static,
    ) {
        self.config_rules.push(Box::new(rule));
    }

    /// AND-combination of the protected-type guard and all entity rules.
    pub fn accepts_entity(&self, entity: &Entity) -> bool {
        if is_protected_type(&entity.entity_type) {
            return false;
        }
        self.entity_rules.iter().all(|rule| rule(entity))
    }

    /// AND-combination of the protected-type guard (on both endpoints) and
    /// all link rules.
    pub fn accepts_link(&self, link: &Link) -> bool {
        if is_protected_type(&link.left.entity_type) || is_protected_type(&link.right.entity_type) {
            return false;
        }
        self.link_rules.iter().all(|rule| rule(link))
    }

    /// AND-combination of all configuration rules.
    pub fn accepts_config(&self, record: &ConfigRecord) -> bool {
        self.config_rules.iter().all(|rule| rule(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EntityRef;
    use serde_json::json;

    #[test]
    fn test_no_rules_accepts_everything_but_protected() {
        let filters = RuleFilterEngine::new();
        assert!(filters.accepts_entity(&Entity::new("api::article", "1")));
        assert!(!filters.accepts_entity(&Entity::new("system::webhook", "1")));
    }

    #[test]
    fn test_rules_combine_with_and() {
        let mut filters = RuleFilterEngine::new();
        filters.register_entity_rule(|e| e.entity_type == "api::article");
        filters.register_entity_rule(|e| e.attributes.get("draft") != Some(&json!(true)));

        let published = Entity::new("api::article", "1").with_attribute("draft", json!(false));
        let draft = Entity::new("api::article", "2").with_attribute("draft", json!(true));
        let other = Entity::new("api::author", "3");

        assert!(filters.accepts_entity(&published));
        assert!(!filters.accepts_entity(&draft));
        assert!(!filters.accepts_entity(&other));
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let mut filters = RuleFilterEngine::new();
        filters.register_entity_rule(|e| !e.id.is_empty());

        let entity = Entity::new("api::article", "1");
        assert!(filters.accepts_entity(&entity));
        // Re-applying the same predicates to an accepted item accepts again.
        assert!(filters.accepts_entity(&entity));
    }

    #[test]
    fn test_link_guard_checks_both_endpoints() {
        let filters = RuleFilterEngine::new();
        let bad = Link::new(
            EntityRef::new("api::article", "1"),
            EntityRef::new("system::api-token", "9"),
            "oneToOne",
        );
        let good = Link::new(
            EntityRef::new("api::article", "1"),
            EntityRef::new("api::author", "2"),
            "manyToOne",
        );
        assert!(!filters.accepts_link(&bad));
        assert!(filters.accepts_link(&good));
    }

    #[test]
    fn test_config_rules() {
        let mut filters = RuleFilterEngine::new();
        filters.register_config_rule(|r| !r.key.starts_with("secret::"));

        assert!(filters.accepts_config(&ConfigRecord::new("core::locales", json!(["en"]))));
        assert!(!filters.accepts_config(&ConfigRecord::new("secret::keys", json!({}))));
    }
}
