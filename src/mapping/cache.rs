//! Per-call identity cache and conversion context.
//!
//! One [`ConversionContext`] is created per top-level conversion and
//! passed by `&mut` through every recursive step. Nothing here is global.

use hashbrown::{HashMap, HashSet};
use tracing::trace;

use crate::model::ElementId;
use super::object::EntityRef;
use super::policy::MappingPolicy;

pub type CacheKey = (ElementId, MappingPolicy);

/// Objects materialized so far in one call tree.
///
/// Depth-scoped: `enter`/`exit` bracket every conversion step and the
/// cache is discarded when the outermost step exits.
#[derive(Debug, Default)]
pub struct IdentityCache {
    depth: usize,
    entries: HashMap<CacheKey, EntityRef>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self) {
        self.depth += 1;
    }

    /// Returns true when the outermost step exited and the cache was cleared.
    pub fn exit(&mut self) -> bool {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.entries.clear();
            true
        } else {
            false
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn get(&self, key: &CacheKey) -> Option<EntityRef> {
        let hit = self.entries.get(key).cloned();
        if hit.is_some() {
            trace!(element = %key.0, policy = ?key.1, "identity cache hit");
        }
        hit
    }

    pub fn insert(&mut self, key: CacheKey, object: EntityRef) {
        self.entries.insert(key, object);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// State threaded through one conversion call tree.
#[derive(Debug, Default)]
pub struct ConversionContext {
    pub cache: IdentityCache,
    /// Elements already written in this call; breaks write-path cycles.
    written: HashSet<ElementId>,
}

impl ConversionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self) {
        self.cache.enter();
    }

    pub fn exit(&mut self) {
        if self.cache.exit() {
            self.written.clear();
        }
    }

    /// Record `element` as written. False if it already was.
    pub fn mark_written(&mut self, element: ElementId) -> bool {
        self.written.insert(element)
    }

    pub fn is_written(&self, element: ElementId) -> bool {
        self.written.contains(&element)
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;

    use super::*;
    use crate::mapping::object::{AccessError, DomainObject, FieldValue};
    use crate::model::NodeId;

    struct Blank;

    impl DomainObject for Blank {
        fn entity_name(&self) -> &str { "Blank" }
        fn get_field(&self, field: &str) -> Result<FieldValue, AccessError> {
            Err(AccessError::UnknownField(field.into()))
        }
        fn set_field(&mut self, field: &str, _: FieldValue) -> Result<(), AccessError> {
            Err(AccessError::UnknownField(field.into()))
        }
        fn as_any(&self) -> &dyn Any { self }
        fn as_any_mut(&mut self) -> &mut dyn Any { self }
    }

    #[test]
    fn test_keyed_by_element_and_policy() {
        let mut cache = IdentityCache::new();
        cache.enter();
        let id = ElementId::Node(NodeId(1));
        let obj = EntityRef::new(Blank);
        cache.insert((id, MappingPolicy::DEFAULT), obj.clone());

        assert!(EntityRef::ptr_eq(&cache.get(&(id, MappingPolicy::DEFAULT)).unwrap(), &obj));
        assert!(cache.get(&(id, MappingPolicy::EAGER_LOAD)).is_none());
    }

    #[test]
    fn test_cleared_when_depth_returns_to_zero() {
        let mut cache = IdentityCache::new();
        cache.enter();
        cache.enter();
        cache.insert((ElementId::Node(NodeId(1)), MappingPolicy::DEFAULT), EntityRef::new(Blank));
        assert!(!cache.exit());
        assert_eq!(cache.len(), 1);
        assert!(cache.exit());
        assert!(cache.is_empty());
        assert_eq!(cache.depth(), 0);
    }

    #[test]
    fn test_written_set_scoped_to_call() {
        let mut ctx = ConversionContext::new();
        ctx.enter();
        let id = ElementId::Node(NodeId(4));
        assert!(ctx.mark_written(id));
        assert!(!ctx.mark_written(id));
        ctx.exit();
        assert!(!ctx.is_written(id));
    }
}
