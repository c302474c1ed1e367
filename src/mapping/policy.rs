//! Mapping policy: the flag set attached to one conversion request.

use serde::{Deserialize, Serialize};

/// Immutable pair of flags controlling one conversion pass.
///
/// - `access_field`: bypass accessor methods and touch field storage directly
///   ([`DomainObject::get_field`](crate::mapping::DomainObject::get_field)
///   instead of `get_property`).
/// - `should_load`: eagerly hydrate associations on this pass.
///
/// Policies combine by flag union. The policy value itself is the policy
/// identity used in identity-cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MappingPolicy {
    access_field: bool,
    should_load: bool,
}

impl MappingPolicy {
    /// Lazy, accessor-based mapping.
    pub const DEFAULT: MappingPolicy = MappingPolicy { access_field: false, should_load: false };

    /// Eager hydration of every association reached.
    pub const EAGER_LOAD: MappingPolicy = MappingPolicy { access_field: false, should_load: true };

    /// Direct field access without loading.
    pub const FIELD_DIRECT: MappingPolicy = MappingPolicy { access_field: true, should_load: false };

    pub const fn new(access_field: bool, should_load: bool) -> Self {
        Self { access_field, should_load }
    }

    pub const fn access_field(&self) -> bool {
        self.access_field
    }

    pub const fn should_load(&self) -> bool {
        self.should_load
    }

    /// Union of both flag sets.
    pub const fn combine_with(self, other: MappingPolicy) -> MappingPolicy {
        MappingPolicy {
            access_field: self.access_field || other.access_field,
            should_load: self.should_load || other.should_load,
        }
    }
}
