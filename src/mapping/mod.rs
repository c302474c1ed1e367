//! # Mapping Engine
//!
//! Converts between domain objects and stored graph elements.
//!
//! | Module | Role |
//! |--------|------|
//! | `object` | Field-access capability and shared object handles |
//! | `declaration` | Per-type and per-field mapping declarations |
//! | `descriptor` | Immutable metamodel built from declarations |
//! | `registry` | Builds, validates and caches descriptors |
//! | `discriminator` | Records and recovers concrete types; type safety |
//! | `identity` | Finds or creates the element of an object |
//! | `transmitter` | Copies fields between object and element |
//! | `cache` | Per-call identity cache and write guard |
//! | `converter` | Cascading read/write over whole object graphs |
//! | `policy` | Flags controlling one conversion |

pub mod object;
pub mod declaration;
pub mod descriptor;
pub mod registry;
pub mod discriminator;
pub mod identity;
pub mod transmitter;
pub mod cache;
pub mod converter;
pub mod policy;

pub use object::{AccessError, Association, DomainObject, Entity, EntityRef, FieldValue};
pub use declaration::{EntityDeclaration, FieldDeclaration};
pub use descriptor::{
    Cardinality, EntityDescriptor, EntityKind, IdStrategy, Instantiator, LoadPolicy,
    PropertyDescriptor, RelationshipDescriptor, RelationshipEndpoints, RelationshipNaming, ValueType,
};
pub use registry::MetamodelRegistry;
pub use discriminator::{
    LabelStrategy, NodeTypeStrategy, PropertyStrategy, TypeRepresentationStrategy, TypeResolver,
    TypeSafetyPolicy,
};
pub use identity::{
    IdGenerator, IdentityResolver, RelationshipResult, RelationshipStatus, SequenceIdGenerator,
};
pub use transmitter::{PendingAssociation, RawAssociation};
pub use cache::{ConversionContext, IdentityCache};
pub use converter::Converter;
pub use policy::MappingPolicy;
