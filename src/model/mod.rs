//! # Property Graph Model
//!
//! Clean DTOs that define the property graph the mapper reads and writes.
//! These types cross every boundary: store ↔ mapping engine ↔ user.
//!
//! Design rule: this module is pure data. No I/O, no locks.

pub mod node;
pub mod relationship;
pub mod element;
pub mod value;
pub mod property_map;

pub use node::{Node, NodeId, Labels};
pub use relationship::{Relationship, RelId, Direction};
pub use element::{GraphElement, ElementId};
pub use value::Value;
pub use property_map::{props, PropertyMap};
