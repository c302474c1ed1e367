//! Either side of the property graph a domain object maps to.

use serde::{Deserialize, Serialize};

use super::{Node, NodeId, PropertyMap, RelId, Relationship, Value};

/// Identity of a stored element. Node and relationship id spaces are disjoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementId {
    Node(NodeId),
    Relationship(RelId),
}

impl ElementId {
    /// Raw numeric id, as written into an internal identity field.
    pub fn raw(&self) -> u64 {
        match self {
            ElementId::Node(id) => id.0,
            ElementId::Relationship(id) => id.0,
        }
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementId::Node(id) => write!(f, "node {id}"),
            ElementId::Relationship(id) => write!(f, "relationship {id}"),
        }
    }
}

/// A stored node or relationship.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphElement {
    Node(Node),
    Relationship(Relationship),
}

impl GraphElement {
    pub fn element_id(&self) -> ElementId {
        match self {
            GraphElement::Node(n) => ElementId::Node(n.id),
            GraphElement::Relationship(r) => ElementId::Relationship(r.id),
        }
    }

    pub fn properties(&self) -> &PropertyMap {
        match self {
            GraphElement::Node(n) => &n.properties,
            GraphElement::Relationship(r) => &r.properties,
        }
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties().get(key)
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            GraphElement::Node(n) => Some(n),
            GraphElement::Relationship(_) => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match self {
            GraphElement::Relationship(r) => Some(r),
            GraphElement::Node(_) => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, GraphElement::Node(_))
    }
}

impl From<Node> for GraphElement {
    fn from(node: Node) -> Self { GraphElement::Node(node) }
}

impl From<Relationship> for GraphElement {
    fn from(rel: Relationship) -> Self { GraphElement::Relationship(rel) }
}
