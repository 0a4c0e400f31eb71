use std::collections::HashMap;

/// One parent/child edge of the entity hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub parent_type: String,
    pub child_type: String,
    /// Table holding the child entities.
    pub child_table: String,
    /// Attribute of the child that holds the parent's id.
    pub parent_key_attr: String,
}

impl Relationship {
    pub fn new(parent_type: &str, child_type: &str, child_table: &str, parent_key_attr: &str) -> Self {
        Self {
            parent_type: parent_type.to_string(),
            child_type: child_type.to_string(),
            child_table: child_table.to_string(),
            parent_key_attr: parent_key_attr.to_string(),
        }
    }
}

/// Registry of known relationships, used to discover cascade topology
#[derive(Debug, Clone, Default)]
pub struct RelationshipRegistry {
    relationships: Vec<Relationship>,
    by_parent: HashMap<String, Vec<Relationship>>,
}

impl RelationshipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a relationship
    pub fn register(&mut self, relationship: Relationship) {
        self.by_parent
            .entry(relationship.parent_type.clone())
            .or_default()
            .push(relationship.clone());
        self.relationships.push(relationship);
    }

    /// Relationships whose parent is `parent_type`, in registration order
    pub fn children_of(&self, parent_type: &str) -> &[Relationship] {
        self.by_parent
            .get(parent_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All registered relationships, in registration order
    pub fn all_relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn has_children(&self, parent_type: &str) -> bool {
        !self.children_of(parent_type).is_empty()
    }
}
