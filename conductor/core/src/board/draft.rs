//! Per-command board mirror
//!
//! The draft is seeded from the client's snapshot and owned by exactly one
//! applier. While a command is applied it is the single source of truth for
//! geometry and references; afterwards its entries are the final objects.

use indexmap::IndexMap;

use super::object::BoardObject;

/// Insertion-ordered mapping of object id to object
#[derive(Debug, Clone, Default)]
pub struct BoardDraft {
    objects: IndexMap<String, BoardObject>,
}

impl BoardDraft {
    /// Seed a draft from a snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: impl IntoIterator<Item = BoardObject>) -> Self {
        Self {
            objects: snapshot
                .into_iter()
                .map(|object| (object.id.clone(), object))
                .collect(),
        }
    }

    /// Number of objects
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the draft is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Whether an object exists
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.objects.contains_key(id)
    }

    /// Look up an object
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&BoardObject> {
        self.objects.get(id)
    }

    /// Look up an object mutably
    pub fn get_mut(&mut self, id: &str) -> Option<&mut BoardObject> {
        self.objects.get_mut(id)
    }

    /// Insert or replace an object
    pub fn insert(&mut self, object: BoardObject) {
        self.objects.insert(object.id.clone(), object);
    }

    /// Remove an object, keeping the order of the rest
    pub fn remove(&mut self, id: &str) -> Option<BoardObject> {
        self.objects.shift_remove(id)
    }

    /// Objects in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &BoardObject> {
        self.objects.values()
    }

    /// Ids of connectors that start or end at `id`
    #[must_use]
    pub fn connectors_attached_to(&self, id: &str) -> Vec<String> {
        self.objects
            .values()
            .filter(|object| object.is_connector() && object.references(id))
            .map(|object| object.id.clone())
            .collect()
    }

    /// Consume the draft, yielding the final objects in insertion order
    #[must_use]
    pub fn into_objects(self) -> Vec<BoardObject> {
        self.objects.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::ObjectType;

    #[test]
    fn test_remove_preserves_order() {
        let mut draft = BoardDraft::from_snapshot([
            BoardObject::new("a", ObjectType::Sticky),
            BoardObject::new("b", ObjectType::Sticky),
            BoardObject::new("c", ObjectType::Sticky),
        ]);
        draft.remove("b");
        let ids: Vec<_> = draft.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_connectors_attached_to() {
        let mut connector = BoardObject::new("c1", ObjectType::Connector);
        connector.start_id = Some("a".to_string());
        connector.end_id = Some("b".to_string());
        let draft = BoardDraft::from_snapshot([
            BoardObject::new("a", ObjectType::Rectangle),
            BoardObject::new("b", ObjectType::Rectangle),
            connector,
        ]);
        assert_eq!(draft.connectors_attached_to("b"), vec!["c1".to_string()]);
        assert!(draft.connectors_attached_to("c1").is_empty());
    }
}
