//! Capability context: the bounded mutation surface handed to a running
//! behavior.
//!
//! A context is built fresh for each invocation. It carries a read-only
//! snapshot of the scene taken at construction time and three write-through
//! operations that funnel into the live `ObjectStore`. Mutations are visible
//! to the next frame. There is no rollback: if the behavior fails after
//! mutating, the mutations stay.

use std::cell::Cell;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::RegistryError;
use crate::object::{CanvasObject, ObjectDraft, ObjectId, ObjectOrigin, ObjectPatch};
use crate::registry::ObjectStore;

pub struct CapabilityContext {
    store: ObjectStore,
    snapshot: Vec<CanvasObject>,
    origin: ObjectOrigin,
    mutations: Cell<usize>,
}

impl CapabilityContext {
    /// Snapshot the store now. Objects added through this context are tagged
    /// with `origin`.
    pub fn new(store: ObjectStore, origin: ObjectOrigin) -> Self {
        let snapshot = store.list();
        Self {
            store,
            snapshot,
            origin,
            mutations: Cell::new(0),
        }
    }

    /// The scene as it was when the context was created.
    pub fn objects(&self) -> &[CanvasObject] {
        &self.snapshot
    }

    pub fn origin(&self) -> &ObjectOrigin {
        &self.origin
    }

    /// Number of successful writes made through this context.
    pub fn mutation_count(&self) -> usize {
        self.mutations.get()
    }

    pub fn add_object(&self, draft: ObjectDraft) -> Result<ObjectId, RegistryError> {
        let object = draft.into_object(self.origin.clone())?;
        let id = object.id.clone();
        self.store.insert(object)?;
        self.bump();
        info!(object_id = %id, "Behavior added object");
        Ok(id)
    }

    /// Convenience for bindings that speak JSON.
    pub fn add_object_json(&self, record: &Value) -> Result<ObjectId, RegistryError> {
        self.add_object(ObjectDraft::from_json(record)?)
    }

    pub fn update_object(
        &self,
        id: &ObjectId,
        patch: &ObjectPatch,
    ) -> Result<CanvasObject, RegistryError> {
        let updated = self.store.update(id, patch)?;
        self.bump();
        debug!(object_id = %id, "Behavior updated object");
        Ok(updated)
    }

    pub fn delete_object(&self, id: &ObjectId) -> Result<CanvasObject, RegistryError> {
        let removed = self.store.remove(id)?;
        self.bump();
        info!(object_id = %id, "Behavior deleted object");
        Ok(removed)
    }

    fn bump(&self) {
        self.mutations.set(self.mutations.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectKind, Position, Provenance};
    use serde_json::json;

    fn seeded() -> ObjectStore {
        let store = ObjectStore::new();
        store
            .insert(CanvasObject::builtin("a", ObjectKind::Cube, Position::ORIGIN))
            .unwrap();
        store
    }

    #[test]
    fn snapshot_is_fixed_at_construction() {
        let store = seeded();
        let ctx = CapabilityContext::new(store.clone(), ObjectOrigin::tool_generated("tool_x"));
        ctx.add_object_json(&json!({"kind": "sphere"})).unwrap();

        assert_eq!(ctx.objects().len(), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(ctx.mutation_count(), 1);
    }

    #[test]
    fn added_objects_carry_context_origin() {
        let store = seeded();
        let ctx = CapabilityContext::new(store.clone(), ObjectOrigin::tool_generated("tool_x"));
        let id = ctx.add_object_json(&json!({"kind": "text", "text": "hello"})).unwrap();

        let obj = store.get(&id).unwrap();
        assert_eq!(obj.provenance(), Provenance::ToolGenerated);
        assert_eq!(obj.origin.unwrap().tags, vec!["tool_x".to_string()]);
    }

    #[test]
    fn failed_writes_do_not_count() {
        let store = seeded();
        let ctx = CapabilityContext::new(store.clone(), ObjectOrigin::manual());

        assert!(ctx.add_object_json(&json!({"id": "a"})).is_err());
        assert!(ctx.delete_object(&ObjectId::from("missing")).is_err());
        assert_eq!(ctx.mutation_count(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_and_delete_write_through() {
        let store = seeded();
        let ctx = CapabilityContext::new(store.clone(), ObjectOrigin::manual());
        let id = ObjectId::from("a");

        ctx.update_object(&id, &ObjectPatch::default().set("color", "#abcdef"))
            .unwrap();
        assert!(store.get(&id).unwrap().property("color").is_some());

        ctx.delete_object(&id).unwrap();
        assert!(store.is_empty());
    }
}
