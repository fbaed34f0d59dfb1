//! Object registry: the ordered store of live scene entities.
//!
//! Every mutation goes through `ObjectRegistry`. Reads hand out owned clones,
//! so nothing outside the registry can alias stored records. `ObjectStore` is
//! the single-threaded shared handle used by the frame driver, capability
//! contexts and the coordinator.
//!
//! Every insert is stamped with a fresh epoch. A record removed and inserted
//! again under the same id gets a new epoch, so caches keyed on
//! `(id, epoch)` never confuse the two.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::error::RegistryError;
use crate::object::{CanvasObject, ObjectId, ObjectPatch};

#[derive(Debug, Default, Clone)]
pub struct ObjectRegistry {
    objects: Vec<CanvasObject>,
    // Parallel to `objects`.
    epochs: Vec<u64>,
    next_epoch: u64,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Fails without touching state if the record is
    /// invalid or its id is already live.
    pub fn insert(&mut self, object: CanvasObject) -> Result<(), RegistryError> {
        object.validate()?;
        if self.contains(&object.id) {
            return Err(RegistryError::Conflict(object.id.to_string()));
        }
        self.next_epoch += 1;
        debug!(
            object_id = %object.id,
            kind = %object.kind,
            epoch = self.next_epoch,
            "Object inserted"
        );
        self.objects.push(object);
        self.epochs.push(self.next_epoch);
        Ok(())
    }

    /// Remove a record, returning it.
    pub fn remove(&mut self, id: &ObjectId) -> Result<CanvasObject, RegistryError> {
        let index = self
            .index_of(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let removed = self.objects.remove(index);
        self.epochs.remove(index);
        debug!(object_id = %id, "Object removed");
        Ok(removed)
    }

    /// Apply a patch atomically: the patched copy is validated first and then
    /// swapped in at the same index.
    pub fn update(
        &mut self,
        id: &ObjectId,
        patch: &ObjectPatch,
    ) -> Result<CanvasObject, RegistryError> {
        let index = self
            .index_of(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let next = patch.apply(&self.objects[index])?;
        self.objects[index] = next.clone();
        debug!(object_id = %id, "Object updated");
        Ok(next)
    }

    /// Replace a whole record by id, keeping its place in render order.
    pub fn replace(&mut self, object: CanvasObject) -> Result<CanvasObject, RegistryError> {
        object.validate()?;
        let index = self
            .index_of(&object.id)
            .ok_or_else(|| RegistryError::NotFound(object.id.to_string()))?;
        Ok(std::mem::replace(&mut self.objects[index], object))
    }

    pub fn get(&self, id: &ObjectId) -> Option<CanvasObject> {
        self.objects.iter().find(|o| &o.id == id).cloned()
    }

    /// Snapshot of all live records in insertion order.
    pub fn list(&self) -> Vec<CanvasObject> {
        self.objects.clone()
    }

    /// Like `list`, with each record's insert epoch.
    pub fn entries(&self) -> Vec<(u64, CanvasObject)> {
        self.epochs.iter().copied().zip(self.objects.iter().cloned()).collect()
    }

    /// Epoch of the live record with this id. Updates and replacements keep
    /// it; only a fresh insert changes it.
    pub fn epoch(&self, id: &ObjectId) -> Option<u64> {
        self.index_of(id).map(|index| self.epochs[index])
    }

    pub fn ids(&self) -> Vec<ObjectId> {
        self.objects.iter().map(|o| o.id.clone()).collect()
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn index_of(&self, id: &ObjectId) -> Option<usize> {
        self.objects.iter().position(|o| &o.id == id)
    }
}

/// Shared handle to one `ObjectRegistry`.
///
/// Execution is single-threaded and cooperative, so the registry lives in an
/// `Rc<RefCell<_>>`. Each method borrows for the duration of one registry
/// call only; no borrow is ever held while behavior code runs.
#[derive(Debug, Default, Clone)]
pub struct ObjectStore {
    inner: Rc<RefCell<ObjectRegistry>>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, object: CanvasObject) -> Result<(), RegistryError> {
        self.inner
            .try_borrow_mut()
            .map_err(|_| RegistryError::Busy("insert"))?
            .insert(object)
    }

    pub fn remove(&self, id: &ObjectId) -> Result<CanvasObject, RegistryError> {
        self.inner
            .try_borrow_mut()
            .map_err(|_| RegistryError::Busy("remove"))?
            .remove(id)
    }

    pub fn update(
        &self,
        id: &ObjectId,
        patch: &ObjectPatch,
    ) -> Result<CanvasObject, RegistryError> {
        self.inner
            .try_borrow_mut()
            .map_err(|_| RegistryError::Busy("update"))?
            .update(id, patch)
    }

    pub fn replace(&self, object: CanvasObject) -> Result<CanvasObject, RegistryError> {
        self.inner
            .try_borrow_mut()
            .map_err(|_| RegistryError::Busy("replace"))?
            .replace(object)
    }

    pub fn get(&self, id: &ObjectId) -> Option<CanvasObject> {
        self.inner.try_borrow().ok().and_then(|r| r.get(id))
    }

    /// Snapshot in insertion order. Empty if a writer holds the registry,
    /// which cannot happen outside a registry call.
    pub fn list(&self) -> Vec<CanvasObject> {
        self.inner.try_borrow().map(|r| r.list()).unwrap_or_default()
    }

    pub fn entries(&self) -> Vec<(u64, CanvasObject)> {
        self.inner.try_borrow().map(|r| r.entries()).unwrap_or_default()
    }

    pub fn epoch(&self, id: &ObjectId) -> Option<u64> {
        self.inner.try_borrow().ok().and_then(|r| r.epoch(id))
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.inner.try_borrow().map(|r| r.contains(id)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.inner.try_borrow().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ObjectKind, Position, PropertyValue};
    use std::collections::HashSet;

    fn cube(id: &str) -> CanvasObject {
        CanvasObject::builtin(id, ObjectKind::Cube, Position::ORIGIN)
            .with_property("color", "#00ffff")
    }

    fn sphere(id: &str) -> CanvasObject {
        CanvasObject::builtin(id, ObjectKind::Sphere, Position::new(1.0, 2.0, 3.0).unwrap())
            .with_property("color", "#ff00ff")
    }

    #[test]
    fn insert_preserves_order() {
        let mut reg = ObjectRegistry::new();
        reg.insert(cube("a")).unwrap();
        reg.insert(sphere("b")).unwrap();
        reg.insert(cube("c")).unwrap();
        let ids: Vec<_> = reg.ids().into_iter().map(|i| i.to_string()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn reinsert_gets_a_new_epoch_and_updates_keep_it() {
        let mut reg = ObjectRegistry::new();
        let id = ObjectId::from("a");
        reg.insert(cube("a")).unwrap();
        let first = reg.epoch(&id).unwrap();

        reg.replace(cube("a").with_property("color", "#123456")).unwrap();
        assert_eq!(reg.epoch(&id), Some(first));

        reg.remove(&id).unwrap();
        assert_eq!(reg.epoch(&id), None);
        reg.insert(cube("a")).unwrap();
        let second = reg.epoch(&id).unwrap();
        assert!(second > first);

        reg.insert(sphere("b")).unwrap();
        let entries = reg.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, second);
        assert_eq!(entries[1].1.id, ObjectId::from("b"));
    }

    #[test]
    fn duplicate_insert_is_a_conflict_without_change() {
        let mut reg = ObjectRegistry::new();
        reg.insert(cube("a")).unwrap();
        let before = reg.list();

        let err = reg.insert(sphere("a")).unwrap_err();
        assert_eq!(err, RegistryError::Conflict("a".into()));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.list(), before);
    }

    #[test]
    fn remove_unknown_is_not_found_and_idempotent() {
        let mut reg = ObjectRegistry::new();
        reg.insert(cube("a")).unwrap();
        assert_eq!(
            reg.remove(&ObjectId::from("zzz")).unwrap_err(),
            RegistryError::NotFound("zzz".into())
        );
        assert_eq!(reg.len(), 1);

        reg.remove(&ObjectId::from("a")).unwrap();
        let after_first = reg.list();
        assert!(reg.remove(&ObjectId::from("a")).is_err());
        assert!(reg.remove(&ObjectId::from("a")).is_err());
        assert_eq!(reg.list(), after_first);
    }

    #[test]
    fn ids_stay_unique_across_mixed_sequences() {
        let mut reg = ObjectRegistry::new();
        let ops: &[(&str, bool)] = &[
            ("a", true), ("b", true), ("a", true), ("a", false), ("a", true),
            ("c", true), ("b", false), ("b", true), ("b", true), ("c", false),
        ];
        for (id, insert) in ops {
            if *insert {
                let _ = reg.insert(cube(id));
            } else {
                let _ = reg.remove(&ObjectId::from(*id));
            }
            let ids = reg.ids();
            let unique: HashSet<_> = ids.iter().collect();
            assert_eq!(unique.len(), ids.len());
        }
    }

    #[test]
    fn snapshots_do_not_alias_storage() {
        let mut reg = ObjectRegistry::new();
        reg.insert(cube("a")).unwrap();

        let mut snap = reg.list();
        snap[0].properties.insert("color".into(), PropertyValue::from("#000000"));
        let mut one = reg.get(&ObjectId::from("a")).unwrap();
        one.position = Position::new(9.0, 9.0, 9.0).unwrap();

        let stored = reg.get(&ObjectId::from("a")).unwrap();
        assert_eq!(stored.property("color"), Some(&PropertyValue::from("#00ffff")));
        assert_eq!(stored.position, Position::ORIGIN);
    }

    #[test]
    fn update_replaces_in_place_or_not_at_all() {
        let mut reg = ObjectRegistry::new();
        reg.insert(cube("a")).unwrap();
        reg.insert(sphere("b")).unwrap();

        let patch =
            ObjectPatch::position(Position::new(5.0, 0.0, 0.0).unwrap()).set("color", "#123456");
        let updated = reg.update(&ObjectId::from("a"), &patch).unwrap();
        assert_eq!(updated.position.x(), 5.0);
        assert_eq!(reg.ids()[0], ObjectId::from("a"));

        let mut bad = ObjectPatch::default();
        bad.source = Some("function X() end".into());
        // Builtins may carry source, so this applies; an empty source on a
        // synthesized record is the failing case.
        reg.update(&ObjectId::from("b"), &bad).unwrap();

        let mut synth = CanvasObject::synthesized("s", Position::ORIGIN, "function A() end");
        synth.properties.insert("k".into(), PropertyValue::Number(1.0));
        reg.insert(synth.clone()).unwrap();
        let empty = ObjectPatch {
            source: Some(String::new()),
            ..ObjectPatch::default().set("k", 2.0)
        };
        assert!(reg.update(&ObjectId::from("s"), &empty).is_err());
        assert_eq!(reg.get(&ObjectId::from("s")).unwrap(), synth);
    }

    #[test]
    fn cube_sphere_delete_cube_leaves_exactly_sphere() {
        let mut reg = ObjectRegistry::new();
        let s = sphere("S");
        reg.insert(cube("C")).unwrap();
        reg.insert(s.clone()).unwrap();
        reg.remove(&ObjectId::from("C")).unwrap();

        assert_eq!(reg.list(), vec![s]);
    }

    #[test]
    fn store_handles_share_one_registry() {
        let store = ObjectStore::new();
        let other = store.clone();
        store.insert(cube("a")).unwrap();
        assert!(other.contains(&ObjectId::from("a")));
        other.remove(&ObjectId::from("a")).unwrap();
        assert!(store.is_empty());
    }
}
