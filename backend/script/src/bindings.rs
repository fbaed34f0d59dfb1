//! Lua surface of the capability context.
//!
//! `context.objects` is a plain-table copy of the snapshot.
//! `addObject(record)` returns the new id, or `nil, err` when the registry
//! refuses the write. `updateObject(id, patch)` and `deleteObject(id)`
//! return `true`, or `false, err`. Records that cannot be read at all
//! raise a Lua error.

use std::rc::Rc;

use mlua::{Lua, LuaSerdeExt, Table, Value};
use serde_json::json;
use sceneforge_core::object::{CanvasObject, ObjectDraft, ObjectId, ObjectPatch};
use sceneforge_core::CapabilityContext;

use crate::error::format_lua_error;

/// Convert a Lua value to JSON. Functions and other host values become
/// `null`.
pub fn lua_to_json(lua: &Lua, value: Value) -> mlua::Result<serde_json::Value> {
    let options = mlua::DeserializeOptions::new().deny_unsupported_types(false);
    lua.from_value_with(value, options)
}

/// Convert JSON to a Lua value. `null` becomes `nil`.
pub fn json_to_lua(lua: &Lua, value: &serde_json::Value) -> mlua::Result<Value> {
    let options = mlua::SerializeOptions::new()
        .serialize_none_to_null(false)
        .serialize_unit_to_null(false);
    lua.to_value_with(value, options)
}

fn object_to_json(object: &CanvasObject) -> serde_json::Value {
    json!({
        "id": object.id.as_str(),
        "kind": object.kind.as_str(),
        "position": {
            "x": object.position.x(),
            "y": object.position.y(),
            "z": object.position.z(),
        },
        "properties": object.properties,
        "source": object.source,
        "provenance": object.provenance(),
    })
}

fn record_error(what: &str, err: impl std::fmt::Display) -> mlua::Error {
    mlua::Error::RuntimeError(format!("{what}: {err}"))
}

/// Build the `context` table handed to a tool behavior.
pub fn context_table(lua: &Lua, context: Rc<CapabilityContext>) -> mlua::Result<Table> {
    let table = lua.create_table()?;

    let objects = lua.create_table()?;
    for (i, object) in context.objects().iter().enumerate() {
        objects.set(i + 1, json_to_lua(lua, &object_to_json(object))?)?;
    }
    table.set("objects", objects)?;

    let ctx = Rc::clone(&context);
    let add = lua.create_function(move |lua, record: Value| {
        if !matches!(record, Value::Table(_)) {
            return Err(record_error("addObject expects a table", record.type_name()));
        }
        let json = lua_to_json(lua, record)?;
        let draft = ObjectDraft::from_json(&json).map_err(|e| record_error("addObject", e))?;
        Ok(match ctx.add_object(draft) {
            Ok(id) => (Some(id.to_string()), None),
            Err(e) => (None, Some(e.to_string())),
        })
    })?;
    table.set("addObject", add)?;

    let ctx = Rc::clone(&context);
    let update = lua.create_function(move |lua, (id, patch): (String, Value)| {
        let json = match patch {
            Value::Table(_) => lua_to_json(lua, patch)?,
            other => return Err(record_error("updateObject expects a table", other.type_name())),
        };
        let patch = ObjectPatch::from_json(&json).map_err(|e| record_error("updateObject", e))?;
        Ok(match ctx.update_object(&ObjectId::new(id), &patch) {
            Ok(_) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        })
    })?;
    table.set("updateObject", update)?;

    let ctx = context;
    let delete = lua.create_function(move |_, id: String| {
        Ok(match ctx.delete_object(&ObjectId::new(id)) {
            Ok(_) => (true, None),
            Err(e) => (false, Some(e.to_string())),
        })
    })?;
    table.set("deleteObject", delete)?;

    Ok(table)
}

/// Render a Lua error raised while building bindings.
pub(crate) fn binding_error(err: &mlua::Error) -> String {
    format!("context binding failed: {}", format_lua_error(err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneforge_core::object::{ObjectKind, ObjectOrigin, Position};
    use sceneforge_core::ObjectStore;

    fn setup() -> (Lua, ObjectStore, Table) {
        let lua = Lua::new();
        let store = ObjectStore::new();
        store
            .insert(
                CanvasObject::builtin("a", ObjectKind::Cube, Position::ORIGIN)
                    .with_property("color", "#00ffff"),
            )
            .unwrap();
        let origin = ObjectOrigin::tool_generated("tool_t");
        let ctx = Rc::new(CapabilityContext::new(store.clone(), origin));
        let table = context_table(&lua, ctx).unwrap();
        lua.globals().set("context", table.clone()).unwrap();
        (lua, store, table)
    }

    #[test]
    fn objects_snapshot_is_plain_tables() {
        let (lua, _store, _) = setup();
        let (id, kind, x, color): (String, String, f64, String) = lua
            .load(
                "local o = context.objects[1] \
                 return o.id, o.kind, o.position.x, o.properties.color",
            )
            .eval()
            .unwrap();
        assert_eq!((id.as_str(), kind.as_str(), x, color.as_str()), ("a", "cube", 0.0, "#00ffff"));
    }

    #[test]
    fn add_object_returns_id_or_error() {
        let (lua, store, _) = setup();
        let id: String = lua
            .load(
                "return context.addObject({ \
                 kind = 'sphere', position = { x = 1, y = 2, z = 3 }, color = '#ff0000' })",
            )
            .eval()
            .unwrap();
        assert!(id.starts_with("obj_"));
        assert_eq!(store.len(), 2);

        let (ok, err): (Value, String) =
            lua.load("return context.addObject({ id = 'a' })").eval().unwrap();
        assert!(ok.is_nil());
        assert!(err.contains("already exists"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn malformed_record_raises() {
        let (lua, store, _) = setup();
        assert!(lua.load("context.addObject(42)").exec().is_err());
        assert!(lua.load("context.addObject({ kind = 'dodecahedron' })").exec().is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_and_delete_report_status() {
        let (lua, store, _) = setup();
        let ok: bool = lua
            .load("return context.updateObject('a', { color = '#123456' })")
            .eval()
            .unwrap();
        assert!(ok);
        assert_eq!(
            store
                .get(&ObjectId::from("a"))
                .unwrap()
                .property("color")
                .and_then(|p| p.as_str().map(str::to_string)),
            Some("#123456".to_string())
        );

        let (ok, err): (bool, String) =
            lua.load("return context.deleteObject('nope')").eval().unwrap();
        assert!(!ok);
        assert!(err.contains("not found"));

        let ok: bool = lua.load("return context.deleteObject('a')").eval().unwrap();
        assert!(ok);
        assert!(store.is_empty());
    }
}
