//! Renderable fragments produced by object behaviors.
//!
//! A factory returns a mesh table:
//!
//! ```lua
//! function Glow()
//!   local mesh = { shape = "sphere", color = "#88ccff", emissive = "#224466" }
//!   useFrame(function(m, elapsed, delta) m.rotation.y = m.rotation.y + delta end)
//!   return mesh
//! end
//! ```
//!
//! Per-tick callbacks mutate the table; `MountedFragment::tick` runs them
//! and reads the table back into a `MeshSpec`.

use std::fmt;

use mlua::{Function, Lua, Table, Value};
use serde_json::json;

use crate::error::{format_lua_error, ScriptError};
use crate::sandbox::Sandbox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Box,
    Sphere,
    Cylinder,
    Cone,
    Torus,
    Plane,
    Text,
}

impl Shape {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "box" | "cube" => Some(Shape::Box),
            "sphere" => Some(Shape::Sphere),
            "cylinder" => Some(Shape::Cylinder),
            "cone" => Some(Shape::Cone),
            "torus" => Some(Shape::Torus),
            "plane" => Some(Shape::Plane),
            "text" => Some(Shape::Text),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Shape::Box => "box",
            Shape::Sphere => "sphere",
            Shape::Cylinder => "cylinder",
            Shape::Cone => "cone",
            Shape::Torus => "torus",
            Shape::Plane => "plane",
            Shape::Text => "text",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Vec3 = Vec3 { x: 1.0, y: 1.0, z: 1.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn splat(v: f64) -> Self {
        Self { x: v, y: v, z: v }
    }

    pub fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

/// Snapshot of one mesh table.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshSpec {
    pub shape: Shape,
    pub size: f64,
    pub color: String,
    pub metalness: Option<f64>,
    pub roughness: Option<f64>,
    pub emissive: Option<String>,
    pub opacity: Option<f64>,
    pub text: Option<String>,
    /// Offset from the owning object's position.
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for MeshSpec {
    fn default() -> Self {
        Self {
            shape: Shape::Box,
            size: 1.0,
            color: "#ffffff".to_string(),
            metalness: None,
            roughness: None,
            emissive: None,
            opacity: None,
            text: None,
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl MeshSpec {
    /// Read a mesh table. Unknown shapes and non-finite numbers are errors.
    pub fn from_table(table: &Table) -> Result<Self, String> {
        let mut spec = MeshSpec::default();

        if let Some(shape) = get::<String>(table, "shape")? {
            spec.shape = Shape::parse(&shape).ok_or_else(|| format!("unknown shape: {shape}"))?;
        }
        if let Some(size) = finite(table, "size")? {
            spec.size = size;
        }
        if let Some(color) = get::<String>(table, "color")? {
            spec.color = color;
        }
        spec.metalness = finite(table, "metalness")?;
        spec.roughness = finite(table, "roughness")?;
        spec.emissive = get::<String>(table, "emissive")?;
        spec.opacity = finite(table, "opacity")?;
        spec.text = get::<String>(table, "text")?;

        spec.position = vec3(table, "position", 0.0)?.unwrap_or(Vec3::ZERO);
        spec.rotation = vec3(table, "rotation", 0.0)?.unwrap_or(Vec3::ZERO);
        spec.scale = match table.get::<Value>("scale").map_err(|e| format_lua_error(&e))? {
            Value::Integer(i) => Vec3::splat(i as f64),
            Value::Number(n) => Vec3::splat(n),
            Value::Nil => Vec3::ONE,
            _ => vec3(table, "scale", 1.0)?.unwrap_or(Vec3::ONE),
        };
        if !spec.scale.is_finite() {
            return Err("scale must be finite".into());
        }

        if spec.shape == Shape::Text && spec.text.is_none() {
            spec.text = Some(String::new());
        }
        Ok(spec)
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "shape": self.shape.as_str(),
            "size": self.size,
            "color": self.color,
            "metalness": self.metalness,
            "roughness": self.roughness,
            "emissive": self.emissive,
            "opacity": self.opacity,
            "text": self.text,
            "position": [self.position.x, self.position.y, self.position.z],
            "rotation": [self.rotation.x, self.rotation.y, self.rotation.z],
            "scale": [self.scale.x, self.scale.y, self.scale.z],
        })
    }
}

fn get<T: mlua::FromLua>(table: &Table, key: &str) -> Result<Option<T>, String> {
    table
        .get::<Option<T>>(key)
        .map_err(|e| format!("field {key}: {}", format_lua_error(&e)))
}

fn finite(table: &Table, key: &str) -> Result<Option<f64>, String> {
    match get::<f64>(table, key)? {
        Some(v) if !v.is_finite() => Err(format!("field {key} must be finite")),
        other => Ok(other),
    }
}

fn vec3(table: &Table, key: &str, missing: f64) -> Result<Option<Vec3>, String> {
    let Some(inner) = get::<Table>(table, key)? else {
        return Ok(None);
    };
    let component = |name: &str, index: i64| -> Result<f64, String> {
        let named = inner
            .get::<Option<f64>>(name)
            .map_err(|e| format!("{key}.{name}: {}", format_lua_error(&e)))?;
        let value = match named {
            Some(v) => Some(v),
            None => inner
                .get::<Option<f64>>(index)
                .map_err(|e| format!("{key}[{index}]: {}", format_lua_error(&e)))?,
        };
        Ok(value.unwrap_or(missing))
    };
    let v = Vec3::new(component("x", 1)?, component("y", 2)?, component("z", 3)?);
    if !v.is_finite() {
        return Err(format!("field {key} must be finite"));
    }
    Ok(Some(v))
}

/// Store `{x, y, z}` tables for the vector fields so callbacks can always
/// write `mesh.rotation.y = ...`.
pub(crate) fn normalize_vectors(lua: &Lua, table: &Table, spec: &MeshSpec) -> mlua::Result<()> {
    for (key, v) in [("position", spec.position), ("rotation", spec.rotation)] {
        let target = match table.get::<Value>(key)? {
            Value::Table(t) => t,
            _ => {
                let t = lua.create_table()?;
                table.set(key, t.clone())?;
                t
            }
        };
        target.set("x", v.x)?;
        target.set("y", v.y)?;
        target.set("z", v.z)?;
    }
    Ok(())
}

/// A fragment whose factory has run. Dropping it drops its callbacks.
pub struct MountedFragment {
    sandbox: Sandbox,
    mesh: Table,
    callbacks: Vec<Function>,
    spec: MeshSpec,
}

impl fmt::Debug for MountedFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountedFragment")
            .field("spec", &self.spec)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl MountedFragment {
    pub(crate) fn new(
        sandbox: Sandbox,
        mesh: Table,
        callbacks: Vec<Function>,
    ) -> Result<Self, ScriptError> {
        let spec = MeshSpec::from_table(&mesh).map_err(ScriptError::Mount)?;
        normalize_vectors(sandbox.lua(), &mesh, &spec)
            .map_err(|e| ScriptError::Mount(format_lua_error(&e)))?;
        Ok(Self {
            sandbox,
            mesh,
            callbacks,
            spec,
        })
    }

    /// The mesh as of the last successful tick (or mount).
    pub fn spec(&self) -> &MeshSpec {
        &self.spec
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Run every per-tick callback, then read the mesh back. On failure the
    /// previous spec is kept.
    pub fn tick(&mut self, elapsed: f64, delta: f64) -> Result<&MeshSpec, ScriptError> {
        if !self.callbacks.is_empty() {
            let mesh = &self.mesh;
            let callbacks = &self.callbacks;
            self.sandbox
                .guarded(|| {
                    for callback in callbacks {
                        callback.call::<()>((mesh.clone(), elapsed, delta))?;
                    }
                    Ok(())
                })
                .map_err(|e| ScriptError::Invocation(format_lua_error(&e)))?;
            self.spec = MeshSpec::from_table(&self.mesh).map_err(ScriptError::Invocation)?;
        }
        Ok(&self.spec)
    }
}
