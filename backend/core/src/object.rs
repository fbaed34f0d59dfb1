use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::RegistryError;

/// Opaque, unique identifier of a live scene entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh id of the form `<prefix>_<uuid>`.
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{}_{}", prefix, Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A point in scene space. Always three finite numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 3]", into = "[f64; 3]")]
pub struct Position([f64; 3]);

impl Position {
    pub const ORIGIN: Position = Position([0.0, 0.0, 0.0]);

    pub fn new(x: f64, y: f64, z: f64) -> Result<Self, RegistryError> {
        if x.is_finite() && y.is_finite() && z.is_finite() {
            Ok(Self([x, y, z]))
        } else {
            Err(RegistryError::Invalid(format!(
                "position must be finite, got [{x}, {y}, {z}]"
            )))
        }
    }

    pub fn x(&self) -> f64 {
        self.0[0]
    }

    pub fn y(&self) -> f64 {
        self.0[1]
    }

    pub fn z(&self) -> f64 {
        self.0[2]
    }

    pub fn to_array(self) -> [f64; 3] {
        self.0
    }

    /// Parse `[x, y, z]` or `{ "x": .., "y": .., "z": .. }`. Missing named
    /// components default to zero.
    pub fn from_json(value: &Value) -> Result<Self, RegistryError> {
        let component = |v: Option<&Value>| -> Result<f64, RegistryError> {
            match v {
                None | Some(Value::Null) => Ok(0.0),
                Some(v) => v.as_f64().ok_or_else(|| {
                    RegistryError::Invalid(format!("position component is not a number: {v}"))
                }),
            }
        };
        match value {
            Value::Array(items) if items.len() == 3 => Position::new(
                component(items.first())?,
                component(items.get(1))?,
                component(items.get(2))?,
            ),
            Value::Object(map) => Position::new(
                component(map.get("x"))?,
                component(map.get("y"))?,
                component(map.get("z"))?,
            ),
            other => Err(RegistryError::Invalid(format!(
                "position must be [x, y, z] or {{x, y, z}}, got {other}"
            ))),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl TryFrom<[f64; 3]> for Position {
    type Error = RegistryError;

    fn try_from(v: [f64; 3]) -> Result<Self, Self::Error> {
        Position::new(v[0], v[1], v[2])
    }
}

impl From<Position> for [f64; 3] {
    fn from(p: Position) -> Self {
        p.0
    }
}

/// What a scene entity is. Builtins are drawn by fixed renderer code;
/// synthesized entities carry generated behavior source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    #[serde(alias = "box")]
    Cube,
    Sphere,
    Text,
    #[serde(alias = "ai_generated")]
    Synthesized,
}

impl ObjectKind {
    pub const BUILTINS: [ObjectKind; 3] = [ObjectKind::Cube, ObjectKind::Sphere, ObjectKind::Text];

    pub fn is_builtin(self) -> bool {
        !matches!(self, ObjectKind::Synthesized)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Cube => "cube",
            ObjectKind::Sphere => "sphere",
            ObjectKind::Text => "text",
            ObjectKind::Synthesized => "synthesized",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cube" | "box" => Some(ObjectKind::Cube),
            "sphere" => Some(ObjectKind::Sphere),
            "text" => Some(ObjectKind::Text),
            "synthesized" | "ai_generated" => Some(ObjectKind::Synthesized),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A primitive property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert a JSON scalar. Arrays, objects and null have no primitive form.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(PropertyValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(PropertyValue::Number),
            Value::String(s) => Some(PropertyValue::Text(s.clone())),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Text(s)
    }
}

impl From<f64> for PropertyValue {
    fn from(n: f64) -> Self {
        PropertyValue::Number(n)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

pub type Properties = BTreeMap<String, PropertyValue>;

/// How an entity came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    #[default]
    Manual,
    Synthesized,
    ToolGenerated,
}

/// Provenance tag plus the prompt and feature tags that produced an entity.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectOrigin {
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ObjectOrigin {
    pub fn manual() -> Self {
        Self::default()
    }

    pub fn synthesized(prompt: impl Into<String>) -> Self {
        Self {
            provenance: Provenance::Synthesized,
            prompt: Some(prompt.into()),
            tags: Vec::new(),
        }
    }

    pub fn tool_generated(tool_id: impl Into<String>) -> Self {
        Self {
            provenance: Provenance::ToolGenerated,
            prompt: None,
            tags: vec![tool_id.into()],
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        for tag in tags {
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
        self
    }
}

/// A live scene entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasObject {
    pub id: ObjectId,
    pub kind: ObjectKind,
    pub position: Position,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<ObjectOrigin>,
}

impl CanvasObject {
    pub fn builtin(id: impl Into<ObjectId>, kind: ObjectKind, position: Position) -> Self {
        Self {
            id: id.into(),
            kind,
            position,
            properties: Properties::new(),
            source: None,
            origin: Some(ObjectOrigin::manual()),
        }
    }

    pub fn synthesized(
        id: impl Into<ObjectId>,
        position: Position,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: ObjectKind::Synthesized,
            position,
            properties: Properties::new(),
            source: Some(source.into()),
            origin: None,
        }
    }

    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_origin(mut self, origin: ObjectOrigin) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn provenance(&self) -> Provenance {
        self.origin
            .as_ref()
            .map(|o| o.provenance)
            .unwrap_or_default()
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Check the record invariants: non-empty id, and non-empty source for
    /// synthesized entities. Position finiteness is guaranteed by `Position`.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.id.as_str().trim().is_empty() {
            return Err(RegistryError::Invalid("object id must not be empty".into()));
        }
        if self.kind == ObjectKind::Synthesized
            && self.source.as_deref().map_or(true, |s| s.trim().is_empty())
        {
            return Err(RegistryError::Invalid(format!(
                "synthesized object {} has no source text",
                self.id
            )));
        }
        Ok(())
    }
}

/// The loose record a behavior hands to `addObject`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectDraft {
    pub id: Option<String>,
    pub kind: Option<ObjectKind>,
    pub position: Option<Position>,
    pub properties: Properties,
    pub source: Option<String>,
    pub prompt: Option<String>,
    pub tags: Vec<String>,
}

const DRAFT_FIELDS: &[&str] = &[
    "id", "kind", "type", "position", "properties", "props", "source", "code", "prompt", "tags",
];

impl ObjectDraft {
    /// Parse a JSON object. Unknown primitive keys become properties;
    /// unknown structured keys are ignored.
    pub fn from_json(value: &Value) -> Result<Self, RegistryError> {
        let Value::Object(map) = value else {
            return Err(RegistryError::Invalid(format!(
                "object record must be a table, got {value}"
            )));
        };

        let mut draft = ObjectDraft::default();

        if let Some(id) = map.get("id").filter(|v| !v.is_null()) {
            let id = id
                .as_str()
                .ok_or_else(|| RegistryError::Invalid("id must be a string".into()))?;
            draft.id = Some(id.to_string());
        }

        if let Some(kind) = map.get("kind").or_else(|| map.get("type")).filter(|v| !v.is_null()) {
            let name = kind
                .as_str()
                .ok_or_else(|| RegistryError::Invalid("kind must be a string".into()))?;
            let kind = ObjectKind::parse(name)
                .ok_or_else(|| RegistryError::Invalid(format!("unknown object kind: {name}")))?;
            draft.kind = Some(kind);
        }

        if let Some(pos) = map.get("position").filter(|v| !v.is_null()) {
            draft.position = Some(Position::from_json(pos)?);
        }

        for key in ["props", "properties"] {
            if let Some(Value::Object(props)) = map.get(key) {
                for (k, v) in props {
                    if let Some(p) = PropertyValue::from_json(v) {
                        draft.properties.insert(k.clone(), p);
                    }
                }
            }
        }

        for (k, v) in map {
            if DRAFT_FIELDS.contains(&k.as_str()) {
                continue;
            }
            if let Some(p) = PropertyValue::from_json(v) {
                draft.properties.insert(k.clone(), p);
            }
        }

        draft.source = map
            .get("source")
            .or_else(|| map.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string);
        draft.prompt = map.get("prompt").and_then(Value::as_str).map(str::to_string);
        if let Some(Value::Array(tags)) = map.get("tags") {
            draft.tags = tags
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect();
        }

        Ok(draft)
    }

    /// Materialize the draft. A draft with source and no explicit kind is
    /// synthesized; otherwise the kind defaults to a cube.
    pub fn into_object(self, origin: ObjectOrigin) -> Result<CanvasObject, RegistryError> {
        let id = match self.id {
            Some(id) => ObjectId::new(id),
            None => ObjectId::generate("obj"),
        };
        let kind = match (self.kind, &self.source) {
            (Some(kind), _) => kind,
            (None, Some(_)) => ObjectKind::Synthesized,
            (None, None) => ObjectKind::Cube,
        };
        let mut origin = origin.with_tags(self.tags);
        if self.prompt.is_some() {
            origin.prompt = self.prompt;
        }
        let object = CanvasObject {
            id,
            kind,
            position: self.position.unwrap_or_default(),
            properties: self.properties,
            source: self.source,
            origin: Some(origin),
        };
        object.validate()?;
        Ok(object)
    }
}

/// A partial change to an existing object. Applied atomically by the registry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectPatch {
    pub position: Option<Position>,
    pub source: Option<String>,
    /// `None` removes the property.
    pub properties: BTreeMap<String, Option<PropertyValue>>,
}

impl ObjectPatch {
    pub fn position(position: Position) -> Self {
        Self {
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), Some(value.into()));
        self
    }

    pub fn unset(mut self, key: impl Into<String>) -> Self {
        self.properties.insert(key.into(), None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.source.is_none() && self.properties.is_empty()
    }

    /// Parse a JSON object. `id` and `kind` cannot be patched and are ignored.
    pub fn from_json(value: &Value) -> Result<Self, RegistryError> {
        let Value::Object(map) = value else {
            return Err(RegistryError::Invalid(format!("patch must be a table, got {value}")));
        };

        let mut patch = ObjectPatch::default();
        if let Some(pos) = map.get("position").filter(|v| !v.is_null()) {
            patch.position = Some(Position::from_json(pos)?);
        }
        patch.source = map
            .get("source")
            .or_else(|| map.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut merge = |k: &str, v: &Value| {
            if v.is_null() {
                patch.properties.insert(k.to_string(), None);
            } else if let Some(p) = PropertyValue::from_json(v) {
                patch.properties.insert(k.to_string(), Some(p));
            }
        };
        for key in ["props", "properties"] {
            if let Some(Value::Object(props)) = map.get(key) {
                for (k, v) in props {
                    merge(k, v);
                }
            }
        }
        for (k, v) in map {
            if !DRAFT_FIELDS.contains(&k.as_str()) {
                merge(k, v);
            }
        }
        Ok(patch)
    }

    /// Build the patched copy of `object` and validate it. The original is
    /// never touched.
    pub fn apply(&self, object: &CanvasObject) -> Result<CanvasObject, RegistryError> {
        let mut next = object.clone();
        if let Some(position) = self.position {
            next.position = position;
        }
        if let Some(source) = &self.source {
            next.source = Some(source.clone());
        }
        for (key, value) in &self.properties {
            match value {
                Some(v) => {
                    next.properties.insert(key.clone(), v.clone());
                }
                None => {
                    next.properties.remove(key);
                }
            }
        }
        next.validate()?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn position_rejects_non_finite() {
        assert!(Position::new(0.0, f64::NAN, 1.0).is_err());
        assert!(Position::new(f64::INFINITY, 0.0, 0.0).is_err());
        assert!(Position::new(1.0, 2.0, 3.0).is_ok());
    }

    #[test]
    fn position_parses_array_and_named_forms() {
        let a = Position::from_json(&json!([1, 2.5, -3])).unwrap();
        assert_eq!(a.to_array(), [1.0, 2.5, -3.0]);
        let b = Position::from_json(&json!({"x": 1, "z": 4})).unwrap();
        assert_eq!(b.to_array(), [1.0, 0.0, 4.0]);
        assert!(Position::from_json(&json!([1, 2])).is_err());
        assert!(Position::from_json(&json!("nope")).is_err());
    }

    #[test]
    fn synthesized_requires_source() {
        let obj = CanvasObject::synthesized("a", Position::ORIGIN, "   ");
        assert!(obj.validate().is_err());
        let obj = CanvasObject::synthesized("a", Position::ORIGIN, "function Glow() end");
        assert!(obj.validate().is_ok());
    }

    #[test]
    fn draft_collects_extra_primitives_as_properties() {
        let draft = ObjectDraft::from_json(&json!({
            "type": "sphere",
            "position": [0, 1, 0],
            "color": "#ff0000",
            "radius": 2,
            "material": {"ignored": true},
            "props": {"text": "hi"}
        }))
        .unwrap();
        assert_eq!(draft.kind, Some(ObjectKind::Sphere));
        assert_eq!(draft.properties.get("color"), Some(&PropertyValue::from("#ff0000")));
        assert_eq!(draft.properties.get("radius"), Some(&PropertyValue::Number(2.0)));
        assert_eq!(draft.properties.get("text"), Some(&PropertyValue::from("hi")));
        assert!(!draft.properties.contains_key("material"));
    }

    #[test]
    fn draft_with_source_defaults_to_synthesized() {
        let draft = ObjectDraft::from_json(&json!({"source": "function A() end"})).unwrap();
        let obj = draft.into_object(ObjectOrigin::tool_generated("tool_1")).unwrap();
        assert_eq!(obj.kind, ObjectKind::Synthesized);
        assert_eq!(obj.provenance(), Provenance::ToolGenerated);
        assert!(obj.id.as_str().starts_with("obj_"));
    }

    #[test]
    fn draft_rejects_unknown_kind() {
        assert!(ObjectDraft::from_json(&json!({"kind": "teapot"})).is_err());
    }

    #[test]
    fn patch_apply_is_all_or_nothing() {
        let obj = CanvasObject::synthesized("s", Position::ORIGIN, "function A() end")
            .with_property("color", "#fff");
        let bad = ObjectPatch {
            source: Some(String::new()),
            ..ObjectPatch::position(Position::new(1.0, 1.0, 1.0).unwrap())
        };
        assert!(bad.apply(&obj).is_err());

        let good = ObjectPatch::position(Position::new(1.0, 1.0, 1.0).unwrap()).unset("color");
        let next = good.apply(&obj).unwrap();
        assert_eq!(next.position.to_array(), [1.0, 1.0, 1.0]);
        assert!(next.properties.is_empty());
        assert_eq!(obj.properties.len(), 1);
    }

    #[test]
    fn patch_from_json_marks_null_for_removal() {
        let patch = ObjectPatch::from_json(&json!({"color": null, "size": 3})).unwrap();
        assert_eq!(patch.properties.get("color"), Some(&None));
        assert_eq!(patch.properties.get("size"), Some(&Some(PropertyValue::Number(3.0))));
    }
}
