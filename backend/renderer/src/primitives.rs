//! Static shapes for builtin kinds and the compile-failure placeholder.

use sceneforge_core::{CanvasObject, ObjectId, ObjectKind, Position};
use sceneforge_script::{MeshSpec, Shape, Vec3};

/// Color of the box drawn in place of a synthesized object that failed to
/// compile or mount.
pub const PLACEHOLDER_COLOR: &str = "#ff0088";

const CUBE_COLOR: &str = "#00ffff";
const SPHERE_COLOR: &str = "#ff00ff";
const TEXT_COLOR: &str = "#ffffff";
const DEFAULT_TEXT: &str = "AI Generated";
const SPHERE_RADIUS: f64 = 0.5;
const FONT_SIZE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawSource {
    Builtin,
    Synthesized,
    Placeholder,
}

/// One mesh in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub object_id: ObjectId,
    pub source: DrawSource,
    pub mesh: MeshSpec,
}

pub(crate) fn world(position: Position) -> Vec3 {
    Vec3::new(position.x(), position.y(), position.z())
}

fn text_prop(object: &CanvasObject, key: &str) -> Option<String> {
    object.property(key).and_then(|p| p.as_str()).map(str::to_string)
}

fn number_prop(object: &CanvasObject, key: &str) -> Option<f64> {
    object
        .property(key)
        .and_then(|p| p.as_f64())
        .filter(|v| v.is_finite())
}

/// Mesh for a builtin kind, with properties overriding the defaults.
/// Returns `None` for synthesized objects.
pub fn builtin_mesh(object: &CanvasObject) -> Option<MeshSpec> {
    let (shape, color, size) = match object.kind {
        ObjectKind::Cube => (Shape::Box, CUBE_COLOR, number_prop(object, "size").unwrap_or(1.0)),
        ObjectKind::Sphere => (
            Shape::Sphere,
            SPHERE_COLOR,
            number_prop(object, "radius")
                .or_else(|| number_prop(object, "size"))
                .unwrap_or(SPHERE_RADIUS),
        ),
        ObjectKind::Text => (
            Shape::Text,
            TEXT_COLOR,
            number_prop(object, "fontSize").unwrap_or(FONT_SIZE),
        ),
        ObjectKind::Synthesized => return None,
    };

    let mut mesh = MeshSpec {
        shape,
        size,
        color: text_prop(object, "color").unwrap_or_else(|| color.to_string()),
        position: world(object.position),
        ..MeshSpec::default()
    };
    mesh.metalness = number_prop(object, "metalness");
    mesh.roughness = number_prop(object, "roughness");
    mesh.emissive = text_prop(object, "emissive");
    mesh.opacity = number_prop(object, "opacity");
    if shape == Shape::Text {
        mesh.text = Some(text_prop(object, "text").unwrap_or_else(|| DEFAULT_TEXT.to_string()));
    }
    Some(mesh)
}

/// Magenta unit box at `position`.
pub fn placeholder_mesh(position: Position) -> MeshSpec {
    MeshSpec {
        shape: Shape::Box,
        size: 1.0,
        color: PLACEHOLDER_COLOR.to_string(),
        position: world(position),
        ..MeshSpec::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_defaults() {
        let at_origin = |id: &str, kind| CanvasObject::builtin(id, kind, Position::ORIGIN);

        let cube = builtin_mesh(&at_origin("c", ObjectKind::Cube)).unwrap();
        assert_eq!((cube.shape, cube.color.as_str(), cube.size), (Shape::Box, "#00ffff", 1.0));

        let sphere = builtin_mesh(&at_origin("s", ObjectKind::Sphere)).unwrap();
        assert_eq!(
            (sphere.shape, sphere.color.as_str(), sphere.size),
            (Shape::Sphere, "#ff00ff", 0.5)
        );

        let text = builtin_mesh(&at_origin("t", ObjectKind::Text)).unwrap();
        assert_eq!(text.text.as_deref(), Some("AI Generated"));
        assert_eq!((text.color.as_str(), text.size), ("#ffffff", 0.5));
    }

    #[test]
    fn properties_override_defaults() {
        let position = Position::new(1.0, 2.0, 3.0).unwrap();
        let obj = CanvasObject::builtin("t", ObjectKind::Text, position)
            .with_property("text", "hello")
            .with_property("color", "#123456")
            .with_property("fontSize", 2.0);
        let mesh = builtin_mesh(&obj).unwrap();
        assert_eq!(mesh.text.as_deref(), Some("hello"));
        assert_eq!(mesh.color, "#123456");
        assert_eq!(mesh.size, 2.0);
        assert_eq!(mesh.position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn synthesized_has_no_builtin_mesh() {
        let obj = CanvasObject::synthesized("x", Position::ORIGIN, "function A() end");
        assert!(builtin_mesh(&obj).is_none());
    }

    #[test]
    fn placeholder_is_magenta_box_at_position() {
        let mesh = placeholder_mesh(Position::new(4.0, 0.0, -4.0).unwrap());
        assert_eq!(mesh.shape, Shape::Box);
        assert_eq!(mesh.color, PLACEHOLDER_COLOR);
        assert_eq!(mesh.position, Vec3::new(4.0, 0.0, -4.0));
    }
}
