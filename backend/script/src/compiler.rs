use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use mlua::{FromLuaMulti, Function, IntoLuaMulti, Lua, Table, Value};
use sceneforge_core::CapabilityContext;
use tracing::debug;

use crate::bindings::{binding_error, context_table, json_to_lua, lua_to_json};
use crate::entry::{find_entry_point, BehaviorKind};
use crate::error::{format_lua_error, CompileError, ScriptError};
use crate::fragment::MountedFragment;
use crate::sandbox::{Sandbox, ScriptLimits};

/// Turns source text into callable behavior.
///
/// The compiler is a pure transform: it caches nothing. All behaviors it
/// produces share one interpreter, so clones of the compiler (and the
/// behaviors) must stay on the thread that created them.
#[derive(Clone)]
pub struct BehaviorCompiler {
    sandbox: Sandbox,
}

impl fmt::Debug for BehaviorCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorCompiler")
            .field("limits", &self.sandbox.limits())
            .finish()
    }
}

impl BehaviorCompiler {
    pub fn new(limits: ScriptLimits) -> Result<Self, ScriptError> {
        Ok(Self {
            sandbox: Sandbox::new(limits)?,
        })
    }

    pub fn limits(&self) -> ScriptLimits {
        self.sandbox.limits()
    }

    /// Make a host function callable by name from behaviors compiled after
    /// this call.
    pub fn register_host_function<A, R, F>(&self, name: &str, func: F) -> Result<(), ScriptError>
    where
        A: FromLuaMulti,
        R: IntoLuaMulti,
        F: Fn(&Lua, A) -> mlua::Result<R> + 'static,
    {
        let function = self
            .sandbox
            .lua()
            .create_function(func)
            .map_err(|e| ScriptError::Setup(format_lua_error(&e)))?;
        self.sandbox.register_host_function(name, function);
        Ok(())
    }

    /// Compile object source into a zero-argument factory.
    pub fn compile_object(
        &self,
        source: &str,
        hint: Option<&str>,
    ) -> Result<ObjectBehavior, CompileError> {
        let name = find_entry_point(source, hint, BehaviorKind::Object)
            .ok_or(CompileError::NoEntryPoint)?;
        let callbacks: Rc<RefCell<Vec<Function>>> = Rc::default();

        let env = self.environment(&name)?;
        let sink = Rc::clone(&callbacks);
        let use_frame = self
            .sandbox
            .lua()
            .create_function(move |_, callback: Function| {
                sink.try_borrow_mut()
                    .map_err(|_| mlua::Error::RuntimeError("useFrame called re-entrantly".into()))?
                    .push(callback);
                Ok(())
            })
            .map_err(|e| CompileError::Evaluation(format_lua_error(&e)))?;
        env.set("useFrame", use_frame)
            .map_err(|e| CompileError::Evaluation(format_lua_error(&e)))?;

        let factory = self.resolve(source, &name, env)?;
        debug!(entry_point = %name, "Compiled object behavior");
        Ok(ObjectBehavior {
            name,
            factory,
            callbacks,
            sandbox: self.sandbox.clone(),
        })
    }

    /// Compile tool source into a `(context, parameters)` callable.
    pub fn compile_tool(
        &self,
        source: &str,
        hint: Option<&str>,
    ) -> Result<ToolBehavior, CompileError> {
        let name = find_entry_point(source, hint, BehaviorKind::Tool)
            .ok_or(CompileError::NoEntryPoint)?;
        let env = self.environment(&name)?;
        let function = self.resolve(source, &name, env)?;
        debug!(entry_point = %name, "Compiled tool behavior");
        Ok(ToolBehavior {
            name,
            function,
            sandbox: self.sandbox.clone(),
        })
    }

    fn environment(&self, label: &str) -> Result<Table, CompileError> {
        self.sandbox
            .environment(label)
            .map_err(|e| CompileError::Evaluation(format_lua_error(&e)))
    }

    /// Evaluate `source` in `env` and fetch the value bound to `name`.
    ///
    /// A trailing `return name` makes local declarations reachable. If that
    /// variant does not parse (the source already ends in a `return`, or is
    /// broken), the plain chunk is evaluated and the environment binding is
    /// used instead.
    fn resolve(&self, source: &str, name: &str, env: Table) -> Result<Function, CompileError> {
        let lua = self.sandbox.lua();
        let chunk_name = format!("={name}");
        let with_return = format!("{source}\nreturn {name}");

        let resolved = self.sandbox.guarded(|| {
            lua.load(&with_return)
                .set_name(&chunk_name)
                .set_environment(env.clone())
                .eval::<Value>()
        });

        let value = match resolved {
            Ok(value) => value,
            Err(mlua::Error::SyntaxError { .. }) => self
                .sandbox
                .guarded(|| {
                    lua.load(source)
                        .set_name(&chunk_name)
                        .set_environment(env.clone())
                        .exec()?;
                    env.get::<Value>(name)
                })
                .map_err(|e| CompileError::Evaluation(format_lua_error(&e)))?,
            Err(e) => return Err(CompileError::Evaluation(format_lua_error(&e))),
        };

        match value {
            Value::Function(f) => Ok(f),
            other => Err(CompileError::NotCallable {
                name: name.to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }
}

/// A compiled object factory.
pub struct ObjectBehavior {
    name: String,
    factory: Function,
    callbacks: Rc<RefCell<Vec<Function>>>,
    sandbox: Sandbox,
}

impl fmt::Debug for ObjectBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBehavior").field("name", &self.name).finish()
    }
}

impl ObjectBehavior {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call the factory and collect the per-tick callbacks it registers
    /// (via `useFrame`, plus an `animate` field on the mesh).
    pub fn mount(&self) -> Result<MountedFragment, ScriptError> {
        self.callbacks
            .try_borrow_mut()
            .map_err(|_| ScriptError::Mount("behavior is already mounting".into()))?
            .clear();

        let produced = self
            .sandbox
            .guarded(|| self.factory.call::<Value>(()))
            .map_err(|e| ScriptError::Mount(format_lua_error(&e)))?;
        let mesh = match produced {
            Value::Table(t) => t,
            other => {
                return Err(ScriptError::Mount(format!(
                    "{} returned {}, expected a mesh table",
                    self.name,
                    other.type_name()
                )))
            }
        };

        let mut callbacks = self
            .callbacks
            .try_borrow_mut()
            .map(|mut c| std::mem::take(&mut *c))
            .map_err(|_| ScriptError::Mount("behavior is already mounting".into()))?;
        if let Ok(Some(animate)) = mesh.get::<Option<Function>>("animate") {
            callbacks.push(animate);
        }

        MountedFragment::new(self.sandbox.clone(), mesh, callbacks)
    }
}

/// A compiled tool entry point.
pub struct ToolBehavior {
    name: String,
    function: Function,
    sandbox: Sandbox,
}

impl fmt::Debug for ToolBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolBehavior").field("name", &self.name).finish()
    }
}

impl ToolBehavior {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke with a fresh context table and the given parameters. The
    /// return value comes back as JSON; `nil` becomes `null`.
    pub fn invoke(
        &self,
        context: Rc<CapabilityContext>,
        parameters: &serde_json::Value,
    ) -> Result<serde_json::Value, ScriptError> {
        let lua = self.sandbox.lua();
        let context = context_table(lua, context)
            .map_err(|e| ScriptError::Invocation(binding_error(&e)))?;
        let parameters = json_to_lua(lua, parameters)
            .map_err(|e| ScriptError::Invocation(format!("parameters: {}", format_lua_error(&e))))?;

        let result = self
            .sandbox
            .guarded(|| self.function.call::<Value>((context, parameters)))
            .map_err(|e| ScriptError::Invocation(format_lua_error(&e)))?;

        lua_to_json(lua, result)
            .map_err(|e| ScriptError::Invocation(format!("result: {}", format_lua_error(&e))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneforge_core::object::{CanvasObject, ObjectKind, ObjectOrigin, Position};
    use sceneforge_core::ObjectStore;
    use serde_json::json;
    use std::cell::Cell;

    use crate::fragment::Shape;

    fn compiler() -> BehaviorCompiler {
        BehaviorCompiler::new(ScriptLimits {
            instruction_limit: 100_000,
            ..ScriptLimits::default()
        })
        .unwrap()
    }

    #[test]
    fn glow_compiles_to_a_callable_bound_to_glow() {
        let behavior = compiler()
            .compile_object(
                "function Glow()\n  return { shape = 'sphere', color = '#88ccff' }\nend",
                None,
            )
            .unwrap();
        assert_eq!(behavior.name(), "Glow");
        let mounted = behavior.mount().unwrap();
        assert_eq!(mounted.spec().shape, Shape::Sphere);
        assert_eq!(mounted.spec().color, "#88ccff");
    }

    #[test]
    fn local_declarations_resolve() {
        let behavior = compiler()
            .compile_object("local function Orb() return { shape = 'sphere' } end", None)
            .unwrap();
        assert_eq!(behavior.name(), "Orb");
        assert!(behavior.mount().is_ok());
    }

    #[test]
    fn trailing_return_falls_back_to_plain_chunk() {
        let source = "function Cube() return { shape = 'box' } end\nreturn Cube";
        let behavior = compiler().compile_object(source, None).unwrap();
        assert_eq!(behavior.mount().unwrap().spec().shape, Shape::Box);
    }

    #[test]
    fn unrecognizable_text_is_no_entry_point() {
        let err = compiler().compile_object("just some prose about a cube", None).unwrap_err();
        assert_eq!(err, CompileError::NoEntryPoint);
    }

    #[test]
    fn syntax_errors_are_evaluation_failures() {
        let err = compiler().compile_object("function Broken( return end end", None).unwrap_err();
        assert!(matches!(err, CompileError::Evaluation(_)), "got {err:?}");
    }

    #[test]
    fn rebinding_to_a_value_is_not_callable() {
        let err = compiler()
            .compile_object("function Glow() return {} end\nGlow = 42", None)
            .unwrap_err();
        assert_eq!(
            err,
            CompileError::NotCallable {
                name: "Glow".into(),
                found: "integer".into()
            }
        );
    }

    #[test]
    fn hint_naming_nothing_is_not_callable() {
        let err = compiler()
            .compile_object("function A() return {} end", Some("Missing"))
            .unwrap_err();
        assert!(matches!(err, CompileError::NotCallable { ref found, .. } if found == "nil"));
    }

    #[test]
    fn top_level_infinite_loop_is_stopped() {
        let err = compiler()
            .compile_object("function A() return {} end\nwhile true do end", None)
            .unwrap_err();
        assert!(matches!(err, CompileError::Evaluation(ref m) if m.contains("instruction limit")));
    }

    #[test]
    fn escape_attempts_fail_as_evaluation() {
        let err = compiler()
            .compile_object("os.exit(1)\nfunction A() return {} end", None)
            .unwrap_err();
        assert!(matches!(err, CompileError::Evaluation(_)));
    }

    #[test]
    fn factory_must_return_a_table() {
        let behavior = compiler().compile_object("function A() return 'cube' end", None).unwrap();
        assert!(matches!(behavior.mount(), Err(ScriptError::Mount(_))));
    }

    #[test]
    fn use_frame_and_animate_register_callbacks() {
        let compiler = compiler();
        let ticks = Rc::new(Cell::new(0u32));
        let seen = Rc::clone(&ticks);
        compiler
            .register_host_function("ping", move |_, ()| {
                seen.set(seen.get() + 1);
                Ok(())
            })
            .unwrap();

        let source = r#"
            function Spinner()
              local mesh = { shape = "torus" }
              useFrame(function(m, elapsed, delta)
                ping()
                m.rotation.y = m.rotation.y + delta
              end)
              mesh.animate = function(m) ping() end
              return mesh
            end
        "#;
        let behavior = compiler.compile_object(source, None).unwrap();
        let mut mounted = behavior.mount().unwrap();
        assert_eq!(mounted.callback_count(), 2);

        mounted.tick(0.5, 0.5).unwrap();
        let spec = mounted.tick(1.0, 0.5).unwrap();
        assert_eq!(ticks.get(), 4);
        assert!((spec.rotation.y - 1.0).abs() < 1e-9);

        drop(mounted);
        assert_eq!(ticks.get(), 4);
    }

    #[test]
    fn remounting_does_not_duplicate_callbacks() {
        let behavior = compiler()
            .compile_object(
                "function A() useFrame(function() end) return { shape = 'box' } end",
                None,
            )
            .unwrap();
        assert_eq!(behavior.mount().unwrap().callback_count(), 1);
        assert_eq!(behavior.mount().unwrap().callback_count(), 1);
    }

    #[test]
    fn runaway_callback_is_stopped() {
        let behavior = compiler()
            .compile_object(
                "function A() useFrame(function() while true do end end) return {} end",
                None,
            )
            .unwrap();
        let mut mounted = behavior.mount().unwrap();
        let err = mounted.tick(0.0, 0.016).unwrap_err();
        assert!(matches!(err, ScriptError::Invocation(ref m) if m.contains("instruction limit")));
    }

    #[test]
    fn tool_adds_exactly_one_object_and_returns_success() {
        let store = ObjectStore::new();
        store
            .insert(CanvasObject::builtin("seed", ObjectKind::Cube, Position::ORIGIN))
            .unwrap();
        let before = store.len();

        let source = r#"
            function executeTool(context, parameters)
              context.addObject({ kind = "sphere", position = { x = parameters.x, y = 0, z = 0 } })
              return { success = true }
            end
        "#;
        let tool = compiler().compile_tool(source, None).unwrap();
        let origin = ObjectOrigin::tool_generated("tool_1");
        let ctx = Rc::new(CapabilityContext::new(store.clone(), origin));
        let result = tool.invoke(ctx, &json!({ "x": 4 })).unwrap();

        assert_eq!(result, json!({ "success": true }));
        assert_eq!(store.len(), before + 1);
        let added = store.list().pop().unwrap();
        assert_eq!(added.position.x(), 4.0);
    }

    #[test]
    fn tool_errors_are_invocation_failures_and_keep_earlier_writes() {
        let store = ObjectStore::new();
        let source = r#"
            function executeTool(context, parameters)
              context.addObject({ kind = "cube" })
              error("halfway")
            end
        "#;
        let tool = compiler().compile_tool(source, None).unwrap();
        let origin = ObjectOrigin::tool_generated("tool_2");
        let ctx = Rc::new(CapabilityContext::new(store.clone(), origin));
        let err = tool.invoke(ctx, &json!({})).unwrap_err();

        assert!(matches!(err, ScriptError::Invocation(ref m) if m.contains("halfway")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn tool_returning_nothing_yields_null() {
        let tool = compiler()
            .compile_tool("function executeTool(context, parameters) end", None)
            .unwrap();
        let ctx = Rc::new(CapabilityContext::new(ObjectStore::new(), ObjectOrigin::manual()));
        assert_eq!(tool.invoke(ctx, &json!(null)).unwrap(), serde_json::Value::Null);
    }
}
