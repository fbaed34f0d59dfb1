//! The interpreter boundary.
//!
//! One `Lua` state per compiler, opened with only the `math`, `string` and
//! `table` libraries. Every chunk runs against a fresh whitelist-only
//! environment table, so `os`, `io`, `debug`, `load`, `require` and friends
//! are unreachable from behavior code. Each guarded call installs an
//! instruction-count hook; the VM as a whole runs under a memory limit.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mlua::{Function, HookTriggers, Lua, LuaOptions, StdLib, Table, Value};
use tracing::{info, warn};

use crate::error::{format_lua_error, ScriptError};

/// Default instruction budget per invocation.
pub const DEFAULT_INSTRUCTION_LIMIT: u32 = 1_000_000;

/// Default VM memory ceiling (64 MiB).
pub const DEFAULT_MEMORY_LIMIT_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptLimits {
    pub instruction_limit: u32,
    /// Zero leaves the VM unbounded.
    pub memory_limit_bytes: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            instruction_limit: DEFAULT_INSTRUCTION_LIMIT,
            memory_limit_bytes: DEFAULT_MEMORY_LIMIT_BYTES,
        }
    }
}

const SAFE_GLOBALS: &[&str] = &[
    "tostring",
    "tonumber",
    "type",
    "pairs",
    "ipairs",
    "next",
    "select",
    "error",
    "assert",
    "rawget",
    "rawset",
    "rawlen",
    "rawequal",
    "setmetatable",
    "getmetatable",
];

const SAFE_LIBS: &[&str] = &["math", "string", "table"];

struct SandboxInner {
    lua: Lua,
    limits: ScriptLimits,
    depth: Cell<usize>,
    host_functions: RefCell<Vec<(String, Function)>>,
}

/// Shared handle to the interpreter. Cloning is cheap.
#[derive(Clone)]
pub struct Sandbox {
    inner: Rc<SandboxInner>,
}

impl Sandbox {
    pub fn new(limits: ScriptLimits) -> Result<Self, ScriptError> {
        let libs = StdLib::MATH | StdLib::STRING | StdLib::TABLE;
        let lua = Lua::new_with(libs, LuaOptions::default())
            .map_err(|e| ScriptError::Setup(format_lua_error(&e)))?;
        if limits.memory_limit_bytes > 0 {
            lua.set_memory_limit(limits.memory_limit_bytes)
                .map_err(|e| ScriptError::Setup(format_lua_error(&e)))?;
        }
        Ok(Self {
            inner: Rc::new(SandboxInner {
                lua,
                limits,
                depth: Cell::new(0),
                host_functions: RefCell::new(Vec::new()),
            }),
        })
    }

    pub fn lua(&self) -> &Lua {
        &self.inner.lua
    }

    pub fn limits(&self) -> ScriptLimits {
        self.inner.limits
    }

    /// Expose a host function to every environment built after this call.
    pub fn register_host_function(&self, name: &str, func: Function) {
        let mut hosts = self.inner.host_functions.borrow_mut();
        hosts.retain(|(n, _)| n != name);
        hosts.push((name.to_string(), func));
    }

    /// Build a fresh whitelist-only environment. `label` tags captured
    /// `print` output in the logs.
    pub fn environment(&self, label: &str) -> mlua::Result<Table> {
        let lua = &self.inner.lua;
        let env = lua.create_table()?;
        let globals = lua.globals();

        for name in SAFE_GLOBALS.iter().chain(SAFE_LIBS) {
            let value = globals.get::<Value>(*name)?;
            if !value.is_nil() {
                env.set(*name, value)?;
            }
        }
        if let Ok(table) = globals.get::<Table>("table") {
            env.set("unpack", table.get::<Value>("unpack")?)?;
        }

        let behavior = label.to_string();
        let print = lua.create_function(move |_, args: mlua::MultiValue| {
            let line = args
                .iter()
                .map(display_value)
                .collect::<Vec<_>>()
                .join("\t");
            info!(target: "sceneforge::behavior", behavior = %behavior, "{}", line);
            Ok(())
        })?;
        env.set("print", print)?;

        for (name, func) in self.inner.host_functions.borrow().iter() {
            env.set(name.as_str(), func.clone())?;
        }

        Ok(env)
    }

    /// Run `f` under the instruction budget. Nested calls share the
    /// outermost budget.
    pub fn guarded<R>(&self, f: impl FnOnce() -> mlua::Result<R>) -> mlua::Result<R> {
        let inner = &self.inner;
        let depth = inner.depth.get();
        if depth == 0 {
            let limit = inner.limits.instruction_limit.max(1);
            inner.lua.set_hook(
                HookTriggers::new().every_nth_instruction(limit),
                move |_lua, _debug| {
                    Err(mlua::Error::RuntimeError(format!(
                        "instruction limit exceeded ({limit})"
                    )))
                },
            );
        }
        inner.depth.set(depth + 1);
        let result = f();
        inner.depth.set(depth);
        if depth == 0 {
            inner.lua.remove_hook();
        }
        if let Err(e) = &result {
            if matches!(e, mlua::Error::MemoryError(_)) {
                warn!(used = inner.lua.used_memory(), "Behavior hit the memory ceiling");
            }
        }
        result
    }
}

pub(crate) fn display_value(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s
            .to_str()
            .map_or_else(|_| "<invalid utf8>".into(), |s| s.to_string()),
        other => format!("{}: {:p}", other.type_name(), other.to_pointer()),
    }
}
