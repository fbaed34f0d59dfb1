use sceneforge_core::{GenerationKind, GenerationRequest};

// ---------------------------------------------------------------------------
// System prompts
// ---------------------------------------------------------------------------

const OBJECT_PROMPT: &str = r##"You write scene behaviors in Lua 5.4 for a real-time 3D canvas.

Declare one zero-argument factory function and return a mesh table from it:

  -- entry: Spinner
  -- features: rotation, glow
  function Spinner()
    local mesh = { shape = "box", color = "#44aaff", size = 1 }
    useFrame(function(m, elapsed, delta)
      m.rotation.y = m.rotation.y + delta
    end)
    return mesh
  end

Mesh fields:
- shape: "box", "sphere", "cylinder", "cone", "torus", "plane" or "text"
- size (number), color ("#rrggbb"), metalness, roughness, emissive, opacity
- text (for shape "text")
- position and rotation as {x=..., y=..., z=...}, scale as a number or vector

Per-frame animation: call useFrame(fn) inside the factory, or set mesh.animate.
Callbacks receive (mesh, elapsedSeconds, deltaSeconds) and mutate the mesh.
Only math, string and table are available. There is no io, os, require or load.
Start the code with "-- entry: Name" and "-- features: tag, tag".
Return only Lua code in a single ```lua block."##;

const TOOL_PROMPT: &str = r##"You write reusable scene tools in Lua 5.4 for a real-time 3D canvas.

Declare exactly one function, executeTool(context, parameters), and return a
table describing what happened:

  function executeTool(context, parameters)
    local id, err = context.addObject({
      kind = "sphere",
      position = { x = 0, y = 2, z = 0 },
      color = "#ffcc00",
    })
    if not id then error(err) end
    return { success = true, created = { id } }
  end

context.objects is a read-only array of { id, kind, position, properties }.
context.addObject(record), context.updateObject(id, patch) and
context.deleteObject(id) change the live scene immediately.
Records use kind "cube", "sphere" or "text", position {x, y, z} and color "#rrggbb".
parameters is a table, possibly empty.
Only math, string and table are available. There is no io, os, require or load.
Do not declare a factory or call useFrame.
Return only Lua code in a single ```lua block."##;

const CODE_PROMPT: &str = r##"You revise Lua 5.4 scene behaviors for a real-time 3D canvas.

You receive the current source and an instruction. Return the complete revised
source, keeping the same factory contract: a zero-argument function returning a
mesh table, with optional useFrame(fn) callbacks receiving
(mesh, elapsedSeconds, deltaSeconds). Keep or update the "-- entry: Name" line.
Return only Lua code in a single ```lua block."##;

const UI_PROMPT: &str = r##"You describe small control panels for a 3D scene editor.

Return a short plain-text panel layout: a title line followed by one line per
control ("label: control-type"). Do not include code fences."##;

const SELF_MODIFY_PROMPT: &str = r##"You review a runtime that renders AI-generated 3D objects
from Lua behaviors.

List concrete improvements, one per line, prefixed with "- ". Cover rendering
performance, new object types, the user interface and generation quality."##;

/// System prompt for a request. Object-kind requests for tools get the tool
/// contract instead of the factory contract.
pub fn system_prompt(request: &GenerationRequest) -> &'static str {
    match request.kind {
        GenerationKind::Object if request.is_tool() => TOOL_PROMPT,
        GenerationKind::Object => OBJECT_PROMPT,
        GenerationKind::Code => CODE_PROMPT,
        GenerationKind::Ui => UI_PROMPT,
        GenerationKind::SelfModify => SELF_MODIFY_PROMPT,
    }
}

/// User prompt for a request. Revisions carry the current source inline.
pub fn user_prompt(request: &GenerationRequest) -> String {
    match (&request.kind, request.current_source.as_deref()) {
        (GenerationKind::Code, Some(source)) => format!(
            "Instruction: {}\n\nCurrent source:\n```lua\n{}\n```",
            request.prompt.trim(),
            source.trim_end()
        ),
        _ => request.prompt.trim().to_string(),
    }
}
