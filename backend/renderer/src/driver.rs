//! Frame driver.
//!
//! Each tick walks a snapshot of the object registry in insertion order.
//! Builtins render as static shapes. Synthesized objects are compiled and
//! mounted once per distinct source text and cached by id and insert epoch,
//! so a record deleted and inserted again starts from a fresh mount; their
//! per-tick callbacks run every frame. A failure in one object never stops the pass:
//! compile or mount failures render the placeholder (and stay cached until
//! the source changes), callback failures skip that object for one frame.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::Serialize;
use sceneforge_core::{CanvasObject, ObjectId, ObjectKind, ObjectStore};
use sceneforge_script::{BehaviorCompiler, MountedFragment};
use tracing::{debug, info, warn};

use crate::primitives::{builtin_mesh, placeholder_mesh, world, DrawCommand, DrawSource};
use crate::sink::RenderSink;

/// Property holding the generator's entry-point hint for an object.
pub const ENTRY_POINT_PROPERTY: &str = "entryPoint";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    Compile,
    Mount,
    Callback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    pub object_id: ObjectId,
    pub kind: FaultKind,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    pub drawn: usize,
    pub placeholders: usize,
    pub skipped: usize,
    /// New compile/mount failures and every callback failure this frame.
    pub faults: Vec<Fault>,
}

enum MountState {
    Ready(MountedFragment),
    Failed(FaultKind, String),
}

struct CachedMount {
    epoch: u64,
    source: String,
    state: MountState,
}

pub struct FrameDriver {
    store: ObjectStore,
    compiler: BehaviorCompiler,
    mounts: HashMap<ObjectId, CachedMount>,
    frame: u64,
    elapsed: f64,
}

impl FrameDriver {
    pub fn new(store: ObjectStore, compiler: BehaviorCompiler) -> Self {
        Self {
            store,
            compiler,
            mounts: HashMap::new(),
            frame: 0,
            elapsed: 0.0,
        }
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Number of cached mounts (including cached failures).
    pub fn mounted(&self) -> usize {
        self.mounts.len()
    }

    /// Total per-tick callbacks currently registered.
    pub fn callback_count(&self) -> usize {
        self.mounts
            .values()
            .map(|m| match &m.state {
                MountState::Ready(fragment) => fragment.callback_count(),
                MountState::Failed(..) => 0,
            })
            .sum()
    }

    /// Compile and mount `object` ahead of its first frame, so callers can
    /// report failures as soon as the source arrives. A failure reported
    /// here is cached and will not show up again in a `FrameReport`.
    pub fn prime(&mut self, object: &CanvasObject) -> Result<(), Fault> {
        if object.kind != ObjectKind::Synthesized {
            return Ok(());
        }
        let epoch = self.store.epoch(&object.id).unwrap_or_default();
        match &self.ensure_mounted(object, epoch).state {
            MountState::Ready(_) => Ok(()),
            MountState::Failed(kind, reason) => Err(Fault {
                object_id: object.id.clone(),
                kind: *kind,
                reason: reason.clone(),
            }),
        }
    }

    /// Render one frame.
    pub fn tick(&mut self, delta: f64, sink: &mut dyn RenderSink) -> FrameReport {
        let delta = if delta.is_finite() && delta > 0.0 { delta } else { 0.0 };
        self.frame += 1;
        self.elapsed += delta;

        let entries = self.store.entries();
        self.release_stale(&entries);

        let mut report = FrameReport {
            frame: self.frame,
            ..FrameReport::default()
        };
        sink.begin_frame(self.frame, self.elapsed);

        for (epoch, object) in &entries {
            match object.kind {
                ObjectKind::Cube | ObjectKind::Sphere | ObjectKind::Text => {
                    if let Some(mesh) = builtin_mesh(object) {
                        sink.draw(DrawCommand {
                            object_id: object.id.clone(),
                            source: DrawSource::Builtin,
                            mesh,
                        });
                        report.drawn += 1;
                    }
                }
                ObjectKind::Synthesized => {
                    self.render_synthesized(object, *epoch, delta, sink, &mut report)
                }
            }
        }

        sink.end_frame();
        report
    }

    fn render_synthesized(
        &mut self,
        object: &CanvasObject,
        epoch: u64,
        delta: f64,
        sink: &mut dyn RenderSink,
        report: &mut FrameReport,
    ) {
        let fresh = self.mounts.get(&object.id).map_or(true, |m| {
            m.epoch != epoch || m.source != object.source.as_deref().unwrap_or_default()
        });
        let elapsed = self.elapsed;
        let cached = self.ensure_mounted(object, epoch);

        match &mut cached.state {
            MountState::Failed(kind, reason) => {
                if fresh {
                    report.faults.push(Fault {
                        object_id: object.id.clone(),
                        kind: *kind,
                        reason: reason.clone(),
                    });
                }
                sink.draw(DrawCommand {
                    object_id: object.id.clone(),
                    source: DrawSource::Placeholder,
                    mesh: placeholder_mesh(object.position),
                });
                report.placeholders += 1;
                report.drawn += 1;
            }
            MountState::Ready(fragment) => match fragment.tick(elapsed, delta) {
                Ok(spec) => {
                    let mut mesh = spec.clone();
                    mesh.position = world(object.position).add(spec.position);
                    sink.draw(DrawCommand {
                        object_id: object.id.clone(),
                        source: DrawSource::Synthesized,
                        mesh,
                    });
                    report.drawn += 1;
                }
                Err(e) => {
                    debug!(object_id = %object.id, error = %e, "Skipping object this frame");
                    report.faults.push(Fault {
                        object_id: object.id.clone(),
                        kind: FaultKind::Callback,
                        reason: e.to_string(),
                    });
                    report.skipped += 1;
                }
            },
        }
    }

    /// Return the cache entry for `object`, compiling and mounting if the
    /// record or its source is new.
    fn ensure_mounted(&mut self, object: &CanvasObject, epoch: u64) -> &mut CachedMount {
        let source = object.source.clone().unwrap_or_default();
        match self.mounts.entry(object.id.clone()) {
            Entry::Occupied(entry)
                if entry.get().epoch == epoch && entry.get().source == source =>
            {
                entry.into_mut()
            }
            Entry::Occupied(mut entry) => {
                if entry.get().epoch == epoch {
                    info!(object_id = %object.id, "Source changed, remounting");
                } else {
                    info!(object_id = %object.id, epoch, "Record re-inserted, remounting");
                }
                let state = mount(&self.compiler, object, &source);
                entry.insert(CachedMount { epoch, source, state });
                entry.into_mut()
            }
            Entry::Vacant(entry) => {
                let state = mount(&self.compiler, object, &source);
                entry.insert(CachedMount { epoch, source, state })
            }
        }
    }

    /// Drop mounts (and with them their callbacks) for records no longer
    /// live or no longer synthesized, including mounts left behind by an
    /// earlier record with the same id.
    fn release_stale(&mut self, entries: &[(u64, CanvasObject)]) {
        let live: HashMap<&ObjectId, u64> = entries
            .iter()
            .filter(|(_, o)| o.kind == ObjectKind::Synthesized)
            .map(|(epoch, o)| (&o.id, *epoch))
            .collect();
        self.mounts.retain(|id, cached| {
            let keep = live.get(id) == Some(&cached.epoch);
            if !keep {
                debug!(object_id = %id, "Released mount");
            }
            keep
        });
    }
}

fn mount(compiler: &BehaviorCompiler, object: &CanvasObject, source: &str) -> MountState {
    let hint = object
        .property(ENTRY_POINT_PROPERTY)
        .and_then(|p| p.as_str());
    let behavior = match compiler.compile_object(source, hint) {
        Ok(b) => b,
        Err(e) => {
            warn!(
                object_id = %object.id,
                error = %e,
                "Behavior failed to compile, using placeholder"
            );
            return MountState::Failed(FaultKind::Compile, e.to_string());
        }
    };
    match behavior.mount() {
        Ok(fragment) => {
            debug!(
                object_id = %object.id,
                entry_point = behavior.name(),
                callbacks = fragment.callback_count(),
                "Behavior mounted"
            );
            MountState::Ready(fragment)
        }
        Err(e) => {
            warn!(
                object_id = %object.id,
                error = %e,
                "Behavior failed to mount, using placeholder"
            );
            MountState::Failed(FaultKind::Mount, e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::PLACEHOLDER_COLOR;
    use crate::sink::FrameRecorder;
    use sceneforge_core::{ObjectPatch, Position};
    use sceneforge_script::ScriptLimits;
    use std::cell::Cell;
    use std::rc::Rc;

    const SPINNER: &str = r##"
function Spinner()
  local mesh = { shape = "box", color = "#00ff00", position = { y = 1 } }
  useFrame(function(m, elapsed, delta)
    tick()
    m.rotation.y = m.rotation.y + delta
  end)
  return mesh
end
"##;

    fn setup() -> (ObjectStore, FrameDriver, Rc<Cell<u32>>) {
        let compiler = BehaviorCompiler::new(ScriptLimits {
            instruction_limit: 100_000,
            ..ScriptLimits::default()
        })
        .unwrap();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        compiler
            .register_host_function("tick", move |_, ()| {
                counter.set(counter.get() + 1);
                Ok(())
            })
            .unwrap();
        let store = ObjectStore::new();
        let driver = FrameDriver::new(store.clone(), compiler);
        (store, driver, calls)
    }

    fn synthesized(id: &str, source: &str) -> CanvasObject {
        CanvasObject::synthesized(id, Position::new(2.0, 0.0, 0.0).unwrap(), source)
    }

    #[test]
    fn renders_builtins_and_synthesized_in_insertion_order() {
        let (store, mut driver, _) = setup();
        store
            .insert(CanvasObject::builtin("c", ObjectKind::Cube, Position::ORIGIN))
            .unwrap();
        store.insert(synthesized("s", SPINNER)).unwrap();
        store
            .insert(CanvasObject::builtin("t", ObjectKind::Text, Position::ORIGIN))
            .unwrap();

        let mut sink = FrameRecorder::new();
        let report = driver.tick(0.016, &mut sink);
        assert_eq!(report.drawn, 3);
        assert!(report.faults.is_empty());

        let frame = sink.last().unwrap();
        let ids: Vec<_> = frame.commands.iter().map(|c| c.object_id.to_string()).collect();
        assert_eq!(ids, vec!["c", "s", "t"]);
        let spinner = &frame.commands[1];
        assert_eq!(spinner.source, DrawSource::Synthesized);
        assert_eq!(spinner.mesh.position.x, 2.0);
        assert_eq!(spinner.mesh.position.y, 1.0);
    }

    #[test]
    fn deleting_an_object_stops_its_callbacks() {
        let (store, mut driver, calls) = setup();
        store.insert(synthesized("s", SPINNER)).unwrap();
        let mut sink = FrameRecorder::new();

        driver.tick(0.016, &mut sink);
        driver.tick(0.016, &mut sink);
        assert_eq!(calls.get(), 2);
        assert_eq!(driver.callback_count(), 1);

        store.remove(&ObjectId::from("s")).unwrap();
        driver.tick(0.016, &mut sink);
        driver.tick(0.016, &mut sink);
        assert_eq!(calls.get(), 2);
        assert_eq!(driver.mounted(), 0);
        assert_eq!(driver.callback_count(), 0);
    }

    #[test]
    fn reinserted_record_starts_from_a_fresh_mount() {
        let (store, mut driver, calls) = setup();
        let id = ObjectId::from("x");
        store.insert(synthesized("x", SPINNER)).unwrap();
        let mut sink = FrameRecorder::new();
        for _ in 0..3 {
            driver.tick(1.0, &mut sink);
        }
        assert_eq!(sink.last().unwrap().commands[0].mesh.rotation.y, 3.0);

        store.remove(&id).unwrap();
        store.insert(synthesized("x", SPINNER)).unwrap();
        driver.tick(1.0, &mut sink);

        assert_eq!(sink.last().unwrap().commands[0].mesh.rotation.y, 1.0);
        assert_eq!(calls.get(), 4);
        assert_eq!(driver.mounted(), 1);
        assert_eq!(driver.callback_count(), 1);
    }

    #[test]
    fn compile_failure_renders_placeholder_once_reported() {
        let (store, mut driver, _) = setup();
        store.insert(synthesized("bad", "no code here at all")).unwrap();
        store
            .insert(CanvasObject::builtin("ok", ObjectKind::Sphere, Position::ORIGIN))
            .unwrap();
        let mut sink = FrameRecorder::new();

        let first = driver.tick(0.016, &mut sink);
        assert_eq!(first.placeholders, 1);
        assert_eq!(first.drawn, 2);
        assert_eq!(first.faults.len(), 1);
        assert_eq!(first.faults[0].kind, FaultKind::Compile);

        let second = driver.tick(0.016, &mut sink);
        assert_eq!(second.placeholders, 1);
        assert!(second.faults.is_empty());

        let placeholder = &sink.last().unwrap().commands[0];
        assert_eq!(placeholder.source, DrawSource::Placeholder);
        assert_eq!(placeholder.mesh.color, PLACEHOLDER_COLOR);
        assert_eq!(placeholder.mesh.position.x, 2.0);
    }

    #[test]
    fn runaway_callback_skips_only_that_object() {
        let (store, mut driver, _) = setup();
        store
            .insert(synthesized(
                "loop",
                "function A() useFrame(function() while true do end end) return {} end",
            ))
            .unwrap();
        store
            .insert(CanvasObject::builtin("c", ObjectKind::Cube, Position::ORIGIN))
            .unwrap();
        let mut sink = FrameRecorder::new();

        for _ in 0..2 {
            let report = driver.tick(0.016, &mut sink);
            assert_eq!(report.skipped, 1);
            assert_eq!(report.drawn, 1);
            assert_eq!(report.faults[0].kind, FaultKind::Callback);
        }
        assert_eq!(sink.frames().len(), 2);
    }

    #[test]
    fn source_change_remounts() {
        let (store, mut driver, _) = setup();
        store.insert(synthesized("s", SPINNER)).unwrap();
        let mut sink = FrameRecorder::new();
        driver.tick(0.016, &mut sink);
        assert_eq!(sink.last().unwrap().commands[0].mesh.color, "#00ff00");

        let patch = ObjectPatch {
            source: Some(
                "function Red() return { shape = 'sphere', color = '#ff0000' } end".into(),
            ),
            ..ObjectPatch::default()
        };
        store.update(&ObjectId::from("s"), &patch).unwrap();
        driver.tick(0.016, &mut sink);

        let mesh = &sink.last().unwrap().commands[0].mesh;
        assert_eq!(mesh.color, "#ff0000");
        assert_eq!(driver.callback_count(), 0);
    }

    #[test]
    fn prime_reports_failures_early() {
        let (_, mut driver, _) = setup();
        assert!(driver.prime(&synthesized("good", SPINNER)).is_ok());
        let fault = driver
            .prime(&synthesized("bad", "function A() return 5 end"))
            .unwrap_err();
        assert_eq!(fault.kind, FaultKind::Mount);
        assert_eq!(fault.object_id, ObjectId::new("bad"));
        assert_eq!(driver.mounted(), 2);
    }
}
