use std::collections::VecDeque;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use sceneforge_core::{
    CanvasObject, CapabilityContext, GenerationGateway, GenerationKind, GenerationOutcome,
    GenerationRequest, ObjectId, ObjectKind, ObjectOrigin, ObjectStore, Properties, PropertyValue,
    SceneError,
};
use sceneforge_renderer::{FrameDriver, FrameReport, RenderSink, ENTRY_POINT_PROPERTY};
use sceneforge_script::{BehaviorCompiler, ScriptLimits};
use sceneforge_tools::{tool_prompt, ToolRegistry};

use crate::events::{Completion, PendingJob, RequestId, StudioEvent, UiPanel};
use crate::placement::{random_color, random_index, spawn_position};

// ---------------------------------------------------------------------------
// Options & stats
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudioOptions {
    /// Frames per second for `run_frames`.
    pub tick_hz: u32,
    /// Side of the cube new objects are placed in, centred on the origin.
    pub spawn_extent: f64,
    pub limits: ScriptLimits,
    /// Events kept between `drain_events` calls; the oldest go first.
    pub event_capacity: usize,
}

impl Default for StudioOptions {
    fn default() -> Self {
        Self {
            tick_hz: 60,
            spawn_extent: 20.0,
            limits: ScriptLimits::default(),
            event_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudioStats {
    pub objects: usize,
    pub synthesized: usize,
    pub tools: usize,
    pub pending: usize,
    pub ui_panels: usize,
    pub frame: u64,
}

// ---------------------------------------------------------------------------
// Studio
// ---------------------------------------------------------------------------

/// Owner of every SceneForge service for one session.
///
/// Single-threaded: the studio, its store and the compiler live on one
/// thread. Only generation requests leave it, as spawned tasks that report
/// back over a channel.
pub struct Studio {
    store: ObjectStore,
    compiler: BehaviorCompiler,
    tools: ToolRegistry,
    driver: FrameDriver,
    gateway: Arc<dyn GenerationGateway>,
    options: StudioOptions,
    selected: Option<ObjectId>,
    ui_panels: Vec<UiPanel>,
    events: VecDeque<StudioEvent>,
    dropped_events: u64,
    next_request: RequestId,
    pending: usize,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl Studio {
    pub fn new(
        gateway: Arc<dyn GenerationGateway>,
        options: StudioOptions,
    ) -> Result<Self, SceneError> {
        let compiler = BehaviorCompiler::new(options.limits)?;
        let store = ObjectStore::new();
        let (tx, rx) = mpsc::unbounded_channel();
        info!(
            gateway = gateway.name(),
            instruction_limit = options.limits.instruction_limit,
            "[Studio] Created"
        );
        Ok(Self {
            tools: ToolRegistry::new(compiler.clone()),
            driver: FrameDriver::new(store.clone(), compiler.clone()),
            store,
            compiler,
            gateway,
            options,
            selected: None,
            ui_panels: Vec::new(),
            events: VecDeque::new(),
            dropped_events: 0,
            next_request: 0,
            pending: 0,
            tx,
            rx,
        })
    }

    pub fn options(&self) -> &StudioOptions {
        &self.options
    }

    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Compiler shared by the tool registry and the frame driver; register
    /// host functions here.
    pub fn compiler(&self) -> &BehaviorCompiler {
        &self.compiler
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn driver(&self) -> &FrameDriver {
        &self.driver
    }

    pub fn objects(&self) -> Vec<CanvasObject> {
        self.store.list()
    }

    // -- manual insertion ---------------------------------------------------

    /// Insert a builtin object at a random spawn position.
    pub fn add_builtin(
        &mut self,
        kind: ObjectKind,
        properties: Properties,
    ) -> Result<ObjectId, SceneError> {
        if !kind.is_builtin() {
            return Err(SceneError::InvalidRecord(format!("{kind} is not a builtin kind")));
        }
        let mut object = CanvasObject::builtin(
            ObjectId::generate("obj"),
            kind,
            spawn_position(self.options.spawn_extent),
        );
        object.properties = properties;
        let id = object.id.clone();
        self.store.insert(object)?;
        info!(object_id = %id, kind = %kind, "[Studio] Added builtin object");
        self.push_event(StudioEvent::ObjectAdded {
            object_id: id.clone(),
            kind: kind.as_str().to_string(),
        });
        Ok(id)
    }

    /// Cube, sphere or text with a random color.
    pub fn add_random_builtin(&mut self) -> Result<ObjectId, SceneError> {
        const KINDS: [ObjectKind; 3] = [ObjectKind::Cube, ObjectKind::Sphere, ObjectKind::Text];
        let kind = KINDS[random_index(KINDS.len())];
        let mut properties = Properties::new();
        properties.insert("color".into(), PropertyValue::Text(random_color()));
        self.add_builtin(kind, properties)
    }

    // -- generation requests ------------------------------------------------

    /// Ask the gateway for a new synthesized object. The object appears on a
    /// later tick, or a `GenerationFailed` event does.
    pub fn request_object(&mut self, prompt: &str) -> Result<RequestId, SceneError> {
        let request = GenerationRequest::new(GenerationKind::Object, prompt);
        self.dispatch(
            PendingJob::Object {
                prompt: prompt.to_string(),
            },
            request,
        )
    }

    pub fn request_tool(&mut self, name: &str, description: &str) -> Result<RequestId, SceneError> {
        let request = GenerationRequest::tool(tool_prompt(name, description));
        self.dispatch(
            PendingJob::Tool {
                name: name.to_string(),
                description: description.to_string(),
            },
            request,
        )
    }

    /// Ask for a revision of a synthesized object's source. The revised text
    /// replaces the source atomically and the object remounts.
    pub fn request_revision(
        &mut self,
        object_id: &ObjectId,
        instruction: &str,
    ) -> Result<RequestId, SceneError> {
        let object = self
            .store
            .get(object_id)
            .ok_or_else(|| SceneError::NotFound(object_id.to_string()))?;
        let Some(source) = object.source.filter(|_| object.kind == ObjectKind::Synthesized) else {
            return Err(SceneError::InvalidRecord(format!(
                "{object_id} has no behavior source to revise"
            )));
        };
        let request =
            GenerationRequest::new(GenerationKind::Code, instruction).with_current_source(source);
        self.dispatch(
            PendingJob::Revision {
                object_id: object_id.clone(),
            },
            request,
        )
    }

    pub fn request_ui(&mut self, description: &str) -> Result<RequestId, SceneError> {
        let request = GenerationRequest::new(GenerationKind::Ui, description);
        self.dispatch(
            PendingJob::Ui {
                description: description.to_string(),
            },
            request,
        )
    }

    pub fn request_self_review(&mut self) -> Result<RequestId, SceneError> {
        let summary = format!(
            "Review this scene runtime. It holds {} objects and {} tools.",
            self.store.len(),
            self.tools.len()
        );
        let request = GenerationRequest::new(GenerationKind::SelfModify, summary);
        self.dispatch(PendingJob::SelfReview, request)
    }

    fn dispatch(
        &mut self,
        job: PendingJob,
        request: GenerationRequest,
    ) -> Result<RequestId, SceneError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            SceneError::Other(anyhow::anyhow!("generation requests need a running tokio runtime"))
        })?;

        self.next_request += 1;
        let id = self.next_request;
        let gateway = Arc::clone(&self.gateway);
        let tx = self.tx.clone();
        debug!(request = id, kind = %request.kind, "[Studio] Dispatching generation");

        runtime.spawn(async move {
            // Inner task so a panicking gateway still produces a completion.
            let generation = tokio::spawn(async move { gateway.generate(&request).await });
            let result = match generation.await {
                Ok(Ok(outcome)) => Ok(outcome),
                Ok(Err(e)) => Err(format!("{e:#}")),
                Err(e) => Err(format!("generation task failed: {e}")),
            };
            if tx.send(Completion { request: id, job, result }).is_err() {
                debug!(request = id, "Studio dropped before generation finished");
            }
        });

        self.pending += 1;
        Ok(id)
    }

    // -- completions --------------------------------------------------------

    /// Apply every outcome that has already arrived. Returns how many.
    pub fn poll_completions(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    /// Wait until every outstanding request has been applied.
    pub async fn settle(&mut self) {
        while self.pending > 0 {
            match self.rx.recv().await {
                Some(completion) => self.apply(completion),
                None => break,
            }
        }
    }

    fn apply(&mut self, completion: Completion) {
        self.pending = self.pending.saturating_sub(1);
        let Completion { request, job, result } = completion;
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(reason) => return self.fail(request, job.kind(), reason),
        };

        match job {
            PendingJob::Object { prompt } => self.apply_object(request, prompt, &outcome),
            PendingJob::Tool { name, description } => {
                match self.tools.register_generated(&name, &description, &outcome) {
                    Ok(tool) => self.push_event(StudioEvent::ToolCreated {
                        request,
                        tool_id: tool.id,
                        name: tool.name,
                    }),
                    Err(e) => self.fail(request, GenerationKind::Object, e.to_string()),
                }
            }
            PendingJob::Revision { object_id } => self.apply_revision(request, object_id, &outcome),
            PendingJob::Ui { description } => match outcome.usable_source() {
                Some(content) => {
                    self.ui_panels.push(UiPanel {
                        description,
                        content: content.to_string(),
                        metadata: outcome.metadata.clone(),
                    });
                    self.push_event(StudioEvent::UiGenerated {
                        request,
                        index: self.ui_panels.len() - 1,
                    });
                }
                None => self.fail(request, GenerationKind::Ui, outcome.failure_reason()),
            },
            PendingJob::SelfReview => self.apply_self_review(request, &outcome),
        }
    }

    fn apply_object(&mut self, request: RequestId, prompt: String, outcome: &GenerationOutcome) {
        let Some(source) = outcome.usable_source() else {
            return self.fail(request, GenerationKind::Object, outcome.failure_reason());
        };

        let mut tags = outcome.feature_tags();
        if let Some(kind_tag) = outcome.metadata_str("type") {
            tags.push(kind_tag.to_string());
        }
        let mut object = CanvasObject::synthesized(
            ObjectId::generate("obj"),
            spawn_position(self.options.spawn_extent),
            source,
        )
        .with_origin(ObjectOrigin::synthesized(prompt.clone()).with_tags(tags));
        if let Some(entry) = outcome.entry_point_hint() {
            object = object.with_property(ENTRY_POINT_PROPERTY, entry);
        }

        let object_id = object.id.clone();
        if let Err(e) = self.store.insert(object.clone()) {
            return self.fail(request, GenerationKind::Object, e.to_string());
        }
        info!(object_id = %object_id, prompt = %prompt, "[Studio] Synthesized object");
        self.push_event(StudioEvent::ObjectSynthesized {
            request,
            object_id,
            prompt,
        });
        self.prime(&object);
    }

    fn apply_revision(
        &mut self,
        request: RequestId,
        object_id: ObjectId,
        outcome: &GenerationOutcome,
    ) {
        let Some(source) = outcome.usable_source() else {
            return self.fail(request, GenerationKind::Code, outcome.failure_reason());
        };
        let Some(mut object) = self.store.get(&object_id) else {
            return self.fail(
                request,
                GenerationKind::Code,
                format!("object {object_id} was deleted before its revision arrived"),
            );
        };

        object.source = Some(source.to_string());
        match outcome.entry_point_hint() {
            Some(entry) => {
                object
                    .properties
                    .insert(ENTRY_POINT_PROPERTY.to_string(), PropertyValue::from(entry));
            }
            None => {
                object.properties.remove(ENTRY_POINT_PROPERTY);
            }
        }

        if let Err(e) = self.store.replace(object.clone()) {
            return self.fail(request, GenerationKind::Code, e.to_string());
        }
        info!(object_id = %object_id, "[Studio] Revised object source");
        self.push_event(StudioEvent::ObjectRevised { request, object_id });
        self.prime(&object);
    }

    fn apply_self_review(&mut self, request: RequestId, outcome: &GenerationOutcome) {
        if !outcome.success {
            return self.fail(request, GenerationKind::SelfModify, outcome.failure_reason());
        }
        let metadata = outcome.metadata.as_ref();
        let mut improvements: Vec<String> = metadata
            .and_then(|m| m.get("improvements"))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        if improvements.is_empty() {
            improvements = outcome
                .source
                .as_deref()
                .unwrap_or_default()
                .lines()
                .filter_map(|line| line.trim().strip_prefix("- "))
                .map(str::to_string)
                .collect();
        }
        let confidence = metadata.and_then(|m| m.get("confidence")).and_then(Value::as_f64);
        info!(count = improvements.len(), "[Studio] Self review received");
        self.push_event(StudioEvent::SelfReviewed {
            request,
            improvements,
            confidence,
        });
    }

    fn prime(&mut self, object: &CanvasObject) {
        if let Err(fault) = self.driver.prime(object) {
            warn!(
                object_id = %fault.object_id,
                reason = %fault.reason,
                "[Studio] Behavior will render as placeholder"
            );
            self.push_event(StudioEvent::Fault {
                object_id: fault.object_id,
                kind: fault.kind,
                reason: fault.reason,
            });
        }
    }

    fn fail(&mut self, request: RequestId, kind: GenerationKind, reason: String) {
        warn!(request, kind = %kind, reason = %reason, "[Studio] Generation failed");
        self.push_event(StudioEvent::GenerationFailed { request, kind, reason });
    }

    // -- tools & objects ----------------------------------------------------

    /// Run a tool against the live scene.
    pub fn execute_tool(&mut self, tool_id: &str, parameters: &Value) -> Result<Value, SceneError> {
        let origin = ObjectOrigin::tool_generated(tool_id);
        let context = CapabilityContext::new(self.store.clone(), origin);
        let result = self.tools.execute_tool(tool_id, context, parameters);
        self.reconcile_selection();
        match result {
            Ok(value) => {
                self.push_event(StudioEvent::ToolExecuted {
                    tool_id: tool_id.to_string(),
                    success: true,
                    detail: None,
                });
                Ok(value)
            }
            Err(e) => {
                self.push_event(StudioEvent::ToolExecuted {
                    tool_id: tool_id.to_string(),
                    success: false,
                    detail: Some(e.to_string()),
                });
                Err(e.into())
            }
        }
    }

    pub fn delete_tool(&mut self, tool_id: &str) -> bool {
        self.tools.delete_tool(tool_id)
    }

    pub fn delete_object(&mut self, object_id: &ObjectId) -> Result<CanvasObject, SceneError> {
        let removed = self.store.remove(object_id)?;
        self.reconcile_selection();
        self.push_event(StudioEvent::ObjectDeleted {
            object_id: object_id.clone(),
        });
        Ok(removed)
    }

    // -- selection ----------------------------------------------------------

    pub fn select(&mut self, object_id: &ObjectId) -> Result<(), SceneError> {
        if !self.store.contains(object_id) {
            return Err(SceneError::NotFound(object_id.to_string()));
        }
        self.selected = Some(object_id.clone());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&ObjectId> {
        self.selected.as_ref()
    }

    fn reconcile_selection(&mut self) {
        if let Some(id) = &self.selected {
            if !self.store.contains(id) {
                debug!(object_id = %id, "Selected object is gone, clearing selection");
                self.selected = None;
            }
        }
    }

    // -- panels -------------------------------------------------------------

    pub fn ui_panels(&self) -> &[UiPanel] {
        &self.ui_panels
    }

    pub fn remove_ui_panel(&mut self, index: usize) -> Option<UiPanel> {
        (index < self.ui_panels.len()).then(|| self.ui_panels.remove(index))
    }

    // -- frame --------------------------------------------------------------

    /// Apply arrived outcomes, then render one frame.
    pub fn tick(&mut self, delta: f64, sink: &mut dyn RenderSink) -> FrameReport {
        self.poll_completions();
        let report = self.driver.tick(delta, sink);
        for fault in &report.faults {
            self.push_event(StudioEvent::Fault {
                object_id: fault.object_id.clone(),
                kind: fault.kind,
                reason: fault.reason.clone(),
            });
        }
        report
    }

    pub fn stats(&self) -> StudioStats {
        let objects = self.store.list();
        StudioStats {
            objects: objects.len(),
            synthesized: objects.iter().filter(|o| o.kind == ObjectKind::Synthesized).count(),
            tools: self.tools.len(),
            pending: self.pending,
            ui_panels: self.ui_panels.len(),
            frame: self.driver.frame(),
        }
    }

    /// Take every event recorded since the last call.
    pub fn drain_events(&mut self) -> Vec<StudioEvent> {
        if self.dropped_events > 0 {
            warn!(dropped = self.dropped_events, "[Studio] Events dropped before drain");
            self.dropped_events = 0;
        }
        self.events.drain(..).collect()
    }

    fn push_event(&mut self, event: StudioEvent) {
        if self.events.len() >= self.options.event_capacity.max(1) {
            self.events.pop_front();
            self.dropped_events += 1;
        }
        self.events.push_back(event);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
