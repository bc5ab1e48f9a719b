//! Create-camera-source dialog
//!
//! [`CreateCameraSourceDialog`] is the dialog without a widget toolkit: it owns
//! the camera list, dimension list, name field, rotation choice and the
//! test-and-create state machine, and exposes everything a frontend renders
//! through [`CreateCameraSourceDialog::view`]. Frontends forward user input to
//! the `select_*`, `set_*`, `press_action` and `cancel` methods.
//!
//! Hardware access never happens on the caller's thread of control: resolution
//! probes run on the [`ResolutionCache`] workers and the open-and-read test is
//! queued on the host's main-update hook. Selecting a camera returns at once;
//! finished resolution probes and test results are applied by
//! [`CreateCameraSourceDialog::process_pending`], so the dialog stays viewable
//! and cancellable while either is outstanding.

pub mod state;

pub use state::{DialogEvent, DialogState, Effect, Interactables, Presentation, Transition};

use crate::config::CamSourceConfig;
use crate::discovery::CameraEnumerator;
use crate::errors::CameraError;
use crate::host::Host;
use crate::platform::{lock_webcam, test_camera, SharedWebcam};
use crate::resolution_cache::{ProbeWait, ResolutionCache, UnusableCallback};
use crate::source::{create_source, resolve_camera_id, SourceRequest};
use crate::types::{Resolution, WebcamRotation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

pub const DIALOG_TITLE: &str = "Create camera source";

/// Stable identity of one enumerated camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraSlotId(Uuid);

impl CameraSlotId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

struct CameraSlot {
    webcam: SharedWebcam,
    name: String,
    index: u32,
    kind: crate::types::WebcamDriver,
    /// Cleared when the camera reports no resolutions
    supported: bool,
}

type SlotTable = HashMap<CameraSlotId, CameraSlot>;

/// One row of the camera combo box
#[derive(Debug, Clone)]
struct CameraEntry {
    label: String,
    slot: CameraSlotId,
}

/// A camera selection waiting for its resolutions
#[derive(Debug, Clone)]
struct PendingSelection {
    entry: CameraEntry,
    deadline: Instant,
}

#[derive(Debug, Clone, Copy)]
struct ProbeResult {
    generation: u64,
    success: bool,
}

/// How the dialog ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogOutcome {
    Pending,
    Created(SourceRequest),
    Cancelled,
}

/// Everything a frontend needs to render the dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogView {
    pub title: String,
    pub state: DialogState,
    pub cameras: Vec<String>,
    pub selected_camera: Option<usize>,
    pub dimensions: Vec<String>,
    pub selected_dimension: Option<usize>,
    pub rotation: WebcamRotation,
    pub name: String,
    pub status: String,
    pub action_label: String,
    pub interactables: Interactables,
    pub closed: bool,
    pub was_cancelled: bool,
}

/// Limit a camera name to `max_chars` visible characters, appending dots when cut
pub fn display_name(name: &str, max_chars: usize) -> String {
    let truncated: String = name.chars().take(max_chars).collect();
    let truncated = truncated.trim();
    if name.chars().count() > max_chars {
        format!("{}...", truncated)
    } else {
        truncated.to_string()
    }
}

pub struct CreateCameraSourceDialog {
    host: Host,
    cache: ResolutionCache,
    config: CamSourceConfig,
    using_index_discovery: bool,
    slots: Arc<Mutex<SlotTable>>,
    entries: Vec<CameraEntry>,
    selected_camera: Option<usize>,
    dimensions: Vec<Resolution>,
    selected_dimension: Option<usize>,
    rotation: WebcamRotation,
    name: String,
    state: DialogState,
    loading: bool,
    pending_selection: Option<PendingSelection>,
    closed: bool,
    was_cancelled: Arc<AtomicBool>,
    outcome: DialogOutcome,
    test_generation: u64,
    probe_tx: mpsc::UnboundedSender<ProbeResult>,
    probe_rx: mpsc::UnboundedReceiver<ProbeResult>,
}

impl CreateCameraSourceDialog {
    /// Enumerate cameras, fill the camera list and start resolution probes.
    ///
    /// No camera is selected yet; see [`CreateCameraSourceDialog::show`].
    pub fn open(
        host: Host,
        cache: ResolutionCache,
        config: CamSourceConfig,
        enumerator: &CameraEnumerator,
    ) -> Self {
        let enumeration = enumerator.enumerate();
        let suggested = format!(
            "{}-{}",
            config.dialog.source_name_prefix,
            host.registry.source_count() + 1
        );
        let (probe_tx, probe_rx) = mpsc::unbounded_channel();

        let mut dialog = Self {
            host,
            cache,
            config,
            using_index_discovery: enumeration.using_index_discovery,
            slots: Arc::new(Mutex::new(HashMap::new())),
            entries: Vec::new(),
            selected_camera: None,
            dimensions: Vec::new(),
            selected_dimension: None,
            rotation: WebcamRotation::default(),
            name: suggested,
            state: DialogState::Initial,
            loading: false,
            pending_selection: None,
            closed: false,
            was_cancelled: Arc::new(AtomicBool::new(false)),
            outcome: DialogOutcome::Pending,
            test_generation: 0,
            probe_tx,
            probe_rx,
        };

        if enumeration.is_empty() {
            log::info!("No cameras detected");
            dialog.apply(DialogEvent::NoCameras);
            return dialog;
        }

        log::info!(
            "Found {} cameras (index discovery: {})",
            enumeration.webcams.len(),
            enumeration.using_index_discovery
        );

        for webcam in enumeration.webcams {
            dialog.add_camera(webcam);
        }

        dialog
    }

    /// Open the dialog and select the first camera
    pub async fn show(
        host: Host,
        cache: ResolutionCache,
        config: CamSourceConfig,
        enumerator: &CameraEnumerator,
    ) -> Self {
        let mut dialog = Self::open(host, cache, config, enumerator);
        if !dialog.entries.is_empty() {
            match dialog.select_camera(0) {
                Ok(()) => {
                    dialog.wait_for_resolutions().await;
                }
                Err(e) => log::warn!("Failed to select first camera: {}", e),
            }
        }
        dialog
    }

    fn add_camera(&mut self, webcam: SharedWebcam) {
        let (name, index, kind) = match lock_webcam(&webcam) {
            Ok(w) => (w.name(), w.index(), w.kind()),
            Err(e) => {
                log::warn!("Skipping camera: {}", e);
                return;
            }
        };

        let label = display_name(&name, self.config.dialog.visible_name_chars);
        let id = CameraSlotId::new();
        self.lock_slots().insert(
            id,
            CameraSlot {
                webcam: webcam.clone(),
                name: name.clone(),
                index,
                kind,
                supported: true,
            },
        );

        if self.entries.iter().any(|entry| entry.label == label) {
            log::debug!("Camera {} shares the label {}, keeping the first", name, label);
            return;
        }

        log::debug!("Camera {}: {} ({})", index, name, kind.as_str());
        self.entries.push(CameraEntry {
            label: label.clone(),
            slot: id,
        });

        if !self.cache.is_cached(&label) {
            self.cache
                .schedule(&label, webcam, Some(self.unusable_callback(id)));
        }
    }

    fn unusable_callback(&self, id: CameraSlotId) -> UnusableCallback {
        let slots = self.slots.clone();
        Box::new(move || {
            if let Ok(mut slots) = slots.lock() {
                if let Some(slot) = slots.get_mut(&id) {
                    slot.supported = false;
                }
            }
        })
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, SlotTable> {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot_supported(&self, id: CameraSlotId) -> bool {
        self.lock_slots()
            .get(&id)
            .map(|slot| slot.supported)
            .unwrap_or(false)
    }

    fn mark_unsupported(&self, id: CameraSlotId) {
        if let Some(slot) = self.lock_slots().get_mut(&id) {
            slot.supported = false;
        }
    }

    fn ensure_open(&self) -> Result<(), CameraError> {
        if self.closed {
            return Err(CameraError::DialogClosed);
        }
        Ok(())
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn was_cancelled(&self) -> bool {
        self.was_cancelled.load(Ordering::SeqCst)
    }

    pub fn outcome(&self) -> &DialogOutcome {
        &self.outcome
    }

    pub fn using_index_discovery(&self) -> bool {
        self.using_index_discovery
    }

    pub fn camera_labels(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.label.clone()).collect()
    }

    pub fn dimensions(&self) -> &[Resolution] {
        &self.dimensions
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether a camera selection is still waiting for its resolutions
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    fn disabled(widget: &str) -> CameraError {
        CameraError::InvalidArgument(format!("The {} is disabled", widget))
    }

    /// Select the camera at `index` in the camera list.
    ///
    /// Returns without waiting. Cached resolutions are shown at once; otherwise the
    /// dimension list shows "Calculating..." until [`Self::process_pending`] or
    /// [`Self::wait_for_resolutions`] picks up the probe result.
    pub fn select_camera(&mut self, index: usize) -> Result<(), CameraError> {
        self.ensure_open()?;
        if !self.interactables().camera {
            return Err(Self::disabled("camera list"));
        }

        let entry = self.entries.get(index).cloned().ok_or_else(|| {
            CameraError::InvalidArgument(format!("No camera at position {}", index))
        })?;
        self.selected_camera = Some(index);
        self.dimensions.clear();
        self.selected_dimension = None;
        self.pending_selection = None;
        self.loading = false;

        let slot = {
            let slots = self.lock_slots();
            slots
                .get(&entry.slot)
                .filter(|slot| slot.supported)
                .map(|slot| (slot.webcam.clone(), slot.name.clone()))
        };

        let (webcam, camera_name) = match slot {
            Some(found) => found,
            None => {
                log::debug!("Selected camera {} is unavailable", entry.label);
                self.apply(DialogEvent::CameraUnsupported);
                return Ok(());
            }
        };

        self.name = self.host.registry.try_name(&camera_name);

        if let Some(list) = self.cache.get(&entry.label) {
            self.finish_selection(entry, ProbeWait::Ready(list));
            return Ok(());
        }

        if !self.cache.is_probing(&entry.label) {
            // the probe ran empty between the lookups above
            if !self.slot_supported(entry.slot) {
                self.apply(DialogEvent::CameraUnsupported);
                return Ok(());
            }
            self.cache.schedule(
                &entry.label,
                webcam,
                Some(self.unusable_callback(entry.slot)),
            );
        }

        self.pending_selection = Some(PendingSelection {
            entry,
            deadline: Instant::now() + self.config.probing.resolution_timeout(),
        });
        self.apply(DialogEvent::ResolutionsLoading);
        Ok(())
    }

    /// Wait until the pending camera selection has its resolutions or times out.
    ///
    /// Dropping the returned future is harmless: the selection stays pending and
    /// [`Self::process_pending`] completes it later.
    pub async fn wait_for_resolutions(&mut self) -> DialogState {
        let (label, remaining) = match &self.pending_selection {
            Some(pending) => (
                pending.entry.label.clone(),
                pending.deadline.saturating_duration_since(Instant::now()),
            ),
            None => return self.state,
        };

        let waited = self.cache.wait_for(&label, remaining).await;
        if !self.poll_selection() && waited == ProbeWait::TimedOut {
            if let Some(pending) = self.pending_selection.take() {
                self.finish_selection(pending.entry, ProbeWait::TimedOut);
            }
        }
        self.state
    }

    /// Complete the pending selection if its probe finished or its wait expired
    fn poll_selection(&mut self) -> bool {
        let (label, deadline) = match &self.pending_selection {
            Some(pending) => (pending.entry.label.clone(), pending.deadline),
            None => return false,
        };
        if self.closed {
            self.pending_selection = None;
            return false;
        }

        let outcome = if let Some(list) = self.cache.get(&label) {
            ProbeWait::Ready(list)
        } else if !self.cache.is_probing(&label) {
            ProbeWait::Unusable
        } else if Instant::now() >= deadline {
            ProbeWait::TimedOut
        } else {
            return false;
        };

        match self.pending_selection.take() {
            Some(pending) => {
                self.finish_selection(pending.entry, outcome);
                true
            }
            None => false,
        }
    }

    fn finish_selection(&mut self, entry: CameraEntry, outcome: ProbeWait) {
        self.loading = false;
        match outcome {
            ProbeWait::Ready(list) if !list.is_empty() => {
                self.dimensions = list;
                self.selected_dimension = Some(0);
                self.apply(DialogEvent::ResolutionsReady);
            }
            ProbeWait::TimedOut => {
                log::warn!("Resolutions of {} did not arrive in time", entry.label);
                self.apply(DialogEvent::CameraUnsupported);
            }
            _ => {
                self.mark_unsupported(entry.slot);
                self.apply(DialogEvent::CameraUnsupported);
            }
        }
    }

    pub fn select_resolution(&mut self, index: usize) -> Result<(), CameraError> {
        self.ensure_open()?;
        if !self.interactables().dimensions {
            return Err(Self::disabled("dimension list"));
        }
        if index >= self.dimensions.len() {
            return Err(CameraError::InvalidArgument(format!(
                "No resolution at position {}",
                index
            )));
        }
        self.selected_dimension = Some(index);
        Ok(())
    }

    /// The rotation choice sits with the dimension list and shares its enablement
    pub fn set_rotation(&mut self, rotation: WebcamRotation) -> Result<(), CameraError> {
        self.ensure_open()?;
        if !self.interactables().dimensions {
            return Err(Self::disabled("rotation list"));
        }
        self.rotation = rotation;
        Ok(())
    }

    /// Replace the source name text
    pub fn set_name(&mut self, name: &str) -> Result<(), CameraError> {
        self.ensure_open()?;
        if !self.interactables().name {
            return Err(Self::disabled("name field"));
        }
        self.name = name.to_string();
        Ok(())
    }

    /// Name is non-blank and unused by the host
    pub fn name_is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.host.registry.is_name_in_use(&self.name)
    }

    fn interactables(&self) -> Interactables {
        if self.closed || self.loading {
            return Interactables::all(false);
        }
        let mut interactables = self.state.presentation().interactables;
        interactables.action = interactables.action && self.name_is_valid();
        interactables
    }

    /// Press the Test / Create button
    pub fn press_action(&mut self) -> Result<(), CameraError> {
        self.ensure_open()?;
        if !self.interactables().action {
            log::debug!("Action button is disabled in state {:?}", self.state);
            return Ok(());
        }
        self.apply(DialogEvent::ActionPressed);
        Ok(())
    }

    /// Close without creating a source
    pub fn cancel(&mut self) {
        if self.closed {
            return;
        }
        self.was_cancelled.store(true, Ordering::SeqCst);
        self.outcome = DialogOutcome::Cancelled;
        self.apply(DialogEvent::Cancelled);
        log::info!("Camera source dialog cancelled");
    }

    /// Apply finished resolution probes and the test results delivered by the
    /// main-update cycle. Returns how many were applied.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = usize::from(self.poll_selection());
        while let Ok(result) = self.probe_rx.try_recv() {
            if self.apply_probe_result(result) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait until the outstanding camera test resolves or `timeout` passes
    pub async fn wait_for_probe(&mut self, timeout: Duration) -> DialogState {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.state == DialogState::ClickedTest && !self.closed {
            match tokio::time::timeout_at(deadline, self.probe_rx.recv()).await {
                Ok(Some(result)) => {
                    self.apply_probe_result(result);
                }
                Ok(None) | Err(_) => break,
            }
        }
        self.state
    }

    fn apply_probe_result(&mut self, result: ProbeResult) -> bool {
        if self.was_cancelled() || self.closed {
            log::debug!("Dialog closed, ignoring camera test result");
            return false;
        }
        if result.generation != self.test_generation {
            log::debug!("Ignoring stale camera test result");
            return false;
        }

        let event = if result.success {
            DialogEvent::ProbeSucceeded
        } else {
            DialogEvent::ProbeFailed
        };
        self.apply(event);
        true
    }

    fn apply(&mut self, event: DialogEvent) {
        let transition = state::transition(self.state, event);
        if transition.state != self.state {
            log::debug!("Dialog state {:?} -> {:?} on {:?}", self.state, transition.state, event);
        }
        self.state = transition.state;

        for effect in transition.effects {
            match effect {
                Effect::ClearName => self.name.clear(),
                Effect::ShowCalculating => self.loading = true,
                Effect::ScheduleProbe => self.schedule_test(),
                Effect::CreateSource => self.commit(),
                Effect::Close => self.closed = true,
            }
        }
    }

    fn selected_slot(&self) -> Option<(SharedWebcam, String, u32, crate::types::WebcamDriver)> {
        let entry = self.entries.get(self.selected_camera?)?;
        let slots = self.lock_slots();
        let slot = slots.get(&entry.slot).filter(|slot| slot.supported)?;
        Some((slot.webcam.clone(), slot.name.clone(), slot.index, slot.kind))
    }

    fn selected_resolution(&self) -> Option<Resolution> {
        self.dimensions.get(self.selected_dimension?).copied()
    }

    fn schedule_test(&mut self) {
        self.test_generation += 1;
        let generation = self.test_generation;

        let (webcam, resolution) = match (self.selected_slot(), self.selected_resolution()) {
            (Some((webcam, ..)), Some(resolution)) => (webcam, resolution),
            _ => {
                log::warn!("Nothing selected to test");
                self.apply(DialogEvent::ProbeFailed);
                return;
            }
        };

        let tx = self.probe_tx.clone();
        let cancelled = self.was_cancelled.clone();
        self.host.main_update.do_once(Box::new(move || {
            let success = match lock_webcam(&webcam) {
                Ok(mut webcam) => {
                    webcam.set_resolution(resolution);
                    test_camera(&mut *webcam)
                }
                Err(e) => {
                    log::warn!("Cannot test camera: {}", e);
                    false
                }
            };

            if cancelled.load(Ordering::SeqCst) {
                log::debug!("Dialog was cancelled during camera test");
                return;
            }
            let _ = tx.send(ProbeResult {
                generation,
                success,
            });
        }));
    }

    fn commit(&mut self) {
        let (webcam_name, webcam_index, kind, resolution, position) =
            match (self.selected_slot(), self.selected_resolution(), self.selected_camera) {
                (Some((_, name, index, kind)), Some(resolution), Some(position)) => {
                    (name, index, kind, resolution, position)
                }
                _ => {
                    log::error!("Tested camera is no longer selected, not creating a source");
                    return;
                }
            };

        let request = SourceRequest {
            name: self.name.clone(),
            camera: resolve_camera_id(
                self.using_index_discovery,
                kind,
                webcam_index,
                &webcam_name,
                position,
            ),
            resolution,
            rotation: self.rotation,
        };

        create_source(&self.host, request.clone());
        self.outcome = DialogOutcome::Created(request);
    }

    pub fn view(&self) -> DialogView {
        let presentation = self.state.presentation();

        let cameras = if self.entries.is_empty() {
            vec![state::NO_CAMERAS_ITEM.to_string()]
        } else {
            self.camera_labels()
        };

        let dimensions = if self.loading {
            vec![state::CALCULATING.to_string()]
        } else {
            self.dimensions.iter().map(|res| res.to_string()).collect()
        };

        DialogView {
            title: DIALOG_TITLE.to_string(),
            state: self.state,
            cameras,
            selected_camera: self.selected_camera,
            dimensions,
            selected_dimension: self.selected_dimension,
            rotation: self.rotation,
            name: self.name.clone(),
            status: presentation.status.to_string(),
            action_label: presentation.action_label.to_string(),
            interactables: self.interactables(),
            closed: self.closed,
            was_cancelled: self.was_cancelled(),
        }
    }
}
