//! Test-and-create state machine of the camera source dialog
//!
//! [`transition`] is a pure function: it maps the current state and an event to
//! the next state plus the side effects the controller must carry out.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DialogState {
    Initial,
    ClickedTest,
    TestSuccessful,
    TestFailed,
    NoWebcams,
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DialogEvent {
    /// Enumeration found no cameras
    NoCameras,
    /// The selected camera is pruned or reported no resolutions
    CameraUnsupported,
    /// The selected camera's resolutions are still being probed
    ResolutionsLoading,
    /// The selected camera's resolutions are in the dimension list
    ResolutionsReady,
    ActionPressed,
    ProbeSucceeded,
    ProbeFailed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    ClearName,
    ShowCalculating,
    /// Queue the open-and-read test on the main-update cycle
    ScheduleProbe,
    /// Queue registration of the tested camera
    CreateSource,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: DialogState,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(state: DialogState) -> Self {
        Self {
            state,
            effects: Vec::new(),
        }
    }

    fn with(state: DialogState, effects: &[Effect]) -> Self {
        Self {
            state,
            effects: effects.to_vec(),
        }
    }

    /// The event changed nothing
    pub fn is_noop(&self, from: DialogState) -> bool {
        self.state == from && self.effects.is_empty()
    }
}

pub fn transition(state: DialogState, event: DialogEvent) -> Transition {
    use DialogEvent::*;
    use DialogState::*;

    match (state, event) {
        (_, NoCameras) => Transition::with(NoWebcams, &[Effect::ClearName]),
        (_, Cancelled) => Transition::with(state, &[Effect::Close]),

        (NoWebcams, _) => Transition::to(NoWebcams),

        (_, CameraUnsupported) => Transition::with(Unsupported, &[Effect::ClearName]),
        (_, ResolutionsLoading) => Transition::with(state, &[Effect::ShowCalculating]),
        (_, ResolutionsReady) => Transition::to(Initial),

        (Initial | TestFailed, ActionPressed) => {
            Transition::with(ClickedTest, &[Effect::ScheduleProbe])
        }
        (TestSuccessful, ActionPressed) => {
            Transition::with(TestSuccessful, &[Effect::CreateSource, Effect::Close])
        }

        (ClickedTest, ProbeSucceeded) => Transition::to(TestSuccessful),
        (ClickedTest, ProbeFailed) => Transition::to(TestFailed),

        (state, _) => Transition::to(state),
    }
}

/// Which widgets a state allows the user to touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interactables {
    pub camera: bool,
    pub name: bool,
    pub dimensions: bool,
    pub action: bool,
}

impl Interactables {
    pub const fn all(value: bool) -> Self {
        Self {
            camera: value,
            name: value,
            dimensions: value,
            action: value,
        }
    }
}

/// Status text, action label and widget enablement of a state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    pub status: &'static str,
    pub action_label: &'static str,
    pub interactables: Interactables,
}

pub const CALCULATING: &str = "Calculating...";
pub const NO_CAMERAS_ITEM: &str = "No Cameras Detected";

impl DialogState {
    pub fn presentation(&self) -> Presentation {
        match self {
            DialogState::Initial => Presentation {
                status: "Click \"test\" to test camera.",
                action_label: "Test",
                interactables: Interactables::all(true),
            },
            DialogState::ClickedTest => Presentation {
                status: "Trying to open camera, please wait...",
                action_label: "Test",
                interactables: Interactables {
                    camera: false,
                    name: true,
                    dimensions: true,
                    action: false,
                },
            },
            DialogState::TestSuccessful => Presentation {
                status: "Camera was opened successfully.",
                action_label: "Create",
                interactables: Interactables::all(true),
            },
            DialogState::TestFailed => Presentation {
                status: "Failed to open camera, try another one.",
                action_label: "Test",
                interactables: Interactables::all(true),
            },
            DialogState::NoWebcams => Presentation {
                status: "No cameras detected.",
                action_label: "Test",
                interactables: Interactables::all(false),
            },
            DialogState::Unsupported => Presentation {
                status: "This camera is currently unavailable.",
                action_label: "Test",
                interactables: Interactables {
                    camera: true,
                    ..Interactables::all(false)
                },
            },
        }
    }
}
