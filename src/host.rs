//! Host application collaborators
//!
//! The dialog never mutates host state directly. Registration and the camera
//! test probe are queued on the host's main-update hook, and source names are
//! checked against the host's input-source registry.

use crate::errors::CameraError;
use crate::source::CameraSource;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};

/// Work queued for the next main-update cycle
pub type MainUpdateTask = Box<dyn FnOnce() + Send + 'static>;

/// The host's input-source registry
pub trait InputSourceRegistry: Send + Sync {
    /// Register `source` under `name`, optionally making it the active source
    fn add_input_source(
        &self,
        name: &str,
        source: CameraSource,
        make_active: bool,
    ) -> Result<(), CameraError>;

    fn is_name_in_use(&self, name: &str) -> bool;

    /// A name based on `base` that no registered source uses
    fn try_name(&self, base: &str) -> String;

    fn source_count(&self) -> usize;
}

/// The host's "run this once on the next update" primitive
pub trait MainUpdateHook: Send + Sync {
    fn do_once(&self, task: MainUpdateTask);
}

/// Handles to everything the dialog needs from its host
#[derive(Clone)]
pub struct Host {
    pub registry: Arc<dyn InputSourceRegistry>,
    pub main_update: Arc<dyn MainUpdateHook>,
}

impl Host {
    pub fn new(registry: Arc<dyn InputSourceRegistry>, main_update: Arc<dyn MainUpdateHook>) -> Self {
        Self {
            registry,
            main_update,
        }
    }

    /// Host backed by an in-memory registry and a manually pumped update queue
    pub fn in_process() -> (Host, Arc<InputSourceManager>, Arc<MainUpdateQueue>) {
        let registry = Arc::new(InputSourceManager::new());
        let queue = Arc::new(MainUpdateQueue::new());
        let host = Host::new(registry.clone(), queue.clone());
        (host, registry, queue)
    }
}

/// A registered source and its name
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegisteredSource {
    pub name: String,
    pub source: CameraSource,
}

/// In-memory input-source registry
#[derive(Debug, Default)]
pub struct InputSourceManager {
    sources: RwLock<Vec<RegisteredSource>>,
    active: RwLock<Option<String>>,
}

impl InputSourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sources(&self) -> Vec<RegisteredSource> {
        self.sources
            .read()
            .map(|sources| sources.clone())
            .unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<CameraSource> {
        self.sources
            .read()
            .ok()?
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.source.clone())
    }

    /// Name of the active source
    pub fn active(&self) -> Option<String> {
        self.active.read().ok().and_then(|active| active.clone())
    }
}

impl InputSourceRegistry for InputSourceManager {
    fn add_input_source(
        &self,
        name: &str,
        source: CameraSource,
        make_active: bool,
    ) -> Result<(), CameraError> {
        let mut sources = self
            .sources
            .write()
            .map_err(|_| CameraError::RegistryError("Registry lock poisoned".to_string()))?;

        if sources.iter().any(|s| s.name == name) {
            return Err(CameraError::RegistryError(format!(
                "Input source '{}' already exists",
                name
            )));
        }

        log::info!("Adding input source {} ({})", name, source.camera);
        sources.push(RegisteredSource {
            name: name.to_string(),
            source,
        });
        drop(sources);

        if make_active {
            let mut active = self
                .active
                .write()
                .map_err(|_| CameraError::RegistryError("Registry lock poisoned".to_string()))?;
            *active = Some(name.to_string());
        }
        Ok(())
    }

    fn is_name_in_use(&self, name: &str) -> bool {
        self.sources
            .read()
            .map(|sources| sources.iter().any(|s| s.name == name))
            .unwrap_or(false)
    }

    fn try_name(&self, base: &str) -> String {
        if !self.is_name_in_use(base) {
            return base.to_string();
        }

        let mut count = 1;
        loop {
            let candidate = format!("{}-{}", base, count);
            if !self.is_name_in_use(&candidate) {
                return candidate;
            }
            count += 1;
        }
    }

    fn source_count(&self) -> usize {
        self.sources.read().map(|sources| sources.len()).unwrap_or(0)
    }
}

/// FIFO of once-only tasks, drained by whoever owns the update cycle
#[derive(Default)]
pub struct MainUpdateQueue {
    tasks: Mutex<VecDeque<MainUpdateTask>>,
}

impl MainUpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.tasks.lock().map(|tasks| tasks.len()).unwrap_or(0)
    }

    /// Run the tasks queued before this call.
    ///
    /// Tasks queued while running wait for the next cycle. Returns the number run.
    pub fn run_pending(&self) -> usize {
        let batch: Vec<MainUpdateTask> = match self.tasks.lock() {
            Ok(mut tasks) => tasks.drain(..).collect(),
            Err(_) => {
                log::error!("Main update queue lock poisoned");
                return 0;
            }
        };

        let count = batch.len();
        for task in batch {
            task();
        }
        count
    }
}

impl MainUpdateHook for MainUpdateQueue {
    fn do_once(&self, task: MainUpdateTask) {
        match self.tasks.lock() {
            Ok(mut tasks) => tasks.push_back(task),
            Err(_) => log::error!("Main update queue lock poisoned, dropping task"),
        }
    }
}
