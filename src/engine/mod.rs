//! The conversation orchestration engine.

pub mod jobs;
pub mod orchestrator;

pub use jobs::{CompletionSignal, GenerationCoordinator};
pub use orchestrator::Orchestrator;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::adapters::{ImageAdapter, SpeechAdapter, TextAdapter};
use crate::config::Settings;
use crate::store::ProfileStore;

/// Wires the orchestrator and the job coordinator together around one
/// completion channel. `main` drives it; tests usually talk to the
/// orchestrator directly.
pub struct Engine {
    orchestrator: Arc<Orchestrator>,
    coordinator: Arc<GenerationCoordinator>,
    completion_rx: mpsc::UnboundedReceiver<CompletionSignal>,
}

impl Engine {
    pub fn new(
        settings: &Settings,
        store: Arc<dyn ProfileStore>,
        text: Arc<dyn TextAdapter>,
        image: Arc<dyn ImageAdapter>,
        speech: Arc<dyn SpeechAdapter>,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let coordinator = Arc::new(GenerationCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&text),
            Arc::clone(&image),
            settings.retry,
            settings.job_staleness,
            completion_tx,
        ));
        let orchestrator = Arc::new(Orchestrator::new(
            store,
            text,
            speech,
            Arc::clone(&coordinator),
            settings.retry,
            settings.storage_retries,
        ));
        Self {
            orchestrator,
            coordinator,
            completion_rx,
        }
    }

    pub fn orchestrator(&self) -> Arc<Orchestrator> {
        Arc::clone(&self.orchestrator)
    }

    /// Startup sweep: fail any job left non-terminal past the staleness
    /// threshold so no user stays stuck in `GeneratingOutfit`.
    pub async fn recover_stale(&self) -> usize {
        self.coordinator.recover_stale().await
    }

    /// Next completion signal from the background coordinator. `None` only
    /// once every sender (the coordinator) is gone.
    pub async fn next_completion(&mut self) -> Option<CompletionSignal> {
        self.completion_rx.recv().await
    }
}
