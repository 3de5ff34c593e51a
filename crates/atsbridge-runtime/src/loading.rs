//! [`LoadingPipeline`] – staged background loading with cancellation.
//!
//! Loading a route runs a fixed sequence of stages.  The pipeline drives a
//! [`StageRunner`] through them on a worker thread and checks a shared
//! cancellation flag between stages, so a user interrupt stops the load at
//! the next stage boundary.  Plugin loading is the last stage: a cancelled
//! load never leaves a half-initialised module behind.
//!
//! ```rust
//! use atsbridge_runtime::loading::{LoadingOutcome, LoadingPipeline, LoadingStage, StageRunner};
//! use atsbridge_types::BridgeError;
//!
//! struct Noop;
//! impl StageRunner for Noop {
//!     fn run(&mut self, _stage: LoadingStage) -> Result<(), BridgeError> { Ok(()) }
//! }
//!
//! let pipeline = LoadingPipeline::new();
//! let (_, outcome) = pipeline.spawn(Noop).unwrap().join().unwrap();
//! assert_eq!(outcome, LoadingOutcome::Completed);
//! ```

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use atsbridge_types::BridgeError;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoadingStage {
    RouteParse,
    TrainParse,
    PanelParse,
    ObjectPlacement,
    PluginLoad,
}

impl LoadingStage {
    /// Every stage, in execution order.
    pub const ALL: [LoadingStage; 5] = [
        LoadingStage::RouteParse,
        LoadingStage::TrainParse,
        LoadingStage::PanelParse,
        LoadingStage::ObjectPlacement,
        LoadingStage::PluginLoad,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LoadingOutcome {
    Completed,
    /// Stopped at a stage boundary; `completed` lists the stages that ran.
    Cancelled { completed: Vec<LoadingStage> },
    Failed { stage: LoadingStage, error: BridgeError },
}

/// Work done for each stage.
pub trait StageRunner: Send {
    fn run(&mut self, stage: LoadingStage) -> Result<(), BridgeError>;
}

/// Runs the loading stages and owns the cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct LoadingPipeline {
    cancel: Arc<AtomicBool>,
}

impl LoadingPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pipeline cancelled through an existing flag, e.g. one a signal
    /// handler already holds.
    pub fn with_cancel_flag(cancel: Arc<AtomicBool>) -> Self {
        Self { cancel }
    }

    /// Shared flag; storing `true` cancels the load at the next boundary.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Clear a previous cancellation before starting another load.
    pub fn reset(&self) {
        self.cancel.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Run every stage on the calling thread.
    pub fn run<R: StageRunner + ?Sized>(&self, runner: &mut R) -> LoadingOutcome {
        let mut completed = Vec::with_capacity(LoadingStage::ALL.len());
        for stage in LoadingStage::ALL {
            if self.is_cancelled() {
                info!(?stage, done = completed.len(), "loading cancelled");
                return LoadingOutcome::Cancelled { completed };
            }
            let _span = info_span!("loading_stage", ?stage).entered();
            if let Err(error) = runner.run(stage) {
                warn!(?stage, %error, "loading stage failed");
                return LoadingOutcome::Failed { stage, error };
            }
            completed.push(stage);
        }
        info!("loading completed");
        LoadingOutcome::Completed
    }

    /// Run every stage on a worker thread.  The runner is handed back with
    /// the outcome when the thread is joined.
    ///
    /// # Errors
    ///
    /// Returns the OS error when the thread cannot be spawned.
    pub fn spawn<R: StageRunner + 'static>(&self, mut runner: R) -> io::Result<JoinHandle<(R, LoadingOutcome)>> {
        let pipeline = self.clone();
        thread::Builder::new()
            .name("atsbridge-loader".to_string())
            .spawn(move || {
                let outcome = pipeline.run(&mut runner);
                (runner, outcome)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[derive(Default)]
    struct Recorder {
        ran: Vec<LoadingStage>,
        fail_at: Option<LoadingStage>,
        cancel_after: Option<(LoadingStage, Arc<AtomicBool>)>,
    }

    impl StageRunner for Recorder {
        fn run(&mut self, stage: LoadingStage) -> Result<(), BridgeError> {
            if self.fail_at == Some(stage) {
                return Err(BridgeError::Config("broken route".to_string()));
            }
            self.ran.push(stage);
            if let Some((at, flag)) = &self.cancel_after
                && *at == stage
            {
                flag.store(true, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    #[test]
    fn runs_all_stages_in_order() {
        let mut runner = Recorder::default();
        assert_eq!(LoadingPipeline::new().run(&mut runner), LoadingOutcome::Completed);
        assert_eq!(runner.ran, LoadingStage::ALL);
    }

    #[test]
    fn cancellation_stops_at_stage_boundary() {
        let pipeline = LoadingPipeline::new();
        let mut runner = Recorder {
            cancel_after: Some((LoadingStage::TrainParse, pipeline.cancel_flag())),
            ..Recorder::default()
        };
        let outcome = pipeline.run(&mut runner);
        assert_eq!(
            outcome,
            LoadingOutcome::Cancelled {
                completed: vec![LoadingStage::RouteParse, LoadingStage::TrainParse]
            }
        );
        assert!(!runner.ran.contains(&LoadingStage::PluginLoad));
    }

    #[test]
    fn reset_allows_a_new_load() {
        let flag = Arc::new(AtomicBool::new(true));
        let pipeline = LoadingPipeline::with_cancel_flag(Arc::clone(&flag));
        assert!(matches!(
            pipeline.run(&mut Recorder::default()),
            LoadingOutcome::Cancelled { .. }
        ));
        pipeline.reset();
        assert!(!flag.load(Ordering::SeqCst));
        assert_eq!(pipeline.run(&mut Recorder::default()), LoadingOutcome::Completed);
    }

    #[test]
    fn failure_names_the_stage() {
        let mut runner = Recorder {
            fail_at: Some(LoadingStage::PanelParse),
            ..Recorder::default()
        };
        let outcome = LoadingPipeline::new().run(&mut runner);
        assert!(matches!(
            outcome,
            LoadingOutcome::Failed { stage: LoadingStage::PanelParse, .. }
        ));
    }

    /// Blocks in the first stage until the test releases it.
    struct Gated {
        entered: mpsc::Sender<()>,
        release: mpsc::Receiver<()>,
        ran: usize,
    }

    impl StageRunner for Gated {
        fn run(&mut self, stage: LoadingStage) -> Result<(), BridgeError> {
            if stage == LoadingStage::RouteParse {
                let _ = self.entered.send(());
                let _ = self.release.recv();
            }
            self.ran += 1;
            Ok(())
        }
    }

    #[test]
    fn cancel_from_another_thread() {
        let pipeline = LoadingPipeline::new();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (tx, rx) = mpsc::channel();
        let handle = pipeline
            .spawn(Gated { entered: entered_tx, release: rx, ran: 0 })
            .unwrap();

        entered_rx.recv().unwrap();
        pipeline.cancel();
        tx.send(()).unwrap();
        let (runner, outcome) = handle.join().unwrap();

        assert_eq!(runner.ran, 1);
        assert_eq!(
            outcome,
            LoadingOutcome::Cancelled { completed: vec![LoadingStage::RouteParse] }
        );
    }
}
