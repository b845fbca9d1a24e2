//! Sequential Step Chaining
//!
//! Turns an ordered list of heterogeneous steps into a single failure-aware
//! pipeline. A step is either synchronous (success means it returned `Ok`) or
//! callback-based (success means it signalled its [`Done`] handle without an
//! error). The variant is fixed when the step is constructed.
//!
//! # Guarantees
//!
//! - Steps run strictly in list order, one at a time.
//! - The first failure short-circuits: no later step ever starts.
//! - The terminal callback runs exactly once, with `Ok(())` after the last
//!   step or with the first error.
//!
//! # Driver
//!
//! ```text
//! Pending ──▶ Running ──▶ Succeeded ──▶ (next step)
//!                │
//!                └──────▶ Failed ──▶ terminal(Err)
//! ```
//!
//! The driver is a loop over an indexed list. A step that completes while the
//! loop is still on the stack simply lets the loop continue, so long chains of
//! inline steps never recurse. A callback signalled later (possibly from
//! another thread) finds the loop gone and restarts it. Shared state sits
//! behind a mutex that is never held while user code runs.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use strum::Display;
use tracing::{debug, warn};

type Action = Box<dyn FnOnce() -> anyhow::Result<()> + Send>;
type CallbackAction = Box<dyn FnOnce(Done) + Send>;
type Notify = Box<dyn FnOnce(anyhow::Result<()>) + Send>;

/// The single completion callback of a chain run
pub type Terminal = Box<dyn FnOnce(anyhow::Result<()>) + Send>;

/// One unit of chained execution
pub enum Step {
    /// Runs to completion on the driver's stack; `Err` aborts the chain
    Synchronous(Action),
    /// Receives a [`Done`] handle and may signal it at any later point
    CallbackBased(CallbackAction),
}

impl Step {
    /// Wrap a synchronous action
    pub fn sync<F>(action: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self::Synchronous(Box::new(action))
    }

    /// Wrap a callback-based action
    pub fn callback<F>(action: F) -> Self
    where
        F: FnOnce(Done) + Send + 'static,
    {
        Self::CallbackBased(Box::new(action))
    }

    /// A synchronous step that does nothing and succeeds
    pub fn noop() -> Self {
        Self::sync(|| Ok(()))
    }

    pub fn is_callback_based(&self) -> bool {
        matches!(self, Self::CallbackBased(_))
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::noop()
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synchronous(_) => f.write_str("Step::Synchronous"),
            Self::CallbackBased(_) => f.write_str("Step::CallbackBased"),
        }
    }
}

/// One-shot completion handle given to callback-based steps and handlers.
///
/// Signalling consumes the handle, so a step can complete at most once.
/// Dropping it without signalling leaves the chain suspended forever; there
/// is no timeout.
pub struct Done {
    notify: Option<Notify>,
}

impl Done {
    /// Build a handle that forwards the outcome to `notify`
    pub fn new<F>(notify: F) -> Self
    where
        F: FnOnce(anyhow::Result<()>) + Send + 'static,
    {
        Self {
            notify: Some(Box::new(notify)),
        }
    }

    /// Signal the outcome
    pub fn finish(mut self, result: anyhow::Result<()>) {
        if let Some(notify) = self.notify.take() {
            notify(result);
        }
    }

    /// Signal success
    pub fn succeed(self) {
        self.finish(Ok(()));
    }

    /// Signal failure with `err`
    pub fn fail(self, err: impl Into<anyhow::Error>) {
        self.finish(Err(err.into()));
    }
}

impl Drop for Done {
    fn drop(&mut self) {
        if self.notify.is_some() {
            warn!("Completion handle dropped without being signalled; the chain will not advance");
        }
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("signalled", &self.notify.is_none())
            .finish()
    }
}

/// Execution state of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StepState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

/// What the driver should do next
enum Advance {
    Run(usize, Step),
    Finish(Terminal),
    Yield,
}

struct ChainState {
    steps: VecDeque<Step>,
    states: Vec<StepState>,
    cursor: usize,
    started: bool,
    /// True while a driver loop is on some stack
    driving: bool,
    terminal: Option<Terminal>,
}

impl ChainState {
    fn advance(&mut self) -> Advance {
        if self.cursor > 0 && self.states[self.cursor - 1] != StepState::Succeeded {
            // Previous step is suspended or has failed
            self.driving = false;
            return Advance::Yield;
        }

        match self.steps.pop_front() {
            Some(step) => {
                let index = self.cursor;
                self.cursor += 1;
                self.states[index] = StepState::Running;
                self.driving = true;
                Advance::Run(index, step)
            }
            None => {
                self.driving = false;
                match self.terminal.take() {
                    Some(terminal) => Advance::Finish(terminal),
                    None => Advance::Yield,
                }
            }
        }
    }
}

struct ChainInner {
    state: Mutex<ChainState>,
}

impl ChainInner {
    fn lock(&self) -> MutexGuard<'_, ChainState> {
        // User code never runs under this lock, so poisoning cannot leave it inconsistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drive(self: &Arc<Self>) {
        loop {
            let next = self.lock().advance();
            match next {
                Advance::Run(index, Step::Synchronous(action)) => {
                    debug!("Running step {} (synchronous)", index);
                    let result = action();
                    self.complete(index, result);
                }
                Advance::Run(index, Step::CallbackBased(action)) => {
                    debug!("Running step {} (callback-based)", index);
                    let inner = Arc::clone(self);
                    action(Done::new(move |result| inner.complete(index, result)));
                }
                Advance::Finish(terminal) => {
                    debug!("All steps succeeded");
                    terminal(Ok(()));
                    return;
                }
                Advance::Yield => return,
            }
        }
    }

    fn complete(self: &Arc<Self>, index: usize, result: anyhow::Result<()>) {
        let (failure, resume) = {
            let mut state = self.lock();
            if state.states[index] != StepState::Running {
                warn!(
                    "Ignoring completion of step {} in state {}",
                    index, state.states[index]
                );
                return;
            }
            match result {
                Ok(()) => {
                    state.states[index] = StepState::Succeeded;
                    (None, !state.driving)
                }
                Err(err) => {
                    state.states[index] = StepState::Failed;
                    (state.terminal.take().map(|terminal| (terminal, err)), false)
                }
            }
        };

        if let Some((terminal, err)) = failure {
            debug!("Step {} failed, skipping remaining steps: {}", index, err);
            terminal(Err(err));
        } else if resume {
            self.drive();
        }
    }
}

/// A composed, single-entry sequential execution
pub struct Chain {
    inner: Arc<ChainInner>,
}

/// Compose `steps` into a chain that reports to `terminal`
///
/// Nothing runs until [`Chain::run`] is called.
pub fn chain<F>(steps: Vec<Step>, terminal: F) -> Chain
where
    F: FnOnce(anyhow::Result<()>) + Send + 'static,
{
    let len = steps.len();
    Chain {
        inner: Arc::new(ChainInner {
            state: Mutex::new(ChainState {
                steps: steps.into(),
                states: vec![StepState::Pending; len],
                cursor: 0,
                started: false,
                driving: false,
                terminal: Some(Box::new(terminal)),
            }),
        }),
    }
}

impl Chain {
    /// Start execution with the first step
    ///
    /// Returns once the chain completes or suspends on a callback-based step.
    /// A chain runs once; further calls are ignored.
    pub fn run(&self) {
        {
            let mut state = self.inner.lock();
            if state.started {
                warn!("Chain already started; ignoring run()");
                return;
            }
            state.started = true;
        }
        self.inner.drive();
    }

    /// Snapshot of every step's state, in list order
    pub fn states(&self) -> Vec<StepState> {
        self.inner.lock().states.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("states", &self.states())
            .finish()
    }
}
