//! Iteration Observers
//!
//! The clock calls every observer once per completed iteration. Observers only
//! read the model; a failing observer is logged and skipped.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::Result;
use crate::sim::view::ModelView;

pub trait IterationObserver {
    /// `iteration` is the zero-based index of the step that just finished.
    fn on_iteration(&mut self, iteration: u64, view: &ModelView<'_>) -> Result<()>;

    /// Called once after the last iteration.
    fn on_finish(&mut self, _view: &ModelView<'_>) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "observer"
    }
}

/// Lets the caller keep a handle on an observer the clock owns.
impl<T: IterationObserver> IterationObserver for Rc<RefCell<T>> {
    fn on_iteration(&mut self, iteration: u64, view: &ModelView<'_>) -> Result<()> {
        self.borrow_mut().on_iteration(iteration, view)
    }

    fn on_finish(&mut self, view: &ModelView<'_>) -> Result<()> {
        self.borrow_mut().on_finish(view)
    }

    fn name(&self) -> &str {
        "shared"
    }
}

/// Logs a one-line opinion summary every `print_interval` iterations.
#[derive(Debug, Clone)]
pub struct ProgressLogger {
    pub print_interval: u64,
    pub verbose: bool,
}

impl ProgressLogger {
    pub fn new(print_interval: u64) -> Self {
        Self {
            print_interval,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn due(&self, completed: u64, max_iterations: u64) -> bool {
        self.print_interval > 0 && (completed % self.print_interval == 0 || completed == max_iterations)
    }
}

impl IterationObserver for ProgressLogger {
    fn on_iteration(&mut self, iteration: u64, view: &ModelView<'_>) -> Result<()> {
        let completed = iteration + 1;
        if !self.due(completed, view.max_iterations) {
            return Ok(());
        }

        let metrics = view.opinion_metrics();
        tracing::info!(
            "[Iteration {:>4}/{}] mean opinion {:+.3} (variance {:.3}, range {:+.2}..{:+.2})",
            completed,
            view.max_iterations,
            metrics.mean_opinion,
            metrics.opinion_variance,
            metrics.min_opinion,
            metrics.max_opinion
        );
        if self.verbose {
            tracing::info!(radicalised = metrics.radicalised_count, population = metrics.population);
            for layer in view.layers.iter() {
                tracing::info!(layer = layer.name(), nodes = layer.node_count(), edges = layer.edge_count());
            }
            for (layer, agents) in view.significant_layer_counts() {
                tracing::debug!(layer = %layer, agents, "significant for");
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "progress"
    }
}

/// Fans each call out to every observer in insertion order.
#[derive(Default)]
pub struct ObserverChain {
    observers: Vec<Box<dyn IterationObserver>>,
}

impl ObserverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, observer: Box<dyn IterationObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl std::fmt::Debug for ObserverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.observers.iter().map(|o| o.name().to_string()))
            .finish()
    }
}

impl IterationObserver for ObserverChain {
    fn on_iteration(&mut self, iteration: u64, view: &ModelView<'_>) -> Result<()> {
        for observer in &mut self.observers {
            if let Err(e) = observer.on_iteration(iteration, view) {
                tracing::warn!(observer = observer.name(), iteration, "observer failed: {}", e);
            }
        }
        Ok(())
    }

    fn on_finish(&mut self, view: &ModelView<'_>) -> Result<()> {
        for observer in &mut self.observers {
            if let Err(e) = observer.on_finish(view) {
                tracing::warn!(observer = observer.name(), "observer failed at finish: {}", e);
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "chain"
    }
}
