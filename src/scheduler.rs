//! Fixpoint scheduler
//!
//! Top-level code runs once. After that the scheduler works in rounds: each
//! round invokes every registered callback once (callbacks registered during
//! the round included), in registration order. Writes are joins, so the
//! order cannot change the result, only how many rounds it takes to get
//! there. The analysis is done when a round leaves every location and the
//! registry unchanged.

use serde::Serialize;
use tracing::debug;

use crate::ast::Program;
use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;
use crate::extractor::StaticInfo;
use crate::heap::{Environment, Heap};
use crate::interpreter::{Callback, Interpreter};
use crate::prelude::*;

/// Every callback seen so far, in registration order
#[derive(Debug, Clone, Default)]
pub struct CallbackRegistry {
    callbacks: IndexSet<Callback>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        CallbackRegistry::default()
    }

    /// Returns false when the callback was already registered
    pub fn register(&mut self, callback: Callback) -> bool {
        self.callbacks.insert(callback)
    }

    pub fn get(&self, index: usize) -> Option<Callback> {
        self.callbacks.get_index(index).copied()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Callback> {
        self.callbacks.iter()
    }
}

/// The whole abstract state of one analysis run
#[derive(Debug, Clone)]
pub struct GlobalAbstractState {
    pub heap: Heap,
    pub globals: Environment,
    pub registry: CallbackRegistry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleStats {
    /// Scheduler rounds, the final unchanged round included
    pub rounds: usize,
    pub callback_invocations: usize,
    pub locations: usize,
    pub callbacks: usize,
}

pub struct Scheduler<'a> {
    info: &'a StaticInfo,
    config: &'a AnalyzerConfig,
    state: GlobalAbstractState,
    stats: ScheduleStats,
}

impl<'a> Scheduler<'a> {
    /// Build the global environment and run top-level code once
    pub fn start(
        info: &'a StaticInfo,
        config: &'a AnalyzerConfig,
        program: &Program,
    ) -> Result<Self, AnalysisError> {
        let mut heap = Heap::new();
        let mut interpreter = Interpreter::new(info, config, &mut heap);
        let mut globals = interpreter.global_environment(program)?;
        let outcome = interpreter.run_program(program, &mut globals)?;

        let mut registry = CallbackRegistry::new();
        for callback in outcome.callbacks {
            registry.register(callback);
        }
        debug!(
            locations = heap.location_count(),
            callbacks = registry.len(),
            generation = heap.generation(),
            "top-level pass done"
        );

        let mut scheduler = Scheduler {
            info,
            config,
            state: GlobalAbstractState {
                heap,
                globals,
                registry,
            },
            stats: ScheduleStats::default(),
        };
        scheduler.update_sizes();
        Ok(scheduler)
    }

    pub fn state(&self) -> &GlobalAbstractState {
        &self.state
    }

    pub fn stats(&self) -> ScheduleStats {
        self.stats
    }

    /// Invoke every registered callback once; returns whether anything
    /// changed
    pub fn run_round(&mut self) -> Result<bool, AnalysisError> {
        let generation = self.state.heap.generation();
        let registered = self.state.registry.len();

        let mut index = 0;
        while let Some(callback) = self.state.registry.get(index) {
            let mut interpreter = Interpreter::new(self.info, self.config, &mut self.state.heap);
            let outcome = interpreter.invoke_callback(callback, index as u32)?;
            for added in outcome.callbacks {
                self.state.registry.register(added);
            }
            self.stats.callback_invocations += 1;
            index += 1;
        }

        self.stats.rounds += 1;
        self.update_sizes();
        let changed = self.state.heap.generation() != generation
            || self.state.registry.len() != registered;
        debug!(
            round = self.stats.rounds,
            generation = self.state.heap.generation(),
            callbacks = self.state.registry.len(),
            changed,
            "scheduler round"
        );
        Ok(changed)
    }

    /// Run rounds until one changes nothing
    pub fn run_to_fixpoint(mut self) -> Result<(GlobalAbstractState, ScheduleStats), AnalysisError> {
        loop {
            if self.stats.rounds >= self.config.max_rounds {
                return Err(AnalysisError::diverged(format!(
                    "no fixpoint after {} scheduler rounds",
                    self.stats.rounds
                )));
            }
            if !self.run_round()? {
                break;
            }
        }
        debug!(
            rounds = self.stats.rounds,
            locations = self.stats.locations,
            callbacks = self.stats.callbacks,
            "fixpoint reached"
        );
        Ok((self.state, self.stats))
    }

    fn update_sizes(&mut self) {
        self.stats.locations = self.state.heap.location_count();
        self.stats.callbacks = self.state.registry.len();
    }
}
