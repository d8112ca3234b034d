//! Per-timestep orchestration of every configured product.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use ndarray::ArrayView3;
use tracing::{debug, info, instrument};

use crate::bracket::BracketResolver;
use crate::error::Result;
use crate::grid::{DomainDecomposition, GridMetadata};
use crate::postprocess::ForcingPostProcessor;
use crate::product::ProductKey;
use crate::regrid::{regrid_inputs, FrameRegridder};
use crate::state::ForcingState;
use crate::time::OutputClock;

/// What happened to one product during a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductOutcome {
    /// `final_forcings` holds fresh data for the step.
    Assembled { regridded_frames: usize },
    /// Inputs were not on disk yet; `final_forcings` holds the missing value.
    Skipped { missing: Vec<PathBuf> },
}

impl ProductOutcome {
    pub fn is_assembled(&self) -> bool {
        matches!(self, Self::Assembled { .. })
    }
}

/// Outcome of every product for one output time, in key order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub valid_time: DateTime<Utc>,
    pub outcomes: Vec<(ProductKey, ProductOutcome)>,
}

impl StepReport {
    pub fn assembled(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_assembled()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.assembled()
    }

    pub fn outcome(&self, key: ProductKey) -> Option<&ProductOutcome> {
        self.outcomes.iter().find(|(k, _)| *k == key).map(|(_, o)| o)
    }
}

/// Drives bracket resolution, regridding, interpolation and post-processing
/// for every configured product.
pub struct ForcingEngine<B, R, P> {
    states: BTreeMap<ProductKey, ForcingState>,
    grid: GridMetadata,
    decomposition: DomainDecomposition,
    resolver: B,
    regridder: R,
    post_processor: P,
    missing_value: f64,
}

impl<B, R, P> ForcingEngine<B, R, P>
where
    B: BracketResolver,
    R: FrameRegridder,
    P: ForcingPostProcessor,
{
    pub fn new(
        states: BTreeMap<ProductKey, ForcingState>,
        grid: GridMetadata,
        decomposition: DomainDecomposition,
        resolver: B,
        regridder: R,
        post_processor: P,
    ) -> Self {
        Self {
            states,
            grid,
            decomposition,
            resolver,
            regridder,
            post_processor,
            missing_value: f64::NAN,
        }
    }

    /// Value written into the output of a skipped product.
    pub fn with_missing_value(mut self, value: f64) -> Self {
        self.missing_value = value;
        self
    }

    pub fn states(&self) -> &BTreeMap<ProductKey, ForcingState> {
        &self.states
    }

    pub fn state(&self, key: ProductKey) -> Option<&ForcingState> {
        self.states.get(&key)
    }

    pub fn state_mut(&mut self, key: ProductKey) -> Option<&mut ForcingState> {
        self.states.get_mut(&key)
    }

    pub fn final_forcings(&self, key: ProductKey) -> Option<ArrayView3<'_, f64>> {
        self.states.get(&key).map(ForcingState::final_forcings)
    }

    pub fn grid(&self) -> &GridMetadata {
        &self.grid
    }

    /// Assemble every product for output time `now`.
    ///
    /// A product whose input files have not arrived is skipped for this step.
    /// Any other failure aborts the step.
    #[instrument(skip(self))]
    pub fn step(&mut self, now: DateTime<Utc>) -> Result<StepReport> {
        let mut outcomes = Vec::with_capacity(self.states.len());

        for (&key, state) in self.states.iter_mut() {
            let outcome = assemble_product(
                state,
                now,
                &self.grid,
                &self.decomposition,
                &self.resolver,
                &mut self.regridder,
                &mut self.post_processor,
                self.missing_value,
            )?;
            outcomes.push((key, outcome));
        }

        Ok(StepReport {
            valid_time: now,
            outcomes,
        })
    }

    /// Step through every time of `clock`, handing each assembled product's
    /// output to `sink`. Returns the number of steps run.
    pub fn run<F>(&mut self, clock: OutputClock, mut sink: F) -> Result<usize>
    where
        F: FnMut(DateTime<Utc>, ProductKey, ArrayView3<'_, f64>) -> Result<()>,
    {
        let mut steps = 0;
        for now in clock {
            let report = self.step(now)?;
            if self.decomposition.is_root() {
                info!(
                    valid_time = %now,
                    assembled = report.assembled(),
                    skipped = report.skipped(),
                    "Output step complete"
                );
            }

            for (key, outcome) in &report.outcomes {
                if !outcome.is_assembled() {
                    continue;
                }
                if let Some(state) = self.states.get(key) {
                    sink(now, *key, state.final_forcings())?;
                }
            }
            steps += 1;
        }
        Ok(steps)
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble_product<B, R, P>(
    state: &mut ForcingState,
    now: DateTime<Utc>,
    grid: &GridMetadata,
    decomposition: &DomainDecomposition,
    resolver: &B,
    regridder: &mut R,
    post_processor: &mut P,
    missing_value: f64,
) -> Result<ProductOutcome>
where
    B: BracketResolver,
    R: FrameRegridder,
    P: ForcingPostProcessor,
{
    let stale = resolver.find_bracket(state, now, decomposition)?;
    let bracket = state.check_bracket(now)?;

    if !bracket.is_available() {
        let missing = bracket.missing_files();
        info!(
            product = %state.name(),
            valid_time = %now,
            missing = missing.len(),
            "Inputs not yet available, skipping product"
        );
        state.fill_final(missing_value);
        return Ok(ProductOutcome::Skipped { missing });
    }

    debug!(
        product = %state.name(),
        previous = %bracket.previous.valid_time,
        next = %bracket.next.valid_time,
        stale = stale.count(),
        "Resolved bracket"
    );

    let regridded_frames = regrid_inputs(regridder, state, grid, decomposition)?;

    let mode = state.options.temporal_interpolation;
    mode.interpolate(state, now)?;

    let auxiliary = state.auxiliary().clone();
    post_processor.apply(state, &auxiliary)?;

    Ok(ProductOutcome::Assembled { regridded_frames })
}
