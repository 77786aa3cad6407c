//! The Dynamically Dimensioned Search driver.
//!
//! Orchestrates the per-iteration loop: perturb a candidate, materialize it
//! into the model config, execute the model, score the output, and
//! checkpoint. `dds` drives a single calibration target; `dds_set` drives a
//! set of targets sharing one model execution per iteration.

use ht_agent::{Agent, WorkdirGuard};
use ht_data::{CheckpointStore, SearchCheckpoint};
use ht_types::{config_error, HtResult};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calibration::{Adjustable, CalibrationSet, Evaluatable};
use crate::perturb::{inclusion_probability, perturb};

/// Fraction of a parameter's bound range used as its perturbation scale.
pub const DEFAULT_NEIGHBORHOOD_SIZE: f64 = 0.2;

/// Unique search run identifier.
pub type RunId = Uuid;

/// Configuration for one DDS run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DdsConfig {
    pub run_id: RunId,

    /// Total iterations of the search (the probability schedule's `n`).
    pub iterations: u32,

    /// 0 starts a fresh search including the baseline; `k > 0` resumes at
    /// iteration `k` from the checkpoints in the job workdir.
    pub start_iteration: u32,

    /// Single neighborhood size shared by `dds` and `dds_set`.
    pub neighborhood_size: f64,

    /// Seed for the search's RNG stream when starting fresh.
    pub seed: u64,
}

impl DdsConfig {
    pub fn new(iterations: u32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            iterations,
            start_iteration: 0,
            neighborhood_size: DEFAULT_NEIGHBORHOOD_SIZE,
            seed: 0,
        }
    }

    pub fn with_start_iteration(mut self, start_iteration: u32) -> Self {
        self.start_iteration = start_iteration;
        self
    }

    pub fn with_neighborhood_size(mut self, neighborhood_size: f64) -> Self {
        self.neighborhood_size = neighborhood_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject impossible iteration setups before anything executes.
    pub fn validate(&self) -> HtResult<()> {
        if self.iterations < 2 {
            return Err(config_error!(
                "iterations must be >= 2, got {}",
                self.iterations
            ));
        }
        if self.start_iteration > self.iterations {
            return Err(config_error!(
                "start_iteration {} exceeds iterations {}",
                self.start_iteration,
                self.iterations
            ));
        }
        Ok(())
    }
}

/// Lifecycle state of a search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchState {
    Init,
    Baseline,
    Iterating,
    Done,
}

/// Outcome of a single-target search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DdsReport {
    pub run_id: RunId,
    pub state: SearchState,
    pub best_score: Option<f64>,
    pub best_iteration: u32,
    /// `(iteration, score)` for every iteration evaluated in this run,
    /// including the baseline when one was produced.
    pub scores: Vec<(u32, f64)>,
}

/// Per-member outcome of a set search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberReport {
    pub id: String,
    pub best_score: Option<f64>,
    pub best_iteration: u32,
    pub scores: Vec<(u32, f64)>,
}

/// Outcome of a set search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DdsSetReport {
    pub run_id: RunId,
    pub state: SearchState,
    pub members: Vec<MemberReport>,
}

/// Run a DDS search over a single calibration target.
pub fn dds<E, A>(config: &DdsConfig, calibration: &mut E, agent: &mut A) -> HtResult<DdsReport>
where
    E: Evaluatable,
    A: Agent,
{
    config.validate()?;
    let mut state = SearchState::Init;
    info!(
        run_id = %config.run_id,
        id = calibration.id(),
        iterations = config.iterations,
        start_iteration = config.start_iteration,
        ?state,
        "starting DDS search"
    );

    let store = CheckpointStore::new(agent.workdir())?;
    let mut rng = resume_rng(&store, config)?;
    let mut start = config.start_iteration;

    if start > 0 && !calibration.restore(agent.workdir())? {
        return Err(config_error!(
            "resume from iteration {} requested but no checkpoint exists for `{}`",
            start,
            calibration.id()
        ));
    }
    calibration
        .table_mut()
        .apply_neighborhood_size(config.neighborhood_size)?;

    let init = start.saturating_sub(1);
    let slice = calibration.table().slice(init)?;
    agent.update_config(init, &slice, calibration.id())?;

    let mut scores = Vec::new();
    if start == 0 {
        state = SearchState::Baseline;
        debug!(?state, "producing baseline simulation");
        if calibration.simulated()?.is_none() {
            info!(cmd = agent.command(), "running model for the baseline");
            agent.execute()?;
        }
        let score = {
            let _guard = WorkdirGuard::enter(agent.workdir())?;
            evaluate_step(0, calibration)?
        };
        scores.push((0, score));
        check_point_run(calibration, &store, 0, &rng)?;
        start = 1;
    }

    state = SearchState::Iterating;
    for i in start..=config.iterations {
        let p = inclusion_probability(i, config.iterations);
        debug!(iteration = i, inclusion_probability = p, ?state, "perturbing");
        let best = calibration.best_iteration();
        perturb(calibration.table_mut(), i, best, p, &mut rng)?;

        let slice = calibration.table().slice(i)?;
        agent.update_config(i, &slice, calibration.id())?;
        info!(cmd = agent.command(), iteration = i, "running model");
        agent.execute()?;

        let score = {
            let _guard = WorkdirGuard::enter(agent.workdir())?;
            evaluate_step(i, calibration)?
        };
        scores.push((i, score));
        check_point_run(calibration, &store, i, &rng)?;
    }

    state = SearchState::Done;
    info!(
        run_id = %config.run_id,
        best_score = ?calibration.best_score(),
        best_iteration = calibration.best_iteration(),
        ?state,
        "search finished"
    );
    Ok(DdsReport {
        run_id: config.run_id,
        state,
        best_score: calibration.best_score(),
        best_iteration: calibration.best_iteration(),
        scores,
    })
}

/// Run a DDS search over a calibration set: every member is perturbed and
/// scored each iteration, the model executes exactly once per iteration.
pub fn dds_set<A>(config: &DdsConfig, set: &mut CalibrationSet, agent: &mut A) -> HtResult<DdsSetReport>
where
    A: Agent,
{
    config.validate()?;
    let mut state = SearchState::Init;
    info!(
        run_id = %config.run_id,
        id = set.id(),
        members = set.members().len(),
        iterations = config.iterations,
        start_iteration = config.start_iteration,
        ?state,
        "starting DDS set search"
    );

    let store = CheckpointStore::new(agent.workdir())?;
    let mut rng = resume_rng(&store, config)?;
    let mut start = config.start_iteration;
    let init = start.saturating_sub(1);
    let workdir = agent.workdir().to_path_buf();

    for member in set.members_mut() {
        if start > 0 && !member.restore(&workdir)? {
            return Err(config_error!(
                "resume from iteration {} requested but no checkpoint exists for `{}`",
                start,
                member.id()
            ));
        }
        member
            .table_mut()
            .apply_neighborhood_size(config.neighborhood_size)?;
    }
    for member in set.members() {
        let slice = member.table().slice(init)?;
        agent.update_config(init, &slice, member.id())?;
    }

    let mut histories: Vec<Vec<(u32, f64)>> = vec![Vec::new(); set.members().len()];
    if start == 0 {
        state = SearchState::Baseline;
        debug!(?state, "producing baseline simulation");
        if set.needs_baseline()? {
            info!(cmd = agent.command(), "running model for the baseline");
            agent.execute()?;
        }
        {
            let _guard = WorkdirGuard::enter(&workdir)?;
            for (member, history) in set.members_mut().iter_mut().zip(histories.iter_mut()) {
                let score = evaluate_step(0, member)?;
                history.push((0, score));
            }
        }
        for member in set.members() {
            member.check_point(&workdir)?;
        }
        store.save_search(&SearchCheckpoint {
            completed_iteration: 0,
            rng: rng.clone(),
        })?;
        start = 1;
    }

    state = SearchState::Iterating;
    for i in start..=config.iterations {
        let p = inclusion_probability(i, config.iterations);
        debug!(iteration = i, inclusion_probability = p, ?state, "perturbing set");
        for member in set.members_mut() {
            let best = member.best_iteration();
            perturb(member.table_mut(), i, best, p, &mut rng)?;
        }
        for member in set.members() {
            let slice = member.table().slice(i)?;
            agent.update_config(i, &slice, member.id())?;
        }
        info!(cmd = agent.command(), iteration = i, "running model");
        agent.execute()?;

        {
            let _guard = WorkdirGuard::enter(&workdir)?;
            for (member, history) in set.members_mut().iter_mut().zip(histories.iter_mut()) {
                let score = evaluate_step(i, member)?;
                history.push((i, score));
            }
        }
        for member in set.members() {
            member.check_point(&workdir)?;
        }
        store.save_search(&SearchCheckpoint {
            completed_iteration: i,
            rng: rng.clone(),
        })?;
    }

    state = SearchState::Done;
    let members = set
        .members()
        .iter()
        .zip(histories)
        .map(|(member, scores)| MemberReport {
            id: member.id().to_string(),
            best_score: member.best_score(),
            best_iteration: member.best_iteration(),
            scores,
        })
        .collect();
    info!(run_id = %config.run_id, ?state, "set search finished");
    Ok(DdsSetReport {
        run_id: config.run_id,
        state,
        members,
    })
}

/// Score one iteration and fold the result into the target's state.
fn evaluate_step<E: Evaluatable>(iteration: u32, calibration: &mut E) -> HtResult<f64> {
    let score = calibration.evaluate(iteration)?;
    calibration.save_output(iteration);
    calibration.update(iteration, score);
    info!(
        id = calibration.id(),
        iteration,
        score,
        best_score = ?calibration.best_score(),
        best_iteration = calibration.best_iteration(),
        "iteration evaluated"
    );
    Ok(score)
}

fn check_point_run<E: Evaluatable>(
    calibration: &mut E,
    store: &CheckpointStore,
    completed_iteration: u32,
    rng: &ChaCha8Rng,
) -> HtResult<()> {
    calibration.check_point(store.workdir())?;
    store.save_search(&SearchCheckpoint {
        completed_iteration,
        rng: rng.clone(),
    })
}

/// The RNG stream for this run: fresh from the seed on a new search,
/// restored from the search checkpoint on resume.
fn resume_rng(store: &CheckpointStore, config: &DdsConfig) -> HtResult<ChaCha8Rng> {
    if config.start_iteration == 0 {
        return Ok(ChaCha8Rng::seed_from_u64(config.seed));
    }
    match store.load_search()? {
        Some(checkpoint) => {
            if checkpoint.completed_iteration + 1 != config.start_iteration {
                return Err(config_error!(
                    "search checkpoint is at iteration {} but start_iteration is {}",
                    checkpoint.completed_iteration,
                    config.start_iteration
                ));
            }
            Ok(checkpoint.rng)
        }
        None => {
            warn!("no search checkpoint found; random draws will not replay the interrupted run");
            Ok(ChaCha8Rng::seed_from_u64(config.seed))
        }
    }
}
