//! Calibration targets: the perturbable, scoreable objects a search drives.

use std::path::Path;

use chrono::{DateTime, Utc};
use ht_data::{CalibrationCheckpoint, CheckpointStore, OutputReader};
use ht_types::{CalibrationError, CalibrationTable, HtResult, TimeSeries};
use tracing::{debug, info, warn};

use crate::objective::{Objective, ObjectiveDirection};

/// A calibration target's perturbable surface: identity plus the table of
/// bounds, sigmas, and per-iteration trial values.
pub trait Adjustable {
    fn id(&self) -> &str;
    fn table(&self) -> &CalibrationTable;
    fn table_mut(&mut self) -> &mut CalibrationTable;
}

/// A calibration target that can also be scored, track its best state, and
/// persist itself.
pub trait Evaluatable: Adjustable {
    fn observed(&self) -> &TimeSeries;

    /// Current model output, or `None` if the model has not run yet.
    fn simulated(&mut self) -> HtResult<Option<TimeSeries>>;

    fn objective(&self) -> &dyn Objective;

    fn direction(&self) -> ObjectiveDirection;

    /// Inclusive time range the score is computed over; `None` scores the
    /// full overlap.
    fn evaluation_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        None
    }

    fn best_score(&self) -> Option<f64>;

    /// Iteration column holding the best-known values.
    fn best_iteration(&self) -> u32;

    /// Record `score` for `iteration`, replacing best state only on
    /// improvement.
    fn update(&mut self, iteration: u32, score: f64);

    /// Archive the raw model output for `iteration`. Best-effort; never
    /// fails the run.
    fn save_output(&mut self, iteration: u32);

    fn check_point(&self, workdir: &Path) -> HtResult<()>;

    /// Load persisted state from `workdir`. Returns false when no
    /// checkpoint exists.
    fn restore(&mut self, workdir: &Path) -> HtResult<bool>;

    /// Score the current model output against observations.
    ///
    /// Joins the two series on shared timestamps; an empty overlap is the
    /// non-fatal degenerate case and yields NaN with a warning. When an
    /// evaluation range is set, the joined rows are restricted to it before
    /// the objective is applied.
    fn evaluate(&mut self, iteration: u32) -> HtResult<f64> {
        let simulated = self
            .simulated()?
            .ok_or(CalibrationError::MissingOutput)?;
        let mut joined = self.observed().inner_join(&simulated);
        if joined.is_empty() {
            warn!(
                id = self.id(),
                iteration, "observed and simulated series share no timestamps"
            );
            return Ok(f64::NAN);
        }
        if let Some((start, end)) = self.evaluation_range() {
            joined.retain(|(ts, _, _)| *ts >= start && *ts <= end);
        }
        let observed: Vec<f64> = joined.iter().map(|(_, obs, _)| *obs).collect();
        let simulated: Vec<f64> = joined.iter().map(|(_, _, sim)| *sim).collect();
        debug!(
            id = self.id(),
            iteration,
            rows = joined.len(),
            objective = self.objective().name(),
            "scoring model output"
        );
        Ok(self.objective().score(&observed, &simulated))
    }
}

/// A single calibration object: one table, one observed series, one output
/// stream, one objective.
pub struct CalibrationTarget {
    id: String,
    table: CalibrationTable,
    observed: TimeSeries,
    output: Box<dyn OutputReader>,
    objective: Box<dyn Objective>,
    direction: ObjectiveDirection,
    evaluation_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    best_score: Option<f64>,
    best_iteration: u32,
}

impl CalibrationTarget {
    pub fn new(
        id: impl Into<String>,
        table: CalibrationTable,
        observed: TimeSeries,
        output: Box<dyn OutputReader>,
        objective: Box<dyn Objective>,
    ) -> Self {
        Self {
            id: id.into(),
            table,
            observed,
            output,
            objective,
            direction: ObjectiveDirection::default(),
            evaluation_range: None,
            best_score: None,
            best_iteration: 0,
        }
    }

    pub fn with_direction(mut self, direction: ObjectiveDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_evaluation_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.evaluation_range = Some((start, end));
        self
    }
}

impl Adjustable for CalibrationTarget {
    fn id(&self) -> &str {
        &self.id
    }

    fn table(&self) -> &CalibrationTable {
        &self.table
    }

    fn table_mut(&mut self) -> &mut CalibrationTable {
        &mut self.table
    }
}

impl Evaluatable for CalibrationTarget {
    fn observed(&self) -> &TimeSeries {
        &self.observed
    }

    fn simulated(&mut self) -> HtResult<Option<TimeSeries>> {
        self.output.read()
    }

    fn objective(&self) -> &dyn Objective {
        self.objective.as_ref()
    }

    fn direction(&self) -> ObjectiveDirection {
        self.direction
    }

    fn evaluation_range(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.evaluation_range
    }

    fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    fn best_iteration(&self) -> u32 {
        self.best_iteration
    }

    fn update(&mut self, iteration: u32, score: f64) {
        if self.direction.improves(score, self.best_score) {
            info!(
                id = %self.id,
                iteration,
                score,
                previous = ?self.best_score,
                "new best score"
            );
            self.best_score = Some(score);
            self.best_iteration = iteration;
        }
    }

    fn save_output(&mut self, iteration: u32) {
        if let Err(e) = self.output.archive(iteration, &self.id) {
            warn!(id = %self.id, iteration, error = %e, "failed to archive model output");
        }
    }

    fn check_point(&self, workdir: &Path) -> HtResult<()> {
        let store = CheckpointStore::new(workdir)?;
        store.save_calibration(
            &self.id,
            &CalibrationCheckpoint {
                table: self.table.clone(),
                best_score: self.best_score,
                best_iteration: self.best_iteration,
            },
        )
    }

    fn restore(&mut self, workdir: &Path) -> HtResult<bool> {
        let store = CheckpointStore::new(workdir)?;
        match store.load_calibration(&self.id)? {
            Some(checkpoint) => {
                info!(
                    id = %self.id,
                    best_iteration = checkpoint.best_iteration,
                    "restored calibration state"
                );
                self.table = checkpoint.table;
                self.best_score = checkpoint.best_score;
                self.best_iteration = checkpoint.best_iteration;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Several calibration objects sharing one model execution per iteration
/// while perturbing, scoring, and checkpointing independently.
pub struct CalibrationSet {
    id: String,
    members: Vec<CalibrationTarget>,
}

impl CalibrationSet {
    pub fn new(id: impl Into<String>, members: Vec<CalibrationTarget>) -> HtResult<Self> {
        if members.is_empty() {
            return Err(ht_types::validation_error!(
                "calibration set requires at least one member"
            ));
        }
        Ok(Self {
            id: id.into(),
            members,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn members(&self) -> &[CalibrationTarget] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut [CalibrationTarget] {
        &mut self.members
    }

    /// True when any member still lacks model output.
    pub fn needs_baseline(&mut self) -> HtResult<bool> {
        for member in &mut self.members {
            if member.simulated()?.is_none() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
