//! # ht-optimizer
//!
//! Dynamically Dimensioned Search (DDS) calibration driver for HydroTune.
//!
//! Provides the stochastic neighborhood-perturbation kernel, the calibration
//! target abstractions ([`Adjustable`], [`Evaluatable`]), single-target and
//! set-oriented search drivers ([`dds`], [`dds_set`]), and checkpointed
//! resume of interrupted runs.

mod calibration;
mod dds;
mod objective;
mod perturb;

pub use calibration::{Adjustable, CalibrationSet, CalibrationTarget, Evaluatable};
pub use dds::{
    dds, dds_set, DdsConfig, DdsReport, DdsSetReport, MemberReport, RunId, SearchState,
    DEFAULT_NEIGHBORHOOD_SIZE,
};
pub use objective::{Objective, ObjectiveDirection, SumSquaredError};
pub use perturb::{inclusion_probability, perturb, reflect_into_bounds};
