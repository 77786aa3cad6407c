//! The calibration table: static parameter metadata plus the full history of
//! trial values, one fixed-shape column per iteration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{CalibrationError, HtResult};
use crate::parameter::Parameter;
use crate::validation_error;

/// Static per-parameter metadata carried by a [`CalibrationTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRow {
    pub name: String,
    /// Target model section this parameter belongs to in the native config.
    pub model: String,
    pub min: f64,
    pub max: f64,
    /// Perturbation scale, `neighborhood_size * (max - min)`. Zero until the
    /// driver applies a neighborhood size.
    pub sigma: f64,
}

/// One row of the config-write contract: the value to assign to a named
/// parameter of a target model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamUpdate {
    pub name: String,
    pub value: f64,
    pub model: String,
}

/// Row-ordered table of parameter bounds and per-iteration trial values.
///
/// Iteration columns are keyed by integer index; column 0 holds the initial
/// (baseline) values. Columns are never removed, so the table doubles as the
/// audit trail of a search. Every stored value is checked against the row's
/// `[min, max]` on insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationTable {
    rows: Vec<ParameterRow>,
    iterations: BTreeMap<u32, Vec<f64>>,
}

impl CalibrationTable {
    /// Build a table for `params`, all targeting the config section `model`,
    /// with iteration 0 seeded from each parameter's `init`.
    pub fn new(model: impl Into<String>, params: &[Parameter]) -> HtResult<Self> {
        if params.is_empty() {
            return Err(validation_error!(
                "calibration table requires at least one parameter"
            ));
        }
        let model = model.into();
        let rows = params
            .iter()
            .map(|p| ParameterRow {
                name: p.name.clone(),
                model: model.clone(),
                min: p.min,
                max: p.max,
                sigma: 0.0,
            })
            .collect();
        let mut table = Self {
            rows,
            iterations: BTreeMap::new(),
        };
        table.insert_iteration(0, params.iter().map(|p| p.init).collect())?;
        Ok(table)
    }

    pub fn rows(&self) -> &[ParameterRow] {
        &self.rows
    }

    /// Number of parameters (rows).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Recompute `sigma` for every row from the given neighborhood size.
    pub fn apply_neighborhood_size(&mut self, neighborhood_size: f64) -> HtResult<()> {
        if !(neighborhood_size > 0.0 && neighborhood_size <= 1.0) {
            return Err(validation_error!(
                "neighborhood size must be in (0, 1], got {neighborhood_size}"
            ));
        }
        for row in &mut self.rows {
            row.sigma = neighborhood_size * (row.max - row.min);
        }
        Ok(())
    }

    /// Values stored for `iteration`, aligned with `rows()`.
    pub fn values(&self, iteration: u32) -> Option<&[f64]> {
        self.iterations.get(&iteration).map(|v| v.as_slice())
    }

    /// Highest iteration index present in the table.
    pub fn latest_iteration(&self) -> Option<u32> {
        self.iterations.keys().next_back().copied()
    }

    /// Store a full value column for `iteration`, replacing any existing one.
    pub fn insert_iteration(&mut self, iteration: u32, values: Vec<f64>) -> HtResult<()> {
        if values.len() != self.rows.len() {
            return Err(CalibrationError::ShapeMismatch {
                expected: self.rows.len(),
                actual: values.len(),
            }
            .into());
        }
        for (row, value) in self.rows.iter().zip(&values) {
            Self::check_bounds(row, *value)?;
        }
        self.iterations.insert(iteration, values);
        Ok(())
    }

    /// Seed `iteration`'s column with a copy of `source`'s values.
    pub fn seed_from(&mut self, iteration: u32, source: u32) -> HtResult<()> {
        let values = self
            .iterations
            .get(&source)
            .ok_or(CalibrationError::UnknownIteration(source))?
            .clone();
        self.iterations.insert(iteration, values);
        Ok(())
    }

    /// Overwrite a single value in `iteration`'s column.
    pub fn set_value(&mut self, iteration: u32, row: usize, value: f64) -> HtResult<()> {
        let meta = self
            .rows
            .get(row)
            .ok_or_else(|| CalibrationError::UnknownParameter(format!("row index {row}")))?
            .clone();
        Self::check_bounds(&meta, value)?;
        let column = self
            .iterations
            .get_mut(&iteration)
            .ok_or(CalibrationError::UnknownIteration(iteration))?;
        column[row] = value;
        Ok(())
    }

    /// The `{value, parameter_name, target_model}` slice handed to
    /// `Agent::update_config` for one iteration.
    pub fn slice(&self, iteration: u32) -> HtResult<Vec<ParamUpdate>> {
        let values = self
            .iterations
            .get(&iteration)
            .ok_or(CalibrationError::UnknownIteration(iteration))?;
        Ok(self
            .rows
            .iter()
            .zip(values)
            .map(|(row, value)| ParamUpdate {
                name: row.name.clone(),
                value: *value,
                model: row.model.clone(),
            })
            .collect())
    }

    fn check_bounds(row: &ParameterRow, value: f64) -> Result<(), CalibrationError> {
        if !value.is_finite() || value < row.min || value > row.max {
            return Err(CalibrationError::OutOfBounds {
                name: row.name.clone(),
                value,
                min: row.min,
                max: row.max,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> CalibrationTable {
        let params = vec![
            Parameter::new("maxsmc", 0.2, 0.6, 0.439).unwrap(),
            Parameter::new("satdk", 0.0, 0.001, 0.00034).unwrap(),
        ];
        CalibrationTable::new("cfe", &params).unwrap()
    }

    #[test]
    fn iteration_zero_seeded_from_init() {
        let table = sample_table();
        assert_eq!(table.values(0), Some(&[0.439, 0.00034][..]));
        assert_eq!(table.latest_iteration(), Some(0));
    }

    #[test]
    fn empty_parameter_list_rejected() {
        assert!(CalibrationTable::new("cfe", &[]).is_err());
    }

    #[test]
    fn sigma_follows_neighborhood_size() {
        let mut table = sample_table();
        table.apply_neighborhood_size(0.2).unwrap();
        let sigmas: Vec<f64> = table.rows().iter().map(|r| r.sigma).collect();
        assert!((sigmas[0] - 0.2 * 0.4).abs() < 1e-12);
        assert!((sigmas[1] - 0.2 * 0.001).abs() < 1e-12);
    }

    #[test]
    fn invalid_neighborhood_size_rejected() {
        let mut table = sample_table();
        assert!(table.apply_neighborhood_size(0.0).is_err());
        assert!(table.apply_neighborhood_size(1.5).is_err());
    }

    #[test]
    fn seed_and_set_value() {
        let mut table = sample_table();
        table.seed_from(1, 0).unwrap();
        table.set_value(1, 0, 0.5).unwrap();
        assert_eq!(table.values(1), Some(&[0.5, 0.00034][..]));
        // Source column untouched
        assert_eq!(table.values(0), Some(&[0.439, 0.00034][..]));
    }

    #[test]
    fn out_of_bounds_value_rejected() {
        let mut table = sample_table();
        table.seed_from(1, 0).unwrap();
        assert!(table.set_value(1, 0, 0.7).is_err());
        assert!(table.insert_iteration(2, vec![0.439, 0.002]).is_err());
    }

    #[test]
    fn shape_mismatch_rejected() {
        let mut table = sample_table();
        assert!(table.insert_iteration(1, vec![0.439]).is_err());
    }

    #[test]
    fn seed_from_unknown_iteration_fails() {
        let mut table = sample_table();
        assert!(table.seed_from(2, 7).is_err());
    }

    #[test]
    fn slice_carries_name_value_model() {
        let table = sample_table();
        let slice = table.slice(0).unwrap();
        assert_eq!(slice.len(), 2);
        assert_eq!(slice[0].name, "maxsmc");
        assert_eq!(slice[0].value, 0.439);
        assert_eq!(slice[0].model, "cfe");
    }

    #[test]
    fn table_serde_round_trip() {
        let mut table = sample_table();
        table.apply_neighborhood_size(0.2).unwrap();
        table.seed_from(1, 0).unwrap();
        let json = serde_json::to_string(&table).unwrap();
        let back: CalibrationTable = serde_json::from_str(&json).unwrap();
        assert_eq!(table, back);
    }
}
