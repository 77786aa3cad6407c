//! Tunable model parameter definitions.

use serde::{Deserialize, Serialize};

use crate::errors::HtResult;
use crate::validation_error;

/// A single tunable model parameter with its feasible range.
///
/// Immutable once constructed; `new` enforces `min <= init <= max` so a
/// parameter can never describe an infeasible starting point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name as the model's config knows it (e.g. "maxsmc").
    pub name: String,
    /// Lower feasible bound.
    pub min: f64,
    /// Upper feasible bound.
    pub max: f64,
    /// Initial (baseline) value, used to seed iteration 0.
    pub init: f64,
}

impl Parameter {
    pub fn new(name: impl Into<String>, min: f64, max: f64, init: f64) -> HtResult<Self> {
        let name = name.into();
        if !min.is_finite() || !max.is_finite() || !init.is_finite() {
            return Err(validation_error!(
                "parameter {name}: min/max/init must all be finite"
            ));
        }
        if min > max {
            return Err(validation_error!(
                "parameter {name}: min {min} exceeds max {max}"
            ));
        }
        if init < min || init > max {
            return Err(validation_error!(
                "parameter {name}: init {init} outside [{min}, {max}]"
            ));
        }
        Ok(Self {
            name,
            min,
            max,
            init,
        })
    }

    /// Width of the feasible range.
    pub fn range(&self) -> f64 {
        self.max - self.min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_parameter() {
        let p = Parameter::new("maxsmc", 0.2, 0.6, 0.439).unwrap();
        assert_eq!(p.name, "maxsmc");
        assert_eq!(p.range(), 0.6 - 0.2);
    }

    #[test]
    fn min_above_max_rejected() {
        assert!(Parameter::new("x", 1.0, 0.0, 0.5).is_err());
    }

    #[test]
    fn init_outside_bounds_rejected() {
        assert!(Parameter::new("x", 0.0, 1.0, 1.5).is_err());
        assert!(Parameter::new("x", 0.0, 1.0, -0.1).is_err());
    }

    #[test]
    fn boundary_init_accepted() {
        assert!(Parameter::new("x", 0.0, 1.0, 0.0).is_ok());
        assert!(Parameter::new("x", 0.0, 1.0, 1.0).is_ok());
    }

    #[test]
    fn non_finite_rejected() {
        assert!(Parameter::new("x", f64::NEG_INFINITY, 1.0, 0.5).is_err());
        assert!(Parameter::new("x", 0.0, 1.0, f64::NAN).is_err());
    }
}
