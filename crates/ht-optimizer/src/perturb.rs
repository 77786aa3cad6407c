//! The DDS neighborhood perturbation kernel.
//!
//! Pure functions of the table state and an injected random source, so the
//! stochastic step is unit-testable with a seeded generator.

use ht_types::{CalibrationError, CalibrationTable, HtResult};
use rand::Rng;
use rand_distr::StandardNormal;

/// Probability that a parameter is selected for perturbation at `iteration`
/// of a search with `total_iterations`: `1 - ln(i)/ln(n)`.
///
/// Strictly decreasing in `i`; 1 at the first iteration, 0 at the last, so
/// the search narrows from global exploration to single-parameter refinement.
pub fn inclusion_probability(iteration: u32, total_iterations: u32) -> f64 {
    1.0 - (iteration as f64).ln() / (total_iterations as f64).ln()
}

/// Reflect an out-of-bounds candidate back into `[min, max]`.
///
/// A single reflection pass is applied; if the reflected value overshoots
/// the opposite bound, the result clamps to the bound that was violated
/// first.
pub fn reflect_into_bounds(candidate: f64, min: f64, max: f64) -> f64 {
    if candidate < min {
        let reflected = min + (min - candidate);
        if reflected > max {
            min
        } else {
            reflected
        }
    } else if candidate > max {
        let reflected = max - (candidate - max);
        if reflected < min {
            max
        } else {
            reflected
        }
    } else {
        candidate
    }
}

/// Produce iteration `iteration`'s trial column by perturbing a random
/// neighborhood of the best-known values.
///
/// Each row is selected with probability `inclusion_probability`; an empty
/// selection is replaced by one uniformly chosen row so every iteration
/// moves at least one parameter. Unselected rows keep the best value.
pub fn perturb<R: Rng + ?Sized>(
    table: &mut CalibrationTable,
    iteration: u32,
    best_iteration: u32,
    inclusion_probability: f64,
    rng: &mut R,
) -> HtResult<()> {
    let count = table.len();
    let mut neighborhood: Vec<usize> = (0..count)
        .filter(|_| rng.gen::<f64>() < inclusion_probability)
        .collect();
    if neighborhood.is_empty() {
        neighborhood.push(rng.gen_range(0..count));
    }

    table.seed_from(iteration, best_iteration)?;
    let best: Vec<f64> = table
        .values(iteration)
        .ok_or(CalibrationError::UnknownIteration(iteration))?
        .to_vec();

    for &row in &neighborhood {
        let meta = &table.rows()[row];
        let (min, max, sigma) = (meta.min, meta.max, meta.sigma);
        let z: f64 = rng.sample(StandardNormal);
        let candidate = best[row] + sigma * z;
        table.set_value(iteration, row, reflect_into_bounds(candidate, min, max))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ht_types::Parameter;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn table(count: usize) -> CalibrationTable {
        let params: Vec<Parameter> = (0..count)
            .map(|i| Parameter::new(format!("p{i}"), 0.0, 10.0, 5.0).unwrap())
            .collect();
        let mut table = CalibrationTable::new("toy", &params).unwrap();
        table.apply_neighborhood_size(0.2).unwrap();
        table
    }

    #[test]
    fn single_reflection_off_upper_bound() {
        // best=5, sigma=2, z=3 -> candidate 11 -> reflected to 9
        assert_eq!(reflect_into_bounds(11.0, 0.0, 10.0), 9.0);
    }

    #[test]
    fn single_reflection_off_lower_bound() {
        assert_eq!(reflect_into_bounds(-1.0, 0.0, 10.0), 1.0);
    }

    #[test]
    fn double_overshoot_clamps_to_opposite_bound() {
        // best=5, sigma=2, z=20 -> candidate 45 -> reflects to -25 -> clamps to max
        assert_eq!(reflect_into_bounds(45.0, 0.0, 10.0), 10.0);
        assert_eq!(reflect_into_bounds(-45.0, 0.0, 10.0), 0.0);
    }

    #[test]
    fn in_bounds_candidate_is_untouched() {
        assert_eq!(reflect_into_bounds(7.5, 0.0, 10.0), 7.5);
        assert_eq!(reflect_into_bounds(0.0, 0.0, 10.0), 0.0);
        assert_eq!(reflect_into_bounds(10.0, 0.0, 10.0), 10.0);
    }

    #[test]
    fn first_iteration_probability_is_one() {
        assert_eq!(inclusion_probability(1, 50), 1.0);
    }

    #[test]
    fn last_iteration_probability_is_zero() {
        assert!(inclusion_probability(50, 50).abs() < 1e-12);
    }

    #[test]
    fn probability_strictly_decreases() {
        let n = 40;
        for i in 1..n {
            assert!(
                inclusion_probability(i, n) > inclusion_probability(i + 1, n),
                "p_{i} should exceed p_{}",
                i + 1
            );
        }
    }

    #[test]
    fn zero_probability_still_perturbs_one_parameter() {
        let mut table = table(5);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        perturb(&mut table, 1, 0, 0.0, &mut rng).unwrap();

        let baseline = table.values(0).unwrap().to_vec();
        let trial = table.values(1).unwrap();
        let changed = trial
            .iter()
            .zip(&baseline)
            .filter(|(t, b)| t != b)
            .count();
        assert_eq!(changed, 1);
    }

    #[test]
    fn full_probability_perturbs_every_parameter() {
        let mut table = table(5);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        perturb(&mut table, 1, 0, 1.0, &mut rng).unwrap();

        let baseline = table.values(0).unwrap().to_vec();
        let trial = table.values(1).unwrap();
        // With sigma = 2 a standard-normal draw of exactly 0 has zero
        // probability, so every value moves.
        assert!(trial.iter().zip(&baseline).all(|(t, b)| t != b));
    }

    #[test]
    fn perturbed_values_stay_in_bounds() {
        let mut table = table(4);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for i in 1..=200 {
            perturb(&mut table, i, 0, 0.5, &mut rng).unwrap();
            for (row, value) in table.rows().iter().zip(table.values(i).unwrap()) {
                assert!(*value >= row.min && *value <= row.max);
            }
        }
    }

    #[test]
    fn unselected_rows_keep_best_values() {
        let mut table = table(6);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        perturb(&mut table, 1, 0, 0.0, &mut rng).unwrap();

        let baseline = table.values(0).unwrap().to_vec();
        let trial = table.values(1).unwrap();
        let unchanged = trial
            .iter()
            .zip(&baseline)
            .filter(|(t, b)| t == b)
            .count();
        assert_eq!(unchanged, 5);
    }

    #[test]
    fn same_seed_reproduces_the_column() {
        let mut left = table(3);
        let mut right = left.clone();
        let mut rng_left = ChaCha8Rng::seed_from_u64(9);
        let mut rng_right = ChaCha8Rng::seed_from_u64(9);

        perturb(&mut left, 1, 0, 0.5, &mut rng_left).unwrap();
        perturb(&mut right, 1, 0, 0.5, &mut rng_right).unwrap();
        assert_eq!(left.values(1), right.values(1));
    }
}
