//! Demand/head time patterns.

/// A repeating multiplier pattern, sampled with a fixed step.
///
/// The pattern period (in seconds) is `multipliers.len() * pattern_step`;
/// sampling wraps modulo the pattern length.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub multipliers: Vec<f64>,
}

impl Pattern {
    pub fn new(multipliers: Vec<f64>) -> Self {
        Self { multipliers }
    }

    /// Sample the multiplier active at simulation time `t_s`, given the
    /// global pattern step `pattern_step_s`.
    ///
    /// A pattern with no entries is treated as a constant multiplier of 1.0
    /// (no pattern effect), matching EPANET's default-pattern convention.
    pub fn sample(&self, t_s: f64, pattern_step_s: f64) -> f64 {
        if self.multipliers.is_empty() || pattern_step_s <= 0.0 {
            return 1.0;
        }
        let idx = (t_s / pattern_step_s).floor() as i64;
        let n = self.multipliers.len() as i64;
        let wrapped = idx.rem_euclid(n) as usize;
        self.multipliers[wrapped]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_wraps_around_period() {
        let p = Pattern::new(vec![1.0, 0.5, 2.0]);
        assert_eq!(p.sample(0.0, 3600.0), 1.0);
        assert_eq!(p.sample(3600.0, 3600.0), 0.5);
        assert_eq!(p.sample(7200.0, 3600.0), 2.0);
        assert_eq!(p.sample(10800.0, 3600.0), 1.0);
        assert_eq!(p.sample(14400.0, 3600.0), 0.5);
    }

    #[test]
    fn empty_pattern_is_identity() {
        let p = Pattern::new(vec![]);
        assert_eq!(p.sample(12345.0, 3600.0), 1.0);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn sample_matches_one_period_later(
            multipliers in prop::collection::vec(0.0_f64..10.0_f64, 1..20),
            t_s in 0.0_f64..1e6_f64,
            step in 1.0_f64..7200.0_f64,
        ) {
            let p = Pattern::new(multipliers.clone());
            let period = multipliers.len() as f64 * step;
            prop_assert_eq!(p.sample(t_s, step), p.sample(t_s + period, step));
        }

        #[test]
        fn sample_is_always_one_of_the_multipliers(
            multipliers in prop::collection::vec(0.0_f64..10.0_f64, 1..20),
            t_s in 0.0_f64..1e6_f64,
            step in 1.0_f64..7200.0_f64,
        ) {
            let p = Pattern::new(multipliers.clone());
            let sampled = p.sample(t_s, step);
            prop_assert!(multipliers.iter().any(|m| *m == sampled));
        }
    }
}
