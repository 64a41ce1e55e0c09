//! Rule base: which membership function each rule reads from each input.
//!
//! The antecedent table has one row per rule and one column per input; the
//! firing strength of a rule is the product of the selected degrees.
//!
//! [`RuleGeneration::GridPair`] enumerates the grid over the first two
//! inputs only; inputs past the second always contribute function 0 to
//! every rule. That limits rule diversity on wide feature vectors, but it is
//! the behaviour trained artifacts depend on, so it stays the default.
//! [`RuleGeneration::FullTuple`] draws a function for every input instead.
//!
//! `GridPair` needs `n_rules <= n_functions²`. A larger rule count is
//! rejected at construction rather than padded with rules that read no
//! membership function and would fire at a constant strength of 1.

use std::collections::HashSet;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::membership::MembershipDegrees;
use super::FuzzyError;

/// Strategy used to build the antecedent table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RuleGeneration {
    /// Row-major grid over inputs 0 and 1; remaining inputs pinned to function 0.
    #[default]
    GridPair,
    /// Seeded random function tuples spanning every input.
    FullTuple { seed: u64 },
}

/// Antecedent table, `[n_rules, n_inputs]` membership-function indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBase {
    antecedents: Array2<usize>,
    generation: RuleGeneration,
}

/// Attempts per rule before accepting a duplicate tuple in full-tuple mode.
const MAX_TUPLE_DRAWS: usize = 64;

impl RuleBase {
    pub fn generate(
        generation: RuleGeneration,
        n_inputs: usize,
        n_rules: usize,
        n_functions: usize,
    ) -> Result<Self, FuzzyError> {
        if n_inputs == 0 {
            return Err(FuzzyError::invalid_shape("n_inputs", "must be at least 1"));
        }
        if n_rules == 0 {
            return Err(FuzzyError::invalid_shape("n_rules", "must be at least 1"));
        }
        if n_functions == 0 {
            return Err(FuzzyError::invalid_shape(
                "n_membership_functions",
                "must be at least 1",
            ));
        }

        let antecedents = match generation {
            RuleGeneration::GridPair => grid_pair(n_inputs, n_rules, n_functions)?,
            RuleGeneration::FullTuple { seed } => {
                full_tuple(seed, n_inputs, n_rules, n_functions)
            }
        };

        Ok(Self {
            antecedents,
            generation,
        })
    }

    /// Rebuild from a persisted table, checking indices against `n_functions`.
    pub fn from_table(
        antecedents: Array2<usize>,
        generation: RuleGeneration,
        n_functions: usize,
    ) -> Result<Self, FuzzyError> {
        if antecedents.nrows() == 0 || antecedents.ncols() == 0 {
            return Err(FuzzyError::invalid_shape("rules", "antecedent table is empty"));
        }
        if let Some(bad) = antecedents.iter().find(|&&j| j >= n_functions) {
            return Err(FuzzyError::invalid_shape(
                "rules",
                format!("function index {} exceeds {} functions", bad, n_functions),
            ));
        }
        Ok(Self {
            antecedents,
            generation,
        })
    }

    pub fn n_rules(&self) -> usize {
        self.antecedents.nrows()
    }

    pub fn n_inputs(&self) -> usize {
        self.antecedents.ncols()
    }

    pub fn generation(&self) -> RuleGeneration {
        self.generation
    }

    pub fn antecedents(&self) -> &Array2<usize> {
        &self.antecedents
    }

    /// Membership function rule `rule` reads from `input`.
    pub fn function_for(&self, rule: usize, input: usize) -> usize {
        self.antecedents[[rule, input]]
    }

    /// Firing strengths `[samples, n_rules]`, each in [0, 1].
    pub fn strengths(&self, degrees: &MembershipDegrees) -> Array2<f64> {
        let n_samples = degrees.first().map(|d| d.nrows()).unwrap_or(0);
        let mut strengths = Array2::ones((n_samples, self.n_rules()));

        for (input, input_degrees) in degrees.iter().enumerate() {
            for rule in 0..self.n_rules() {
                let function = self.antecedents[[rule, input]];
                let mut column = strengths.column_mut(rule);
                column *= &input_degrees.column(function);
            }
        }

        strengths
    }
}

fn grid_pair(
    n_inputs: usize,
    n_rules: usize,
    n_functions: usize,
) -> Result<Array2<usize>, FuzzyError> {
    let capacity = n_functions * n_functions;
    if n_rules > capacity {
        return Err(FuzzyError::invalid_shape(
            "n_rules",
            format!(
                "grid over {} functions holds at most {} rules, requested {}",
                n_functions, capacity, n_rules
            ),
        ));
    }

    Ok(Array2::from_shape_fn((n_rules, n_inputs), |(rule, input)| {
        match input {
            0 => rule / n_functions,
            1 => rule % n_functions,
            _ => 0,
        }
    }))
}

fn full_tuple(seed: u64, n_inputs: usize, n_rules: usize, n_functions: usize) -> Array2<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen: HashSet<Vec<usize>> = HashSet::with_capacity(n_rules);
    let mut antecedents = Array2::zeros((n_rules, n_inputs));

    for rule in 0..n_rules {
        let mut tuple = Vec::new();
        for _ in 0..MAX_TUPLE_DRAWS {
            tuple = (0..n_inputs).map(|_| rng.gen_range(0..n_functions)).collect();
            if !seen.contains(&tuple) {
                break;
            }
        }
        for (input, &function) in tuple.iter().enumerate() {
            antecedents[[rule, input]] = function;
        }
        seen.insert(tuple);
    }

    antecedents
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fuzzy::membership::MembershipSet;
    use ndarray::array;

    #[test]
    fn grid_pair_enumerates_first_two_inputs() {
        let rules = RuleBase::generate(RuleGeneration::GridPair, 4, 5, 3).unwrap();
        let expected = array![
            [0, 0, 0, 0],
            [0, 1, 0, 0],
            [0, 2, 0, 0],
            [1, 0, 0, 0],
            [1, 1, 0, 0]
        ];
        assert_eq!(rules.antecedents(), &expected);
    }

    #[test]
    fn grid_pair_single_input_uses_grid_row() {
        let rules = RuleBase::generate(RuleGeneration::GridPair, 1, 4, 2).unwrap();
        let column: Vec<usize> = rules.antecedents().column(0).to_vec();
        assert_eq!(column, vec![0, 0, 1, 1]);
    }

    #[test]
    fn grid_pair_rejects_too_many_rules() {
        let err = RuleBase::generate(RuleGeneration::GridPair, 2, 10, 3).unwrap_err();
        assert!(matches!(err, FuzzyError::InvalidShape { .. }));
    }

    #[test]
    fn full_tuple_is_seeded_and_distinct() {
        let a = RuleBase::generate(RuleGeneration::FullTuple { seed: 9 }, 6, 12, 3).unwrap();
        let b = RuleBase::generate(RuleGeneration::FullTuple { seed: 9 }, 6, 12, 3).unwrap();
        assert_eq!(a, b);

        let rows: HashSet<Vec<usize>> = a.antecedents().rows().into_iter().map(|r| r.to_vec()).collect();
        assert_eq!(rows.len(), 12);
        assert!(a.antecedents().column(4).iter().any(|&j| j != 0));
    }

    #[test]
    fn strengths_are_products_of_selected_degrees() {
        let membership = MembershipSet::grid(3, 2);
        let rules = RuleBase::generate(RuleGeneration::GridPair, 3, 4, 2).unwrap();
        let x = array![[0.2, 0.9, 0.4]];
        let degrees = membership.degrees(x.view());
        let strengths = rules.strengths(&degrees);

        let pinned = degrees[2][[0, 0]];
        let expected = degrees[0][[0, 1]] * degrees[1][[0, 0]] * pinned;
        assert!((strengths[[0, 2]] - expected).abs() < 1e-15);
        assert!(strengths.iter().all(|&s| (0.0..=1.0).contains(&s)));
    }
}
