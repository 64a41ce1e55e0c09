//! The active-learning state machine.
//!
//! ```text
//! Init -> Train -> Evaluate -> SelectUncertain
//!      -> (Synthesize -> AugmentPool -> Retrain -> Evaluate -> SelectUncertain)*
//!      -> Stopped
//! ```
//!
//! The loop stops as soon as no validation sample is uncertain, or after
//! `max_iterations` trainings. No synthesis happens on the final iteration
//! since nothing would be trained on the result.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::generator::{SyntheticGenerator, SyntheticSample};
use super::uncertainty::{allocate, plan_targets, select_uncertain, TargetPolicy};
use super::ActiveLearningError;
use crate::data::{LabelMapping, LabeledSet};
use crate::ensemble::{normalize_rows, EnsembleConfig, OneVsAllEnsemble};
use crate::logging::RunLogger;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveLearningConfig {
    /// Samples with confidence below this are uncertain.
    pub confidence_threshold: f64,
    pub max_iterations: usize,
    /// Synthetic samples requested per iteration, split across targets.
    pub samples_per_iteration: usize,
    /// The majority / reference class.
    pub healthy_class: String,
    /// Requested when a defect is predicted healthy.
    pub false_negative_targets: Vec<String>,
    /// Requested for predictions within `low_confidence_margin` of 0.5.
    pub low_confidence_targets: Vec<String>,
    pub low_confidence_margin: f64,
    /// Seed handed to the generator.
    pub seed: u64,
}

impl Default for ActiveLearningConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            max_iterations: 10,
            samples_per_iteration: 50,
            healthy_class: "healthy".to_string(),
            false_negative_targets: vec!["anthracnose".into(), "blight".into(), "rot".into()],
            low_confidence_targets: vec!["sunscald".into(), "mildew".into(), "insect".into()],
            low_confidence_margin: 0.2,
            seed: 42,
        }
    }
}

impl ActiveLearningConfig {
    pub fn validate(&self) -> Result<(), ActiveLearningError> {
        if !(self.confidence_threshold > 0.0 && self.confidence_threshold <= 1.0) {
            return Err(ActiveLearningError::InvalidConfig(format!(
                "confidence_threshold must lie in (0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.max_iterations == 0 {
            return Err(ActiveLearningError::InvalidConfig(
                "max_iterations must be at least 1".into(),
            ));
        }
        if self.samples_per_iteration == 0 {
            return Err(ActiveLearningError::InvalidConfig(
                "samples_per_iteration must be at least 1".into(),
            ));
        }
        if !(0.0..=0.5).contains(&self.low_confidence_margin) {
            return Err(ActiveLearningError::InvalidConfig(format!(
                "low_confidence_margin must lie in [0, 0.5], got {}",
                self.low_confidence_margin
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActiveLearningPhase {
    Init,
    Train,
    Evaluate,
    SelectUncertain,
    Synthesize,
    AugmentPool,
    Retrain,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    NoUncertainSamples,
    MaxIterations,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: usize,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub weighted_f1: f64,
    /// Pool size the iteration's ensemble was trained on.
    pub pool_size: usize,
    pub uncertain_count: usize,
    pub requested: usize,
    pub generated: usize,
    pub failed_classes: Vec<String>,
    /// Best macro-F1 seen up to and including this iteration.
    pub best_macro_f1: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveLearningSummary {
    pub iterations_run: usize,
    pub initial_pool_size: usize,
    pub final_pool_size: usize,
    pub total_uncertain: usize,
    pub total_requested: usize,
    pub total_generated: usize,
    pub total_failures: usize,
    pub initial_macro_f1: f64,
    pub final_macro_f1: f64,
    /// Last iteration's macro-F1 minus the first's.
    pub f1_improvement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveLearningReport {
    pub iterations: Vec<IterationRecord>,
    pub phases: Vec<ActiveLearningPhase>,
    pub best_iteration: usize,
    pub best_macro_f1: f64,
    pub stop_reason: StopReason,
    pub summary: ActiveLearningSummary,
}

impl ActiveLearningReport {
    /// Best-so-far macro-F1 after each iteration.
    pub fn best_f1_trace(&self) -> Vec<f64> {
        self.iterations.iter().map(|r| r.best_macro_f1).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ActiveLearningOutcome {
    /// Ensemble with the highest validation macro-F1.
    pub best: OneVsAllEnsemble,
    pub report: ActiveLearningReport,
    /// Final pool, synthetic rows appended after the originals.
    pub pool: LabeledSet,
    pub synthetic: Vec<SyntheticSample>,
}

struct Best {
    ensemble: OneVsAllEnsemble,
    macro_f1: f64,
    iteration: usize,
}

pub struct ActiveLearner {
    config: ActiveLearningConfig,
    ensemble: EnsembleConfig,
    logger: Option<RunLogger>,
}

impl ActiveLearner {
    pub fn new(config: ActiveLearningConfig, ensemble: EnsembleConfig) -> Self {
        Self {
            config,
            ensemble,
            logger: None,
        }
    }

    /// Append per-iteration and per-epoch records under the logger's directory.
    pub fn with_run_logger(mut self, logger: RunLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn config(&self) -> &ActiveLearningConfig {
        &self.config
    }

    pub fn run(
        &self,
        labels: &LabelMapping,
        initial_pool: LabeledSet,
        validation: &LabeledSet,
        generator: &mut dyn SyntheticGenerator,
    ) -> Result<ActiveLearningOutcome, ActiveLearningError> {
        self.config.validate()?;
        let policy = TargetPolicy::resolve(&self.config, labels)?;
        if initial_pool.is_empty() {
            return Err(ActiveLearningError::EmptyPool);
        }
        if validation.is_empty() {
            return Err(ActiveLearningError::EmptyValidationSet);
        }

        let n_features = initial_pool.n_features();
        let initial_pool_size = initial_pool.len();
        let mut pool = initial_pool;
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut phases = vec![ActiveLearningPhase::Init];
        let mut records: Vec<IterationRecord> = Vec::new();
        let mut synthetic: Vec<SyntheticSample> = Vec::new();
        let mut best: Option<Best> = None;
        let mut stop_reason = StopReason::MaxIterations;

        for iteration in 0..self.config.max_iterations {
            phases.push(if iteration == 0 {
                ActiveLearningPhase::Train
            } else {
                ActiveLearningPhase::Retrain
            });
            let ensemble = OneVsAllEnsemble::train(&self.ensemble, labels, &pool, validation)?;
            self.log_histories(iteration, &ensemble);

            phases.push(ActiveLearningPhase::Evaluate);
            let metrics = ensemble.evaluate(validation.features.view(), validation.labels.view())?;
            let macro_f1 = metrics.macro_f1();

            phases.push(ActiveLearningPhase::SelectUncertain);
            let raw = ensemble.raw_scores(validation.features.view())?;
            let probs = normalize_rows(&raw, ensemble.normalization());
            let uncertain = select_uncertain(
                &probs,
                &raw,
                validation.labels.view(),
                self.config.confidence_threshold,
            );

            let improved = best.as_ref().map_or(true, |b| macro_f1 > b.macro_f1);
            if improved {
                best = Some(Best {
                    ensemble,
                    macro_f1,
                    iteration,
                });
            }
            let best_macro_f1 = best.as_ref().map_or(macro_f1, |b| b.macro_f1);

            info!(
                iteration,
                accuracy = metrics.accuracy,
                macro_f1,
                pool_size = pool.len(),
                uncertain = uncertain.len(),
                improved,
                "active learning iteration"
            );

            let mut record = IterationRecord {
                iteration,
                accuracy: metrics.accuracy,
                macro_f1,
                weighted_f1: metrics.weighted_f1(),
                pool_size: pool.len(),
                uncertain_count: uncertain.len(),
                requested: 0,
                generated: 0,
                failed_classes: Vec::new(),
                best_macro_f1,
            };

            if uncertain.is_empty() {
                stop_reason = StopReason::NoUncertainSamples;
                self.finish_iteration(&mut records, record);
                break;
            }
            if iteration + 1 == self.config.max_iterations {
                self.finish_iteration(&mut records, record);
                break;
            }

            phases.push(ActiveLearningPhase::Synthesize);
            let targets = plan_targets(&uncertain, &policy);
            let mut rows = Vec::new();
            for (class, count) in allocate(&targets, self.config.samples_per_iteration) {
                let name = labels.name_of(class).unwrap_or_default();
                record.requested += count;
                match generator.generate(class, name, count, &mut rng) {
                    Ok(generated) if generated.iter().all(|row| row.len() == n_features) => {
                        debug!(class = %name, generated = generated.len(), "synthetic samples received");
                        for row in generated {
                            synthetic.push(SyntheticSample::new(class, row.clone()));
                            rows.push((row, class));
                        }
                    }
                    Ok(_) => {
                        warn!(class = %name, expected = n_features, "generator returned rows of the wrong width, skipping");
                        record.failed_classes.push(name.to_string());
                    }
                    Err(err) => {
                        warn!(class = %name, error = %err, "synthetic generation failed, continuing");
                        record.failed_classes.push(name.to_string());
                    }
                }
            }

            phases.push(ActiveLearningPhase::AugmentPool);
            let batch = LabeledSet::from_rows(n_features, &rows)?;
            record.generated = batch.len();
            if record.generated < record.requested {
                warn!(
                    requested = record.requested,
                    generated = record.generated,
                    "synthetic shortfall"
                );
            }
            pool.extend(&batch)?;
            self.finish_iteration(&mut records, record);
        }

        phases.push(ActiveLearningPhase::Stopped);

        let best = best.ok_or_else(|| {
            ActiveLearningError::InvalidConfig("no iteration completed".into())
        })?;
        let summary = summarize(&records, initial_pool_size, pool.len());
        info!(
            iterations = summary.iterations_run,
            best_iteration = best.iteration,
            best_macro_f1 = best.macro_f1,
            f1_improvement = summary.f1_improvement,
            stop_reason = ?stop_reason,
            "active learning finished"
        );

        let report = ActiveLearningReport {
            iterations: records,
            phases,
            best_iteration: best.iteration,
            best_macro_f1: best.macro_f1,
            stop_reason,
            summary,
        };
        if let Some(logger) = &self.logger {
            if let Err(err) = logger.write_report("active_learning_report.json", &report) {
                warn!(error = %err, "failed to write active learning report");
            }
        }

        Ok(ActiveLearningOutcome {
            best: best.ensemble,
            report,
            pool,
            synthetic,
        })
    }

    fn finish_iteration(&self, records: &mut Vec<IterationRecord>, record: IterationRecord) {
        if let Some(logger) = &self.logger {
            if let Err(err) = logger.log_iteration(&record) {
                warn!(error = %err, "failed to append iteration log");
            }
        }
        records.push(record);
    }

    fn log_histories(&self, iteration: usize, ensemble: &OneVsAllEnsemble) {
        let Some(logger) = &self.logger else {
            return;
        };
        for (class, model) in ensemble.models().iter().enumerate() {
            let name = ensemble.labels().name_of(class).unwrap_or_default();
            let tag = format!("iter{}:{}", iteration, name);
            if let Err(err) = logger.log_history(&tag, model.history()) {
                warn!(error = %err, "failed to append epoch log");
            }
        }
    }
}

fn summarize(records: &[IterationRecord], initial_pool_size: usize, final_pool_size: usize) -> ActiveLearningSummary {
    let initial_macro_f1 = records.first().map_or(0.0, |r| r.macro_f1);
    let final_macro_f1 = records.last().map_or(0.0, |r| r.macro_f1);
    ActiveLearningSummary {
        iterations_run: records.len(),
        initial_pool_size,
        final_pool_size,
        total_uncertain: records.iter().map(|r| r.uncertain_count).sum(),
        total_requested: records.iter().map(|r| r.requested).sum(),
        total_generated: records.iter().map(|r| r.generated).sum(),
        total_failures: records.iter().map(|r| r.failed_classes.len()).sum(),
        initial_macro_f1,
        final_macro_f1,
        f1_improvement: final_macro_f1 - initial_macro_f1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ActiveLearningConfig::default().validate().is_ok());
    }

    #[test]
    fn invalid_values_rejected() {
        let zero_iterations = ActiveLearningConfig {
            max_iterations: 0,
            ..ActiveLearningConfig::default()
        };
        assert!(zero_iterations.validate().is_err());

        let bad_threshold = ActiveLearningConfig {
            confidence_threshold: 1.5,
            ..ActiveLearningConfig::default()
        };
        assert!(bad_threshold.validate().is_err());
    }

    #[test]
    fn summary_tracks_improvement() {
        let record = |iteration, macro_f1, generated| IterationRecord {
            iteration,
            accuracy: macro_f1,
            macro_f1,
            weighted_f1: macro_f1,
            pool_size: 10,
            uncertain_count: 3,
            requested: 4,
            generated,
            failed_classes: if generated < 4 { vec!["rot".into()] } else { Vec::new() },
            best_macro_f1: macro_f1,
        };
        let summary = summarize(&[record(0, 0.5, 4), record(1, 0.7, 2)], 10, 16);
        assert_eq!(summary.iterations_run, 2);
        assert_eq!(summary.total_generated, 6);
        assert_eq!(summary.total_failures, 1);
        assert!((summary.f1_improvement - 0.2).abs() < 1e-12);
    }
}
