use anfis_core::active::ActiveLearningPhase;
use anfis_core::{
    stratified_split, ActiveLearner, ActiveLearningConfig, ActiveLearningError, ClusterConfig,
    ClusterDataset, ClusterGenerator, EnsembleConfig, GeneratorError, GradientMode, LabelMapping,
    LabeledSet,
    ModelConfig, RunLogger, StopReason, SyntheticGenerator, TrainingConfig,
};
use ndarray::Array1;
use rand::rngs::StdRng;
use uuid::Uuid;

fn split(centers: Vec<Vec<f64>>, samples_per_class: usize, noise_level: f64) -> (LabeledSet, LabeledSet) {
    let data = ClusterDataset::generate(ClusterConfig {
        centers,
        samples_per_class,
        noise_level,
        seed: 17,
    })
    .unwrap()
    .into_set();
    stratified_split(&data, 0.25, 4).unwrap()
}

fn labels() -> LabelMapping {
    LabelMapping::from_classes(["healthy", "rot"]).unwrap()
}

fn ensemble_config(max_epochs: usize, learning_rate: f64) -> EnsembleConfig {
    EnsembleConfig {
        model: ModelConfig {
            n_inputs: 2,
            n_rules: 4,
            n_membership_functions: 2,
            gradient_mode: GradientMode::Exact,
            ..ModelConfig::default()
        },
        training: TrainingConfig {
            max_epochs,
            learning_rate,
            patience: max_epochs,
            batch_size: 16,
            seed: 9,
        },
        ..EnsembleConfig::default()
    }
}

fn loop_config(max_iterations: usize) -> ActiveLearningConfig {
    ActiveLearningConfig {
        confidence_threshold: 0.7,
        max_iterations,
        samples_per_iteration: 20,
        false_negative_targets: vec!["rot".into()],
        low_confidence_targets: vec!["rot".into()],
        ..ActiveLearningConfig::default()
    }
}

/// Counts calls and delegates to an inner generator.
struct CountingGenerator<G> {
    inner: G,
    calls: usize,
}

impl<G: SyntheticGenerator> SyntheticGenerator for CountingGenerator<G> {
    fn generate(
        &mut self,
        class: usize,
        class_name: &str,
        count: usize,
        rng: &mut StdRng,
    ) -> Result<Vec<Array1<f64>>, GeneratorError> {
        self.calls += 1;
        self.inner.generate(class, class_name, count, rng)
    }
}

struct FailingGenerator;

impl SyntheticGenerator for FailingGenerator {
    fn generate(
        &mut self,
        _class: usize,
        _class_name: &str,
        _count: usize,
        _rng: &mut StdRng,
    ) -> Result<Vec<Array1<f64>>, GeneratorError> {
        Err(GeneratorError::Failed("renderer offline".into()))
    }
}

struct WrongWidthGenerator;

impl SyntheticGenerator for WrongWidthGenerator {
    fn generate(
        &mut self,
        _class: usize,
        _class_name: &str,
        count: usize,
        _rng: &mut StdRng,
    ) -> Result<Vec<Array1<f64>>, GeneratorError> {
        Ok(vec![Array1::zeros(5); count])
    }
}

#[test]
fn confident_first_iteration_stops_immediately() {
    let (pool, validation) = split(vec![vec![0.1, 0.1], vec![0.9, 0.9]], 40, 0.05);
    let learner = ActiveLearner::new(loop_config(3), ensemble_config(300, 2.0));
    let mut generator = CountingGenerator {
        inner: ClusterGenerator::fit(&pool),
        calls: 0,
    };

    let outcome = learner
        .run(&labels(), pool.clone(), &validation, &mut generator)
        .unwrap();

    let report = &outcome.report;
    assert_eq!(report.iterations.len(), 1);
    assert_eq!(report.iterations[0].uncertain_count, 0);
    assert_eq!(report.stop_reason, StopReason::NoUncertainSamples);
    assert_eq!(report.best_iteration, 0);
    assert_eq!(generator.calls, 0);
    assert_eq!(outcome.pool.len(), pool.len());
    assert!(outcome.synthetic.is_empty());
    assert_eq!(
        report.phases,
        vec![
            ActiveLearningPhase::Init,
            ActiveLearningPhase::Train,
            ActiveLearningPhase::Evaluate,
            ActiveLearningPhase::SelectUncertain,
            ActiveLearningPhase::Stopped,
        ]
    );
}

#[test]
fn overlapping_classes_grow_the_pool_and_keep_the_best() {
    let (pool, validation) = split(vec![vec![0.45, 0.45], vec![0.55, 0.55]], 40, 0.2);
    let learner = ActiveLearner::new(loop_config(3), ensemble_config(40, 0.5));
    let mut generator = ClusterGenerator::fit(&pool);

    let outcome = learner
        .run(&labels(), pool.clone(), &validation, &mut generator)
        .unwrap();
    let report = &outcome.report;

    assert!(!report.iterations.is_empty() && report.iterations.len() <= 3);
    assert!(report.iterations[0].uncertain_count > 0);

    let trace = report.best_f1_trace();
    assert!(trace.windows(2).all(|w| w[1] >= w[0]));
    let max_f1 = report
        .iterations
        .iter()
        .map(|r| r.macro_f1)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(report.best_macro_f1, max_f1);

    let best_metrics = outcome
        .best
        .evaluate(validation.features.view(), validation.labels.view())
        .unwrap();
    assert_eq!(best_metrics.macro_f1(), report.best_macro_f1);

    let summary = &report.summary;
    assert_eq!(summary.iterations_run, report.iterations.len());
    assert_eq!(outcome.pool.len(), pool.len() + summary.total_generated);
    assert_eq!(outcome.synthetic.len(), summary.total_generated);
    assert!(outcome.synthetic.iter().all(|s| s.is_synthetic));
    assert_eq!(report.phases.first(), Some(&ActiveLearningPhase::Init));
    assert_eq!(report.phases.last(), Some(&ActiveLearningPhase::Stopped));

    // synthesis never runs after the last training round
    let last = report.iterations.last().unwrap();
    assert_eq!(last.requested, 0);
}

#[test]
fn generator_failures_do_not_abort_the_loop() {
    let (pool, validation) = split(vec![vec![0.45, 0.45], vec![0.55, 0.55]], 30, 0.2);
    let learner = ActiveLearner::new(loop_config(3), ensemble_config(20, 0.5));

    let outcome = learner
        .run(&labels(), pool.clone(), &validation, &mut FailingGenerator)
        .unwrap();
    let report = &outcome.report;
    assert_eq!(report.iterations.len(), 3);
    assert_eq!(report.stop_reason, StopReason::MaxIterations);
    assert_eq!(report.summary.total_generated, 0);
    assert!(report.summary.total_failures > 0);
    assert!(report.iterations[0].failed_classes.iter().all(|c| c == "healthy" || c == "rot"));
    assert_eq!(outcome.pool.len(), pool.len());

    let outcome = learner
        .run(&labels(), pool.clone(), &validation, &mut WrongWidthGenerator)
        .unwrap();
    assert_eq!(outcome.report.summary.total_generated, 0);
    assert_eq!(outcome.pool.len(), pool.len());
}

#[test]
fn run_logger_records_iterations() {
    let (pool, validation) = split(vec![vec![0.45, 0.45], vec![0.55, 0.55]], 20, 0.2);
    let dir = std::env::temp_dir().join(format!("anfis_active_{}", Uuid::new_v4()));
    let learner = ActiveLearner::new(loop_config(2), ensemble_config(10, 0.5))
        .with_run_logger(RunLogger::new(&dir).unwrap());
    let mut generator = ClusterGenerator::fit(&pool);

    let outcome = learner
        .run(&labels(), pool, &validation, &mut generator)
        .unwrap();

    let lines = std::fs::read_to_string(dir.join("active_learning.jsonl")).unwrap();
    assert_eq!(lines.lines().count(), outcome.report.iterations.len());
    assert!(dir.join("epochs.jsonl").exists());
    assert!(dir.join("active_learning_report.json").exists());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn invalid_inputs_are_reported() {
    let (pool, validation) = split(vec![vec![0.2, 0.2], vec![0.8, 0.8]], 10, 0.05);
    let mut generator = ClusterGenerator::fit(&pool);

    let missing_healthy = ActiveLearningConfig {
        healthy_class: "pristine".into(),
        ..loop_config(2)
    };
    let err = ActiveLearner::new(missing_healthy, ensemble_config(5, 0.5))
        .run(&labels(), pool.clone(), &validation, &mut generator)
        .unwrap_err();
    assert_eq!(err, ActiveLearningError::UnknownClass("pristine".into()));

    let err = ActiveLearner::new(loop_config(2), ensemble_config(5, 0.5))
        .run(&labels(), pool, &LabeledSet::empty(2), &mut generator)
        .unwrap_err();
    assert_eq!(err, ActiveLearningError::EmptyValidationSet);
}
