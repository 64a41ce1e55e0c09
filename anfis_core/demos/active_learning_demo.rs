//! End-to-end produce grading demo.
//!
//! Builds a clustered stand-in for extracted produce features, fits the
//! preprocessing, runs the active-learning loop with a cluster-based
//! generator, checks robustness and serves one prediction from the registry.
//!
//! Run with: RUST_LOG=info cargo run --example active_learning_demo

use anfis_core::{
    evaluate_robustness, mix_hybrid, train_val_test_split, ActiveLearner, ClusterConfig,
    ClusterDataset, ClusterGenerator, FeatureSchema, LabelMapping, LabeledSet, ModelConfig,
    ModelRegistry, PipelineConfig, Preprocessing, ProduceFeatures, RunLogger, FEATURE_NAMES,
};
use anyhow::Context;
use tracing_subscriber::EnvFilter;

const CLASSES: [&str; 7] = [
    "anthracnose",
    "blight",
    "healthy",
    "insect",
    "mildew",
    "rot",
    "sunscald",
];

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🍅 ANFIS Produce Grading - Active Learning Demo");
    println!("==============================================\n");

    let mut config = PipelineConfig::load_from_file("anfis_core/config/anfis.toml")
        .or_else(|_| PipelineConfig::load_from_file("config/anfis.toml"))
        .unwrap_or_else(|_| PipelineConfig::default());
    // Demo-sized run
    config.ensemble.model = ModelConfig {
        n_inputs: FEATURE_NAMES.len(),
        n_rules: 9,
        n_membership_functions: 3,
        ..config.ensemble.model
    };
    config.ensemble.training.max_epochs = 60;
    config.ensemble.training.learning_rate = 0.5;
    config.active_learning.max_iterations = 3;

    // Stand-in for extractor output: unit clusters rescaled to raw ranges
    let labels = LabelMapping::fit(CLASSES)?;
    let real = ClusterDataset::generate(ClusterConfig {
        centers: ClusterConfig::random_centers(labels.len(), FEATURE_NAMES.len(), 42),
        samples_per_class: 30,
        noise_level: 0.12,
        seed: config.data.seed,
    })?
    .into_set();
    let mut raw = real.features.clone();
    raw.column_mut(0).mapv_inplace(|v| v * 180.0);
    raw.column_mut(8).mapv_inplace(|v| v * 5_000.0);

    let preprocessing = Preprocessing::fit(
        FeatureSchema::produce(),
        config.data.normalizer,
        raw.view(),
        labels.clone(),
    )?;
    let normalized = LabeledSet::new(preprocessing.transform(raw.view())?, real.labels.clone())?;
    let split = train_val_test_split(
        &normalized,
        config.data.validation_fraction,
        config.data.test_fraction,
        config.data.seed,
    )?;

    println!("📊 Dataset");
    println!("  Training samples:   {}", split.train.len());
    println!("  Validation samples: {}", split.validation.len());
    println!("  Test samples:       {}\n", split.test.len());

    // Pre-rendered synthetic pool mixed in at the configured real ratio
    let prerendered = ClusterDataset::generate(ClusterConfig {
        centers: ClusterConfig::random_centers(labels.len(), FEATURE_NAMES.len(), 42),
        samples_per_class: 20,
        noise_level: 0.15,
        seed: config.data.seed.wrapping_add(1),
    })?
    .into_set();
    let pool = mix_hybrid(&split.train, &prerendered, config.data.real_ratio, config.data.seed)?;
    println!("  Hybrid pool: {} rows ({}% real)\n", pool.len(), (config.data.real_ratio * 100.0) as u32);

    let run_dir = std::env::temp_dir().join("anfis_demo_run");
    let learner = ActiveLearner::new(config.active_learning.clone(), config.ensemble)
        .with_run_logger(RunLogger::new(&run_dir).context("creating run log directory")?);
    let mut generator = ClusterGenerator::fit(&split.train);

    println!("🔁 Active learning...");
    let outcome = learner.run(&labels, pool, &split.validation, &mut generator)?;
    for record in &outcome.report.iterations {
        println!(
            "  Iteration {}: acc={:.3} macro_f1={:.3} pool={} uncertain={} generated={}",
            record.iteration,
            record.accuracy,
            record.macro_f1,
            record.pool_size,
            record.uncertain_count,
            record.generated
        );
    }
    let summary = &outcome.report.summary;
    println!(
        "  Best iteration {} (macro F1 {:.3}), improvement {:+.3}, stopped: {:?}\n",
        outcome.report.best_iteration,
        outcome.report.best_macro_f1,
        summary.f1_improvement,
        outcome.report.stop_reason
    );

    let test_metrics = outcome
        .best
        .evaluate(split.test.features.view(), split.test.labels.view())?;
    println!("🧪 Test set");
    println!("  Accuracy:    {:.3}", test_metrics.accuracy);
    println!("  Macro F1:    {:.3}", test_metrics.macro_f1());
    println!("  Weighted F1: {:.3}\n", test_metrics.weighted_f1());

    let robustness = evaluate_robustness(
        &outcome.best,
        split.test.features.view(),
        split.test.labels.view(),
        &config.robustness,
    )?;
    println!("🌤️  Robustness");
    for result in &robustness.results {
        println!(
            "  {:?}: acc={:.3} (drop {:+.3})",
            result.perturbation, result.accuracy, -result.accuracy_drop
        );
    }
    println!();

    let registry_dir = std::env::temp_dir().join("anfis_demo_registry");
    ModelRegistry::new(outcome.best, preprocessing)?.save(&registry_dir)?;
    let registry = ModelRegistry::load(&registry_dir)?;

    let values: [f64; 11] = raw
        .row(0)
        .to_vec()
        .try_into()
        .map_err(|_| anyhow::anyhow!("feature row has the wrong width"))?;
    let sample = ProduceFeatures::from_array(values).to_map();
    let truth = labels.name_of(real.labels[0]).unwrap_or("?");
    println!("🔎 Registry prediction");
    println!("  Truth: {}", truth);
    println!("  Predicted: {}", registry.predict(&sample)?);
    for (class, p) in registry.predict_proba(&sample)? {
        println!("    {:<12} {:.3}", class, p);
    }
    println!("\nRun logs written to {}", run_dir.display());

    Ok(())
}
