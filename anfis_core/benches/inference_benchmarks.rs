//! Inference and training-step benchmarks for fuzzy models and ensembles
//!
//! Run with: cargo bench --bench inference_benchmarks

use anfis_core::fuzzy::RuleGeneration;
use anfis_core::{
    ClusterConfig, ClusterDataset, EnsembleConfig, FuzzyModel, LabelMapping, ModelConfig,
    OneVsAllEnsemble, TrainingConfig, FEATURE_NAMES,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn production_config(rule_generation: RuleGeneration) -> ModelConfig {
    ModelConfig {
        n_inputs: FEATURE_NAMES.len(),
        rule_generation,
        ..ModelConfig::default()
    }
}

/// Single-model forward pass at different batch sizes
fn bench_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("fuzzy_forward");

    for batch in [1usize, 32, 256, 1024].iter() {
        let data = ClusterDataset::generate(ClusterConfig {
            centers: ClusterConfig::random_centers(2, FEATURE_NAMES.len(), 1),
            samples_per_class: (*batch + 1) / 2,
            noise_level: 0.1,
            seed: 3,
        })
        .unwrap()
        .into_set();

        for (name, generation) in [
            ("grid_pair", RuleGeneration::GridPair),
            ("full_tuple", RuleGeneration::FullTuple { seed: 7 }),
        ] {
            let model = FuzzyModel::new(&production_config(generation)).unwrap();
            group.bench_with_input(BenchmarkId::new(name, batch), &data, |b, data| {
                b.iter(|| black_box(model.predict_proba(data.features.view()).unwrap()));
            });
        }
    }

    group.finish();
}

/// Ensemble prediction over the seven produce classes
fn bench_ensemble(c: &mut Criterion) {
    let labels = LabelMapping::fit([
        "anthracnose",
        "blight",
        "healthy",
        "insect",
        "mildew",
        "rot",
        "sunscald",
    ])
    .unwrap();
    let data = ClusterDataset::generate(ClusterConfig {
        centers: ClusterConfig::random_centers(labels.len(), FEATURE_NAMES.len(), 2),
        samples_per_class: 20,
        noise_level: 0.05,
        seed: 4,
    })
    .unwrap()
    .into_set();

    let config = EnsembleConfig {
        model: production_config(RuleGeneration::GridPair),
        training: TrainingConfig {
            max_epochs: 5,
            ..TrainingConfig::default()
        },
        ..EnsembleConfig::default()
    };
    let ensemble = OneVsAllEnsemble::train(&config, &labels, &data, &data).unwrap();

    c.bench_function("ensemble_predict_proba", |b| {
        b.iter(|| black_box(ensemble.predict_proba(data.features.view()).unwrap()));
    });

    c.bench_function("ensemble_train_5_epochs", |b| {
        b.iter(|| black_box(OneVsAllEnsemble::train(&config, &labels, &data, &data).unwrap()));
    });
}

criterion_group!(benches, bench_forward, bench_ensemble);
criterion_main!(benches);
