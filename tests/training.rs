use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use skipgram::{
    real, vectors, Diagnostic, Error, Evaluator, OutputFormat, Trainer, TrainingConfig, Vectors,
    Vocabulary,
};

/// Filler words in random order, broken up by "left alpha right" or
/// "left beta right". `alpha` and `beta` share every context they ever
/// appear in; nothing else does.
fn synthetic_corpus(seed: u64) -> Vec<String> {
    let fillers: Vec<String> = (0..10).map(|i| format!("f{i}")).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut words = vec![];
    for _ in 0..400 {
        for _ in 0..4 {
            words.push(fillers[rng.gen_range(0..fillers.len())].clone());
        }
        words.push("left".to_string());
        words.push(if rng.gen_bool(0.5) { "alpha" } else { "beta" }.to_string());
        words.push("right".to_string());
    }
    words
}

fn config(vocabulary: &Vocabulary, seed: u64) -> TrainingConfig {
    TrainingConfig {
        embedding_size: 16,
        vocabulary_size: vocabulary.len(),
        skip_window: 1,
        num_skips: 2,
        batch_size: 32,
        num_negative_samples: 4,
        learning_rate: 20.0,
        total_steps: 1500,
        display_step: 100,
        eval_step: 500,
        eval_query_words: vec!["alpha".to_string(), "beta".to_string()],
        seed,
        ..TrainingConfig::default()
    }
}

#[test]
fn words_sharing_contexts_become_neighbors() {
    let words = synthetic_corpus(0);
    let vocabulary = Vocabulary::build(&words, 100, 1).unwrap();
    let tokens = vocabulary.encode(&words);
    let alpha = vocabulary.id("alpha").unwrap();
    let beta = vocabulary.id("beta").unwrap();

    let mut successes = 0;
    for seed in 0..5 {
        let settings = config(&vocabulary, seed).validate(&vocabulary, tokens.len()).unwrap();
        let mut trainer = Trainer::new(settings, &vocabulary, &tokens).unwrap();
        let before = Evaluator::new(trainer.embeddings()).similarity(alpha, beta).unwrap();

        let mut losses = vec![];
        trainer
            .run(|record| {
                if let Diagnostic::Loss { average_loss, .. } = record {
                    losses.push(average_loss);
                }
            })
            .unwrap();
        assert!(
            losses.last().unwrap() < losses.first().unwrap(),
            "seed {seed}: loss did not go down: {losses:?}"
        );

        let evaluator = Evaluator::new(trainer.embeddings());
        let after = evaluator.similarity(alpha, beta).unwrap();
        assert!(after > before, "seed {seed}: similarity went from {before} to {after}");
        if evaluator.nearest(alpha, 1).unwrap()[0].id == beta
            && evaluator.nearest(beta, 1).unwrap()[0].id == alpha
        {
            successes += 1;
        }
    }
    assert!(successes >= 4, "alpha and beta were mutual nearest neighbors for {successes} of 5 seeds");
}

#[test]
fn identical_runs_produce_identical_records() {
    let words = synthetic_corpus(1);
    let vocabulary = Vocabulary::build(&words, 100, 1).unwrap();
    let tokens = vocabulary.encode(&words);
    let run = || {
        let config = TrainingConfig {
            total_steps: 300,
            display_step: 10,
            ..config(&vocabulary, 42)
        };
        let settings = config.validate(&vocabulary, tokens.len()).unwrap();
        let mut trainer = Trainer::new(settings, &vocabulary, &tokens).unwrap();
        let mut records = vec![];
        trainer.run(|record| records.push(record)).unwrap();
        (records, trainer.into_embeddings())
    };

    let (records_a, embeddings_a) = run();
    let (records_b, embeddings_b) = run();
    // 30 loss reports, plus neighbors of both query words at step 1
    assert_eq!(records_a.len(), 32);
    assert_eq!(records_a, records_b);
    assert_eq!(embeddings_a, embeddings_b);
}

#[test]
fn divergence_is_fatal() {
    let words = synthetic_corpus(2);
    let vocabulary = Vocabulary::build(&words, 100, 1).unwrap();
    let tokens = vocabulary.encode(&words);
    let config = TrainingConfig {
        learning_rate: 1e30,
        total_steps: 50,
        ..config(&vocabulary, 3)
    };
    let settings = config.validate(&vocabulary, tokens.len()).unwrap();
    let mut trainer = Trainer::new(settings, &vocabulary, &tokens).unwrap();
    match trainer.run(|_| {}) {
        Err(Error::NonFinite { step, .. }) => {
            assert!(step <= 50);
            assert_eq!(trainer.steps_done(), step - 1);
        }
        other => panic!("expected a non-finite error, got {other:?}"),
    }
}

#[test]
fn bad_configuration_is_rejected_up_front() {
    let words = synthetic_corpus(3);
    let vocabulary = Vocabulary::build(&words, 100, 1).unwrap();
    let tokens = vocabulary.encode(&words);

    let mut unknown = config(&vocabulary, 0);
    unknown.eval_query_words.push("gamma".to_string());
    assert!(matches!(
        unknown.validate(&vocabulary, tokens.len()),
        Err(Error::UnknownWord(w)) if w == "gamma"
    ));

    let ratio = TrainingConfig {
        batch_size: 33,
        ..config(&vocabulary, 0)
    };
    assert!(matches!(ratio.validate(&vocabulary, tokens.len()), Err(Error::Config(_))));
}

#[test]
fn trained_vectors_survive_a_round_trip() {
    let words = synthetic_corpus(4);
    let vocabulary = Vocabulary::build(&words, 100, 1).unwrap();
    let tokens = vocabulary.encode(&words);
    let config = TrainingConfig {
        total_steps: 200,
        ..config(&vocabulary, 5)
    };
    let settings = config.validate(&vocabulary, tokens.len()).unwrap();
    let mut trainer = Trainer::new(settings, &vocabulary, &tokens).unwrap();
    trainer.run(|_| {}).unwrap();
    let embeddings = trainer.into_embeddings();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vectors.bin");
    vectors::save(&path, &vocabulary, embeddings.view(), OutputFormat::Binary).unwrap();
    let loaded = Vectors::load(&path).unwrap();
    assert_eq!(loaded.num_words(), vocabulary.len());

    let original = Evaluator::new(embeddings.view());
    let reloaded = Evaluator::new(loaded.embeddings());
    let alpha = vocabulary.id("alpha").unwrap();
    for id in 0..vocabulary.len() {
        let diff: real = (original.similarity(alpha, id).unwrap()
            - reloaded.similarity(alpha, id).unwrap())
        .abs();
        assert!(diff < 1e-5);
    }
}
