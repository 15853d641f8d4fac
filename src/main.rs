use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use skipgram::corpus::read_words;
use skipgram::{
    cluster, logging, real, vectors, NoiseDistribution, OutputFormat, Trainer, TrainingConfig,
    Vocabulary,
};

#[derive(Clone, Copy, ValueEnum)]
enum Noise {
    /// Zipfian over ids; needs no word counts
    LogUniform,
    /// Word counts raised to --noise-power
    Unigram,
}

#[derive(Parser)]
#[command(about = "Skip-gram word vectors, trained with noise-contrastive estimation", long_about = None)]
struct Options {
    /// Use text data from FILE to train the model
    #[arg(long = "train", value_name = "FILE")]
    train_file: PathBuf,

    /// Use FILE to save the resulting word vectors / word clusters
    #[arg(long = "output", value_name = "FILE")]
    output_file: Option<PathBuf>,

    /// Set size of word vectors
    #[arg(long = "size", default_value_t = 128)]
    embedding_size: usize,

    /// How many words to consider left and right of each center word
    #[arg(long, default_value_t = 1)]
    window: usize,

    /// How many context words to sample per center word
    #[arg(long, default_value_t = 2)]
    num_skips: usize,

    #[arg(long, default_value_t = 128)]
    batch_size: usize,

    /// Number of negative examples per (target, context) pair
    #[arg(long, default_value_t = 64)]
    negative: usize,

    /// Set the learning rate
    #[arg(long, default_value_t = 1.0)]
    alpha: real,

    /// Number of training steps
    #[arg(long, default_value_t = 100_001)]
    steps: usize,

    /// Report the average loss every N steps (0 = never)
    #[arg(long, value_name = "N", default_value_t = 2000)]
    display_step: usize,

    /// Show nearest neighbors of the evaluation words every N steps (0 = only at step 1)
    #[arg(long, value_name = "N", default_value_t = 10_000)]
    eval_step: usize,

    /// Comma-separated words whose nearest neighbors are reported during training
    #[arg(long, value_delimiter = ',')]
    eval_words: Vec<String>,

    /// Seed for initialization and sampling
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Distribution negative examples are drawn from
    #[arg(long, value_enum, default_value_t = Noise::LogUniform)]
    noise: Noise,

    /// Exponent applied to word counts for --noise unigram
    #[arg(long, default_value_t = 0.75)]
    noise_power: f64,

    /// Keep at most N words, counting UNK
    #[arg(long = "vocab-size", value_name = "N", default_value_t = 50_000)]
    vocab_size: usize,

    /// Discard words that appear less than N times
    #[arg(long = "min-count", value_name = "N", default_value_t = 1)]
    min_count: u64,

    /// Output word classes rather than word vectors; if unspecified, vectors are written instead
    #[arg(long)]
    classes: Option<usize>,

    /// Save the resulting vectors in binary mode
    #[arg(long, conflicts_with = "bincode")]
    binary: bool,

    /// Save the resulting vectors as a bincode-encoded model
    #[arg(long)]
    bincode: bool,

    /// The vocabulary will be saved to FILE
    #[arg(long = "save-vocab", value_name = "FILE")]
    save_vocab_file: Option<PathBuf>,

    /// The vocabulary will be read from FILE, not constructed from the training data
    #[arg(long = "read-vocab", value_name = "FILE")]
    read_vocab_file: Option<PathBuf>,
}

impl Options {
    fn training_config(&self, vocabulary: &Vocabulary) -> TrainingConfig {
        TrainingConfig {
            embedding_size: self.embedding_size,
            vocabulary_size: vocabulary.len(),
            skip_window: self.window,
            num_skips: self.num_skips,
            batch_size: self.batch_size,
            num_negative_samples: self.negative,
            learning_rate: self.alpha,
            total_steps: self.steps,
            display_step: self.display_step,
            eval_step: self.eval_step,
            eval_query_words: self.eval_words.clone(),
            seed: self.seed,
            noise: match self.noise {
                Noise::LogUniform => NoiseDistribution::LogUniform,
                Noise::Unigram => NoiseDistribution::Unigram {
                    power: self.noise_power,
                },
            },
        }
    }

    fn output_format(&self) -> OutputFormat {
        if self.bincode {
            OutputFormat::Bincode
        } else if self.binary {
            OutputFormat::Binary
        } else {
            OutputFormat::Text
        }
    }
}

fn save_classes(path: &Path, vocabulary: &Vocabulary, classes: &[usize]) -> Result<()> {
    let mut fo = BufWriter::new(File::create(path).context("error creating output file")?);
    for (word, class) in vocabulary.words().iter().zip(classes) {
        writeln!(fo, "{word} {class}").context("error writing k-means classes to output file")?;
    }
    fo.flush().context("error writing k-means classes to output file")?;
    Ok(())
}

fn train_model(options: &Options) -> Result<()> {
    info!(file = %options.train_file.display(), "starting training");

    let fin = File::open(&options.train_file).context("error opening training data file")?;
    let words = read_words(fin)
        .collect::<io::Result<Vec<String>>>()
        .context("error reading training data file")?;

    let vocabulary = match &options.read_vocab_file {
        Some(f) => Vocabulary::load(f).context("error reading vocabulary file")?,
        None => Vocabulary::build(&words, options.vocab_size, options.min_count)?,
    };
    info!(
        vocabulary = vocabulary.len(),
        words = words.len(),
        unknown = vocabulary.count(0),
        "vocabulary ready"
    );
    if let Some(f) = &options.save_vocab_file {
        vocabulary.save(f).context("error writing vocab file")?;
    }
    let output_file = match &options.output_file {
        Some(f) => f,
        None => return Ok(()),
    };

    let tokens = vocabulary.encode(&words);
    drop(words);
    let settings = options
        .training_config(&vocabulary)
        .validate(&vocabulary, tokens.len())?;
    let mut trainer = Trainer::new(settings, &vocabulary, &tokens)?;

    let pb = ProgressBar::new(options.steps as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{elapsed_precise} [{bar:40.cyan/blue}] {pos}/{len} steps ({per_sec}, eta {eta})")
            .context("invalid progress bar template")?
            .progress_chars("=>-"),
    );
    trainer.run_with_progress(
        |step| pb.set_position(step as u64),
        |record| pb.suspend(|| record.log()),
    )?;
    pb.finish_and_clear();
    info!(steps = trainer.steps_done(), "training finished");

    let embeddings = trainer.into_embeddings();
    match options.classes {
        None => vectors::save(output_file, &vocabulary, embeddings.view(), options.output_format())
            .context("error writing output file")?,
        Some(classes) => {
            let assignment = cluster::kmeans(embeddings.view(), classes, 10)?;
            save_classes(output_file, &vocabulary, &assignment)?;
        }
    }
    info!(file = %output_file.display(), "saved");
    Ok(())
}

fn main() {
    logging::init();
    let options = Options::parse();

    if let Err(err) = train_model(&options) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}
