use std::io::Write;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use ndarray::Array1;

use skipgram::{logging, real, Evaluator, Vectors};

/// number of closest words that will be shown
const N: usize = 40;

#[derive(Parser)]
#[command(about = "Interactive nearest-neighbor lookup over saved word vectors", long_about = None)]
struct Options {
    /// Contains word projections in the BINARY FORMAT.
    #[arg(value_name = "FILE")]
    file_name: PathBuf,

    /// Read a bincode-encoded model instead
    #[arg(long)]
    bincode: bool,
}

fn run(options: &Options) -> Result<()> {
    let vectors = if options.bincode {
        Vectors::load_bincode(&options.file_name)
    } else {
        Vectors::load(&options.file_name)
    }
    .context("error reading input file")?;
    let evaluator = Evaluator::new(vectors.embeddings());

    'outer: loop {
        print!("Enter word or sentence (EXIT to break): ");
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        if std::io::stdin()
            .read_line(&mut line)
            .context("error reading stdin")?
            == 0
        {
            break;
        }
        let line = line.trim();
        if line == "EXIT" {
            break;
        }

        let mut bi: Vec<usize> = vec![];
        for sta in line.split_whitespace() {
            println!();
            match vectors.lookup_word(sta) {
                None => {
                    println!("Word: {sta}  Out of dictionary word!");
                    continue 'outer;
                }
                Some(i) => {
                    println!("Word: {sta}  Position in vocabulary: {i}");
                    bi.push(i);
                }
            }
        }
        if bi.is_empty() {
            continue;
        }

        println!();
        println!("                                              Word       Cosine distance");
        println!("------------------------------------------------------------------------");

        let mut vec = Array1::<real>::zeros(vectors.size());
        for &i in &bi {
            vec += &vectors.vector(i);
        }
        for n in evaluator.nearest_to_vector(vec.view(), &bi, N)? {
            println!("{:50}\t\t{}", vectors.word(n.id), n.similarity);
        }
    }
    Ok(())
}

fn main() {
    logging::init();
    let options = Options::parse();

    if let Err(err) = run(&options) {
        eprintln!("{err:#}");
        process::exit(1);
    }
}
