use clap::Parser;
use motifhmm::prelude::*;
use motifhmm::random_seq::planted_contrast;
use std::path::PathBuf;

///
/// Train a motif model on a synthetic signal/control dataset
///
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Opts {
    /// IUPAC string the motif is seeded with
    #[clap(short = 'm', long, default_value = "NNNNNN")]
    motif: String,
    /// Site planted once into every signal sequence
    #[clap(long, default_value = "TGACGT")]
    planted: String,
    /// Objective measure (none, bw, viterbi, mi, ri, mmie, mcc, dlogl, dfreq)
    /// when no options file is given
    #[clap(short = 'M', long, default_value = "mi")]
    measure: Measure,
    /// Number of sequences per set
    #[clap(short = 'n', default_value_t = 50)]
    n_seqs: usize,
    /// Length of each sequence
    #[clap(short = 'l', default_value_t = 100)]
    length: usize,
    /// Seed of the synthetic dataset
    #[clap(short = 's', long, default_value_t = 0)]
    seed: u64,
    /// JSON options file
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,
    /// Overrides the maximum number of iterations
    #[clap(short = 'i', long)]
    max_iter: Option<usize>,
    /// Sample motif structures after training
    #[clap(long)]
    sampling: bool,
    /// Output parameter file
    #[clap(short, long)]
    output: PathBuf,
    /// Output graphviz file of the trained model
    #[clap(long)]
    dot: Option<PathBuf>,
}

fn run(opts: &Opts) -> Result<()> {
    let mut options = match &opts.config {
        Some(path) => Options::from_json_file(path)?,
        None => Options::with_measure(opts.measure),
    };
    if let Some(max_iter) = opts.max_iter {
        options.termination.max_iter = max_iter;
    }
    options.sampling.do_sampling |= opts.sampling;
    println!("# options={}", options.to_json()?.replace('\n', ""));

    let site = encode(&opts.planted)?;
    let (contrast, positions) = planted_contrast(
        "synthetic",
        "motif",
        &site,
        opts.n_seqs,
        opts.length,
        opts.seed,
    );
    let data = Collection::new(vec![contrast]);

    let mut model = Model::new();
    let seeding = &options.seeding;
    model.add_motif_iupac(
        &opts.motif,
        seeding.alpha,
        seeding.expected_seq_len,
        seeding.lambda,
        "motif",
        &MotifLayout::default(),
    )?;

    let result = train(model, &data, &options)?;
    println!("# iterations={}", result.iterations);
    println!("# reason={}", result.reason);
    for score in result.scores.iter() {
        println!("score\t{}\t{}\t{}", score.measure, score.motifs.join(","), score.score);
    }
    for (model, score) in result.trajectory.iter() {
        let consensus: Vec<String> = model
            .motif_groups()
            .into_iter()
            .map(|g| model.consensus(g))
            .collect();
        println!("sample\t{}\t{}", score, consensus.join(","));
    }

    let model = &result.model;
    for g in model.motif_groups() {
        println!(
            "motif\t{}\t{}\t{}\t{:.3}",
            model.group(g).name,
            model.consensus(g),
            model.motif_length(g),
            model.information_content(g)
        );
    }
    let mut n_found = 0;
    let signal = &data.contrasts[0].sets[0];
    for (seq, &planted) in signal.seqs.iter().zip(positions.iter()) {
        for site in model.sites(&seq.symbols) {
            if site.start <= planted && planted < site.end {
                n_found += 1;
            }
            println!(
                "site\t{}\t{}\t{}\t{}\t{:.3}",
                seq.name, site.start, site.end, site.site, site.log_odds
            );
        }
    }
    println!("# planted_sites_found={}/{}", n_found, positions.len());
    for &measure in [Measure::Likelihood, Measure::MutualInformation].iter() {
        let score = compute_score(model, &data, measure, &["motif"], &[], &options)?;
        println!("# {}={}", measure, score);
    }

    model.to_file(&opts.output)?;
    if let Some(path) = &opts.dot {
        std::fs::write(path, model.to_dot(0.01))?;
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let opts: Opts = Opts::parse();
    println!("# started_at={}", chrono::Local::now());
    println!("# n_threads={}", rayon::current_num_threads());
    println!("# opts={:?}", opts);
    if let Err(e) = run(&opts) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
    println!("# finished_at={}", chrono::Local::now());
}
