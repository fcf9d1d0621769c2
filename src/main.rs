use clap::{App, Arg, SubCommand};
use std::io::{BufWriter, Write};
use tophmm::error::{Error, Result};
#[macro_use]
extern crate log;

fn verbose() -> Arg<'static, 'static> {
    Arg::with_name("verbose")
        .short("v")
        .multiple(true)
        .help("Debug mode")
}

fn threads() -> Arg<'static, 'static> {
    Arg::with_name("threads")
        .long("threads")
        .short("t")
        .takes_value(true)
        .default_value("1")
        .help("Number of threads")
}

fn test_data() -> Arg<'static, 'static> {
    Arg::with_name("test")
        .long("test")
        .value_name("FASTA")
        .takes_value(true)
        .required(true)
        .help("Test chains. Residue records (id containing `sequence`), each followed by its DSSP string.")
}

fn predictions() -> Arg<'static, 'static> {
    Arg::with_name("predictions")
        .long("predictions")
        .value_name("FASTA")
        .takes_value(true)
        .help("Write the predicted labels to this file.")
}

fn subcommand_sample() -> App<'static, 'static> {
    SubCommand::with_name("sample")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Sample HMM topologies from labelled chains.")
        .arg(verbose())
        .arg(threads())
        .arg(
            Arg::with_name("train")
                .long("train")
                .value_name("FASTA")
                .takes_value(true)
                .required(true)
                .help("Training chains. Residue records (id containing `sequence`), each followed by its DSSP string."),
        )
        .arg(
            Arg::with_name("output")
                .long("output")
                .short("o")
                .value_name("JSON")
                .takes_value(true)
                .required(true)
                .help("Sampled models."),
        )
        .arg(
            Arg::with_name("trace")
                .long("trace")
                .value_name("TSV")
                .takes_value(true)
                .help("Per-iteration trace. Default is stderr. Ignored with more than one chain."),
        )
        .arg(
            Arg::with_name("iterations")
                .long("iterations")
                .takes_value(true)
                .default_value("10000")
                .help("Number of iterations of each chain."),
        )
        .arg(
            Arg::with_name("sample_every")
                .long("sample_every")
                .takes_value(true)
                .default_value("100")
                .help("Record the current model every [sample_every] iterations."),
        )
        .arg(
            Arg::with_name("burn_in")
                .long("burn_in")
                .takes_value(true)
                .default_value("1000")
                .help("Do not record models until this iteration."),
        )
        .arg(
            Arg::with_name("max_states")
                .long("max_states")
                .takes_value(true)
                .default_value("10")
                .help("Reject models larger than this."),
        )
        .arg(
            Arg::with_name("pseudocount")
                .long("pseudocount")
                .takes_value(true)
                .default_value("0")
                .help("Added to each residue/label count of the initial emissions."),
        )
        .arg(
            Arg::with_name("chains")
                .long("chains")
                .takes_value(true)
                .default_value("1")
                .help("Number of independent chains."),
        )
        .arg(
            Arg::with_name("seed")
                .long("seed")
                .takes_value(true)
                .default_value("4230")
                .help("Seed"),
        )
}

fn subcommand_predict() -> App<'static, 'static> {
    SubCommand::with_name("predict")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Predict labels by the consensus of sampled models and report error rates.")
        .arg(verbose())
        .arg(threads())
        .arg(test_data())
        .arg(predictions())
        .arg(
            Arg::with_name("models")
                .long("models")
                .short("m")
                .value_name("JSON")
                .takes_value(true)
                .required(true)
                .help("Sampled models."),
        )
}

fn subcommand_decode() -> App<'static, 'static> {
    SubCommand::with_name("decode")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Predict labels by a fixed model given as TSV matrices and report error rates.")
        .arg(verbose())
        .arg(threads())
        .arg(test_data())
        .arg(predictions())
        .arg(
            Arg::with_name("transitions")
                .long("transitions")
                .short("a")
                .value_name("TSV")
                .takes_value(true)
                .required(true)
                .help("Transition matrix between real states. The start row is uniform."),
        )
        .arg(
            Arg::with_name("emissions")
                .long("emissions")
                .short("e")
                .value_name("TSV")
                .takes_value(true)
                .required(true)
                .help("Emission matrix. 20 rows, one column per state."),
        )
        .arg(
            Arg::with_name("layout")
                .long("layout")
                .takes_value(true)
                .default_value("A:15,O:12,B:9")
                .help("Labels of the states, in order."),
        )
        .arg(
            Arg::with_name("renormalize")
                .long("renormalize")
                .help("Normalize the rows of the transitions and the columns of the emissions."),
        )
}

fn parse<T: std::str::FromStr>(matches: &clap::ArgMatches, name: &str) -> Result<T> {
    matches
        .value_of(name)
        .and_then(|e| e.parse().ok())
        .ok_or_else(|| Error::Malformed(format!("invalid value for --{}", name)))
}

fn read_records(path: Option<&str>) -> Result<Vec<tophmm::fasta::LabeledRecord>> {
    let records = tophmm::fasta::read_fasta(&path)?;
    tophmm::fasta::pair_records(&records)
}

fn sample(matches: &clap::ArgMatches) -> Result<()> {
    let records = read_records(matches.value_of("train"))?;
    let pseudocount: f64 = parse(matches, "pseudocount")?;
    let (seqs, labels) = tophmm::fasta::training_pairs(&records);
    info!("Training on {} chains", seqs.len());
    let model = tophmm::Model::from_labeled_sequences(&seqs, &labels, pseudocount)?;
    debug!("INIT\n{}", model);
    let config = tophmm::SamplerConfig::new(
        parse(matches, "iterations")?,
        parse(matches, "sample_every")?,
        parse(matches, "burn_in")?,
        parse(matches, "max_states")?,
        parse(matches, "seed")?,
    );
    let chains: usize = parse(matches, "chains")?;
    let samples = if 1 < chains {
        tophmm::sampler::run_chains(&model, &seqs, config, chains)?
    } else {
        let wtr: Box<dyn Write> = match matches.value_of("trace") {
            Some(path) => Box::new(BufWriter::new(std::fs::File::create(path)?)),
            None => Box::new(std::io::stderr()),
        };
        let mut trace = tophmm::store::TraceWriter::new(wtr)?;
        let sampler = tophmm::Sampler::new(model, &seqs, config)?;
        let samples = sampler.run(|record| trace.write(record))?;
        trace.flush()?;
        samples
    };
    info!("Writing {} models", samples.len());
    let output = matches
        .value_of("output")
        .ok_or_else(|| Error::Malformed("no output".to_string()))?;
    tophmm::store::save_samples(output, &samples)
}

// Write `<id fields> <error rate>` for each labelled chain, then the total.
fn report(models: &[tophmm::Model], matches: &clap::ArgMatches) -> Result<()> {
    let records = read_records(matches.value_of("test"))?;
    let stdout = std::io::stdout();
    let mut wtr = BufWriter::new(stdout.lock());
    let (mut errors, mut total) = (0, 0);
    let mut predicted = vec![];
    for record in records.iter() {
        let labels = tophmm::consensus::consensus(models, &record.seq)?;
        if let Some(truth) = record.labels.as_ref() {
            let rate = tophmm::consensus::error_rate(&labels, truth)?;
            let id: Vec<_> = record.id.split(':').take(2).collect();
            writeln!(wtr, "{}\t{}", id.join("\t"), rate)?;
            errors += labels.iter().zip(truth).filter(|(p, t)| p != t).count();
            total += labels.len();
        }
        let labels = tophmm::alphabet::labels_to_string(&labels).into_bytes();
        predicted.push((record.id.clone(), labels));
    }
    wtr.flush()?;
    if 0 < total {
        let accuracy = 100f64 - errors as f64 * 100f64 / total as f64;
        eprintln!(
            "{} errors out of {} positions, accuracy {:.3}%",
            errors, total, accuracy
        );
    }
    if let Some(path) = matches.value_of("predictions") {
        let mut wtr = BufWriter::new(std::fs::File::create(path)?);
        tophmm::fasta::write_fasta(&mut wtr, &predicted)?;
    }
    Ok(())
}

fn predict(matches: &clap::ArgMatches) -> Result<()> {
    let path = matches
        .value_of("models")
        .ok_or_else(|| Error::Malformed("no models".to_string()))?;
    let models = tophmm::store::load_samples(path)?;
    info!("Loaded {} models", models.len());
    report(&models, matches)
}

fn decode(matches: &clap::ArgMatches) -> Result<()> {
    let (a, e) = match (matches.value_of("transitions"), matches.value_of("emissions")) {
        (Some(a), Some(e)) => (a, e),
        _ => return Err(Error::Malformed("no matrices".to_string())),
    };
    let layout = matches.value_of("layout").unwrap_or_default();
    let renormalize = matches.is_present("renormalize");
    let model = tophmm::store::load_model(a, e, layout, renormalize)?;
    tophmm::validate::validate_for_inference(&model)?;
    report(&[model], matches)
}

fn main() -> Result<()> {
    let matches = App::new("tophmm")
        .version("0.1")
        .author("Bansho Masutani")
        .about("Sample:[FASTA]->[JSON], Predict:[JSON]x[FASTA]->[TSV], Decode:[TSV]x[TSV]x[FASTA]->[TSV]")
        .setting(clap::AppSettings::ArgRequiredElseHelp)
        .subcommand(subcommand_sample())
        .subcommand(subcommand_predict())
        .subcommand(subcommand_decode())
        .get_matches();
    if let Some(sub_m) = matches.subcommand().1 {
        let level = match sub_m.occurrences_of("verbose") {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
        let threads: usize = parse(sub_m, "threads")?;
        if let Err(why) = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
        {
            debug!("{:?} The global thread pool is already built.", why);
        }
    }
    debug!("Start");
    match matches.subcommand() {
        ("sample", Some(sub_m)) => sample(sub_m),
        ("predict", Some(sub_m)) => predict(sub_m),
        ("decode", Some(sub_m)) => decode(sub_m),
        _ => unreachable!(),
    }
}
