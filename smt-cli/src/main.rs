use clap::{Args, Parser, Subcommand};
use log::info;
use serde::Deserialize;
use std::fs;
use smt_core::{
    alignment::suggested_iterations, parse_moses_line, parse_phrase_table, parse_plaintext, write_moses,
    write_phrase_table, Alignment, DecoderConfig, Direction, ExtractOptions, PhraseTable, PhraseTableBuilder,
    StackDecoder, Symmetrizer, TrainOptions,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// JSON file with "train", "extract" and "decoder" sections
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Symmetrized word alignments in Moses format
    Align {
        #[command(flatten)]
        corpus: CorpusArgs,
        #[arg(short = 'o', long = "output", default_value = "-")]
        output: String,
        #[arg(short = 'f', long = "forward")]
        links_fwd: Option<String>,
        #[arg(short = 'r', long = "reverse")]
        links_rev: Option<String>,
    },
    /// Phrase table as `source ||| target ||| forward backward` lines
    Extract {
        #[command(flatten)]
        corpus: CorpusArgs,
        #[arg(short = 'o', long = "output", default_value = "-")]
        output: String,
        /// Precomputed Moses alignments; skips training
        #[arg(short = 'a', long = "alignment")]
        alignment: Option<String>,
        #[arg(short = 'l', long = "max-length")]
        max_length: Option<usize>,
    },
    /// Best translation of every input line
    Decode {
        #[arg(short = 'p', long = "phrase-table")]
        phrase_table: String,
        #[arg(short = 'i', long = "input", default_value = "-")]
        input: String,
        #[arg(short = 'o', long = "output", default_value = "-")]
        output: String,
        #[arg(short = 'b', long = "beam")]
        beam_size: Option<usize>,
        #[arg(short = 'd', long = "direction", value_parser = parse_direction)]
        direction: Option<Direction>,
        #[arg(long, default_value_t = false)]
        future_cost: bool,
    },
}

#[derive(Args, Debug)]
struct CorpusArgs {
    #[arg(short = 's', long = "source", default_value = "-")]
    source: String,
    #[arg(short = 't', long = "target", default_value = "-")]
    target: String,
    #[arg(short = '1', default_value_t = 0)]
    it1: usize,
    #[arg(short = '2', default_value_t = 0)]
    it2: usize,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct Config {
    train: Option<TrainOptions>,
    extract: ExtractOptions,
    decoder: DecodeSection,
}

// Search settings plus the phrase-table direction they run over
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct DecodeSection {
    #[serde(flatten)]
    search: DecoderConfig,
    direction: Direction,
}

fn parse_direction(s: &str) -> Result<Direction, String> {
    match s {
        "source-to-target" | "s2t" => Ok(Direction::SourceToTarget),
        "target-to-source" | "t2s" => Ok(Direction::TargetToSource),
        _ => Err(format!("unknown direction '{s}'")),
    }
}

fn read_all(path: &str) -> std::io::Result<String> {
    if path == "-" {
        use std::io::Read;
        let mut s = String::new();
        std::io::stdin().read_to_string(&mut s)?;
        Ok(s)
    } else {
        fs::read_to_string(path)
    }
}

fn write_all(path: Option<String>, data: &str) -> std::io::Result<()> {
    if let Some(p) = path {
        if p == "-" { print!("{data}"); }
        else { fs::write(p, data)?; }
    }
    Ok(())
}

fn read_config(path: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    match path {
        Some(p) => Ok(serde_json::from_str(&read_all(p)?)?),
        None => Ok(Config::default()),
    }
}

fn read_corpus(args: &CorpusArgs) -> Result<smt_core::Corpus, Box<dyn std::error::Error>> {
    if args.source == "-" && args.target == "-" {
        return Err("source and target cannot both be read from stdin".into());
    }
    let src_s = read_all(&args.source)?;
    let tgt_s = read_all(&args.target)?;
    Ok(parse_plaintext(&src_s, &tgt_s)?)
}

// Explicit -1/-2 win over the config file; without either, iterations
// follow the corpus size.
fn train_options(args: &CorpusArgs, config: Option<&TrainOptions>, n_sentences: usize) -> TrainOptions {
    let (approx_it1, approx_it2) = suggested_iterations(n_sentences);
    let mut opts = config.cloned().unwrap_or_else(|| TrainOptions::with_iterations(approx_it1, approx_it2));
    if args.it1 > 0 { opts.model1_iterations = args.it1; }
    if args.it2 > 0 { opts.model2_iterations = args.it2; }
    opts
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();
    let config = read_config(cli.config.as_deref())?;

    match cli.command {
        Command::Align { corpus, output, links_fwd, links_rev } => {
            let parsed = read_corpus(&corpus)?;
            let opts = train_options(&corpus, config.train.as_ref(), parsed.len());
            info!("training on {} sentence pairs, iterations {}/{}", parsed.len(), opts.model1_iterations, opts.model2_iterations);
            let symmetrizer = Symmetrizer::train(&parsed, &opts);

            // Directional links are written as (source, target) too
            if links_fwd.is_some() {
                let fwd: Vec<Alignment> = parsed
                    .pairs
                    .iter()
                    .map(|p| Alignment::from_forward(&symmetrizer.forward.align(&p.source.tokens, &p.target.tokens)))
                    .collect();
                write_all(links_fwd, &write_moses(&fwd)?)?;
            }
            if links_rev.is_some() {
                let rev: Vec<Alignment> = parsed
                    .pairs
                    .iter()
                    .map(|p| Alignment::from_reverse(&symmetrizer.reverse.align(&p.target.tokens, &p.source.tokens)))
                    .collect();
                write_all(links_rev, &write_moses(&rev)?)?;
            }

            let merged = symmetrizer.symmetrize_corpus(&parsed)?;
            write_all(Some(output), &write_moses(&merged)?)?;
        }
        Command::Extract { corpus, output, alignment, max_length } => {
            let parsed = read_corpus(&corpus)?;
            let mut extract_opts = config.extract.clone();
            if max_length.is_some() {
                extract_opts.max_length = max_length;
            }
            let table = match alignment {
                Some(path) => {
                    let links = read_all(&path)?;
                    let alignments = links.lines().map(parse_moses_line).collect::<Result<Vec<_>, _>>()?;
                    if alignments.len() != parsed.len() {
                        return Err(format!("{} alignments for {} sentence pairs", alignments.len(), parsed.len()).into());
                    }
                    let mut builder = PhraseTableBuilder::new(extract_opts);
                    for (k, a) in alignments.iter().enumerate() {
                        builder.add(&parsed.source_words(k), &parsed.target_words(k), a)?;
                    }
                    builder.build()
                }
                None => {
                    let opts = train_options(&corpus, config.train.as_ref(), parsed.len());
                    PhraseTable::train(&parsed, &opts, &extract_opts)?
                }
            };
            info!("{} phrase pairs", table.len());
            write_all(Some(output), &write_phrase_table(&table))?;
        }
        Command::Decode { phrase_table, input, output, beam_size, direction, future_cost } => {
            let table = parse_phrase_table(&read_all(&phrase_table)?)?;
            let DecodeSection { search: mut decoder_config, direction: config_direction } = config.decoder;
            if let Some(b) = beam_size { decoder_config.beam_size = b; }
            if future_cost { decoder_config.future_cost = true; }

            let direction = direction.unwrap_or(config_direction);
            info!("decoding {:?} with beam {}", direction, decoder_config.beam_size);
            let decoder = StackDecoder::new(table.directed(direction), decoder_config);
            let text = read_all(&input)?;
            let mut out = String::new();
            for line in text.lines() {
                let words: Vec<&str> = line.split_whitespace().collect();
                if !words.is_empty() {
                    let decoding = decoder.decode(&words)?;
                    if let Some(best) = decoding.best_translation() {
                        out.push_str(&best.join(" "));
                    }
                }
                out.push('\n');
            }
            write_all(Some(output), &out)?;
        }
    }

    Ok(())
}
