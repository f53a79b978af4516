use clap::{CommandFactory, Parser};
use freqanno::{annotate_file, AnnotateError};
use log::info;

const INFO: &str = "\
freqanno: annotate association results with reference allele frequencies

The input and the reference frequency source must both be sorted by
(chromosome, position). Rows with no safe frequency correspondence are
written through unchanged.
";

#[derive(Parser)]
#[clap(name = "freqanno")]
#[clap(about = INFO)]
struct Cli {
    /// name of input association file
    #[arg(short = 'i', long)]
    input_filename: Option<String>,

    /// name of supercontinent (if using combined frequency file)
    #[arg(short = 's', long, default_value = "")]
    supercontinent: String,

    /// name of file with reference frequency data
    #[arg(short = 'f', long)]
    frequency_filename: Option<String>,

    /// name of file with reference frequency SNP annotations (optional)
    #[arg(short = 'm', long, default_value = "")]
    frequency_metadata_filename: String,

    /// name of output results file
    #[arg(short = 'o', long)]
    output_filename: Option<String>,
}

fn run(cli: &Cli) -> Result<(), AnnotateError> {
    let input_filename = cli
        .input_filename
        .as_deref()
        .ok_or(AnnotateError::MissingOption("input-filename"))?;
    let frequency_filename = cli
        .frequency_filename
        .as_deref()
        .ok_or(AnnotateError::MissingOption("frequency-filename"))?;
    let output_filename = cli
        .output_filename
        .as_deref()
        .ok_or(AnnotateError::MissingOption("output-filename"))?;
    let metadata = if cli.frequency_metadata_filename.is_empty() {
        None
    } else {
        Some(cli.frequency_metadata_filename.as_str())
    };
    if metadata.is_none() && cli.supercontinent.is_empty() {
        return Err(AnnotateError::MissingOption("supercontinent"));
    }

    info!(
        "starting processing of \"{}\" with \"{}\"",
        input_filename, frequency_filename
    );
    let stats = annotate_file(
        input_filename,
        frequency_filename,
        metadata,
        &cli.supercontinent,
        output_filename,
    )?;
    info!(
        "all done: \"{}\"; {} records, {} mapped, {} unmapped",
        output_filename, stats.total, stats.mapped, stats.unmapped
    );
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // with no arguments at all, behave as if --help were given
    if std::env::args().len() <= 1 {
        let _ = Cli::command().print_help();
        return;
    }

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
