use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

use dtdtree::{
    error::{Error, IoError, Result},
    factory, Dtd,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Input XML file path
    #[arg(short, long)]
    file: String,

    /// DTD file path, overriding the document DOCTYPE
    #[arg(short, long)]
    dtd: Option<String>,

    /// Load the document without validating it against its DTD
    #[arg(long)]
    skip_validation: bool,

    /// Output file path
    #[arg(short, long)]
    output: Option<String>,
}

fn main() {
    // Initialize the default subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .without_time()
        .init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    info!("Reading file: {}", args.file);
    let validate = !args.skip_validation;
    let tree = match &args.dtd {
        Some(dtd_path) => {
            let content = read_file(&args.file)?;
            factory::load_string_with_dtd(&content, &Dtd::from_url(dtd_path.clone()), validate)?
        }
        None => factory::load_file(&args.file, validate)?,
    };
    if validate {
        info!("Document is valid");
    }

    let formatted = tree.serialize()?;
    if let Some(output_path) = args.output {
        std::fs::write(&output_path, formatted)
            .map_err(|e| Error::io(IoError::WriteError(e.to_string())))?;
    } else {
        println!("{}", formatted);
    }

    Ok(())
}

fn read_file(path: &str) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::io(IoError::FileNotFound(path.to_string())),
        _ => Error::io(IoError::ReadError(e.to_string())),
    })
}
