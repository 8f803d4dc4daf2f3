use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::ValueEnum;
use template_fill::NaPolicy;
use template_fill::Outcome;
use template_fill::Session;
use template_fill::TransferConfig;
use template_fill::TransferRequest;
use template_fill::Upload;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum NaPolicyArg {
    /// Blank the destination cell, keeping its style
    Keep,
    /// Write an empty text value
    EmptyString,
    /// Leave the destination cell untouched
    Skip,
}

impl From<NaPolicyArg> for NaPolicy {
    fn from(value: NaPolicyArg) -> Self {
        match value {
            NaPolicyArg::Keep => NaPolicy::Keep,
            NaPolicyArg::EmptyString => NaPolicy::EmptyString,
            NaPolicyArg::Skip => NaPolicy::Skip,
        }
    }
}

#[derive(Parser)]
#[command(version, about = "Paste source columns into an Excel template by matching header names.")]
struct Args {
    /// Workbook holding the data to paste.
    #[arg(long)]
    source: PathBuf,

    /// Template workbook. When omitted, the source file is also the template.
    #[arg(long)]
    destination: Option<PathBuf>,

    /// Sheet holding the data (default: first sheet).
    #[arg(long)]
    source_sheet: Option<String>,

    /// Template sheet receiving the data (default: "Workbook Consolidado").
    #[arg(long)]
    destination_sheet: Option<String>,

    /// Template row holding the headers, 1-based (default: 1).
    #[arg(long)]
    header_row: Option<usize>,

    /// First template row written, 1-based (default: 2).
    #[arg(long)]
    start_row: Option<usize>,

    /// What to write for missing source values (default: keep).
    #[arg(long, value_enum)]
    na_policy: Option<NaPolicyArg>,

    /// Source row holding the column names, 1-based (default: 1).
    #[arg(long)]
    source_header_row: Option<usize>,

    /// TOML file with default values for the options above.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the result (default: the configured output file name).
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Args {
    /// File values first, then command-line overrides
    fn transfer_config(&self) -> Result<TransferConfig> {
        let mut config = match &self.config {
            Some(path) => TransferConfig::load(path)?,
            None => TransferConfig::default(),
        };
        if let Some(sheet) = &self.source_sheet {
            config.source_sheet = Some(sheet.to_owned());
        }
        if let Some(sheet) = &self.destination_sheet {
            config.destination_sheet = sheet.to_owned();
        }
        if let Some(row) = self.header_row {
            config.header_row = row;
        }
        if let Some(row) = self.start_row {
            config.start_row = row;
        }
        if let Some(policy) = self.na_policy {
            config.na_policy = policy.into();
        }
        if let Some(row) = self.source_header_row {
            config.source_header_row = row;
        }
        Ok(config)
    }

    /// Uploads and config of the run. Without `--destination` the source is also the template.
    fn request(&self) -> Result<TransferRequest> {
        Ok(TransferRequest {
            source: upload(&self.source)?,
            destination: self.destination.as_ref().map(upload).transpose()?,
            config: self.transfer_config()?,
        })
    }
}

fn upload(path: &PathBuf) -> Result<Upload> {
    let bytes = std::fs::read(path).with_context(|| format!("Read '{}'", path.display()))?;
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Upload::new(&name, bytes))
}

fn run(args: Args) -> Result<bool> {
    let request = args.request()?;
    let mut session = Session::new();
    match session.submit(request) {
        Outcome::Success { message, .. } => {
            let Some(artifact) = session.take_artifact() else {
                anyhow::bail!("No workbook was produced");
            };
            let output = args.output.unwrap_or_else(|| PathBuf::from(&artifact.file_name));
            std::fs::write(&output, &artifact.bytes)
                .with_context(|| format!("Write '{}'", output.display()))?;
            println!("{message}");
            println!("Saved {} ({} bytes)", output.display(), artifact.bytes.len());
            Ok(true)
        }
        Outcome::Failure { message, .. } => {
            eprintln!("{message}");
            Ok(false)
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}
