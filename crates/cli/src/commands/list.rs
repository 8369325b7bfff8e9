use std::{
    io::{Stderr, Stdout},
    process::ExitCode,
};

use anyhow::Result;
use clap::Args;
use keeper_store::IndexStore;
use log::error;

use crate::commands::StoreArgs;
use crate::printer::{
    ColorChoice, HumanPrinter, JsonPrinter, ListContext, OutputFormat, PrinterConfig,
    RecordPrinter,
};

#[derive(Debug, Args)]
pub struct OutputOptions {
    /// Output records as NDJSON (one JSON object per line)
    #[arg(long)]
    pub json: bool,

    /// When to use colors: auto, always, never
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: String,

    /// Suppress the summary line
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

impl OutputOptions {
    pub fn make_printer(&self, limit: usize) -> Box<dyn RecordPrinter> {
        let format = if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        };

        let cfg = PrinterConfig {
            format,
            color: ColorChoice::parse(&self.color),
            limit,
            show_summary: !self.quiet,
        };

        match cfg.format {
            OutputFormat::Human => Box::new(HumanPrinter::<Stdout, Stderr>::stdout(cfg)),
            OutputFormat::Json => Box::new(JsonPrinter::<Stdout, Stderr>::stdout(cfg)),
        }
    }
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub store: StoreArgs,

    /// Only records whose path contains this text
    pub filter: Option<String>,

    /// Maximum number of records to display
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,

    #[command(flatten)]
    pub output: OutputOptions,
}

pub fn run(args: ListArgs) -> ExitCode {
    match execute(args) {
        Ok(code) => code,
        Err(e) => {
            error!("[error] {e:#}");
            eprintln!("[list] {e:#}");
            ExitCode::from(2)
        }
    }
}

fn execute(args: ListArgs) -> Result<ExitCode> {
    let location = args.store.store_path();
    if !location.exists() {
        eprintln!("[list] no index found at {}", location.display());
        return Ok(ExitCode::from(1));
    }

    let store = IndexStore::open_read_only(&location)?;
    let mut records = store.all()?;
    if let Some(filter) = &args.filter {
        records.retain(|r| r.path.contains(filter.as_str()));
    }

    let store_label = location.display().to_string();
    let ctx = ListContext {
        store: &store_label,
        total: records.len(),
        truncated: records.len() > args.limit,
    };

    let mut printer = args.output.make_printer(args.limit);
    printer.begin(&ctx)?;
    for record in records.iter().take(args.limit) {
        printer.print_row(record, &ctx)?;
    }
    printer.finish(&ctx)?;

    Ok(ExitCode::SUCCESS)
}
