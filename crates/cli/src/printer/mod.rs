use std::io::{self, IsTerminal, Write};

use keeper_fs::FileRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned columns, optionally colored.
    #[default]
    Human,
    /// NDJSON (newline-delimited JSON) for machine consumption.
    Json,
}

/// Color handling strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColorChoice {
    /// Automatically detect TTY and enable colors if appropriate.
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    pub fn parse(s: &str) -> Self {
        match s {
            "always" => ColorChoice::Always,
            "never" => ColorChoice::Never,
            _ => ColorChoice::Auto,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PrinterConfig {
    pub format: OutputFormat,
    pub color: ColorChoice,
    /// Maximum number of records to print.
    pub limit: usize,
    /// Print a one-line total to stderr at the end.
    pub show_summary: bool,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Human,
            color: ColorChoice::Auto,
            limit: 100,
            show_summary: true,
        }
    }
}

/// Static context about a print run.
#[derive(Debug)]
pub struct ListContext<'a> {
    pub store: &'a str,
    /// Number of records before the limit was applied.
    pub total: usize,
    pub truncated: bool,
}

/// Receives the records of one listing, in order.
pub trait RecordPrinter {
    /// Called once before any rows are printed.
    fn begin(&mut self, ctx: &ListContext) -> io::Result<()>;

    fn print_row(&mut self, record: &FileRecord, ctx: &ListContext) -> io::Result<()>;

    /// Called once after all rows are printed.
    fn finish(&mut self, ctx: &ListContext) -> io::Result<()>;
}

pub struct HumanPrinter<W: Write, E: Write> {
    out: W,
    err: E,
    cfg: PrinterConfig,
    use_color: bool,
}

impl<W: Write, E: Write> HumanPrinter<W, E> {
    /// `Auto` means no color here; only `stdout` can see the terminal.
    pub fn new(out: W, err: E, cfg: PrinterConfig) -> Self {
        let use_color = cfg.color == ColorChoice::Always;
        Self {
            out,
            err,
            cfg,
            use_color,
        }
    }

    pub fn stdout(cfg: PrinterConfig) -> HumanPrinter<io::Stdout, io::Stderr> {
        let use_color = match cfg.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => io::stdout().is_terminal(),
        };

        HumanPrinter {
            out: io::stdout(),
            err: io::stderr(),
            cfg,
            use_color,
        }
    }

    #[inline]
    fn format_path(&self, path: &str) -> String {
        if self.use_color {
            format!("\x1b[32m{}\x1b[0m", path)
        } else {
            path.to_owned()
        }
    }
}

pub struct JsonPrinter<W: Write, E: Write> {
    out: W,
    err: E,
    cfg: PrinterConfig,
}

impl<W: Write, E: Write> JsonPrinter<W, E> {
    pub fn new(out: W, err: E, cfg: PrinterConfig) -> Self {
        Self { out, err, cfg }
    }

    pub fn stdout(cfg: PrinterConfig) -> JsonPrinter<io::Stdout, io::Stderr> {
        JsonPrinter {
            out: io::stdout(),
            err: io::stderr(),
            cfg,
        }
    }
}

impl<W: Write, E: Write> RecordPrinter for HumanPrinter<W, E> {
    fn begin(&mut self, ctx: &ListContext) -> io::Result<()> {
        if ctx.total == 0 {
            return Ok(());
        }
        writeln!(
            self.out,
            "{:>8}  {:<19}  {:<12}  {:>8}  PATH",
            "SIZE_KB", "MODIFIED", "OWNER", "DELTA_KB"
        )
    }

    fn print_row(&mut self, record: &FileRecord, _ctx: &ListContext) -> io::Result<()> {
        let path = self.format_path(&record.path);
        writeln!(
            self.out,
            "{:>8}  {:<19}  {:<12}  {:>8}  {}",
            record.size_kb, record.modified_at, record.owner, record.observed_delta_size, path
        )
    }

    fn finish(&mut self, ctx: &ListContext) -> io::Result<()> {
        if ctx.truncated {
            let remaining = ctx.total.saturating_sub(self.cfg.limit);
            writeln!(self.out, "... and {} more records", remaining)?;
        }

        if self.cfg.show_summary {
            writeln!(self.err, "\n[list] {} records in {}", ctx.total, ctx.store)?;
        }

        Ok(())
    }
}

impl<W: Write, E: Write> RecordPrinter for JsonPrinter<W, E> {
    fn begin(&mut self, _ctx: &ListContext) -> io::Result<()> {
        Ok(())
    }

    fn print_row(&mut self, record: &FileRecord, _ctx: &ListContext) -> io::Result<()> {
        let line = serde_json::to_string(record).map_err(io::Error::other)?;
        writeln!(self.out, "{}", line)
    }

    fn finish(&mut self, ctx: &ListContext) -> io::Result<()> {
        if self.cfg.show_summary {
            let obj = serde_json::json!({
                "type": "summary",
                "store": ctx.store,
                "total": ctx.total,
                "truncated": ctx.truncated,
            });
            writeln!(self.err, "{}", obj)?;
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "printer_tests.rs"]
mod tests;
