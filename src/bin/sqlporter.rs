//! sqlporter: SQL schema conversion CLI
//!
//! # Usage
//!
//! ```bash
//! # Convert a MySQL dump to PostgreSQL
//! sqlporter convert dump.sql --from mysql --to postgres -o schema.pg.sql
//!
//! # Convert several files at once
//! sqlporter convert a.sql b.sql --from mysql --to sqlite --out-dir out/
//!
//! # Summarize what a script defines
//! sqlporter inspect schema.sql --from postgres --format json
//! ```

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::*;
use sqlporter::cancel::CancelToken;
use sqlporter::config::Config;
use sqlporter::prelude::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlporter")]
#[command(version)]
#[command(about = "Convert SQL schema scripts between MySQL, PostgreSQL and SQLite", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlporter convert dump.sql --from mysql --to postgres
    sqlporter convert a.sql b.sql --from pg --to sqlite --out-dir out/
    cat schema.sql | sqlporter convert - --from sqlite --to mysql --parallel 4")]
struct Cli {
    /// Config file (default: ./sqlporter.toml, then the user config dir)
    #[arg(long, global = true, env = "SQLPORTER_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert scripts from one dialect to another
    Convert {
        /// Input files, `-` for stdin
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Source dialect
        #[arg(short, long)]
        from: Option<Dialect>,

        /// Target dialect
        #[arg(short, long)]
        to: Option<Dialect>,

        /// Output file (single input only; default stdout)
        #[arg(short, long, conflicts_with = "out_dir")]
        output: Option<PathBuf>,

        /// Directory for converted files (required for several inputs)
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Parse each script with N threads
        #[arg(short, long)]
        parallel: Option<usize>,

        /// Keep input order when parsing in parallel
        #[arg(long)]
        ordered: bool,

        /// Statement delimiter of the input
        #[arg(short, long)]
        delimiter: Option<String>,

        /// Omit the generated-by header
        #[arg(long)]
        no_header: bool,
    },
    /// Show the objects a script defines
    Inspect {
        /// Input file, `-` for stdin
        input: PathBuf,

        /// Source dialect
        #[arg(short, long)]
        from: Option<Dialect>,

        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Statement delimiter of the input
        #[arg(short, long)]
        delimiter: Option<String>,
    },
    /// List supported dialects
    Dialects,
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn setup_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("sqlporter=warn"),
        1 => EnvFilter::new("sqlporter=debug,warn"),
        _ => EnvFilter::new("sqlporter=trace,warn"),
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::discover()?,
    };

    match cli.command {
        Commands::Convert {
            inputs,
            from,
            to,
            output,
            out_dir,
            parallel,
            ordered,
            delimiter,
            no_header,
        } => {
            let job = Job {
                from: from
                    .or(config.convert.from)
                    .ok_or_else(|| anyhow!("no source dialect; pass --from or set convert.from"))?,
                to: to
                    .or(config.convert.to)
                    .ok_or_else(|| anyhow!("no target dialect; pass --to or set convert.to"))?,
                delimiter: delimiter.or_else(|| config.convert.delimiter.clone()),
                parallel: parallel.or(config.convert.parallel),
                ordered: ordered || config.convert.ordered,
                header: !no_header,
            };
            match (inputs.as_slice(), out_dir) {
                ([input], None) => convert_one(&job, input, output.as_deref()),
                (_, None) => bail!("several inputs need --out-dir"),
                (_, Some(dir)) => convert_many(&job, &inputs, &dir, &config),
            }
        }
        Commands::Inspect {
            input,
            from,
            format,
            delimiter,
        } => {
            let from = from
                .or(config.convert.from)
                .ok_or_else(|| anyhow!("no source dialect; pass --from or set convert.from"))?;
            let job = Job {
                from,
                to: from,
                delimiter: delimiter.or_else(|| config.convert.delimiter.clone()),
                parallel: config.convert.parallel,
                ordered: true,
                header: false,
            };
            let schema = job
                .parse(&input)
                .with_context(|| format!("failed to parse {}", input.display()))?;
            inspect(&schema, format)
        }
        Commands::Dialects => {
            show_dialects();
            Ok(())
        }
    }
}

/// One conversion's settings, shared by every input.
struct Job {
    from: Dialect,
    to: Dialect,
    delimiter: Option<String>,
    parallel: Option<usize>,
    ordered: bool,
    header: bool,
}

impl Job {
    fn parser(&self) -> StreamParser {
        let parser = StreamParser::new(self.from);
        match &self.delimiter {
            Some(d) => parser.with_delimiter(d.clone()),
            None => parser,
        }
    }

    fn parse(&self, input: &Path) -> sqlporter::Result<Schema> {
        let reader = open_input(input)?;
        let parser = self.parser();
        let mut schema = Schema::new();
        let collect = |object: SchemaObject| -> sqlporter::Result<()> {
            schema.insert(object);
            Ok(())
        };
        match self.parallel {
            Some(n) if n > 1 && self.ordered => {
                parser.parse_stream_parallel_ordered(reader, collect, n)?
            }
            Some(n) if n > 1 => parser.parse_stream_parallel(reader, collect, n)?,
            _ => parser.parse_stream(reader, collect)?,
        }
        debug!(input = %input.display(), objects = schema.object_count(), "Parsed input");
        Ok(schema)
    }

    fn render(&self, schema: &Schema, source: &Path, out: &mut dyn Write) -> sqlporter::Result<()> {
        if self.header {
            writeln!(
                out,
                "-- Generated by sqlporter {} from {} ({} -> {})",
                env!("CARGO_PKG_VERSION"),
                source.display(),
                self.from,
                self.to
            )?;
            writeln!(out, "-- {}\n", Local::now().format("%Y-%m-%d %H:%M:%S %z"))?;
        }
        StreamGenerator::new(self.to).generate_stream(schema, out)
    }
}

fn open_input(path: &Path) -> sqlporter::Result<Box<dyn Read + Send>> {
    if path.as_os_str() == "-" {
        Ok(Box::new(io::stdin()))
    } else {
        Ok(Box::new(File::open(path)?))
    }
}

fn convert_one(job: &Job, input: &Path, output: Option<&Path>) -> Result<()> {
    let schema = job
        .parse(input)
        .with_context(|| format!("failed to parse {}", input.display()))?;

    let sink: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("cannot create {}", path.display()))?,
        ),
        None => Box::new(io::stdout().lock()),
    };
    let mut sink = BufWriter::new(sink);
    job.render(&schema, input, &mut sink)?;
    sink.flush()?;

    if let Some(path) = output {
        eprintln!(
            "{} {} objects → {}",
            "✓".green(),
            schema.object_count().to_string().cyan(),
            path.display()
        );
    }
    Ok(())
}

fn convert_many(job: &Job, inputs: &[PathBuf], out_dir: &Path, config: &Config) -> Result<()> {
    if inputs.iter().any(|p| p.as_os_str() == "-") {
        bail!("stdin cannot be combined with other inputs");
    }
    fs::create_dir_all(out_dir).with_context(|| format!("cannot create {}", out_dir.display()))?;

    let processor = BatchProcessor::new(config.batch_config().with_error_handler(|err: &PortError| {
        eprintln!("{} {}", "✗".red(), err);
    }));

    processor
        .process_batch(&CancelToken::new(), inputs, |input, ctx| {
            let schema = job.parse(input)?;
            ctx.checkpoint()?;

            let mut local = Vec::new();
            let buf = match ctx.buffer() {
                Some(buf) => buf,
                None => &mut local,
            };
            job.render(&schema, input, &mut *buf)?;

            let name = input.file_name().unwrap_or(input.as_os_str());
            let target = out_dir.join(name);
            fs::write(&target, buf.as_slice())?;
            eprintln!("{} {} → {}", "✓".green(), input.display(), target.display());
            Ok(())
        })
        .context("batch conversion failed")?;

    eprintln!("{} converted {} files", "✓".green().bold(), inputs.len().to_string().cyan());
    Ok(())
}

fn inspect(schema: &Schema, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(schema)?);
        }
        OutputFormat::Table => {
            if schema.is_empty() {
                println!("{}", "(no objects)".dimmed());
                return Ok(());
            }
            println!("{:10} {:30} {}", "Kind".white().bold(), "Name".white().bold(), "Details".white().bold());
            println!("{}", "─".repeat(60).dimmed());
            for table in &schema.tables {
                let details = format!("{} columns, {} indexes", table.columns.len(), table.indexes.len());
                println!("{:10} {:30} {}", "table".cyan(), table.name, details.dimmed());
            }
            for index in &schema.detached_indexes {
                println!("{:10} {:30} {}", "index".cyan(), index.index.name, format!("on {}", index.table).dimmed());
            }
            for view in &schema.views {
                println!("{:10} {}", "view".cyan(), view.name);
            }
            for function in &schema.functions {
                let details = format!("returns {}", function.returns);
                println!("{:10} {:30} {}", "function".cyan(), function.name, details.dimmed());
            }
            for procedure in &schema.procedures {
                let details = format!("{} parameters", procedure.parameters.len());
                println!("{:10} {:30} {}", "procedure".cyan(), procedure.name, details.dimmed());
            }
            for trigger in &schema.triggers {
                let details = format!("{} on {}", trigger.timing, trigger.table);
                println!("{:10} {:30} {}", "trigger".cyan(), trigger.name, details.dimmed());
            }
            println!();
            println!("{} object(s)", schema.object_count().to_string().cyan());
        }
    }
    Ok(())
}

fn show_dialects() {
    println!("{}", "Supported dialects".cyan().bold());
    println!();
    for dialect in Dialect::ALL {
        println!("  {:10} {}", dialect.name().yellow().bold(), dialect.description().dimmed());
    }
    println!();
    println!("{}", "Aliases: mariadb, postgresql, pg, sqlite3".dimmed());
}
