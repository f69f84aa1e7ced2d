use std::fs::File;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use simplelog::{LevelFilter, WriteLogger};

use pco::backend::open_document;
use pco::config::Config;
use pco::error::{AppError, AppResult};
use pco::highlight::{HighlightRect, HighlightRequest, anchor_for, parse_citations};
use pco::overlay::{HighlightRenderer, SvgOverlay, Viewport};
use pco::session::DocumentSession;

#[derive(Debug, Parser)]
#[command(name = "pco", about = "Compute citation highlight rectangles for PDF pages")]
struct Cli {
    /// Config file (defaults to $PCO_CONFIG_PATH or ~/.config/pco/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the flattened text of a page.
    Text {
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    /// Highlight an offset range on a page.
    Rects {
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, allow_negative_numbers = true)]
        start: i64,
        #[arg(long, allow_negative_numbers = true)]
        end: i64,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Highlight every occurrence of a query on a page.
    Search {
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long)]
        query: String,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Highlight citations read from a JSON file (object, array or null).
    Citations {
        file: PathBuf,
        #[arg(long)]
        citations: PathBuf,
        /// Citation id whose first rectangle is reported as the scroll anchor.
        #[arg(long)]
        active: Option<String>,
    },
}

#[derive(Debug, clap::Args)]
struct OutputArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
    /// Display scale applied to page-space rectangles (defaults to the config value).
    #[arg(long)]
    scale: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Svg,
}

fn main() {
    if let Err(err) = run(Cli::parse()) {
        log::error!("{err}");
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> AppResult<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    log::debug!("effective config: {config:?}");

    match cli.command {
        Command::Text { file, page } => {
            let mut session = open_session(&file, &config)?;
            let map = session.char_map(page_index(page)?)?;
            println!("{}", map.text());
            Ok(())
        }
        Command::Rects {
            file,
            page,
            start,
            end,
            output,
        } => {
            let mut session = open_session(&file, &config)?;
            let request = HighlightRequest::new(page_index(page)?, start, end);
            let rects = session.highlight(&request)?;
            log::info!(
                "{} rect(s) for offsets {start}..{end} on page {page}",
                rects.len()
            );
            emit_rects(&session, request.page_index, &rects, &output, &config)
        }
        Command::Search {
            file,
            page,
            query,
            output,
        } => {
            let mut session = open_session(&file, &config)?;
            let index = page_index(page)?;
            let groups = session.highlight_query(index, &query)?;
            log::info!("{} match(es) for {query:?} on page {page}", groups.len());
            let rects: Vec<HighlightRect> = groups.into_iter().flatten().collect();
            emit_rects(&session, index, &rects, &output, &config)
        }
        Command::Citations {
            file,
            citations,
            active,
        } => {
            let raw = std::fs::read_to_string(&citations).map_err(|source| {
                AppError::io_with_context(
                    source,
                    format!("failed to read citations: {}", citations.display()),
                )
            })?;
            let citations = parse_citations(&raw)?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            let mut session = open_session(&file, &config)?;
            let rects = session.highlight_citations(&file_name, &citations);
            let anchor = active.as_deref().and_then(|id| anchor_for(&rects, id));

            #[derive(Serialize)]
            #[serde(rename_all = "camelCase")]
            struct CitationOutput<'a> {
                rects: &'a [pco::highlight::TaggedRect],
                anchor: Option<&'a pco::highlight::TaggedRect>,
            }

            print_json(&CitationOutput {
                rects: &rects,
                anchor,
            })
        }
    }
}

fn init_logging(verbose: u8, log_file: Option<&Path>) -> AppResult<()> {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let config = simplelog::Config::default();

    let result = match log_file {
        Some(path) => {
            let file = File::create(path).map_err(|source| {
                AppError::io_with_context(
                    source,
                    format!("failed to create log file: {}", path.display()),
                )
            })?;
            WriteLogger::init(level, config, file)
        }
        None => WriteLogger::init(level, config, std::io::stderr()),
    };
    result.map_err(|err| AppError::unsupported(format!("logger already initialized: {err}")))
}

fn open_session(file: &Path, config: &Config) -> AppResult<DocumentSession> {
    let doc = open_document(file)?;
    log::info!(
        "opened {} ({} page(s))",
        file.display(),
        doc.page_count()
    );
    Ok(DocumentSession::new(doc, config))
}

fn page_index(page_number: usize) -> AppResult<usize> {
    page_number
        .checked_sub(1)
        .ok_or_else(|| AppError::invalid_argument("pages are numbered from 1"))
}

fn emit_rects(
    session: &DocumentSession,
    page: usize,
    rects: &[HighlightRect],
    output: &OutputArgs,
    config: &Config,
) -> AppResult<()> {
    let scale = output
        .scale
        .filter(|scale| scale.is_finite() && *scale > 0.0)
        .unwrap_or(config.overlay.scale);
    let viewport = Viewport::scaled(scale);

    match output.format {
        OutputFormat::Json => {
            let screen: Vec<_> = rects.iter().map(|rect| rect.to_screen(viewport)).collect();

            #[derive(Serialize)]
            #[serde(rename_all = "camelCase")]
            struct RectOutput<'a> {
                scale: f64,
                rects: &'a [HighlightRect],
                screen: Vec<pco::overlay::ScreenRect>,
                percent: Vec<pco::overlay::PercentRect>,
            }

            print_json(&RectOutput {
                scale,
                rects,
                screen,
                percent: rects.iter().map(HighlightRect::to_percent).collect(),
            })
        }
        OutputFormat::Svg => {
            let geometry = session.doc().page_geometry(page)?;
            let mut overlay = SvgOverlay::new(&config.overlay);
            overlay.render_page(&geometry, rects, viewport)?;
            for svg in overlay.documents() {
                print!("{svg}");
            }
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|source| AppError::json_with_context(source, "failed to encode output"))?;
    println!("{json}");
    Ok(())
}
