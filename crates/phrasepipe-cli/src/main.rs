use anyhow::Result;
use clap::{Parser, Subcommand};
use phrasepipe::{PageRequest, RawSentencePair};
use phrasepipe_local::language::{LanguagePair, UnknownLanguagePolicy, LANGUAGES};
use phrasepipe_local::{CollectionState, EntryFilter};
use std::path::PathBuf;

mod config;

use config::{FetchArgs, LogFormat, SiteArgs};

#[derive(Parser, Debug)]
#[command(name = "phrasepipe")]
#[command(about = "Collect bilingual example sentences for a query", long_about = None)]
struct Cli {
    /// Log line format (logs always go to stderr).
    #[arg(
        long,
        value_enum,
        global = true,
        env = "PHRASEPIPE_LOG_FORMAT",
        default_value = "text"
    )]
    log_format: LogFormat,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch result pages for an input and write the dictionary output (json).
    Run(RunCmd),
    /// Print the page URLs a run would request, without fetching (json).
    Urls(UrlsCmd),
    /// Run extraction + filtering over a saved HTML page (json).
    Extract(ExtractCmd),
    /// List the language names accepted in input (json).
    Languages(OutputFormatCmd),
    /// Print version info.
    Version(OutputFormatCmd),
}

#[derive(clap::Args, Debug)]
struct RunCmd {
    /// Input JSON: { "query": ..., "source": ..., "translation": ... }. Reads stdin when omitted or "-".
    #[arg(long)]
    input: Option<PathBuf>,
    /// Output JSON path (default: stdout). Nothing is written when the run fails.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Pretty-print the output JSON.
    #[arg(long)]
    pretty: bool,
    /// What to do with a language name that has no code. Allowed: any, fail
    #[arg(long, env = "PHRASEPIPE_UNKNOWN_LANGUAGE", default_value = "any")]
    unknown_language: UnknownLanguagePolicy,
    #[command(flatten)]
    fetch: FetchArgs,
    #[command(flatten)]
    site: SiteArgs,
}

#[derive(clap::Args, Debug)]
struct UrlsCmd {
    /// Input JSON (stdin when omitted or "-").
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long, env = "PHRASEPIPE_UNKNOWN_LANGUAGE", default_value = "any")]
    unknown_language: UnknownLanguagePolicy,
    #[command(flatten)]
    site: SiteArgs,
}

#[derive(clap::Args, Debug)]
struct ExtractCmd {
    /// Saved result page.
    #[arg(long)]
    html: PathBuf,
    /// Print every candidate pair instead of the accepted entries.
    #[arg(long)]
    raw: bool,
    #[arg(long)]
    pretty: bool,
    #[command(flatten)]
    site: SiteArgs,
}

#[derive(clap::Args, Debug)]
struct OutputFormatCmd {
    /// Output format: json|text
    #[arg(long = "output", alias = "format", default_value = "json")]
    output: String,
}

async fn run(args: RunCmd) -> Result<()> {
    let input = config::read_input(args.input.as_deref())?;
    tracing::info!(
        query = %input.query,
        source = %input.source,
        translation = %input.translation,
        "input accepted"
    );

    let fetcher = args.fetch.fetcher()?;
    let collector = args.site.collector(fetcher)?;
    let output = collector.run(&input, args.unknown_language).await?;
    config::write_json(&output, args.out.as_deref(), args.pretty)
}

fn urls(args: UrlsCmd) -> Result<()> {
    let input = config::read_input(args.input.as_deref())?;
    let langs = LanguagePair::for_query(&input, args.unknown_language)?;
    let builder = args.site.url_builder()?;
    let reqs: Vec<PageRequest> = (0..args.site.pages_max)
        .map(|i| builder.request(&input.query, &langs.source, &langs.target, i))
        .collect();
    config::write_json(&reqs, None, false)
}

fn extract(args: ExtractCmd) -> Result<()> {
    let html = std::fs::read_to_string(&args.html)?;
    let candidates: Vec<RawSentencePair> = args.site.extractor()?.extract(&html);
    if args.raw {
        return config::write_json(&candidates, None, args.pretty);
    }
    let (accepted, state) = EntryFilter::new(args.site.words_min)
        .consider_all(candidates, CollectionState::new(args.site.entries_max));
    tracing::info!(
        accepted = state.accepted_count(),
        saturated = state.is_saturated(),
        "page filtered"
    );
    config::write_json(&accepted, None, args.pretty)
}

fn languages(args: OutputFormatCmd) -> Result<()> {
    match args.output.to_ascii_lowercase().as_str() {
        "text" => {
            for (name, code) in LANGUAGES {
                println!("{name}\t{code}");
            }
        }
        _ => {
            let v: Vec<serde_json::Value> = LANGUAGES
                .iter()
                .map(|(name, code)| serde_json::json!({ "name": name, "code": code }))
                .collect();
            println!("{}", serde_json::Value::Array(v));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before parsing: clap reads env fallbacks during parse.
    config::load_env_file();

    let cli = Cli::parse();
    config::init_tracing(cli.log_format);

    match cli.command {
        Commands::Run(args) => run(args).await?,
        Commands::Urls(args) => urls(args)?,
        Commands::Extract(args) => extract(args)?,
        Commands::Languages(args) => languages(args)?,
        Commands::Version(args) => {
            let v = serde_json::json!({
                "schema_version": 1,
                "kind": "version",
                "ok": true,
                "name": "phrasepipe",
                "version": env!("CARGO_PKG_VERSION"),
            });
            match args.output.to_ascii_lowercase().as_str() {
                "text" => println!("phrasepipe {}", env!("CARGO_PKG_VERSION")),
                _ => println!("{}", v),
            }
        }
    }
    Ok(())
}
