use anyhow::{Context, Result};
use phrasepipe::{Bounds, FetchSettings, PageFetcher, Query, DEFAULT_TIMEOUT_MS};
use phrasepipe_local::extract::{
    DEFAULT_BLOCK_SELECTOR, DEFAULT_SENTENCE_SELECTOR, DEFAULT_TRANSLATION_SELECTOR,
};
use phrasepipe_local::page_url::DEFAULT_BASE_URL;
use phrasepipe_local::{
    ExtractSelectors, HttpFetcher, PageUrlBuilder, PhraseCollector, RenderFetcher,
    SentencePairExtractor,
};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Load `KEY=VALUE` lines from `PHRASEPIPE_ENV_FILE`, if set.
///
/// Keys already present in the process environment win. Values are never logged
/// (logging is not initialized yet at this point anyway).
pub fn load_env_file() {
    let Ok(p) = std::env::var("PHRASEPIPE_ENV_FILE") else {
        return;
    };
    let p = p.trim();
    if p.is_empty() {
        return;
    }
    let Ok(txt) = std::fs::read_to_string(p) else {
        return;
    };
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v.trim());
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Logs go to stderr; stdout is reserved for JSON results.
pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::EnvFilter;

    let filter = std::env::var("PHRASEPIPE_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    // Only fails when a global subscriber is already installed.
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Site, bounds and extraction knobs shared by every subcommand that touches pages.
#[derive(clap::Args, Debug, Clone)]
pub struct SiteArgs {
    /// Site root used to build result-page URLs.
    #[arg(long, env = "PHRASEPIPE_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
    /// Maximum entries accepted over the whole run.
    #[arg(long, env = "PHRASEPIPE_ENTRIES_MAX", default_value_t = phrasepipe::ENTRIES_MAX)]
    pub entries_max: usize,
    /// Minimum words in a sentence (after `!` is removed).
    #[arg(long, env = "PHRASEPIPE_WORDS_MIN", default_value_t = phrasepipe::WORDS_MIN)]
    pub words_min: usize,
    /// Maximum result pages requested.
    #[arg(long, env = "PHRASEPIPE_PAGES_MAX", default_value_t = phrasepipe::PAGES_MAX)]
    pub pages_max: usize,
    /// CSS selector for one sentence-with-translations block.
    #[arg(long, default_value = DEFAULT_BLOCK_SELECTOR)]
    pub block_selector: String,
    /// CSS selector for the sentence inside a block (first match wins).
    #[arg(long, default_value = DEFAULT_SENTENCE_SELECTOR)]
    pub sentence_selector: String,
    /// CSS selector for the translation inside a block (first match wins).
    #[arg(long, default_value = DEFAULT_TRANSLATION_SELECTOR)]
    pub translation_selector: String,
}

impl SiteArgs {
    pub fn bounds(&self) -> Bounds {
        Bounds {
            entries_max: self.entries_max,
            words_min: self.words_min,
            pages_max: self.pages_max,
        }
    }

    pub fn url_builder(&self) -> Result<PageUrlBuilder> {
        Ok(PageUrlBuilder::new(&self.base_url)?)
    }

    pub fn extractor(&self) -> Result<SentencePairExtractor> {
        Ok(SentencePairExtractor::new(&ExtractSelectors {
            block: self.block_selector.clone(),
            sentence: self.sentence_selector.clone(),
            translation: self.translation_selector.clone(),
        })?)
    }

    /// Everything is validated here, before any page is requested.
    pub fn collector(&self, fetcher: Arc<dyn PageFetcher>) -> Result<PhraseCollector> {
        Ok(PhraseCollector::new(
            fetcher,
            self.url_builder()?,
            self.extractor()?,
            self.bounds(),
        ))
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchBackend {
    /// Plain HTTP GET (no JavaScript): mirrors, saved pages, fixture servers.
    Local,
    /// Headless Chromium through Node + Playwright; reads the rendered document.
    Render,
}

#[derive(clap::Args, Debug, Clone)]
pub struct FetchArgs {
    /// How result pages are obtained. Live result lists are built client-side,
    /// so only `render` sees them.
    #[arg(long, value_enum, env = "PHRASEPIPE_FETCH_BACKEND", default_value = "render")]
    pub fetch_backend: FetchBackend,
    /// Per-page navigation timeout (the only timeout applied to a page).
    #[arg(
        long,
        env = "PHRASEPIPE_TIMEOUT_MS",
        default_value_t = DEFAULT_TIMEOUT_MS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_ms: u64,
    /// Cap on bytes read per page (local backend only).
    #[arg(long, default_value_t = 5_000_000)]
    pub max_bytes: u64,
    /// Node.js binary for the render backend.
    #[arg(long, env = "PHRASEPIPE_NODE", default_value = "node")]
    pub node: String,
    /// NODE_PATH override for locating the `playwright` package.
    #[arg(long, env = "PHRASEPIPE_NODE_PATH")]
    pub node_path: Option<String>,
}

impl FetchArgs {
    pub fn fetcher(&self) -> Result<Arc<dyn PageFetcher>> {
        let settings = FetchSettings {
            timeout_ms: self.timeout_ms,
            max_bytes: Some(self.max_bytes),
        };
        let fetcher: Arc<dyn PageFetcher> = match self.fetch_backend {
            FetchBackend::Local => Arc::new(HttpFetcher::new(settings)?),
            FetchBackend::Render => Arc::new(
                RenderFetcher::new(settings)
                    .with_node_bin(self.node.clone())
                    .with_node_path(self.node_path.clone()),
            ),
        };
        Ok(fetcher)
    }
}

/// Read and validate the run input from a file, or stdin for `None`/`-`.
pub fn read_input(path: Option<&Path>) -> Result<Query> {
    let raw = match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("reading input {}", p.display()))?,
        _ => {
            let mut s = String::new();
            std::io::stdin()
                .read_to_string(&mut s)
                .context("reading input from stdin")?;
            s
        }
    };
    Ok(Query::from_json_str(&raw)?)
}

/// Write `value` as JSON to `out`, or stdout when `out` is `None`.
pub fn write_json<T: serde::Serialize>(value: &T, out: Option<&Path>, pretty: bool) -> Result<()> {
    let s = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    match out {
        Some(p) => {
            if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            std::fs::write(p, s + "\n").with_context(|| format!("writing {}", p.display()))?;
        }
        None => println!("{s}"),
    }
    Ok(())
}
