use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("unknown language: {0}")]
    UnknownLanguage(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("fetch timed out: {0}")]
    Timeout(String),
    #[error("extract failed: {0}")]
    Extract(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Maximum number of entries accepted over a whole run.
pub const ENTRIES_MAX: usize = 3;
/// Minimum whitespace-separated tokens in a sentence (after `!` is stripped).
pub const WORDS_MIN: usize = 3;
/// Maximum number of result pages requested per run.
pub const PAGES_MAX: usize = 2;
/// Per-page navigation timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 200_000;
/// Identifier stamped into every [`Output`].
pub const OUTPUT_NAME: &str = "phrasepipe/tatoeba-phrases";
/// Accepted input shape, as shown in validation errors.
pub const INPUT_SHAPE: &str =
    "{ query: String, source: String, translation: String, dictionary?: String | null }";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub entries_max: usize,
    pub words_min: usize,
    pub pages_max: usize,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            entries_max: ENTRIES_MAX,
            words_min: WORDS_MIN,
            pages_max: PAGES_MAX,
        }
    }
}

/// One run's input. Serializes back to the shape it was read from, so it can be
/// echoed into the output untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Query {
    pub query: String,
    /// Human language name of the sentences (e.g. "english").
    pub source: String,
    /// Human language name of the translations (e.g. "french").
    pub translation: String,
    /// Legacy field from older input shapes. Accepted and echoed, never used.
    ///
    /// `None` when absent, `Some(None)` for an explicit `null`, so the echo keeps
    /// whichever form the input had.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_field"
    )]
    pub dictionary: Option<Option<String>>,
}

fn present_field<'de, D>(d: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(d).map(Some)
}

impl Query {
    pub fn new(
        query: impl Into<String>,
        source: impl Into<String>,
        translation: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            source: source.into(),
            translation: translation.into(),
            dictionary: None,
        }
    }

    /// Validate an arbitrary JSON value against [`INPUT_SHAPE`].
    pub fn from_value(v: &serde_json::Value) -> Result<Self> {
        let q: Query = serde_json::from_value(v.clone())
            .map_err(|e| invalid_input(&v.to_string(), &e.to_string()))?;
        if q.query.trim().is_empty() {
            return Err(invalid_input(&v.to_string(), "query must be non-empty"));
        }
        Ok(q)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let v: serde_json::Value =
            serde_json::from_str(s).map_err(|e| invalid_input(s, &e.to_string()))?;
        Self::from_value(&v)
    }
}

fn invalid_input(received: &str, why: &str) -> Error {
    const MAX_ECHO_CHARS: usize = 500;
    let mut echo: String = received.trim().chars().take(MAX_ECHO_CHARS).collect();
    if received.trim().chars().count() > MAX_ECHO_CHARS {
        echo.push('…');
    }
    Error::InvalidInput(format!(
        "expected input: {INPUT_SHAPE}; received input: {echo} ({why})"
    ))
}

/// The site's 3-letter language code, or the empty "any language" sentinel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageCode(String);

impl LanguageCode {
    pub fn new(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.len() == 3 && code.bytes().all(|b| b.is_ascii_lowercase()) {
            Ok(Self(code.to_string()))
        } else {
            Err(Error::InvalidInput(format!(
                "language code must be 3 lowercase ascii letters, got {code:?}"
            )))
        }
    }

    /// Sentinel the site reads as "unspecified".
    pub fn any() -> Self {
        Self(String::new())
    }

    pub fn is_any(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based, as it appears in the URI.
    pub page_index: usize,
    pub uri: String,
}

/// A sentence/translation pair as found in one result block, before filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSentencePair {
    pub mono_text: String,
    pub tran_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Novoice,
    Intermediate,
    Expert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub level: Level,
    pub phrase_mono: String,
    pub phrase_tran: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub meaning: String,
    pub grammar: String,
    pub examples: Vec<Example>,
}

impl DictionaryEntry {
    /// Entry whose meaning is the translation, illustrated by the pair itself.
    pub fn from_pair(pair: RawSentencePair) -> Self {
        Self {
            meaning: pair.tran_text.clone(),
            grammar: String::new(),
            examples: vec![Example {
                level: Level::Novoice,
                phrase_mono: pair.mono_text,
                phrase_tran: pair.tran_text,
            }],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    #[serde(rename = "crawledAt", serialize_with = "rfc3339_millis")]
    pub crawled_at: DateTime<Utc>,
    pub name: String,
    pub input: Query,
    pub definitions: Vec<DictionaryEntry>,
}

impl Output {
    pub fn assemble(input: Query, definitions: Vec<DictionaryEntry>) -> Self {
        Self::assemble_at(Utc::now(), input, definitions)
    }

    pub fn assemble_at(
        crawled_at: DateTime<Utc>,
        input: Query,
        definitions: Vec<DictionaryEntry>,
    ) -> Self {
        Self {
            crawled_at,
            name: OUTPUT_NAME.to_string(),
            input,
            definitions,
        }
    }
}

fn rfc3339_millis<S: serde::Serializer>(
    t: &DateTime<Utc>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    /// Navigation timeout for a single page.
    pub timeout_ms: u64,
    /// Hard cap on bytes read from a response body (ignored by render backends).
    pub max_bytes: Option<u64>,
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_bytes: Some(5_000_000),
        }
    }
}

/// Turns a page request into rendered HTML. Implementations own whatever
/// per-page resource they need and release it before returning.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch_page(&self, req: &PageRequest) -> Result<String>;
}
