use phrasepipe_core::{Error, FetchSettings, PageFetcher, PageRequest, Result};

pub mod collect;
pub mod extract;
pub mod language;
pub mod page_url;
pub mod pipeline;
pub mod render_playwright;

pub use collect::{CollectionPhase, CollectionState, EntryFilter};
pub use extract::{ExtractSelectors, SentencePairExtractor};
pub use language::{LanguagePair, UnknownLanguagePolicy};
pub use page_url::PageUrlBuilder;
pub use pipeline::{CollectionReport, PhraseCollector};
pub use render_playwright::RenderFetcher;

fn env_truthy(k: &str) -> bool {
    matches!(
        std::env::var(k)
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase()
            .as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Plain HTTP page fetcher: one GET per page, no JavaScript.
///
/// Works for servers that render result blocks server-side (mirrors, fixture
/// servers, cached pages). Use [`RenderFetcher`] when the markup only exists
/// after scripts run.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl HttpFetcher {
    /// The page timeout covers connect, headers and body; there is no separate
    /// connect timeout.
    pub fn new(settings: FetchSettings) -> Result<Self> {
        if settings.timeout_ms == 0 {
            return Err(Error::InvalidInput(
                "page timeout must be at least 1ms".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("phrasepipe-local/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::limited(10))
            .timeout(settings.timeout())
            .build()
            .map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }
}

fn map_reqwest_error(uri: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("{uri}: {e}"))
    } else {
        Error::Fetch(format!("{uri}: {e}"))
    }
}

#[async_trait::async_trait]
impl PageFetcher for HttpFetcher {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn fetch_page(&self, req: &PageRequest) -> Result<String> {
        let url = url::Url::parse(&req.uri).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let t0 = std::time::Instant::now();
        let resp = self
            .client
            .get(url)
            .timeout(self.settings.timeout())
            .send()
            .await
            .map_err(|e| map_reqwest_error(&req.uri, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!(
                "{}: HTTP {}",
                req.uri,
                status.as_u16()
            )));
        }

        let max_bytes = self.settings.max_bytes.unwrap_or(u64::MAX) as usize;
        let mut truncated = false;
        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| map_reqwest_error(&req.uri, e))?;
            if bytes.len().saturating_add(chunk.len()) > max_bytes {
                let can_take = max_bytes.saturating_sub(bytes.len());
                bytes.extend_from_slice(&chunk[..can_take]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
        }
        if truncated {
            tracing::warn!(
                uri = %req.uri,
                max_bytes,
                "page body truncated; trailing result blocks are lost"
            );
        }
        tracing::debug!(
            page = req.page_index,
            status = status.as_u16(),
            bytes = bytes.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "page fetched"
        );

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
