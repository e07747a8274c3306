use crate::collect::{CollectionState, EntryFilter};
use crate::extract::SentencePairExtractor;
use crate::language::{LanguagePair, UnknownLanguagePolicy};
use crate::page_url::PageUrlBuilder;
use phrasepipe_core::{Bounds, DictionaryEntry, Output, PageFetcher, Query, Result};
use std::sync::Arc;

/// Concatenate per-page accepted entries, keeping page order and in-page order.
pub fn aggregate<I>(pages: I) -> Vec<DictionaryEntry>
where
    I: IntoIterator<Item = Vec<DictionaryEntry>>,
{
    pages.into_iter().flatten().collect()
}

#[derive(Debug, Clone)]
pub struct CollectionReport {
    pub definitions: Vec<DictionaryEntry>,
    pub pages_fetched: usize,
    /// Pages never requested because the run saturated first.
    pub pages_skipped: usize,
    pub final_state: CollectionState,
}

/// Sequential multi-page collector.
///
/// Pages are fetched one at a time: whether page k+1 is requested at all depends
/// on the state left by pages 1..=k.
pub struct PhraseCollector {
    fetcher: Arc<dyn PageFetcher>,
    urls: PageUrlBuilder,
    extractor: SentencePairExtractor,
    bounds: Bounds,
}

impl PhraseCollector {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        urls: PageUrlBuilder,
        extractor: SentencePairExtractor,
        bounds: Bounds,
    ) -> Self {
        Self {
            fetcher,
            urls,
            extractor,
            bounds,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Any fetch error aborts the whole collection; entries from earlier pages
    /// are dropped with it.
    pub async fn collect(&self, query: &str, langs: &LanguagePair) -> Result<CollectionReport> {
        let filter = EntryFilter::new(self.bounds.words_min);
        let mut state = CollectionState::new(self.bounds.entries_max);
        let mut pages: Vec<Vec<DictionaryEntry>> = Vec::new();

        for page_index in 0..self.bounds.pages_max {
            if state.is_saturated() {
                for skipped in page_index + 1..=self.bounds.pages_max {
                    tracing::info!(
                        page = skipped,
                        accepted = state.accepted_count(),
                        "collection saturated, skipping page"
                    );
                }
                break;
            }
            let req = self
                .urls
                .request(query, &langs.source, &langs.target, page_index);
            tracing::debug!(
                page = req.page_index,
                uri = %req.uri,
                backend = self.fetcher.name(),
                "fetching page"
            );
            let html = self.fetcher.fetch_page(&req).await?;

            let candidates = self.extractor.extract(&html);
            let n_candidates = candidates.len();
            let (accepted, next) = filter.consider_all(candidates, state);
            state = next;
            tracing::info!(
                page = req.page_index,
                uri = %req.uri,
                candidates = n_candidates,
                accepted = accepted.len(),
                total = state.accepted_count(),
                "page processed"
            );
            pages.push(accepted);
        }

        let pages_fetched = pages.len();
        Ok(CollectionReport {
            definitions: aggregate(pages),
            pages_fetched,
            pages_skipped: self.bounds.pages_max - pages_fetched,
            final_state: state,
        })
    }

    /// Resolve languages, collect, and wrap the result for output.
    pub async fn run(&self, input: &Query, policy: UnknownLanguagePolicy) -> Result<Output> {
        let langs = LanguagePair::for_query(input, policy)?;
        let report = self.collect(&input.query, &langs).await?;
        tracing::info!(
            query = %input.query,
            definitions = report.definitions.len(),
            pages_fetched = report.pages_fetched,
            pages_skipped = report.pages_skipped,
            "collection finished"
        );
        Ok(Output::assemble(input.clone(), report.definitions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::word_count;
    use crate::extract::ExtractSelectors;
    use phrasepipe_core::{Error, Level, PageRequest, OUTPUT_NAME};
    use std::sync::Mutex;

    const PAGE1: &str = include_str!("../fixtures/rouler_page1.html");
    const PAGE2: &str = include_str!("../fixtures/rouler_page2.html");
    const SHORT_ONLY: &str = include_str!("../fixtures/short_only.html");

    /// Serves canned pages by 1-based index and records every request.
    /// A `None` page times out.
    struct FixtureFetcher {
        pages: Vec<Option<&'static str>>,
        seen: Mutex<Vec<PageRequest>>,
    }

    impl FixtureFetcher {
        fn new(pages: Vec<Option<&'static str>>) -> Arc<Self> {
            Arc::new(Self {
                pages,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn ok(pages: &[&'static str]) -> Arc<Self> {
            Self::new(pages.iter().copied().map(Some).collect())
        }

        fn seen(&self) -> Vec<PageRequest> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl PageFetcher for FixtureFetcher {
        fn name(&self) -> &'static str {
            "fixture"
        }

        async fn fetch_page(&self, req: &PageRequest) -> Result<String> {
            self.seen.lock().unwrap().push(req.clone());
            match self.pages.get(req.page_index - 1) {
                Some(Some(html)) => Ok(html.to_string()),
                Some(None) => Err(Error::Timeout(format!(
                    "page {} timed out",
                    req.page_index
                ))),
                None => Ok(String::new()),
            }
        }
    }

    fn collector(fetcher: Arc<FixtureFetcher>, bounds: Bounds) -> PhraseCollector {
        PhraseCollector::new(
            fetcher,
            PageUrlBuilder::default(),
            SentencePairExtractor::new(&ExtractSelectors::default()).unwrap(),
            bounds,
        )
    }

    fn rouler() -> Query {
        Query::new("rouler", "english", "french")
    }

    fn eng_fra() -> LanguagePair {
        LanguagePair::for_query(&rouler(), UnknownLanguagePolicy::Fail).unwrap()
    }

    #[tokio::test]
    async fn saturating_first_page_skips_second_fetch() {
        let f = FixtureFetcher::ok(&[PAGE1, PAGE2]);
        let c = collector(f.clone(), Bounds::default());
        let out = c.run(&rouler(), UnknownLanguagePolicy::Fail).await.unwrap();

        assert_eq!(f.seen().len(), 1);
        assert_eq!(f.seen()[0].page_index, 1);
        assert!(f.seen()[0].uri.contains("from=eng&to=fra"));

        assert_eq!(out.name, OUTPUT_NAME);
        assert_eq!(out.input, rouler());
        let monos: Vec<&str> = out
            .definitions
            .iter()
            .map(|d| d.examples[0].phrase_mono.as_str())
            .collect();
        assert_eq!(
            monos,
            vec![
                "The car rolls down the hill.",
                "We rolled the barrel!",
                "Let's roll it out."
            ]
        );
        for d in &out.definitions {
            assert_eq!(d.grammar, "");
            assert_eq!(d.examples.len(), 1);
            assert_eq!(d.examples[0].level, Level::Novoice);
            assert_eq!(d.meaning, d.examples[0].phrase_tran);
        }
    }

    #[tokio::test]
    async fn unsaturated_first_page_fetches_second_in_order() {
        let f = FixtureFetcher::ok(&[PAGE1, PAGE2]);
        let bounds = Bounds {
            entries_max: 4,
            ..Bounds::default()
        };
        let report = collector(f.clone(), bounds)
            .collect("rouler", &eng_fra())
            .await
            .unwrap();

        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.pages_skipped, 0);
        assert_eq!(report.definitions.len(), 4);
        assert_eq!(
            report.definitions[3].examples[0].phrase_mono,
            "The wheels keep rolling."
        );
        assert!(report.final_state.is_saturated());
        let idx: Vec<usize> = f.seen().iter().map(|r| r.page_index).collect();
        assert_eq!(idx, vec![1, 2]);
    }

    #[tokio::test]
    async fn no_qualifying_candidates_fetches_every_page() {
        let f = FixtureFetcher::ok(&[SHORT_ONLY, SHORT_ONLY]);
        let out = collector(f.clone(), Bounds::default())
            .run(&rouler(), UnknownLanguagePolicy::Any)
            .await
            .unwrap();
        assert_eq!(f.seen().len(), 2);
        assert!(out.definitions.is_empty());
    }

    #[tokio::test]
    async fn saturation_mid_page_stops_there() {
        let f = FixtureFetcher::ok(&[PAGE1, PAGE2]);
        let bounds = Bounds {
            entries_max: 2,
            words_min: 3,
            pages_max: 5,
        };
        let report = collector(f.clone(), bounds)
            .collect("rouler", &eng_fra())
            .await
            .unwrap();
        assert_eq!(f.seen().len(), 1);
        assert_eq!(report.pages_skipped, 4);
        assert_eq!(report.definitions.len(), 2);
        assert_eq!(
            report.definitions[1].examples[0].phrase_mono,
            "We rolled the barrel!"
        );
        for d in &report.definitions {
            assert!(word_count(&d.examples[0].phrase_mono) >= bounds.words_min);
        }
    }

    #[tokio::test]
    async fn fetch_failure_on_later_page_fails_the_run() {
        let f = FixtureFetcher::new(vec![Some(SHORT_ONLY), None]);
        let err = collector(f.clone(), Bounds::default())
            .run(&rouler(), UnknownLanguagePolicy::Any)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(f.seen().len(), 2);
    }

    #[tokio::test]
    async fn strict_policy_fails_before_any_fetch() {
        let f = FixtureFetcher::ok(&[PAGE1]);
        let err = collector(f.clone(), Bounds::default())
            .run(
                &Query::new("rouler", "english", "elvish"),
                UnknownLanguagePolicy::Fail,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownLanguage(_)));
        assert!(f.seen().is_empty());
    }

    #[tokio::test]
    async fn zero_entries_max_never_fetches() {
        let f = FixtureFetcher::ok(&[PAGE1]);
        let bounds = Bounds {
            entries_max: 0,
            ..Bounds::default()
        };
        let out = collector(f.clone(), bounds)
            .run(&rouler(), UnknownLanguagePolicy::Any)
            .await
            .unwrap();
        assert!(f.seen().is_empty());
        assert!(out.definitions.is_empty());
    }

    #[test]
    fn aggregate_preserves_page_then_position_order() {
        let e = |s: &str| {
            DictionaryEntry::from_pair(phrasepipe_core::RawSentencePair {
                mono_text: s.to_string(),
                tran_text: s.to_string(),
            })
        };
        let all = aggregate(vec![vec![e("a"), e("b")], vec![], vec![e("a"), e("c")]]);
        let m: Vec<&str> = all.iter().map(|d| d.meaning.as_str()).collect();
        assert_eq!(m, vec!["a", "b", "a", "c"]);
    }
}
