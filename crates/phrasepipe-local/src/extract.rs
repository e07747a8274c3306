use html_scraper::{ElementRef, Html, Selector};
use phrasepipe_core::{Error, RawSentencePair, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BLOCK_SELECTOR: &str = ".sentence-and-translations";
pub const DEFAULT_SENTENCE_SELECTOR: &str = ".sentence.layout-row";
pub const DEFAULT_TRANSLATION_SELECTOR: &str = ".translation.layout-row";

/// CSS selectors locating result blocks and, inside each block, the sentence
/// and its translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractSelectors {
    pub block: String,
    pub sentence: String,
    pub translation: String,
}

impl Default for ExtractSelectors {
    fn default() -> Self {
        Self {
            block: DEFAULT_BLOCK_SELECTOR.to_string(),
            sentence: DEFAULT_SENTENCE_SELECTOR.to_string(),
            translation: DEFAULT_TRANSLATION_SELECTOR.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SentencePairExtractor {
    block: Selector,
    sentence: Selector,
    translation: Selector,
}

impl SentencePairExtractor {
    pub fn new(sel: &ExtractSelectors) -> Result<Self> {
        Ok(Self {
            block: parse_selector("block", &sel.block)?,
            sentence: parse_selector("sentence", &sel.sentence)?,
            translation: parse_selector("translation", &sel.translation)?,
        })
    }

    /// Candidate pairs in document order, one per result block.
    ///
    /// Each side is the trimmed text of the first matching element in the block;
    /// a side with no match is the empty string.
    pub fn extract(&self, html: &str) -> Vec<RawSentencePair> {
        let doc = Html::parse_document(html);
        doc.select(&self.block)
            .map(|block| RawSentencePair {
                mono_text: first_text(block, &self.sentence),
                tran_text: first_text(block, &self.translation),
            })
            .collect()
    }
}

fn parse_selector(which: &str, css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| Error::Extract(format!("bad {which} selector {css:?}: {e}")))
}

fn first_text(block: ElementRef<'_>, sel: &Selector) -> String {
    block
        .select(sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}
