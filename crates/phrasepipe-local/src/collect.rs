use phrasepipe_core::{DictionaryEntry, RawSentencePair};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionPhase {
    Collecting,
    /// The run-wide maximum has been reached: no more candidates are
    /// considered and no more pages are fetched.
    Saturated,
}

/// Run-wide accepted-entry counter. Created once per run and threaded by value
/// through every page; never reset between pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionState {
    accepted_count: usize,
    entries_max: usize,
}

impl CollectionState {
    pub fn new(entries_max: usize) -> Self {
        Self {
            accepted_count: 0,
            entries_max,
        }
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted_count
    }

    pub fn entries_max(&self) -> usize {
        self.entries_max
    }

    pub fn remaining(&self) -> usize {
        self.entries_max.saturating_sub(self.accepted_count)
    }

    pub fn phase(&self) -> CollectionPhase {
        if self.accepted_count >= self.entries_max {
            CollectionPhase::Saturated
        } else {
            CollectionPhase::Collecting
        }
    }

    pub fn is_saturated(&self) -> bool {
        self.phase() == CollectionPhase::Saturated
    }

    fn accept_one(self) -> Self {
        Self {
            accepted_count: self.accepted_count + 1,
            ..self
        }
    }
}

/// Token count used for the length check: `!` removed, then split on whitespace.
pub fn word_count(sentence: &str) -> usize {
    sentence.replace('!', "").split_whitespace().count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryFilter {
    words_min: usize,
}

impl EntryFilter {
    pub fn new(words_min: usize) -> Self {
        Self { words_min }
    }

    pub fn admits(&self, pair: &RawSentencePair) -> bool {
        word_count(&pair.mono_text) >= self.words_min
    }

    /// Accept candidates in order until the state saturates.
    ///
    /// Accepted entries keep the sentence exactly as extracted; the `!` stripping
    /// only feeds the word count.
    pub fn consider_all<I>(
        &self,
        candidates: I,
        mut state: CollectionState,
    ) -> (Vec<DictionaryEntry>, CollectionState)
    where
        I: IntoIterator<Item = RawSentencePair>,
    {
        let mut accepted = Vec::with_capacity(state.remaining());
        for pair in candidates {
            if state.is_saturated() {
                break;
            }
            if !self.admits(&pair) {
                tracing::debug!(
                    sentence = %pair.mono_text,
                    words = word_count(&pair.mono_text),
                    words_min = self.words_min,
                    "rejected short candidate"
                );
                continue;
            }
            state = state.accept_one();
            accepted.push(DictionaryEntry::from_pair(pair));
        }
        (accepted, state)
    }
}
