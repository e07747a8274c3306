use phrasepipe_core::{Error, LanguageCode, Query, Result};
use std::str::FromStr;

/// Language names accepted in input, with the code the site uses for each.
pub const LANGUAGES: &[(&str, &str)] = &[
    ("english", "eng"),
    ("french", "fra"),
    ("russian", "rus"),
    ("spanish", "spa"),
    ("italian", "ita"),
    ("chinese", "cmn"),
    ("japanese", "jpn"),
    ("german", "deu"),
    ("korean", "kor"),
    ("latin", "lat"),
    ("portuguese", "por"),
    ("dutch", "nld"),
    ("polish", "pol"),
    ("turkish", "tur"),
    ("ukrainian", "ukr"),
    ("arabic", "ara"),
];

/// Look up a human language name (case-insensitive, surrounding whitespace ignored).
///
/// Returns `None` for names outside [`LANGUAGES`]; callers pick a policy with
/// [`resolve_with_policy`].
pub fn resolve(name: &str) -> Option<LanguageCode> {
    let name = name.trim().to_lowercase();
    LANGUAGES
        .iter()
        .find(|(n, _)| *n == name)
        .and_then(|(_, code)| LanguageCode::new(code).ok())
}

/// What to do with a language name that has no code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownLanguagePolicy {
    /// Query with the empty code, which the site reads as "any language".
    #[default]
    Any,
    /// Abort before any page is fetched.
    Fail,
}

impl FromStr for UnknownLanguagePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" => Ok(Self::Any),
            "fail" => Ok(Self::Fail),
            other => Err(Error::InvalidInput(format!(
                "unknown language policy {other:?} (allowed: any, fail)"
            ))),
        }
    }
}

pub fn resolve_with_policy(name: &str, policy: UnknownLanguagePolicy) -> Result<LanguageCode> {
    if let Some(code) = resolve(name) {
        return Ok(code);
    }
    match policy {
        UnknownLanguagePolicy::Any => {
            tracing::warn!(
                language = name,
                "unknown language name, querying without a language filter"
            );
            Ok(LanguageCode::any())
        }
        UnknownLanguagePolicy::Fail => Err(Error::UnknownLanguage(format!(
            "{name:?} (known: {})",
            LANGUAGES
                .iter()
                .map(|(n, _)| *n)
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePair {
    pub source: LanguageCode,
    pub target: LanguageCode,
}

impl LanguagePair {
    pub fn for_query(q: &Query, policy: UnknownLanguagePolicy) -> Result<Self> {
        Ok(Self {
            source: resolve_with_policy(&q.source, policy)?,
            target: resolve_with_policy(&q.translation, policy)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_entry_resolves_to_its_code() {
        for (name, code) in LANGUAGES {
            assert_eq!(resolve(name).unwrap().as_str(), *code, "{name}");
        }
        assert_eq!(resolve("french").unwrap().as_str(), "fra");
        assert_eq!(resolve("chinese").unwrap().as_str(), "cmn");
    }

    #[test]
    fn lookup_ignores_case_and_padding() {
        assert_eq!(resolve("  French ").unwrap().as_str(), "fra");
        assert_eq!(resolve("GERMAN").unwrap().as_str(), "deu");
    }

    #[test]
    fn unknown_names_do_not_resolve() {
        assert_eq!(resolve("klingon"), None);
        assert_eq!(resolve(""), None);
        assert_eq!(resolve("fra"), None);
    }

    #[test]
    fn policy_any_falls_back_to_sentinel() {
        let code = resolve_with_policy("klingon", UnknownLanguagePolicy::Any).unwrap();
        assert!(code.is_any());
    }

    #[test]
    fn policy_fail_reports_the_name() {
        let err = resolve_with_policy("klingon", UnknownLanguagePolicy::Fail).unwrap_err();
        assert!(matches!(err, Error::UnknownLanguage(ref m) if m.contains("klingon")));
    }

    #[test]
    fn policy_parses() {
        assert_eq!(
            "FAIL".parse::<UnknownLanguagePolicy>().unwrap(),
            UnknownLanguagePolicy::Fail
        );
        assert!("warn".parse::<UnknownLanguagePolicy>().is_err());
    }

    #[test]
    fn pair_resolves_both_sides() {
        let q = Query::new("rouler", "english", "french");
        let pair = LanguagePair::for_query(&q, UnknownLanguagePolicy::Fail).unwrap();
        assert_eq!(pair.source.as_str(), "eng");
        assert_eq!(pair.target.as_str(), "fra");

        let q = Query::new("rouler", "english", "elvish");
        assert!(LanguagePair::for_query(&q, UnknownLanguagePolicy::Fail).is_err());
        let pair = LanguagePair::for_query(&q, UnknownLanguagePolicy::Any).unwrap();
        assert!(pair.target.is_any());
    }
}
