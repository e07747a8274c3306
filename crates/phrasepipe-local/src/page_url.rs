use phrasepipe_core::{Error, LanguageCode, PageRequest, Result};

pub const DEFAULT_BASE_URL: &str = "https://tatoeba.org";

/// Builds search-result page URIs for one site root.
///
/// Output is a pure function of the arguments: the same query, codes and page
/// index always give the same string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUrlBuilder {
    base: String,
}

impl Default for PageUrlBuilder {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl PageUrlBuilder {
    /// `base_url` must be an absolute http(s) URL without query or fragment.
    /// A path prefix is kept (useful for mirrors and fixture servers).
    pub fn new(base_url: &str) -> Result<Self> {
        let u = url::Url::parse(base_url.trim())
            .map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(u.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "{base_url}: scheme must be http or https"
            )));
        }
        if u.query().is_some() || u.fragment().is_some() {
            return Err(Error::InvalidUrl(format!(
                "{base_url}: base url must not carry a query or fragment"
            )));
        }
        Ok(Self {
            base: u.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// URI for the page at 0-based `page_index`; the URI itself numbers pages from 1.
    pub fn build(
        &self,
        query: &str,
        source: &LanguageCode,
        target: &LanguageCode,
        page_index: usize,
    ) -> String {
        let mut uri = self.base.clone();
        // The leading segment selects the result-listing language.
        if !target.is_any() {
            uri.push('/');
            uri.push_str(target.as_str());
        }
        uri.push_str(&format!("/sentences/search/page:{}", page_index + 1));

        let params: [(&str, &str); 18] = [
            ("query", query),
            ("from", source.as_str()),
            ("to", target.as_str()),
            ("orphans", "no"),
            ("unapproved", "no"),
            ("native", "yes"),
            ("user", ""),
            ("tags", ""),
            ("list", ""),
            ("has_audio", ""),
            ("trans_filter", "limit"),
            ("trans_to", target.as_str()),
            ("trans_link", ""),
            ("trans_user", ""),
            ("trans_orphan", ""),
            ("trans_unapproved", ""),
            ("trans_has_audio", ""),
            ("sort", "words"),
        ];
        let qs = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        uri.push('?');
        uri.push_str(&qs);
        uri
    }

    pub fn request(
        &self,
        query: &str,
        source: &LanguageCode,
        target: &LanguageCode,
        page_index: usize,
    ) -> PageRequest {
        PageRequest {
            page_index: page_index + 1,
            uri: self.build(query, source, target, page_index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(c: &str) -> LanguageCode {
        LanguageCode::new(c).unwrap()
    }

    #[test]
    fn builds_first_page_uri() {
        let b = PageUrlBuilder::default();
        let uri = b.build("rouler", &code("eng"), &code("fra"), 0);
        assert_eq!(
            uri,
            "https://tatoeba.org/fra/sentences/search/page:1?query=rouler&from=eng&to=fra\
             &orphans=no&unapproved=no&native=yes&user=&tags=&list=&has_audio=\
             &trans_filter=limit&trans_to=fra&trans_link=&trans_user=&trans_orphan=\
             &trans_unapproved=&trans_has_audio=&sort=words"
        );
    }

    #[test]
    fn page_numbers_are_one_based() {
        let b = PageUrlBuilder::default();
        let req = b.request("rouler", &code("eng"), &code("fra"), 1);
        assert_eq!(req.page_index, 2);
        assert!(req.uri.contains("/sentences/search/page:2?"));
    }

    #[test]
    fn build_is_deterministic() {
        let b = PageUrlBuilder::default();
        let a1 = b.build("on the road", &code("eng"), &code("jpn"), 3);
        let a2 = b.build("on the road", &code("eng"), &code("jpn"), 3);
        assert_eq!(a1, a2);
    }

    #[test]
    fn query_text_is_encoded() {
        let b = PageUrlBuilder::default();
        let uri = b.build("ça roule & co", &code("fra"), &code("eng"), 0);
        assert!(uri.contains("query=%C3%A7a+roule+%26+co&"), "{uri}");
    }

    #[test]
    fn any_language_leaves_codes_empty() {
        let b = PageUrlBuilder::default();
        let uri = b.build("rouler", &LanguageCode::any(), &LanguageCode::any(), 0);
        assert!(uri.starts_with("https://tatoeba.org/sentences/search/page:1?"));
        assert!(uri.contains("&from=&to=&"));
        assert!(uri.contains("&trans_to=&"));
    }

    #[test]
    fn base_url_keeps_prefix_and_rejects_junk() {
        let b = PageUrlBuilder::new("http://127.0.0.1:8080/mirror/").unwrap();
        assert_eq!(b.base_url(), "http://127.0.0.1:8080/mirror");
        let uri = b.build("x", &code("eng"), &code("fra"), 0);
        assert!(uri.starts_with("http://127.0.0.1:8080/mirror/fra/sentences/search/page:1?"));

        assert!(matches!(
            PageUrlBuilder::new("ftp://example.com"),
            Err(Error::InvalidUrl(_))
        ));
        assert!(PageUrlBuilder::new("not a url").is_err());
        assert!(PageUrlBuilder::new("https://tatoeba.org/?x=1").is_err());
    }
}
