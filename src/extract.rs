//! CSS-selector based extraction of result items from search pages.
//!
//! Each source declares its own [`Selectors`]; they are compiled once when
//! the extractor is built, so a bad selector fails at startup instead of on
//! every search.

use std::collections::HashMap;

use flixscout_search::{ContentType, Extractor, ResultItem, SearchError, Source, dedup_key};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::{Selectors, SourceEntry};
use crate::error::{AppError, Result};

struct CompiledSelectors {
    item: Selector,
    title: Selector,
    link: Selector,
    poster: Option<Selector>,
    year: Option<Selector>,
    series_marker: Option<Selector>,
    default_content_type: ContentType,
}

impl CompiledSelectors {
    fn compile(source_id: &str, selectors: &Selectors) -> Result<Self> {
        let parse = |field: &str, raw: &str| {
            Selector::parse(raw).map_err(|e| {
                AppError::Config(format!(
                    "source {source_id}: invalid {field} selector `{raw}`: {e:?}"
                ))
            })
        };
        let parse_opt = |field: &str, raw: &Option<String>| -> Result<Option<Selector>> {
            raw.as_deref().map(|r| parse(field, r)).transpose()
        };

        Ok(Self {
            item: parse("item", &selectors.item)?,
            title: parse("title", &selectors.title)?,
            link: parse("link", &selectors.link)?,
            poster: parse_opt("poster", &selectors.poster)?,
            year: parse_opt("year", &selectors.year)?,
            series_marker: parse_opt("series_marker", &selectors.series_marker)?,
            default_content_type: selectors.default_content_type,
        })
    }
}

/// [`Extractor`] driven by per-source CSS selectors.
pub struct SelectorExtractor {
    sources: HashMap<String, CompiledSelectors>,
}

impl SelectorExtractor {
    /// Compile the selectors of every configured source.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] naming the source and field of the first
    /// selector that does not parse.
    pub fn new(entries: &[SourceEntry]) -> Result<Self> {
        let sources = entries
            .iter()
            .map(|entry| {
                CompiledSelectors::compile(&entry.source.id, &entry.selectors)
                    .map(|compiled| (entry.source.id.clone(), compiled))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { sources })
    }
}

impl std::fmt::Debug for SelectorExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<&String> = self.sources.keys().collect();
        ids.sort();
        f.debug_struct("SelectorExtractor")
            .field("sources", &ids)
            .finish()
    }
}

impl Extractor for SelectorExtractor {
    fn extract_search_results(
        &self,
        source: &Source,
        content: &str,
    ) -> std::result::Result<Vec<ResultItem>, SearchError> {
        let selectors = self.sources.get(&source.id).ok_or_else(|| {
            SearchError::Extraction(format!("no selectors configured for source {}", source.id))
        })?;
        let base = Url::parse(&source.base_url).map_err(|e| {
            SearchError::Extraction(format!("source {} has an invalid base_url: {e}", source.id))
        })?;

        let document = Html::parse_document(content);
        let mut items = Vec::new();

        for element in document.select(&selectors.item) {
            let Some(raw_title) = element.select(&selectors.title).next().map(text_of) else {
                continue;
            };
            let Some(page_address) = link_of(element, &selectors.link)
                .and_then(|href| resolve(&base, &href))
            else {
                continue;
            };

            let (title, title_year) = split_title_year(&raw_title);
            if title.is_empty() {
                continue;
            }
            let year = selectors
                .year
                .as_ref()
                .and_then(|sel| element.select(sel).next())
                .and_then(|el| find_year(&text_of(el)))
                .or(title_year);

            let poster_address = selectors
                .poster
                .as_ref()
                .and_then(|sel| element.select(sel).next())
                .and_then(|img| img.value().attr("data-src").or_else(|| img.value().attr("src")))
                .and_then(|src| resolve(&base, src))
                .unwrap_or_default();

            let content_type = match &selectors.series_marker {
                Some(marker) if element.select(marker).next().is_some() => ContentType::Series,
                _ => selectors.default_content_type,
            };

            items.push(ResultItem {
                dedup_key: dedup_key(&title, year),
                title,
                poster_address,
                page_address,
                content_type,
                year,
                source_id: source.id.clone(),
                source_label: source.label.clone(),
                categories: Vec::new(),
                alternative_sources: Vec::new(),
            });
        }

        tracing::trace!(source = %source.id, count = items.len(), "extracted items");
        Ok(items)
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn link_of(element: ElementRef<'_>, link: &Selector) -> Option<String> {
    element
        .select(link)
        .find_map(|a| a.value().attr("href"))
        .or_else(|| element.value().attr("href"))
        .map(str::to_owned)
}

fn resolve(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }
    base.join(href).ok().map(String::from)
}

/// Extract a plausible release year (1900..=2099) from free text.
fn find_year(text: &str) -> Option<u16> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|run| run.len() == 4)
        .filter_map(|run| run.parse::<u16>().ok())
        .find(|year| (1900..=2099).contains(year))
}

/// Split a trailing `(2021)` or `[2021]` off a title.
fn split_title_year(raw: &str) -> (String, Option<u16>) {
    let trimmed = raw.trim();
    for (open, close) in [('(', ')'), ('[', ']')] {
        if let Some(inner) = trimmed.strip_suffix(close) {
            if let Some(pos) = inner.rfind(open) {
                if let Some(year) = find_year(&inner[pos + 1..]).filter(|_| inner.len() - pos == 5) {
                    return (inner[..pos].trim().to_owned(), Some(year));
                }
            }
        }
    }
    (trimmed.to_owned(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
  <div class="card">
    <a href="/film/dune-2021"><img data-src="/posters/dune.jpg" src="/lazy.gif"></a>
    <h2 class="name">Dune (2021)</h2>
  </div>
  <div class="card">
    <a href="https://cdn.other.example/show/dark">link</a>
    <h2 class="name">  Dark  </h2>
    <span class="year">Released 2017</span>
    <span class="badge-series">TV</span>
  </div>
  <div class="card">
    <h2 class="name">No link here</h2>
  </div>
  <div class="card">
    <a href="/film/untitled"></a>
  </div>
</body></html>
"#;

    fn entry() -> SourceEntry {
        SourceEntry {
            source: Source::new("hub", "Hub", "https://hub.example/"),
            selectors: Selectors {
                item: "div.card".into(),
                title: "h2.name".into(),
                link: "a[href]".into(),
                poster: Some("img".into()),
                year: Some(".year".into()),
                series_marker: Some(".badge-series".into()),
                default_content_type: ContentType::Film,
            },
        }
    }

    #[test]
    fn extracts_items_with_resolved_addresses() {
        let entry = entry();
        let extractor = SelectorExtractor::new(std::slice::from_ref(&entry)).expect("compile");
        let items = extractor
            .extract_search_results(&entry.source, PAGE)
            .expect("extract");

        assert_eq!(items.len(), 2);

        let dune = &items[0];
        assert_eq!(dune.title, "Dune");
        assert_eq!(dune.year, Some(2021));
        assert_eq!(dune.dedup_key, "dune|2021");
        assert_eq!(dune.page_address, "https://hub.example/film/dune-2021");
        assert_eq!(dune.poster_address, "https://hub.example/posters/dune.jpg");
        assert_eq!(dune.content_type, ContentType::Film);
        assert_eq!(dune.source_label, "Hub");

        let dark = &items[1];
        assert_eq!(dark.title, "Dark");
        assert_eq!(dark.year, Some(2017));
        assert_eq!(dark.page_address, "https://cdn.other.example/show/dark");
        assert_eq!(dark.poster_address, "");
        assert_eq!(dark.content_type, ContentType::Series);
    }

    #[test]
    fn unknown_source_is_extraction_error() {
        let extractor = SelectorExtractor::new(&[entry()]).expect("compile");
        let stranger = Source::new("stranger", "Stranger", "https://stranger.example");
        let err = extractor
            .extract_search_results(&stranger, PAGE)
            .expect_err("no selectors");
        assert!(matches!(err, SearchError::Extraction(_)));
    }

    #[test]
    fn invalid_selector_fails_at_build_time() {
        let mut bad = entry();
        bad.selectors.title = "h2[".into();
        let err = SelectorExtractor::new(&[bad]).expect_err("bad selector");
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn page_without_matches_is_empty_not_an_error() {
        let entry = entry();
        let extractor = SelectorExtractor::new(std::slice::from_ref(&entry)).expect("compile");
        let items = extractor
            .extract_search_results(&entry.source, "<html><p>No results</p></html>")
            .expect("extract");
        assert!(items.is_empty());
    }

    #[test]
    fn title_year_suffixes() {
        assert_eq!(split_title_year("Heat (1995)"), ("Heat".into(), Some(1995)));
        assert_eq!(split_title_year("Heat [1995]"), ("Heat".into(), Some(1995)));
        assert_eq!(split_title_year("Blade Runner 2049"), ("Blade Runner 2049".into(), None));
        assert_eq!(split_title_year("Up (Pixar)"), ("Up (Pixar)".into(), None));
    }

    #[test]
    fn find_year_ignores_other_numbers() {
        assert_eq!(find_year("HD 1080 - 2019"), Some(2019));
        assert_eq!(find_year("12345"), None);
        assert_eq!(find_year("no year"), None);
    }
}
