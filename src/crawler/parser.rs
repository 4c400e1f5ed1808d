//! HTML extraction for catalog, item and chapter pages
//!
//! Everything here is a pure function of the page body. A parsed `Html`
//! document is never held across an `.await`; callers hand in the body string
//! and get owned values back.

use crate::config::{SelectorConfig, SiteConfig};
use crate::url::is_plain_segment;
use crate::{ConfigError, HarvestError, Result};
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};

/// Attribute carrying the site identifier on the item page
const ID_ATTRIBUTE: &str = "data-novelid";

/// Icon text marking the chapter-count span in a catalog row
const SUBITEM_ICON: &str = "book";

/// Status words recognised in the item page header
const KNOWN_STATUSES: &[&str] = &["Ongoing", "Completed"];

/// Elements serialized without a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Words left as they are by `title_case` unless they open the title
const SMALL_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "for", "in", "nor", "of", "on", "or", "the", "to",
    "vs", "via",
];

/// One row of a catalog page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRow {
    /// Absolute item URL
    pub url: String,
    /// Chapter count shown in the row; 0 when it could not be read
    pub total_subitems: u32,
    pub status: String,
}

/// Descriptive fields read from an item page
///
/// Optional fields are `None` when the page lacks them; fallbacks are
/// applied by the enrichment stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailFields {
    pub title: String,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub summary: Option<String>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub status: Option<String>,
}

/// Title and cleaned body of a chapter page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubitemFields {
    pub title: String,
    pub body: String,
}

/// Site-specific markup extraction
pub trait Extractor: Send + Sync {
    /// Rows of a catalog page, in page order
    fn extract_list(&self, html: &str) -> Vec<ListRow>;

    /// Highest catalog page index linked from the pagination control (0 if none)
    fn extract_last_page_index(&self, html: &str) -> u32;

    /// Site identifier of an item page; only plain path segments are accepted
    fn extract_identifier(&self, html: &str) -> Option<String>;

    /// Descriptive fields of an item page; fails if the title is missing
    fn extract_detail(&self, html: &str, url: &str) -> Result<DetailFields>;

    /// Title and body of a chapter page; fails if the body is empty
    fn extract_subitem(&self, html: &str, url: &str) -> Result<SubitemFields>;
}

/// Compiles a CSS selector, reporting the offending selector on failure
pub fn compile_selector(selector: &str) -> std::result::Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// CSS-selector driven `Extractor` for the catalog site
#[derive(Debug, Clone)]
pub struct SiteExtractor {
    base_url: String,
    page_prefix: String,
    page_suffix: String,
    icon: Selector,
    novel_item: Selector,
    novel_link: Selector,
    novel_stats: Selector,
    novel_status: Selector,
    pagination_link: Selector,
    novel_id: Selector,
    title: Selector,
    author: Selector,
    cover: Selector,
    summary: Selector,
    categories: Selector,
    tags: Selector,
    detail_status: Selector,
    chapter_title: Selector,
    chapter_content: Selector,
    chapter_noise: Selector,
}

impl SiteExtractor {
    pub fn new(
        selectors: &SelectorConfig,
        site: &SiteConfig,
    ) -> std::result::Result<Self, ConfigError> {
        let (page_prefix, page_suffix) = site
            .catalog_path
            .split_once("{page}")
            .ok_or_else(|| {
                ConfigError::Validation("site.catalog-path must contain {page}".to_string())
            })?;

        Ok(Self {
            base_url: site.base_url.clone(),
            page_prefix: page_prefix.to_string(),
            page_suffix: page_suffix.to_string(),
            icon: compile_selector("i.material-icons")?,
            novel_item: compile_selector(&selectors.novel_item)?,
            novel_link: compile_selector(&selectors.novel_link)?,
            novel_stats: compile_selector(&selectors.novel_stats)?,
            novel_status: compile_selector(&selectors.novel_status)?,
            pagination_link: compile_selector(&selectors.pagination_link)?,
            novel_id: compile_selector(&selectors.novel_id)?,
            title: compile_selector(&selectors.title)?,
            author: compile_selector(&selectors.author)?,
            cover: compile_selector(&selectors.cover)?,
            summary: compile_selector(&selectors.summary)?,
            categories: compile_selector(&selectors.categories)?,
            tags: compile_selector(&selectors.tags)?,
            detail_status: compile_selector(&selectors.detail_status)?,
            chapter_title: compile_selector(&selectors.chapter_title)?,
            chapter_content: compile_selector(&selectors.chapter_content)?,
            chapter_noise: compile_selector(&selectors.chapter_noise)?,
        })
    }

    fn absolute(&self, href: &str) -> Option<String> {
        crate::url::absolutize(&self.base_url, href).ok()
    }

    /// Chapter count of a catalog row
    ///
    /// Prefers the stats span whose icon reads "book"; stats without any icon
    /// fall back to the first span holding a number.
    fn row_subitem_count(&self, row: ElementRef<'_>) -> u32 {
        let spans: Vec<ElementRef<'_>> = row.select(&self.novel_stats).collect();

        let by_icon = spans.iter().find(|span| {
            span.select(&self.icon)
                .any(|icon| clean_text(&element_text(icon)) == SUBITEM_ICON)
        });
        if let Some(span) = by_icon {
            return first_number(&element_text(*span)).unwrap_or(0);
        }

        if spans.iter().any(|span| span.select(&self.icon).next().is_some()) {
            return 0;
        }
        spans
            .iter()
            .find_map(|span| first_number(&element_text(*span)))
            .unwrap_or(0)
    }

    fn page_index_from_href(&self, href: &str) -> Option<u32> {
        let start = href.find(&self.page_prefix)? + self.page_prefix.len();
        let rest = &href[start..];
        let digits = rest.strip_suffix(&self.page_suffix).unwrap_or(rest);
        digits.parse().ok()
    }

    fn text_list(&self, document: &Html, selector: &Selector) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        for element in document.select(selector) {
            let value = clean_text(&element_text(element));
            if !value.is_empty() && !values.contains(&value) {
                values.push(value);
            }
        }
        values
    }
}

impl Extractor for SiteExtractor {
    fn extract_list(&self, html: &str) -> Vec<ListRow> {
        let document = Html::parse_document(html);
        let mut rows = Vec::new();

        for row in document.select(&self.novel_item) {
            let href = row
                .select(&self.novel_link)
                .find_map(|link| link.value().attr("href"));
            let Some(url) = href.and_then(|href| self.absolute(href)) else {
                tracing::warn!("Catalog row without an item link, skipping");
                continue;
            };

            let status = row
                .select(&self.novel_status)
                .next()
                .map(|el| clean_text(&element_text(el)))
                .unwrap_or_default();

            rows.push(ListRow {
                url,
                total_subitems: self.row_subitem_count(row),
                status,
            });
        }

        rows
    }

    fn extract_last_page_index(&self, html: &str) -> u32 {
        let document = Html::parse_document(html);
        document
            .select(&self.pagination_link)
            .filter_map(|link| link.value().attr("href"))
            .filter_map(|href| self.page_index_from_href(href))
            .max()
            .unwrap_or(0)
    }

    fn extract_identifier(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let id = document
            .select(&self.novel_id)
            .find_map(|el| el.value().attr(ID_ATTRIBUTE))
            .map(str::trim)
            .filter(|id| !id.is_empty())?;

        if !is_plain_segment(id) {
            tracing::warn!(id, "Rejecting item identifier that is not a plain segment");
            return None;
        }
        Some(id.to_string())
    }

    fn extract_detail(&self, html: &str, url: &str) -> Result<DetailFields> {
        let document = Html::parse_document(html);

        let title = document
            .select(&self.title)
            .next()
            .map(|el| title_case(&clean_text(&element_text(el))))
            .filter(|title| !title.is_empty())
            .ok_or_else(|| HarvestError::Extraction {
                url: url.to_string(),
                field: "title".to_string(),
            })?;

        let author = document
            .select(&self.author)
            .next()
            .map(|el| clean_text(&element_text(el)))
            .filter(|author| !author.is_empty());

        let image_url = document
            .select(&self.cover)
            .find_map(|img| {
                img.value()
                    .attr("data-src")
                    .or_else(|| img.value().attr("src"))
            })
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .and_then(|src| self.absolute(src));

        let summary = document
            .select(&self.summary)
            .next()
            .map(|el| inner_html_without(el, &self.chapter_noise).trim().to_string())
            .filter(|summary| !summary.is_empty());

        let status = document
            .select(&self.detail_status)
            .map(|el| clean_text(&element_text(el)))
            .find_map(|text| {
                KNOWN_STATUSES
                    .iter()
                    .find(|status| text.contains(*status))
                    .map(|status| status.to_string())
            });

        Ok(DetailFields {
            title,
            author,
            image_url,
            summary,
            categories: self.text_list(&document, &self.categories),
            tags: self.text_list(&document, &self.tags),
            status,
        })
    }

    fn extract_subitem(&self, html: &str, url: &str) -> Result<SubitemFields> {
        let document = Html::parse_document(html);

        let title = document
            .select(&self.chapter_title)
            .next()
            .map(|el| title_case(&clean_text(&element_text(el))))
            .unwrap_or_default();

        let body = document
            .select(&self.chapter_content)
            .next()
            .map(|el| inner_html_without(el, &self.chapter_noise).trim().to_string())
            .unwrap_or_default();

        if body.is_empty() {
            return Err(HarvestError::Extraction {
                url: url.to_string(),
                field: "chapter content".to_string(),
            });
        }

        Ok(SubitemFields { title, body })
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect()
}

/// First run of digits in `text`, ignoring thousands separators
fn first_number(text: &str) -> Option<u32> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let digits: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}

/// Collapses runs of whitespace into single spaces and trims the ends
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Upper-cases the first letter of each word, leaving short connecting
/// words alone unless they open the title
pub fn title_case(text: &str) -> String {
    text.split(' ')
        .enumerate()
        .map(|(position, word)| {
            if position > 0 && SMALL_WORDS.contains(&word) {
                return word.to_string();
            }
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Serializes the children of `element`, dropping subtrees matching `noise`
fn inner_html_without(element: ElementRef<'_>, noise: &Selector) -> String {
    let mut out = String::new();
    write_children(element, noise, &mut out);
    out
}

fn write_children(element: ElementRef<'_>, noise: &Selector, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&html_escape::encode_text(&text[..])),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    if !noise.matches(&child) {
                        write_element(child, noise, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: ElementRef<'_>, noise: &Selector, out: &mut String) {
    let value = element.value();
    out.push('<');
    out.push_str(value.name());
    for (name, attr) in value.attrs() {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&html_escape::encode_double_quoted_attribute(attr));
        out.push('"');
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&value.name()) {
        return;
    }

    write_children(element, noise, out);
    out.push_str("</");
    out.push_str(value.name());
    out.push('>');
}
