use crate::config::SiteConfig;
use crate::{UrlError, UrlResult};
use url::Url;

/// Builds the absolute URL of catalog page `page` (0-based)
///
/// # Examples
///
/// ```
/// use sumi_harvest::config::SiteConfig;
/// use sumi_harvest::url::catalog_page_url;
///
/// let site = SiteConfig {
///     base_url: "https://example.com".to_string(),
///     catalog_path: "/list/all-{page}.html".to_string(),
///     ..SiteConfig::default()
/// };
/// assert_eq!(
///     catalog_page_url(&site, 3).unwrap(),
///     "https://example.com/list/all-3.html"
/// );
/// ```
pub fn catalog_page_url(site: &SiteConfig, page: u32) -> UrlResult<String> {
    let path = site.catalog_path.replace("{page}", &page.to_string());
    absolutize(&site.base_url, &path)
}

/// Derives the URL of chapter `index` from an item URL
///
/// The trailing `.html` becomes `_{index}.html`; without one, `_{index}` is appended.
pub fn subitem_url(item_url: &str, index: u32) -> String {
    match item_url.strip_suffix(".html") {
        Some(stem) => format!("{}_{}.html", stem, index),
        None => format!("{}_{}", item_url, index),
    }
}

/// Last path segment of an item URL without its `.html` extension
pub fn item_slug(item_url: &str) -> UrlResult<String> {
    let url = Url::parse(item_url).map_err(|e| UrlError::Parse(e.to_string()))?;
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .ok_or_else(|| UrlError::MissingSlug(item_url.to_string()))?;

    let slug = segment.strip_suffix(".html").unwrap_or(segment);
    if slug.is_empty() {
        return Err(UrlError::MissingSlug(item_url.to_string()));
    }
    Ok(slug.to_string())
}

/// Resolves `href` against `base`; absolute hrefs are returned as-is
pub fn absolutize(base: &str, href: &str) -> UrlResult<String> {
    let base = Url::parse(base).map_err(|e| UrlError::Parse(e.to_string()))?;
    let joined = base
        .join(href.trim())
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;
    Ok(joined.to_string())
}

/// Scheme, host and port of a URL, e.g. `https://example.com`
pub fn origin(url: &str) -> UrlResult<String> {
    let url = Url::parse(url).map_err(|e| UrlError::Parse(e.to_string()))?;
    Ok(url.origin().ascii_serialization())
}

pub fn robots_url(url: &str) -> UrlResult<String> {
    Ok(format!("{}/robots.txt", origin(url)?))
}

/// True for a non-empty identifier made of ASCII letters, digits, `-` and `_`
///
/// Only such identifiers may name a directory under the data root.
pub fn is_plain_segment(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
