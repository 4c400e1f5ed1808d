//! URL handling module for Sumi-Harvest
//!
//! Builds catalog page and chapter URLs and derives item slugs.

mod site;

// Re-export main functions
pub use site::{
    absolutize, catalog_page_url, is_plain_segment, item_slug, origin, robots_url, subitem_url,
};
