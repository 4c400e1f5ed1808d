//! Enrichment: resolves item identifiers and writes detail records

use crate::crawler::DetailFields;
use crate::output::Progress;
use crate::stages::{StageContext, StageSummary};
use crate::state::{CatalogEntry, CatalogIndex, DetailRecord};
use crate::url::{absolutize, item_slug};
use crate::{HarvestError, Result};

const UNKNOWN_AUTHOR: &str = "Unknown";
const UNKNOWN_STATUS: &str = "Unknown";
const NO_SUMMARY: &str = "<p>No summary available</p>";

/// What happened to one catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Patched,
    Unchanged,
    /// The stored detail record could not be read
    Unreadable,
}

/// Creates or refreshes the detail record of every catalog entry
///
/// Extraction misses are skips and unreadable records are failures; both
/// leave the rest of the catalog untouched. Only checkpoint writes abort.
pub async fn run(ctx: &StageContext<'_>, summary: &mut StageSummary) -> Result<()> {
    let mut catalog = ctx.store.read_catalog()?;

    let entries: Vec<CatalogEntry> = catalog
        .entries()
        .filter(|entry| entry.total_subitems > 0)
        .cloned()
        .collect();
    summary.skipped += (catalog.len() - entries.len()) as u64;
    tracing::info!(items = entries.len(), "Starting enrichment");

    let mut progress = Progress::new(entries.len() as u64);
    for entry in &entries {
        match enrich(ctx, &mut catalog, entry).await {
            Ok(Outcome::Created) => {
                summary.processed += 1;
                summary.changed += 1;
                tracing::info!(url = %entry.url, "Created detail record {}", progress.snapshot());
            }
            Ok(Outcome::Patched) => {
                summary.processed += 1;
                summary.changed += 1;
                tracing::info!(
                    url = %entry.url,
                    total = entry.total_subitems,
                    "Updated chapter count"
                );
            }
            Ok(Outcome::Unchanged) => {
                summary.skipped += 1;
                tracing::debug!(url = %entry.url, "Detail record up to date");
            }
            Ok(Outcome::Unreadable) => summary.failed += 1,
            Err(e @ HarvestError::Extraction { .. }) => {
                summary.skipped += 1;
                tracing::warn!(url = %entry.url, "Skipping item: {}", e);
            }
            Err(HarvestError::Storage(e)) => return Err(HarvestError::Storage(e)),
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(url = %entry.url, "Skipping item: {}", e);
            }
        }
        progress.tick();
    }

    Ok(())
}

async fn enrich(
    ctx: &StageContext<'_>,
    catalog: &mut CatalogIndex,
    entry: &CatalogEntry,
) -> Result<Outcome> {
    // Page fetched while resolving the id, reused for field extraction
    let mut page = None;

    let id = match &entry.id {
        Some(id) => id.clone(),
        None => {
            let body = fetch_item(ctx, &entry.url).await?;
            let id = ctx
                .extractor
                .extract_identifier(&body)
                .ok_or_else(|| HarvestError::Extraction {
                    url: entry.url.clone(),
                    field: "identifier".to_string(),
                })?;
            catalog.set_id(&entry.url, &id);
            ctx.store.write_catalog(catalog)?;
            tracing::debug!(url = %entry.url, id = %id, "Resolved item identifier");
            page = Some(body);
            id
        }
    };

    match ctx.store.read_detail(&id) {
        Ok(mut detail) => {
            if detail.refresh_total(entry.total_subitems) {
                ctx.store.write_detail(&detail)?;
                Ok(Outcome::Patched)
            } else {
                Ok(Outcome::Unchanged)
            }
        }
        Err(e) if e.is_not_found() => {
            let body = match page {
                Some(body) => body,
                None => fetch_item(ctx, &entry.url).await?,
            };
            let fields = ctx.extractor.extract_detail(&body, &entry.url)?;
            drop(body);

            let detail = build_detail(ctx, entry, id, fields)?;
            ctx.store.write_detail(&detail)?;
            Ok(Outcome::Created)
        }
        Err(e) => {
            tracing::warn!(url = %entry.url, id = %id, "Unreadable detail record: {}", e);
            Ok(Outcome::Unreadable)
        }
    }
}

async fn fetch_item(ctx: &StageContext<'_>, url: &str) -> Result<String> {
    ctx.delay.pause().await;
    ctx.scheduler.enqueue(url).await
}

/// Applies fallbacks to extracted fields
fn build_detail(
    ctx: &StageContext<'_>,
    entry: &CatalogEntry,
    id: String,
    fields: DetailFields,
) -> Result<DetailRecord> {
    let image_url = match fields.image_url {
        Some(url) => url,
        None => absolutize(&ctx.site.base_url, &ctx.site.placeholder_image)?,
    };

    let categories = if fields.categories.is_empty() {
        vec![ctx.site.default_category.clone()]
    } else {
        fields.categories
    };

    Ok(DetailRecord {
        id,
        slug: item_slug(&entry.url)?,
        title: fields.title,
        author: fields.author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        image_url,
        summary: fields.summary.unwrap_or_else(|| NO_SUMMARY.to_string()),
        categories,
        tags: fields.tags,
        total_subitems: entry.total_subitems,
        completed_subitems: 0,
        status: fields.status.unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
        source_url: entry.url.clone(),
    })
}
