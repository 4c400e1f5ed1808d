//! Harvest: fetches chapters and advances each item's watermark
//!
//! `completed_subitems` is the length of the contiguous prefix of chapters
//! with stored content. A failed chapter leaves a gap: later chapters are
//! still fetched and stored, but the watermark stays at the gap until a later
//! run fills it. Stored chapter content is never fetched again.

use crate::crawler::SubitemFields;
use crate::output::Progress;
use crate::stages::{StageContext, StageSummary};
use crate::state::{CatalogEntry, DetailRecord, SubitemContent, SubitemList};
use crate::url::subitem_url;
use crate::Result;

/// Per-item counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ItemReport {
    fetched: u64,
    reused: u64,
    failed: u64,
    advanced: u32,
}

/// Harvests outstanding chapters of every enriched item
pub async fn run(ctx: &StageContext<'_>, summary: &mut StageSummary) -> Result<()> {
    let catalog = ctx.store.read_catalog()?;

    let entries: Vec<CatalogEntry> = catalog
        .entries()
        .filter(|entry| entry.total_subitems > 0 && entry.id.is_some())
        .cloned()
        .collect();
    summary.skipped += (catalog.len() - entries.len()) as u64;
    tracing::info!(items = entries.len(), "Starting chapter harvest");

    let mut progress = Progress::new(entries.len() as u64);
    for entry in &entries {
        progress.tick();
        let Some(id) = entry.id.as_deref() else {
            continue;
        };

        let mut detail = match ctx.store.read_detail(id) {
            Ok(detail) => detail,
            Err(e) if e.is_not_found() => {
                tracing::debug!(url = %entry.url, id, "No detail record yet, skipping");
                summary.skipped += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(url = %entry.url, id, "Unreadable detail record: {}", e);
                summary.failed += 1;
                continue;
            }
        };

        if detail.is_complete() {
            summary.skipped += 1;
            continue;
        }

        tracing::info!(
            id,
            title = %detail.title,
            from = detail.completed_subitems + 1,
            to = detail.total_subitems,
            "Harvesting chapters {}",
            progress.snapshot()
        );

        let report = harvest_item(ctx, &entry.url, &mut detail).await?;
        summary.processed += 1;
        summary.subitems_fetched += report.fetched;
        summary.subitems_failed += report.failed;
        if report.advanced > 0 {
            summary.changed += 1;
        }

        tracing::info!(
            id,
            fetched = report.fetched,
            reused = report.reused,
            failed = report.failed,
            completed = detail.completed_subitems,
            total = detail.total_subitems,
            "Finished item"
        );
    }

    Ok(())
}

/// Walks chapters `completed + 1 ..= total` of one item
///
/// Chapter failures are counted in the report; only storage errors escape.
async fn harvest_item(
    ctx: &StageContext<'_>,
    item_url: &str,
    detail: &mut DetailRecord,
) -> Result<ItemReport> {
    let mut report = ItemReport::default();
    let id = detail.id.clone();
    let total = detail.total_subitems;

    let (mut list, rebuilt) = match ctx.store.read_subitem_list(&id) {
        Ok(list) => (list, false),
        Err(e) if e.is_not_found() => (SubitemList::new(total), false),
        Err(e) => {
            tracing::warn!(id = %id, "Unreadable chapter list, rebuilding: {}", e);
            (rebuild_list(ctx, detail), true)
        }
    };
    let mut list_dirty = rebuilt || list.total != total;
    list.total = total;

    let mut progress = Progress::new(u64::from(total - detail.completed_subitems));

    for index in (detail.completed_subitems + 1)..=total {
        progress.tick();

        let title = match stored_title(ctx, &id, index) {
            Some(title) => {
                report.reused += 1;
                title
            }
            None => match fetch_subitem(ctx, item_url, index).await {
                Ok(fields) => {
                    let content = SubitemContent {
                        index,
                        title: fields.title,
                        body: fields.body,
                    };
                    ctx.store.write_subitem(&id, &content)?;
                    report.fetched += 1;
                    tracing::debug!(id = %id, chapter = index, "Saved chapter {}", progress.snapshot());
                    content.title
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(id = %id, chapter = index, "Chapter failed, leaving a gap: {}", e);
                    continue;
                }
            },
        };

        if list.patch(index, &title) || list_dirty {
            ctx.store.write_subitem_list(&id, &list)?;
            list_dirty = false;
        }

        if index == detail.completed_subitems + 1 && detail.advance() {
            ctx.store.write_detail(detail)?;
            report.advanced += 1;
        }
    }

    if list_dirty {
        ctx.store.write_subitem_list(&id, &list)?;
    }

    Ok(report)
}

/// Fresh chapter list carrying the titles of chapters below the watermark
fn rebuild_list(ctx: &StageContext<'_>, detail: &DetailRecord) -> SubitemList {
    let mut list = SubitemList::new(detail.total_subitems);
    for index in 1..=detail.completed_subitems {
        if let Some(title) = stored_title(ctx, &detail.id, index) {
            list.patch(index, &title);
        }
    }
    list
}

/// Title of a chapter whose content is already stored
fn stored_title(ctx: &StageContext<'_>, id: &str, index: u32) -> Option<String> {
    if !ctx.store.has_subitem(id, index) {
        return None;
    }
    match ctx.store.read_subitem(id, index) {
        Ok(content) => Some(content.title),
        Err(e) => {
            tracing::warn!(id, chapter = index, "Unreadable stored chapter, refetching: {}", e);
            None
        }
    }
}

async fn fetch_subitem(
    ctx: &StageContext<'_>,
    item_url: &str,
    index: u32,
) -> Result<SubitemFields> {
    let url = subitem_url(item_url, index);
    ctx.delay.pause().await;
    let body = ctx.scheduler.enqueue(&url).await?;

    let mut fields = ctx.extractor.extract_subitem(&body, &url)?;
    if fields.title.is_empty() {
        fields.title = format!("Chapter {}", index);
    }
    Ok(fields)
}
