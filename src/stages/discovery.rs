//! Discovery: walks the paginated catalog and maintains the catalog index

use crate::output::Progress;
use crate::stages::{StageContext, StageSummary};
use crate::state::CatalogEntry;
use crate::url::catalog_page_url;
use crate::Result;

/// Fetches every catalog page and merges its rows into the index
///
/// The page count comes from page 0 and is fixed for the run; failing to
/// fetch page 0 aborts the stage. Later page failures are counted and skipped.
pub async fn run(ctx: &StageContext<'_>, summary: &mut StageSummary) -> Result<()> {
    let mut catalog = ctx.store.read_catalog()?;
    tracing::info!(known = catalog.len(), "Loaded catalog index");

    let first_url = catalog_page_url(ctx.site, 0)?;
    let first_page = ctx.scheduler.enqueue(&first_url).await?;
    let last_page = ctx.extractor.extract_last_page_index(&first_page);
    tracing::info!(pages = last_page + 1, "Starting catalog discovery");

    let mut progress = Progress::new(u64::from(last_page) + 1);
    let mut pending_first = Some(first_page);

    for page in 0..=last_page {
        let body = match pending_first.take() {
            Some(body) => body,
            None => {
                ctx.delay.pause().await;
                match fetch_page(ctx, page).await {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::warn!(page, "Skipping catalog page: {}", e);
                        summary.failed += 1;
                        progress.tick();
                        continue;
                    }
                }
            }
        };

        let rows = ctx.extractor.extract_list(&body);
        drop(body);

        let mut found = 0u64;
        let mut updated = 0u64;
        for row in rows {
            if row.total_subitems == 0 {
                tracing::warn!(url = %row.url, "Skipping catalog row with no chapter count");
                summary.skipped += 1;
                continue;
            }

            let previous = catalog.get(&row.url).cloned();
            let entry =
                CatalogEntry::merged(row.url, row.total_subitems, row.status, previous.as_ref());
            if entry.updated {
                updated += 1;
            }
            catalog.upsert(entry);
            found += 1;
        }

        if updated > 0 {
            ctx.store.write_catalog(&catalog)?;
        }

        summary.processed += 1;
        summary.changed += updated;
        progress.tick();
        tracing::info!(
            page,
            found,
            updated,
            "Catalog page {}",
            progress.snapshot()
        );
    }

    tracing::info!(total = catalog.len(), "Catalog discovery finished");
    Ok(())
}

async fn fetch_page(ctx: &StageContext<'_>, page: u32) -> Result<String> {
    let url = catalog_page_url(ctx.site, page)?;
    ctx.scheduler.enqueue(&url).await
}
