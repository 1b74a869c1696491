//! Paginated collection for one (keyword, quarter) pair.
//!
//! The first page tells how many results exist. The collector then fetches
//! the remaining pages one after another, sleeping before each request, until
//! it has `min(total, max_items_per_query)` items, a page comes back empty, or
//! the cap is reached. Items are normalized into [`NewsRecord`]s and filtered
//! to the quarter's date window.

use crate::api::{RetrySearch, SearchApi};
use crate::config::Config;
use crate::filter::retain_within;
use crate::models::{NewsRecord, SearchItem};
use crate::quarters::QuarterRange;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

/// Number of pages needed to fetch `items` results at `display` per page.
pub fn page_count(items: usize, display: u32) -> usize {
    items.div_ceil(display.max(1) as usize)
}

pub struct QuarterCollector<S> {
    search: RetrySearch<S>,
    display: u32,
    max_items: usize,
    page_delay: Duration,
}

impl<S> QuarterCollector<S>
where
    S: SearchApi,
{
    pub fn new(api: S, config: &Config) -> Self {
        Self {
            search: RetrySearch::new(api, config.api.retry_count, config.api.retry_delay()),
            display: config.collection.display_per_page,
            max_items: config.collection.max_items_per_query,
            page_delay: config.collection.api_call_delay(),
        }
    }

    /// Collect the records for `keyword` published within `quarter`.
    ///
    /// # Arguments
    ///
    /// * `keyword` - Search query sent to the API as-is
    /// * `quarter` - Inclusive date window the hits are filtered to
    ///
    /// # Returns
    ///
    /// At most `max_items_per_query` records in API order. Records come back
    /// untagged; the part writer stamps keyword and quarter. Hits with an
    /// unparseable date are dropped.
    ///
    /// A search that fails on every attempt is treated as an empty page, so
    /// an unreachable API yields an empty vector rather than an error.
    #[instrument(level = "info", skip_all, fields(%keyword, quarter = %quarter.label))]
    pub async fn collect(&self, keyword: &str, quarter: &QuarterRange) -> Vec<NewsRecord> {
        info!(start = %quarter.start_date, end = %quarter.end_date, "Collecting quarter");

        let items = self.fetch_items(keyword).await;
        if items.is_empty() {
            info!("No search results");
            return Vec::new();
        }

        let fetched = items.len();
        let records: Vec<NewsRecord> = items.into_iter().filter_map(NewsRecord::from_item).collect();
        let unparseable = fetched - records.len();
        let records = retain_within(records, quarter);
        info!(fetched, unparseable, kept = records.len(), "Quarter collected");
        records
    }

    async fn fetch_items(&self, keyword: &str) -> Vec<SearchItem> {
        let first = self.search.search_or_empty(keyword, 1, self.display).await;
        let to_fetch = usize::try_from(first.total)
            .unwrap_or(usize::MAX)
            .min(self.max_items);
        if to_fetch == 0 {
            return Vec::new();
        }

        let mut items = first.items;
        let pages = page_count(to_fetch, self.display);
        debug!(total = first.total, to_fetch, pages, "Planned pagination");

        for page in 2..=pages {
            if items.len() >= self.max_items {
                break;
            }
            let start = (page - 1) * self.display as usize + 1;
            sleep(self.page_delay).await;

            let batch = self.search.search_or_empty(keyword, start, self.display).await.items;
            if batch.is_empty() {
                debug!(page, start, "Empty page; stopping early");
                break;
            }
            items.extend(batch);
        }

        items.truncate(self.max_items);
        items
    }
}
