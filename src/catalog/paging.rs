use std::future::Future;

use tracing::{debug, warn};

use crate::{Res, error::SourceError, types::TrackDescriptor};

/// Pages walked at most, whatever the configured limit. Guards against a
/// provider that never stops advertising a next page.
pub const HARD_PAGE_CEILING: usize = 1_000;

/// Window requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

/// One parsed page of a collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<TrackDescriptor>,
    /// Entries the provider returned, counting the ones that failed to parse.
    pub fetched: usize,
    /// Whether the provider advertised a following page.
    pub has_next: bool,
}

impl Page {
    /// Page where every returned entry parsed.
    pub fn new(items: Vec<TrackDescriptor>, has_next: bool) -> Self {
        Self {
            fetched: items.len(),
            items,
            has_next,
        }
    }
}

#[derive(Debug, Default)]
struct PageCursor {
    offset: usize,
    pages: usize,
    has_more: bool,
}

/// Walks a paged collection under a page size and a page-count ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagedCollectionFetcher {
    page_size: usize,
    max_pages: Option<usize>,
}

impl PagedCollectionFetcher {
    /// `max_pages <= 0` means unbounded: the walk only stops when the
    /// provider runs out of pages (or at [`HARD_PAGE_CEILING`]).
    pub fn new(page_size: usize, max_pages: i64) -> Self {
        Self {
            page_size: page_size.max(1),
            max_pages: usize::try_from(max_pages).ok().filter(|m| *m > 0),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn max_pages(&self) -> Option<usize> {
        self.max_pages
    }

    /// Requests pages through `fetch_page` until exhaustion or the ceiling,
    /// returning the items in discovery order.
    ///
    /// Truncation by the page limit is a valid partial result. A failing
    /// page aborts the walk with [`SourceError::Fetch`] and discards what
    /// was accumulated so far.
    pub async fn fetch<F, Fut>(&self, mut fetch_page: F) -> Res<Vec<TrackDescriptor>>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Res<Page>>,
    {
        let mut tracks = Vec::new();
        let mut cursor = PageCursor {
            has_more: true,
            ..PageCursor::default()
        };

        while cursor.has_more {
            let request = PageRequest {
                offset: cursor.offset,
                limit: self.page_size,
            };
            let page = fetch_page(request)
                .await
                .map_err(|source| SourceError::Fetch {
                    offset: cursor.offset,
                    source: Box::new(source),
                })?;

            let received = page.items.len();
            if received < page.fetched {
                debug!(
                    offset = request.offset,
                    skipped = page.fetched - received,
                    "page held unusable entries"
                );
            }
            tracks.extend(page.items);
            cursor.pages += 1;
            cursor.offset += self.page_size;
            // only an empty page from the provider ends the walk early
            cursor.has_more = page.has_next && page.fetched > 0;
            debug!(offset = request.offset, received, page = cursor.pages, "fetched page");

            if !cursor.has_more {
                break;
            }
            if self.max_pages.is_some_and(|max| cursor.pages >= max) {
                debug!(pages = cursor.pages, "page limit reached");
                break;
            }
            if cursor.pages >= HARD_PAGE_CEILING {
                warn!(pages = cursor.pages, "provider kept paging past the hard ceiling");
                break;
            }
        }

        Ok(tracks)
    }
}
