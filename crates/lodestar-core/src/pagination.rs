//! Fetch-all-pages helper over a paged REST resource.
//!
//! The paginator knows nothing about what it fetches: the caller supplies a
//! closure that retrieves one page and reports the total page count when the
//! remote side exposes it.

use std::future::Future;

use tracing::debug;

use crate::Result;

/// Which page to fetch next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

/// One fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total number of pages, when the provider reports it
    pub total_pages: Option<u32>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_pages: Option<u32>) -> Self {
        Self { items, total_pages }
    }
}

/// Cursor state across a fetch-all
#[derive(Debug)]
struct PagedResults<T> {
    first_page: u32,
    page: u32,
    results: Vec<T>,
    has_more: bool,
}

impl<T> PagedResults<T> {
    fn new(first_page: u32) -> Self {
        // Total is unknown until the first response arrives.
        Self {
            first_page,
            page: first_page,
            results: Vec::new(),
            has_more: true,
        }
    }

    fn accept(&mut self, page: Page<T>) {
        let empty = page.items.is_empty();
        self.results.extend(page.items);

        let fetched = self.page - self.first_page + 1;
        self.page += 1;

        self.has_more = !empty
            && match page.total_pages {
                Some(total) => fetched < total,
                None => true,
            };
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    page_size: u32,
    first_page: u32,
}

impl Paginator {
    /// Paginator for providers whose pages start at `first_page`
    /// (0 for zero-based APIs, 1 for GitLab).
    pub fn new(page_size: u32, first_page: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            first_page,
        }
    }

    /// Fetch every page in ascending order and concatenate the items.
    ///
    /// Stops once the reported page total is reached or a page comes back
    /// empty. The first failing page aborts the whole fetch.
    pub async fn fetch_all<T, F, Fut>(&self, mut fetch_page: F) -> Result<Vec<T>>
    where
        F: FnMut(PageRequest) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let mut cursor = PagedResults::new(self.first_page);

        while cursor.has_more {
            let request = PageRequest {
                page: cursor.page,
                per_page: self.page_size,
            };
            let page = fetch_page(request).await?;
            debug!(
                page = request.page,
                items = page.items.len(),
                total_pages = ?page.total_pages,
                "Fetched page"
            );
            cursor.accept(page);
        }

        Ok(cursor.results)
    }
}
