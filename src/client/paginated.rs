//! Cursor-based pagination: immutable pages and lazy iteration.
//!
//! A [`Page`] is one server-returned batch plus a bound fetcher for
//! adjacent batches. [`PageStream`] implements the `Stream` trait for
//! lazy, memory-efficient traversal of every item across pages.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Boxed future resolving to a fetched page.
pub type PageFuture<T> = Pin<Box<dyn Future<Output = Result<Page<T>>> + Send>>;

/// Bound fetch operation: `(page, page_size)` to a fresh [`Page`].
///
/// The closure captures every filter/sort parameter of the originating list
/// call; only page number and size vary between navigation calls.
pub type PageFetcher<T> = Arc<dyn Fn(u32, u32) -> PageFuture<T> + Send + Sync>;

/// Pagination metadata from a list response.
///
/// The server is the source of truth; the client trusts `has_next` and
/// `has_previous` as given rather than re-deriving them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Current page number (1-based).
    pub page: u32,
    /// Items per page.
    pub page_size: u32,
    /// Total items across all pages.
    pub total_count: u64,
    /// Total number of pages.
    pub total_pages: u32,
    /// Whether a following page exists.
    pub has_next: bool,
    /// Whether a preceding page exists.
    pub has_previous: bool,
}

impl PageInfo {
    /// Metadata for an unpaginated response treated as a single page.
    pub fn single(len: usize) -> Self {
        Self {
            page: 1,
            page_size: len as u32,
            total_count: len as u64,
            total_pages: 1,
            has_next: false,
            has_previous: false,
        }
    }
}

/// Raw body shape of a list endpoint.
///
/// Resource wrappers deserialize into this and hand the parts to
/// [`create_page`].
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    /// Items on this page, in server order.
    pub data: Vec<T>,
    /// Pagination metadata, absent for unpaginated endpoints.
    pub pagination: Option<PageInfo>,
}

/// One immutable page of list results with bound navigation.
///
/// No operation mutates a page; navigation resolves fresh `Page` values,
/// so an original page stays valid and independently replayable.
///
/// # Example
///
/// ```no_run
/// use futures_util::StreamExt;
/// use pokeforge_rs::Page;
///
/// # async fn example(first: Page<serde_json::Value>) -> pokeforge_rs::Result<()> {
/// let mut stream = first.items();
/// while let Some(item) = stream.next().await {
///     println!("{:?}", item?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Page<T> {
    data: Vec<T>,
    pagination: PageInfo,
    fetcher: PageFetcher<T>,
}

impl<T> Page<T> {
    /// Create a page from its parts.
    pub fn new(data: Vec<T>, pagination: PageInfo, fetcher: PageFetcher<T>) -> Self {
        Self {
            data,
            pagination,
            fetcher,
        }
    }

    /// Items on this page, in the order the server returned them.
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Pagination metadata for this page.
    pub fn pagination(&self) -> PageInfo {
        self.pagination
    }

    /// Consume the page, keeping only its items.
    pub fn into_data(self) -> Vec<T> {
        self.data
    }

    /// Fetch the following page, or `None` when this is the last.
    ///
    /// Gated on `has_next`; no network call is made when it is `false`.
    pub async fn next_page(&self) -> Result<Option<Page<T>>> {
        if !self.pagination.has_next {
            return Ok(None);
        }
        let page = (self.fetcher)(self.pagination.page + 1, self.pagination.page_size).await?;
        Ok(Some(page))
    }

    /// Fetch the preceding page, or `None` when this is the first.
    pub async fn previous_page(&self) -> Result<Option<Page<T>>> {
        if !self.pagination.has_previous {
            return Ok(None);
        }
        let page = (self.fetcher)(self.pagination.page - 1, self.pagination.page_size).await?;
        Ok(Some(page))
    }

    /// Fetch an arbitrary page number.
    ///
    /// No client-side bounds check; an out-of-range request surfaces as
    /// whatever the server returns.
    pub async fn go_to_page(&self, page: u32) -> Result<Page<T>> {
        (self.fetcher)(page, self.pagination.page_size).await
    }

    /// Collect this page and every following page into one ordered list.
    ///
    /// The current page's items are taken as-is; only subsequent pages are
    /// fetched.
    pub async fn to_list(&self) -> Result<Vec<T>>
    where
        T: Clone,
    {
        let mut all = self.data.clone();
        let mut next = self.next_page().await?;
        while let Some(page) = next {
            let Page {
                data,
                pagination,
                fetcher,
            } = page;
            next = if pagination.has_next {
                Some(fetcher(pagination.page + 1, pagination.page_size).await?)
            } else {
                None
            };
            all.extend(data);
        }
        Ok(all)
    }

    /// Lazily iterate every item from this page onward.
    ///
    /// The current page's items are yielded without any fetch; subsequent
    /// pages are fetched on demand while `has_next` holds. Clone the page
    /// first (`T: Clone`) to keep a replayable starting point.
    pub fn items(self) -> PageStream<T> {
        PageStream {
            fetcher: self.fetcher,
            current: self.data.into_iter(),
            next_fetch: self
                .pagination
                .has_next
                .then_some((self.pagination.page + 1, self.pagination.page_size)),
            pending: None,
        }
    }
}

impl<T: Clone> Clone for Page<T> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            pagination: self.pagination,
            fetcher: self.fetcher.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Page<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("data", &self.data)
            .field("pagination", &self.pagination)
            .finish_non_exhaustive()
    }
}

/// Create a [`Page`] from a raw list response.
///
/// Absent pagination metadata is treated as a single complete page.
pub fn create_page<T>(
    data: Vec<T>,
    pagination: Option<PageInfo>,
    fetcher: PageFetcher<T>,
) -> Page<T> {
    let pagination = pagination.unwrap_or_else(|| PageInfo::single(data.len()));
    Page::new(data, pagination, fetcher)
}

/// A stream that lazily fetches pages as items are consumed.
///
/// Yields every item of the starting page first, then follows `has_next`
/// page by page. An empty fetched page ends the sequence; an error is
/// yielded once and the stream terminates.
pub struct PageStream<T> {
    fetcher: PageFetcher<T>,
    current: std::vec::IntoIter<T>,
    /// Next `(page, page_size)` to fetch once the current items run out.
    next_fetch: Option<(u32, u32)>,
    pending: Option<PageFuture<T>>,
}

impl<T> Stream for PageStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(item) = this.current.next() {
                return Poll::Ready(Some(Ok(item)));
            }

            if let Some(fut) = this.pending.as_mut() {
                match fut.as_mut().poll(cx) {
                    Poll::Ready(Ok(page)) => {
                        this.pending = None;
                        this.next_fetch = page
                            .pagination
                            .has_next
                            .then_some((page.pagination.page + 1, page.pagination.page_size));
                        this.current = page.data.into_iter();
                        if this.current.len() == 0 {
                            // Contract violation or genuinely empty page:
                            // end quietly instead of faulting.
                            return Poll::Ready(None);
                        }
                        continue;
                    }
                    Poll::Ready(Err(e)) => {
                        this.pending = None;
                        this.next_fetch = None;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Pending => return Poll::Pending,
                }
            }

            if let Some((page, page_size)) = this.next_fetch.take() {
                this.pending = Some((this.fetcher)(page, page_size));
                continue;
            }

            return Poll::Ready(None);
        }
    }
}

impl<T> Unpin for PageStream<T> {}
