//! Pagination for list endpoints
//!
//! Query parameters are validated into [`PaginationParams`] before a handler
//! runs; [`paginate`] then issues one count and one slice fetch against a
//! [`PageSource`] and assembles a [`Page`].

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use thiserror::Error;

use crate::app::AppState;
use crate::error::ApiError;
use crate::logging::ExecutionTimer;

/// Configured page size bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    pub default_size: u32,
    pub max_size: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_size: 20,
            max_size: 100,
        }
    }
}

/// Raw pagination query parameters
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PageQuery {
    /// Page number (1-indexed)
    pub page: Option<u32>,

    /// Items per page
    pub size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("page must be greater than or equal to 1")]
    PageOutOfRange,

    #[error("size must be between 1 and {max}")]
    SizeOutOfRange { max: u32 },
}

/// Validated page number and size. Both are always within bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationParams {
    page: u32,
    size: u32,
}

impl PaginationParams {
    pub fn new(page: u32, size: u32, config: &PaginationConfig) -> Result<Self, PaginationError> {
        if page < 1 {
            return Err(PaginationError::PageOutOfRange);
        }
        if size < 1 || size > config.max_size {
            return Err(PaginationError::SizeOutOfRange {
                max: config.max_size,
            });
        }
        Ok(Self { page, size })
    }

    pub fn from_query(query: &PageQuery, config: &PaginationConfig) -> Result<Self, PaginationError> {
        Self::new(
            query.page.unwrap_or(1),
            query.size.unwrap_or(config.default_size),
            config,
        )
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of records to skip
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }
}

/// Extractor yielding validated pagination parameters.
///
/// Rejects malformed or out-of-range input with a 422 before the handler body
/// runs, so no data-store call is made for a bad request.
#[derive(Debug, Clone, Copy)]
pub struct Pagination(pub PaginationParams);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for Pagination {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Query(query) = Query::<PageQuery>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::Validation(rejection.body_text()))?;

        let params = PaginationParams::from_query(&query, &state.settings.pagination)?;
        Ok(Self(params))
    }
}

/// A queryable collection that can be counted and sliced.
///
/// Implementations hold their own data-store handle and filters; `fetch` must
/// return records in the collection's stable order.
#[async_trait]
pub trait PageSource: Sync {
    type Item: Send;
    type Error: Send;

    async fn count(&self) -> Result<u64, Self::Error>;

    async fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<Self::Item>, Self::Error>;
}

#[async_trait]
impl<T> PageSource for Vec<T>
where
    T: Clone + Send + Sync,
{
    type Item = T;
    type Error = Infallible;

    async fn count(&self) -> Result<u64, Infallible> {
        Ok(self.len() as u64)
    }

    async fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<T>, Infallible> {
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(self.iter().skip(start).take(take).cloned().collect())
    }
}

/// One page of an ordered collection plus count metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub size: u32,
    pub pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, params: PaginationParams) -> Self {
        let pages = total.div_ceil(params.limit());
        let page = params.page();

        Self {
            items,
            total,
            page,
            size: params.size(),
            pages,
            has_next: u64::from(page) < pages,
            has_prev: page > 1,
        }
    }

    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            size: self.size,
            pages: self.pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}

/// Count the source, fetch the requested slice, and assemble the page.
///
/// Always one `count` and one `fetch`; errors from either propagate as-is.
pub async fn paginate<S>(source: &S, params: PaginationParams) -> Result<Page<S::Item>, S::Error>
where
    S: PageSource,
{
    let _timer = ExecutionTimer::start("paginate");

    let total = source.count().await?;
    let mut items = source.fetch(params.offset(), params.limit()).await?;

    // A source must never widen the page
    items.truncate(params.size() as usize);

    tracing::debug!(
        page = params.page(),
        size = params.size(),
        total,
        returned = items.len(),
        "Page assembled"
    );

    Ok(Page::new(items, total, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn params(page: u32, size: u32) -> PaginationParams {
        PaginationParams::new(page, size, &PaginationConfig::default()).unwrap()
    }

    /// Records every call so tests can assert on data-store traffic
    struct CountingSource {
        rows: Vec<u32>,
        counts: AtomicUsize,
        fetches: AtomicUsize,
        fail_fetch: bool,
    }

    impl CountingSource {
        fn new(n: u32) -> Self {
            Self {
                rows: (0..n).collect(),
                counts: AtomicUsize::new(0),
                fetches: AtomicUsize::new(0),
                fail_fetch: false,
            }
        }
    }

    #[async_trait]
    impl PageSource for CountingSource {
        type Item = u32;
        type Error = String;

        async fn count(&self) -> Result<u64, String> {
            self.counts.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.len() as u64)
        }

        async fn fetch(&self, offset: u64, limit: u64) -> Result<Vec<u32>, String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch {
                return Err("connection reset".to_string());
            }
            Ok(self
                .rows
                .iter()
                .skip(offset as usize)
                .take(limit as usize)
                .copied()
                .collect())
        }
    }

    #[test]
    fn defaults_come_from_config() {
        let config = PaginationConfig {
            default_size: 7,
            max_size: 50,
        };
        let p = PaginationParams::from_query(&PageQuery::default(), &config).unwrap();
        assert_eq!((p.page(), p.size()), (1, 7));
    }

    #[rstest]
    #[case(0, 10, PaginationError::PageOutOfRange)]
    #[case(1, 0, PaginationError::SizeOutOfRange { max: 100 })]
    #[case(1, 101, PaginationError::SizeOutOfRange { max: 100 })]
    fn out_of_range_input_is_rejected(
        #[case] page: u32,
        #[case] size: u32,
        #[case] expected: PaginationError,
    ) {
        let err = PaginationParams::new(page, size, &PaginationConfig::default()).unwrap_err();
        assert_eq!(err, expected);
    }

    #[rstest]
    #[case(1, 10, 0)]
    #[case(2, 10, 10)]
    #[case(3, 25, 50)]
    #[case(1, 100, 0)]
    fn offset_is_page_minus_one_times_size(#[case] page: u32, #[case] size: u32, #[case] offset: u64) {
        let p = params(page, size);
        assert_eq!(p.offset(), offset);
        assert_eq!(p.limit(), u64::from(size));
    }

    #[rstest]
    #[case(0, 10, 0)]
    #[case(1, 10, 1)]
    #[case(10, 10, 1)]
    #[case(11, 10, 2)]
    #[case(25, 10, 3)]
    #[case(100, 1, 100)]
    fn pages_is_ceiling_of_total_over_size(#[case] total: u64, #[case] size: u32, #[case] pages: u64) {
        let page: Page<()> = Page::new(Vec::new(), total, params(1, size));
        assert_eq!(page.pages, pages);
        assert_eq!(page.pages == 0, total == 0);
    }

    #[rstest]
    #[case(1, 10)]
    #[case(2, 10)]
    #[case(3, 5)]
    #[case(4, 0)]
    #[tokio::test]
    async fn twenty_five_records_in_pages_of_ten(#[case] page: u32, #[case] expected_len: usize) {
        let source = CountingSource::new(25);
        let result = paginate(&source, params(page, 10)).await.unwrap();

        assert_eq!(result.items.len(), expected_len);
        assert_eq!(result.total, 25);
        assert_eq!(result.pages, 3);
        assert_eq!(result.page, page);
        assert_eq!(result.has_prev, page > 1);
        assert_eq!(result.has_next, page < 3);
    }

    #[tokio::test]
    async fn empty_collection_has_no_pages() {
        let source = CountingSource::new(0);
        let result = paginate(&source, params(1, 10)).await.unwrap();

        assert!(result.items.is_empty());
        assert_eq!(result.total, 0);
        assert_eq!(result.pages, 0);
        assert!(!result.has_next);
    }

    #[tokio::test]
    async fn issues_exactly_one_count_and_one_fetch() {
        let source = CountingSource::new(25);
        paginate(&source, params(9, 10)).await.unwrap();

        assert_eq!(source.counts.load(Ordering::SeqCst), 1);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_errors_propagate() {
        let mut source = CountingSource::new(5);
        source.fail_fetch = true;

        let err = paginate(&source, params(1, 10)).await.unwrap_err();
        assert_eq!(err, "connection reset");
    }

    #[tokio::test]
    async fn concatenated_pages_reproduce_the_collection() {
        for size in [1u32, 3, 7, 10, 33] {
            let source: Vec<u32> = (0..33).collect();
            let first = paginate(&source, params(1, size)).await.unwrap();

            let mut seen = first.items.clone();
            for page in 2..=first.pages as u32 {
                let next = paginate(&source, params(page, size)).await.unwrap();
                assert!(next.items.len() <= size as usize);
                seen.extend(next.items);
            }

            assert_eq!(seen, source, "size {}", size);
        }
    }

    #[tokio::test]
    async fn oversized_fetch_results_are_truncated() {
        struct Greedy;

        #[async_trait]
        impl PageSource for Greedy {
            type Item = u8;
            type Error = Infallible;

            async fn count(&self) -> Result<u64, Infallible> {
                Ok(50)
            }

            async fn fetch(&self, _offset: u64, _limit: u64) -> Result<Vec<u8>, Infallible> {
                Ok(vec![0; 50])
            }
        }

        let result = paginate(&Greedy, params(1, 10)).await.unwrap();
        assert_eq!(result.items.len(), 10);
    }

    #[test]
    fn map_keeps_metadata() {
        let page = Page::new(vec![1, 2], 12, params(2, 2)).map(|n| n * 10);

        assert_eq!(page.items, vec![10, 20]);
        assert_eq!(page.total, 12);
        assert_eq!(page.page, 2);
        assert_eq!(page.pages, 6);
    }
}
