//! Page emulation against an upstream that only knows "top N rows"

use crate::core::error::{GatewayResult, QueryError};
use crate::core::query::PageRequest;
use crate::core::resource::PaginationStrategy;
use serde::Serialize;
use std::future::Future;

/// The page envelope returned by every listing operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub per_page: usize,
    pub last_page: usize,
    pub has_more: bool,
}

impl<T> PageResult<T> {
    /// Assemble a page; `last_page` and `has_more` are always derived here.
    ///
    /// `data` is cut to `per_page` so a window that disagrees with a stale
    /// count never overflows the page.
    pub fn new(mut data: Vec<T>, total: usize, page: usize, per_page: usize) -> Self {
        let per_page = per_page.max(1);
        data.truncate(per_page);
        let last_page = if total == 0 { 0 } else { total.div_ceil(per_page) };
        Self {
            data,
            total,
            page,
            per_page,
            last_page,
            has_more: page < last_page,
        }
    }

    /// Convert every record, keeping the metadata
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<PageResult<U>, E> {
        let data = self.data.into_iter().map(f).collect::<Result<Vec<_>, _>>()?;
        Ok(PageResult {
            data,
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            last_page: self.last_page,
            has_more: self.has_more,
        })
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> PageResult<U> {
        match self.try_map(|item| Ok::<U, std::convert::Infallible>(f(item))) {
            Ok(page) => page,
            Err(never) => match never {},
        }
    }
}

/// Drives one of the two [`PaginationStrategy`] variants
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    strategy: PaginationStrategy,
    max_fetch_rows: usize,
}

impl Paginator {
    /// `max_fetch_rows` caps any single "top N" regardless of strategy
    pub fn new(strategy: PaginationStrategy, max_fetch_rows: usize) -> Self {
        Self {
            strategy,
            max_fetch_rows,
        }
    }

    /// Rows a fetch-all query may return before the resource is rejected
    pub fn ceiling(&self) -> usize {
        match self.strategy {
            PaginationStrategy::FetchAllThenSlice { max_rows } => max_rows.min(self.max_fetch_rows),
            PaginationStrategy::CountThenFetch => self.max_fetch_rows,
        }
    }

    /// Produce one page.
    ///
    /// `fetch_page(n)` must return at most the first `n` rows in the final
    /// order; `fetch_total()` must return the filtered row count. The total
    /// is only requested by count-then-fetch, and rows are only fetched when
    /// the requested window can contain any.
    pub async fn paginate<R, FP, FPFut, FT, FTFut>(
        &self,
        resource: &str,
        page: PageRequest,
        fetch_page: FP,
        fetch_total: FT,
    ) -> GatewayResult<PageResult<R>>
    where
        FP: FnOnce(usize) -> FPFut,
        FPFut: Future<Output = GatewayResult<Vec<R>>>,
        FT: FnOnce() -> FTFut,
        FTFut: Future<Output = GatewayResult<usize>>,
    {
        match self.strategy {
            PaginationStrategy::FetchAllThenSlice { .. } => {
                let ceiling = self.ceiling();
                // One extra row tells a full result apart from a truncated one.
                let rows = fetch_page(ceiling.saturating_add(1)).await?;
                if rows.len() > ceiling {
                    return Err(QueryError::RowCeilingExceeded {
                        resource: resource.to_string(),
                        requested: rows.len(),
                        ceiling,
                    }
                    .into());
                }
                let total = rows.len();
                let data = rows
                    .into_iter()
                    .skip(page.start())
                    .take(page.per_page)
                    .collect();
                Ok(PageResult::new(data, total, page.page, page.per_page))
            }
            PaginationStrategy::CountThenFetch => {
                let top = page.end();
                if top > self.max_fetch_rows {
                    return Err(QueryError::RowCeilingExceeded {
                        resource: resource.to_string(),
                        requested: top,
                        ceiling: self.max_fetch_rows,
                    }
                    .into());
                }

                let total = fetch_total().await?;
                if page.start() >= total {
                    return Ok(PageResult::new(Vec::new(), total, page.page, page.per_page));
                }

                let rows = fetch_page(top).await?;
                let data = rows
                    .into_iter()
                    .skip(page.start())
                    .take(page.per_page)
                    .collect();
                Ok(PageResult::new(data, total, page.page, page.per_page))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::GatewayError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rows(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn test_page_metadata_is_derived() {
        for total in 0..60 {
            for per_page in 1..12 {
                let last_page = PageResult::<()>::new(vec![], total, 1, per_page).last_page;
                assert_eq!(last_page, total.div_ceil(per_page));
                for page in 1..=last_page {
                    let result = PageResult::<()>::new(vec![], total, page, per_page);
                    assert_eq!(result.has_more, page < last_page);
                }
            }
        }
    }

    #[test]
    fn test_data_never_exceeds_per_page() {
        let result = PageResult::new(rows(15), 15, 1, 10);
        assert_eq!(result.data.len(), 10);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(PageResult::new(rows(2), 2, 1, 10)).unwrap();
        assert_eq!(json["perPage"], 10);
        assert_eq!(json["lastPage"], 1);
        assert_eq!(json["hasMore"], false);
    }

    #[tokio::test]
    async fn test_fetch_all_then_slice() {
        let paginator = Paginator::new(PaginationStrategy::FetchAllThenSlice { max_rows: 100 }, 1000);
        let requested = AtomicUsize::new(0);

        let result = paginator
            .paginate(
                "work-orders",
                PageRequest::new(2, 10),
                |top| {
                    requested.store(top, Ordering::SeqCst);
                    async move { Ok(rows(top.min(25))) }
                },
                || async { Err(GatewayError::Internal("fetch-all never counts".into())) },
            )
            .await
            .unwrap();

        assert_eq!(requested.load(Ordering::SeqCst), 101);
        assert_eq!(result.data, (10..20).collect::<Vec<_>>());
        assert_eq!(result.total, 25);
        assert_eq!(result.last_page, 3);
        assert!(result.has_more);
    }

    #[tokio::test]
    async fn test_fetch_all_over_ceiling_fails() {
        let paginator = Paginator::new(PaginationStrategy::FetchAllThenSlice { max_rows: 10 }, 1000);
        let err = paginator
            .paginate(
                "work-orders",
                PageRequest::new(1, 5),
                |top| async move { Ok(rows(top)) },
                || async { Ok(0) },
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Query(QueryError::RowCeilingExceeded { ceiling: 10, .. })
        ));
    }

    #[tokio::test]
    async fn test_count_then_fetch() {
        let paginator = Paginator::new(PaginationStrategy::CountThenFetch, 1000);
        let result = paginator
            .paginate(
                "job-roles",
                PageRequest::new(3, 10),
                |top| async move {
                    assert_eq!(top, 30);
                    Ok(rows(top.min(25)))
                },
                || async { Ok(25) },
            )
            .await
            .unwrap();

        assert_eq!(result.data, (20..25).collect::<Vec<_>>());
        assert_eq!(result.last_page, 3);
        assert!(!result.has_more);
    }

    #[tokio::test]
    async fn test_count_then_fetch_past_the_end_skips_fetch() {
        let paginator = Paginator::new(PaginationStrategy::CountThenFetch, 1000);
        let result = paginator
            .paginate::<usize, _, _, _, _>(
                "job-roles",
                PageRequest::new(9, 10),
                |_top| async { Err(GatewayError::Internal("nothing to fetch".into())) },
                || async { Ok(25) },
            )
            .await
            .unwrap();

        assert!(result.data.is_empty());
        assert_eq!(result.total, 25);
        assert!(!result.has_more);
    }

    #[tokio::test]
    async fn test_count_then_fetch_ceiling_is_checked_first() {
        let paginator = Paginator::new(PaginationStrategy::CountThenFetch, 100);
        let err = paginator
            .paginate::<usize, _, _, _, _>(
                "job-roles",
                PageRequest::new(11, 10),
                |_top| async { Err(GatewayError::Internal("fetched".into())) },
                || async { Err(GatewayError::Internal("counted".into())) },
            )
            .await
            .unwrap_err();
        assert_eq!(err.error_code(), "ROW_CEILING_EXCEEDED");
    }
}
