//! Cursor-driven page loop shared by every table fetch.
//!
//! The loop asks for page `offset + 1`, then every `page_increment` pages
//! after it, and stops when:
//! - the backend answers "not found",
//! - a page carries no items (or a null item list),
//! - the requested limit has been collected,
//! - a counted envelope's `total_count` has been covered,
//! - a bare list page is shorter than the page size.
//!
//! There is no retry here: the first failing call aborts the whole fetch and
//! rows gathered so far are dropped.

use std::future::Future;

use tracing::debug;

use crate::error::RestResult;
use crate::handle::TableHandle;
use crate::http::ApiResponse;

/// Fixed number of items requested per page.
pub const PAGE_SIZE: u32 = 100;

/// A page of entities as returned by the backend.
pub trait Envelope {
    type Item;

    /// Declared total across all pages; `None` for bare lists.
    fn total_count(&self) -> Option<u64>;

    /// Items on this page; `None` when the backend sent a null list.
    fn into_items(self) -> Option<Vec<Self::Item>>;
}

impl<T> Envelope for Vec<T> {
    type Item = T;

    fn total_count(&self) -> Option<u64> {
        None
    }

    fn into_items(self) -> Option<Vec<T>> {
        Some(self)
    }
}

/// Which pages a fetch visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Zero-based index of the first page.
    pub offset: u32,
    pub increment: u32,
    pub page_size: u32,
}

impl PageWindow {
    pub fn from_handle(handle: &TableHandle) -> Self {
        Self {
            offset: handle.offset(),
            increment: handle.page_increment().max(1),
            page_size: PAGE_SIZE,
        }
    }

    /// 1-based number of the first page to request.
    pub fn first_page(&self) -> u32 {
        self.offset + 1
    }

    pub fn next_page(&self, page: u32) -> u32 {
        page + self.increment
    }

    /// Whether `page` ends the listing, judged by the declared total when
    /// there is one and by a short page otherwise.
    pub fn is_last(&self, page: u32, page_len: usize, total: Option<u64>) -> bool {
        match total {
            Some(total) => {
                (page as u64 - 1) * self.page_size as u64 + page_len as u64 >= total
            }
            None => page_len < self.page_size as usize,
        }
    }
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            offset: 0,
            increment: 1,
            page_size: PAGE_SIZE,
        }
    }
}

/// Drive `fetch_page` until a stop condition and map every item.
///
/// `fetch_page` receives the 1-based page number. Items are mapped in order
/// until `limit` outputs exist; `map` may produce any number of outputs per
/// item (none, for an item it filters out), and the result is capped at
/// `limit`.
pub async fn paginate<E, R, F, Fut, M>(
    window: PageWindow,
    limit: u64,
    mut fetch_page: F,
    mut map: M,
) -> RestResult<Vec<R>>
where
    E: Envelope,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = RestResult<ApiResponse<E>>>,
    M: FnMut(E::Item) -> Vec<R>,
{
    let mut results: Vec<R> = Vec::new();
    if limit == 0 {
        return Ok(results);
    }

    let mut page = window.first_page();
    loop {
        let envelope = match fetch_page(page).await? {
            ApiResponse::Found(envelope) => envelope,
            ApiResponse::NotFound => {
                debug!("page {} not found, stopping", page);
                break;
            }
        };
        let total = envelope.total_count();
        let Some(items) = envelope.into_items() else {
            debug!("page {} has no item list, stopping", page);
            break;
        };
        let page_len = items.len();
        if page_len == 0 {
            debug!("page {} is empty, stopping", page);
            break;
        }

        for item in items {
            results.extend(map(item));
            if results.len() as u64 >= limit {
                break;
            }
        }
        if results.len() as u64 >= limit {
            results.truncate(limit.min(usize::MAX as u64) as usize);
            debug!("limit {} reached on page {}", limit, page);
            break;
        }

        if window.is_last(page, page_len, total) {
            debug!("page {} is the last one ({} items, total {:?})", page, page_len, total);
            break;
        }
        page = window.next_page(page);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RestError;

    struct Counted {
        total_count: Option<u64>,
        items: Option<Vec<u32>>,
    }

    impl Envelope for Counted {
        type Item = u32;

        fn total_count(&self) -> Option<u64> {
            self.total_count
        }

        fn into_items(self) -> Option<Vec<u32>> {
            self.items
        }
    }

    fn window(page_size: u32) -> PageWindow {
        PageWindow {
            offset: 0,
            increment: 1,
            page_size,
        }
    }

    /// Pages of consecutive integers with the given sizes.
    fn pages(sizes: &[usize]) -> Vec<Vec<u32>> {
        let mut next = 0u32;
        sizes
            .iter()
            .map(|&n| {
                let page: Vec<u32> = (next..next + n as u32).collect();
                next += n as u32;
                page
            })
            .collect()
    }

    async fn run_list(
        page_size: u32,
        sizes: &[usize],
        limit: u64,
    ) -> (Vec<u32>, Vec<u32>) {
        let data = pages(sizes);
        let mut calls = Vec::new();
        let rows = paginate(
            window(page_size),
            limit,
            |page| {
                calls.push(page);
                let response = match data.get(page as usize - 1) {
                    Some(p) => ApiResponse::Found(p.clone()),
                    None => ApiResponse::Found(vec![]),
                };
                async move { Ok::<_, RestError>(response) }
            },
            |item: u32| vec![item],
        )
        .await
        .unwrap();
        (rows, calls)
    }

    #[tokio::test]
    async fn test_short_page_terminates() {
        let (rows, calls) = run_list(3, &[3, 3, 2], u64::MAX).await;
        assert_eq!(rows, (0..8).collect::<Vec<_>>());
        assert_eq!(calls, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_empty_page_terminates() {
        let (rows, calls) = run_list(3, &[3, 3, 0, 3], u64::MAX).await;
        assert_eq!(rows.len(), 6);
        assert_eq!(calls, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_limit_spanning_pages() {
        let (rows, calls) = run_list(3, &[3, 3, 3], 5).await;
        assert_eq!(rows, vec![0, 1, 2, 3, 4]);
        assert_eq!(calls, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_limit_on_page_boundary_stops_without_extra_call() {
        let (rows, calls) = run_list(3, &[3, 3, 3], 3).await;
        assert_eq!(rows, vec![0, 1, 2]);
        assert_eq!(calls, vec![1]);
    }

    #[tokio::test]
    async fn test_limit_larger_than_available() {
        let (rows, _) = run_list(3, &[3, 1], 100).await;
        assert_eq!(rows.len(), 4);
    }

    #[tokio::test]
    async fn test_zero_limit_makes_no_calls() {
        let (rows, calls) = run_list(3, &[3, 3], 0).await;
        assert!(rows.is_empty());
        assert!(calls.is_empty());
    }

    #[tokio::test]
    async fn test_not_found_is_empty_result() {
        let mut calls = 0;
        let rows: Vec<u32> = paginate(
            window(3),
            10,
            |_page| {
                calls += 1;
                async { Ok::<ApiResponse<Vec<u32>>, RestError>(ApiResponse::NotFound) }
            },
            |item: u32| vec![item],
        )
        .await
        .unwrap();
        assert!(rows.is_empty());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_error_discards_partial_pages() {
        let result: RestResult<Vec<u32>> = paginate(
            window(2),
            u64::MAX,
            |page| async move {
                if page == 1 {
                    Ok(ApiResponse::Found(vec![1u32, 2]))
                } else {
                    Err(RestError::Backend {
                        status: 500,
                        url: "https://api.test/x".into(),
                        body: Some("boom".into()),
                    })
                }
            },
            |item: u32| vec![item],
        )
        .await;
        assert!(matches!(result, Err(RestError::Backend { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_counted_stops_at_total() {
        let mut calls = Vec::new();
        let rows: Vec<u32> = paginate(
            window(2),
            u64::MAX,
            |page| {
                calls.push(page);
                // the backend keeps sending full pages; the declared total must stop us
                let items = vec![page * 10, page * 10 + 1];
                async move {
                    Ok::<_, RestError>(ApiResponse::Found(Counted {
                        total_count: Some(4),
                        items: Some(items),
                    }))
                }
            },
            |item| vec![item],
        )
        .await
        .unwrap();
        assert_eq!(rows, vec![10, 11, 20, 21]);
        assert_eq!(calls, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_counted_null_items_stops() {
        let rows: Vec<u32> = paginate(
            window(2),
            u64::MAX,
            |_page| async {
                Ok::<_, RestError>(ApiResponse::Found(Counted {
                    total_count: Some(10),
                    items: None,
                }))
            },
            |item| vec![item],
        )
        .await
        .unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_one_to_many_mapping_capped_at_limit() {
        let rows: Vec<u32> = paginate(
            window(10),
            5,
            |_page| async { Ok::<_, RestError>(ApiResponse::Found(vec![1u32, 2, 3])) },
            |item| vec![item; 3],
        )
        .await
        .unwrap();
        assert_eq!(rows, vec![1, 1, 1, 2, 2]);
    }

    #[tokio::test]
    async fn test_filtered_items_do_not_count_toward_limit() {
        let rows: Vec<u32> = paginate(
            window(10),
            2,
            |_page| async { Ok::<_, RestError>(ApiResponse::Found(vec![1u32, 2, 3, 4, 5])) },
            |item| if item % 2 == 1 { vec![item] } else { vec![] },
        )
        .await
        .unwrap();
        assert_eq!(rows, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_page_window_with_increment() {
        let mut calls = Vec::new();
        let w = PageWindow {
            offset: 1,
            increment: 3,
            page_size: 2,
        };
        let rows: Vec<u32> = paginate(
            w,
            u64::MAX,
            |page| {
                calls.push(page);
                let items = if page < 8 { vec![page, page] } else { vec![page] };
                async move { Ok::<_, RestError>(ApiResponse::Found(items)) }
            },
            |item| vec![item],
        )
        .await
        .unwrap();
        assert_eq!(calls, vec![2, 5, 8]);
        assert_eq!(rows, vec![2, 2, 5, 5, 8]);
    }

    #[tokio::test]
    async fn test_counted_total_with_page_window() {
        let mut calls = Vec::new();
        let w = PageWindow {
            offset: 1,
            increment: 2,
            page_size: 2,
        };
        // total 7 → pages 1..=4 exist; this window visits 2 and 4
        let rows: Vec<u32> = paginate(
            w,
            u64::MAX,
            |page| {
                calls.push(page);
                let items = if page == 4 { vec![page] } else { vec![page, page] };
                async move {
                    Ok::<_, RestError>(ApiResponse::Found(Counted {
                        total_count: Some(7),
                        items: Some(items),
                    }))
                }
            },
            |item| vec![item],
        )
        .await
        .unwrap();
        assert_eq!(calls, vec![2, 4]);
        assert_eq!(rows, vec![2, 2, 4]);
    }
}
