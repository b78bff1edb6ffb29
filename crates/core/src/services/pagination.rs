//! Cursor pagination draining.

use std::collections::HashSet;
use std::future::Future;

use showcase_common::{AppError, AppResult};
use showcase_forum::Page;

/// Call `fetch` page after page until a page arrives without a cursor.
///
/// Returns every item in the order the pages delivered them. `fetch`
/// receives `None` for the first page and the previous page's cursor after
/// that. The backend is not trusted to terminate: draining stops with an
/// error after `max_pages` pages, or as soon as a cursor repeats.
pub async fn drain_pages<T, F, Fut>(max_pages: usize, mut fetch: F) -> AppResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = AppResult<Page<T>>>,
{
    let max_pages = max_pages.max(1);
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;
    let mut seen = HashSet::new();

    for _ in 0..max_pages {
        let page = fetch(cursor.take()).await?;
        items.extend(page.items);

        let Some(next) = page.next_cursor else {
            return Ok(items);
        };
        if !seen.insert(next.clone()) {
            tracing::warn!(cursor = %next, "Backend returned a repeated pagination cursor");
            return Err(AppError::ExternalService(format!(
                "Pagination cursor cycle detected at {next}"
            )));
        }
        cursor = Some(next);
    }

    tracing::warn!(max_pages, "Pagination did not terminate within the page limit");
    Err(AppError::ExternalService(format!(
        "Pagination exceeded {max_pages} pages"
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_drains_all_pages_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let items = drain_pages(100, move |cursor| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(match cursor.as_deref() {
                    None => Page {
                        items: vec![1, 2],
                        next_cursor: Some("a".to_string()),
                    },
                    Some("a") => Page {
                        items: vec![3, 4],
                        next_cursor: Some("b".to_string()),
                    },
                    _ => Page::last(vec![5]),
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_empty_page() {
        let items: Vec<u8> = drain_pages(10, |_| async { Ok(Page::last(Vec::new())) })
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_stops_at_page_limit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result: AppResult<Vec<u8>> = drain_pages(5, move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(Page {
                    items: vec![0],
                    next_cursor: Some(n.to_string()),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(AppError::ExternalService(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_detects_cursor_cycle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result: AppResult<Vec<u8>> = drain_pages(100, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                Ok(Page {
                    items: vec![1],
                    next_cursor: Some("same".to_string()),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(AppError::ExternalService(msg)) if msg.contains("cycle")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_propagates_fetch_error() {
        let result: AppResult<Vec<u8>> =
            drain_pages(10, |_| async { Err(AppError::RateLimited(Some(5))) }).await;
        assert!(matches!(result, Err(AppError::RateLimited(Some(5)))));
    }
}
