//! Page-draining driver for the record list.

use std::future::Future;

/// Fetch pages `0, 1, 2, …` until one comes back empty, concatenating
/// results in page order.
///
/// Absence of data is the termination signal; a short page does not stop
/// the iteration, and no deduplication is performed. The page count is
/// unbounded, which assumes a well-behaved backend.
pub async fn drain_pages<T, E, F, Fut>(mut fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    let mut all = Vec::new();
    for page in 0.. {
        let batch = fetch(page).await?;
        if batch.is_empty() {
            break;
        }
        all.extend(batch);
    }
    Ok(all)
}
