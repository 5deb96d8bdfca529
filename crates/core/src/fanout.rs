use futures::future::join_all;
use std::future::Future;

/// Runs `op` for every item concurrently and waits for all of them.
///
/// A failed item is replaced by `fallback(index, item, error)`; it never cancels
/// the others. Output order matches input order.
pub async fn map_with_fallback<'a, I, T, F, Fut, G>(items: &'a [I], op: F, fallback: G) -> Vec<T>
where
    F: Fn(usize, &'a I) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
    G: Fn(usize, &'a I, anyhow::Error) -> T,
{
    let results = join_all(items.iter().enumerate().map(|(idx, item)| op(idx, item))).await;

    results
        .into_iter()
        .zip(items.iter())
        .enumerate()
        .map(|(idx, (res, item))| match res {
            Ok(value) => value,
            Err(err) => fallback(idx, item, err),
        })
        .collect()
}
