/// Read-through caching over [`Cache`](crate::db::Cache).
///
/// Returns the cached value on a hit. On a miss, or when Redis can't be
/// read, awaits `$block`, queues the result for a background write with the
/// given TTL (seconds) and returns it. Errors from `$block` are propagated
/// with `?`; cache errors never are.
///
/// # Example
/// ```rust,ignore
/// let providers: ProviderAvailability = cached!(self.cache, key, TTL, async move {
///     self.request_providers(item_id).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        match $cache.get_from_cache(&$key).await {
            Ok(Some(hit)) => Ok(hit),
            lookup => {
                if let Err(e) = lookup {
                    tracing::warn!(key = %$key, error = %e, "Cache read failed, bypassing cache");
                }
                let value = $block.await?;
                $cache.set_in_background(&$key, &value, $ttl);
                Ok(value)
            }
        }
    }};
}
