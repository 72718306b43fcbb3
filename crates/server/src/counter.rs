//! Per-session deduplicated article counters.

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::session::CounterLedger;
use folio_core::CounterMetric;
use folio_metadata::MetadataStore;
use folio_metadata::repos::ArticleRepo;

/// Bump `metric` on the article `slug` at most once per ledger.
///
/// A pair already in the ledger only reads the current value. Otherwise the
/// pair is reserved and the store increments atomically. The reservation is
/// released when the increment fails or the article is gone, so those cases
/// leave the ledger untouched.
pub async fn bump(
    store: &dyn MetadataStore,
    ledger: &dyn CounterLedger,
    slug: &str,
    metric: CounterMetric,
) -> ApiResult<i64> {
    if !ledger.try_reserve(metric, slug) {
        let value = store
            .get_counter(slug, metric)
            .await?
            .ok_or_else(|| article_not_found(slug))?;
        metrics::record_bump(metric, false);
        tracing::debug!(slug, metric = %metric, value, "Counter already credited in session");
        return Ok(value);
    }

    let value = match store.increment_counter(slug, metric).await {
        Ok(Some(value)) => value,
        Ok(None) => {
            ledger.release(metric, slug);
            return Err(article_not_found(slug));
        }
        Err(e) => {
            ledger.release(metric, slug);
            return Err(e.into());
        }
    };
    metrics::record_bump(metric, true);
    tracing::debug!(slug, metric = %metric, value, "Counter incremented");
    Ok(value)
}

fn article_not_found(slug: &str) -> ApiError {
    ApiError::NotFound(format!("article '{slug}'"))
}
