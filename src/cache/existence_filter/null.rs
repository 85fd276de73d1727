use async_trait::async_trait;
use tracing::trace;

use crate::cache::ExistenceFilter;
use crate::errors::Result;
use crate::storage::UrlStore;

/// `filter.enabled = false` 时使用：永远回答“可能存在”
#[derive(Default)]
pub struct NullExistenceFilter;

#[async_trait]
impl ExistenceFilter for NullExistenceFilter {
    async fn check(&self, _key: &str) -> bool {
        true
    }

    async fn set(&self, _key: &str) {}

    async fn populate(&self, _store: &dyn UrlStore) -> Result<usize> {
        trace!("NullExistenceFilter: skip populate");
        Ok(0)
    }

    fn is_ready(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_always_returns_true() {
        let filter = NullExistenceFilter;
        filter.set("k").await;
        assert!(filter.check("k").await);
        assert!(filter.check("").await);
        assert!(filter.is_ready());
    }
}
