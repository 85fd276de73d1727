mod bloom;
mod null;

use std::sync::Arc;

use crate::cache::ExistenceFilter;
use crate::config::FilterConfig;
use crate::errors::Result;

pub use bloom::BloomExistenceFilter;
pub use null::NullExistenceFilter;

pub fn create_existence_filter(config: &FilterConfig) -> Result<Arc<dyn ExistenceFilter>> {
    if config.enabled {
        Ok(Arc::new(BloomExistenceFilter::new(
            config.capacity,
            config.fp_rate,
        )?))
    } else {
        Ok(Arc::new(NullExistenceFilter))
    }
}
