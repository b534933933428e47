pub mod providers;

use std::sync::Arc;

use nodeflow_core::config::TransformConfig;
use nodeflow_core::traits::TextCleaner;

pub use providers::openai::OpenAiCleaner;

/// Build the text cleaner used by Transform nodes.
pub fn create_cleaner(config: &TransformConfig) -> Arc<dyn TextCleaner> {
    Arc::new(OpenAiCleaner::new(config.clone()))
}
