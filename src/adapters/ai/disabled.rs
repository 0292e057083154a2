//! Language model used when no backend is configured.

use async_trait::async_trait;
use std::sync::Arc;

use crate::ports::{Availability, LanguageModel, ModelError, ModelInfo, ModelSession, SessionOptions};

/// Always unavailable; conversations run with templated questions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLanguageModel;

#[async_trait]
impl LanguageModel for DisabledLanguageModel {
    async fn availability(&self) -> Availability {
        Availability::Unavailable
    }

    async fn create(&self, _options: SessionOptions) -> Result<Arc<dyn ModelSession>, ModelError> {
        Err(ModelError::unavailable("language model disabled by configuration"))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo::new("disabled", "none")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn never_creates_sessions() {
        let model = DisabledLanguageModel;
        assert!(!model.availability().await.is_usable());
        assert!(matches!(
            model.create(SessionOptions::new("sys")).await,
            Err(ModelError::Unavailable { .. })
        ));
    }
}
