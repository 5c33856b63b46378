use std::env;

use async_trait::async_trait;
use chrono::Utc;
use lesson_core::model::{LessonId, ProgressSnapshot, UserId};
use reqwest::Client;

use crate::repository::{ProgressRecord, ProgressStore, StoreError};

#[derive(Clone, Debug)]
pub struct ProgressApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl ProgressApiConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("LESSON_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_key = env::var("LESSON_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        Some(Self { base_url, api_key })
    }
}

/// Progress store backed by the remote lesson API.
#[derive(Clone)]
pub struct HttpProgressStore {
    client: Client,
    config: ProgressApiConfig,
}

impl HttpProgressStore {
    #[must_use]
    pub fn new(config: ProgressApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn from_env() -> Option<Self> {
        ProgressApiConfig::from_env().map(Self::new)
    }

    fn upsert_url(&self, lesson_id: LessonId, user_id: UserId) -> String {
        format!(
            "{}/lessons/{}/progress/{}",
            self.config.base_url.trim_end_matches('/'),
            lesson_id.value(),
            user_id.value(),
        )
    }
}

#[async_trait]
impl ProgressStore for HttpProgressStore {
    async fn upsert_progress(
        &self,
        lesson_id: LessonId,
        user_id: UserId,
        snapshot: &ProgressSnapshot,
    ) -> Result<(), StoreError> {
        let record = ProgressRecord::from_snapshot(lesson_id, user_id, snapshot, Utc::now());
        let mut request = self
            .client
            .put(self.upsert_url(lesson_id, user_id))
            .json(&record);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Rejected(format!("status {status}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_url_joins_without_duplicate_slash() {
        let store = HttpProgressStore::new(ProgressApiConfig {
            base_url: "https://api.example.com/v1/".into(),
            api_key: None,
        });
        let user = UserId::random();
        let url = store.upsert_url(LessonId::new(3), user);
        assert_eq!(
            url,
            format!("https://api.example.com/v1/lessons/3/progress/{}", user.value())
        );
    }
}
