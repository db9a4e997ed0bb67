#![allow(dead_code)]

use async_trait::async_trait;
use site_cloner::{FetchError, Fetched, HttpSource, MirrorConfig};
use std::collections::HashMap;
use std::sync::Mutex;

/// Serves canned responses and records every requested URL.
#[derive(Default)]
pub struct StaticSource {
    responses: HashMap<String, Fetched>,
    requests: Mutex<Vec<String>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.responses.insert(
            url.to_string(),
            Fetched {
                body: html.as_bytes().to_vec(),
                content_type: Some("text/html; charset=utf-8".to_string()),
            },
        );
        self
    }

    pub fn asset(mut self, url: &str, body: &[u8]) -> Self {
        self.responses.insert(
            url.to_string(),
            Fetched {
                body: body.to_vec(),
                content_type: None,
            },
        );
        self
    }

    pub fn requests_for(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|u| u.as_str() == url).count()
    }

    pub fn total_requests(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpSource for StaticSource {
    async fn get(&self, url: &str) -> Result<Fetched, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.responses.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Never answers; every request stays pending.
pub struct HangingSource;

#[async_trait]
impl HttpSource for HangingSource {
    async fn get(&self, _url: &str) -> Result<Fetched, FetchError> {
        std::future::pending().await
    }
}

pub fn quiet_config() -> MirrorConfig {
    MirrorConfig {
        show_progress: false,
        ..MirrorConfig::default()
    }
}
