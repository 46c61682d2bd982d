//! In-memory transport for network-free tests.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use thumbs_core::Error;

use super::{RepoResponse, RepoTransport};

#[derive(Default)]
pub(crate) struct StubTransport {
    heads: Mutex<HashMap<String, Result<String, String>>>,
    gets: Mutex<HashMap<String, RepoResponse>>,
    calls: Mutex<Vec<String>>,
}

impl StubTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn redirect(&self, url: &str, final_url: &str) {
        self.heads.lock().unwrap().insert(url.into(), Ok(final_url.into()));
    }

    pub(crate) fn fail_head(&self, url: &str, reason: &str) {
        self.heads.lock().unwrap().insert(url.into(), Err(reason.into()));
    }

    pub(crate) fn respond(&self, url: &str, status: u16, content_type: Option<&str>, body: impl Into<Bytes>) {
        self.gets.lock().unwrap().insert(
            url.into(),
            RepoResponse { status, content_type: content_type.map(String::from), bytes: body.into() },
        );
    }

    pub(crate) fn forget(&self, url: &str) {
        self.gets.lock().unwrap().remove(url);
        self.heads.lock().unwrap().remove(url);
    }

    /// Number of HEAD or GET requests issued for `url`.
    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.as_str() == url).count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl RepoTransport for StubTransport {
    async fn head(&self, url: &str) -> Result<String, Error> {
        self.calls.lock().unwrap().push(url.to_string());
        match self.heads.lock().unwrap().get(url) {
            Some(Ok(final_url)) => Ok(final_url.clone()),
            Some(Err(reason)) => Err(Error::ResolutionFailed(format!("{url}: {reason}"))),
            None => Err(Error::ResolutionFailed(format!("{url}: status 404"))),
        }
    }

    async fn get(&self, url: &str, _headers: &[(String, String)]) -> Result<RepoResponse, Error> {
        self.calls.lock().unwrap().push(url.to_string());
        Ok(self
            .gets
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(RepoResponse { status: 404, content_type: None, bytes: Bytes::new() }))
    }
}
