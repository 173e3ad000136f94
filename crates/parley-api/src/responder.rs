//! Client for the external text-generation service that produces assistant
//! replies. The service is a black box reached over HTTP:
//! `GET {base_url}/ask?prompt=...` returning `{"prompt": ..., "response": ...}`.

use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use serde::Deserialize;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: usize = 2;

pub struct Responder {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    response: String,
}

impl Responder {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Asks the responder for a reply, retrying once. Callers treat any
    /// failure as "no assistant reply" — it never fails the user's message.
    pub async fn ask(&self, prompt: &str) -> Result<String> {
        let url = format!("{}/ask", self.base_url);

        let mut last_err = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.try_ask(&url, prompt).await {
                Ok(reply) => return Ok(reply),
                Err(err) => {
                    debug!("responder attempt {attempt}/{MAX_ATTEMPTS} failed: {err:#}");
                    last_err = Some(err);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("responder unreachable")))
    }

    async fn try_ask(&self, url: &str, prompt: &str) -> Result<String> {
        let body: AskResponse = self
            .client
            .get(url)
            .query(&[("prompt", prompt)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let reply = body.response.trim().to_string();
        if reply.is_empty() {
            bail!("responder returned an empty reply");
        }
        Ok(reply)
    }
}
