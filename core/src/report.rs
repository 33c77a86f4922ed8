use std::fs;
use std::time::Duration;

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockEncryptMut, KeyIvInit};
use aes::Aes256;
use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::cfg::ReportConfig;
use crate::clock::format_local;

/// Result of one executed job, handed to a [`Reporter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// Job title.
    pub job_title: String,
    /// Source bucket.
    pub bucket: String,
    /// Status sent as `result`: 0 on success, anything else is a failure code.
    pub exit_code: i32,
    /// Epoch seconds when the outcome was recorded.
    pub timestamp: i64,
    /// Configured staleness window in days.
    pub max_age_days: u64,
}

/// `0` stays `0`, any failure becomes `1`.
pub fn normalize_status(code: i32) -> i32 {
    i32::from(code != 0)
}

const WEEKDAYS: [&str; 7] = ["monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday"];

/// Destination for job outcomes.
#[allow(async_fn_in_trait)]
pub trait Reporter {
    /// Deliver one outcome.
    async fn report(&self, outcome: &Outcome) -> Result<()>;
}

/// Reporter used when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReporter;

impl Reporter for NoReporter {
    async fn report(&self, outcome: &Outcome) -> Result<()> {
        debug!("report disabled, dropping outcome for {}", outcome.bucket);
        Ok(())
    }
}

/// Posts outcomes to an ntfy-style HTTP topic.
#[derive(Debug, Clone)]
pub struct NtfyReporter {
    client: reqwest::Client,
    url: String,
    backups_type: String,
    window: String,
    psk: Option<String>,
}

impl NtfyReporter {
    /// Build from configuration, reading the pre-shared key if one is set.
    pub fn from_config(cfg: &ReportConfig) -> Result<Self> {
        let psk = match &cfg.psk_file {
            Some(path) => Some(
                fs::read_to_string(path)
                    .with_context(|| format!("read psk {}", path.display()))?
                    .trim()
                    .to_string(),
            ),
            None => None,
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("build http client")?;
        Ok(NtfyReporter {
            client,
            url: cfg.url.clone(),
            backups_type: cfg.backups_type.clone(),
            window: cfg.window.clone(),
            psk,
        })
    }

    /// Request body: JSON, or the encrypted JSON when a key is configured.
    pub fn body(&self, outcome: &Outcome) -> Result<String> {
        let plain = payload(outcome, &self.backups_type, &self.window).to_string();
        match &self.psk {
            Some(psk) => encrypt(&plain, psk),
            None => Ok(plain),
        }
    }
}

impl Reporter for NtfyReporter {
    async fn report(&self, outcome: &Outcome) -> Result<()> {
        let body = self.body(outcome)?;
        self.client
            .post(&self.url)
            .header("Title", outcome.job_title.as_str())
            .body(body)
            .send()
            .await
            .with_context(|| format!("post report to {}", self.url))?
            .error_for_status()
            .context("report rejected")?;
        debug!("report sent for {}", outcome.bucket);
        Ok(())
    }
}

/// Monitoring payload for one outcome. `window` is announced for every weekday.
pub fn payload(outcome: &Outcome, backups_type: &str, window: &str) -> serde_json::Value {
    let days: Vec<_> = WEEKDAYS.iter().map(|d| json!({ *d: window })).collect();
    json!({
        "client": outcome.job_title,
        "backups_type": backups_type,
        "backups": [{
            "vm": outcome.bucket,
            "date": format_local(outcome.timestamp, "%Y-%m-%d %H:%M:%S"),
            "type": "sync",
            "result": outcome.exit_code.to_string(),
            "gap": outcome.max_age_days,
            "days": days,
        }],
    })
}

/// AES-256-CBC with PKCS#7 padding, key `SHA-256(psk)` and a random IV;
/// returns base64 of `iv || ciphertext`.
pub fn encrypt(plaintext: &str, psk: &str) -> Result<String> {
    let key = Sha256::digest(psk.as_bytes());
    let iv: [u8; 16] = rand::random();
    let ct = cbc::Encryptor::<Aes256>::new_from_slices(&key, &iv)
        .map_err(|e| anyhow!("cipher key: {e}"))?
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    let mut buf = iv.to_vec();
    buf.extend_from_slice(&ct);
    Ok(STANDARD.encode(buf))
}
