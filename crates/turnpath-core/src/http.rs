use anyhow::Context;
use bytes::Bytes;

use crate::{Result, TrajectoryError};

/// GET `url` and return the body. Non-2xx answers become `Http` with the
/// status and whatever body the server sent.
pub async fn get_ok(client: &reqwest::Client, url: &str, query: &[(&str, &str)]) -> Result<Bytes> {
    let resp = client
        .get(url)
        .query(query)
        .send()
        .await
        .with_context(|| format!("GET {url}"))?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(TrajectoryError::Http { status: status.as_u16(), body });
    }
    Ok(resp.bytes().await.with_context(|| format!("read body of {url}"))?)
}
