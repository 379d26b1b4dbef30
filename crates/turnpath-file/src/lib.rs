use anyhow::Context;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;
use turnpath_core::http::get_ok;
use turnpath_core::*;

#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Replaces the schema's `base_url`. Either an http(s) prefix or a local
    /// directory path ending in a separator.
    pub base_url_override: Option<String>,
    pub timeout: Duration,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self { base_url_override: None, timeout: Duration::from_secs(30) }
    }
}

/// Reads trajectories out of the pre-computed `*_controlsALL.dat` datasets.
pub struct FileSource {
    cfg: FileConfig,
    client: reqwest::Client,
}

impl FileSource {
    pub fn new(cfg: FileConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("build http client")?;
        Ok(Self { cfg, client })
    }

    /// Full location (url or path) of the dataset holding `params`.
    pub fn dataset_location(&self, params: &ParameterSet, schema: &ParamRangeSchema) -> Result<String> {
        let base = self.cfg.base_url_override.as_deref().unwrap_or(&schema.base_url);
        Ok(format!("{base}{}", data_file_name(params, schema)?))
    }

    async fn read_dataset(&self, location: &str) -> Result<Bytes> {
        if location.starts_with("http://") || location.starts_with("https://") {
            get_ok(&self.client, location, &[]).await
        } else {
            let data = tokio::fs::read(location)
                .await
                .with_context(|| format!("read dataset {location}"))?;
            Ok(Bytes::from(data))
        }
    }
}

/// The `[offset, offset + size)` window of a dataset.
pub fn slice_record(data: &[u8], offset: usize, size: usize) -> Result<&[u8]> {
    data.get(offset..offset + size).ok_or_else(|| {
        TrajectoryError::Decode(format!(
            "dataset holds {} bytes, record needs {}..{}",
            data.len(),
            offset,
            offset + size
        ))
    })
}

#[async_trait::async_trait]
impl TrajectoryProvider for FileSource {
    fn name(&self) -> &'static str { "file" }

    async fn fetch(&self, params: &ParameterSet, schema: &ParamRangeSchema) -> Result<Vec<PositionSample>> {
        let location = self.dataset_location(params, schema)?;
        let offset = resolve_offset(params, schema)?;
        let size = record_size(schema);
        debug!(%location, offset, size, "reading dataset record");

        let data = self.read_dataset(&location).await?;
        let record = slice_record(&data, offset, size)?;
        decode_channels(record, &schema.trajectory_dimensions, schema.trajectory_length)?.to_positions()
    }
}
