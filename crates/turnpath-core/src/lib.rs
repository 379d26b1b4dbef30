//! Core trajectory plumbing used by turnpath: the error taxonomy, the
//! provider trait both backends implement, the binary record decoder and
//! the parameter grid / dataset offset resolver.

pub mod decode;
#[cfg(feature = "http")]
pub mod http;
pub mod resolve;

pub use decode::{decode_channels, encode_channels, expected_len, Channels};
pub use model::{ParamRangeSchema, ParameterSet, PositionSample};
pub use resolve::{
    data_file_name, format_grid_value, grid_len, record_index, record_size, resolve_file_path,
    resolve_offset, snap_to_grid, validate_schema,
};

#[derive(Debug, thiserror::Error)]
pub enum TrajectoryError {
    #[error("failed to load parameter schema: {0}")]
    SchemaLoad(String),
    #[error("missing parameter '{0}'")]
    MissingParameter(String),
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("invalid range: {0}")]
    InvalidRange(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T, E = TrajectoryError> = std::result::Result<T, E>;

/// Anything that can turn a parameter set into a trajectory.
#[async_trait::async_trait]
pub trait TrajectoryProvider: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    async fn fetch(&self, params: &ParameterSet, schema: &ParamRangeSchema) -> Result<Vec<PositionSample>>;
}
