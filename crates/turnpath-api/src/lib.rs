use anyhow::Context;
use byteorder::{LittleEndian, ReadBytesExt};
use model::TRAJECTORY_CHANNELS;
use serde_json::Value;
use std::{io::Cursor, time::Duration};
use tracing::{debug, info};
use turnpath_core::http::get_ok;
use turnpath_core::*;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub server_url: String,   // e.g. "https://www.dvf.ovh"
    pub compute_path: String, // GET ?params=<json>
    pub schema_path: String,  // GET, JSON schema
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            server_url: "https://www.dvf.ovh".into(),
            compute_path: "/compute_trajectory".into(),
            schema_path: "/simulation_metadata.json".into(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Fields the compute endpoint refuses to work without.
pub const REQUIRED_PARAMS: [&str; 7] =
    ["x", "y", "yaw", "initial_speed", "steering", "road_condition", "vehicle_type"];

pub struct ApiSource {
    cfg: ApiConfig,
    client: reqwest::Client,
}

impl ApiSource {
    pub fn new(cfg: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("build http client")?;
        Ok(Self { cfg, client })
    }

    pub fn compute_url(&self) -> String { join_url(&self.cfg.server_url, &self.cfg.compute_path) }

    pub fn schema_url(&self) -> String { join_url(&self.cfg.server_url, &self.cfg.schema_path) }

    /// Load the parameter schema from the server. Every failure, including a
    /// schema that does not validate, is reported as `SchemaLoad`.
    pub async fn fetch_schema(&self) -> Result<ParamRangeSchema> {
        let url = self.schema_url();
        self.get_schema(&url).await.map_err(|e| match e {
            TrajectoryError::SchemaLoad(m) => TrajectoryError::SchemaLoad(m),
            other => TrajectoryError::SchemaLoad(format!("{url}: {:#}", anyhow::Error::new(other))),
        })
    }

    async fn get_schema(&self, url: &str) -> Result<ParamRangeSchema> {
        let body = get_ok(&self.client, url, &[]).await?;
        let schema: ParamRangeSchema = serde_json::from_slice(&body).context("parse schema json")?;
        validate_schema(&schema)?;
        info!(url, trajectory_length = schema.trajectory_length, "schema loaded");
        Ok(schema)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// JSON text sent as the `params` query value. Non-finite numbers serialise
/// to null and count as missing.
pub fn request_params(params: &ParameterSet) -> Result<String> {
    let v = serde_json::to_value(params).context("serialize parameters")?;
    for key in REQUIRED_PARAMS {
        if matches!(v.get(key), None | Some(Value::Null)) {
            return Err(TrajectoryError::MissingParameter(key.into()));
        }
    }
    Ok(v.to_string())
}

/// Split a flat little-endian f32 payload into the six kinematic channels.
pub fn parse_payload(buf: &[u8], trajectory_length: usize) -> Result<Vec<PositionSample>> {
    let n = TRAJECTORY_CHANNELS.len() * trajectory_length;
    if buf.len() < n * 4 {
        return Err(TrajectoryError::InvalidResponse(format!(
            "payload holds {} bytes, expected {} ({} floats)",
            buf.len(),
            n * 4,
            n
        )));
    }
    if buf.len() % 4 != 0 {
        return Err(TrajectoryError::InvalidResponse(format!(
            "payload length {} is not a whole number of f32 values",
            buf.len()
        )));
    }

    let mut data = vec![0f32; n];
    Cursor::new(buf)
        .read_f32_into::<LittleEndian>(&mut data)
        .map_err(|e| TrajectoryError::InvalidResponse(e.to_string()))?;

    let mut channels = Channels::new();
    for (k, name) in TRAJECTORY_CHANNELS.iter().enumerate() {
        let col = &data[k * trajectory_length..(k + 1) * trajectory_length];
        channels.push(*name, col.iter().map(|&v| f64::from(v)).collect());
    }
    channels.to_positions()
}

#[async_trait::async_trait]
impl TrajectoryProvider for ApiSource {
    fn name(&self) -> &'static str { "api" }

    async fn fetch(&self, params: &ParameterSet, schema: &ParamRangeSchema) -> Result<Vec<PositionSample>> {
        let json = request_params(params)?;
        let url = self.compute_url();
        debug!(%url, params = %json, "requesting trajectory");
        let body = get_ok(&self.client, &url, &[("params", json.as_str())]).await?;
        parse_payload(&body, schema.trajectory_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use tokio::net::TcpListener;

    fn schema(len: usize) -> ParamRangeSchema {
        let json = format!(
            r#"{{
            "params_ranges": {{
                "initial_speed": {{"min": 0, "max": 30, "step": 5, "default": 10}},
                "steering": {{"min": -40, "max": 40, "step": 10, "default": 0}},
                "controls": {{"params": {{
                    "throttle": {{"min": 0, "max": 100, "step": 10, "default": 50}},
                    "brake": {{"min": 0, "max": 100, "step": 10, "default": 0}},
                    "handbrake": {{"min": 0, "max": 100, "step": 100, "default": 0}},
                    "road_condition": {{"default": "snow"}},
                    "vehicle_type": {{"default": "front_wheel_drive"}}
                }}}}
            }},
            "view_params": {{"scale": {{"min": 1, "max": 10, "step": 1, "default": 3}}}},
            "TRAJECTORY_DIMENSIONS": [{{"name": "x", "type": "float32"}}],
            "TRAJECTORY_LENGTH": {len}
        }}"#
        );
        serde_json::from_str(&json).unwrap()
    }

    fn payload(len: usize) -> Vec<u8> {
        let mut buf = Vec::new();
        for k in 0..6 {
            for i in 0..len {
                buf.write_f32::<LittleEndian>((k * 100 + i) as f32).unwrap();
            }
        }
        buf
    }

    /// Serve one canned HTTP response and hand back the request line.
    async fn serve_once(status: &'static str, body: Vec<u8>) -> (String, tokio::task::JoinHandle<String>) {
        // scoped here: Vec<u8> is also an AsyncWrite
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut req = Vec::new();
            let mut chunk = [0u8; 1024];
            while !req.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = sock.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                req.extend_from_slice(&chunk[..n]);
            }
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            sock.write_all(head.as_bytes()).await.unwrap();
            sock.write_all(&body).await.unwrap();
            sock.shutdown().await.ok();
            String::from_utf8_lossy(&req).lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}"), handle)
    }

    fn source(server_url: String) -> ApiSource {
        ApiSource::new(ApiConfig { server_url, ..ApiConfig::default() }).unwrap()
    }

    #[test]
    fn payload_is_split_in_channel_order() {
        let pos = parse_payload(&payload(4), 4).unwrap();
        assert_eq!(pos.len(), 4);
        assert_eq!(pos[0].x, 0.0);
        assert_eq!(pos[3].x, 3.0);
        assert_eq!(pos[1].y, 101.0);
        assert_eq!(pos[2].yaw, 202.0);
        assert_eq!(pos[2].speed, 302.0);
        assert_eq!(pos[0].slip_angle, 400.0);
        assert_eq!(pos[3].yaw_rate, 503.0);
    }

    #[test]
    fn short_payload_is_invalid() {
        let mut buf = payload(4);
        buf.truncate(buf.len() - 4);
        assert!(matches!(parse_payload(&buf, 4), Err(TrajectoryError::InvalidResponse(_))));
        assert!(matches!(parse_payload(&[], 100), Err(TrajectoryError::InvalidResponse(_))));
    }

    #[test]
    fn non_finite_required_parameter_is_missing() {
        let mut p = schema(4).initial_params();
        let json = request_params(&p).unwrap();
        let v: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["road_condition"], "snow");
        assert_eq!(v["initial_speed"], 10.0);

        p.yaw = f64::NAN;
        assert!(matches!(request_params(&p), Err(TrajectoryError::MissingParameter(k)) if k == "yaw"));
    }

    #[test]
    fn urls_are_joined_without_double_slashes() {
        let src = source("http://localhost:8000/".into());
        assert_eq!(src.compute_url(), "http://localhost:8000/compute_trajectory");
        assert_eq!(src.schema_url(), "http://localhost:8000/simulation_metadata.json");
    }

    #[tokio::test]
    async fn fetch_decodes_served_trajectory() {
        let (url, req) = serve_once("200 OK", payload(3)).await;
        let s = schema(3);
        let pos = source(url).fetch(&s.initial_params(), &s).await.unwrap();
        assert_eq!(pos.len(), 3);
        assert_eq!(pos[2].yaw_rate, 502.0);

        let line = req.await.unwrap();
        assert!(line.starts_with("GET /compute_trajectory?params="), "{line}");
        assert!(line.contains("initial_speed"), "{line}");
    }

    #[tokio::test]
    async fn non_success_status_carries_code_and_body() {
        let (url, _req) = serve_once("503 Service Unavailable", b"solver busy".to_vec()).await;
        let s = schema(3);
        let err = source(url).fetch(&s.initial_params(), &s).await.unwrap_err();
        match err {
            TrajectoryError::Http { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "solver busy");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn schema_failures_are_schema_load_errors() {
        let (url, _req) = serve_once("200 OK", b"{not json".to_vec()).await;
        let err = source(url).fetch_schema().await.unwrap_err();
        assert!(matches!(err, TrajectoryError::SchemaLoad(_)), "{err:?}");
    }
}
