use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::Write, path::Path};
use model::*;

/// Read a parameter schema from a local JSON file (same shape the server
/// publishes as `simulation_metadata.json`).
pub fn load_schema(path: &Path) -> Result<ParamRangeSchema> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let schema = serde_json::from_reader(std::io::BufReader::new(f))
        .with_context(|| format!("parse {}", path.display()))?;
    Ok(schema)
}

/// One row per trajectory sample, turns numbered from 1.
pub fn export_csv(turns: &[Turn], path: &Path) -> Result<()> {
    let mut w = csv::Writer::from_path(path)?;
    for (t, turn) in turns.iter().enumerate() {
        for (i, p) in turn.positions.iter().enumerate() {
            w.serialize(CsvRow {
                turn: t + 1,
                sample: i,
                x: p.x, y: p.y, yaw: p.yaw,
                speed: p.speed, slip_angle: p.slip_angle, yaw_rate: p.yaw_rate,
            })?;
        }
    }
    w.flush()?;
    Ok(())
}

/// One JSON document per turn: parameters plus samples.
pub fn export_ndjson(turns: &[Turn], path: &Path) -> Result<()> {
    let f = File::create(path)?;
    let mut w = std::io::BufWriter::new(f);
    for t in turns {
        let s = serde_json::to_string(t)?;
        writeln!(w, "{}", s)?;
    }
    w.flush()?;
    Ok(())
}

#[derive(Serialize, Deserialize)]
struct CsvRow {
    turn: usize, sample: usize,
    x: f64, y: f64, yaw: f64,
    speed: f64, slip_angle: f64, yaw_rate: f64,
}
