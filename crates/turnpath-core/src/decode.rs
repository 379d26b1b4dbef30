use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use model::{ChannelSpec, ChannelType, PositionSample, TRAJECTORY_CHANNELS};
use std::io::Cursor;

use crate::{Result, TrajectoryError};

/// Decoded channels, in the order they appear in the record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Channels {
    entries: Vec<(String, Vec<f64>)>,
}

impl Channels {
    pub fn new() -> Self { Self::default() }

    pub fn push(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.entries.push((name.into(), values));
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Transpose the six kinematic channels into samples: sample `i` is built
    /// from index `i` of every channel.
    pub fn to_positions(&self) -> Result<Vec<PositionSample>> {
        let mut cols = [&[][..]; 6];
        for (slot, name) in cols.iter_mut().zip(TRAJECTORY_CHANNELS) {
            *slot = self
                .get(name)
                .ok_or_else(|| TrajectoryError::Decode(format!("missing channel '{name}'")))?;
        }
        let n = cols[0].len();
        if let Some(i) = cols.iter().position(|c| c.len() != n) {
            return Err(TrajectoryError::Decode(format!(
                "channel '{}' has {} samples, expected {n}",
                TRAJECTORY_CHANNELS[i],
                cols[i].len()
            )));
        }
        Ok((0..n)
            .map(|i| PositionSample {
                x: cols[0][i],
                y: cols[1][i],
                yaw: cols[2][i],
                speed: cols[3][i],
                slip_angle: cols[4][i],
                yaw_rate: cols[5][i],
            })
            .collect())
    }
}

/// Total bytes one record occupies for `spec`.
pub fn expected_len(spec: &[ChannelSpec], trajectory_length: usize) -> usize {
    spec.iter().map(|c| c.byte_len(trajectory_length)).sum()
}

/// Decode a packed little-endian record. Channels sit back to back with no
/// padding; channel `i` starts at the summed byte length of channels `0..i`.
/// Bytes past the expected length are ignored.
pub fn decode_channels(buf: &[u8], spec: &[ChannelSpec], trajectory_length: usize) -> Result<Channels> {
    let need = expected_len(spec, trajectory_length);
    if buf.len() < need {
        return Err(TrajectoryError::Decode(format!(
            "buffer holds {} bytes, layout needs {need}",
            buf.len()
        )));
    }

    let mut c = Cursor::new(buf);
    let mut out = Channels::new();
    for ch in spec {
        let n = ch.sample_count(trajectory_length);
        out.push(ch.name.clone(), read_channel(&mut c, ch.ty, n)?);
    }
    Ok(out)
}

fn read_channel(c: &mut Cursor<&[u8]>, ty: ChannelType, n: usize) -> Result<Vec<f64>> {
    let mut v = Vec::with_capacity(n);
    for _ in 0..n {
        let x = match ty {
            ChannelType::Float32 => c.read_f32::<LittleEndian>().map(f64::from),
            ChannelType::Float64 => c.read_f64::<LittleEndian>(),
            ChannelType::Int32 => c.read_i32::<LittleEndian>().map(f64::from),
            ChannelType::Int16 => c.read_i16::<LittleEndian>().map(f64::from),
            ChannelType::Int8 => c.read_i8().map(f64::from),
        }
        .map_err(|e| TrajectoryError::Decode(e.to_string()))?;
        v.push(x);
    }
    Ok(v)
}

/// Pack channels into one record laid out per `spec`. Values are cast to the
/// channel type; short channels are zero filled.
pub fn encode_channels(channels: &Channels, spec: &[ChannelSpec], trajectory_length: usize) -> Result<Vec<u8>> {
    let mut w = Vec::with_capacity(expected_len(spec, trajectory_length));
    for ch in spec {
        let values = channels
            .get(&ch.name)
            .ok_or_else(|| TrajectoryError::Decode(format!("missing channel '{}'", ch.name)))?;
        for i in 0..ch.sample_count(trajectory_length) {
            let x = values.get(i).copied().unwrap_or(0.0);
            match ch.ty {
                ChannelType::Float32 => w.write_f32::<LittleEndian>(x as f32),
                ChannelType::Float64 => w.write_f64::<LittleEndian>(x),
                ChannelType::Int32 => w.write_i32::<LittleEndian>(x as i32),
                ChannelType::Int16 => w.write_i16::<LittleEndian>(x as i16),
                ChannelType::Int8 => w.write_i8(x as i8),
            }
            .map_err(|e| TrajectoryError::Decode(e.to_string()))?;
        }
    }
    Ok(w)
}
