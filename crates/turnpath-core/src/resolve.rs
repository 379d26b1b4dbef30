use model::{ControlBranch, ParamRange, ParamRangeSchema, ParameterSet};
use tracing::debug;

use crate::{decode::expected_len, Result, TrajectoryError};

pub const DATA_FILE_TEMPLATE: &str = "initial_speed{initial_speed}_steering{steering}_controlsALL.dat";

fn check_range(min: f64, max: f64, step: f64) -> Result<(), String> {
    if !(min.is_finite() && max.is_finite() && step.is_finite()) {
        return Err(format!("non-finite range {min}..{max} step {step}"));
    }
    if step <= 0.0 {
        return Err(format!("step must be positive, got {step}"));
    }
    if max < min {
        return Err(format!("max {max} is below min {min}"));
    }
    Ok(())
}

fn named_range(name: &str, r: &ParamRange) -> Result<()> {
    check_range(r.min, r.max, r.step).map_err(|m| TrajectoryError::InvalidRange(format!("{name}: {m}")))
}

/// Upper bound on the points one range may describe.
pub const MAX_GRID_POINTS: usize = 1 << 24;

/// Number of grid points `min + k*step` inside `[min, max]`.
pub fn grid_len(min: f64, max: f64, step: f64) -> Result<usize> {
    check_range(min, max, step).map_err(TrajectoryError::InvalidRange)?;
    let steps = ((max - min) / step).floor();
    if !steps.is_finite() || steps >= MAX_GRID_POINTS as f64 {
        return Err(TrajectoryError::InvalidRange(format!(
            "{min}..{max} step {step} spans more than {MAX_GRID_POINTS} grid points"
        )));
    }
    Ok(steps as usize + 1)
}

/// Closest grid point to `value`, clamped to the range. An exact tie between
/// two neighbours resolves to the lower point.
pub fn snap_to_grid(value: f64, min: f64, max: f64, step: f64) -> Result<f64> {
    let n = grid_len(min, max, step)?;
    if value.is_nan() {
        return Err(TrajectoryError::InvalidRange("cannot snap NaN".into()));
    }
    let last = (n - 1) as f64;
    let k = ((value - min) / step).clamp(0.0, last).floor();
    let lo = min + k * step;
    let hi = min + (k + 1.0).min(last) * step;
    Ok(if (hi - value).abs() < (lo - value).abs() { hi } else { lo })
}

fn snap_param(name: &str, value: f64, range: &ParamRange) -> Result<f64> {
    if !value.is_finite() {
        return Err(TrajectoryError::MissingParameter(name.into()));
    }
    named_range(name, range)?;
    snap_to_grid(value, range.min, range.max, range.step)
}

/// Render a grid value the way dataset file names spell it: integral values
/// without a fraction, left padded with '0' to three characters.
pub fn format_grid_value(v: f64) -> String {
    let v = if v == 0.0 { 0.0 } else { v }; // no "-0"
    let s = if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    };
    format!("{s:0>3}")
}

/// Dataset file name for the snapped initial speed and steering.
pub fn data_file_name(params: &ParameterSet, schema: &ParamRangeSchema) -> Result<String> {
    let r = &schema.params_ranges;
    let speed = snap_param("initial_speed", params.initial_speed, &r.initial_speed)?;
    let steering = snap_param("steering", params.steering, &r.steering)?;
    debug!(speed, steering, "snapped dataset coordinates");
    Ok(DATA_FILE_TEMPLATE
        .replace("{initial_speed}", &format_grid_value(speed))
        .replace("{steering}", &format_grid_value(steering)))
}

pub fn resolve_file_path(params: &ParameterSet, schema: &ParamRangeSchema) -> Result<String> {
    Ok(format!("{}{}", schema.base_url, data_file_name(params, schema)?))
}

/// Bytes of one trajectory record in the combined dataset.
pub fn record_size(schema: &ParamRangeSchema) -> usize {
    expected_len(&schema.trajectory_dimensions, schema.trajectory_length)
}

/// Record index inside the combined dataset: throttle records first, then
/// brake, then handbrake. Neutral controls address record 0.
pub fn record_index(params: &ParameterSet, schema: &ParamRangeSchema) -> Result<usize> {
    let Some((branch, value)) = params.active_branch() else {
        return Ok(0);
    };
    let c = &schema.params_ranges.controls.params;
    named_range("throttle", &c.throttle)?;
    named_range("brake", &c.brake)?;
    let throttle_n = grid_len(c.throttle.min, c.throttle.max, c.throttle.step)?;
    let brake_n = grid_len(c.brake.min, c.brake.max, c.brake.step)?;

    let range = c.branch(branch);
    named_range(branch.as_str(), range)?;
    let branch_n = grid_len(range.min, range.max, range.step)?;
    let local = ((value - range.min) / range.step).floor();
    if local < 0.0 || local >= branch_n as f64 {
        return Err(TrajectoryError::InvalidRange(format!(
            "{} value {value} outside {}..{}",
            branch.as_str(),
            range.min,
            range.max
        )));
    }

    let base = match branch {
        ControlBranch::Throttle => 0,
        ControlBranch::Brake => throttle_n,
        ControlBranch::Handbrake => throttle_n + brake_n,
    };
    Ok(base + local as usize)
}

/// Byte offset of the record matching the active control branch.
pub fn resolve_offset(params: &ParameterSet, schema: &ParamRangeSchema) -> Result<usize> {
    let index = record_index(params, schema)?;
    let offset = index * record_size(schema);
    debug!(index, offset, "resolved dataset record");
    Ok(offset)
}

/// Reject schemas whose ranges or layout cannot address anything.
pub fn validate_schema(schema: &ParamRangeSchema) -> Result<()> {
    let r = &schema.params_ranges;
    let c = &r.controls.params;
    for (name, p) in [
        ("initial_speed", &r.initial_speed),
        ("steering", &r.steering),
        ("throttle", &c.throttle),
        ("brake", &c.brake),
        ("handbrake", &c.handbrake),
        ("scale", &schema.view_params.scale),
    ] {
        named_range(name, p)?;
    }
    if schema.trajectory_length == 0 {
        return Err(TrajectoryError::InvalidRange("TRAJECTORY_LENGTH is zero".into()));
    }
    if schema.trajectory_dimensions.is_empty() {
        return Err(TrajectoryError::InvalidRange("TRAJECTORY_DIMENSIONS is empty".into()));
    }
    Ok(())
}
