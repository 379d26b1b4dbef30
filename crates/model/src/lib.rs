use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Channel order of one trajectory as served by the compute endpoint.
pub const TRAJECTORY_CHANNELS: [&str; 6] = ["x", "y", "yaw", "speed", "slip_angle", "yaw_rate"];

// combined control slider: handbrake | brake | neutral | throttle
pub const COMBINED_CONTROL_MIN: f64 = -200.0;
pub const COMBINED_CONTROL_MAX: f64 = 100.0;
pub const HANDBRAKE_THRESHOLD: f64 = -100.0;
pub const HANDBRAKE_ENGAGED: f64 = 100.0;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoadCondition {
    Dirt,
    Snow,
    Asphalt,
    WetAsphalt,
}

impl RoadCondition {
    pub const ALL: [RoadCondition; 4] = [Self::Dirt, Self::Snow, Self::Asphalt, Self::WetAsphalt];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dirt => "dirt",
            Self::Snow => "snow",
            Self::Asphalt => "asphalt",
            Self::WetAsphalt => "wet_asphalt",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Dirt => "Dirt",
            Self::Snow => "Snow",
            Self::Asphalt => "Asphalt",
            Self::WetAsphalt => "Wet asphalt",
        }
    }
}

impl fmt::Display for RoadCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for RoadCondition {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s || r.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown road condition '{s}'"))
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    FrontWheelDrive,
    FourWheelDrive,
    FrontEngineRearDrive,
}

impl VehicleType {
    pub const ALL: [VehicleType; 3] = [Self::FrontWheelDrive, Self::FourWheelDrive, Self::FrontEngineRearDrive];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FrontWheelDrive => "front_wheel_drive",
            Self::FourWheelDrive => "four_wheel_drive",
            Self::FrontEngineRearDrive => "front_engine_rear_drive",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::FrontWheelDrive => "FWD",
            Self::FourWheelDrive => "4WD",
            Self::FrontEngineRearDrive => "RWD",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for VehicleType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == s || v.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown vehicle type '{s}'"))
    }
}

/// Which of the mutually exclusive pedal channels drives a trajectory.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ControlBranch {
    Throttle,
    Brake,
    Handbrake,
}

impl ControlBranch {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Throttle => "throttle",
            Self::Brake => "brake",
            Self::Handbrake => "handbrake",
        }
    }
}

/// Full control vector sent to the trajectory service.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ParameterSet {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    pub initial_speed: f64,
    pub steering: f64,
    pub throttle: f64,
    pub brake: f64,
    pub handbrake: f64,
    pub road_condition: RoadCondition,
    pub vehicle_type: VehicleType,
    pub scale: f64,
    // carried over from the previous turn's final sample; the service may ignore them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slip_angle: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaw_rate: Option<f64>,
}

impl ParameterSet {
    /// Split one combined slider value into throttle / brake / handbrake.
    /// At most one of the three is nonzero afterwards.
    pub fn apply_combined_control(&mut self, value: f64) {
        let (mut throttle, mut brake, mut handbrake) = (0.0, 0.0, 0.0);
        if value < HANDBRAKE_THRESHOLD {
            handbrake = HANDBRAKE_ENGAGED;
        } else if value < 0.0 {
            brake = -value;
        } else {
            throttle = value;
        }
        self.throttle = throttle;
        self.brake = brake;
        self.handbrake = handbrake;
    }

    /// Inverse of `apply_combined_control`, for display.
    pub fn combined_control(&self) -> f64 {
        match self.active_branch() {
            Some((ControlBranch::Throttle, v)) => v,
            Some((ControlBranch::Brake, v)) => -v,
            Some((ControlBranch::Handbrake, _)) => COMBINED_CONTROL_MIN,
            None => 0.0,
        }
    }

    /// First positive channel in throttle, brake, handbrake order.
    pub fn active_branch(&self) -> Option<(ControlBranch, f64)> {
        if self.throttle > 0.0 {
            Some((ControlBranch::Throttle, self.throttle))
        } else if self.brake > 0.0 {
            Some((ControlBranch::Brake, self.brake))
        } else if self.handbrake > 0.0 {
            Some((ControlBranch::Handbrake, self.handbrake))
        } else {
            None
        }
    }
}

/// One instant along a computed trajectory.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct PositionSample {
    pub x: f64,
    pub y: f64,
    pub yaw: f64,
    pub speed: f64,
    pub slip_angle: f64,
    pub yaw_rate: f64,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Turn {
    #[serde(with = "uuid::serde::simple")]
    pub id: Uuid,
    pub params: ParameterSet,
    #[serde(default)]
    pub positions: Vec<PositionSample>,
}

impl Turn {
    pub fn new(params: ParameterSet) -> Self {
        Self { id: Uuid::new_v4(), params, positions: vec![] }
    }

    /// Parameters for the turn that continues from this one's final sample.
    /// `None` while no trajectory has been computed.
    pub fn chained_params(&self) -> Option<ParameterSet> {
        let last = self.positions.last()?;
        Some(ParameterSet {
            x: last.x,
            y: last.y,
            yaw: last.yaw,
            initial_speed: last.speed,
            slip_angle: Some(last.slip_angle),
            yaw_rate: Some(last.yaw_rate),
            steering: 0.0,
            ..self.params.clone()
        })
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
    #[serde(default)]
    pub label: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ChoiceParam<T> {
    pub default: T,
    #[serde(default)]
    pub label: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ControlParams {
    pub throttle: ParamRange,
    pub brake: ParamRange,
    pub handbrake: ParamRange,
    pub road_condition: ChoiceParam<RoadCondition>,
    pub vehicle_type: ChoiceParam<VehicleType>,
}

impl ControlParams {
    pub fn branch(&self, branch: ControlBranch) -> &ParamRange {
        match branch {
            ControlBranch::Throttle => &self.throttle,
            ControlBranch::Brake => &self.brake,
            ControlBranch::Handbrake => &self.handbrake,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Controls {
    pub params: ControlParams,
    #[serde(default)]
    pub label: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ParamRanges {
    pub initial_speed: ParamRange,
    pub steering: ParamRange,
    pub controls: Controls,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ViewParams {
    pub scale: ParamRange,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Float32,
    Float64,
    Int32,
    Int16,
    Int8,
}

impl ChannelType {
    pub fn size(self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::Float64 => 8,
            Self::Int32 => 4,
            Self::Int16 => 2,
            Self::Int8 => 1,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ChannelSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ChannelType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,
}

impl ChannelSpec {
    pub fn new(name: &str, ty: ChannelType, length: usize) -> Self {
        Self { name: name.into(), ty, length: Some(length) }
    }

    pub fn sample_count(&self, trajectory_length: usize) -> usize {
        self.length.unwrap_or(trajectory_length)
    }

    pub fn byte_len(&self, trajectory_length: usize) -> usize {
        self.ty.size() * self.sample_count(trajectory_length)
    }
}

/// Server supplied ranges and binary layout. Authoritative for every slider.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ParamRangeSchema {
    pub params_ranges: ParamRanges,
    pub view_params: ViewParams,
    #[serde(rename = "TRAJECTORY_DIMENSIONS")]
    pub trajectory_dimensions: Vec<ChannelSpec>,
    #[serde(rename = "TRAJECTORY_LENGTH")]
    pub trajectory_length: usize,
    #[serde(default)]
    pub base_url: String,
}

impl ParamRangeSchema {
    /// Parameters of the very first turn.
    pub fn initial_params(&self) -> ParameterSet {
        let r = &self.params_ranges;
        ParameterSet {
            x: 0.0,
            y: 0.0,
            yaw: 0.0,
            initial_speed: r.initial_speed.default,
            steering: r.steering.default,
            throttle: r.controls.params.throttle.default,
            brake: 0.0,
            handbrake: 0.0,
            road_condition: r.controls.params.road_condition.default,
            vehicle_type: r.controls.params.vehicle_type.default,
            scale: self.view_params.scale.default,
            slip_angle: None,
            yaw_rate: None,
        }
    }
}
