use model::*;
use tracing::{debug, info};
use uuid::Uuid;

/// Numeric fields a user may set directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumericParam {
    X,
    Y,
    Yaw,
    InitialSpeed,
    Steering,
    Scale,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamChange {
    Numeric(NumericParam, f64),
    /// Combined throttle / brake / handbrake slider value.
    Controls(f64),
    RoadCondition(RoadCondition),
    VehicleType(VehicleType),
}

impl ParamChange {
    pub fn parse(name: &str, value: &str) -> Result<Self, String> {
        let num = || match value.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(format!("'{value}' is not a number for {name}")),
        };
        Ok(match name {
            "road_condition" => Self::RoadCondition(value.parse()?),
            "vehicle_type" => Self::VehicleType(value.parse()?),
            "controls" => Self::Controls(num()?.clamp(COMBINED_CONTROL_MIN, COMBINED_CONTROL_MAX)),
            // single pedals go through the combined control so they stay exclusive
            "throttle" => Self::Controls(num()?.clamp(0.0, COMBINED_CONTROL_MAX)),
            // a full brake stays short of the handbrake band
            "brake" => Self::Controls(-num()?.clamp(0.0, -HANDBRAKE_THRESHOLD)),
            "handbrake" => Self::Controls(if num()? > 0.0 { COMBINED_CONTROL_MIN } else { 0.0 }),
            "x" => Self::Numeric(NumericParam::X, num()?),
            "y" => Self::Numeric(NumericParam::Y, num()?),
            "yaw" => Self::Numeric(NumericParam::Yaw, num()?),
            "initial_speed" => Self::Numeric(NumericParam::InitialSpeed, num()?),
            "steering" => Self::Numeric(NumericParam::Steering, num()?),
            "scale" => Self::Numeric(NumericParam::Scale, num()?),
            other => return Err(format!("unknown parameter '{other}'")),
        })
    }

    /// View-only changes re-render but never need a new trajectory.
    pub fn affects_trajectory(&self) -> bool {
        !matches!(self, Self::Numeric(NumericParam::Scale, _))
    }
}

/// Identifies the request a trajectory was computed for.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchTicket {
    pub turn_id: Uuid,
    pub generation: u64,
    pub params: ParameterSet,
}

/// Linear history of turns. Everything before the active turn is frozen;
/// rollback drops the newest turn for good.
#[derive(Clone, Debug)]
pub struct TurnHistory {
    turns: Vec<Turn>,
    current_step: usize,
    generation: u64,
}

impl TurnHistory {
    pub fn new(initial: ParameterSet) -> Self {
        Self { turns: vec![Turn::new(initial)], current_step: 1, generation: 0 }
    }

    /// 1-based index of the active turn.
    pub fn current_step(&self) -> usize { self.current_step }

    pub fn len(&self) -> usize { self.turns.len() }

    pub fn turns(&self) -> &[Turn] { &self.turns[..self.current_step] }

    pub fn active(&self) -> &Turn { &self.turns[self.current_step - 1] }

    fn active_mut(&mut self) -> &mut Turn { &mut self.turns[self.current_step - 1] }

    /// Turns strictly before the active one, oldest first.
    pub fn previous(&self) -> &[Turn] { &self.turns[..self.current_step - 1] }

    /// Samples of every turn up to and including the active one.
    pub fn all_positions(&self) -> Vec<PositionSample> {
        self.turns().iter().flat_map(|t| t.positions.iter().copied()).collect()
    }

    /// Apply a change to the active turn. Returns true when the active
    /// trajectory is now outdated and must be fetched again.
    pub fn change_param(&mut self, change: ParamChange) -> bool {
        let p = &mut self.active_mut().params;
        match change {
            ParamChange::Numeric(field, v) => {
                let slot = match field {
                    NumericParam::X => &mut p.x,
                    NumericParam::Y => &mut p.y,
                    NumericParam::Yaw => &mut p.yaw,
                    NumericParam::InitialSpeed => &mut p.initial_speed,
                    NumericParam::Steering => &mut p.steering,
                    NumericParam::Scale => &mut p.scale,
                };
                *slot = v;
            }
            ParamChange::Controls(v) => p.apply_combined_control(v),
            ParamChange::RoadCondition(r) => p.road_condition = r,
            ParamChange::VehicleType(t) => p.vehicle_type = t,
        }
        if !change.affects_trajectory() {
            return false;
        }
        self.generation += 1;
        self.active_mut().positions.clear();
        debug!(?change, generation = self.generation, "active turn changed");
        true
    }

    /// Ticket for fetching the active turn's trajectory as it stands now.
    pub fn ticket(&self) -> FetchTicket {
        let t = self.active();
        FetchTicket { turn_id: t.id, generation: self.generation, params: t.params.clone() }
    }

    pub fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.turn_id == self.active().id && ticket.generation == self.generation
    }

    /// Store a fetched trajectory unless the request has been superseded.
    pub fn apply_fetched(&mut self, ticket: &FetchTicket, positions: Vec<PositionSample>) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.active_mut().positions = positions;
        true
    }

    /// Drop the active turn's trajectory after a failed fetch.
    pub fn clear_positions(&mut self, ticket: &FetchTicket) {
        if self.is_current(ticket) {
            self.active_mut().positions.clear();
        }
    }

    /// Start a new turn from the active turn's final sample. No-op while the
    /// active turn has no trajectory.
    pub fn advance(&mut self) -> bool {
        let Some(params) = self.active().chained_params() else {
            return false;
        };
        self.turns.truncate(self.current_step);
        self.turns.push(Turn::new(params));
        self.current_step += 1;
        self.generation += 1;
        info!(step = self.current_step, "advanced to next turn");
        true
    }

    /// Discard the newest turn. No-op on the first turn.
    pub fn rollback(&mut self) -> bool {
        if self.current_step <= 1 {
            return false;
        }
        self.current_step -= 1;
        self.turns.truncate(self.current_step);
        self.generation += 1;
        info!(step = self.current_step, "rolled back to previous turn");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParameterSet {
        ParameterSet {
            x: 0.0,
            y: 0.0,
            yaw: 0.0,
            initial_speed: 10.0,
            steering: 20.0,
            throttle: 50.0,
            brake: 0.0,
            handbrake: 0.0,
            road_condition: RoadCondition::Dirt,
            vehicle_type: VehicleType::FourWheelDrive,
            scale: 3.0,
            slip_angle: None,
            yaw_rate: None,
        }
    }

    fn trajectory(x0: f64) -> Vec<PositionSample> {
        (0..4)
            .map(|i| PositionSample { x: x0 + i as f64, y: 1.0, yaw: 0.1, speed: 12.0, slip_angle: 0.02, yaw_rate: 0.3 })
            .collect()
    }

    fn with_trajectory() -> TurnHistory {
        let mut h = TurnHistory::new(params());
        let ticket = h.ticket();
        assert!(h.apply_fetched(&ticket, trajectory(0.0)));
        h
    }

    #[test]
    fn parse_changes() {
        assert_eq!(ParamChange::parse("controls", "-150"), Ok(ParamChange::Controls(-150.0)));
        assert_eq!(ParamChange::parse("brake", "30"), Ok(ParamChange::Controls(-30.0)));
        assert_eq!(ParamChange::parse("handbrake", "1"), Ok(ParamChange::Controls(COMBINED_CONTROL_MIN)));
        assert_eq!(
            ParamChange::parse("road_condition", "snow"),
            Ok(ParamChange::RoadCondition(RoadCondition::Snow))
        );
        assert_eq!(
            ParamChange::parse("steering", "-40"),
            Ok(ParamChange::Numeric(NumericParam::Steering, -40.0))
        );
        assert!(ParamChange::parse("steering", "left").is_err());
        assert!(ParamChange::parse("steering", "NaN").is_err());
        assert!(ParamChange::parse("controls", "inf").is_err());
        assert!(ParamChange::parse("throttle", "nan").is_err());
        assert!(ParamChange::parse("gear", "3").is_err());
    }

    #[test]
    fn controls_decompose_into_exclusive_pedals() {
        let mut h = TurnHistory::new(params());
        for (v, want) in [(-150.0, (0.0, 0.0, 100.0)), (-50.0, (0.0, 50.0, 0.0)), (30.0, (30.0, 0.0, 0.0))] {
            assert!(h.change_param(ParamChange::Controls(v)));
            let p = &h.active().params;
            assert_eq!((p.throttle, p.brake, p.handbrake), want);
        }
    }

    #[test]
    fn single_pedals_never_cross_into_another_branch() {
        let mut h = TurnHistory::new(params());
        for (name, value, want) in [
            ("brake", "150", (0.0, 100.0, 0.0)),
            ("brake", "-5", (0.0, 0.0, 0.0)),
            ("throttle", "250", (100.0, 0.0, 0.0)),
            ("handbrake", "1", (0.0, 0.0, 100.0)),
        ] {
            h.change_param(ParamChange::parse(name, value).unwrap());
            let p = &h.active().params;
            assert_eq!((p.throttle, p.brake, p.handbrake), want, "{name} {value}");
        }
        assert_eq!(ParamChange::parse("controls", "-900"), Ok(ParamChange::Controls(COMBINED_CONTROL_MIN)));
    }

    #[test]
    fn scale_is_view_only() {
        let mut h = with_trajectory();
        let before = h.ticket();
        assert!(!h.change_param(ParamChange::Numeric(NumericParam::Scale, 7.0)));
        assert_eq!(h.active().params.scale, 7.0);
        assert_eq!(h.active().positions.len(), 4);
        assert_eq!(h.ticket().generation, before.generation);
    }

    #[test]
    fn advance_requires_a_trajectory() {
        let mut h = TurnHistory::new(params());
        assert!(!h.advance());
        assert_eq!((h.current_step(), h.len()), (1, 1));
    }

    #[test]
    fn advance_chains_and_rollback_undoes() {
        let mut h = with_trajectory();
        assert!(h.advance());
        assert_eq!((h.current_step(), h.len()), (2, 2));

        let p = &h.active().params;
        assert_eq!((p.x, p.y, p.yaw, p.initial_speed, p.steering), (3.0, 1.0, 0.1, 12.0, 0.0));
        assert_eq!((p.slip_angle, p.yaw_rate), (Some(0.02), Some(0.3)));
        assert!(h.active().positions.is_empty());
        assert_eq!(h.previous().len(), 1);
        assert_eq!(h.all_positions().len(), 4);

        assert!(h.rollback());
        assert_eq!((h.current_step(), h.len()), (1, 1));
        assert_eq!(h.active().positions.len(), 4);
        assert!(!h.rollback());
    }

    #[test]
    fn history_is_frozen_behind_the_active_turn() {
        let mut h = with_trajectory();
        let first = h.active().clone();
        h.advance();
        h.change_param(ParamChange::Numeric(NumericParam::Steering, 40.0));
        h.change_param(ParamChange::Controls(-20.0));
        assert_eq!(h.previous()[0], first);
    }

    #[test]
    fn stale_results_are_discarded() {
        let mut h = TurnHistory::new(params());
        let old = h.ticket();
        h.change_param(ParamChange::Numeric(NumericParam::Steering, -10.0));
        let new = h.ticket();

        assert!(!h.apply_fetched(&old, trajectory(100.0)));
        assert!(h.active().positions.is_empty());
        assert!(h.apply_fetched(&new, trajectory(0.0)));
        assert_eq!(h.active().positions[0].x, 0.0);

        // a result for a rolled back turn never lands on its predecessor
        h.advance();
        let gone = h.ticket();
        h.rollback();
        assert!(!h.apply_fetched(&gone, trajectory(50.0)));
        assert_eq!(h.active().positions[0].x, 0.0);
    }

    #[test]
    fn param_change_invalidates_the_active_trajectory() {
        let mut h = with_trajectory();
        assert!(h.change_param(ParamChange::VehicleType(VehicleType::FrontWheelDrive)));
        assert!(h.active().positions.is_empty());
        assert!(!h.advance());
    }
}
