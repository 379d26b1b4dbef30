//! Screen-space drawing of turns: tire marks, trajectories and the car glyph.
//!
//! Rendering produces a display list in screen coordinates (y down) instead of
//! talking to a drawing surface directly; `svg` turns a list into a document.

use model::PositionSample;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub mod svg;

/// Vehicle footprint (simulation units) used to place tire marks.
pub const CAR_LENGTH: f64 = 4.5;
pub const CAR_WIDTH: f64 = 2.0;
/// Front wheel deflection at full steering input.
pub const MAX_STEERING_ANGLE: f64 = PI / 6.0;
/// View scale at which the glyph has its nominal size.
pub const BASE_SCALE: f64 = 10.0;

// glyph dimensions at BASE_SCALE, screen pixels
const GLYPH_WIDTH: f64 = 60.0;
const GLYPH_LENGTH: f64 = 140.0;
const WHEEL_WIDTH: f64 = 12.0;
const WHEEL_LENGTH: f64 = 25.0;
const COCKPIT_LENGTH_RATIO: f64 = 6.0;
const COCKPIT_WIDTH_RATIO: f64 = 3.0;
const WING_WIDTH_RATIO: f64 = 1.5;
const WING_LENGTH_RATIO: f64 = 10.0;
const WHEEL_POSITION_RATIO: f64 = 1.3;

const TIRE_MARK_WIDTH: f64 = 0.3;
const TIRE_MARK_LENGTH: f64 = 0.7;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f64) -> Self { Self { r, g, b, a } }
}

pub const TIRE_MARK: Rgba = Rgba::new(0, 0, 0, 0.1);
pub const ACTIVE_PATH: Rgba = Rgba::new(0, 0, 255, 0.3);
const HISTORY_GRAY: u8 = 150;
const CAR_BODY: Rgba = Rgba::new(255, 0, 0, 1.0);
const CAR_COCKPIT: Rgba = Rgba::new(50, 50, 50, 1.0);
const CAR_WINGS: Rgba = Rgba::new(200, 0, 0, 1.0);
const CAR_WHEELS: Rgba = Rgba::new(0, 0, 0, 1.0);

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawCommand {
    Clear { width: f64, height: f64 },
    /// `rotation` in radians, clockwise on screen.
    Ellipse { cx: f64, cy: f64, rx: f64, ry: f64, rotation: f64, fill: Rgba },
    Polygon { points: Vec<Point>, fill: Rgba },
    Polyline { points: Vec<Point>, stroke: Rgba, width: f64 },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderConfig {
    pub width: f64,
    pub height: f64,
    /// Screen position of the simulation origin.
    pub origin_x: f64,
    pub origin_y: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { width: 1200.0, height: 800.0, origin_x: 200.0, origin_y: 400.0 }
    }
}

/// Simulation (y up) to screen (y down) mapping.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub origin_x: f64,
    pub origin_y: f64,
    pub scale: f64,
}

impl Viewport {
    pub fn new(cfg: &RenderConfig, scale: f64) -> Self {
        Self { origin_x: cfg.origin_x, origin_y: cfg.origin_y, scale }
    }

    pub fn transform(&self, x: f64, y: f64) -> Point {
        Point { x: self.origin_x + x * self.scale, y: self.origin_y - y * self.scale }
    }

    pub fn line_width(&self) -> f64 { 2.0 * self.scale / BASE_SCALE }
}

/// Stroke opacity of the `i`-th oldest historical turn.
pub fn history_opacity(i: usize) -> f64 {
    (0.3 - i as f64 * 0.05).max(0.05)
}

/// A translated + rotated local frame on screen.
#[derive(Clone, Copy, Debug)]
struct Pose {
    origin: Point,
    angle: f64,
}

impl Pose {
    fn place(&self, lx: f64, ly: f64) -> Point {
        let (s, c) = self.angle.sin_cos();
        Point { x: self.origin.x + lx * c - ly * s, y: self.origin.y + lx * s + ly * c }
    }

    fn child(&self, lx: f64, ly: f64, angle: f64) -> Pose {
        Pose { origin: self.place(lx, ly), angle: self.angle + angle }
    }

    fn rect(&self, x: f64, y: f64, w: f64, h: f64, fill: Rgba) -> DrawCommand {
        let points = vec![self.place(x, y), self.place(x + w, y), self.place(x + w, y + h), self.place(x, y + h)];
        DrawCommand::Polygon { points, fill }
    }

    fn ellipse(&self, lx: f64, ly: f64, rx: f64, ry: f64, fill: Rgba) -> DrawCommand {
        let c = self.place(lx, ly);
        DrawCommand::Ellipse { cx: c.x, cy: c.y, rx, ry, rotation: self.angle, fill }
    }
}

/// What one frame shows.
#[derive(Clone, Copy, Debug)]
pub struct Frame<'a> {
    /// Every turn's samples up to and including the active turn.
    pub positions: &'a [PositionSample],
    /// Trajectories of the turns before the active one, oldest first.
    pub previous: &'a [&'a [PositionSample]],
    /// Steering input of the active turn, -100..100.
    pub steering: f64,
    pub scale: f64,
}

pub fn render_frame(cfg: &RenderConfig, frame: &Frame) -> Vec<DrawCommand> {
    let view = Viewport::new(cfg, frame.scale);
    let mut out = vec![DrawCommand::Clear { width: cfg.width, height: cfg.height }];
    let Some(last) = frame.positions.last() else {
        return out;
    };

    for p in frame.positions {
        push_tire_marks(&mut out, &view, p);
    }

    for (i, step) in frame.previous.iter().enumerate() {
        if step.is_empty() {
            continue;
        }
        out.push(DrawCommand::Polyline {
            points: polyline(&view, step),
            stroke: Rgba::new(HISTORY_GRAY, HISTORY_GRAY, HISTORY_GRAY, history_opacity(i)),
            width: view.line_width(),
        });
    }

    out.push(DrawCommand::Polyline {
        points: polyline(&view, frame.positions),
        stroke: ACTIVE_PATH,
        width: view.line_width(),
    });

    push_car(&mut out, &view, last, frame.steering);
    out
}

fn polyline(view: &Viewport, samples: &[PositionSample]) -> Vec<Point> {
    samples.iter().map(|p| view.transform(p.x, p.y)).collect()
}

fn push_tire_marks(out: &mut Vec<DrawCommand>, view: &Viewport, p: &PositionSample) {
    let pose = Pose { origin: view.transform(p.x, p.y), angle: -p.yaw };
    let s = view.scale;
    for (fx, fy) in [(0.5, 0.5), (0.5, -0.5), (-0.5, 0.5), (-0.5, -0.5)] {
        out.push(pose.ellipse(
            CAR_LENGTH * fx * s,
            CAR_WIDTH * fy * s,
            TIRE_MARK_WIDTH * s,
            TIRE_MARK_LENGTH * s,
            TIRE_MARK,
        ));
    }
}

fn push_car(out: &mut Vec<DrawCommand>, view: &Viewport, p: &PositionSample, steering: f64) {
    let pose = Pose { origin: view.transform(p.x, p.y), angle: -p.yaw };
    let f = view.scale / BASE_SCALE;
    let (w, l) = (GLYPH_WIDTH * f, GLYPH_LENGTH * f);
    let (ww, wl) = (WHEEL_WIDTH * f, WHEEL_LENGTH * f);

    // body outline, nose towards +x
    let body = [
        (-l / 2.0, -w / 4.0),
        (-l / 3.0, -w / 2.0),
        (l / 3.0, -w / 2.0),
        (l / 2.0, -w / 4.0),
        (l / 2.0, w / 4.0),
        (l / 3.0, w / 2.0),
        (-l / 3.0, w / 2.0),
        (-l / 2.0, w / 4.0),
    ];
    out.push(DrawCommand::Polygon { points: body.iter().map(|&(x, y)| pose.place(x, y)).collect(), fill: CAR_BODY });
    out.push(pose.ellipse(0.0, 0.0, l / COCKPIT_LENGTH_RATIO, w / COCKPIT_WIDTH_RATIO, CAR_COCKPIT));

    let wing_y = -w / WING_WIDTH_RATIO;
    let wing_len = l / WING_LENGTH_RATIO;
    out.push(pose.rect(l / 2.0, wing_y, wing_len, w * 1.3, CAR_WINGS));
    out.push(pose.rect(-l / 2.0, wing_y, wing_len, w * 1.3, CAR_WINGS));

    let deflection = steering / 100.0 * MAX_STEERING_ANGLE;
    let wy = w / WHEEL_POSITION_RATIO;
    for (x, y, angle) in [
        (l / 3.0, wy, -deflection),
        (l / 3.0, -wy, -deflection),
        (-l / 3.0, wy, 0.0),
        (-l / 3.0, -wy, 0.0),
    ] {
        out.push(pose.child(x, y, angle).rect(-wl / 2.0, -ww / 2.0, wl, ww, CAR_WHEELS));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool { (a - b).abs() < 1e-9 }

    fn straight_line(n: usize, y: f64) -> Vec<PositionSample> {
        (0..n).map(|i| PositionSample { x: i as f64, y, ..Default::default() }).collect()
    }

    fn polygons(cmds: &[DrawCommand]) -> Vec<&Vec<Point>> {
        cmds.iter()
            .filter_map(|c| match c {
                DrawCommand::Polygon { points, .. } => Some(points),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn transform_flips_y_and_scales() {
        let cfg = RenderConfig::default();
        let v = Viewport::new(&cfg, 3.0);
        assert_eq!(v.transform(0.0, 0.0), Point { x: cfg.origin_x, y: cfg.origin_y });
        assert_eq!(v.transform(1.0, 0.0), Point { x: cfg.origin_x + 3.0, y: cfg.origin_y });
        let up = v.transform(0.0, 1.0);
        assert_eq!(up.x, cfg.origin_x);
        assert!(up.y < cfg.origin_y);
        assert!(approx(v.line_width(), 0.6));
    }

    #[test]
    fn history_fades_to_a_floor() {
        let seq: Vec<f64> = (0..5).map(history_opacity).collect();
        for (got, want) in seq.iter().zip([0.3, 0.25, 0.2, 0.15, 0.1]) {
            assert!(approx(*got, want), "{seq:?}");
        }
        assert!(approx(history_opacity(5), 0.05));
        assert!(approx(history_opacity(40), 0.05));
    }

    #[test]
    fn empty_frame_only_clears() {
        let cmds = render_frame(&RenderConfig::default(), &Frame { positions: &[], previous: &[], steering: 0.0, scale: 3.0 });
        assert_eq!(cmds, vec![DrawCommand::Clear { width: 1200.0, height: 800.0 }]);
    }

    #[test]
    fn frame_draw_order() {
        let first = straight_line(3, 0.0);
        let second = straight_line(2, 1.0);
        let all: Vec<_> = first.iter().chain(second.iter()).copied().collect();
        let previous = [first.as_slice()];
        let frame = Frame { positions: &all, previous: &previous, steering: 0.0, scale: 3.0 };
        let cmds = render_frame(&RenderConfig::default(), &frame);

        // clear, 4 marks per sample, one history path, active path, 8 glyph parts
        assert_eq!(cmds.len(), 1 + 4 * 5 + 1 + 1 + 8);
        assert!(matches!(cmds[0], DrawCommand::Clear { .. }));
        assert!(cmds[1..21].iter().all(|c| matches!(c, DrawCommand::Ellipse { fill, .. } if *fill == TIRE_MARK)));
        match &cmds[21] {
            DrawCommand::Polyline { points, stroke, width } => {
                assert_eq!(points.len(), 3);
                assert_eq!((stroke.r, stroke.g, stroke.b), (150, 150, 150));
                assert!(approx(stroke.a, 0.3));
                assert!(approx(*width, 0.6));
            }
            other => panic!("expected history path, got {other:?}"),
        }
        match &cmds[22] {
            DrawCommand::Polyline { points, stroke, .. } => {
                assert_eq!(points.len(), 5);
                assert_eq!(*stroke, ACTIVE_PATH);
            }
            other => panic!("expected active path, got {other:?}"),
        }
    }

    #[test]
    fn tire_marks_follow_yaw() {
        let cfg = RenderConfig::default();
        let p = [PositionSample { yaw: PI / 2.0, ..Default::default() }];
        let cmds = render_frame(&cfg, &Frame { positions: &p, previous: &[], steering: 0.0, scale: 2.0 });
        // front-left wheel at (+L/2, +W/2) in the car frame; car points up on screen
        match cmds[1] {
            DrawCommand::Ellipse { cx, cy, rx, ry, rotation, .. } => {
                assert!(approx(cx, cfg.origin_x + CAR_WIDTH / 2.0 * 2.0));
                assert!(approx(cy, cfg.origin_y - CAR_LENGTH / 2.0 * 2.0));
                assert!(approx(rx, 0.6));
                assert!(approx(ry, 1.4));
                assert!(approx(rotation, -PI / 2.0));
            }
            ref other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn only_front_wheels_steer() {
        let p = [PositionSample::default()];
        let cmds = render_frame(&RenderConfig::default(), &Frame { positions: &p, previous: &[], steering: 100.0, scale: 10.0 });
        let polys = polygons(&cmds);
        // body, two wings, four wheels
        assert_eq!(polys.len(), 7);
        let wheels = &polys[3..];
        let is_axis_aligned = |pts: &Vec<Point>| approx(pts[0].y, pts[1].y);
        assert!(!is_axis_aligned(wheels[0]));
        assert!(!is_axis_aligned(wheels[1]));
        assert!(is_axis_aligned(wheels[2]));
        assert!(is_axis_aligned(wheels[3]));

        // full right input turns the front wheel edge by MAX_STEERING_ANGLE
        let (a, b) = (wheels[0][0], wheels[0][1]);
        assert!(approx((b.y - a.y).atan2(b.x - a.x), -MAX_STEERING_ANGLE));
    }

    #[test]
    fn glyph_scales_with_view() {
        let p = [PositionSample::default()];
        let body_len = |scale: f64| {
            let cmds = render_frame(&RenderConfig::default(), &Frame { positions: &p, previous: &[], steering: 0.0, scale });
            let body = polygons(&cmds)[0].clone();
            body[3].x - body[0].x
        };
        assert!(approx(body_len(10.0), GLYPH_LENGTH));
        assert!(approx(body_len(20.0), 2.0 * GLYPH_LENGTH));
        assert!(approx(body_len(5.0), GLYPH_LENGTH / 2.0));
    }

    #[test]
    fn display_list_serialises_with_kind_tags() {
        let v = serde_json::to_value(DrawCommand::Clear { width: 1.0, height: 2.0 }).unwrap();
        assert_eq!(v["kind"], "clear");
    }
}
