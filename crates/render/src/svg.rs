use std::fmt::Write;

use crate::{DrawCommand, Point, Rgba};

const BACKGROUND: &str = "#f0f0f0";

fn paint(attr: &str, c: Rgba) -> String {
    format!(r#"{attr}="rgb({},{},{})" {attr}-opacity="{:.3}""#, c.r, c.g, c.b, c.a)
}

fn points(pts: &[Point]) -> String {
    pts.iter().map(|p| format!("{:.2},{:.2}", p.x, p.y)).collect::<Vec<_>>().join(" ")
}

/// Serialise a display list as a standalone SVG document.
pub fn to_svg(width: f64, height: f64, cmds: &[DrawCommand]) -> String {
    let mut s = String::new();
    let _ = writeln!(
        s,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}">"#
    );
    for cmd in cmds {
        let _ = match cmd {
            DrawCommand::Clear { width, height } => {
                writeln!(s, r#"  <rect x="0" y="0" width="{width}" height="{height}" fill="{BACKGROUND}"/>"#)
            }
            DrawCommand::Ellipse { cx, cy, rx, ry, rotation, fill } => writeln!(
                s,
                r#"  <ellipse cx="{cx:.2}" cy="{cy:.2}" rx="{rx:.2}" ry="{ry:.2}" transform="rotate({:.3} {cx:.2} {cy:.2})" {}/>"#,
                rotation.to_degrees(),
                paint("fill", *fill)
            ),
            DrawCommand::Polygon { points: pts, fill } => {
                writeln!(s, r#"  <polygon points="{}" {}/>"#, points(pts), paint("fill", *fill))
            }
            DrawCommand::Polyline { points: pts, stroke, width } => writeln!(
                s,
                r#"  <polyline points="{}" fill="none" {} stroke-width="{width:.2}" stroke-linejoin="round"/>"#,
                points(pts),
                paint("stroke", *stroke)
            ),
        };
    }
    s.push_str("</svg>\n");
    s
}
