// apps/cli/src/commands.rs
use std::{fmt::Write as _, path::{Path, PathBuf}, sync::Arc};

use crate::session::{AppSession, SessionState};
use crate::turns::ParamChange;

#[derive(Debug, PartialEq)]
pub enum Command {
    Set(ParamChange),
    Next,
    Prev,
    Status,
    Render(PathBuf),
    Export(PathBuf),
    Wait,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  set <param> <value>   steering | initial_speed | scale | controls | throttle | brake | handbrake
                        | road_condition | vehicle_type | x | y | yaw
  next                  validate the turn and start the next one
  prev                  discard the current turn
  status                show the active turn
  render <file>         write the current frame (.svg or .json)
  export <file>         write every turn's trajectory (.csv or .ndjson)
  wait                  wait for the pending trajectory
  quit";

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let rest: Vec<&str> = words.collect();
    let path = |rest: &[&str]| -> Result<PathBuf, String> {
        match rest {
            [p] => Ok(PathBuf::from(p)),
            _ => Err(format!("usage: {verb} <file>")),
        }
    };
    let cmd = match verb {
        "set" => match rest.as_slice() {
            [name, value] => Command::Set(ParamChange::parse(name, value)?),
            // labels such as "Wet asphalt" contain spaces
            [name, value @ ..] if !value.is_empty() => Command::Set(ParamChange::parse(name, &value.join(" "))?),
            _ => return Err("usage: set <param> <value>".into()),
        },
        "next" => Command::Next,
        "prev" | "previous" => Command::Prev,
        "status" => Command::Status,
        "render" => Command::Render(path(&rest)?),
        "export" => Command::Export(path(&rest)?),
        "wait" => Command::Wait,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(Some(cmd))
}

/// Run one command; returns text to show the user.
pub async fn run_command(session: &Arc<AppSession>, cmd: Command) -> Result<Option<String>, String> {
    match cmd {
        Command::Set(change) => {
            session.change_param(change)?;
            Ok(None)
        }
        Command::Next => {
            session.settle().await;
            if session.next_step()? {
                Ok(Some(turn_banner(session)))
            } else {
                Err("the current turn has no trajectory yet".into())
            }
        }
        Command::Prev => {
            if session.previous_step()? {
                Ok(Some(turn_banner(session)))
            } else {
                Err("already at the first turn".into())
            }
        }
        Command::Status => status(session).map(Some),
        Command::Render(path) => {
            session.settle().await;
            render_to(session, &path).await?;
            Ok(Some(format!("frame written to {}", path.display())))
        }
        Command::Export(path) => {
            session.settle().await;
            export_to(session, &path)?;
            Ok(Some(format!("trajectories written to {}", path.display())))
        }
        Command::Wait => {
            session.settle().await;
            status(session).map(Some)
        }
        Command::Help => Ok(Some(HELP.into())),
        Command::Quit => Ok(None),
    }
}

fn turn_banner(session: &AppSession) -> String {
    let inner = session.inner.lock();
    match inner.ready() {
        Some(r) => format!("Turn #{}", r.history.current_step()),
        None => "Loading...".into(),
    }
}

pub fn status(session: &AppSession) -> Result<String, String> {
    let inner = session.inner.lock();
    let r = match &inner.state {
        SessionState::Loading => return Ok("Loading...".into()),
        SessionState::Failed(f) => return Err(f.message.clone()),
        SessionState::Ready(r) => r,
    };
    let p = &r.history.active().params;
    let control = match p.active_branch() {
        Some((branch, v)) => format!("{} {v}", branch.as_str()),
        None => "neutral".into(),
    };
    let mut s = String::new();
    let _ = writeln!(s, "Turn #{} ({} backend)", r.history.current_step(), session.provider_name());
    let _ = writeln!(
        s,
        "  position ({:.2}, {:.2}) yaw {:.3}  initial_speed {:.2}  steering {}",
        p.x, p.y, p.yaw, p.initial_speed, p.steering
    );
    let _ = writeln!(
        s,
        "  controls {} [{}]  road {}  vehicle {}  scale {}",
        p.combined_control(),
        control,
        p.road_condition.label(),
        p.vehicle_type.label(),
        p.scale
    );
    let n = r.history.active().positions.len();
    let state = if r.loading {
        "loading trajectory...".to_string()
    } else if let Some(e) = &r.error {
        format!("error: {e}")
    } else {
        format!("{n} samples")
    };
    let _ = write!(s, "  trajectory: {state}");
    Ok(s)
}

fn extension(path: &Path) -> String {
    path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_ascii_lowercase()
}

async fn render_to(session: &AppSession, path: &Path) -> Result<(), String> {
    let cmds = session.frame()?;
    let cfg = session.render_config();
    let body = match extension(path).as_str() {
        "json" => serde_json::to_string_pretty(&cmds).map_err(|e| e.to_string())?,
        _ => render::svg::to_svg(cfg.width, cfg.height, &cmds),
    };
    tokio::fs::write(path, body)
        .await
        .map_err(|e| format!("write {}: {e}", path.display()))
}

fn export_to(session: &AppSession, path: &Path) -> Result<(), String> {
    let turns = session.turns()?;
    let res = match extension(path).as_str() {
        "ndjson" | "jsonl" => iox::export_ndjson(&turns, path),
        _ => iox::export_csv(&turns, path),
    };
    res.map_err(|e| format!("{e:#}"))
}
