//! `fleetdeck logs`

use super::output::{format_json_line, format_log_line};
use super::session::{rest_client, LiveSession};
use super::LogsArgs;
use crate::config::FleetDeckConfig;
use crate::events::{InstanceKey, LogLine};
use crate::reconcile::load_instance_logs;
use crate::state::{FleetState, SliceUpdate};

fn print_line(line: &LogLine, json: bool) {
    if json {
        println!("{}", format_json_line(line));
    } else {
        println!("{}", format_log_line(line));
    }
}

/// Lines to print first: the last `tail` lines, or everything.
fn tail_lines(lines: &[LogLine], tail: Option<usize>) -> &[LogLine] {
    match tail {
        Some(n) => &lines[lines.len().saturating_sub(n)..],
        None => lines,
    }
}

/// Lines after `last_seq`, in order.
fn lines_after(lines: Vec<LogLine>, last_seq: Option<u64>) -> Vec<LogLine> {
    match last_seq {
        Some(last) => lines.into_iter().filter(|l| l.seq > last).collect(),
        None => lines,
    }
}

/// Handle `fleetdeck logs`
pub async fn handle_logs(args: &LogsArgs, config: &FleetDeckConfig) -> anyhow::Result<()> {
    let api = rest_client(config)?;

    if !args.follow {
        let state = FleetState::new(&config.retention);
        let lines = load_instance_logs(&api, &state, &args.host, &args.instance)
            .await
            .into_result()
            .map_err(anyhow::Error::msg)?;
        for line in tail_lines(&lines, args.tail) {
            print_line(line, args.connect.json);
        }
        return Ok(());
    }

    // Subscribe before fetching history so no live line falls in between.
    let mut session = LiveSession::start(config)?;
    let key = InstanceKey::new(args.host.clone(), args.instance.clone());

    let history = match load_instance_logs(&api, &session.state, &args.host, &args.instance)
        .await
        .into_result()
    {
        Ok(lines) => lines,
        Err(e) => {
            eprintln!("Warning: log history unavailable: {}", e);
            session.state.instance_logs(&args.host, &args.instance)
        }
    };
    for line in tail_lines(&history, args.tail) {
        print_line(line, args.connect.json);
    }
    let mut last_seq = history.last().map(|l| l.seq);

    while let Some(update) = session.next_update().await {
        match update {
            SliceUpdate::Logs(updated) if updated == key => {
                let fresh = lines_after(
                    session.state.instance_logs(&args.host, &args.instance),
                    last_seq,
                );
                for line in &fresh {
                    print_line(line, args.connect.json);
                }
                if let Some(line) = fresh.last() {
                    last_seq = Some(line.seq);
                }
            }
            SliceUpdate::Connection(connected) => {
                tracing::info!(connected, "Event feed connection changed");
            }
            _ => {}
        }
    }

    session.stop().await;
    Ok(())
}
