// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator command handlers.
//!
//! Every reply goes through the connection's tee sink: the operator sees
//! LOG frames, the file log keeps the same records. Machine-readable status
//! replies are bare USER frames carrying the state token.

use std::sync::Arc;

use wake_core::{MachineId, Op, OsIndex, Status};
use wake_wire::{decode_user, Command, MsgType};

use crate::fleet::{apply_sample_directives, dispatch};
use crate::lifecycle::Daemon;
use crate::listener::OutFrame;
use crate::logfan::{LogSink, TeeSink};

pub(super) async fn handle_user(d: &Arc<Daemon>, conn: wake_core::ConnId, payload: &[u8], tee: &TeeSink) {
    let req = match decode_user(payload) {
        Ok(req) => req,
        Err(e) => {
            tee.error(&format!("Malformed user message: {e}."));
            return;
        }
    };
    tee.debug(&format!("Message received from operator: {:?}", req.argv));
    if req.argv.is_empty() {
        return;
    }
    let cmd = match Command::parse(&req.argv) {
        Ok(cmd) => cmd,
        Err(e) => {
            tee.error(&format!("Error: {e}."));
            return;
        }
    };

    match cmd {
        Command::DaemonStop | Command::DaemonRestart => {
            let restart = matches!(cmd, Command::DaemonRestart);
            *d.shutdown_log.lock() = Some(tee.conn_sink());
            d.restart.store(restart, std::sync::atomic::Ordering::SeqCst);
            tee.debug(if restart { "Scheduled server restart." } else { "Scheduled server stop." });
            d.shutdown.notify_one();
        }
        Command::Status { machine_readable, names } => {
            status(d, conn, machine_readable, &names, tee);
        }
        Command::Start { machine, os } => {
            start(d, &machine, os.as_deref(), false, tee).await;
        }
        Command::Restart { machine, os } => {
            start(d, &machine, os.as_deref(), true, tee).await;
        }
        Command::Stop { machine } => stop(d, &machine, tee).await,
        Command::Kill { machine } => kill(d, &machine, tee).await,
        Command::Exec { machine, argv } => exec(d, &machine, argv, tee).await,
        Command::List => tee.info("list is not implemented yet."),
    }
}

/// Resolve a machine name, logging the standard complaint when unknown.
fn resolve(d: &Daemon, name: &str, tee: &TeeSink) -> Option<MachineId> {
    let id = d.fleet.lock().registry().find(name);
    if id.is_none() {
        tee.critical(&format!("{name} is not a configured computer."));
    }
    id
}

fn status(
    d: &Arc<Daemon>,
    conn: wake_core::ConnId,
    machine_readable: bool,
    names: &[String],
    tee: &TeeSink,
) {
    let ids: Vec<MachineId> = if names.is_empty() {
        d.fleet.lock().registry().ids().collect()
    } else {
        names.iter().filter_map(|n| resolve(d, n, tee)).collect()
    };

    let bits = match d.board.sample() {
        Ok(bits) => bits,
        Err(e) => {
            tee.critical(&format!("Hardware error: {e}."));
            return;
        }
    };

    // Read and report each machine against the same sample, inside one
    // lock scope so no transition interleaves the snapshot.
    let mut pending = Vec::new();
    {
        let mut fleet = d.fleet.lock();
        for id in ids {
            let fx = fleet.apply_sample(id, bits);
            if !fx.is_empty() {
                pending.push((id, fx));
            }
            let name = fleet.machine(id).name.clone();
            let st = fleet.state(id);
            if machine_readable {
                reply_status(d, conn, st.status);
            } else {
                tee.critical(&format!("Computer {name}:"));
                tee.critical(&format!("   Status: {}", st.status));
                if st.status == Status::On {
                    if let Some(os) = st.current_os {
                        tee.critical(&format!("   OS:     {}", fleet.machine(id).os(os).name));
                    }
                }
            }
        }
    }
    for (id, fx) in pending {
        apply_sample_directives(d, id, fx);
    }
}

/// One USER frame per machine whose payload is exactly the state token.
fn reply_status(d: &Daemon, conn: wake_core::ConnId, status: Status) {
    let links = d.links.lock();
    if let Some(link) = links.get(&conn) {
        let _ = link.out_tx.send(OutFrame {
            msg: MsgType::User,
            payload: status.to_string().into_bytes(),
        });
    }
}

async fn start(d: &Arc<Daemon>, name: &str, os_name: Option<&str>, restart: bool, tee: &TeeSink) {
    let Some(id) = resolve(d, name, tee) else { return };

    let os: Option<OsIndex> = match os_name {
        None => None,
        Some(wanted) => {
            let found = d.fleet.lock().machine(id).os_by_name(wanted);
            if found.is_none() {
                tee.critical(&format!("{wanted} is not valid operating system for computer {name}"));
            }
            found
        }
    };

    let bits = match d.board.sample() {
        Ok(bits) => bits,
        Err(e) => {
            tee.critical(&format!("Hardware error: {e}."));
            return;
        }
    };
    let (prev, conn_of_machine, fx, sample_fx) = {
        let mut fleet = d.fleet.lock();
        let sample_fx = fleet.apply_sample(id, bits);
        let prev = fleet.state(id).status;
        let fx = fleet.operator(id, &Op::Start { os, restart });
        (prev, fleet.state(id).conn, fx, sample_fx)
    };
    apply_sample_directives(d, id, sample_fx);

    match prev {
        Status::Off => {} // press_button reports progress itself
        Status::Starting => {
            if restart {
                tee.info(&format!("Computer {name} is starting..."));
            } else {
                tee.info(&format!("Computer {name} is already starting."));
            }
        }
        Status::On => {
            if fx.is_empty() {
                tee.info(&format!("Computer {name} is already running."));
            } else if let Some(os) = os_name {
                tee.info(&format!("Computer {name} restart requested to {os} operating system."));
            } else {
                tee.info(&format!(
                    "Computer {name} restart requested without specifying any operating system to boot."
                ));
            }
        }
        Status::Stopping | Status::StartAfterStopped => {
            tee.info(&format!("Computer {name} is shutting down. It will be started after shutdown."));
        }
        Status::StopAfterStarted => {
            tee.info(&format!("Computer {name} is scheduled to shutdown. Canceling shutdown."));
        }
        Status::Frozen => frozen_advice(name, tee),
    }

    dispatch(d, id, conn_of_machine, fx, tee).await;
}

async fn stop(d: &Arc<Daemon>, name: &str, tee: &TeeSink) {
    let Some(id) = resolve(d, name, tee) else { return };

    let bits = match d.board.sample() {
        Ok(bits) => bits,
        Err(e) => {
            tee.critical(&format!("Hardware error: {e}."));
            return;
        }
    };
    let (prev, conn_of_machine, fx, sample_fx) = {
        let mut fleet = d.fleet.lock();
        let sample_fx = fleet.apply_sample(id, bits);
        let prev = fleet.state(id).status;
        let fx = fleet.operator(id, &Op::Stop);
        (prev, fleet.state(id).conn, fx, sample_fx)
    };
    apply_sample_directives(d, id, sample_fx);

    match prev {
        Status::Off => tee.info(&format!("Computer {name} is already powered off.")),
        Status::Starting => {
            tee.info(&format!("Computer {name} is starting. It will be stopped after booting up."));
        }
        Status::On => tee.info(&format!("Stopping computer {name}...")),
        Status::Stopping => tee.info(&format!("Computer {name} is already shutting down.")),
        Status::StartAfterStopped => {
            tee.info(&format!("Computer {name} is scheduled to start after shutdown. Cancelling start."));
        }
        Status::StopAfterStarted => {
            tee.info(&format!("Computer {name} is already scheduled to shutdown."));
        }
        Status::Frozen => frozen_advice(name, tee),
    }

    dispatch(d, id, conn_of_machine, fx, tee).await;
}

async fn kill(d: &Arc<Daemon>, name: &str, tee: &TeeSink) {
    let Some(id) = resolve(d, name, tee) else { return };

    let bits = match d.board.sample() {
        Ok(bits) => bits,
        Err(e) => {
            tee.critical(&format!("Hardware error: {e}."));
            return;
        }
    };
    let (prev, conn_of_machine, fx, sample_fx) = {
        let mut fleet = d.fleet.lock();
        let sample_fx = fleet.apply_sample(id, bits);
        let prev = fleet.state(id).status;
        let fx = fleet.operator(id, &Op::Kill);
        (prev, fleet.state(id).conn, fx, sample_fx)
    };
    apply_sample_directives(d, id, sample_fx);

    if prev == Status::Off {
        tee.info(&format!("Computer {name} is already switched off."));
        return;
    }
    dispatch(d, id, conn_of_machine, fx, tee).await;
}

async fn exec(d: &Arc<Daemon>, name: &str, argv: Vec<String>, tee: &TeeSink) {
    let Some(id) = resolve(d, name, tee) else { return };

    let bits = match d.board.sample() {
        Ok(bits) => bits,
        Err(e) => {
            tee.critical(&format!("Hardware error: {e}."));
            return;
        }
    };
    let (prev, conn_of_machine, fx, sample_fx) = {
        let mut fleet = d.fleet.lock();
        let sample_fx = fleet.apply_sample(id, bits);
        let prev = fleet.state(id).status;
        let fx = fleet.operator(id, &Op::Command { argv });
        (prev, fleet.state(id).conn, fx, sample_fx)
    };
    apply_sample_directives(d, id, sample_fx);

    if prev != Status::On {
        tee.info(&format!("Computer {name} is not in ON state (current state: {prev})."));
        return;
    }
    dispatch(d, id, conn_of_machine, fx, tee).await;
}

fn frozen_advice(name: &str, tee: &TeeSink) {
    tee.info(&format!(
        "Computer {name} is not answering and seems to be frozen.\n   \
         You might try to power it down by kill command or wait some moments\n   \
         (it might be busy installing updates during shutdown, power up, etc)."
    ));
}
