// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent attach: the `Got alive` handshake.

use std::sync::Arc;

use tracing::info;

use wake_core::{ConnId, MachineId};

use crate::fleet::{apply_sample_directives, dispatch};
use crate::lifecycle::Daemon;
use crate::logfan::{LogSink, TeeSink};

/// Attach an announcing agent to its machine.
///
/// Returns the machine id on success; `None` means the connection must be
/// closed (unregistered machine, or the board failed while classifying).
pub(super) async fn handle_got_alive(
    d: &Arc<Daemon>,
    conn: ConnId,
    machine_name: &str,
    platform: &str,
    partition: &str,
    tee: &TeeSink,
) -> Option<MachineId> {
    let Some(id) = d.fleet.lock().registry().find(machine_name) else {
        tee.critical(&format!(
            "Computer {machine_name} attempts to announce it is alive,\n   \
             but it is not a registered computer."
        ));
        return None;
    };

    let bits = match d.board.sample() {
        Ok(bits) => bits,
        Err(e) => {
            tee.critical(&format!("Hardware error: {e}."));
            return None;
        }
    };

    let now = d.clock_ms();
    let (fx, sample_fx, name, wired, powered, known_os) = {
        let mut fleet = d.fleet.lock();
        let sample_fx = fleet.apply_sample(id, bits);
        let machine = fleet.machine(id);
        let name = machine.name.clone();
        let wired = machine.is_wired();
        let powered = bits & machine.power_mask != 0;
        let known_os = machine.os_by_partition(partition).is_some();
        let fx = fleet.agent_alive(id, conn, partition, now);
        (fx, sample_fx, name, wired, powered, known_os)
    };
    apply_sample_directives(d, id, sample_fx);

    info!("Computer {name} got alive (system: {platform}, partition: {partition}).");
    if !known_os {
        tee.error(&format!("{name}: Unknown current operating system. Please update the machine configuration."));
    }
    if wired && !powered {
        tee.error(&format!(
            "Error: Computer {name} established connection\n   \
             while no power signal is detected. Check your wiring."
        ));
    } else if !wired {
        tee.info(&format!(
            "Computer {name} is not connected by wires to detect its power on/off state.\n   \
             The functionality of wake might be limited on this computer."
        ));
    }

    dispatch(d, id, Some(conn), fx, tee).await;
    Some(id)
}
