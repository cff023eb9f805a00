// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The machine fleet and the procedures that drive it.
//!
//! `Fleet` bundles the registry with per-machine runtime state; all state
//! mutation goes through its methods while the caller holds the fleet lock.
//! Every sample-decide-drive region is synchronous under that lock, so no
//! suspension point can interleave another decision.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error};

use wake_core::{
    transition, ConnId, Directive, Machine, MachineId, MachineState, Op, Registry, Status,
};
use wake_wire::{DaemonMsg, MsgType};

use crate::board::BoardError;
use crate::lifecycle::Daemon;
use crate::listener::OutFrame;
use crate::logfan::{FileSink, LogSink};

/// Registry plus per-machine runtime state.
pub struct Fleet {
    registry: Registry,
    states: Vec<MachineState>,
}

impl Fleet {
    pub fn new(registry: Registry) -> Self {
        let states = registry.ids().map(|_| MachineState::new()).collect();
        Self { registry, states }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn machine(&self, id: MachineId) -> &Machine {
        self.registry.machine(id)
    }

    pub fn state(&self, id: MachineId) -> &MachineState {
        &self.states[id.0]
    }

    pub fn state_mut(&mut self, id: MachineId) -> &mut MachineState {
        &mut self.states[id.0]
    }

    /// Apply one sense sample to one machine.
    pub fn apply_sample(&mut self, id: MachineId, bits: u8) -> Vec<Directive> {
        transition::on_power_sample(self.registry.machine(id), &mut self.states[id.0], bits)
    }

    /// Apply an agent `Got alive` for a resolved machine.
    pub fn agent_alive(
        &mut self,
        id: MachineId,
        conn: ConnId,
        partition: &str,
        now_ms: u64,
    ) -> Vec<Directive> {
        transition::on_agent_alive(
            self.registry.machine(id),
            &mut self.states[id.0],
            conn,
            partition,
            now_ms,
        )
    }

    /// Apply an agent disconnect, but only if `conn` is still the attached
    /// connection (a superseded handler must not clobber its replacement).
    /// Returns whether the disconnect was applied.
    pub fn agent_disconnect(&mut self, id: MachineId, conn: ConnId, bits: u8) -> bool {
        let st = &mut self.states[id.0];
        if st.conn != Some(conn) {
            return false;
        }
        transition::on_agent_disconnect(self.registry.machine(id), st, bits);
        true
    }

    /// Apply an operator action.
    pub fn operator(&mut self, id: MachineId, op: &Op) -> Vec<Directive> {
        transition::on_operator(self.registry.machine(id), &mut self.states[id.0], op)
    }
}

/// Execute the directives of one transition for one machine.
///
/// `conn` is the agent connection captured while the transition ran under
/// the fleet lock; agent frames go there. Button procedures run inline and
/// report through `log`.
pub(crate) async fn dispatch(
    d: &Arc<Daemon>,
    id: MachineId,
    conn: Option<ConnId>,
    directives: Vec<Directive>,
    log: &dyn LogSink,
) {
    for directive in directives {
        match directive {
            Directive::PressButton => press_button(d, id, log).await,
            Directive::KillButton => kill_button(d, id, log).await,
            Directive::SendShutdown => send_agent(d, conn, &DaemonMsg::Shutdown),
            Directive::SendCommand(argv) => {
                let name = machine_name(d, id);
                log.info(&format!("{name}: Running command \"{}\".", argv.join(" ")));
                send_agent(d, conn, &DaemonMsg::Command { argv });
            }
            Directive::SendReboot => send_agent(d, conn, &DaemonMsg::Restart),
            Directive::DropConnection(c) => drop_connection(d, c),
        }
    }
}

/// Execute the directives a power sample may produce: connection drops and,
/// out of START_AFTER_STOPPED, a renewed button press (spawned, since the
/// sampling context is usually in the middle of something else).
pub(crate) fn apply_sample_directives(d: &Arc<Daemon>, id: MachineId, directives: Vec<Directive>) {
    for directive in directives {
        match directive {
            Directive::DropConnection(c) => drop_connection(d, c),
            Directive::PressButton => {
                let d = Arc::clone(d);
                tokio::spawn(async move {
                    press_button(&d, id, &FileSink).await;
                });
            }
            other => debug!("ignoring sample directive {:?}", other),
        }
    }
}

/// Cancel a connection handler; its teardown detaches any machine.
pub(crate) fn drop_connection(d: &Daemon, conn: ConnId) {
    if let Some(link) = d.links.lock().get(&conn) {
        link.cancel.cancel();
    }
}

fn send_agent(d: &Daemon, conn: Option<ConnId>, msg: &DaemonMsg) {
    let Some(conn) = conn else { return };
    let links = d.links.lock();
    if let Some(link) = links.get(&conn) {
        let _ = link.out_tx.send(OutFrame { msg: MsgType::Computer, payload: msg.encode() });
    }
}

fn machine_name(d: &Daemon, id: MachineId) -> String {
    d.fleet.lock().machine(id).name.clone()
}

/// Sample once and apply the edge to one machine, executing drop/press
/// directives. Returns the status after the edge.
pub(crate) fn resample(d: &Arc<Daemon>, id: MachineId) -> Result<Status, BoardError> {
    let bits = d.board.sample()?;
    let (status, fx) = {
        let mut fleet = d.fleet.lock();
        let fx = fleet.apply_sample(id, bits);
        (fleet.state(id).status, fx)
    };
    apply_sample_directives(d, id, fx);
    Ok(status)
}

/// Power-on procedure: press, 500 ms, release, 100 ms, sample; then up to
/// three more 500 ms samples while the machine still reads off.
pub(crate) async fn press_button(d: &Arc<Daemon>, id: MachineId, log: &dyn LogSink) {
    let (mask, name) = {
        let fleet = d.fleet.lock();
        (fleet.machine(id).power_mask, fleet.machine(id).name.clone())
    };

    log.info(&format!("Starting computer {name}..."));
    if let Err(e) = d.board.press(mask) {
        log.critical(&format!("Hardware error: {e}."));
        return;
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    let released = d.board.release(mask);
    tokio::time::sleep(Duration::from_millis(100)).await;
    if let Err(e) = released {
        log.critical(&format!("Hardware error: {e}."));
        return;
    }

    let mut status = match resample(d, id) {
        Ok(s) => s,
        Err(e) => {
            log.critical(&format!("Hardware error: {e}."));
            return;
        }
    };
    for _ in 0..3 {
        if status != Status::Off {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        status = match resample(d, id) {
            Ok(s) => s,
            Err(e) => {
                log.critical(&format!("Hardware error: {e}."));
                return;
            }
        };
    }

    match status {
        Status::Off => log.critical(&format!("Failed to start computer {name}.")),
        Status::Starting => log.critical(&format!("Computer {name} successfully started.")),
        other => log.critical(&format!(
            "Computer {name} successfully started (state: {other})."
        )),
    }
}

/// Forced power-off: hold the button, sampling every 500 ms for up to 6 s,
/// stop as soon as the machine reads powered off, always release.
pub(crate) async fn kill_button(d: &Arc<Daemon>, id: MachineId, log: &dyn LogSink) {
    let (mask, name) = {
        let mut fleet = d.fleet.lock();
        // A kill cancels any pending deferred start.
        if fleet.state(id).status == Status::StartAfterStopped {
            fleet.state_mut(id).status = Status::Stopping;
        }
        (fleet.machine(id).power_mask, fleet.machine(id).name.clone())
    };

    log.info(&format!("Forcefully shutting down computer {name}..."));
    if let Err(e) = d.board.press(mask) {
        log.critical(&format!("Hardware error: {e}."));
        return;
    }

    let mut held_ms = 0u64;
    let mut hw_error = None;
    while held_ms < 6_000 {
        tokio::time::sleep(Duration::from_millis(500)).await;
        held_ms += 500;
        match resample(d, id) {
            Ok(Status::Off) => break,
            Ok(_) => {}
            Err(e) => {
                hw_error = Some(e);
                break;
            }
        }
    }

    if let Err(e) = d.board.release(mask) {
        log.critical(&format!("Hardware error: {e}."));
        return;
    }
    if let Some(e) = hw_error {
        log.critical(&format!("Hardware error: {e}."));
        return;
    }

    match resample(d, id) {
        Ok(Status::Off) => log.critical(&format!(
            "Computer {name} successfully powered off (in {:.1} seconds).",
            held_ms as f64 / 1000.0
        )),
        Ok(other) => log.critical(&format!(
            "Failed to forcefully power off computer {name}.\n   Computer left in the state: {other}."
        )),
        Err(e) => log.critical(&format!("Hardware error: {e}.")),
    }
}

/// Background task advancing machines parked in START_AFTER_STOPPED: once
/// their power drops, the button is pressed again. This is the only
/// periodic sampler; all other samples are taken on demand.
pub fn spawn_power_watch(d: Arc<Daemon>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = crate::env::power_watch_interval();
        let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            let waiting: Vec<MachineId> = {
                let fleet = d.fleet.lock();
                fleet
                    .registry()
                    .ids()
                    .filter(|id| fleet.state(*id).status == Status::StartAfterStopped)
                    .collect()
            };
            if waiting.is_empty() {
                continue;
            }
            let bits = match d.board.sample() {
                Ok(bits) => bits,
                Err(e) => {
                    error!("power watch: {e}");
                    continue;
                }
            };
            let applied: Vec<(MachineId, Vec<Directive>)> = {
                let mut fleet = d.fleet.lock();
                waiting.into_iter().map(|id| (id, fleet.apply_sample(id, bits))).collect()
            };
            for (id, fx) in applied {
                apply_sample_directives(&d, id, fx);
            }
        }
    })
}

#[cfg(test)]
#[path = "fleet_tests.rs"]
mod tests;
