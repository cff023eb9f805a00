// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-machine state machine.
//!
//! Transitions are pure: they mutate a [`MachineState`] and return
//! [`Directive`]s describing the side effects the caller must perform. The
//! daemon executes directives (button presses, agent frames, connection
//! drops) outside this module, so every table below is testable without
//! hardware or sockets.

use crate::machine::Machine;
use crate::state::{ConnId, MachineState};
use crate::status::Status;

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Run the power-on button procedure (press, wait, release, re-sample).
    PressButton,
    /// Run the forced power-off procedure (press until power drops).
    KillButton,
    /// Send the shutdown request to the attached agent.
    SendShutdown,
    /// Send a command vector to the attached agent.
    SendCommand(Vec<String>),
    /// Ask the attached agent for an OS-appropriate reboot.
    SendReboot,
    /// Close the given agent connection.
    DropConnection(ConnId),
}

/// Operator actions evaluated against the state table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Start {
        os: Option<crate::machine::OsIndex>,
        /// `restart` variant: reboot even when already running.
        restart: bool,
    },
    Stop,
    Kill,
    Command { argv: Vec<String> },
}

/// Apply one power sample to a machine.
///
/// Must be called with a sample taken in the same critical section as any
/// decision built on the result. Machines without wiring never move on
/// power edges.
pub fn on_power_sample(machine: &Machine, st: &mut MachineState, sensed_bits: u8) -> Vec<Directive> {
    if !machine.is_wired() {
        return Vec::new();
    }
    let powered = sensed_bits & machine.power_mask != 0;
    match st.status {
        Status::Off => {
            if powered {
                st.status = Status::Starting;
            }
            Vec::new()
        }
        Status::StartAfterStopped => {
            if powered {
                return Vec::new();
            }
            // The awaited shutdown finished; push the button again.
            st.status = Status::Starting;
            vec![Directive::PressButton]
        }
        _ if !powered => {
            let mut out = Vec::new();
            if let Some(conn) = st.conn.take() {
                out.push(Directive::DropConnection(conn));
            }
            st.detach();
            st.status = Status::Off;
            st.current_os = None;
            st.requested_os = None;
            out
        }
        _ => Vec::new(),
    }
}

/// An agent announced itself for this machine with `Got alive`.
///
/// The caller has already applied a fresh power sample and resolved the
/// machine from the announced name; `partition` comes straight off the wire.
pub fn on_agent_alive(
    machine: &Machine,
    st: &mut MachineState,
    conn: ConnId,
    partition: &str,
    now_ms: u64,
) -> Vec<Directive> {
    let mut out = Vec::new();
    if let Some(old) = st.conn {
        if old != conn {
            // A newer connection supersedes a stale one.
            out.push(Directive::DropConnection(old));
        }
    }
    let current = machine.os_by_partition(partition);

    if st.status == Status::StopAfterStarted {
        st.attach(conn, now_ms);
        st.current_os = None;
        st.requested_os = None;
        st.status = Status::Stopping;
        out.push(Directive::SendShutdown);
        return out;
    }

    st.attach(conn, now_ms);
    match (st.requested_os, current) {
        (Some(req), Some(cur)) if req != cur => {
            // Boot chain towards the requested system: from the boot manager
            // we can go straight there, from anywhere else we go through it.
            let chain = if machine.is_boot_manager(cur) {
                machine.os(req).cmd_boot_to_self.clone()
            } else {
                machine.os(cur).cmd_boot_to_boot_manager.clone()
            };
            if !chain.is_empty() {
                out.push(Directive::SendCommand(chain));
            }
            out.push(Directive::SendReboot);
            st.current_os = None;
            st.status = Status::Starting;
        }
        _ => {
            st.current_os = current;
            st.requested_os = None;
            st.status = Status::On;
        }
    }
    out
}

/// The attached agent connection went away.
///
/// `sensed_bits` is a sample taken in the same critical section.
pub fn on_agent_disconnect(machine: &Machine, st: &mut MachineState, sensed_bits: u8) {
    st.detach();
    match st.status {
        Status::On | Status::Starting | Status::Stopping => {
            let powered = machine.is_wired() && sensed_bits & machine.power_mask != 0;
            if powered {
                st.status = Status::Frozen;
            } else {
                st.status = Status::Off;
                st.requested_os = None;
            }
            st.current_os = None;
        }
        _ => {}
    }
}

/// Apply an operator action.
pub fn on_operator(machine: &Machine, st: &mut MachineState, op: &Op) -> Vec<Directive> {
    match op {
        Op::Start { os, restart } => on_start(machine, st, *os, *restart),
        Op::Stop => on_stop(st),
        Op::Kill => match st.status {
            Status::Off => Vec::new(),
            _ => vec![Directive::KillButton],
        },
        Op::Command { argv } => match st.status {
            Status::On => vec![Directive::SendCommand(argv.clone())],
            _ => Vec::new(),
        },
    }
}

fn on_start(
    machine: &Machine,
    st: &mut MachineState,
    os: Option<crate::machine::OsIndex>,
    restart: bool,
) -> Vec<Directive> {
    st.requested_os = os;
    match st.status {
        Status::Off => vec![Directive::PressButton],
        Status::Starting => Vec::new(),
        Status::On => {
            let differs = match (os, st.current_os) {
                (Some(req), cur) => cur != Some(req),
                (None, _) => false,
            };
            if !restart && !differs {
                return Vec::new();
            }
            let mut out = Vec::new();
            if let (Some(req), Some(cur)) = (st.requested_os, st.current_os) {
                if req != cur {
                    let chain = if machine.is_boot_manager(cur) {
                        machine.os(req).cmd_boot_to_self.clone()
                    } else {
                        machine.os(cur).cmd_boot_to_boot_manager.clone()
                    };
                    if !chain.is_empty() {
                        out.push(Directive::SendCommand(chain));
                    }
                }
            }
            out.push(Directive::SendReboot);
            st.current_os = None;
            st.status = Status::Starting;
            out
        }
        Status::Stopping => {
            st.status = Status::StartAfterStopped;
            Vec::new()
        }
        Status::Frozen | Status::StartAfterStopped => Vec::new(),
        Status::StopAfterStarted => {
            st.status = Status::Starting;
            Vec::new()
        }
    }
}

fn on_stop(st: &mut MachineState) -> Vec<Directive> {
    match st.status {
        Status::Off | Status::Stopping | Status::Frozen | Status::StopAfterStarted => Vec::new(),
        Status::Starting => {
            st.status = Status::StopAfterStarted;
            st.requested_os = None;
            Vec::new()
        }
        Status::On => {
            st.status = Status::Stopping;
            vec![Directive::SendShutdown]
        }
        Status::StartAfterStopped => {
            st.status = Status::Stopping;
            Vec::new()
        }
    }
}

#[cfg(test)]
#[path = "transition_tests.rs"]
mod tests;
