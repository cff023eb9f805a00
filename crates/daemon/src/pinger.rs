// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ping scheduler.
//!
//! A single long-lived task that, every ping period, injects a
//! `PingSchedule` event into the connection of every ON machine. The
//! scheduler never touches the network itself; the connection handlers own
//! the actual ping exchange and its timeout decision.

use std::sync::Arc;

use tokio::task::JoinHandle;

use wake_core::{ConnId, Status};

use crate::lifecycle::Daemon;
use crate::listener::ControlEvent;

pub fn spawn(d: Arc<Daemon>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = crate::env::ping_interval();
        let mut tick = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            let now = d.clock_ms();

            // Iterate machines, binding each one explicitly, and collect the
            // connections of those currently ON.
            let targets: Vec<ConnId> = {
                let fleet = d.fleet.lock();
                fleet
                    .registry()
                    .ids()
                    .filter_map(|id| {
                        let machine_state = fleet.state(id);
                        if machine_state.status == Status::On {
                            machine_state.conn
                        } else {
                            None
                        }
                    })
                    .collect()
            };

            let links = d.links.lock();
            for conn in targets {
                if let Some(link) = links.get(&conn) {
                    let _ = link.ctrl_tx.send(ControlEvent::PingSchedule(now));
                }
            }
        }
    })
}
