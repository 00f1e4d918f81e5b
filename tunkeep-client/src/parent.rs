// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::systemd::systemd_notify_ready;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering::Relaxed};
use tokio::sync::mpsc;
use tunkeep_session::{TunClientParent, TunErrorKind};

/// Session outcome forwarded to the main loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Error(TunErrorKind),
}

/// Session parent of the daemon.
///
/// There is no transport to forward packets to, so received packets are only counted.
#[derive(Debug)]
pub struct ClientParent {
    events: mpsc::UnboundedSender<SessionEvent>,
    notified: AtomicBool,
    rx_packets: AtomicU64,
}

impl ClientParent {
    pub fn new(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            events,
            notified: AtomicBool::new(false),
            rx_packets: AtomicU64::new(0),
        }
    }

    pub fn rx_packets(&self) -> u64 {
        self.rx_packets.load(Relaxed)
    }

    fn send(&self, ev: SessionEvent) {
        if self.events.send(ev).is_err() {
            log::debug!("Session event dropped. Main loop is gone.");
        }
    }
}

impl TunClientParent for ClientParent {
    fn tun_pre_tun_config(&self) {
        log::debug!("Configuring a new tun interface.");
    }

    fn tun_connected(&self) {
        if !self.notified.swap(true, Relaxed) {
            if let Err(e) = systemd_notify_ready() {
                log::warn!("Systemd notify failed: {e:#}");
            }
        }
        self.send(SessionEvent::Connected);
    }

    fn tun_error(&self, kind: TunErrorKind, detail: &str) {
        log::error!("Tun session failed: {kind}: {detail}");
        self.send(SessionEvent::Error(kind));
    }

    fn tun_recv(&self, buf: Vec<u8>) {
        let count = self.rx_packets.fetch_add(1, Relaxed) + 1;
        log::trace!("Tun packet #{count}: {} bytes", buf.len());
    }
}


// vim: ts=4 sw=4 expandtab
