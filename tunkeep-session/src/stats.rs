// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::atomic::{AtomicU64, Ordering::Relaxed};

/// Tun traffic counters, shared by all sessions of one client.
#[derive(Debug, Default)]
pub struct TunStats {
    read_packets: AtomicU64,
    read_bytes: AtomicU64,
    write_packets: AtomicU64,
    write_bytes: AtomicU64,
    write_dropped: AtomicU64,
    errors: AtomicU64,
}

impl TunStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_read(&self, len: usize) {
        self.read_packets.fetch_add(1, Relaxed);
        self.read_bytes.fetch_add(len as u64, Relaxed);
    }

    pub fn record_write(&self, len: usize) {
        self.write_packets.fetch_add(1, Relaxed);
        self.write_bytes.fetch_add(len as u64, Relaxed);
    }

    pub fn record_write_dropped(&self) {
        self.write_dropped.fetch_add(1, Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Relaxed);
    }

    pub fn read_packets(&self) -> u64 {
        self.read_packets.load(Relaxed)
    }

    pub fn read_bytes(&self) -> u64 {
        self.read_bytes.load(Relaxed)
    }

    pub fn write_packets(&self) -> u64 {
        self.write_packets.load(Relaxed)
    }

    pub fn write_bytes(&self) -> u64 {
        self.write_bytes.load(Relaxed)
    }

    pub fn write_dropped(&self) -> u64 {
        self.write_dropped.load(Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Relaxed)
    }
}

impl std::fmt::Display for TunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rx {} pkts / {} bytes, tx {} pkts / {} bytes, tx dropped {}, errors {}",
            self.read_packets(),
            self.read_bytes(),
            self.write_packets(),
            self.write_bytes(),
            self.write_dropped(),
            self.errors(),
        )
    }
}

// vim: ts=4 sw=4 expandtab
