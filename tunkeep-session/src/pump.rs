// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{error::TunErrorKind, packet::PacketFrom, stats::TunStats};
use anyhow as ah;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinSet,
};
use tunkeep_tun::TunDevice;
use tunkeep_util::EndOfStreamError;

/// Receive buffer space on top of the MTU.
const FRAME_HEADROOM: usize = 256;

/// Result of one asynchronous tun operation.
#[derive(Debug)]
pub enum TunIoEvent {
    Packet(Box<PacketFrom>),
    Error {
        kind: TunErrorKind,
        error: ah::Error,
    },
}

/// A [TunIoEvent] tagged with the pump that produced it.
#[derive(Debug)]
pub struct TunIoCompletion {
    pub generation: u64,
    pub event: TunIoEvent,
}

#[derive(Debug)]
struct IoShared {
    generation: u64,
    device: Arc<dyn TunDevice>,
    frame_len: usize,
    halt: AtomicBool,
    stats: Arc<TunStats>,
}

impl IoShared {
    fn halted(&self) -> bool {
        self.halt.load(Ordering::Acquire)
    }

    async fn post(&self, events: &mpsc::Sender<TunIoCompletion>, event: TunIoEvent) -> bool {
        events
            .send(TunIoCompletion {
                generation: self.generation,
                event,
            })
            .await
            .is_ok()
    }
}

/// Packet pump of one tun device.
///
/// Keeps `n_parallel` reads outstanding and serializes writes through a bounded queue.
/// All completions are posted to the session controller's event queue.
#[derive(Debug)]
pub struct TunIo {
    name: String,
    shared: Arc<IoShared>,
    tasks: JoinSet<()>,
    write_tx: Option<mpsc::Sender<Vec<u8>>>,
}

impl TunIo {
    pub fn new(
        device: Arc<dyn TunDevice>,
        name: String,
        generation: u64,
        mtu: u32,
        stats: Arc<TunStats>,
    ) -> Self {
        Self {
            name,
            shared: Arc::new(IoShared {
                generation,
                device,
                frame_len: mtu as usize + FRAME_HEADROOM,
                halt: AtomicBool::new(false),
                stats,
            }),
            tasks: JoinSet::new(),
            write_tx: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation
    }

    /// Launch the readers and the writer.
    pub fn start(
        &mut self,
        n_parallel: usize,
        write_queue_len: usize,
        events: mpsc::Sender<TunIoCompletion>,
    ) {
        if !self.tasks.is_empty() || self.shared.halted() {
            return;
        }
        let n_parallel = n_parallel.max(1);
        log::debug!(
            "{}: Starting tun I/O with {n_parallel} parallel reads.",
            self.name
        );

        for _ in 0..n_parallel {
            self.tasks
                .spawn(read_loop(Arc::clone(&self.shared), events.clone()));
        }

        let (write_tx, write_rx) = mpsc::channel(write_queue_len.max(1));
        self.tasks
            .spawn(write_loop(Arc::clone(&self.shared), write_rx, events));
        self.write_tx = Some(write_tx);
    }

    /// Queue one packet for the device.
    ///
    /// Returns false if the pump is halted or the write queue is full.
    pub fn write(&self, buf: &[u8]) -> bool {
        if self.shared.halted() {
            return false;
        }
        let Some(write_tx) = &self.write_tx else {
            return false;
        };
        match write_tx.try_send(buf.to_vec()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.shared.stats.record_write_dropped();
                log::trace!("{}: Tun write queue is full. Dropping packet.", self.name);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Halt and wait until no task can post another completion.
    pub async fn stop(&mut self) {
        self.shared.halt.store(true, Ordering::Release);
        self.write_tx = None;
        self.tasks.shutdown().await;
        log::debug!("{}: Tun I/O stopped.", self.name);
    }
}

impl Drop for TunIo {
    fn drop(&mut self) {
        self.shared.halt.store(true, Ordering::Release);
    }
}

async fn read_loop(shared: Arc<IoShared>, events: mpsc::Sender<TunIoCompletion>) {
    while !shared.halted() {
        let mut pfp = PacketFrom::new(shared.frame_len);
        let event = match shared.device.recv(&mut pfp.buf).await {
            Ok(0) => TunIoEvent::Error {
                kind: TunErrorKind::EndOfStream,
                error: EndOfStreamError.into(),
            },
            Ok(len) => {
                pfp.truncate(len);
                shared.stats.record_read(len);
                TunIoEvent::Packet(pfp)
            }
            Err(e) => TunIoEvent::Error {
                kind: TunErrorKind::ReadError,
                error: ah::Error::new(e).context("Tun read"),
            },
        };
        if shared.halted() {
            break;
        }
        let fatal = matches!(event, TunIoEvent::Error { .. });
        if fatal {
            shared.stats.record_error();
        }
        if !shared.post(&events, event).await || fatal {
            break;
        }
    }
}

async fn write_loop(
    shared: Arc<IoShared>,
    mut write_rx: mpsc::Receiver<Vec<u8>>,
    events: mpsc::Sender<TunIoCompletion>,
) {
    while let Some(buf) = write_rx.recv().await {
        if shared.halted() {
            break;
        }
        match shared.device.send(&buf).await {
            Ok(len) => shared.stats.record_write(len),
            Err(e) => {
                shared.stats.record_error();
                if !shared.halted() {
                    let event = TunIoEvent::Error {
                        kind: TunErrorKind::WriteError,
                        error: ah::Error::new(e).context("Tun write"),
                    };
                    shared.post(&events, event).await;
                }
                break;
            }
        }
    }
}


// vim: ts=4 sw=4 expandtab
