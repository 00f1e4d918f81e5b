// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (C) 2025 Michael Büsch <m@bues.ch>

use crate::{
    client::{TransportClient, TunClientParent},
    error::TunErrorKind,
};
use anyhow::{self as ah, format_err as err};
use async_trait::async_trait;
use std::{
    collections::VecDeque,
    io,
    net::IpAddr,
    sync::{
        Arc, Mutex as StdMutex,
        atomic::{AtomicBool, Ordering::Relaxed},
    },
};
use tokio::sync::Notify;
use tunkeep_tun::{SetupConfig, TunCapture, TunDevice, TunSetup, TunSetupFactory};

#[derive(Debug)]
enum RxItem {
    Packet(Vec<u8>),
    Error(io::ErrorKind),
}

/// In-memory tun device.
#[derive(Debug)]
pub struct MockTun {
    name: String,
    rx: StdMutex<VecDeque<RxItem>>,
    rx_notify: Notify,
    tx: StdMutex<Vec<Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MockTun {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            rx: StdMutex::new(VecDeque::new()),
            rx_notify: Notify::new(),
            tx: StdMutex::new(vec![]),
            fail_writes: AtomicBool::new(false),
        })
    }

    fn push_rx(&self, item: RxItem) {
        self.rx.lock().expect("Mutex poisoned").push_back(item);
        self.rx_notify.notify_one();
    }

    /// Make the next read return `pkt`. An empty packet is end of stream.
    pub fn inject(&self, pkt: &[u8]) {
        self.push_rx(RxItem::Packet(pkt.to_vec()));
    }

    pub fn inject_error(&self, kind: io::ErrorKind) {
        self.push_rx(RxItem::Error(kind));
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Relaxed);
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.tx.lock().expect("Mutex poisoned").clone()
    }
}

#[async_trait]
impl TunDevice for MockTun {
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let item = self.rx.lock().expect("Mutex poisoned").pop_front();
            match item {
                Some(RxItem::Packet(pkt)) => {
                    let len = pkt.len().min(buf.len());
                    buf[..len].copy_from_slice(&pkt[..len]);
                    return Ok(len);
                }
                Some(RxItem::Error(kind)) => return Err(kind.into()),
                None => self.rx_notify.notified().await,
            }
        }
    }

    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_writes.load(Relaxed) {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        self.tx.lock().expect("Mutex poisoned").push(buf.to_vec());
        Ok(buf.len())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupEvent {
    Establish,
    Destroy,
}

#[derive(Debug, Default)]
struct MockSetupLog {
    events: StdMutex<Vec<SetupEvent>>,
    devices: StdMutex<Vec<Arc<MockTun>>>,
    captures: StdMutex<Vec<TunCapture>>,
    fail: AtomicBool,
}

#[derive(Debug)]
struct MockSetup {
    name: String,
    log: Arc<MockSetupLog>,
}

#[async_trait]
impl TunSetup for MockSetup {
    async fn establish(
        &self,
        capture: &TunCapture,
        _conf: &SetupConfig,
    ) -> ah::Result<Arc<dyn TunDevice>> {
        if self.log.fail.load(Relaxed) {
            return Err(err!("Mock establish failed"));
        }
        let dev = MockTun::new(&self.name);
        self.log
            .events
            .lock()
            .expect("Mutex poisoned")
            .push(SetupEvent::Establish);
        self.log
            .captures
            .lock()
            .expect("Mutex poisoned")
            .push(capture.clone());
        self.log
            .devices
            .lock()
            .expect("Mutex poisoned")
            .push(Arc::clone(&dev));
        Ok(dev)
    }

    fn destroy(&self) -> ah::Result<()> {
        self.log
            .events
            .lock()
            .expect("Mutex poisoned")
            .push(SetupEvent::Destroy);
        Ok(())
    }
}

/// Records every establish and destroy of the setups it creates.
#[derive(Debug)]
pub struct MockSetupFactory {
    name: String,
    log: Arc<MockSetupLog>,
}

impl MockSetupFactory {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            log: Default::default(),
        })
    }

    pub fn set_fail(&self, fail: bool) {
        self.log.fail.store(fail, Relaxed);
    }

    pub fn events(&self) -> Vec<SetupEvent> {
        self.log.events.lock().expect("Mutex poisoned").clone()
    }

    pub fn establish_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == SetupEvent::Establish)
            .count()
    }

    pub fn last_device(&self) -> Arc<MockTun> {
        Arc::clone(
            self.log
                .devices
                .lock()
                .expect("Mutex poisoned")
                .last()
                .expect("No device established"),
        )
    }

    pub fn last_capture(&self) -> TunCapture {
        self.log
            .captures
            .lock()
            .expect("Mutex poisoned")
            .last()
            .cloned()
            .expect("No device established")
    }
}

impl TunSetupFactory for MockSetupFactory {
    fn new_setup_obj(&self) -> Arc<dyn TunSetup> {
        Arc::new(MockSetup {
            name: self.name.clone(),
            log: Arc::clone(&self.log),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentEvent {
    PreTunConfig,
    Connected,
    Error(TunErrorKind, String),
    Recv(Vec<u8>),
}

/// Records every notification.
#[derive(Debug, Default)]
pub struct MockParent {
    events: StdMutex<Vec<ParentEvent>>,
}

impl MockParent {
    pub fn new() -> Arc<Self> {
        Default::default()
    }

    pub fn events(&self) -> Vec<ParentEvent> {
        self.events.lock().expect("Mutex poisoned").clone()
    }

    pub fn received(&self) -> Vec<Vec<u8>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ParentEvent::Recv(pkt) => Some(pkt),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<TunErrorKind> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ParentEvent::Error(kind, _) => Some(kind),
                _ => None,
            })
            .collect()
    }

    fn push(&self, ev: ParentEvent) {
        self.events.lock().expect("Mutex poisoned").push(ev);
    }
}

impl TunClientParent for MockParent {
    fn tun_pre_tun_config(&self) {
        self.push(ParentEvent::PreTunConfig);
    }

    fn tun_connected(&self) {
        self.push(ParentEvent::Connected);
    }

    fn tun_error(&self, kind: TunErrorKind, detail: &str) {
        self.push(ParentEvent::Error(kind, detail.to_string()));
    }

    fn tun_recv(&self, buf: Vec<u8>) {
        self.push(ParentEvent::Recv(buf));
    }
}

#[derive(Debug)]
pub struct MockTransport {
    addr: IpAddr,
}

impl MockTransport {
    pub fn new(addr: &str) -> Arc<Self> {
        Arc::new(Self {
            addr: addr.parse().expect("Invalid address"),
        })
    }
}

impl TransportClient for MockTransport {
    fn server_endpoint_addr(&self) -> IpAddr {
        self.addr
    }
}

// vim: ts=4 sw=4 expandtab
