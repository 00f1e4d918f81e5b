// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{SetupConfig, TunCapture, TunDevice, TunSetup};
use anyhow::{self as ah, Context as _, format_err as err};
use async_trait::async_trait;
use std::sync::{Arc, Mutex as StdMutex};
use tokio_tun::Tun;
use tunkeep_util::Layer;

/// Tun interface created via `/dev/net/tun`.
pub struct LinuxTun {
    tun: Tun,
}

#[async_trait]
impl TunDevice for LinuxTun {
    async fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.tun.recv(buf).await
    }

    async fn send(&self, buf: &[u8]) -> std::io::Result<usize> {
        self.tun.send(buf).await
    }

    fn name(&self) -> &str {
        self.tun.name()
    }
}

impl std::fmt::Debug for LinuxTun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "LinuxTun({})", self.tun.name())
    }
}

/// Device setup for Linux.
///
/// Only the interface itself and its IPv4 address are configured here.
/// The interface disappears when the last handle to it is closed.
#[derive(Debug, Default)]
pub struct LinuxSetup {
    iface_name: StdMutex<Option<String>>,
}

impl LinuxSetup {
    pub fn new() -> Self {
        Default::default()
    }
}

#[async_trait]
impl TunSetup for LinuxSetup {
    async fn establish(
        &self,
        capture: &TunCapture,
        conf: &SetupConfig,
    ) -> ah::Result<Arc<dyn TunDevice>> {
        if conf.layer != Layer::L3 || capture.layer != Layer::L3 {
            return Err(err!("TAP interfaces are not supported on Linux."));
        }
        let mtu = i32::try_from(capture.mtu).context("Tun MTU is out of range")?;

        // A bare device type lets the kernel pick the next free tunN.
        let name = match conf.dev_name.as_str() {
            "" | "tun" => "tun%d",
            name => name,
        };

        let mut builder = Tun::builder().name(name).mtu(mtu).up();
        if let Some(net) = &capture.tunnel_address_ipv4 {
            builder = builder.address(net.addr()).netmask(net.netmask());
        }
        let tun: Tun = builder
            .build()
            .context("Create tun interface (build)")?
            .pop()
            .context("Create tun interface (pop)")?;
        log::info!("Tun interface: {}", tun.name());

        if capture.tunnel_address_ipv6.is_some() || !capture.routes.is_empty() {
            log::warn!(
                "{}: IPv6 addresses and routes are left to the system network configuration.",
                tun.name()
            );
        }
        if conf.add_bypass_routes_on_establish {
            if let Some(remote) = capture.remote.filter(|r| r.bypass) {
                log::debug!("{}: Server {} bypasses the tunnel.", tun.name(), remote.address);
            }
        }

        *self.iface_name.lock().expect("Mutex poisoned") = Some(tun.name().to_string());
        Ok(Arc::new(LinuxTun { tun }))
    }

    fn destroy(&self) -> ah::Result<()> {
        if let Some(name) = self.iface_name.lock().expect("Mutex poisoned").take() {
            log::info!("{name}: Tun setup destroyed.");
        }
        Ok(())
    }
}

// vim: ts=4 sw=4 expandtab
