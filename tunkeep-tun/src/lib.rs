// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![forbid(unsafe_code)]

mod capture;
#[cfg(any(target_os = "linux", target_os = "android"))]
mod linux;

pub use capture::{RemoteAddress, RerouteGw, Route, TunCapture};
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use linux::{LinuxSetup, LinuxTun};

use anyhow as ah;
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tunkeep_util::Layer;

/// An open tun device.
///
/// Reads and writes carry one packet each.
/// Dropping the last reference closes the device.
#[async_trait]
pub trait TunDevice: Send + Sync + Debug {
    /// Receive one packet into `buf`.
    ///
    /// Returns the packet length. Zero means end of stream.
    async fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Send one packet.
    async fn send(&self, buf: &[u8]) -> std::io::Result<usize>;

    /// Interface name assigned by the operating system.
    fn name(&self) -> &str;
}

/// Parameters for the device setup layer that are not part of the capture.
#[derive(Debug, Clone, Default)]
pub struct SetupConfig {
    pub layer: Layer,
    /// Requested interface name. Empty lets the kernel choose.
    pub dev_name: String,
    pub add_bypass_routes_on_establish: bool,
}

/// Creates and tears down tun devices.
#[async_trait]
pub trait TunSetup: Send + Sync + Debug {
    /// Create and configure a tun device as described by `capture`.
    async fn establish(
        &self,
        capture: &TunCapture,
        conf: &SetupConfig,
    ) -> ah::Result<Arc<dyn TunDevice>>;

    /// Undo everything `establish` configured outside of the device itself.
    fn destroy(&self) -> ah::Result<()>;
}

/// Produces a fresh [TunSetup] per establishment.
pub trait TunSetupFactory: Send + Sync + Debug {
    fn new_setup_obj(&self) -> Arc<dyn TunSetup>;
}

// vim: ts=4 sw=4 expandtab
