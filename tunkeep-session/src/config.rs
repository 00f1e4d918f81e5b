// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{
    client::{TunClient, TunClientParent},
    persist::{PersistScope, TunPersist},
    prop::{TUN_MTU_DEFAULT, TunProp},
    stats::TunStats,
};
use anyhow as ah;
use std::sync::Arc;
use tunkeep_conf::Config;
use tunkeep_tun::{TunSetup, TunSetupFactory};
use tunkeep_util::OptionList;

const MAX_DEV_NAME_LEN: usize = 64;
const DEFAULT_N_PARALLEL: usize = 8;
const DEFAULT_WRITE_QUEUE_LEN: usize = 64;

/// Configuration and factory for [TunClient] sessions.
///
/// One `ClientConfig` outlives all connection attempts of a client.
#[derive(Debug)]
pub struct ClientConfig {
    /// Requested interface name. Empty lets the kernel choose.
    pub dev_name: String,
    /// Number of outstanding tun reads.
    pub n_parallel: usize,
    pub write_queue_len: usize,
    pub tun_prop: TunProp,
    /// Overrides the platform's device setup.
    pub tun_setup_factory: Option<Arc<dyn TunSetupFactory>>,
    /// Long-term store. `None` gives each session a short-term store.
    pub tun_persist: Option<Arc<TunPersist>>,
    pub stats: Arc<TunStats>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            dev_name: String::new(),
            n_parallel: DEFAULT_N_PARALLEL,
            write_queue_len: DEFAULT_WRITE_QUEUE_LEN,
            tun_prop: TunProp::default(),
            tun_setup_factory: None,
            tun_persist: None,
            stats: Arc::new(TunStats::new()),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Default::default()
    }

    /// Build from the `[tun]` section of a configuration file.
    pub fn from_config(conf: &Config) -> Self {
        let tun = conf.tun();
        Self {
            dev_name: tun.dev().unwrap_or_default().to_string(),
            n_parallel: tun.n_parallel(),
            write_queue_len: tun.write_queue_len(),
            tun_prop: TunProp {
                layer: tun.layer(),
                mtu: tun.mtu().unwrap_or(0),
                remote_bypass: tun.remote_bypass(),
            },
            tun_persist: tun
                .persist()
                .then(|| Arc::new(TunPersist::new(PersistScope::LongTerm))),
            ..Default::default()
        }
    }

    /// Fill in defaults and take the device name from `opt` if none is configured.
    pub fn load(&mut self, opt: &OptionList) -> ah::Result<()> {
        if self.tun_prop.mtu == 0 {
            self.tun_prop.mtu = TUN_MTU_DEFAULT;
        }
        if self.dev_name.is_empty() {
            if let Some(dev) = opt.get_ptr("dev") {
                self.dev_name = dev.get(1, MAX_DEV_NAME_LEN)?.to_string();
            }
        }
        Ok(())
    }

    /// Create the device setup for one establishment.
    pub fn new_setup_obj(&self) -> ah::Result<Arc<dyn TunSetup>> {
        match &self.tun_setup_factory {
            Some(factory) => Ok(factory.new_setup_obj()),
            None => platform_setup_obj(),
        }
    }

    /// Create a session controller.
    pub fn new_tun_client_obj(self: &Arc<Self>, parent: Arc<dyn TunClientParent>) -> TunClient {
        TunClient::new(Arc::clone(self), parent)
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn platform_setup_obj() -> ah::Result<Arc<dyn TunSetup>> {
    Ok(Arc::new(tunkeep_tun::LinuxSetup::new()))
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn platform_setup_obj() -> ah::Result<Arc<dyn TunSetup>> {
    Err(ah::format_err!("TUN is only supported on Linux."))
}


// vim: ts=4 sw=4 expandtab
