// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (C) 2025 Michael Büsch <m@bues.ch>

#![forbid(unsafe_code)]

use anyhow::{self as ah, Context as _, format_err as err};
use serde::Deserialize;
use std::path::Path;
use tunkeep_util::{Layer, OptionList};

pub const MTU_MIN: u32 = 576;
pub const MTU_MAX: u32 = 65535;
const N_PARALLEL_MAX: usize = 256;

const DEFAULT_N_PARALLEL: usize = 8;
const DEFAULT_WRITE_QUEUE_LEN: usize = 64;

fn default_layer() -> String {
    "tun".to_string()
}

fn default_n_parallel() -> usize {
    DEFAULT_N_PARALLEL
}

fn default_write_queue_len() -> usize {
    DEFAULT_WRITE_QUEUE_LEN
}

fn default_true() -> bool {
    true
}

/// The `[tun]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigTun {
    dev: Option<String>,
    #[serde(default = "default_layer")]
    layer: String,
    mtu: Option<u32>,
    #[serde(default = "default_n_parallel")]
    n_parallel: usize,
    #[serde(default = "default_write_queue_len")]
    write_queue_len: usize,
    #[serde(default)]
    persist: bool,
    #[serde(default = "default_true")]
    remote_bypass: bool,
}

impl Default for ConfigTun {
    fn default() -> Self {
        Self {
            dev: None,
            layer: default_layer(),
            mtu: None,
            n_parallel: default_n_parallel(),
            write_queue_len: default_write_queue_len(),
            persist: false,
            remote_bypass: true,
        }
    }
}

impl ConfigTun {
    /// Tun interface name, if configured.
    pub fn dev(&self) -> Option<&str> {
        self.dev.as_deref()
    }

    pub fn layer(&self) -> Layer {
        self.layer.parse().expect("Layer checked")
    }

    /// Default MTU, if configured.
    pub fn mtu(&self) -> Option<u32> {
        self.mtu
    }

    /// Number of parallel outstanding tun reads.
    pub fn n_parallel(&self) -> usize {
        self.n_parallel
    }

    /// Length of the tun write queue.
    pub fn write_queue_len(&self) -> usize {
        self.write_queue_len
    }

    /// Keep the tun interface alive across reconnects.
    pub fn persist(&self) -> bool {
        self.persist
    }

    /// Route the server address around the tunnel.
    pub fn remote_bypass(&self) -> bool {
        self.remote_bypass
    }

    fn check(&self) -> ah::Result<()> {
        if let Some(dev) = &self.dev {
            if dev.is_empty() || dev.len() > 15 {
                return Err(err!("[tun] dev = '{dev}' must have 1 to 15 characters."));
            }
        }
        self.layer
            .parse::<Layer>()
            .context("[tun] layer is invalid")?;
        if let Some(mtu) = self.mtu {
            if !(MTU_MIN..=MTU_MAX).contains(&mtu) {
                return Err(err!(
                    "[tun] mtu = {mtu} is out of range {MTU_MIN}..={MTU_MAX}."
                ));
            }
        }
        if !(1..=N_PARALLEL_MAX).contains(&self.n_parallel) {
            return Err(err!(
                "[tun] n-parallel = {} is out of range 1..={N_PARALLEL_MAX}.",
                self.n_parallel
            ));
        }
        if self.write_queue_len == 0 {
            return Err(err!("[tun] write-queue-len must not be zero."));
        }
        Ok(())
    }
}

/// The `[push]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPush {
    #[serde(default)]
    options: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    tun: ConfigTun,
    #[serde(default)]
    push: ConfigPush,
}

impl Config {
    pub fn new_parse_file(path: &Path) -> ah::Result<Self> {
        let data = std::fs::read_to_string(path).context("Read configuration file")?;
        Self::new_parse_str(&data)
    }

    pub fn new_parse_str(data: &str) -> ah::Result<Self> {
        let this: Self = toml::from_str(data).context("Parse configuration file")?;
        this.check()?;
        Ok(this)
    }

    fn check(&self) -> ah::Result<()> {
        self.tun.check()?;
        self.push_options().context("[push] options are invalid")?;
        Ok(())
    }

    pub fn tun(&self) -> &ConfigTun {
        &self.tun
    }

    /// The statically configured option list that stands in for server pushed options.
    pub fn push_options(&self) -> ah::Result<OptionList> {
        self.push.options.parse()
    }
}


// vim: ts=4 sw=4 expandtab
