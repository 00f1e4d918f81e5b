// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::{self as ah, format_err as err};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Network parameters of an established tun interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunState {
    pub vpn_ip4_addr: Option<Ipv4Addr>,
    pub vpn_ip6_addr: Option<Ipv6Addr>,
    pub vpn_ip4_gw: Option<Ipv4Addr>,
    pub vpn_ip6_gw: Option<Ipv6Addr>,
    pub mtu: u32,
    pub iface_name: String,
}

fn specified<T: ToString>(addr: Option<T>) -> String {
    addr.map(|a| a.to_string()).unwrap_or_default()
}

impl TunState {
    pub fn new() -> Self {
        Default::default()
    }

    /// Rebuild a state from a persisted record and check it.
    pub fn reconstruct(persisted: &TunState) -> ah::Result<Self> {
        let state = TunState {
            vpn_ip4_addr: persisted.vpn_ip4_addr.filter(|a| !a.is_unspecified()),
            vpn_ip6_addr: persisted.vpn_ip6_addr.filter(|a| !a.is_unspecified()),
            vpn_ip4_gw: persisted.vpn_ip4_gw.filter(|a| !a.is_unspecified()),
            vpn_ip6_gw: persisted.vpn_ip6_gw.filter(|a| !a.is_unspecified()),
            mtu: persisted.mtu,
            iface_name: persisted.iface_name.clone(),
        };
        state.validate()?;
        Ok(state)
    }

    /// Check the invariants of a connected interface.
    pub fn validate(&self) -> ah::Result<()> {
        if self.iface_name.is_empty() {
            return Err(err!("Tun interface name is empty."));
        }
        if self.mtu == 0 {
            return Err(err!("Tun MTU is zero."));
        }
        Ok(())
    }

    pub fn vpn_ip4(&self) -> String {
        specified(self.vpn_ip4_addr)
    }

    pub fn vpn_ip6(&self) -> String {
        specified(self.vpn_ip6_addr)
    }

    pub fn vpn_gw4(&self) -> String {
        specified(self.vpn_ip4_gw)
    }

    pub fn vpn_gw6(&self) -> String {
        specified(self.vpn_ip6_gw)
    }
}


// vim: ts=4 sw=4 expandtab
