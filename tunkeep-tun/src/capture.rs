// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::{
    fmt::{Display, Formatter},
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
};
use tunkeep_util::Layer;

/// Address of the VPN server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddress {
    pub address: IpAddr,
    /// Route the server address around the tunnel.
    pub bypass: bool,
}

/// Default gateway redirection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RerouteGw {
    pub ipv4: bool,
    pub ipv6: bool,
}

/// A route into the tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub net: IpNet,
    pub gateway: Option<IpAddr>,
}

/// The resolved set of properties to apply when establishing a tun device.
///
/// Two captures compare equal if a device established for one
/// can carry the other session unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunCapture {
    pub layer: Layer,
    pub mtu: u32,
    pub remote: Option<RemoteAddress>,
    pub tunnel_address_ipv4: Option<Ipv4Net>,
    pub gateway_ipv4: Option<Ipv4Addr>,
    pub tunnel_address_ipv6: Option<Ipv6Net>,
    pub gateway_ipv6: Option<Ipv6Addr>,
    pub reroute_gw: RerouteGw,
    pub routes: Vec<Route>,
    pub dns_servers: Vec<IpAddr>,
}

fn opt_display<T: Display>(v: &Option<T>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

impl Display for TunCapture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Layer: {}", self.layer)?;
        writeln!(f, "MTU: {}", self.mtu)?;
        if let Some(remote) = &self.remote {
            writeln!(
                f,
                "Remote Address: {} bypass={}",
                remote.address, remote.bypass
            )?;
        }
        writeln!(
            f,
            "Tunnel Address IPv4: {} gw={}",
            opt_display(&self.tunnel_address_ipv4),
            opt_display(&self.gateway_ipv4)
        )?;
        writeln!(
            f,
            "Tunnel Address IPv6: {} gw={}",
            opt_display(&self.tunnel_address_ipv6),
            opt_display(&self.gateway_ipv6)
        )?;
        writeln!(
            f,
            "Reroute Gateway: ipv4={} ipv6={}",
            self.reroute_gw.ipv4, self.reroute_gw.ipv6
        )?;
        for route in &self.routes {
            writeln!(f, "Route: {} gw={}", route.net, opt_display(&route.gateway))?;
        }
        for dns in &self.dns_servers {
            writeln!(f, "DNS Server: {dns}")?;
        }
        Ok(())
    }
}

// vim: ts=4 sw=4 expandtab
