// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::state::TunState;
use anyhow::{self as ah, Context as _, format_err as err};
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use std::{
    fmt::Display,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
    str::FromStr,
};
use tunkeep_conf::{MTU_MAX, MTU_MIN};
use tunkeep_tun::{RemoteAddress, RerouteGw, Route, TunCapture};
use tunkeep_util::{Layer, Opt, OptionList};

/// MTU used if neither the configuration nor the server set one.
pub const TUN_MTU_DEFAULT: u32 = 1500;

const MAX_ARG_LEN: usize = 256;

/// Tunnel property policy of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunProp {
    pub layer: Layer,
    /// Default MTU. Zero means unset.
    pub mtu: u32,
    /// Route the server address around the tunnel.
    pub remote_bypass: bool,
}

impl Default for TunProp {
    fn default() -> Self {
        Self {
            layer: Layer::L3,
            mtu: 0,
            remote_bypass: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Topology {
    Net30,
    P2p,
    Subnet,
}

fn parse_arg<T>(o: &Opt, index: usize) -> ah::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let s = o.get(index, MAX_ARG_LEN)?;
    s.parse::<T>()
        .map_err(|e| err!("Option '{}': Invalid argument '{s}': {e}", o.name()))
}

fn netmask_to_prefix(mask: Ipv4Addr) -> ah::Result<u8> {
    let bits = u32::from(mask);
    let prefix = bits.leading_ones();
    if bits.checked_shl(prefix).unwrap_or(0) != 0 {
        return Err(err!("Netmask {mask} is not contiguous."));
    }
    Ok(prefix as u8)
}

fn tun_mtu(config: &TunProp, opt: &OptionList) -> ah::Result<u32> {
    let mtu = match opt.get_ptr("tun-mtu") {
        Some(o) => parse_arg::<u32>(o, 1)?,
        None if config.mtu != 0 => config.mtu,
        None => TUN_MTU_DEFAULT,
    };
    if !(MTU_MIN..=MTU_MAX).contains(&mtu) {
        return Err(err!("Tun MTU {mtu} is out of range {MTU_MIN}..={MTU_MAX}."));
    }
    Ok(mtu)
}

fn topology(opt: &OptionList) -> ah::Result<Topology> {
    let Some(o) = opt.get_ptr("topology") else {
        return Ok(Topology::Net30);
    };
    match o.get(1, MAX_ARG_LEN)? {
        "net30" => Ok(Topology::Net30),
        "p2p" => Ok(Topology::P2p),
        "subnet" => Ok(Topology::Subnet),
        t => Err(err!("Unknown topology '{t}'.")),
    }
}

fn route_gateway(opt: &OptionList) -> ah::Result<Option<Ipv4Addr>> {
    let Some(o) = opt.get_ptr("route-gateway") else {
        return Ok(None);
    };
    if o.get(1, MAX_ARG_LEN)? == "dhcp" {
        return Ok(None);
    }
    Ok(Some(parse_arg(o, 1)?))
}

fn ifconfig_ipv4(
    capture: &mut TunCapture,
    opt: &OptionList,
    topology: Topology,
) -> ah::Result<()> {
    let route_gw = route_gateway(opt)?;
    let Some(o) = opt.get_ptr("ifconfig") else {
        capture.gateway_ipv4 = route_gw;
        return Ok(());
    };
    let local: Ipv4Addr = parse_arg(o, 1)?;
    let arg2: Ipv4Addr = parse_arg(o, 2)?;
    let (net, remote) = match topology {
        Topology::Subnet => (Ipv4Net::new(local, netmask_to_prefix(arg2)?)?, None),
        Topology::Net30 => (Ipv4Net::new(local, 30)?, Some(arg2)),
        Topology::P2p => (Ipv4Net::new(local, 32)?, Some(arg2)),
    };
    if remote == Some(local) {
        return Err(err!("ifconfig: Local and remote address are both {local}."));
    }
    capture.tunnel_address_ipv4 = Some(net);
    capture.gateway_ipv4 = route_gw.or(remote);
    Ok(())
}

fn ifconfig_ipv6(capture: &mut TunCapture, opt: &OptionList) -> ah::Result<()> {
    let Some(o) = opt.get_ptr("ifconfig-ipv6") else {
        return Ok(());
    };
    capture.tunnel_address_ipv6 = Some(parse_arg::<Ipv6Net>(o, 1)?);
    if o.get_optional(2, MAX_ARG_LEN)?.is_some() {
        capture.gateway_ipv6 = Some(parse_arg::<Ipv6Addr>(o, 2)?);
    }
    Ok(())
}

fn route_ipv4(capture: &TunCapture, o: &Opt) -> ah::Result<Route> {
    let network: Ipv4Addr = parse_arg(o, 1)?;
    let prefix = match o.get_optional(2, MAX_ARG_LEN)? {
        Some(_) => netmask_to_prefix(parse_arg(o, 2)?)?,
        None => 32,
    };
    let net = Ipv4Net::new(network, prefix)?;
    if net.trunc() != net {
        log::debug!("route {net}: Host bits set, using {}", net.trunc());
    }
    let gateway = match o.get_optional(3, MAX_ARG_LEN)? {
        None | Some("vpn_gateway") => capture.gateway_ipv4.map(IpAddr::V4),
        Some(_) => Some(IpAddr::V4(parse_arg(o, 3)?)),
    };
    Ok(Route {
        net: IpNet::V4(net.trunc()),
        gateway,
    })
}

fn route_ipv6(capture: &TunCapture, o: &Opt) -> ah::Result<Route> {
    let net: Ipv6Net = parse_arg(o, 1)?;
    let gateway = match o.get_optional(2, MAX_ARG_LEN)? {
        None => capture.gateway_ipv6.map(IpAddr::V6),
        Some(_) => Some(IpAddr::V6(parse_arg(o, 2)?)),
    };
    Ok(Route {
        net: IpNet::V6(net.trunc()),
        gateway,
    })
}

fn reroute_gw(opt: &OptionList) -> RerouteGw {
    let Some(o) = opt.get_ptr("redirect-gateway") else {
        return Default::default();
    };
    let mut rgw = RerouteGw {
        ipv4: true,
        ipv6: false,
    };
    for flag in o.args() {
        match flag {
            "ipv6" => rgw.ipv6 = true,
            "!ipv4" => rgw.ipv4 = false,
            _ => (),
        }
    }
    rgw
}

fn dns_servers(opt: &OptionList) -> ah::Result<Vec<IpAddr>> {
    let mut servers = vec![];
    for o in opt.get_all("dhcp-option") {
        match o.get(1, MAX_ARG_LEN)? {
            "DNS" => servers.push(IpAddr::V4(parse_arg(o, 2)?)),
            "DNS6" => servers.push(IpAddr::V6(parse_arg(o, 2)?)),
            _ => (),
        }
    }
    Ok(servers)
}

/// Derive the capture properties of a tun device from the
/// client policy, the server address and the pushed options.
///
/// If `state` is given, it is filled with the resulting
/// addresses, gateways and MTU.
pub fn configure_builder(
    state: Option<&mut TunState>,
    server_addr: IpAddr,
    config: &TunProp,
    opt: &OptionList,
) -> ah::Result<TunCapture> {
    if let Some(o) = opt.get_ptr("dev-type") {
        let layer: Layer = o.get(1, MAX_ARG_LEN)?.parse()?;
        if layer != config.layer {
            return Err(err!(
                "Pushed dev-type {layer} does not match configured {}.",
                config.layer
            ));
        }
    }

    let mut capture = TunCapture {
        layer: config.layer,
        mtu: tun_mtu(config, opt)?,
        remote: Some(RemoteAddress {
            address: server_addr,
            bypass: config.remote_bypass,
        }),
        ..Default::default()
    };

    ifconfig_ipv4(&mut capture, opt, topology(opt)?).context("Parse IPv4 tunnel address")?;
    ifconfig_ipv6(&mut capture, opt).context("Parse IPv6 tunnel address")?;

    let mut routes = vec![];
    for o in opt.get_all("route") {
        routes.push(route_ipv4(&capture, o).context("Parse IPv4 route")?);
    }
    for o in opt.get_all("route-ipv6") {
        routes.push(route_ipv6(&capture, o).context("Parse IPv6 route")?);
    }
    capture.routes = routes;
    capture.reroute_gw = reroute_gw(opt);
    capture.dns_servers = dns_servers(opt).context("Parse dhcp-option")?;

    if let Some(state) = state {
        state.vpn_ip4_addr = capture.tunnel_address_ipv4.map(|n| n.addr());
        state.vpn_ip4_gw = capture.gateway_ipv4;
        state.vpn_ip6_addr = capture.tunnel_address_ipv6.map(|n| n.addr());
        state.vpn_ip6_gw = capture.gateway_ipv6;
        state.mtu = capture.mtu;
    }

    Ok(capture)
}

#[cfg(test)]
mod test {
    use super::*;

    fn server() -> IpAddr {
        "203.0.113.9".parse().unwrap()
    }

    fn opts(s: &str) -> OptionList {
        s.parse().unwrap()
    }

    #[test]
    fn test_empty() {
        let mut state = TunState::new();
        let c = configure_builder(Some(&mut state), server(), &TunProp::default(), &opts(""))
            .unwrap();
        assert_eq!(c.layer, Layer::L3);
        assert_eq!(c.mtu, TUN_MTU_DEFAULT);
        assert_eq!(c.remote.unwrap().address, server());
        assert!(c.remote.unwrap().bypass);
        assert!(c.tunnel_address_ipv4.is_none());
        assert!(c.tunnel_address_ipv6.is_none());
        assert!(c.routes.is_empty());
        assert_eq!(state.mtu, TUN_MTU_DEFAULT);
        assert_eq!(state.vpn_ip4(), "");
    }

    #[test]
    fn test_subnet() {
        let mut state = TunState::new();
        let c = configure_builder(
            Some(&mut state),
            server(),
            &TunProp::default(),
            &opts(
                "topology subnet,ifconfig 10.8.0.2 255.255.255.0,route-gateway 10.8.0.1,\
                 route 192.168.10.0 255.255.255.0,route 172.16.0.1 255.255.0.0 10.8.0.254,\
                 redirect-gateway def1,dhcp-option DNS 10.8.0.1,dhcp-option DOMAIN example.com,\
                 tun-mtu 1400",
            ),
        )
        .unwrap();
        assert_eq!(c.tunnel_address_ipv4, Some("10.8.0.2/24".parse().unwrap()));
        assert_eq!(c.gateway_ipv4, Some("10.8.0.1".parse().unwrap()));
        assert_eq!(c.mtu, 1400);
        assert_eq!(c.routes.len(), 2);
        assert_eq!(c.routes[0].net, "192.168.10.0/24".parse::<IpNet>().unwrap());
        assert_eq!(c.routes[0].gateway, Some("10.8.0.1".parse().unwrap()));
        assert_eq!(c.routes[1].net, "172.16.0.0/16".parse::<IpNet>().unwrap());
        assert_eq!(c.routes[1].gateway, Some("10.8.0.254".parse().unwrap()));
        assert!(c.reroute_gw.ipv4);
        assert!(!c.reroute_gw.ipv6);
        assert_eq!(c.dns_servers, vec!["10.8.0.1".parse::<IpAddr>().unwrap()]);
        assert_eq!(state.vpn_ip4(), "10.8.0.2");
        assert_eq!(state.vpn_gw4(), "10.8.0.1");
        assert_eq!(state.mtu, 1400);
    }

    #[test]
    fn test_net30_p2p() {
        let c = configure_builder(
            None,
            server(),
            &TunProp::default(),
            &opts("ifconfig 10.8.0.6 10.8.0.5"),
        )
        .unwrap();
        assert_eq!(c.tunnel_address_ipv4, Some("10.8.0.6/30".parse().unwrap()));
        assert_eq!(c.gateway_ipv4, Some("10.8.0.5".parse().unwrap()));

        let c = configure_builder(
            None,
            server(),
            &TunProp::default(),
            &opts("topology p2p,ifconfig 10.8.0.6 10.8.0.1"),
        )
        .unwrap();
        assert_eq!(c.tunnel_address_ipv4, Some("10.8.0.6/32".parse().unwrap()));
        assert_eq!(c.gateway_ipv4, Some("10.8.0.1".parse().unwrap()));

        assert!(
            configure_builder(
                None,
                server(),
                &TunProp::default(),
                &opts("topology p2p,ifconfig 10.8.0.6 10.8.0.6"),
            )
            .is_err()
        );
    }

    #[test]
    fn test_ipv6() {
        let mut state = TunState::new();
        let c = configure_builder(
            Some(&mut state),
            "2001:db8::1".parse().unwrap(),
            &TunProp::default(),
            &opts(
                "ifconfig-ipv6 fd00::1000/64 fd00::1,route-ipv6 2000::/3,\
                 redirect-gateway ipv6 !ipv4,dhcp-option DNS6 fd00::53",
            ),
        )
        .unwrap();
        assert_eq!(c.tunnel_address_ipv6, Some("fd00::1000/64".parse().unwrap()));
        assert_eq!(c.gateway_ipv6, Some("fd00::1".parse().unwrap()));
        assert_eq!(c.routes.len(), 1);
        assert_eq!(c.routes[0].gateway, Some("fd00::1".parse().unwrap()));
        assert!(!c.reroute_gw.ipv4);
        assert!(c.reroute_gw.ipv6);
        assert_eq!(c.dns_servers, vec!["fd00::53".parse::<IpAddr>().unwrap()]);
        assert_eq!(state.vpn_ip6(), "fd00::1000");
        assert_eq!(state.vpn_gw6(), "fd00::1");
        assert_eq!(state.vpn_ip4(), "");
    }

    #[test]
    fn test_mtu() {
        let prop = TunProp {
            mtu: 1300,
            ..Default::default()
        };
        let c = configure_builder(None, server(), &prop, &opts("")).unwrap();
        assert_eq!(c.mtu, 1300);
        let c = configure_builder(None, server(), &prop, &opts("tun-mtu 9000")).unwrap();
        assert_eq!(c.mtu, 9000);
        assert!(configure_builder(None, server(), &prop, &opts("tun-mtu 100")).is_err());
        assert!(configure_builder(None, server(), &prop, &opts("tun-mtu x")).is_err());
    }

    #[test]
    fn test_invalid() {
        let prop = TunProp::default();
        for o in [
            "topology subnet,ifconfig 10.8.0.2 255.0.255.0",
            "topology star",
            "ifconfig 10.8.0.2",
            "ifconfig-ipv6 fd00::1",
            "route 10.0.0.0 255.0.0.0 gw",
            "dhcp-option DNS fd00::53",
            "dev-type tap",
        ] {
            assert!(
                configure_builder(None, server(), &prop, &opts(o)).is_err(),
                "'{o}' should be rejected"
            );
        }
    }

    #[test]
    fn test_netmask() {
        assert_eq!(netmask_to_prefix("255.255.255.0".parse().unwrap()).unwrap(), 24);
        assert_eq!(netmask_to_prefix("255.255.255.255".parse().unwrap()).unwrap(), 32);
        assert_eq!(netmask_to_prefix("0.0.0.0".parse().unwrap()).unwrap(), 0);
        assert!(netmask_to_prefix("255.0.0.255".parse().unwrap()).is_err());
    }

    #[test]
    fn test_compare() {
        let prop = TunProp::default();
        let o = opts("ifconfig 10.8.0.6 10.8.0.5");
        let a = configure_builder(None, server(), &prop, &o).unwrap();
        let b = configure_builder(None, server(), &prop, &o).unwrap();
        assert_eq!(a, b);
        let c = configure_builder(None, "198.51.100.1".parse().unwrap(), &prop, &o).unwrap();
        assert_ne!(a, c);
    }
}

// vim: ts=4 sw=4 expandtab
