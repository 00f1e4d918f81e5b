// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (C) 2025 Michael Büsch <m@bues.ch>

use anyhow::{self as ah, Context as _, format_err as err};
use std::net::IpAddr;
use tokio::net::lookup_host;
use tunkeep_session::TransportClient;

/// The VPN server the tun session is bound to.
#[derive(Debug, Clone)]
pub struct ServerEndpoint {
    addr: IpAddr,
}

impl ServerEndpoint {
    /// Resolve an IP address or host name.
    pub async fn resolve(host: &str) -> ah::Result<Self> {
        if let Ok(addr) = host.parse::<IpAddr>() {
            return Ok(Self { addr });
        }
        let addr = lookup_host((host, 0))
            .await
            .context("Resolve server host name")?
            .next()
            .ok_or_else(|| err!("Server host name '{host}' has no address."))?
            .ip();
        log::info!("Server {host} resolved to {addr}");
        Ok(Self { addr })
    }
}

impl TransportClient for ServerEndpoint {
    fn server_endpoint_addr(&self) -> IpAddr {
        self.addr
    }
}


// vim: ts=4 sw=4 expandtab
