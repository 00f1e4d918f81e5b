// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tun interface session control for a VPN client.
//!
//! A [TunClient] owns the tun interface for one connection attempt.
//! It is created by a [ClientConfig], which may hold a long-term
//! [TunPersist] store to keep the interface alive across reconnects.

#![forbid(unsafe_code)]

mod client;
mod config;
mod error;
mod packet;
mod persist;
mod prop;
mod pump;
mod state;
mod stats;

#[cfg(test)]
mod mock;

pub use client::{
    TransportClient, TunClient, TunClientParent, TunClientState, TunEvent, UNDEF_TUN_NAME,
};
pub use config::ClientConfig;
pub use error::TunErrorKind;
pub use packet::PacketFrom;
pub use persist::{PersistScope, TunLease, TunPersist};
pub use prop::{TUN_MTU_DEFAULT, TunProp, configure_builder};
pub use state::TunState;
pub use stats::TunStats;

// vim: ts=4 sw=4 expandtab
