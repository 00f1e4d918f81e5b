// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{
    config::ClientConfig,
    error::TunErrorKind,
    packet::PacketFrom,
    persist::{PersistScope, TunLease, TunPersist},
    prop::configure_builder,
    pump::{TunIo, TunIoCompletion, TunIoEvent},
    state::TunState,
    stats::TunStats,
};
use anyhow::{self as ah, Context as _, format_err as err};
use std::{net::IpAddr, sync::Arc};
use tokio::sync::mpsc;
use tunkeep_tun::SetupConfig;
use tunkeep_util::OptionList;

/// Interface name reported while no interface is connected.
pub const UNDEF_TUN_NAME: &str = "UNDEF_TUN";

const EVENT_QUEUE_LEN: usize = 64;

/// Receiver of session notifications.
///
/// All methods are called from within [TunClient]'s own methods.
pub trait TunClientParent: Send + Sync {
    /// A new interface is about to be configured.
    /// Not called when a persisted interface is reused.
    fn tun_pre_tun_config(&self);

    /// The session is connected and packets flow.
    fn tun_connected(&self);

    /// The session has failed and is stopped.
    fn tun_error(&self, kind: TunErrorKind, detail: &str);

    /// A packet was read from the interface.
    fn tun_recv(&self, buf: Vec<u8>);
}

/// The transport the VPN session runs over.
pub trait TransportClient: Send + Sync {
    /// Address of the VPN server endpoint.
    fn server_endpoint_addr(&self) -> IpAddr;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunClientState {
    Idle,
    Establishing,
    Connected,
    Stopping,
}

struct PendingRestart {
    opt: OptionList,
    transcli: Arc<dyn TransportClient>,
}

enum EventKind {
    Restart(PendingRestart),
    Io(TunIoCompletion),
}

/// Session work returned by [TunClient::next_event].
pub struct TunEvent(EventKind);

/// Tun session controller for one connection attempt.
pub struct TunClient {
    config: Arc<ClientConfig>,
    parent: Arc<dyn TunClientParent>,
    tun_persist: Option<TunLease>,
    pump: Option<TunIo>,
    state: Option<TunState>,
    phase: TunClientState,
    halt: bool,
    generation: u64,
    events_tx: mpsc::Sender<TunIoCompletion>,
    events_rx: mpsc::Receiver<TunIoCompletion>,
    pending_restart: Option<PendingRestart>,
}

impl TunClient {
    pub(crate) fn new(config: Arc<ClientConfig>, parent: Arc<dyn TunClientParent>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_LEN);
        Self {
            config,
            parent,
            tun_persist: None,
            pump: None,
            state: None,
            phase: TunClientState::Idle,
            halt: true,
            generation: 0,
            events_tx,
            events_rx,
            pending_restart: None,
        }
    }

    /// Bring the session up with the server pushed options `opt`.
    ///
    /// Reports the outcome through [TunClientParent::tun_connected]
    /// or [TunClientParent::tun_error]. Does nothing if already connected.
    pub async fn tun_start(&mut self, opt: &OptionList, transcli: &dyn TransportClient) {
        if self.pump.is_some() {
            log::debug!("{}: Tun session is already started.", self.tun_name());
            return;
        }
        self.halt = false;
        self.phase = TunClientState::Establishing;

        if let Err(e) = self.establish(opt, transcli).await {
            if let Some(tun_persist) = &self.tun_persist {
                tun_persist.close();
            }
            self.stop().await;
            let detail = format!("{e:#}");
            log::error!("Tun setup failed: {detail}");
            self.parent.tun_error(TunErrorKind::SetupFailed, &detail);
            return;
        }

        self.phase = TunClientState::Connected;
        log::info!("{}: Tun session connected.", self.tun_name());
        self.parent.tun_connected();
    }

    async fn establish(
        &mut self,
        opt: &OptionList,
        transcli: &dyn TransportClient,
    ) -> ah::Result<()> {
        let tun_persist = match &self.config.tun_persist {
            Some(tun_persist) => {
                log::info!("TunPersist: long-term session scope");
                Arc::clone(tun_persist)
            }
            None => {
                log::info!("TunPersist: short-term connection scope");
                Arc::new(TunPersist::new(PersistScope::ShortTerm))
            }
        };
        let tun_persist = self.tun_persist.insert(tun_persist.lease()?);

        let server_addr = transcli.server_endpoint_addr();
        let tun_prop = &self.config.tun_prop;

        let (device, state) = if tun_persist.use_persisted(server_addr, tun_prop, opt) {
            let (device, state) = tun_persist
                .persisted()
                .ok_or_else(|| err!("The persisted tun interface is gone."))?;
            let state = TunState::reconstruct(&state).context("Persisted tun state")?;
            log::info!("TunPersist: reused tun context");
            (device, state)
        } else {
            self.parent.tun_pre_tun_config();

            // The old interface must be gone before the new one is created.
            tun_persist.close();

            let mut state = TunState::new();
            let capture = configure_builder(Some(&mut state), server_addr, tun_prop, opt)
                .context("Tun properties")?;
            log::info!("CAPTURED OPTIONS:\n{capture}");

            let tun_setup = self.config.new_setup_obj()?;
            let setup_conf = SetupConfig {
                layer: tun_prop.layer,
                dev_name: self.config.dev_name.clone(),
                add_bypass_routes_on_establish: true,
            };
            let device = tun_setup
                .establish(&capture, &setup_conf)
                .await
                .context("Establish tun interface")?;
            tun_persist.add_destructor(tun_setup);

            state.iface_name = device.name().to_string();
            state.validate()?;
            tun_persist.persist(Arc::clone(&device), state.clone(), capture)?;
            (device, state)
        };

        self.generation += 1;
        let mut pump = TunIo::new(
            device,
            state.iface_name.clone(),
            self.generation,
            state.mtu,
            Arc::clone(&self.config.stats),
        );
        pump.start(
            self.config.n_parallel,
            self.config.write_queue_len,
            self.events_tx.clone(),
        );
        self.pump = Some(pump);
        self.state = Some(state);
        Ok(())
    }

    /// Tear the session down.
    ///
    /// After this returns no further packets or errors of this session
    /// reach the parent. Calling it again is a no-op.
    pub async fn stop(&mut self) {
        if self.halt {
            log::debug!("Tun session is already stopped.");
            return;
        }
        self.halt = true;
        self.phase = TunClientState::Stopping;

        if let Some(mut pump) = self.pump.take() {
            pump.stop().await;
        }
        // A short-term store closes the interface when the lease drops the last reference.
        self.tun_persist = None;
        self.state = None;

        self.phase = TunClientState::Idle;
        log::debug!("Tun session stopped.");
    }

    /// Restart the session with new server pushed options.
    ///
    /// The session is stopped right away.
    /// The restart runs in the next [TunClient::handle_event] call.
    pub async fn apply_push_update(
        &mut self,
        opt: OptionList,
        transcli: Arc<dyn TransportClient>,
    ) {
        self.stop().await;
        log::info!("Tun push update: restart scheduled.");
        self.pending_restart = Some(PendingRestart { opt, transcli });
    }

    /// Wait for the next unit of session work.
    ///
    /// This is cancel safe. Pass the result to [TunClient::handle_event].
    pub async fn next_event(&mut self) -> TunEvent {
        if let Some(restart) = self.pending_restart.take() {
            return TunEvent(EventKind::Restart(restart));
        }
        match self.events_rx.recv().await {
            Some(completion) => TunEvent(EventKind::Io(completion)),
            // We hold a sender ourselves.
            None => std::future::pending().await,
        }
    }

    /// Run one unit of session work to completion.
    pub async fn handle_event(&mut self, event: TunEvent) {
        match event.0 {
            EventKind::Restart(restart) => {
                if self.pump.is_some() {
                    log::debug!("Tun push update: session was restarted meanwhile.");
                    return;
                }
                self.discard_stale_events();
                self.tun_start(&restart.opt, &*restart.transcli).await;
            }
            EventKind::Io(completion) => self.dispatch(completion).await,
        }
    }

    /// Wait for and handle one tun I/O completion or a scheduled restart.
    pub async fn process_events(&mut self) {
        let event = self.next_event().await;
        self.handle_event(event).await;
    }

    fn discard_stale_events(&mut self) {
        let mut count = 0_usize;
        while self.events_rx.try_recv().is_ok() {
            count += 1;
        }
        if count > 0 {
            log::debug!("Discarded {count} completions of a stopped tun session.");
        }
    }

    async fn dispatch(&mut self, completion: TunIoCompletion) {
        let live = !self.halt
            && self
                .pump
                .as_ref()
                .is_some_and(|p| p.generation() == completion.generation);
        if !live {
            log::trace!("Dropping a completion of a stopped tun session.");
            return;
        }
        match completion.event {
            TunIoEvent::Packet(pfp) => self.tun_read_handler(pfp),
            TunIoEvent::Error { kind, error } => self.tun_error_handler(kind, error).await,
        }
    }

    fn tun_read_handler(&self, pfp: Box<PacketFrom>) {
        self.parent.tun_recv(pfp.into_payload());
    }

    async fn tun_error_handler(&mut self, kind: TunErrorKind, error: ah::Error) {
        let detail = format!("{error:#}");
        log::error!("{}: {kind}: {detail}", self.tun_name());
        self.stop().await;
        self.parent.tun_error(kind, &detail);
    }

    /// Queue one packet for the interface.
    ///
    /// Returns false if the session is not connected or the packet was dropped.
    pub fn tun_send(&self, buf: &[u8]) -> bool {
        match &self.pump {
            Some(pump) => pump.write(buf),
            None => false,
        }
    }

    fn connected_state(&self) -> Option<&TunState> {
        if self.phase == TunClientState::Connected {
            self.state.as_ref()
        } else {
            None
        }
    }

    pub fn tun_name(&self) -> String {
        self.connected_state()
            .map(|s| s.iface_name.clone())
            .unwrap_or_else(|| UNDEF_TUN_NAME.to_string())
    }

    pub fn vpn_ip4(&self) -> String {
        self.connected_state().map(|s| s.vpn_ip4()).unwrap_or_default()
    }

    pub fn vpn_ip6(&self) -> String {
        self.connected_state().map(|s| s.vpn_ip6()).unwrap_or_default()
    }

    pub fn vpn_gw4(&self) -> String {
        self.connected_state().map(|s| s.vpn_gw4()).unwrap_or_default()
    }

    pub fn vpn_gw6(&self) -> String {
        self.connected_state().map(|s| s.vpn_gw6()).unwrap_or_default()
    }

    pub fn vpn_mtu(&self) -> u32 {
        self.connected_state().map(|s| s.mtu).unwrap_or(0)
    }

    pub fn state(&self) -> TunClientState {
        self.phase
    }

    pub fn stats(&self) -> &TunStats {
        &self.config.stats
    }
}

impl std::fmt::Debug for TunClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(f, "TunClient({}, {:?})", self.tun_name(), self.phase)
    }
}


// vim: ts=4 sw=4 expandtab
