// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (C) 2025 Michael Büsch <m@bues.ch>

#![forbid(unsafe_code)]

mod parent;
mod reconnect_throttle;
mod systemd;
mod transport;

use crate::{
    parent::{ClientParent, SessionEvent},
    reconnect_throttle::ReconnectThrottle,
    systemd::systemd_notify_stopping,
    transport::ServerEndpoint,
};
use anyhow::{self as ah, Context as _, format_err as err};
use clap::Parser;
use std::{path::Path, sync::Arc, time::Duration};
use tokio::{
    runtime,
    sync::mpsc,
    time::{self, Instant},
};
use tunkeep_conf::Config;
use tunkeep_session::{ClientConfig, PersistScope, TransportClient, TunClientParent, TunPersist};
use tunkeep_util::OptionList;

#[cfg(any(target_os = "linux", target_os = "android"))]
use tokio::signal::unix::{SignalKind, signal};

const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser, Debug, Clone)]
struct Opts {
    /// IP address or host name of the VPN server.
    ///
    /// The server address decides whether a persisted
    /// tun interface can be reused.
    server: Option<String>,

    /// Path to the configuration file.
    #[arg(
        long,
        short = 'C',
        id = "PATH",
        default_value = "/opt/tunkeep/etc/tunkeep/client.conf"
    )]
    config: String,

    /// Name of the tun interface to create.
    ///
    /// This overrides the configuration file.
    #[arg(long, short = 't', id = "INTERFACE-NAME")]
    tun: Option<String>,

    /// Keep the tun interface alive across session restarts.
    ///
    /// This overrides the configuration file.
    #[arg(long, short = 'p')]
    persist: bool,

    /// Show version information and exit.
    #[arg(long, short = 'v')]
    version: bool,
}

#[cfg(any(target_os = "linux", target_os = "android"))]
macro_rules! register_signal {
    ($kind:ident) => {
        signal(SignalKind::$kind()).context("Register signal handler")?
    };
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
macro_rules! register_signal {
    ($kind:ident) => {
        ()
    };
}

#[cfg(any(target_os = "linux", target_os = "android"))]
macro_rules! recv_signal {
    ($sig:ident) => {
        $sig.recv()
    };
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
async fn signal_dummy(_: &mut ()) {
    loop {
        time::sleep(Duration::MAX).await;
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
macro_rules! recv_signal {
    ($sig:ident) => {
        signal_dummy(&mut $sig)
    };
}

fn load_push_options(path: &str) -> ah::Result<OptionList> {
    Config::new_parse_file(Path::new(path))
        .context("Parse configuration")?
        .push_options()
}

async fn async_main(opts: Arc<Opts>) -> ah::Result<()> {
    let Some(server) = &opts.server else {
        return Err(err!(
            "'tunkeep-client' requires the SERVER argument. \
            Please run 'tunkeep-client --help' for more information."
        ));
    };

    let conf = Config::new_parse_file(Path::new(&opts.config)).context("Parse configuration")?;
    let mut push_options = conf.push_options()?;

    let mut client_config = ClientConfig::from_config(&conf);
    if let Some(tun) = &opts.tun {
        client_config.dev_name = tun.clone();
    }
    if opts.persist && client_config.tun_persist.is_none() {
        client_config.tun_persist = Some(Arc::new(TunPersist::new(PersistScope::LongTerm)));
    }
    client_config
        .load(&push_options)
        .context("Load tun configuration")?;
    let client_config = Arc::new(client_config);

    let transport: Arc<dyn TransportClient> = Arc::new(ServerEndpoint::resolve(server).await?);

    // Register unix signal handlers.
    let mut sigterm = register_signal!(terminate);
    let mut sigint = register_signal!(interrupt);
    let mut sighup = register_signal!(hangup);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let parent = Arc::new(ClientParent::new(event_tx));
    let mut client =
        client_config.new_tun_client_obj(Arc::clone(&parent) as Arc<dyn TunClientParent>);

    client.tun_start(&push_options, &*transport).await;

    let mut throttle = ReconnectThrottle::new();
    let mut restart_at: Option<Instant> = None;
    let mut stats_interval = time::interval(STATS_INTERVAL);

    // Task: Main loop.
    let exitcode;
    loop {
        tokio::select! {
            _ = recv_signal!(sigterm) => {
                log::info!("SIGTERM: Terminating.");
                exitcode = Ok(());
                break;
            }
            _ = recv_signal!(sigint) => {
                exitcode = Err(err!("Interrupted by SIGINT."));
                break;
            }
            _ = recv_signal!(sighup) => {
                log::info!("SIGHUP: Reloading pushed options.");
                match load_push_options(&opts.config) {
                    Ok(opt) => {
                        push_options = opt.clone();
                        restart_at = None;
                        client.apply_push_update(opt, Arc::clone(&transport)).await;
                    }
                    Err(e) => log::error!("SIGHUP: {e:#}"),
                }
            }
            event = client.next_event() => {
                client.handle_event(event).await;
            }
            event = event_rx.recv() => {
                match event {
                    Some(SessionEvent::Connected) => throttle.reset(),
                    Some(SessionEvent::Error(kind)) => {
                        let delay = throttle.error();
                        log::info!("Restarting the tun session after {kind} in {delay:?}.");
                        restart_at = Some(Instant::now() + delay);
                    }
                    None => {
                        exitcode = Err(err!("Session event channel closed."));
                        break;
                    }
                }
            }
            _ = time::sleep_until(restart_at.unwrap_or_else(Instant::now)),
                if restart_at.is_some() =>
            {
                restart_at = None;
                client.tun_start(&push_options, &*transport).await;
            }
            _ = stats_interval.tick() => {
                log::debug!(
                    "{}: {}, {} packets delivered",
                    client.tun_name(),
                    client.stats(),
                    parent.rx_packets()
                );
            }
        }
    }

    if let Err(e) = systemd_notify_stopping() {
        log::debug!("Systemd notify failed: {e:#}");
    }
    client.stop().await;
    if let Some(tun_persist) = &client_config.tun_persist {
        tun_persist.close();
    }
    exitcode
}

fn main() -> ah::Result<()> {
    env_logger::init_from_env(
        env_logger::Env::new()
            .filter_or("TUNKEEP_LOG", "info")
            .write_style_or("TUNKEEP_LOG_STYLE", "auto"),
    );

    let opts = Arc::new(Opts::parse());

    if opts.version {
        println!("tunkeep version {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    const WORKER_THREADS: usize = 4;
    runtime::Builder::new_multi_thread()
        .thread_keep_alive(Duration::from_millis(5000))
        .max_blocking_threads(WORKER_THREADS * 2)
        .worker_threads(WORKER_THREADS)
        .enable_all()
        .build()
        .context("Tokio runtime builder")?
        .block_on(async_main(opts))
}

// vim: ts=4 sw=4 expandtab
