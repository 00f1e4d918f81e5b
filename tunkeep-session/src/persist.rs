// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{
    prop::{TunProp, configure_builder},
    state::TunState,
};
use anyhow::{self as ah, format_err as err};
use std::{
    net::IpAddr,
    ops::Deref,
    sync::{
        Arc, Mutex as StdMutex,
        atomic::{AtomicBool, Ordering},
    },
};
use tunkeep_tun::{TunCapture, TunDevice, TunSetup};
use tunkeep_util::OptionList;

/// How long a [TunPersist] keeps its tun device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistScope {
    /// One connection attempt. Owned by the session controller.
    ShortTerm,
    /// All connection attempts of a client. Owned by the client configuration.
    LongTerm,
}

#[derive(Debug)]
struct Persisted {
    device: Arc<dyn TunDevice>,
    state: TunState,
    capture: TunCapture,
}

#[derive(Debug, Default)]
struct Slot {
    persisted: Option<Persisted>,
    destructors: Vec<Arc<dyn TunSetup>>,
}

/// Single slot store for a tun device that may be reused by later sessions.
///
/// At most one device is held at any time.
/// Closing the store (explicitly or by dropping it) runs the attached
/// destructors and releases the device.
#[derive(Debug)]
pub struct TunPersist {
    scope: PersistScope,
    slot: StdMutex<Slot>,
    leased: AtomicBool,
}

impl TunPersist {
    pub fn new(scope: PersistScope) -> Self {
        Self {
            scope,
            slot: StdMutex::new(Default::default()),
            leased: AtomicBool::new(false),
        }
    }

    pub fn scope(&self) -> PersistScope {
        self.scope
    }

    /// Borrow the store for one session.
    ///
    /// Fails if another session currently holds a lease.
    pub fn lease(self: &Arc<Self>) -> ah::Result<TunLease> {
        if self.leased.swap(true, Ordering::AcqRel) {
            return Err(err!("The persisted tun interface is in use by another session."));
        }
        Ok(TunLease {
            persist: Arc::clone(self),
        })
    }

    /// Check whether the held device can carry a session with the given properties.
    ///
    /// Never modifies the store.
    pub fn use_persisted(&self, server_addr: IpAddr, tun_prop: &TunProp, opt: &OptionList) -> bool {
        let slot = self.slot.lock().expect("Mutex poisoned");
        let Some(persisted) = &slot.persisted else {
            return false;
        };
        match configure_builder(None, server_addr, tun_prop, opt) {
            Ok(capture) => {
                let compatible = capture == persisted.capture;
                if !compatible {
                    log::debug!("TunPersist: {} is not compatible.", persisted.state.iface_name);
                }
                compatible
            }
            Err(e) => {
                log::debug!("TunPersist: Cannot derive tun properties: {e:#}");
                false
            }
        }
    }

    /// The held device and its state, if any.
    pub fn persisted(&self) -> Option<(Arc<dyn TunDevice>, TunState)> {
        self.slot
            .lock()
            .expect("Mutex poisoned")
            .persisted
            .as_ref()
            .map(|p| (Arc::clone(&p.device), p.state.clone()))
    }

    /// Whether a device is held.
    pub fn is_held(&self) -> bool {
        self.slot.lock().expect("Mutex poisoned").persisted.is_some()
    }

    /// Store a freshly established device.
    ///
    /// The previous device must have been closed.
    pub fn persist(
        &self,
        device: Arc<dyn TunDevice>,
        state: TunState,
        capture: TunCapture,
    ) -> ah::Result<()> {
        let mut slot = self.slot.lock().expect("Mutex poisoned");
        if let Some(old) = &slot.persisted {
            return Err(err!(
                "TunPersist: {} must be closed before {} can be persisted.",
                old.state.iface_name,
                state.iface_name
            ));
        }
        slot.persisted = Some(Persisted {
            device,
            state,
            capture,
        });
        Ok(())
    }

    /// Run `setup`'s destructor when the device is released.
    pub fn add_destructor(&self, setup: Arc<dyn TunSetup>) {
        self.slot
            .lock()
            .expect("Mutex poisoned")
            .destructors
            .push(setup);
    }

    /// Release the held device and run all destructors.
    pub fn close(&self) {
        let (persisted, destructors) = {
            let mut slot = self.slot.lock().expect("Mutex poisoned");
            (
                slot.persisted.take(),
                std::mem::take(&mut slot.destructors),
            )
        };
        for setup in destructors {
            if let Err(e) = setup.destroy() {
                log::error!("TunPersist: Tun setup destroy failed: {e:#}");
            }
        }
        if let Some(persisted) = persisted {
            log::info!(
                "TunPersist: Closed {} ({:?})",
                persisted.state.iface_name,
                self.scope
            );
        }
    }
}

impl Drop for TunPersist {
    fn drop(&mut self) {
        self.close();
    }
}

/// A session's exclusive borrow of a [TunPersist].
#[derive(Debug)]
pub struct TunLease {
    persist: Arc<TunPersist>,
}

impl Deref for TunLease {
    type Target = TunPersist;

    fn deref(&self) -> &Self::Target {
        &self.persist
    }
}

impl Drop for TunLease {
    fn drop(&mut self) {
        self.persist.leased.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mock::{MockSetupFactory, MockTun, SetupEvent};
    use tunkeep_tun::TunSetupFactory as _;

    fn server() -> IpAddr {
        "203.0.113.9".parse().unwrap()
    }

    fn establish_into(persist: &TunPersist, opt: &OptionList) -> TunState {
        let mut state = TunState::new();
        let capture =
            configure_builder(Some(&mut state), server(), &TunProp::default(), opt).unwrap();
        state.iface_name = "tun0".to_string();
        persist
            .persist(MockTun::new("tun0"), state.clone(), capture)
            .unwrap();
        state
    }

    #[test]
    fn test_use_persisted() {
        let persist = TunPersist::new(PersistScope::LongTerm);
        let opt: OptionList = "ifconfig 10.8.0.6 10.8.0.5".parse().unwrap();
        let prop = TunProp::default();

        assert!(!persist.use_persisted(server(), &prop, &opt));
        assert!(persist.persisted().is_none());

        let state = establish_into(&persist, &opt);
        assert!(persist.is_held());
        assert!(persist.use_persisted(server(), &prop, &opt));
        let (device, pstate) = persist.persisted().unwrap();
        assert_eq!(device.name(), "tun0");
        assert_eq!(pstate, state);

        // Other server, other options, or underivable options miss.
        assert!(!persist.use_persisted("198.51.100.7".parse().unwrap(), &prop, &opt));
        assert!(!persist.use_persisted(server(), &prop, &OptionList::new()));
        let bad: OptionList = "tun-mtu 1".parse().unwrap();
        assert!(!persist.use_persisted(server(), &prop, &bad));
        let tap = TunProp {
            layer: tunkeep_util::Layer::L2,
            ..Default::default()
        };
        assert!(!persist.use_persisted(server(), &tap, &opt));

        // A miss leaves the device untouched.
        assert!(persist.is_held());
    }

    #[test]
    fn test_at_most_one() {
        let persist = TunPersist::new(PersistScope::LongTerm);
        let opt = OptionList::new();
        establish_into(&persist, &opt);

        let mut state = TunState::new();
        state.iface_name = "tun1".to_string();
        assert!(
            persist
                .persist(MockTun::new("tun1"), state.clone(), TunCapture::default())
                .is_err()
        );

        persist.close();
        assert!(!persist.is_held());
        persist
            .persist(MockTun::new("tun1"), state, TunCapture::default())
            .unwrap();
        assert_eq!(persist.persisted().unwrap().0.name(), "tun1");
    }

    #[test]
    fn test_close() {
        let factory = MockSetupFactory::new("tun0");
        let persist = TunPersist::new(PersistScope::LongTerm);
        establish_into(&persist, &OptionList::new());
        persist.add_destructor(factory.new_setup_obj());

        persist.close();
        assert!(!persist.is_held());
        assert_eq!(factory.events(), vec![SetupEvent::Destroy]);

        // Idempotent.
        persist.close();
        assert_eq!(factory.events(), vec![SetupEvent::Destroy]);
    }

    #[test]
    fn test_drop_closes() {
        let factory = MockSetupFactory::new("tun0");
        let persist = Arc::new(TunPersist::new(PersistScope::ShortTerm));
        establish_into(&persist, &OptionList::new());
        persist.add_destructor(factory.new_setup_obj());

        let lease = persist.lease().unwrap();
        drop(persist);
        assert!(factory.events().is_empty());
        assert!(lease.is_held());
        drop(lease);
        assert_eq!(factory.events(), vec![SetupEvent::Destroy]);
    }

    #[test]
    fn test_lease() {
        let persist = Arc::new(TunPersist::new(PersistScope::LongTerm));
        assert_eq!(persist.scope(), PersistScope::LongTerm);
        let lease = persist.lease().unwrap();
        assert!(persist.lease().is_err());
        drop(lease);
        let _lease = persist.lease().unwrap();
    }
}

// vim: ts=4 sw=4 expandtab
