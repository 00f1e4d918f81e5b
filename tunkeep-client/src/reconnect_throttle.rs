// -*- coding: utf-8 -*-
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (C) 2025 Michael Büsch <m@bues.ch>

use std::time::Duration;

const LIMIT: u32 = 16;

const DELAY_BASE_S: f64 = 0.5;
const DELAY_MAX_S: f64 = 30.0;

/// Back-off for session restarts after errors.
#[derive(Debug, Default)]
pub struct ReconnectThrottle {
    count: u32,
}

impl ReconnectThrottle {
    pub fn new() -> Self {
        Default::default()
    }

    /// Register a failed session and get the delay before the next attempt.
    pub fn error(&mut self) -> Duration {
        // Don't let it grow unbounded.
        self.count = (self.count + 1).min(LIMIT);

        // Double the delay with every consecutive error.
        let fact = 2.0_f64.powi(self.count as i32 - 1);
        let delay = (DELAY_BASE_S * fact).min(DELAY_MAX_S);
        let delay = Duration::from_secs_f64(delay);

        log::trace!("Session error #{}. Delaying for {delay:?}.", self.count);
        delay
    }

    /// A session was connected successfully.
    pub fn reset(&mut self) {
        self.count = 0;
    }
}


// vim: ts=4 sw=4 expandtab
