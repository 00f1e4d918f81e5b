// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::{self as ah, format_err as err};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

/// Network layer the tunnel device operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layer {
    /// IP packets (tun).
    #[default]
    L3,
    /// Ethernet frames (tap).
    L2,
}

impl FromStr for Layer {
    type Err = ah::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "tun" | "layer3" | "L3" => Ok(Layer::L3),
            "tap" | "layer2" | "L2" => Ok(Layer::L2),
            s => Err(err!("Unknown tunnel layer '{s}'. Expected 'tun' or 'tap'.")),
        }
    }
}

impl Display for Layer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Layer::L3 => write!(f, "tun"),
            Layer::L2 => write!(f, "tap"),
        }
    }
}


// vim: ts=4 sw=4 expandtab
