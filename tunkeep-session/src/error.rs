// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::fmt::{Display, Formatter};

/// Error classification reported to the session parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunErrorKind {
    /// Property derivation or device establishment failed.
    SetupFailed,
    /// Reading from the tun device failed.
    ReadError,
    /// Writing to the tun device failed.
    WriteError,
    /// The tun device returned a zero length read.
    EndOfStream,
}

impl Display for TunErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetupFailed => write!(f, "TUN_SETUP_FAILED"),
            Self::ReadError => write!(f, "TUN_READ_ERROR"),
            Self::WriteError => write!(f, "TUN_WRITE_ERROR"),
            Self::EndOfStream => write!(f, "TUN_END_OF_STREAM"),
        }
    }
}

// vim: ts=4 sw=4 expandtab
