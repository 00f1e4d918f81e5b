// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

/// One packet read from the tun device.
///
/// Owned by the reader until it is handed to the session controller
/// as a `Box<PacketFrom>`.
#[derive(Debug)]
pub struct PacketFrom {
    pub buf: Vec<u8>,
}

impl PacketFrom {
    /// Allocate a zeroed receive buffer of `frame_len` bytes.
    pub fn new(frame_len: usize) -> Box<Self> {
        Box::new(Self {
            buf: vec![0; frame_len],
        })
    }

    /// Cut the buffer down to the received length.
    pub fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }

    /// Move the payload out, consuming the descriptor.
    pub fn into_payload(self: Box<Self>) -> Vec<u8> {
        self.buf
    }
}

// vim: ts=4 sw=4 expandtab
