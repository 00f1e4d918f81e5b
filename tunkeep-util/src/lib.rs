// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![forbid(unsafe_code)]

mod errors;
mod layer;
mod options;

pub use errors::EndOfStreamError;
pub use layer::Layer;
pub use options::{Opt, OptionList};

// vim: ts=4 sw=4 expandtab
