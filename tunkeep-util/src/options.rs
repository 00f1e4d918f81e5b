// -*- coding: utf-8 -*-
// Copyright (C) 2025 Michael Büsch <m@bues.ch>
// SPDX-License-Identifier: Apache-2.0 OR MIT

use anyhow::{self as ah, format_err as err};
use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

/// Maximum number of options in one option list.
const MAX_NR_OPTS: usize = 1024;

/// Leading marker of a server push reply.
const PUSH_REPLY: &str = "PUSH_REPLY";

/// One option: a name followed by zero or more arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opt {
    args: Vec<String>,
}

impl Opt {
    /// Create an option from its name and arguments.
    pub fn new(name: &str, args: &[&str]) -> Self {
        let mut v = Vec::with_capacity(args.len() + 1);
        v.push(name.to_string());
        v.extend(args.iter().map(|a| a.to_string()));
        Self { args: v }
    }

    /// The option name.
    pub fn name(&self) -> &str {
        &self.args[0]
    }

    /// Number of elements, including the name.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.len() <= 1
    }

    /// Get the element at `index` (0 is the name).
    ///
    /// Fails if the element is missing or longer than `max_len`.
    pub fn get(&self, index: usize, max_len: usize) -> ah::Result<&str> {
        self.get_optional(index, max_len)?
            .ok_or_else(|| err!("Option '{}': Argument {index} is missing.", self.name()))
    }

    /// Get the element at `index`, if present.
    ///
    /// Fails only if the element is longer than `max_len`.
    pub fn get_optional(&self, index: usize, max_len: usize) -> ah::Result<Option<&str>> {
        match self.args.get(index) {
            Some(a) if a.len() > max_len => Err(err!(
                "Option '{}': Argument {index} is too long ({} > {max_len}).",
                self.name(),
                a.len()
            )),
            Some(a) => Ok(Some(a)),
            None => Ok(None),
        }
    }

    /// Iterate over the arguments (without the name).
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.args[1..].iter().map(|a| a.as_str())
    }
}

impl Display for Opt {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.args.join(" "))
    }
}

/// Read-only list of configuration or pushed options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionList {
    opts: Vec<Opt>,
}

impl OptionList {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, opt: Opt) {
        self.opts.push(opt);
    }

    pub fn len(&self) -> usize {
        self.opts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opts.is_empty()
    }

    /// Get an option by name.
    ///
    /// If the option occurs multiple times, the last occurrence wins.
    pub fn get_ptr(&self, name: &str) -> Option<&Opt> {
        self.opts.iter().rev().find(|o| o.name() == name)
    }

    /// Iterate over all occurrences of an option, in list order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Opt> + 'a {
        self.opts.iter().filter(move |o| o.name() == name)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.get_ptr(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Opt> {
        self.opts.iter()
    }
}

impl FromStr for OptionList {
    type Err = ah::Error;

    /// Parse a comma separated option list,
    /// optionally prefixed with `PUSH_REPLY`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut opts = Vec::new();
        for (i, item) in s.split(',').enumerate() {
            let item = item.trim();
            if item.is_empty() || (i == 0 && item == PUSH_REPLY) {
                continue;
            }
            if opts.len() >= MAX_NR_OPTS {
                return Err(err!("Invalid option list: Too many options."));
            }
            let args: Vec<String> = item.split_ascii_whitespace().map(String::from).collect();
            opts.push(Opt { args });
        }
        Ok(Self { opts })
    }
}

impl Display for OptionList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, opt) in self.opts.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{opt}")?;
        }
        Ok(())
    }
}


// vim: ts=4 sw=4 expandtab
