// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Batching of scattered registers into contiguous read windows.
//!
//! ```text
//! addresses:  10  12              20
//!             [##][..][##]        [##]
//! windows:    [10 ......... 13)   [20, 21)     gap 20 - 13 = 7 > GAP
//! ```
//!
//! A register joins the current window when it starts no more than [`GAP`]
//! addresses after the window's end; the skipped words are read and ignored.
//! A window never spans more than [`MAX_WINDOW_WORDS`] words, the Modbus
//! limit for one read request.

use crate::types::RegisterDescriptor;

/// Maximum number of unused addresses bridged to join two registers.
pub const GAP: u32 = 4;

/// Largest register count a single read request may ask for.
pub const MAX_WINDOW_WORDS: u32 = 125;

/// A contiguous `[start, end)` address range and the registers it serves.
#[derive(Debug, Clone, PartialEq)]
pub struct Window<'a> {
    /// First address.
    pub start: u16,
    /// Exclusive end address.
    pub end: u32,
    /// Registers covered, in address order.
    pub registers: Vec<&'a RegisterDescriptor>,
}

impl<'a> Window<'a> {
    fn open(descriptor: &'a RegisterDescriptor) -> Self {
        Self {
            start: descriptor.address,
            end: descriptor.end_address(),
            registers: vec![descriptor],
        }
    }

    /// Returns the number of words to read.
    #[inline]
    pub fn word_count(&self) -> u16 {
        u16::try_from(self.span_to(self.end)).unwrap_or(u16::MAX)
    }

    #[inline]
    fn span_to(&self, end: u32) -> u32 {
        end - u32::from(self.start)
    }

    fn accepts(&self, descriptor: &RegisterDescriptor, gap: u32) -> bool {
        u32::from(descriptor.address) <= self.end + gap
            && self.span_to(self.end.max(descriptor.end_address())) <= MAX_WINDOW_WORDS
    }

    /// Returns `true` if `address` falls inside this window.
    pub fn contains(&self, address: u16) -> bool {
        address >= self.start && u32::from(address) < self.end
    }
}

/// Groups registers into windows with the default gap tolerance.
pub fn plan_windows<'a, I>(registers: I) -> Vec<Window<'a>>
where
    I: IntoIterator<Item = &'a RegisterDescriptor>,
{
    plan_windows_with_gap(registers, GAP)
}

/// Groups registers into windows, bridging at most `gap` unused addresses.
pub fn plan_windows_with_gap<'a, I>(registers: I, gap: u32) -> Vec<Window<'a>>
where
    I: IntoIterator<Item = &'a RegisterDescriptor>,
{
    let mut sorted: Vec<&RegisterDescriptor> = registers.into_iter().collect();
    sorted.sort_by_key(|r| r.address);

    let mut windows = Vec::new();
    let mut current: Option<Window<'a>> = None;

    for descriptor in sorted {
        match current.as_mut() {
            Some(window) if window.accepts(descriptor, gap) => {
                window.end = window.end.max(descriptor.end_address());
                window.registers.push(descriptor);
            }
            _ => {
                if let Some(done) = current.replace(Window::open(descriptor)) {
                    windows.push(done);
                }
            }
        }
    }

    windows.extend(current);
    windows
}
