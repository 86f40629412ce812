use std::collections::VecDeque;

use serde::Serialize;

/// How a decoder classified one bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BitKind {
    Zero,
    One,
    /// Start bit of a high-speed byte frame
    Start,
    /// Bit that broke the framing or clocking rules
    Bad,
}

/// One classified bit and the frames it spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BitEvent {
    pub start_frame: usize,
    pub end_frame: usize,
    pub kind: BitKind,
}

impl BitEvent {
    pub fn new(start_frame: usize, end_frame: usize, kind: BitKind) -> Self {
        Self {
            start_frame,
            end_frame,
            kind,
        }
    }
}

/// Bounded history of recent bits, kept so a decode failure can be inspected later
///
/// Holds at most `capacity` events; pushing onto a full history drops the oldest.
/// A snapshot is a plain clone and no longer changes as the decoder moves on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BitHistory {
    capacity: usize,
    events: VecDeque<BitEvent>,
}

impl BitHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, event: BitEvent) {
        self.events.push_back(event);
        while self.events.len() > self.capacity {
            self.events.pop_front();
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events from oldest to newest
    pub fn events(&self) -> impl Iterator<Item = &BitEvent> {
        self.events.iter()
    }

    pub fn last(&self) -> Option<&BitEvent> {
        self.events.back()
    }

    /// Smallest and largest frame touched by any event, for rendering the section
    pub fn frame_range(&self) -> Option<(usize, usize)> {
        self.events.iter().fold(None, |range, event| {
            let lo = event.start_frame.min(event.end_frame);
            let hi = event.start_frame.max(event.end_frame);
            Some(match range {
                None => (lo, hi),
                Some((min, max)) => (min.min(lo), max.max(hi)),
            })
        })
    }
}
