//! Slice resolution over a sequence of known length.

use crate::error::{QueueError, Result};
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

/// A `start:stop:step` slice. Negative bounds count from the end and
/// out-of-range bounds are clamped to the sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: isize,
}

impl Slice {
    pub fn new(start: Option<isize>, stop: Option<isize>) -> Self {
        Self {
            start,
            stop,
            step: 1,
        }
    }

    /// Every element.
    pub fn full() -> Self {
        Self::new(None, None)
    }

    pub fn with_step(mut self, step: isize) -> Self {
        self.step = step;
        self
    }

    /// Positions selected in a sequence of `len` elements, in slice order.
    pub fn indices(&self, len: usize) -> Result<Vec<usize>> {
        if self.step == 0 {
            return Err(QueueError::UserError(
                "slice step cannot be zero".to_string(),
            ));
        }

        let len = len as isize;
        let (lower, upper) = if self.step > 0 {
            (0, len)
        } else {
            (-1, len - 1)
        };

        let clamp = |bound: isize| {
            let bound = if bound < 0 { bound + len } else { bound };
            bound.clamp(lower, upper)
        };

        let start = match self.start {
            Some(s) => clamp(s),
            None if self.step > 0 => lower,
            None => upper,
        };
        let stop = match self.stop {
            Some(s) => clamp(s),
            None if self.step > 0 => upper,
            None => lower,
        };

        let mut out = Vec::new();
        let mut i = start;
        while (self.step > 0 && i < stop) || (self.step < 0 && i > stop) {
            out.push(i as usize);
            i += self.step;
        }
        Ok(out)
    }
}

impl From<Range<isize>> for Slice {
    fn from(r: Range<isize>) -> Self {
        Slice::new(Some(r.start), Some(r.end))
    }
}

impl From<RangeFrom<isize>> for Slice {
    fn from(r: RangeFrom<isize>) -> Self {
        Slice::new(Some(r.start), None)
    }
}

impl From<RangeTo<isize>> for Slice {
    fn from(r: RangeTo<isize>) -> Self {
        Slice::new(None, Some(r.end))
    }
}

impl From<RangeFull> for Slice {
    fn from(_: RangeFull) -> Self {
        Slice::full()
    }
}

/// Resolve a single (possibly negative) index; `None` when out of range.
pub(crate) fn resolve_index(index: isize, len: usize) -> Option<usize> {
    let len = len as isize;
    let resolved = if index < 0 { index + len } else { index };
    (0..len).contains(&resolved).then_some(resolved as usize)
}
