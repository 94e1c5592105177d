//! Deferred byte-level rewrite of an image.
//!
//! A [`RewritePlan`] collects three kinds of steps against an original buffer and produces the
//! rewritten buffer in one pass:
//!
//! 1. **moves** copy a range of the *original* bytes to a new offset,
//! 2. **fills** zero a range of the output,
//! 3. **patches** write bytes into the output.
//!
//! Moves always read the original, so their relative order never matters. Fills run after all
//! moves and patches run last, in insertion order. Every step is range-checked up front: a plan
//! that does not fit its declared output length fails as a whole and produces nothing.

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Move {
    from: u64,
    len: u64,
    to: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fill {
    offset: u64,
    len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Patch {
    offset: u64,
    bytes: Vec<u8>,
}

/// Ordered rewrite steps producing a new image from an original one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewritePlan {
    new_len: u64,
    moves: Vec<Move>,
    fills: Vec<Fill>,
    patches: Vec<Patch>,
}

impl RewritePlan {
    /// Starts an identity plan over an original of `len` bytes.
    #[must_use]
    pub fn new(len: u64) -> Self {
        RewritePlan {
            new_len: len,
            moves: Vec::new(),
            fills: Vec::new(),
            patches: Vec::new(),
        }
    }

    /// Length of the output.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.new_len
    }

    /// Returns `true` if the output is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_len == 0
    }

    /// Returns `true` if the plan has no steps and keeps the length.
    #[must_use]
    pub fn is_identity(&self, original_len: u64) -> bool {
        self.new_len == original_len
            && self.moves.is_empty()
            && self.fills.is_empty()
            && self.patches.is_empty()
    }

    /// Truncates or zero-extends the output.
    pub fn resize(&mut self, len: u64) -> &mut Self {
        self.new_len = len;
        self
    }

    /// Copies `len` original bytes from `from` to `to`.
    pub fn move_range(&mut self, from: u64, len: u64, to: u64) -> &mut Self {
        if len != 0 && from != to {
            self.moves.push(Move { from, len, to });
        }
        self
    }

    /// Zeroes `len` output bytes at `offset`.
    pub fn fill(&mut self, offset: u64, len: u64) -> &mut Self {
        if len != 0 {
            self.fills.push(Fill { offset, len });
        }
        self
    }

    /// Writes `bytes` at `offset` in the output.
    pub fn patch_bytes(&mut self, offset: u64, bytes: Vec<u8>) -> &mut Self {
        if !bytes.is_empty() {
            self.patches.push(Patch { offset, bytes });
        }
        self
    }

    /// Writes the low `width` bytes of `value`, little-endian.
    pub fn patch(&mut self, offset: u64, width: u8, value: u64) -> &mut Self {
        let bytes = value.to_le_bytes()[..usize::from(width.min(8))].to_vec();
        self.patch_bytes(offset, bytes)
    }

    /// Writes a `u16` patch.
    pub fn patch_u16(&mut self, offset: u64, value: u16) -> &mut Self {
        self.patch(offset, 2, u64::from(value))
    }

    /// Writes a `u32` patch.
    pub fn patch_u32(&mut self, offset: u64, value: u32) -> &mut Self {
        self.patch(offset, 4, u64::from(value))
    }

    /// Produces the rewritten bytes.
    ///
    /// # Errors
    /// Returns [`Error::WriteLayoutFailed`] if a step reads past the original or writes past
    /// the output length.
    pub fn apply(&self, original: &[u8]) -> Result<Vec<u8>> {
        let original_len = original.len() as u64;
        let new_len = usize::try_from(self.new_len).map_err(|_| Error::WriteLayoutFailed {
            message: format!("output length {} does not fit in memory", self.new_len),
        })?;

        let in_output = |offset: u64, len: u64, what: &str| -> Result<()> {
            match offset.checked_add(len) {
                Some(end) if end <= self.new_len => Ok(()),
                _ => Err(Error::WriteLayoutFailed {
                    message: format!(
                        "{what} of {len} bytes at 0x{offset:x} exceeds the output length 0x{:x}",
                        self.new_len
                    ),
                }),
            }
        };

        for step in &self.moves {
            if step.from.checked_add(step.len).map_or(true, |end| end > original_len) {
                return Err(Error::WriteLayoutFailed {
                    message: format!(
                        "move source 0x{:x}+0x{:x} exceeds the original length 0x{original_len:x}",
                        step.from, step.len
                    ),
                });
            }
            in_output(step.to, step.len, "move")?;
        }
        for step in &self.fills {
            in_output(step.offset, step.len, "fill")?;
        }
        for step in &self.patches {
            in_output(step.offset, step.bytes.len() as u64, "patch")?;
        }

        let mut output = original[..original.len().min(new_len)].to_vec();
        output.resize(new_len, 0);

        for step in &self.moves {
            let source = &original[step.from as usize..(step.from + step.len) as usize];
            output[step.to as usize..(step.to + step.len) as usize].copy_from_slice(source);
        }
        for step in &self.fills {
            output[step.offset as usize..(step.offset + step.len) as usize].fill(0);
        }
        for step in &self.patches {
            let start = step.offset as usize;
            output[start..start + step.bytes.len()].copy_from_slice(&step.bytes);
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity() {
        let plan = RewritePlan::new(4);
        assert!(plan.is_identity(4));
        assert_eq!(plan.apply(&[1, 2, 3, 4]).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn moves_read_the_original() {
        let mut plan = RewritePlan::new(6);
        // overlapping shift right by two, then the vacated bytes are cleared
        plan.resize(8).move_range(2, 4, 4).fill(2, 2);
        plan.patch_u16(0, 0xBBAA);

        let out = plan.apply(&[0, 1, 2, 3, 4, 5]).unwrap();
        assert_eq!(out, vec![0xAA, 0xBB, 0, 0, 2, 3, 4, 5]);
    }

    #[test]
    fn patches_apply_in_order() {
        let mut plan = RewritePlan::new(4);
        plan.patch_u32(0, 0x1111_1111).patch(1, 1, 0x22);

        assert_eq!(plan.apply(&[0; 4]).unwrap(), vec![0x11, 0x22, 0x11, 0x11]);
    }

    #[test]
    fn out_of_range_steps_fail_whole_plan() {
        let mut plan = RewritePlan::new(4);
        plan.patch_u32(2, 0);
        assert!(matches!(
            plan.apply(&[0; 4]),
            Err(Error::WriteLayoutFailed { .. })
        ));

        let mut plan = RewritePlan::new(8);
        plan.move_range(2, 4, 0);
        assert!(plan.apply(&[0; 4]).is_err());
    }

    #[test]
    fn truncate() {
        let mut plan = RewritePlan::new(4);
        plan.resize(2);
        assert_eq!(plan.apply(&[1, 2, 3, 4]).unwrap(), vec![1, 2]);
    }
}
