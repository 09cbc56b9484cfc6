//! Grid-shaped result storage.

use crate::error::{Result, SweepError};
use crate::grid::ParameterGrid;

/// Pre-allocated slots, one per grid point, each written exactly once.
///
/// Slots are never readable while the buffer is being filled; the only way
/// to get at the values is [`ResultBuffer::finish`], which refuses to hand out
/// a partially filled grid.
#[derive(Debug)]
pub struct ResultBuffer<R> {
    names: Vec<String>,
    shape: Vec<usize>,
    slots: Vec<Option<R>>,
    filled: usize,
}

impl<R> ResultBuffer<R> {
    pub fn new(grid: &ParameterGrid) -> Self {
        Self {
            names: grid.names().to_vec(),
            shape: grid.shape(),
            slots: (0..grid.len()).map(|_| None).collect(),
            filled: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    /// Store the result for flat index `index`.
    pub fn write(&mut self, index: usize, value: R) -> Result<()> {
        let len = self.slots.len();
        let slot = self.slots.get_mut(index).ok_or_else(|| {
            SweepError::Collection(format!("result index {index} outside grid of {len} points"))
        })?;

        if slot.is_some() {
            return Err(SweepError::Collection(format!(
                "result for index {index} delivered twice"
            )));
        }

        *slot = Some(value);
        self.filled += 1;
        Ok(())
    }

    /// Convert into a [`SweepResult`] once every slot is filled.
    pub fn finish(self) -> Result<SweepResult<R>> {
        if !self.is_complete() {
            let missing = self.slots.iter().position(Option::is_none).unwrap_or(0);
            return Err(SweepError::Collection(format!(
                "{} of {} results missing (first missing index {missing})",
                self.slots.len() - self.filled,
                self.slots.len()
            )));
        }

        Ok(SweepResult {
            names: self.names,
            shape: self.shape,
            values: self.slots.into_iter().flatten().collect(),
        })
    }
}

/// Fully populated sweep output, shaped like its grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult<R> {
    names: Vec<String>,
    shape: Vec<usize>,
    values: Vec<R>,
}

impl<R> SweepResult<R> {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at a per-dimension index, `None` if out of range.
    pub fn get(&self, multi_index: &[usize]) -> Option<&R> {
        if multi_index.len() != self.shape.len() {
            return None;
        }

        let mut flat = 0;
        for (&i, &dim) in multi_index.iter().zip(&self.shape) {
            if i >= dim {
                return None;
            }
            flat = flat * dim + i;
        }
        self.values.get(flat)
    }

    /// Values in row-major grid order.
    pub fn values(&self) -> &[R] {
        &self.values
    }

    pub fn into_values(self) -> Vec<R> {
        self.values
    }

    /// `(flat index, value)` pairs in grid order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &R)> + '_ {
        self.values.iter().enumerate()
    }

    pub fn map<U, F>(self, f: F) -> SweepResult<U>
    where
        F: FnMut(R) -> U,
    {
        SweepResult {
            names: self.names,
            shape: self.shape,
            values: self.values.into_iter().map(f).collect(),
        }
    }
}
