//! Buffered constraint batches with structurally enforced flush ordering.
//!
//! Per pass, the resolver collects flux-transfer records and constraint rows
//! into a [`ConstraintBatch`], then flushes the whole batch against the shared
//! vector or matrix. The flush order is a strict contract:
//!
//! 1. all row-to-row transfers (the existing content of hanging-node rows is
//!    redistributed, not lost),
//! 2. zeroing of every row about to receive a constraint equation (matrix
//!    path only, removing stale bulk-assembly entries),
//! 3. insertion of the constraint equations with set semantics.
//!
//! The batch is consumed by the flush, so no record can be applied out of
//! order or twice.

use crate::assembly::global::{AssemblyError, GlobalMatrix, GlobalVector};
use nalgebra::RealField;

/// Moves `weight` times the accumulated content of `src_row` into `dst_row`
/// before `src_row` is overwritten by its constraint equation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluxTransfer<T> {
    pub src_row: usize,
    pub dst_row: usize,
    pub weight: T,
}

/// The local Jacobian block of one constraint equation: a row with exactly
/// three entries (the hanging node and its two interpolation supports).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstraintRow<T> {
    pub row: usize,
    pub cols: [usize; 3],
    pub values: [T; 3],
}

/// One pass worth of buffered constraint records.
#[derive(Debug, Clone)]
pub struct ConstraintBatch<T> {
    transfers: Vec<FluxTransfer<T>>,
    residuals: Vec<(usize, T)>,
    rows: Vec<ConstraintRow<T>>,
}

impl<T: RealField + Copy> Default for ConstraintBatch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: RealField + Copy> ConstraintBatch<T> {
    pub fn new() -> Self {
        Self {
            transfers: Vec::new(),
            residuals: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transfers.is_empty() && self.residuals.is_empty() && self.rows.is_empty()
    }

    pub fn push_transfer(&mut self, src_row: usize, dst_row: usize, weight: T) {
        self.transfers.push(FluxTransfer { src_row, dst_row, weight });
    }

    /// Buffer a residual overwrite for the given row (vector path).
    pub fn push_residual(&mut self, row: usize, value: T) {
        self.residuals.push((row, value));
    }

    /// Buffer a constraint equation's Jacobian row (matrix path).
    pub fn push_constraint_row(&mut self, row: usize, cols: [usize; 3], values: [T; 3]) {
        self.rows.push(ConstraintRow { row, cols, values });
    }

    pub fn num_transfers(&self) -> usize {
        self.transfers.len()
    }

    pub fn num_constraint_rows(&self) -> usize {
        self.residuals.len() + self.rows.len()
    }

    /// Apply the batch to the shared residual vector: transfers first, then
    /// the buffered overwrites.
    pub fn flush_vector(self, f: &mut impl GlobalVector<T>) -> Result<(), AssemblyError> {
        // Non-finite residuals indicate a numeric pathology upstream; in
        // release builds they propagate into the vector and are left to the
        // outer Newton convergence logic.
        debug_assert!(
            self.residuals.iter().all(|(_, v)| v.is_finite()),
            "non-finite residual in hanging-node constraint batch"
        );

        for transfer in &self.transfers {
            f.add_row_to_row(transfer.src_row, transfer.dst_row, transfer.weight)?;
        }
        for (row, value) in self.residuals {
            f.insert(row, value)?;
        }
        Ok(())
    }

    /// Apply the batch to the shared Jacobian matrix: transfers, then zeroing
    /// of every constraint row, then insertion of the new entries.
    pub fn flush_matrix(self, jac: &mut impl GlobalMatrix<T>) -> Result<(), AssemblyError> {
        for transfer in &self.transfers {
            jac.add_row_to_row(transfer.src_row, transfer.dst_row, transfer.weight)?;
        }

        let row_indices: Vec<usize> = self.rows.iter().map(|r| r.row).collect();
        jac.zero_rows(&row_indices)?;

        for row in self.rows {
            jac.insert_row(row.row, &row.cols, &row.values)?;
        }
        Ok(())
    }
}
