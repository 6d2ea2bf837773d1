//! Row-level access to the shared residual vector and Jacobian matrix.
//!
//! The linear-algebra backend is an external collaborator; the resolver only
//! relies on three row operations: weighted row-to-row accumulation, row
//! zeroing and indexed insertion with set (last-writer-wins) semantics.
//! Implementations are provided for `nalgebra` dense vectors/matrices and for
//! `nalgebra-sparse` CSR matrices.

use itertools::izip;
use nalgebra::{DMatrix, DVector, RealField};
use nalgebra_sparse::{CsrMatrix, SparseEntryMut};
use std::error::Error;
use std::fmt;
use std::fmt::Display;

/// The flush mode the outer assembly loop must use for the shared vector or
/// matrix after a batch of operations.
///
/// Bulk assembly accumulates with `Add`; the constraint resolver finalizes
/// hanging-node rows with `Insert` and reports the switch back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddValueFlag {
    Add,
    Insert,
}

#[derive(Debug)]
pub enum AssemblyError {
    /// A row index was outside the bounds of the vector or matrix.
    RowOutOfBounds { row: usize, nrows: usize },
    /// A column index was outside the bounds of the matrix.
    ColumnOutOfBounds { col: usize, ncols: usize },
    /// An insertion targeted an entry missing from the sparsity pattern.
    ColumnNotInPattern { row: usize, col: usize },
}

impl Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            &AssemblyError::RowOutOfBounds { row, nrows } => {
                write!(f, "Row index {} out of bounds ({} rows).", row, nrows)
            }
            &AssemblyError::ColumnOutOfBounds { col, ncols } => {
                write!(f, "Column index {} out of bounds ({} columns).", col, ncols)
            }
            &AssemblyError::ColumnNotInPattern { row, col } => {
                write!(f, "Entry ({}, {}) is not in the sparsity pattern.", row, col)
            }
        }
    }
}

impl Error for AssemblyError {}

/// A global residual vector supporting the row operations the constraint
/// resolver needs.
pub trait GlobalVector<T> {
    /// `self[dst] += alpha * self[src]`.
    fn add_row_to_row(&mut self, src: usize, dst: usize, alpha: T) -> Result<(), AssemblyError>;

    /// `self[row] = value` (set semantics, not additive).
    fn insert(&mut self, row: usize, value: T) -> Result<(), AssemblyError>;
}

/// A global Jacobian matrix supporting the row operations the constraint
/// resolver needs.
pub trait GlobalMatrix<T> {
    /// `self.row(dst) += alpha * self.row(src)`.
    fn add_row_to_row(&mut self, src: usize, dst: usize, alpha: T) -> Result<(), AssemblyError>;

    /// Zero out all entries of the given rows.
    fn zero_rows(&mut self, rows: &[usize]) -> Result<(), AssemblyError>;

    /// `self[(row, cols[k])] = values[k]` for each `k` (set semantics).
    fn insert_row(&mut self, row: usize, cols: &[usize], values: &[T]) -> Result<(), AssemblyError>;
}

fn check_row(row: usize, nrows: usize) -> Result<(), AssemblyError> {
    if row < nrows {
        Ok(())
    } else {
        Err(AssemblyError::RowOutOfBounds { row, nrows })
    }
}

fn check_col(col: usize, ncols: usize) -> Result<(), AssemblyError> {
    if col < ncols {
        Ok(())
    } else {
        Err(AssemblyError::ColumnOutOfBounds { col, ncols })
    }
}

impl<T: RealField + Copy> GlobalVector<T> for DVector<T> {
    fn add_row_to_row(&mut self, src: usize, dst: usize, alpha: T) -> Result<(), AssemblyError> {
        check_row(src, self.nrows())?;
        check_row(dst, self.nrows())?;
        let contribution = alpha * self[src];
        self[dst] += contribution;
        Ok(())
    }

    fn insert(&mut self, row: usize, value: T) -> Result<(), AssemblyError> {
        check_row(row, self.nrows())?;
        self[row] = value;
        Ok(())
    }
}

impl<T: RealField + Copy> GlobalMatrix<T> for DMatrix<T> {
    fn add_row_to_row(&mut self, src: usize, dst: usize, alpha: T) -> Result<(), AssemblyError> {
        check_row(src, self.nrows())?;
        check_row(dst, self.nrows())?;
        for j in 0..self.ncols() {
            let contribution = alpha * self[(src, j)];
            self[(dst, j)] += contribution;
        }
        Ok(())
    }

    fn zero_rows(&mut self, rows: &[usize]) -> Result<(), AssemblyError> {
        for &row in rows {
            check_row(row, self.nrows())?;
            self.row_mut(row).fill(T::zero());
        }
        Ok(())
    }

    fn insert_row(&mut self, row: usize, cols: &[usize], values: &[T]) -> Result<(), AssemblyError> {
        check_row(row, self.nrows())?;
        for (&col, &value) in izip!(cols, values) {
            check_col(col, self.ncols())?;
            self[(row, col)] = value;
        }
        Ok(())
    }
}

impl<T: RealField + Copy> GlobalMatrix<T> for CsrMatrix<T> {
    fn add_row_to_row(&mut self, src: usize, dst: usize, alpha: T) -> Result<(), AssemblyError> {
        check_row(src, self.nrows())?;
        check_row(dst, self.nrows())?;
        let ncols = self.ncols();

        // The source row must be copied out before mutating the destination
        // row, since both borrow the same storage.
        let src_row = self.row(src);
        let src_entries: Vec<(usize, T)> = izip!(src_row.col_indices(), src_row.values())
            .map(|(&col, &value)| (col, value))
            .collect();

        for (col, value) in src_entries {
            match self.get_entry_mut(dst, col) {
                Some(SparseEntryMut::NonZero(entry)) => *entry += alpha * value,
                Some(SparseEntryMut::Zero) => {
                    return Err(AssemblyError::ColumnNotInPattern { row: dst, col })
                }
                None => return Err(AssemblyError::ColumnOutOfBounds { col, ncols }),
            }
        }
        Ok(())
    }

    fn zero_rows(&mut self, rows: &[usize]) -> Result<(), AssemblyError> {
        let nrows = self.nrows();
        for &row in rows {
            let mut csr_row = self
                .get_row_mut(row)
                .ok_or(AssemblyError::RowOutOfBounds { row, nrows })?;
            csr_row.values_mut().fill(T::zero());
        }
        Ok(())
    }

    fn insert_row(&mut self, row: usize, cols: &[usize], values: &[T]) -> Result<(), AssemblyError> {
        check_row(row, self.nrows())?;
        let ncols = self.ncols();
        for (&col, &value) in izip!(cols, values) {
            match self.get_entry_mut(row, col) {
                Some(SparseEntryMut::NonZero(entry)) => *entry = value,
                Some(SparseEntryMut::Zero) => {
                    return Err(AssemblyError::ColumnNotInPattern { row, col })
                }
                None => return Err(AssemblyError::ColumnOutOfBounds { col, ncols }),
            }
        }
        Ok(())
    }
}
