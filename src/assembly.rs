//! Batched mutation of the shared residual vector and Jacobian matrix.

pub mod buffers;
pub mod global;

pub use buffers::{ConstraintBatch, ConstraintRow, FluxTransfer};
pub use global::{AddValueFlag, AssemblyError, GlobalMatrix, GlobalVector};
