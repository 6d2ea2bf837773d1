//! Nonlinear equation assembly for finite-volume device simulation on
//! adaptively refined, possibly non-conforming meshes.
//!
//! The crate provides the pieces that fold hanging-node constraints into a
//! coupled nonlinear system during Newton iteration:
//!
//! - [`constraints`]: the hanging-node constraint resolver, which interpolates
//!   the value of each hanging node from its support nodes and redistributes
//!   the node's flux to its geometric neighbors so that global conservation
//!   is preserved.
//! - [`autodiff`]: fixed-width forward-mode dual numbers used to produce the
//!   exact local Jacobian of each constraint equation.
//! - [`assembly`]: batched, order-enforcing mutation of the shared residual
//!   vector and Jacobian matrix (row transfer, row zeroing, insertion).
//! - [`damping`]: Newton step safeguards (potential limiting, Bank-Rose,
//!   positive carrier density) exposed as a post-line-search hook.
//!
//! Mesh topology, material data and linear solvers are external collaborators;
//! the interfaces consumed from the mesh side live in [`mesh`] and [`dof`].

use nalgebra::RealField;

pub mod assembly;
pub mod autodiff;
pub mod constraints;
pub mod damping;
pub mod dof;
pub mod mesh;

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

/// Trait alias for the real scalar types accepted by the assembly routines.
pub trait Real: RealField + Copy {}

impl<T: RealField + Copy> Real for T {}
