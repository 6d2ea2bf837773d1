//! Hanging-node constraint resolution.
//!
//! A hanging node sits at the centroid of an element side (2D refinement) or
//! at the center of an element edge (3D refinement) and is not an independent
//! unknown: its value must equal the average of two designated support nodes.
//! For every variable carried by the node, the resolver
//!
//! 1. redistributes the flux accumulated in the hanging node's row to all
//!    corner nodes of the side/edge, with equal weights summing to one, and
//! 2. overwrites the row with the interpolation constraint
//!    `V - 0.5 * (V(P1) + V(P2))`.
//!
//! The two interpolation supports of a 4-node quad side are the diagonal pair
//! with the smaller potential disparity; the pair with closer values is less
//! likely to straddle a sharp gradient. The flux is nevertheless spread over
//! all four corners. For 2-node sides and for edges the two available nodes
//! are always the supports.
//!
//! The Jacobian pass recomputes the same formulas with three-direction dual
//! numbers seeded over the hanging node and its two supports, and applies the
//! resulting rows through the ordered batch flush (transfer, zero, insert).

use crate::assembly::buffers::ConstraintBatch;
use crate::assembly::global::{AddValueFlag, AssemblyError, GlobalMatrix, GlobalVector};
use crate::autodiff::Dual3;
use crate::dof::{RegionVariableLayout, VariableKind};
use crate::mesh::{FvmNode, HangingNodeMap, NodeId, ProcessorId, RegionConnectivity};
use crate::Real;
use log::debug;
use nalgebra::DVectorView;
use numeric_literals::replace_float_literals;

/// Resolver for the hanging-node constraints of one region.
///
/// The solution vector passed to the contribution methods is the local
/// (owned + ghost) vector, indexed by local offsets; all emitted rows and
/// columns use global offsets.
pub struct HangingNodeConstraints<'a, C> {
    region: &'a C,
    map: &'a HangingNodeMap,
    layout: RegionVariableLayout,
    local_processor: ProcessorId,
}

impl<'a, C: RegionConnectivity> HangingNodeConstraints<'a, C> {
    pub fn new(
        region: &'a C,
        map: &'a HangingNodeMap,
        layout: RegionVariableLayout,
        local_processor: ProcessorId,
    ) -> Self {
        Self {
            region,
            map,
            layout,
            local_processor,
        }
    }

    /// Fold the hanging-node constraints into the residual vector.
    ///
    /// A no-op when the region has no hanging nodes, leaving `add_value_flag`
    /// untouched; otherwise the flag is set to [`AddValueFlag::Insert`] so the
    /// outer assembly loop flushes the vector in insert mode.
    pub fn residual_contribution<T: Real>(
        &self,
        x: DVectorView<T>,
        f: &mut impl GlobalVector<T>,
        add_value_flag: &mut AddValueFlag,
    ) -> Result<(), AssemblyError> {
        if self.map.is_empty() {
            return Ok(());
        }

        // Hanging nodes on side centers.
        let mut batch = ConstraintBatch::new();
        for entry in self.map.on_side() {
            let hanging = self.region.fvm_node(entry.node);
            if hanging.processor_id != self.local_processor {
                continue;
            }
            let corners = self.collect_corners(self.region.side_nodes(entry.element, entry.side));
            self.buffer_residual(&x, hanging, &corners, &mut batch);
        }
        debug!(
            "hanging-node side pass (residual): {} transfers, {} overwrites",
            batch.num_transfers(),
            batch.num_constraint_rows()
        );
        batch.flush_vector(f)?;

        // Hanging nodes on edge centers.
        let mut batch = ConstraintBatch::new();
        for entry in self.map.on_edge() {
            let hanging = self.region.fvm_node(entry.node);
            if hanging.processor_id != self.local_processor {
                continue;
            }
            let corners = self.collect_corners(&self.region.edge_nodes(entry.element, entry.edge));
            self.buffer_residual(&x, hanging, &corners, &mut batch);
        }
        debug!(
            "hanging-node edge pass (residual): {} transfers, {} overwrites",
            batch.num_transfers(),
            batch.num_constraint_rows()
        );
        batch.flush_vector(f)?;

        *add_value_flag = AddValueFlag::Insert;
        Ok(())
    }

    /// Fold the hanging-node constraints into the Jacobian matrix.
    ///
    /// Same structure as [`Self::residual_contribution`]; each constraint row
    /// carries exactly three entries, obtained from the dual-number evaluation
    /// of the interpolation formula.
    pub fn jacobian_contribution<T: Real>(
        &self,
        x: DVectorView<T>,
        jac: &mut impl GlobalMatrix<T>,
        add_value_flag: &mut AddValueFlag,
    ) -> Result<(), AssemblyError> {
        if self.map.is_empty() {
            return Ok(());
        }

        let mut batch = ConstraintBatch::new();
        for entry in self.map.on_side() {
            let hanging = self.region.fvm_node(entry.node);
            if hanging.processor_id != self.local_processor {
                continue;
            }
            let corners = self.collect_corners(self.region.side_nodes(entry.element, entry.side));
            self.buffer_jacobian(&x, hanging, &corners, &mut batch);
        }
        debug!(
            "hanging-node side pass (jacobian): {} transfers, {} constraint rows",
            batch.num_transfers(),
            batch.num_constraint_rows()
        );
        batch.flush_matrix(jac)?;

        let mut batch = ConstraintBatch::new();
        for entry in self.map.on_edge() {
            let hanging = self.region.fvm_node(entry.node);
            if hanging.processor_id != self.local_processor {
                continue;
            }
            let corners = self.collect_corners(&self.region.edge_nodes(entry.element, entry.edge));
            self.buffer_jacobian(&x, hanging, &corners, &mut batch);
        }
        debug!(
            "hanging-node edge pass (jacobian): {} transfers, {} constraint rows",
            batch.num_transfers(),
            batch.num_constraint_rows()
        );
        batch.flush_matrix(jac)?;

        *add_value_flag = AddValueFlag::Insert;
        Ok(())
    }

    fn collect_corners(&self, corners: &[NodeId]) -> Vec<&'a FvmNode> {
        corners.iter().map(|&n| self.region.fvm_node(n)).collect()
    }

    fn variable_offset(&self, variable: VariableKind) -> usize {
        self.layout
            .variable_offset(variable)
            .expect("constrained variable missing from region layout")
    }

    /// Buffer flux transfers for every (variable, corner) pair. The weight
    /// denominator is the geometric corner count of the side/edge, not the
    /// two interpolation supports, so that each corner receives an equal
    /// share of the hanging node's flux and the weights sum to one.
    fn buffer_transfers<T: Real>(
        &self,
        hanging: &FvmNode,
        corners: &[&FvmNode],
        batch: &mut ConstraintBatch<T>,
    ) {
        let weight = T::one() / T::from_usize(corners.len()).unwrap();
        for corner in corners {
            for variable in self.layout.constrained_variables() {
                let offset = self.variable_offset(variable);
                batch.push_transfer(
                    hanging.global_offset + offset,
                    corner.global_offset + offset,
                    weight,
                );
            }
        }
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn buffer_residual<T: Real>(
        &self,
        x: &DVectorView<T>,
        hanging: &FvmNode,
        corners: &[&FvmNode],
        batch: &mut ConstraintBatch<T>,
    ) {
        self.buffer_transfers(hanging, corners, batch);

        let psi_offset = self.variable_offset(VariableKind::Potential);
        let (p1, p2) = interpolation_supports(x, psi_offset, corners);

        for variable in self.layout.constrained_variables() {
            let offset = self.variable_offset(variable);
            let v = x[hanging.local_offset + offset];
            let v1 = x[p1.local_offset + offset];
            let v2 = x[p2.local_offset + offset];
            batch.push_residual(hanging.global_offset + offset, v - 0.5 * (v1 + v2));
        }
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn buffer_jacobian<T: Real>(
        &self,
        x: &DVectorView<T>,
        hanging: &FvmNode,
        corners: &[&FvmNode],
        batch: &mut ConstraintBatch<T>,
    ) {
        self.buffer_transfers(hanging, corners, batch);

        let psi_offset = self.variable_offset(VariableKind::Potential);
        let (p1, p2) = interpolation_supports(x, psi_offset, corners);

        for variable in self.layout.constrained_variables() {
            let offset = self.variable_offset(variable);

            // Three independent directions per constraint equation: the
            // hanging node and its two interpolation supports.
            let v = Dual3::variable(x[hanging.local_offset + offset], 0);
            let v1 = Dual3::variable(x[p1.local_offset + offset], 1);
            let v2 = Dual3::variable(x[p2.local_offset + offset], 2);

            let ff = v - (v1 + v2).scale(0.5);

            batch.push_constraint_row(
                hanging.global_offset + offset,
                [
                    hanging.global_offset + offset,
                    p1.global_offset + offset,
                    p2.global_offset + offset,
                ],
                *ff.derivatives(),
            );
        }
    }
}

/// Select the two interpolation supports among the corner nodes of a side or
/// edge.
///
/// For a 4-node quad side, the supports are the diagonal pair whose current
/// potential values differ the least.
///
/// # Panics
///
/// Panics if the corner count is neither 2 nor 4: the mesh invariant "sides
/// are edges or quads, edges are always 2-node" has been violated, which is
/// not a recoverable condition.
fn interpolation_supports<'b, T: Real>(
    x: &DVectorView<T>,
    psi_offset: usize,
    corners: &[&'b FvmNode],
) -> (&'b FvmNode, &'b FvmNode) {
    match corners {
        &[p1, p2] => (p1, p2),
        &[n0, n1, n2, n3] => {
            let dv1 = (x[n0.local_offset + psi_offset] - x[n2.local_offset + psi_offset]).abs();
            let dv2 = (x[n1.local_offset + psi_offset] - x[n3.local_offset + psi_offset]).abs();
            if dv1 < dv2 {
                (n0, n2)
            } else {
                (n1, n3)
            }
        }
        _ => panic!(
            "mesh invariant violated: element side with {} corner nodes \
             (sides must be 2-node edges or 4-node quads)",
            corners.len()
        ),
    }
}
