use super::TestRegion;
use garm::assembly::AddValueFlag;
use garm::constraints::HangingNodeConstraints;
use garm::dof::{RegionKind, RegionVariableLayout};
use garm::mesh::{EdgeHangingNode, HangingNodeMap, SideHangingNode};
use garm::nalgebra::{DMatrix, DVector};
use garm::nalgebra_sparse::CsrMatrix;
use matrixcompare::assert_matrix_eq;
use proptest::prelude::*;

fn metal_layout() -> RegionVariableLayout {
    RegionVariableLayout::new(RegionKind::Metal, false)
}

/// Quad side with corners 0..4 and hanging node 4 at its centroid.
fn quad_side_region() -> (TestRegion, HangingNodeMap) {
    let mut region = TestRegion::new(5, 1);
    region.add_side(0, 0, vec![0, 1, 2, 3]);
    let mut map = HangingNodeMap::new();
    map.insert_on_side(SideHangingNode {
        node: 4,
        element: 0,
        side: 0,
    });
    (region, map)
}

/// Edge with endpoints 0, 1 and hanging node 2 at its center.
fn edge_region() -> (TestRegion, HangingNodeMap) {
    let mut region = TestRegion::new(3, 1);
    region.add_edge(0, 0, [0, 1]);
    let mut map = HangingNodeMap::new();
    map.insert_on_edge(EdgeHangingNode {
        node: 2,
        element: 0,
        edge: 0,
    });
    (region, map)
}

#[test]
fn quad_side_residual_redistributes_flux_and_interpolates() {
    let (region, map) = quad_side_region();
    let constraints = HangingNodeConstraints::new(&region, &map, metal_layout(), 0);

    // Diagonal differences: |v0 - v2| = 0 < |v1 - v3| = 10, so the supports
    // are {n0, n2} and the interpolated residual is V(H) - 0.5 * (v0 + v2).
    let x = DVector::from_vec(vec![0.0, 10.0, 0.0, 0.0, 7.0]);
    // The hanging-node row carries bulk flux q before the resolver runs.
    let q = 2.0;
    let mut f = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.0, q]);
    let mut flag = AddValueFlag::Add;

    constraints
        .residual_contribution(x.as_view(), &mut f, &mut flag)
        .unwrap();

    // Each of the four corners received exactly q / 4: no flux was created
    // or destroyed.
    for corner in 0..4 {
        assert_eq!(f[corner], q / 4.0);
    }
    assert_eq!(f[4], 7.0);
    assert_eq!(flag, AddValueFlag::Insert);
}

#[test]
fn quad_side_supports_are_the_flatter_diagonal() {
    let (region, map) = quad_side_region();
    let constraints = HangingNodeConstraints::new(&region, &map, metal_layout(), 0);

    // Now the {n1, n3} diagonal has the smaller disparity.
    let x = DVector::from_vec(vec![0.0, 3.0, 10.0, 3.0, 5.0]);
    let mut jac = DMatrix::zeros(5, 5);
    let mut flag = AddValueFlag::Add;

    constraints
        .jacobian_contribution(x.as_view(), &mut jac, &mut flag)
        .unwrap();

    // Constraint row couples the hanging node to nodes 1 and 3 only.
    let mut expected_row = DMatrix::zeros(1, 5);
    expected_row[(0, 1)] = -0.5;
    expected_row[(0, 3)] = -0.5;
    expected_row[(0, 4)] = 1.0;
    assert_matrix_eq!(jac.row(4).clone_owned(), expected_row);
}

#[test]
fn edge_jacobian_is_exact_and_replaces_stale_bulk_entries() {
    let (region, map) = edge_region();
    let constraints = HangingNodeConstraints::new(&region, &map, metal_layout(), 0);

    // Synthetic constraint instance: V(H) = 1, V(P1) = 2, V(P2) = 4.
    let x = DVector::from_vec(vec![2.0, 4.0, 1.0]);

    let mut f = DVector::from_vec(vec![0.0, 0.0, 3.0]);
    let mut flag = AddValueFlag::Add;
    constraints
        .residual_contribution(x.as_view(), &mut f, &mut flag)
        .unwrap();
    assert_eq!(f[2], 1.0 - 0.5 * (2.0 + 4.0));
    // edge flux split evenly over the two endpoints
    assert_eq!(f[0], 1.5);
    assert_eq!(f[1], 1.5);

    // Stale bulk entries in the hanging-node row must be redistributed, then
    // fully replaced by the 3-entry constraint pattern.
    let mut jac = DMatrix::from_row_slice(3, 3, &[
        2.0, -1.0, -1.0,
        -1.0, 2.0, -1.0,
        -4.0, -4.0, 8.0,
    ]);
    let mut flag = AddValueFlag::Add;
    constraints
        .jacobian_contribution(x.as_view(), &mut jac, &mut flag)
        .unwrap();

    let expected = DMatrix::from_row_slice(3, 3, &[
        0.0, -3.0, 3.0,
        -3.0, 0.0, 3.0,
        -0.5, -0.5, 1.0,
    ]);
    assert_matrix_eq!(jac, expected);
    assert_eq!(flag, AddValueFlag::Insert);
}

#[test]
fn csr_jacobian_path_matches_dense() {
    let (region, map) = edge_region();
    let constraints = HangingNodeConstraints::new(&region, &map, metal_layout(), 0);
    let x = DVector::from_vec(vec![2.0, 4.0, 1.0]);

    let bulk = DMatrix::from_row_slice(3, 3, &[
        2.0, -1.0, -1.0,
        -1.0, 2.0, -1.0,
        -4.0, -4.0, 8.0,
    ]);

    let mut dense = bulk.clone();
    let mut csr = CsrMatrix::from(&bulk);
    let mut flag = AddValueFlag::Add;
    constraints
        .jacobian_contribution(x.as_view(), &mut dense, &mut flag)
        .unwrap();
    let mut flag = AddValueFlag::Add;
    constraints
        .jacobian_contribution(x.as_view(), &mut csr, &mut flag)
        .unwrap();

    assert_matrix_eq!(DMatrix::from(&csr), dense);
}

#[test]
fn hanging_nodes_owned_by_other_processors_are_skipped() {
    let (mut region, map) = edge_region();
    region.set_owner(2, 1);
    let constraints = HangingNodeConstraints::new(&region, &map, metal_layout(), 0);

    let x = DVector::from_vec(vec![2.0, 4.0, 1.0]);
    let mut f = DVector::from_vec(vec![0.0, 0.0, 3.0]);
    let f_before = f.clone();
    let mut flag = AddValueFlag::Add;

    constraints
        .residual_contribution(x.as_view(), &mut f, &mut flag)
        .unwrap();

    assert_eq!(f, f_before);
}

#[test]
fn empty_map_is_a_no_op_and_leaves_the_flag_unchanged() {
    let region = TestRegion::new(3, 1);
    let map = HangingNodeMap::new();
    let constraints = HangingNodeConstraints::new(&region, &map, metal_layout(), 0);

    let x = DVector::from_vec(vec![1.0, 2.0, 3.0]);
    let mut f = DVector::from_vec(vec![4.0, 5.0, 6.0]);
    let f_before = f.clone();
    let mut jac = DMatrix::from_row_slice(3, 3, &[
        1.0, 0.0, 0.0,
        0.0, 1.0, 0.0,
        0.0, 0.0, 1.0,
    ]);
    let jac_before = jac.clone();
    let mut flag = AddValueFlag::Add;

    constraints
        .residual_contribution(x.as_view(), &mut f, &mut flag)
        .unwrap();
    constraints
        .jacobian_contribution(x.as_view(), &mut jac, &mut flag)
        .unwrap();

    assert_eq!(f, f_before);
    assert_eq!(jac, jac_before);
    assert_eq!(flag, AddValueFlag::Add);
}

#[test]
fn cleared_map_behaves_like_an_empty_map() {
    let (region, mut map) = edge_region();
    map.clear();
    assert!(map.is_empty());
    let constraints = HangingNodeConstraints::new(&region, &map, metal_layout(), 0);

    let x = DVector::from_vec(vec![2.0, 4.0, 1.0]);
    let mut f = DVector::from_vec(vec![0.0, 0.0, 3.0]);
    let f_before = f.clone();
    let mut flag = AddValueFlag::Add;

    constraints
        .residual_contribution(x.as_view(), &mut f, &mut flag)
        .unwrap();

    assert_eq!(f, f_before);
    assert_eq!(flag, AddValueFlag::Add);
}

#[test]
fn lattice_temperature_adds_a_second_constraint_equation() {
    // Metal region with the lattice temperature equation enabled: every node
    // carries two DOFs and the hanging node gets two constraint rows.
    let layout = RegionVariableLayout::new(RegionKind::Metal, true);
    let mut region = TestRegion::new(3, 2);
    region.add_edge(0, 0, [0, 1]);
    let mut map = HangingNodeMap::new();
    map.insert_on_edge(EdgeHangingNode {
        node: 2,
        element: 0,
        edge: 0,
    });
    let constraints = HangingNodeConstraints::new(&region, &map, layout, 0);

    // DOF blocks: [psi_0, T_0, psi_1, T_1, psi_H, T_H]
    let x = DVector::from_vec(vec![2.0, 300.0, 4.0, 320.0, 1.0, 400.0]);
    let mut f = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.0, 1.0, 2.0]);
    let mut flag = AddValueFlag::Add;

    constraints
        .residual_contribution(x.as_view(), &mut f, &mut flag)
        .unwrap();

    // potential: 1 - 0.5 * (2 + 4); temperature: 400 - 0.5 * (300 + 320)
    assert_eq!(f[4], -2.0);
    assert_eq!(f[5], 90.0);
    // per-variable flux redistribution
    assert_eq!(f[0], 0.5);
    assert_eq!(f[2], 0.5);
    assert_eq!(f[1], 1.0);
    assert_eq!(f[3], 1.0);
}

#[test]
#[should_panic(expected = "mesh invariant violated")]
fn unexpected_corner_count_is_fatal() {
    let mut region = TestRegion::new(4, 1);
    region.add_side(0, 0, vec![0, 1, 2]);
    let mut map = HangingNodeMap::new();
    map.insert_on_side(SideHangingNode {
        node: 3,
        element: 0,
        side: 0,
    });
    let constraints = HangingNodeConstraints::new(&region, &map, metal_layout(), 0);

    let x = DVector::from_vec(vec![0.0; 4]);
    let mut f = DVector::from_vec(vec![0.0; 4]);
    let mut flag = AddValueFlag::Add;
    let _ = constraints.residual_contribution(x.as_view(), &mut f, &mut flag);
}

proptest! {
    /// Conservation: whatever flux the hanging-node row held before the
    /// resolver runs is recovered exactly (up to roundoff) as the sum of the
    /// corner-row contributions.
    #[test]
    fn side_flux_transfer_conserves_total_flux(
        q in -1.0e3..1.0e3f64,
        corners in prop::collection::vec(-10.0..10.0f64, 4),
        v_hanging in -10.0..10.0f64,
    ) {
        let (region, map) = quad_side_region();
        let constraints = HangingNodeConstraints::new(&region, &map, metal_layout(), 0);

        let mut values = corners.clone();
        values.push(v_hanging);
        let x = DVector::from_vec(values);
        let mut f = DVector::from_vec(vec![0.0, 0.0, 0.0, 0.0, q]);
        let mut flag = AddValueFlag::Add;

        constraints
            .residual_contribution(x.as_view(), &mut f, &mut flag)
            .unwrap();

        let redistributed: f64 = (0..4).map(|i| f[i]).sum();
        prop_assert!((redistributed - q).abs() <= 1e-12 * q.abs().max(1.0));
    }
}
