//! Mesh-side interface consumed by the constraint resolver.
//!
//! Mesh topology, refinement and redistribution are owned by an external
//! collaborator. This module defines the records the resolver reads from it:
//! per-node degree-of-freedom addressing, the hanging-node maps rebuilt once
//! per mesh state, and the connectivity lookups that decompose an element
//! into side/edge corner nodes.

/// Index of a mesh node within a region.
pub type NodeId = usize;

/// Index of an element within a region.
pub type ElementId = usize;

/// Identifier of one of the cooperating processes.
pub type ProcessorId = usize;

/// Degree-of-freedom addressing for one mesh node.
///
/// `global_offset` is the first row of the node's DOF block in the global
/// system and is stable for the lifetime of the mesh. `local_offset` addresses
/// the same block within this processor's owned+ghost solution vector and is
/// stable until the next mesh redistribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FvmNode {
    pub global_offset: usize,
    pub local_offset: usize,
    /// The unique owning processor. Other processors may hold ghost copies,
    /// but only the owner assembles this node's constraint equations.
    pub processor_id: ProcessorId,
}

/// A hanging node lying at the centroid of an element side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideHangingNode {
    pub node: NodeId,
    pub element: ElementId,
    /// Local side index within `element`.
    pub side: usize,
}

/// A hanging node lying at the center of an element edge (3D refinement).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeHangingNode {
    pub node: NodeId,
    pub element: ElementId,
    /// Local edge index within `element`.
    pub edge: usize,
}

/// The hanging nodes of a region, classified by geometric location.
///
/// The map is rebuilt by the mesh collaborator once per mesh state change and
/// is read-only during a nonlinear solve. The two categories are independent:
/// the resolver runs one pass over each, in either order.
#[derive(Debug, Clone, Default)]
pub struct HangingNodeMap {
    on_side: Vec<SideHangingNode>,
    on_edge: Vec<EdgeHangingNode>,
}

impl HangingNodeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard all entries, e.g. before re-deriving the map for a new mesh state.
    pub fn clear(&mut self) {
        self.on_side.clear();
        self.on_edge.clear();
    }

    pub fn insert_on_side(&mut self, entry: SideHangingNode) {
        self.on_side.push(entry);
    }

    pub fn insert_on_edge(&mut self, entry: EdgeHangingNode) {
        self.on_edge.push(entry);
    }

    pub fn on_side(&self) -> &[SideHangingNode] {
        &self.on_side
    }

    pub fn on_edge(&self) -> &[EdgeHangingNode] {
        &self.on_edge
    }

    pub fn is_empty(&self) -> bool {
        self.on_side.is_empty() && self.on_edge.is_empty()
    }
}

/// Connectivity lookups the resolver consumes from the mesh collaborator.
pub trait RegionConnectivity {
    /// DOF addressing record of the given node.
    fn fvm_node(&self, node: NodeId) -> &FvmNode;

    /// Corner nodes of the given local side of an element.
    ///
    /// A side is either a 2-node edge (2D) or a 4-node quad (3D); any other
    /// corner count violates the mesh invariant and is treated as fatal by
    /// the resolver.
    fn side_nodes(&self, element: ElementId, side: usize) -> &[NodeId];

    /// Endpoint nodes of the given local edge of an element. Edges always
    /// have exactly two endpoints.
    fn edge_nodes(&self, element: ElementId, edge: usize) -> [NodeId; 2];
}
