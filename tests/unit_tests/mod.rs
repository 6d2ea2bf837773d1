use garm::mesh::{ElementId, FvmNode, NodeId, ProcessorId, RegionConnectivity};
use std::collections::HashMap;

mod constraints;

/// In-memory region connectivity for tests: contiguous DOF blocks, all nodes
/// owned by processor 0 unless reassigned.
pub struct TestRegion {
    nodes: Vec<FvmNode>,
    sides: HashMap<(ElementId, usize), Vec<NodeId>>,
    edges: HashMap<(ElementId, usize), [NodeId; 2]>,
}

impl TestRegion {
    pub fn new(num_nodes: usize, dofs_per_node: usize) -> Self {
        let nodes = (0..num_nodes)
            .map(|i| FvmNode {
                global_offset: i * dofs_per_node,
                local_offset: i * dofs_per_node,
                processor_id: 0,
            })
            .collect();
        Self {
            nodes,
            sides: HashMap::new(),
            edges: HashMap::new(),
        }
    }

    pub fn set_owner(&mut self, node: NodeId, processor: ProcessorId) {
        self.nodes[node].processor_id = processor;
    }

    pub fn add_side(&mut self, element: ElementId, side: usize, corners: Vec<NodeId>) {
        self.sides.insert((element, side), corners);
    }

    pub fn add_edge(&mut self, element: ElementId, edge: usize, endpoints: [NodeId; 2]) {
        self.edges.insert((element, edge), endpoints);
    }
}

impl RegionConnectivity for TestRegion {
    fn fvm_node(&self, node: NodeId) -> &FvmNode {
        &self.nodes[node]
    }

    fn side_nodes(&self, element: ElementId, side: usize) -> &[NodeId] {
        &self.sides[&(element, side)]
    }

    fn edge_nodes(&self, element: ElementId, edge: usize) -> [NodeId; 2] {
        self.edges[&(element, edge)]
    }
}
