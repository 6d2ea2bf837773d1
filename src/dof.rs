//! Per-region degree-of-freedom layout.
//!
//! The set of physical variables carried by a node depends on the kind of
//! region it belongs to. The category set is small and fixed, so region kinds
//! are a closed enum with lookup tables rather than trait objects.

/// One scalar physical quantity solved for at a mesh node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Potential,
    ElectronDensity,
    HoleDensity,
    LatticeTemperature,
}

/// The physical kind of a simulation region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Semiconductor,
    Insulator,
    Electrode,
    Metal,
}

impl RegionKind {
    /// Number of DOFs carried by each node of this region.
    ///
    /// Semiconductor nodes carry potential and both carrier densities; all
    /// other regions carry potential only. The lattice temperature equation
    /// adds one DOF per node when enabled.
    pub fn node_dofs(&self, temperature_enabled: bool) -> usize {
        let base = match self {
            RegionKind::Semiconductor => 3,
            RegionKind::Insulator | RegionKind::Electrode | RegionKind::Metal => 1,
        };
        base + temperature_enabled as usize
    }

    /// Slot of `variable` within a node's DOF block, or `None` if nodes of
    /// this region do not carry it.
    pub fn variable_offset(&self, variable: VariableKind, temperature_enabled: bool) -> Option<usize> {
        match variable {
            VariableKind::Potential => Some(0),
            VariableKind::ElectronDensity => (*self == RegionKind::Semiconductor).then_some(1),
            VariableKind::HoleDensity => (*self == RegionKind::Semiconductor).then_some(2),
            VariableKind::LatticeTemperature => temperature_enabled.then(|| self.node_dofs(false)),
        }
    }

    /// Whether the region's PDE couples a node to all nodes of its neighbor
    /// elements (drift-diffusion) or only to edge-connected neighbors
    /// (Poisson-like). Determines the matrix bandwidth reserved by the outer
    /// assembly loop.
    pub fn involves_neighbor_elements(&self) -> bool {
        matches!(self, RegionKind::Semiconductor)
    }
}

/// Resolved variable layout for one region, fixing the optional lattice
/// temperature equation on or off for the duration of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionVariableLayout {
    pub kind: RegionKind,
    pub temperature_enabled: bool,
}

impl RegionVariableLayout {
    pub fn new(kind: RegionKind, temperature_enabled: bool) -> Self {
        Self { kind, temperature_enabled }
    }

    pub fn node_dofs(&self) -> usize {
        self.kind.node_dofs(self.temperature_enabled)
    }

    pub fn variable_offset(&self, variable: VariableKind) -> Option<usize> {
        self.kind.variable_offset(variable, self.temperature_enabled)
    }

    /// The variables for which a hanging node carries an interpolation
    /// constraint: the potential always, the lattice temperature when its
    /// equation is active.
    pub fn constrained_variables(&self) -> impl Iterator<Item = VariableKind> + '_ {
        let temperature_enabled = self.temperature_enabled;
        [VariableKind::Potential, VariableKind::LatticeTemperature]
            .into_iter()
            .filter(move |v| *v == VariableKind::Potential || temperature_enabled)
    }
}
