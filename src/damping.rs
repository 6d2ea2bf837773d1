//! Newton step damping.
//!
//! After the outer solver's line search has produced a trial step, one of the
//! policies below adjusts it so the next iterate stays physically admissible:
//! potentials must not overshoot (the exponential carrier statistics blow up
//! otherwise) and carrier densities must stay non-negative.
//!
//! Conventions follow the solver's post-line-search hook: `x` is the current
//! iterate, `y` the proposed step and `w = x - y` the trial point. A policy
//! may modify `y` and/or `w` and reports which of the two it touched, so the
//! caller can re-derive dependent state. All policies are stateless and may
//! be invoked repeatedly within a single globalized Newton line search.

use crate::dof::{RegionVariableLayout, VariableKind};
use crate::Real;
use nalgebra::{DVectorView, DVectorViewMut};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// Selectable damping strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DampingPolicy {
    /// Limit the per-iteration change of potential-type DOFs.
    Potential,
    /// Bank-Rose monotone safeguard scaling the whole step.
    BankRose,
    /// Clip steps that would drive carrier densities negative. Also serves
    /// as the "no damping" fallback.
    PositiveDensity,
}

impl DampingPolicy {
    /// Parse a policy name from configuration input. Unrecognized names fall
    /// back to [`DampingPolicy::PositiveDensity`], the safe default.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "potential" => DampingPolicy::Potential,
            "bankrose" | "bank-rose" | "bank_rose" => DampingPolicy::BankRose,
            _ => DampingPolicy::PositiveDensity,
        }
    }
}

/// Numeric parameters of the damping policies, in the solver's scaled units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Real"))]
pub struct DampingParameters<T> {
    /// Largest admissible change of a potential-type DOF per iteration.
    pub max_potential_update: T,
    /// Relaxation constant of the Bank-Rose step scaling.
    pub bank_rose_relaxation: T,
    /// Fraction of the current density a clipped trial component is reset to.
    pub density_clip_fraction: T,
}

impl<T: Real> Default for DampingParameters<T> {
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    fn default() -> Self {
        Self {
            max_potential_update: 1.0,
            bank_rose_relaxation: 1.0,
            density_clip_fraction: 0.01,
        }
    }
}

/// Which of the hook's two output vectors a damping function modified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepAdjustment {
    pub changed_step: bool,
    pub changed_trial: bool,
}

impl StepAdjustment {
    fn merge(self, other: StepAdjustment) -> StepAdjustment {
        StepAdjustment {
            changed_step: self.changed_step || other.changed_step,
            changed_trial: self.changed_trial || other.changed_trial,
        }
    }
}

/// Per-local-DOF variable kinds, so the damping functions can locate the
/// potential-type and density-type components of the solution vector.
#[derive(Debug, Clone, Default)]
pub struct DofClassification {
    kinds: Vec<VariableKind>,
}

impl DofClassification {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the DOF block of one node belonging to a region with the given
    /// layout. Nodes must be appended in local-offset order.
    pub fn push_node(&mut self, layout: &RegionVariableLayout) {
        let variables = [
            VariableKind::Potential,
            VariableKind::ElectronDensity,
            VariableKind::HoleDensity,
            VariableKind::LatticeTemperature,
        ];
        let mut slots: Vec<(usize, VariableKind)> = variables
            .into_iter()
            .filter_map(|v| layout.variable_offset(v).map(|offset| (offset, v)))
            .collect();
        slots.sort_unstable_by_key(|(offset, _)| *offset);
        self.kinds.extend(slots.into_iter().map(|(_, v)| v));
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kind(&self, local_dof: usize) -> VariableKind {
        self.kinds[local_dof]
    }

    fn indices_of(&self, kind: VariableKind) -> impl Iterator<Item = usize> + '_ {
        self.kinds
            .iter()
            .enumerate()
            .filter(move |(_, k)| **k == kind)
            .map(|(i, _)| i)
    }

    fn density_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.kinds
            .iter()
            .enumerate()
            .filter(|(_, k)| {
                matches!(
                    **k,
                    VariableKind::ElectronDensity | VariableKind::HoleDensity
                )
            })
            .map(|(i, _)| i)
    }
}

/// Post-line-search hook: dispatch to exactly one damping function based on
/// the configured policy.
pub fn post_line_search_check<T: Real>(
    policy: DampingPolicy,
    params: &DampingParameters<T>,
    kinds: &DofClassification,
    x: DVectorView<T>,
    y: DVectorViewMut<T>,
    w: DVectorViewMut<T>,
) -> StepAdjustment {
    match policy {
        DampingPolicy::Potential => potential_damping(params, kinds, x, y, w),
        DampingPolicy::BankRose => bank_rose_damping(params, kinds, x, y, w),
        DampingPolicy::PositiveDensity => positive_density_damping(params, kinds, x, y, w),
    }
}

/// Scale the whole step so no potential-type DOF changes by more than the
/// configured bound, then clip any densities the scaled step still drives
/// negative.
fn potential_damping<T: Real>(
    params: &DampingParameters<T>,
    kinds: &DofClassification,
    x: DVectorView<T>,
    y: DVectorViewMut<T>,
    mut w: DVectorViewMut<T>,
) -> StepAdjustment {
    let dv_max = kinds
        .indices_of(VariableKind::Potential)
        .map(|i| y[i].abs())
        .fold(T::zero(), |a, b| a.max(b));

    let mut adjustment = StepAdjustment::default();
    if dv_max > params.max_potential_update {
        let factor = params.max_potential_update / dv_max;
        for i in 0..w.len() {
            w[i] = x[i] - factor * y[i];
        }
        adjustment.changed_trial = true;
    }

    adjustment.merge(clip_negative_densities(params, kinds, x, &mut w))
}

/// Bank-Rose style monotone safeguard: damp the whole step by
/// `1 / (1 + tau * |y|_inf)`. Large steps are shortened aggressively, small
/// steps pass through nearly unchanged, so the scheme never stalls a
/// converging iteration.
#[replace_float_literals(T::from_f64(literal).unwrap())]
fn bank_rose_damping<T: Real>(
    params: &DampingParameters<T>,
    kinds: &DofClassification,
    x: DVectorView<T>,
    y: DVectorViewMut<T>,
    mut w: DVectorViewMut<T>,
) -> StepAdjustment {
    let step_norm = y.amax();
    let factor = 1.0 / (1.0 + params.bank_rose_relaxation * step_norm);

    for i in 0..w.len() {
        w[i] = x[i] - factor * y[i];
    }
    let adjustment = StepAdjustment {
        changed_step: false,
        changed_trial: true,
    };

    adjustment.merge(clip_negative_densities(params, kinds, x, &mut w))
}

/// Default policy: leave the step alone unless it drives a carrier density
/// non-positive, in which case the offending trial component is clipped.
fn positive_density_damping<T: Real>(
    params: &DampingParameters<T>,
    kinds: &DofClassification,
    x: DVectorView<T>,
    _y: DVectorViewMut<T>,
    mut w: DVectorViewMut<T>,
) -> StepAdjustment {
    clip_negative_densities(params, kinds, x, &mut w)
}

fn clip_negative_densities<T: Real>(
    params: &DampingParameters<T>,
    kinds: &DofClassification,
    x: DVectorView<T>,
    w: &mut DVectorViewMut<T>,
) -> StepAdjustment {
    let mut adjustment = StepAdjustment::default();
    for i in kinds.density_indices() {
        if w[i] <= T::zero() {
            w[i] = (params.density_clip_fraction * x[i]).max(T::zero());
            adjustment.changed_trial = true;
        }
    }
    adjustment
}
