//! The Metropolis-corrected HMC transition.
//!
//! One transition draws a Gaussian momentum under the current metric, runs
//! the leapfrog integrator, and accepts or rejects the endpoint by the
//! Metropolis rule on the energy difference. Because leapfrog preserves
//! phase-space volume and is reversible under momentum negation, the
//! transition satisfies detailed balance with respect to `exp(logp)`.

use crate::distributions::GradientTarget;
use crate::hamiltonian::{energy, leapfrog};
use crate::key::Key;
use crate::tree::ParamTree;

/// Mutable per-chain sampler state.
#[derive(Debug, Clone)]
pub struct HmcState {
    /// Current position in parameter space.
    pub position: ParamTree,
    /// Current integrator step size ε.
    pub step_size: f64,
    /// Diagonal inverse mass M⁻¹, same structure as the position, all
    /// entries strictly positive.
    pub inv_mass: ParamTree,
}

impl HmcState {
    /// Initializes a state with identity inverse mass.
    pub fn new(position: ParamTree, step_size: f64) -> HmcState {
        let inv_mass = position.ones_like();
        HmcState {
            position,
            step_size,
            inv_mass,
        }
    }
}

/// What one transition observed.
#[derive(Debug, Clone, Copy)]
pub struct TransitionInfo {
    /// Metropolis acceptance probability α ∈ [0, 1]; zero for divergent
    /// proposals.
    pub accept_prob: f64,
    /// Whether the proposal was accepted.
    pub accepted: bool,
}

/// Draws a momentum with leaves from `N(0, M)` under the diagonal metric.
///
/// With `M⁻¹` stored, the per-element standard deviation is `1/√M⁻¹`.
fn sample_momentum(key: Key, position: &ParamTree, inv_mass: &ParamTree) -> ParamTree {
    let z = key.standard_normal_like(position);
    z.zip_map(inv_mass, |zi, mi| zi / mi.sqrt())
}

/// Runs one HMC transition, mutating `state.position` on acceptance.
///
/// The key is split into momentum, acceptance, and continuation keys; the
/// continuation key is returned and becomes the chain's key for the next
/// transition. A non-finite momentum, position, or energy difference makes
/// the transition a rejection; it never fails.
pub fn transition<T: GradientTarget>(
    target: &T,
    state: &mut HmcState,
    key: Key,
    n_leapfrog: usize,
) -> (TransitionInfo, Key) {
    let (key_momentum, key_accept, key_next) = key.split3();

    let momentum = sample_momentum(key_momentum, &state.position, &state.inv_mass);
    let u = key_accept.uniform();

    if !momentum.all_finite() {
        return (
            TransitionInfo {
                accept_prob: 0.0,
                accepted: false,
            },
            key_next,
        );
    }

    let h0 = energy(target, &state.position, &momentum, &state.inv_mass);
    let (proposal, new_momentum) = leapfrog(
        target,
        &state.position,
        &momentum,
        state.step_size,
        n_leapfrog,
        &state.inv_mass,
    );
    let h1 = energy(target, &proposal, &new_momentum, &state.inv_mass);

    let delta = h1 - h0;
    let accept_prob = if !h0.is_finite() || !delta.is_finite() || !proposal.all_finite() {
        0.0
    } else if delta <= 0.0 {
        1.0
    } else {
        (-delta).exp()
    };

    let accepted = u < accept_prob;
    if accepted {
        state.position = proposal;
    }

    (
        TransitionInfo {
            accept_prob,
            accepted,
        },
        key_next,
    )
}
