//! The leapfrog integrator and the Hamiltonian functional.
//!
//! Leapfrog is symplectic and time-reversible; both properties depend on the
//! exact half-step/full-step ordering below. The integrator never fails:
//! non-finite gradients or positions simply propagate, and the enclosing
//! transition turns them into a rejection.

use crate::distributions::GradientTarget;
use crate::tree::ParamTree;

/// Integrates Hamiltonian dynamics for `n_steps` leapfrog steps.
///
/// Returns the final `(position, momentum)`. The gradient is evaluated
/// exactly `n_steps + 1` times per call; nothing is cached across calls.
/// `inv_mass` is the diagonal inverse mass as a same-structure tree.
pub fn leapfrog<T: GradientTarget>(
    target: &T,
    position: &ParamTree,
    momentum: &ParamTree,
    step_size: f64,
    n_steps: usize,
    inv_mass: &ParamTree,
) -> (ParamTree, ParamTree) {
    let eps = step_size as f32;
    let half = 0.5 * eps;

    let grad = target.grad_logp(position);
    let mut p = momentum.zip_map(&grad, |pi, gi| pi + half * gi);
    let mut q = position.clone();

    for step in 1..=n_steps {
        let velocity = inv_mass.mul(&p);
        q = q.zip_map(&velocity, |qi, vi| qi + eps * vi);
        let grad = target.grad_logp(&q);
        let weight = if step < n_steps { eps } else { half };
        p = p.zip_map(&grad, |pi, gi| pi + weight * gi);
    }

    (q, p)
}

/// Kinetic energy under the diagonal metric: `0.5 Σ p ⊙ p ⊙ M⁻¹`.
pub fn kinetic_energy(momentum: &ParamTree, inv_mass: &ParamTree) -> f64 {
    let mut acc = 0.0f64;
    for (p, m) in momentum.leaves().iter().zip(inv_mass.leaves()) {
        for (&pi, &mi) in p.iter().zip(m.iter()) {
            acc += pi as f64 * pi as f64 * mi as f64;
        }
    }
    0.5 * acc
}

/// Total energy `H(q, p) = -logp(q) + K(p)`.
///
/// Non-finite log-densities and kinetic terms propagate; the caller treats a
/// non-finite energy difference as acceptance probability zero.
pub fn energy<T: GradientTarget>(
    target: &T,
    position: &ParamTree,
    momentum: &ParamTree,
    inv_mass: &ParamTree,
) -> f64 {
    -target.logp(position) + kinetic_energy(momentum, inv_mass)
}
