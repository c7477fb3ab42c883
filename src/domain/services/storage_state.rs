//! State-of-charge continuity for storages modelled on typical periods.
//!
//! Each original period `p` is played by typical period `k(p)`. The state of
//! charge is split into an inter-period part, one value per period boundary,
//! and an intra-period part that belongs to the typical period:
//!
//! `SOC(p, t) = SOC_inter(p) * (1 - loss)^t + SOC_intra(k(p), t)`
//!
//! `SOC_inter(p + 1) = SOC_inter(p) * (1 - loss)^L + SOC_intra(k(p), L)`

use crate::utils::error::{RepresentError, Result};
use serde::Serialize;

const TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct StorageParameters {
    /// Energy capacity, the upper bound of the state of charge.
    pub capacity: f64,
    /// Share of the stored energy lost per time step, in `[0, 1)`.
    pub self_discharge: f64,
    /// Start state for non-cyclic operation.
    pub initial_state: f64,
    /// Require the final state to equal the start state.
    pub cyclic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundViolation {
    pub step: usize,
    pub state: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageTrajectory {
    /// `SOC_inter`, one entry per period boundary (`N + 1` values).
    pub inter_period: Vec<f64>,
    /// Full-horizon state, `N * L + 1` values.
    pub states: Vec<f64>,
    pub violations: Vec<BoundViolation>,
}

impl StorageTrajectory {
    pub fn is_feasible(&self) -> bool {
        self.violations.is_empty()
    }
}

fn check_loss(self_discharge: f64) -> Result<()> {
    if !(0.0..1.0).contains(&self_discharge) {
        return Err(RepresentError::validation(format!(
            "self discharge {} must lie in [0, 1)",
            self_discharge
        )));
    }
    Ok(())
}

/// Intra-period states relative to the period start from net flows into the
/// storage (positive charges).
pub fn intra_period_profile(net_flows: &[f64], self_discharge: f64) -> Result<Vec<f64>> {
    check_loss(self_discharge)?;
    let mut states = Vec::with_capacity(net_flows.len() + 1);
    states.push(0.0);
    let mut state = 0.0;
    for flow in net_flows {
        state = state * (1.0 - self_discharge) + flow;
        states.push(state);
    }
    Ok(states)
}

pub fn link_storage_states(
    period_order: &[usize],
    intra_profiles: &[Vec<f64>],
    params: &StorageParameters,
) -> Result<StorageTrajectory> {
    check_loss(params.self_discharge)?;
    if params.capacity < 0.0 || !params.capacity.is_finite() {
        return Err(RepresentError::validation(format!(
            "storage capacity {} must be a non-negative number",
            params.capacity
        )));
    }
    if period_order.is_empty() {
        return Err(RepresentError::validation("period order is empty"));
    }
    let steps = intra_profiles
        .first()
        .map(|p| p.len())
        .ok_or_else(|| RepresentError::validation("no intra-period profiles"))?;
    if steps < 2 {
        return Err(RepresentError::validation(
            "intra-period profiles need at least two states",
        ));
    }
    let length = steps - 1;
    for (k, profile) in intra_profiles.iter().enumerate() {
        if profile.len() != steps {
            return Err(RepresentError::validation(format!(
                "profile of typical period {} has {} states, expected {}",
                k,
                profile.len(),
                steps
            )));
        }
        if profile[0].abs() > TOLERANCE {
            return Err(RepresentError::validation(format!(
                "profile of typical period {} must start at 0",
                k
            )));
        }
    }
    if let Some(&k) = period_order.iter().find(|&&k| k >= intra_profiles.len()) {
        return Err(RepresentError::validation(format!(
            "period order references unknown typical period {}",
            k
        )));
    }

    let retention = 1.0 - params.self_discharge;
    let exponent = i32::try_from(length).map_err(|_| {
        RepresentError::validation(format!("period length {} is too long", length))
    })?;
    let period_retention = retention.powi(exponent);
    let n = period_order.len();

    let start = if params.cyclic {
        // 以起點為 0 推到終點，再解 s_N = s_0
        let drift = period_order.iter().fold(0.0, |state, &k| {
            state * period_retention + intra_profiles[k][length]
        });
        if params.self_discharge == 0.0 {
            if drift.abs() > TOLERANCE {
                return Err(RepresentError::validation(format!(
                    "lossless storage gains {} over the horizon, cyclic operation is infeasible",
                    drift
                )));
            }
            params.initial_state
        } else {
            // 1 - (1 - loss)^(N L)，以 ln_1p/exp_m1 保留極小損失的精度
            let steps = (n * length) as f64;
            let horizon_loss = -(steps * (-params.self_discharge).ln_1p()).exp_m1();
            if horizon_loss <= 0.0 {
                return Err(RepresentError::validation(format!(
                    "self discharge {} is too small to close the cycle",
                    params.self_discharge
                )));
            }
            drift / horizon_loss
        }
    } else {
        params.initial_state
    };

    let mut inter_period = Vec::with_capacity(n + 1);
    inter_period.push(start);
    let mut states = Vec::with_capacity(n * length + 1);
    for (p, &k) in period_order.iter().enumerate() {
        let base = inter_period[p];
        let mut decay = 1.0;
        for t in 0..length {
            states.push(base * decay + intra_profiles[k][t]);
            decay *= retention;
        }
        inter_period.push(base * period_retention + intra_profiles[k][length]);
    }
    states.push(inter_period[n]);

    let violations = states
        .iter()
        .enumerate()
        .filter(|(_, &s)| s < -TOLERANCE || s > params.capacity + TOLERANCE)
        .map(|(step, &state)| BoundViolation { step, state })
        .collect::<Vec<_>>();
    if !violations.is_empty() {
        tracing::warn!(
            "Storage state leaves [0, {}] at {} steps",
            params.capacity,
            violations.len()
        );
    }

    Ok(StorageTrajectory {
        inter_period,
        states,
        violations,
    })
}
