//! Invariants of a [`Model`].
//! 1. Every row of the transition matrix sums to one.
//! 2. Every column of the emission matrix sums to one.
//! 3. The transition matrix is (states+1) x states.
//! 4. The emission matrix is 20 x states.
//! 5. The transition graph between the real states is strongly connected.
//!
//! Nothing here repairs a model. Shapes are checked before sums, so the error
//! always names the first broken invariant.
use crate::alphabet::NUM_SYMBOLS;
use crate::error::InvalidModelError;
use crate::model::Model;

/// Tolerance of the row and column sums.
pub const TOLERANCE: f64 = 1e-10;

/// Check invariants 1 to 4.
pub fn validate(model: &Model) -> Result<(), InvalidModelError> {
    let states = model.states();
    if states == 0 {
        return Err(InvalidModelError::NoStates);
    }
    let (trans, emit) = (model.transitions(), model.emissions());
    let trans_columns = trans.iter().map(|row| row.len()).find(|&len| len != states);
    if trans.len() != states + 1 || trans_columns.is_some() {
        return Err(InvalidModelError::TransitionShape {
            rows: trans.len(),
            columns: trans_columns.unwrap_or(states),
            states,
            expected_rows: states + 1,
        });
    }
    let emit_columns = emit.iter().map(|row| row.len()).find(|&len| len != states);
    if emit.len() != NUM_SYMBOLS || emit_columns.is_some() {
        return Err(InvalidModelError::EmissionShape {
            rows: emit.len(),
            columns: emit_columns.unwrap_or(states),
            states,
            expected_rows: NUM_SYMBOLS,
        });
    }
    for (row, probs) in trans.iter().enumerate() {
        let sum: f64 = probs.iter().sum();
        if TOLERANCE < (sum - 1f64).abs() || probs.iter().any(|&x| x < 0f64) {
            return Err(InvalidModelError::TransitionRowSum {
                row,
                sum,
                rows: states + 1,
                columns: states,
            });
        }
    }
    for column in 0..states {
        let sum: f64 = emit.iter().map(|row| row[column]).sum();
        if TOLERANCE < (sum - 1f64).abs() || emit.iter().any(|row| row[column] < 0f64) {
            return Err(InvalidModelError::EmissionColumnSum {
                column,
                sum,
                rows: NUM_SYMBOLS,
                columns: states,
            });
        }
    }
    Ok(())
}

/// Check all the invariants, including the strong connectivity.
pub fn validate_for_inference(model: &Model) -> Result<(), InvalidModelError> {
    validate(model)?;
    if !is_strongly_connected(&model.transitions()[1..]) {
        return Err(InvalidModelError::NotStronglyConnected {
            states: model.states(),
        });
    }
    Ok(())
}

pub fn is_valid(model: &Model) -> bool {
    validate(model).is_ok()
}

/// True if the square adjacency matrix `adj` (non-zero entry = edge) is strongly connected.
/// Self-loops are ignored. An empty graph is not strongly connected.
pub fn is_strongly_connected(adj: &[Vec<f64>]) -> bool {
    !adj.is_empty()
        && visits_all(adj.len(), |v, w| adj[v][w] != 0f64)
        && visits_all(adj.len(), |v, w| adj[w][v] != 0f64)
}

// Depth first search from node 0. Return true if every node was visited.
fn visits_all<F: Fn(usize, usize) -> bool>(nodes: usize, is_edge: F) -> bool {
    let mut found = vec![false; nodes];
    let mut stack = vec![0];
    while let Some(v) = stack.pop() {
        if found[v] {
            continue;
        }
        found[v] = true;
        stack.extend((0..nodes).filter(|&w| w != v && !found[w] && is_edge(v, w)));
    }
    found.iter().all(|&x| x)
}
