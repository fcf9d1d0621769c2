//! Viterbi decoding.
use super::{log_emission, log_transition, Cell, DPTable};
use crate::error::{NumericalDomainError, Result};
use crate::model::Model;

/// The most probable hidden path and its log probability.
#[derive(Debug, Clone, PartialEq)]
pub struct ViterbiPath {
    /// log Pr{seq, path}.
    pub score: f64,
    /// Real states (`1..=states`), one for each position. Empty if the sequence is empty
    /// or no path can emit it.
    pub states: Vec<usize>,
}

/// Align `seq` to `model` and return the maximum likelihood path.
pub fn viterbi(model: &Model, seq: &[u8]) -> Result<ViterbiPath> {
    let seq = crate::alphabet::encode(seq)?;
    Ok(viterbi_inner(model, &seq)?)
}

/// Viterbi algorithm on an encoded sequence.
///
/// `V[i][j] = log e[x_i][j] + max_k (V[i-1][k] + log a[k][j])`, where `k` runs over the start state
/// and all the real states, skipping every `k` with `a[k][j] == 0`.
/// Ties are broken toward the lowest index: both the predecessor scan and the scan for the
/// final state go upward and only replace the current best by a strictly larger value.
pub fn viterbi_inner(
    model: &Model,
    seq: &[u8],
) -> std::result::Result<ViterbiPath, NumericalDomainError> {
    let table = fill_table(model, seq)?;
    let n = seq.len();
    if n == 0 {
        return Ok(ViterbiPath {
            score: 0f64,
            states: vec![],
        });
    }
    let (score, last_state) = table
        .row(n)
        .iter()
        .enumerate()
        .skip(1)
        .fold((f64::NEG_INFINITY, None), |(max, arg), (j, cell)| {
            if max < cell.value {
                (cell.value, Some(j))
            } else {
                (max, arg)
            }
        });
    // Trace back from the last position until the start state.
    let mut states = vec![];
    let (mut i, mut state) = (n, last_state);
    while let Some(s) = state.filter(|&s| s != 0) {
        states.push(s);
        state = table[(i, s)].predecessor;
        i -= 1;
    }
    states.reverse();
    Ok(ViterbiPath { score, states })
}

// Fill the (n+1) x (states+1) table.
fn fill_table(model: &Model, seq: &[u8]) -> std::result::Result<DPTable<Cell>, NumericalDomainError> {
    let states = model.states();
    let mut table = DPTable::new(seq.len() + 1, states + 1, Cell::default());
    table[(0, 0)] = Cell {
        value: 0f64,
        predecessor: None,
    };
    // log a[k][j], None for a zero transition.
    let log_transit: Vec<Vec<Option<f64>>> = (0..=states)
        .map(|k| {
            (1..=states)
                .map(|j| log_transition(model, k, j).ok())
                .collect()
        })
        .collect();
    for (i, &x) in seq.iter().enumerate().map(|(pos, x)| (pos + 1, x)) {
        for j in 1..=states {
            let log_emit = log_emission(model, x as usize, j)?;
            let (mut max, mut pred) = (f64::NEG_INFINITY, 0);
            for k in 0..=states {
                if let Some(log_akj) = log_transit[k][j - 1] {
                    let lk = table[(i - 1, k)].value + log_akj;
                    if max < lk {
                        max = lk;
                        pred = k;
                    }
                }
            }
            table[(i, j)] = Cell {
                value: log_emit + max,
                predecessor: Some(pred),
            };
        }
    }
    Ok(table)
}
