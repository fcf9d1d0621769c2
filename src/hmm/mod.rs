//! Exact inference on a [`Model`]: Viterbi decoding, the scaled forward and backward algorithms,
//! and posterior decoding.
//!
//! Every DP table here has `n+1` rows (positions, row 0 is before the first residue) and
//! `states+1` columns (column 0 is the virtual start state).
//! As a rule of thumb, the forward/backward tables are probabilities rescaled row by row,
//! while the Viterbi table is in log space. Taking log of a zero probability is an error,
//! except for the zero transitions which Viterbi skips explicitly.
//!
//! Each public function takes a residue string and encodes it first. The `*_inner` variants take
//! sequences already encoded by [`crate::alphabet::encode`] and are what the sampler calls.
pub mod forward_backward;
pub mod viterbi;
use crate::error::{NumericalDomainError, Result};
use crate::model::Model;
use rayon::prelude::*;

/// A dynamic programming table. It is a serialized 2-d array.
#[derive(Debug, Clone, PartialEq)]
pub struct DPTable<T> {
    data: Vec<T>,
    column: usize,
}

impl<T: Copy> DPTable<T> {
    pub fn new(row: usize, column: usize, default: T) -> Self {
        Self {
            data: vec![default; row * column],
            column,
        }
    }
    pub fn get(&self, i: usize, j: usize) -> Option<&T> {
        if j < self.column {
            self.data.get(i * self.column + j)
        } else {
            None
        }
    }
    pub fn get_mut(&mut self, i: usize, j: usize) -> Option<&mut T> {
        if j < self.column {
            self.data.get_mut(i * self.column + j)
        } else {
            None
        }
    }
    /// The i-th row.
    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.column..(i + 1) * self.column]
    }
    pub fn row_mut(&mut self, i: usize) -> &mut [T] {
        &mut self.data[i * self.column..(i + 1) * self.column]
    }
    pub fn rows(&self) -> std::slice::ChunksExact<'_, T> {
        self.data.chunks_exact(self.column)
    }
}

impl<T: Copy> std::ops::Index<(usize, usize)> for DPTable<T> {
    type Output = T;
    fn index(&self, (i, j): (usize, usize)) -> &Self::Output {
        self.get(i, j).unwrap()
    }
}

impl<T: Copy> std::ops::IndexMut<(usize, usize)> for DPTable<T> {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Self::Output {
        self.get_mut(i, j).unwrap()
    }
}

/// A cell of the Viterbi table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// Log probability of the best path ending here.
    pub value: f64,
    /// The state at the previous position on that path. `None` for the start cell
    /// and for unreachable cells.
    pub predecessor: Option<usize>,
}

impl std::default::Default for Cell {
    fn default() -> Self {
        Self {
            value: f64::NEG_INFINITY,
            predecessor: None,
        }
    }
}

// log(Pr{from->to}). Zero is an error.
fn log_transition(model: &Model, from: usize, to: usize) -> std::result::Result<f64, NumericalDomainError> {
    let p = model.transition(from, to);
    if 0f64 < p {
        Ok(p.ln())
    } else {
        Err(NumericalDomainError::Transition { from, to })
    }
}

// log(Pr{symbol|state}). Zero is an error.
fn log_emission(model: &Model, symbol: usize, state: usize) -> std::result::Result<f64, NumericalDomainError> {
    let p = model.emission(symbol, state);
    if 0f64 < p {
        Ok(p.ln())
    } else {
        Err(NumericalDomainError::Emission { symbol, state })
    }
}

/// Decode `seq` with `model`.
/// Runs Viterbi, the scaled forward and backward algorithms, then returns the
/// posterior path if `want_path` is true, `None` otherwise.
/// The Viterbi path is computed (and logged at trace level) but not returned;
/// call [`viterbi::viterbi`] to get it.
pub fn decode(model: &Model, seq: &[u8], want_path: bool) -> Result<Option<Vec<usize>>> {
    let seq = crate::alphabet::encode(seq)?;
    Ok(decode_inner(model, &seq, want_path)?)
}

pub fn decode_inner(
    model: &Model,
    seq: &[u8],
    want_path: bool,
) -> std::result::Result<Option<Vec<usize>>, NumericalDomainError> {
    let best = viterbi::viterbi_inner(model, seq)?;
    trace!("VITERBI\t{:.3}\t{:?}", best.score, best.states);
    let forward = forward_backward::forward_inner(model, seq)?;
    let backward = forward_backward::backward_inner(model, seq, &forward.scale);
    Ok(want_path.then(|| forward_backward::posterior_path(&forward.table, &backward)))
}

/// Log likelihood of `seqs` under `model`. The sequences are independent,
/// so it is the sum of the forward log likelihoods.
pub fn log_likelihood<T: std::borrow::Borrow<[u8]>>(model: &Model, seqs: &[T]) -> Result<f64> {
    let seqs: Vec<_> = seqs
        .iter()
        .map(|seq| crate::alphabet::encode(seq.borrow()))
        .collect::<Result<_>>()?;
    Ok(log_likelihood_inner(model, &seqs)?)
}

/// Same as [`log_likelihood`] on encoded sequences. The forward passes run in parallel,
/// but the sum is taken in the input order, so the result does not depend on the thread count.
pub fn log_likelihood_inner<T: std::borrow::Borrow<[u8]> + Sync>(
    model: &Model,
    seqs: &[T],
) -> std::result::Result<f64, NumericalDomainError> {
    let lks = seqs
        .par_iter()
        .map(|seq| forward_backward::forward_inner(model, seq.borrow()).map(|f| f.log_likelihood))
        .collect::<std::result::Result<Vec<f64>, _>>()?;
    Ok(lks.iter().sum())
}
