//! Label prediction from a set of sampled models.
use crate::alphabet::Label;
use crate::error::{Error, Result};
use crate::model::Model;
use rayon::prelude::*;

/// Posterior decoding of `seq` with `model`, mapped to labels.
pub fn predict_labels(model: &Model, seq: &[u8]) -> Result<Vec<Label>> {
    let seq = crate::alphabet::encode(seq)?;
    predict_labels_inner(model, &seq)
}

fn predict_labels_inner(model: &Model, seq: &[u8]) -> Result<Vec<Label>> {
    let path = crate::hmm::decode_inner(model, seq, true)?.unwrap_or_default();
    Ok(model.labels_of(&path))
}

/// Decode `seq` with every model and take the per-position plurality vote.
/// A tie goes to the label which appears first in the order of `models`.
pub fn consensus(models: &[Model], seq: &[u8]) -> Result<Vec<Label>> {
    if models.is_empty() {
        return Err(Error::EmptySampleSet);
    }
    let seq = crate::alphabet::encode(seq)?;
    let predictions = models
        .par_iter()
        .map(|model| predict_labels_inner(model, &seq))
        .collect::<Result<Vec<_>>>()?;
    Ok(plurality(&predictions))
}

/// Per-position plurality vote over equally long sequences.
/// A tie goes to the element which appears first in the order of `seqs`.
pub fn plurality<T: Copy + PartialEq, S: std::borrow::Borrow<[T]>>(seqs: &[S]) -> Vec<T> {
    let len = match seqs.first() {
        Some(seq) => seq.borrow().len(),
        None => return vec![],
    };
    (0..len)
        .filter_map(|i| {
            // (element, count) in the order of the first appearance.
            let mut counts: Vec<(T, usize)> = vec![];
            for seq in seqs.iter() {
                let x = seq.borrow()[i];
                match counts.iter_mut().find(|(y, _)| *y == x) {
                    Some((_, count)) => *count += 1,
                    None => counts.push((x, 1)),
                }
            }
            counts
                .iter()
                .fold(None, |max: Option<(T, usize)>, &(x, c)| match max {
                    Some((_, m)) if c <= m => max,
                    _ => Some((x, c)),
                })
                .map(|(x, _)| x)
        })
        .collect()
}

/// Percentage of positions where `predicted` and `truth` disagree.
/// Only the positions of `predicted` are compared.
pub fn error_rate(predicted: &[Label], truth: &[Label]) -> Result<f64> {
    if truth.len() < predicted.len() {
        let msg = format!(
            "{} predicted labels but only {} true labels",
            predicted.len(),
            truth.len()
        );
        return Err(Error::Malformed(msg));
    }
    if predicted.is_empty() {
        return Ok(0f64);
    }
    let errors = predicted
        .iter()
        .zip(truth.iter())
        .filter(|(p, t)| p != t)
        .count();
    Ok(errors as f64 * 100f64 / predicted.len() as f64)
}
