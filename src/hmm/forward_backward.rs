//! Scaled forward and backward algorithms, and posterior decoding.
//!
//! We do not take logarithm in these tables. Instead, each row of the forward table is divided by
//! its sum after it is filled, and the divisor is kept in `scale`. The backward table is divided by
//! the same factors, so `F[i][j] * B[i][j]` is proportional to Pr{state j at i | seq} within each row.
use super::DPTable;
use crate::error::{NumericalDomainError, Result};
use crate::model::Model;

/// Output of the forward algorithm.
#[derive(Debug, Clone)]
pub struct Forward {
    /// Row-normalized forward table, (n+1) x (states+1).
    pub table: DPTable<f64>,
    /// `scale[i]` is the sum of the i-th row before normalization. `scale[0] = 1`.
    pub scale: Vec<f64>,
    /// log Pr{seq}.
    pub log_likelihood: f64,
}

/// Forward algorithm.
pub fn forward(model: &Model, seq: &[u8]) -> Result<Forward> {
    let seq = crate::alphabet::encode(seq)?;
    Ok(forward_inner(model, &seq)?)
}

/// Forward algorithm on an encoded sequence.
/// `F[i][j] = e[x_i][j] * sum_k F[i-1][k] * a[k][j]`, with `F[0][0] = 1`.
/// A row summing to zero means the sequence is impossible, and it is reported as an error
/// because the log of its scale would be taken.
pub fn forward_inner(
    model: &Model,
    seq: &[u8],
) -> std::result::Result<Forward, NumericalDomainError> {
    let states = model.states();
    let mut table = DPTable::new(seq.len() + 1, states + 1, 0f64);
    let mut scale = vec![1f64; seq.len() + 1];
    table[(0, 0)] = 1f64;
    let mut sum_log_scale = 0f64;
    for (i, &x) in seq.iter().enumerate().map(|(pos, x)| (pos + 1, x)) {
        let mut total = 0f64;
        for j in 1..=states {
            let emit = model.emission(x as usize, j);
            let trans: f64 = (0..=states)
                .map(|k| table[(i - 1, k)] * model.transition(k, j))
                .sum();
            table[(i, j)] = emit * trans;
            total += table[(i, j)];
        }
        if total <= 0f64 {
            return Err(NumericalDomainError::Scale { position: i });
        }
        scale[i] = total;
        sum_log_scale += total.ln();
        table.row_mut(i).iter_mut().for_each(|x| *x /= total);
    }
    let n = seq.len();
    let log_likelihood = if n == 0 {
        0f64
    } else {
        let last: f64 = table.row(n).iter().skip(1).sum();
        -(last.ln() - sum_log_scale)
    };
    Ok(Forward {
        table,
        scale,
        log_likelihood,
    })
}

/// Backward algorithm. `scale` should be the one from the forward algorithm on the same sequence.
pub fn backward(model: &Model, seq: &[u8], scale: &[f64]) -> Result<DPTable<f64>> {
    let seq = crate::alphabet::encode(seq)?;
    Ok(backward_inner(model, &seq, scale))
}

/// Backward algorithm on an encoded sequence.
/// `B[n][j] = 1`, and `B[i][j] = sum_k B[i+1][k] * a[j][k] * e[x_{i+1}][k] / scale[i]`
/// for i from n-1 down to 1. Row 0 and column 0 stay zero.
pub fn backward_inner(model: &Model, seq: &[u8], scale: &[f64]) -> DPTable<f64> {
    let states = model.states();
    let n = seq.len();
    let mut table = DPTable::new(n + 1, states + 1, 0f64);
    if n == 0 {
        return table;
    }
    table.row_mut(n).iter_mut().skip(1).for_each(|x| *x = 1f64);
    for i in (1..n).rev() {
        let x = seq[i] as usize;
        for j in 1..=states {
            let sum: f64 = (1..=states)
                .map(|k| table[(i + 1, k)] * model.transition(j, k) * model.emission(x, k))
                .sum();
            table[(i, j)] = sum / scale[i];
        }
    }
    table
}

// Relative gap below which two posteriors are a tie.
const POSTERIOR_TIE: f64 = 1e-12;

/// For each position, the state with the largest `F[i][j] * B[i][j]`.
/// Values within a relative `POSTERIOR_TIE` of each other are ties, and ties go to the
/// lowest state. The returned path has one real state per position.
pub fn posterior_path(forward: &DPTable<f64>, backward: &DPTable<f64>) -> Vec<usize> {
    forward
        .rows()
        .zip(backward.rows())
        .skip(1)
        .map(|(fs, bs)| {
            let (_, arg) = fs.iter().zip(bs.iter()).enumerate().skip(1).fold(
                (-1f64, 0),
                |(max, arg), (j, (f, b))| {
                    let p = f * b;
                    if max < p && max * (1f64 + POSTERIOR_TIE) < p {
                        (p, j)
                    } else {
                        (max, arg)
                    }
                },
            );
            arg
        })
        .collect()
}

/// Pr{state j at position i | seq}. The i-th vector corresponds to the (i+1)-th residue, and
/// its j-th element to the state j+1.
pub fn posterior_probabilities(model: &Model, seq: &[u8]) -> Result<Vec<Vec<f64>>> {
    let seq = crate::alphabet::encode(seq)?;
    let forward = forward_inner(model, &seq)?;
    let backward = backward_inner(model, &seq, &forward.scale);
    let probs = forward
        .table
        .rows()
        .zip(backward.rows())
        .skip(1)
        .map(|(fs, bs)| {
            let mut probs: Vec<_> = fs.iter().zip(bs.iter()).skip(1).map(|(f, b)| f * b).collect();
            let sum: f64 = probs.iter().sum();
            probs.iter_mut().for_each(|x| *x /= sum);
            probs
        })
        .collect();
    Ok(probs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alphabet::NUM_SYMBOLS;
    use crate::hmm::tests::*;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256StarStar;
    fn logsumexp(xs: &[f64]) -> f64 {
        let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if max == f64::NEG_INFINITY {
            return max;
        }
        max + xs.iter().map(|x| (x - max).exp()).sum::<f64>().ln()
    }
    // Unscaled forward algorithm in log space.
    fn forward_naive(model: &Model, seq: &[u8]) -> Vec<Vec<f64>> {
        let states = model.states();
        let mut dp = vec![vec![f64::NEG_INFINITY; states + 1]; seq.len() + 1];
        dp[0][0] = 0f64;
        for (i, &x) in seq.iter().enumerate().map(|(p, x)| (p + 1, x)) {
            for j in 1..=states {
                let lks: Vec<_> = (0..=states)
                    .map(|k| dp[i - 1][k] + model.transition(k, j).ln())
                    .collect();
                dp[i][j] = logsumexp(&lks) + model.emission(x as usize, j).ln();
            }
        }
        dp
    }
    #[test]
    fn golden_mks() {
        let model = uniform_three_state_model();
        let forward = forward(&model, b"MKS").unwrap();
        // Every path emits with (1/3)^3, and the transitions sum up to one.
        let expected = 3f64 * (1f64 / 3f64).ln();
        assert!((forward.log_likelihood - expected).abs() < 1e-10);
        assert_eq!(forward.scale.len(), 4);
        let probs = posterior_probabilities(&model, b"MKS").unwrap();
        for row in probs {
            for p in row {
                assert!((p - 1f64 / 3f64).abs() < 1e-10);
            }
        }
    }
    #[test]
    fn scaling_matches_naive() {
        let model = three_state_model();
        let seq = crate::alphabet::encode(&TEST_SEQ[..30]).unwrap();
        let naive = forward_naive(&model, &seq);
        let scaled = forward_inner(&model, &seq).unwrap();
        for i in 0..=seq.len() {
            let log_factor: f64 = scaled.scale[..=i].iter().map(|x| x.ln()).sum();
            for j in 1..=model.states() {
                let x = scaled.table[(i, j)];
                if 0f64 < x {
                    let diff = (x.ln() + log_factor - naive[i][j]).abs();
                    assert!(diff < 1e-8, "{},{},{}", i, j, diff);
                } else {
                    assert_eq!(naive[i][j], f64::NEG_INFINITY);
                }
            }
        }
        let lk = logsumexp(&naive[seq.len()]);
        assert!((lk - scaled.log_likelihood).abs() < 1e-8);
    }
    #[test]
    fn long_sequence_does_not_underflow() {
        let model = three_state_model();
        let seq: Vec<u8> = TEST_SEQ.iter().cycle().take(20_000).copied().collect();
        let forward = forward(&model, &seq).unwrap();
        assert!(forward.log_likelihood.is_finite());
        assert!(forward.log_likelihood < -10_000f64);
    }
    #[test]
    fn likelihood_is_invariant_to_emission_rescaling() {
        let model = three_state_model();
        let lk = forward(&model, TEST_SEQ).unwrap().log_likelihood;
        let (trans, emit, labels) = model.clone().into_raw_elements();
        for &c in &[0.001, 0.5, 7f64, 1e6] {
            let mut emit: Vec<Vec<f64>> = emit.iter().map(|r| r.iter().map(|x| x * c).collect()).collect();
            for j in 0..labels.len() {
                let sum: f64 = emit.iter().map(|r| r[j]).sum();
                emit.iter_mut().for_each(|r| r[j] /= sum);
            }
            let rescaled = Model::new(trans.clone(), emit, labels.clone()).unwrap();
            let lk2 = forward(&rescaled, TEST_SEQ).unwrap().log_likelihood;
            assert!((lk - lk2).abs() < 1e-8, "{},{}", lk, lk2);
        }
    }
    #[test]
    fn backward_gives_the_same_likelihood() {
        // Pr{seq} = sum_j a[0][j] e[x_1][j] B[1][j] * prod_{i>=1} scale[i],
        // and B[1] carries the extra 1/scale[1..n-1].
        let model = three_state_model();
        let seq = crate::alphabet::encode(&TEST_SEQ[..50]).unwrap();
        let f = forward_inner(&model, &seq).unwrap();
        let b = backward_inner(&model, &seq, &f.scale);
        let n = seq.len();
        let head: f64 = (1..=model.states())
            .map(|j| model.transition(0, j) * model.emission(seq[0] as usize, j) * b[(1, j)])
            .sum();
        let lk = head.ln() + f.scale[1..n].iter().map(|x| x.ln()).sum::<f64>();
        assert!((lk - f.log_likelihood).abs() < 1e-8, "{},{}", lk, f.log_likelihood);
    }
    #[test]
    fn posterior_sums_to_one() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(3290);
        for states in 2..6 {
            let model = crate::gen_seq::random_model(&mut rng, states, 0.2);
            let len = rng.gen_range(1..100);
            let (seq, _) = crate::gen_seq::sample(&model, &mut rng, len);
            let probs = posterior_probabilities(&model, &seq).unwrap();
            assert_eq!(probs.len(), len);
            for row in probs {
                assert_eq!(row.len(), states);
                assert!((row.iter().sum::<f64>() - 1f64).abs() < 1e-9);
            }
            let path = crate::hmm::decode(&model, &seq, true).unwrap().unwrap();
            assert_eq!(path.len(), len);
        }
    }
    #[test]
    fn impossible_sequence() {
        // State 2 is never entered, and state 1 never emits 'C'.
        let transitions = vec![vec![1f64, 0f64], vec![0.5, 0.5], vec![0.5, 0.5]];
        let mut emissions = vec![vec![0.05, 0.05]; NUM_SYMBOLS];
        emissions[0][0] = 0.1;
        emissions[1][0] = 0f64;
        let labels = vec![crate::alphabet::Label::A; 2];
        let model = Model::new(transitions, emissions, labels).unwrap();
        match forward(&model, b"C") {
            Err(crate::error::Error::NumericalDomain(NumericalDomainError::Scale { position })) => {
                assert_eq!(position, 1)
            }
            x => panic!("{:?}", x.map(|f| f.log_likelihood)),
        }
    }
    #[test]
    fn empty_sequence() {
        let model = three_state_model();
        let f = forward(&model, b"").unwrap();
        assert_eq!(f.log_likelihood, 0f64);
        assert!(posterior_path(&f.table, &backward(&model, b"", &f.scale).unwrap()).is_empty());
    }
    #[test]
    fn posterior_ties_go_to_lowest_state() {
        let mut forward = DPTable::new(3, 4, 0f64);
        let backward = DPTable::new(3, 4, 1f64);
        let rounded = 0.3 * (1f64 + 4f64 * f64::EPSILON);
        forward.row_mut(1).copy_from_slice(&[0f64, 0.3, rounded, 0.2]);
        forward.row_mut(2).copy_from_slice(&[0f64, 0.3, 0.300001, rounded]);
        assert_eq!(posterior_path(&forward, &backward), vec![1, 2]);
    }
}
