//! This module is to generate random models and sequences to assess the performance.
//! Usually, it would not be used in the real-applications.
use crate::alphabet::{Label, AMINO_ACIDS, NUM_SYMBOLS};
use crate::model::Model;
use rand::seq::SliceRandom;
use rand::Rng;

/// Random model with `states` states. Each transition is removed with probability `sparsity`,
/// except for the cycle 1->2->...->states->1 and the start->1 edge,
/// so the model is always valid and strongly connected. Every emission is positive.
pub fn random_model<R: Rng>(rng: &mut R, states: usize, sparsity: f64) -> Model {
    assert!(0 < states);
    let transitions: Vec<Vec<f64>> = (0..=states)
        .map(|from| {
            // Column of the edge which must survive.
            let keep = from % states;
            let row: Vec<f64> = (0..states)
                .map(|to| match to == keep || !rng.gen_bool(sparsity) {
                    true => rng.gen_range(0.05..1f64),
                    false => 0f64,
                })
                .collect();
            normalize(row)
        })
        .collect();
    let mut emissions = vec![vec![0f64; states]; NUM_SYMBOLS];
    for j in 0..states {
        let column = normalize((0..NUM_SYMBOLS).map(|_| rng.gen_range(0.1..1f64)).collect());
        for (row, x) in emissions.iter_mut().zip(column) {
            row[j] = x;
        }
    }
    let labels: Vec<_> = (0..states).map(|j| Label::ALL[j % 3]).collect();
    Model::from_raw_elements(transitions, emissions, labels)
}

fn normalize(mut xs: Vec<f64>) -> Vec<f64> {
    let sum: f64 = xs.iter().sum();
    xs.iter_mut().for_each(|x| *x /= sum);
    xs
}

/// Run `model` as a generative model for `len` steps.
/// Return the residues and the hidden states (`1..=states`).
pub fn sample<R: Rng>(model: &Model, rng: &mut R, len: usize) -> (Vec<u8>, Vec<usize>) {
    let states: Vec<usize> = (1..=model.states()).collect();
    let symbols: Vec<usize> = (0..NUM_SYMBOLS).collect();
    let mut current = 0;
    let mut seq = Vec::with_capacity(len);
    let mut path = Vec::with_capacity(len);
    for _ in 0..len {
        current = *states
            .choose_weighted(rng, |&to| model.transition(current, to))
            .unwrap();
        let x = *symbols
            .choose_weighted(rng, |&x| model.emission(x, current))
            .unwrap();
        seq.push(AMINO_ACIDS[x]);
        path.push(current);
    }
    (seq, path)
}

/// Generate `num` labelled sequences of length `len`, as training data.
pub fn labeled_sequences<R: Rng>(
    model: &Model,
    rng: &mut R,
    num: usize,
    len: usize,
) -> (Vec<Vec<u8>>, Vec<Vec<Label>>) {
    (0..num)
        .map(|_| {
            let (seq, path) = sample(model, rng, len);
            (seq, model.labels_of(&path))
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256StarStar;
    #[test]
    fn random_models_are_valid() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(91);
        for states in 1..8 {
            let model = random_model(&mut rng, states, 0.5);
            assert!(crate::validate::validate_for_inference(&model).is_ok());
        }
    }
    #[test]
    fn sampled_path_has_positive_probability() {
        let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(3);
        let model = random_model(&mut rng, 4, 0.5);
        let (seq, path) = sample(&model, &mut rng, 200);
        assert_eq!(seq.len(), 200);
        let mut prev = 0;
        for &s in path.iter() {
            assert!(0f64 < model.transition(prev, s));
            prev = s;
        }
        let (seqs, labels) = labeled_sequences(&model, &mut rng, 3, 10);
        assert_eq!(seqs.len(), 3);
        assert!(labels.iter().all(|l| l.len() == 10));
    }
}
