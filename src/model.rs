//! The hidden Markov model whose topology is sampled.
use crate::alphabet::{Label, NUM_SYMBOLS};
use crate::error::InvalidModelError;
use serde::{Deserialize, Serialize};

/// A hidden Markov model over the twenty amino acids with labelled states.
///
/// Indexing: the virtual start state is 0, and the real states are `1..=states()`.
/// - `transitions` has `states()+1` rows and `states()` columns. Row 0 is the initial distribution,
///   row `i` holds Pr{i -> j} at column `j-1`.
/// - `emissions` has [`NUM_SYMBOLS`] rows and `states()` columns. `emissions[x][j-1]` is Pr{x|j}.
/// - `labels[j-1]` is the label of state `j`.
///
/// A model is a value. It is never modified after construction; the moves in [`crate::moves`]
/// borrow a model and return a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    transitions: Vec<Vec<f64>>,
    emissions: Vec<Vec<f64>>,
    labels: Vec<Label>,
}

/// Transition matrix used when a model is built from labelled data:
/// one state per label, in the order A, B, O.
pub const THREE_STATE_TRANSITIONS: [[f64; 3]; 4] = [
    [1f64 / 3f64, 1f64 / 3f64, 1f64 / 3f64],
    [0.9, 0.0, 0.1],
    [0.0, 0.89, 0.11],
    [0.1, 0.11, 0.79],
];

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "States:{}", self.states())?;
        let labels: Vec<_> = self.labels.iter().map(|l| l.to_string()).collect();
        writeln!(f, "Labels:{}", labels.join("\t"))?;
        writeln!(f, "Transition:")?;
        for row in self.transitions.iter() {
            let probs: Vec<_> = row.iter().map(|x| format!("{:.3}", x)).collect();
            writeln!(f, "{}", probs.join("\t"))?;
        }
        writeln!(f, "Emission:")?;
        for (row, aa) in self.emissions.iter().zip(crate::alphabet::AMINO_ACIDS.iter()) {
            let probs: Vec<_> = row.iter().map(|x| format!("{:.3}", x)).collect();
            writeln!(f, "{}\t{}", *aa as char, probs.join("\t"))?;
        }
        Ok(())
    }
}

impl Model {
    /// Create a new model. The shapes and the sums of the matrices are checked
    /// (invariants 1-4 of [`crate::validate::validate`]).
    pub fn new(
        transitions: Vec<Vec<f64>>,
        emissions: Vec<Vec<f64>>,
        labels: Vec<Label>,
    ) -> Result<Self, InvalidModelError> {
        let model = Self::from_raw_elements(transitions, emissions, labels);
        crate::validate::validate(&model)?;
        Ok(model)
    }
    /// Create a new model without any check.
    /// Inference still works on such a model as long as the shapes are consistent.
    pub fn from_raw_elements(
        transitions: Vec<Vec<f64>>,
        emissions: Vec<Vec<f64>>,
        labels: Vec<Label>,
    ) -> Self {
        Self {
            transitions,
            emissions,
            labels,
        }
    }
    /// Three-state model (A, B, O) with [`THREE_STATE_TRANSITIONS`] and the given emissions,
    /// a 20x3 matrix with columns in the order A, B, O.
    pub fn with_three_states(emissions: Vec<Vec<f64>>) -> Result<Self, InvalidModelError> {
        let transitions = THREE_STATE_TRANSITIONS.iter().map(|r| r.to_vec()).collect();
        Self::new(transitions, emissions, Label::ALL.to_vec())
    }
    /// Three-state model whose emissions are the residue frequencies of each label
    /// in the training data. `pseudocount` is added to every count before normalization;
    /// with zero, a label never observed with some residue can not emit it.
    pub fn from_labeled_sequences<S, L>(
        seqs: &[S],
        labels: &[L],
        pseudocount: f64,
    ) -> crate::error::Result<Self>
    where
        S: std::borrow::Borrow<[u8]>,
        L: std::borrow::Borrow<[Label]>,
    {
        let emissions = harvest_emissions(seqs, labels, pseudocount)?;
        Ok(Self::with_three_states(emissions)?)
    }
    /// Decompose into (transitions, emissions, labels).
    pub fn into_raw_elements(self) -> (Vec<Vec<f64>>, Vec<Vec<f64>>, Vec<Label>) {
        (self.transitions, self.emissions, self.labels)
    }
    /// Number of real states.
    pub fn states(&self) -> usize {
        self.labels.len()
    }
    pub fn transitions(&self) -> &[Vec<f64>] {
        &self.transitions
    }
    pub fn emissions(&self) -> &[Vec<f64>] {
        &self.emissions
    }
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }
    /// Pr{from -> to}. `from` is in `0..=states()` (0 is the start), `to` is in `1..=states()`.
    pub fn transition(&self, from: usize, to: usize) -> f64 {
        self.transitions[from][to - 1]
    }
    /// Pr{symbol | state}, `state` in `1..=states()`.
    pub fn emission(&self, symbol: usize, state: usize) -> f64 {
        self.emissions[symbol][state - 1]
    }
    /// The label of `state`, in `1..=states()`.
    pub fn label(&self, state: usize) -> Label {
        self.labels[state - 1]
    }
    /// Map a decoded path to labels.
    pub fn labels_of(&self, path: &[usize]) -> Vec<Label> {
        path.iter().map(|&s| self.label(s)).collect()
    }
    /// Frobenius norm of the difference. None if the numbers of states differ.
    pub fn dist(&self, other: &Self) -> Option<f64> {
        (self.states() == other.states()).then(|| {
            let sqdiff = |xs: &[Vec<f64>], ys: &[Vec<f64>]| -> f64 {
                xs.iter()
                    .flatten()
                    .zip(ys.iter().flatten())
                    .map(|(x, y)| (x - y).powi(2))
                    .sum()
            };
            sqdiff(&self.transitions, &other.transitions) + sqdiff(&self.emissions, &other.emissions)
        })
    }
}

/// Count (residue, label) pairs and normalize each label column.
/// Returns a 20x3 matrix, columns in the order A, B, O.
pub fn harvest_emissions<S, L>(
    seqs: &[S],
    labels: &[L],
    pseudocount: f64,
) -> crate::error::Result<Vec<Vec<f64>>>
where
    S: std::borrow::Borrow<[u8]>,
    L: std::borrow::Borrow<[Label]>,
{
    use crate::error::Error;
    if seqs.len() != labels.len() {
        let msg = format!("{} sequences but {} label strings", seqs.len(), labels.len());
        return Err(Error::Malformed(msg));
    }
    let mut counts = vec![vec![pseudocount; Label::ALL.len()]; NUM_SYMBOLS];
    for (seq, labels) in seqs.iter().zip(labels.iter()) {
        let seq = crate::alphabet::encode(seq.borrow())?;
        for (&x, label) in seq.iter().zip(labels.borrow().iter()) {
            counts[x as usize][label.index()] += 1f64;
        }
    }
    for label in Label::ALL.iter() {
        let column = label.index();
        let sum: f64 = counts.iter().map(|row| row[column]).sum();
        if sum <= 0f64 {
            let msg = format!("label {} never appears in the training data", label);
            return Err(Error::Malformed(msg));
        }
        counts.iter_mut().for_each(|row| row[column] /= sum);
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn three_state() {
        let emissions = vec![vec![1f64 / 20f64; 3]; NUM_SYMBOLS];
        let model = Model::with_three_states(emissions).unwrap();
        assert_eq!(model.states(), 3);
        assert_eq!(model.transition(0, 2), 1f64 / 3f64);
        assert_eq!(model.transition(2, 2), 0.89);
        assert_eq!(model.transition(1, 2), 0f64);
        assert_eq!(model.label(3), Label::O);
        assert_eq!(model.labels_of(&[1, 3, 2]), vec![Label::A, Label::O, Label::B]);
    }
    #[test]
    fn new_rejects_bad_shape() {
        let emissions = vec![vec![1f64 / 20f64; 3]; NUM_SYMBOLS - 1];
        assert!(Model::with_three_states(emissions).is_err());
    }
    #[test]
    fn harvest() {
        use Label::*;
        let seqs = vec![b"AAC".to_vec(), b"CD".to_vec()];
        let labels = vec![vec![A, A, B], vec![B, O]];
        let e = harvest_emissions(&seqs, &labels, 0f64).unwrap();
        assert_eq!(e[0][0], 1f64);
        assert_eq!(e[1][1], 1f64);
        assert_eq!(e[2][2], 1f64);
        assert_eq!(e[0][1], 0f64);
        let model = Model::from_labeled_sequences(&seqs, &labels, 1f64).unwrap();
        let column_sum: f64 = (0..NUM_SYMBOLS).map(|x| model.emission(x, 1)).sum();
        assert!((column_sum - 1f64).abs() < 1e-10);
        // A: 2 observed + 20 pseudo counts.
        assert!((model.emission(0, 1) - 3f64 / 22f64).abs() < 1e-12);
    }
    #[test]
    fn harvest_missing_label() {
        use Label::*;
        let seqs = vec![b"AAC".to_vec()];
        let labels = vec![vec![A, A, A]];
        assert!(harvest_emissions(&seqs, &labels, 0f64).is_err());
    }
    #[test]
    fn serde_roundtrip() {
        let emissions = vec![vec![1f64 / 20f64; 3]; NUM_SYMBOLS];
        let model = Model::with_three_states(emissions).unwrap();
        let json = serde_json::to_string(&model).unwrap();
        let loaded: Model = serde_json::from_str(&json).unwrap();
        assert_eq!(model, loaded);
        assert_eq!(model.dist(&loaded), Some(0f64));
    }
}
