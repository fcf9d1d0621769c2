//! Moves on the space of models.
//!
//! Each move borrows the current model and proposes a new one. The proposal is built on a copy,
//! so the current model is never touched. The row sums of the transition matrix and the column sums
//! of the emission matrix are kept by renormalizing only the rows (or columns) a move edits.
//!
//! When a move has nothing to do (no pair of states to join, no missing edge to add, or a deletion
//! which would leave a state without an out-going edge or break the strong connectivity),
//! it returns [`Proposal::Unchanged`]. This is a self-proposal, not an error.
use crate::model::Model;
use rand::distributions::Open01;
use rand::seq::SliceRandom;
use rand::Rng;

/// The five moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    /// Duplicate a state.
    Split,
    /// Merge two states sharing a label.
    Join,
    /// Make a zero transition positive.
    AddEdge,
    /// Make a positive transition between real states zero.
    DeleteEdge,
    /// Redraw a positive transition.
    EditTransition,
}

impl Move {
    /// In the order of the bins used by [`propose`].
    pub const ALL: [Move; 5] = [
        Move::Split,
        Move::Join,
        Move::AddEdge,
        Move::DeleteEdge,
        Move::EditTransition,
    ];
    pub fn name(&self) -> &'static str {
        match self {
            Move::Split => "number.of.state.increase",
            Move::Join => "number.of.state.decrease",
            Move::AddEdge => "add.edge",
            Move::DeleteEdge => "remove.edge",
            Move::EditTransition => "transition.prob.change",
        }
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A proposed model.
#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    Changed(Model),
    /// The move proposes the current model itself.
    Unchanged,
}

impl Proposal {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Proposal::Unchanged)
    }
    /// The proposed model, cloning `current` for a self-proposal.
    pub fn into_model(self, current: &Model) -> Model {
        match self {
            Proposal::Changed(model) => model,
            Proposal::Unchanged => current.clone(),
        }
    }
}

/// Draw u from [0,1) and run the move of the bin `floor(5u)`.
pub fn propose<R: Rng>(model: &Model, rng: &mut R) -> (Move, Proposal) {
    let u: f64 = rng.gen();
    let bin = ((u * Move::ALL.len() as f64) as usize).min(Move::ALL.len() - 1);
    let mv = Move::ALL[bin];
    let proposal = match mv {
        Move::Split => split(model, rng),
        Move::Join => join(model, rng),
        Move::AddEdge => add_edge(model, rng),
        Move::DeleteEdge => delete_edge(model, rng),
        Move::EditTransition => edit_transition(model, rng),
    };
    (mv, proposal)
}

/// Split a random state. Always succeeds.
pub fn split<R: Rng>(model: &Model, rng: &mut R) -> Proposal {
    let node = rng.gen_range(1..=model.states());
    Proposal::Changed(split_state(model, node))
}

/// Split `node` (in `1..=states`) into two states.
/// The new state is appended as the last state. It has the same label, the same emissions,
/// and the same out-going transitions as `node`, and it takes half of every in-coming
/// transition of `node`. The initial distribution becomes uniform.
pub fn split_state(model: &Model, node: usize) -> Model {
    let states = model.states();
    let k = node - 1;
    let (mut trans, mut emit, mut labels) = model.clone().into_raw_elements();
    labels.push(labels[k]);
    trans[0] = vec![((states + 1) as f64).recip(); states + 1];
    for row in trans.iter_mut().skip(1) {
        row[k] /= 2f64;
        let half = row[k];
        row.push(half);
    }
    let out_going = trans[node].clone();
    trans.push(out_going);
    for row in emit.iter_mut() {
        let x = row[k];
        row.push(x);
    }
    Model::from_raw_elements(trans, emit, labels)
}

/// Join two states with the same label, drawn uniformly among all such pairs.
/// A model with two or fewer states, or without any shared label, is left unchanged.
pub fn join<R: Rng>(model: &Model, rng: &mut R) -> Proposal {
    let states = model.states();
    if states <= 2 {
        return Proposal::Unchanged;
    }
    let pairs: Vec<(usize, usize)> = (1..=states)
        .flat_map(|a| (a + 1..=states).map(move |b| (a, b)))
        .filter(|&(a, b)| model.label(a) == model.label(b))
        .collect();
    match pairs.choose(rng) {
        Some(&(a, b)) => Proposal::Changed(join_states(model, a, b)),
        None => Proposal::Unchanged,
    }
}

/// Merge the two states `a` and `b` (in `1..=states`, distinct) into the lower one.
/// In-coming transitions are added, out-going transitions and emissions are averaged,
/// and the higher state is removed. The initial distribution becomes uniform.
pub fn join_states(model: &Model, a: usize, b: usize) -> Model {
    assert_ne!(a, b);
    let states = model.states();
    let (k1, k2) = (a.min(b) - 1, a.max(b) - 1);
    let (mut trans, mut emit, mut labels) = model.clone().into_raw_elements();
    trans[0] = vec![((states - 1) as f64).recip(); states - 1];
    for row in trans.iter_mut().skip(1) {
        row[k1] += row[k2];
    }
    for i in (0..states).filter(|&i| i != k1 && i != k2) {
        trans[k1 + 1][i] = (trans[k1 + 1][i] + trans[k2 + 1][i]) / 2f64;
    }
    trans[k1 + 1][k1] = (trans[k1 + 1][k1] + trans[k2 + 1][k1]) / 2f64;
    for row in trans.iter_mut().skip(1) {
        row.remove(k2);
    }
    trans.remove(k2 + 1);
    for row in emit.iter_mut() {
        row[k1] = (row[k1] + row[k2]) / 2f64;
        row.remove(k2);
    }
    labels.remove(k2);
    Model::from_raw_elements(trans, emit, labels)
}

// Divide the row by its sum. Return false if the sum is zero.
fn renormalize(row: &mut [f64]) -> bool {
    let sum: f64 = row.iter().sum();
    if sum <= 0f64 {
        return false;
    }
    row.iter_mut().for_each(|x| *x /= sum);
    true
}

// (row, column) of the transition entries satisfying `pred`, in rows `rows`.
fn entries<F: Fn(f64) -> bool>(
    model: &Model,
    rows: std::ops::RangeInclusive<usize>,
    pred: F,
) -> Vec<(usize, usize)> {
    let trans = model.transitions();
    rows.flat_map(|i| (0..model.states()).map(move |j| (i, j)))
        .filter(|&(i, j)| pred(trans[i][j]))
        .collect()
}

/// Give a random zero transition (the initial distribution included) a random weight
/// in [0,1), then renormalize its row. A model without zero transition is left unchanged.
pub fn add_edge<R: Rng>(model: &Model, rng: &mut R) -> Proposal {
    let missing = entries(model, 0..=model.states(), |x| x == 0f64);
    let &(i, j) = match missing.choose(rng) {
        Some(edge) => edge,
        None => return Proposal::Unchanged,
    };
    let (mut trans, emit, labels) = model.clone().into_raw_elements();
    trans[i][j] = rng.gen::<f64>();
    renormalize(&mut trans[i]);
    Proposal::Changed(Model::from_raw_elements(trans, emit, labels))
}

/// Remove a random positive transition between real states, then renormalize its row.
/// The initial distribution is never edited. Left unchanged if the removed edge
/// was the only out-going edge of its state, or if the result is not strongly connected.
pub fn delete_edge<R: Rng>(model: &Model, rng: &mut R) -> Proposal {
    let edges = entries(model, 1..=model.states(), |x| x != 0f64);
    let &(i, j) = match edges.choose(rng) {
        Some(edge) => edge,
        None => return Proposal::Unchanged,
    };
    let (mut trans, emit, labels) = model.clone().into_raw_elements();
    trans[i][j] = 0f64;
    if !renormalize(&mut trans[i]) {
        trace!("DELETE\tOnly out-going edge of {}", i);
        return Proposal::Unchanged;
    }
    if !crate::validate::is_strongly_connected(&trans[1..]) {
        trace!("DELETE\t{}->{} disconnects the graph", i, j + 1);
        return Proposal::Unchanged;
    }
    Proposal::Changed(Model::from_raw_elements(trans, emit, labels))
}

/// Give a random positive transition (the initial distribution included) a new weight
/// from the open interval (0,1), then renormalize its row.
/// The weight is never zero, so no edge disappears.
pub fn edit_transition<R: Rng>(model: &Model, rng: &mut R) -> Proposal {
    let edges = entries(model, 0..=model.states(), |x| x != 0f64);
    let &(i, j) = match edges.choose(rng) {
        Some(edge) => edge,
        None => return Proposal::Unchanged,
    };
    let (mut trans, emit, labels) = model.clone().into_raw_elements();
    trans[i][j] = rng.sample(Open01);
    renormalize(&mut trans[i]);
    Proposal::Changed(Model::from_raw_elements(trans, emit, labels))
}
