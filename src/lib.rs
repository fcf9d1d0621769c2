//! Protein secondary structure prediction with hidden Markov models whose topology is
//! sampled by a trans-dimensional Markov chain Monte Carlo.
//!
//! The chain starts from a small model with one state per label ([`model::Model::from_labeled_sequences`]),
//! proposes topology changes ([`moves`]), scores each candidate by the exact likelihood of the
//! training sequences ([`hmm`]), and keeps the candidate by the Metropolis rule ([`sampler`]).
//! A held-out chain is labelled by the plurality vote of the sampled models ([`consensus`]).
#[macro_use]
extern crate log;
pub mod alphabet;
pub mod consensus;
pub mod error;
pub mod fasta;
pub mod gen_seq;
pub mod hmm;
pub mod model;
pub mod moves;
pub mod sampler;
pub mod store;
pub mod validate;

pub use alphabet::Label;
pub use error::{Error, InvalidModelError, NumericalDomainError, Result};
pub use model::Model;
pub use sampler::{Sampler, SamplerConfig};
