//! Metropolis sampler over model topologies.
//!
//! A chain keeps the current model and its cached log likelihood on the training data.
//! At each iteration it proposes a move, computes the log likelihood of the candidate,
//! and accepts it if the candidate is not too large and either improves the likelihood or
//! wins a uniform draw against the likelihood ratio. After the burn-in, every
//! `sample_every`-th iteration records a copy of the current model.
use crate::error::{Error, Result};
use crate::model::Model;
use crate::moves::{Move, Proposal};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use rayon::prelude::*;

/// Configurations of a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Total number of iterations.
    pub iterations: usize,
    /// Record the current model every `sample_every` iterations.
    pub sample_every: usize,
    /// No model is recorded at or before this iteration.
    pub burn_in: usize,
    /// A candidate with more states than this is always rejected.
    pub max_states: usize,
    pub seed: u64,
}

impl SamplerConfig {
    pub fn new(
        iterations: usize,
        sample_every: usize,
        burn_in: usize,
        max_states: usize,
        seed: u64,
    ) -> Self {
        Self {
            iterations,
            sample_every,
            burn_in,
            max_states,
            seed,
        }
    }
}

impl std::default::Default for SamplerConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            sample_every: 100,
            burn_in: 1_000,
            max_states: 10,
            seed: 4230,
        }
    }
}

/// Where a chain is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The next iteration is within the burn-in.
    WarmingUp,
    /// The next iteration may record a sample.
    Sampling,
    /// All iterations are done.
    Done,
}

/// What happened in one iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    pub iteration: usize,
    /// Log likelihood of the current model after this iteration.
    pub log_likelihood: f64,
    pub mv: Move,
    /// True if the move proposed the current model itself.
    pub unchanged: bool,
    /// exp(candidate - current). 1 for a self-proposal. May be infinite.
    pub ratio: f64,
    pub accepted: bool,
    /// Number of states of the current model after this iteration.
    pub states: usize,
}

/// A single Markov chain.
#[derive(Debug, Clone)]
pub struct Sampler {
    config: SamplerConfig,
    model: Model,
    log_likelihood: f64,
    // Encoded training sequences.
    seqs: Vec<Vec<u8>>,
    rng: Xoshiro256StarStar,
    samples: Vec<Model>,
    iteration: usize,
}

impl Sampler {
    /// Start a chain from `model`. The model must satisfy every invariant,
    /// strong connectivity included.
    pub fn new<T: std::borrow::Borrow<[u8]>>(
        model: Model,
        seqs: &[T],
        config: SamplerConfig,
    ) -> Result<Self> {
        if config.sample_every == 0 {
            return Err(Error::Malformed("sample_every should be positive".to_string()));
        }
        crate::validate::validate_for_inference(&model)?;
        let seqs: Vec<_> = seqs
            .iter()
            .map(|seq| crate::alphabet::encode(seq.borrow()))
            .collect::<Result<_>>()?;
        let log_likelihood = crate::hmm::log_likelihood_inner(&model, &seqs)?;
        debug!("START\t{}\t{:.3}\t{}", model.states(), log_likelihood, seqs.len());
        Ok(Self {
            config,
            model,
            log_likelihood,
            seqs,
            rng: SeedableRng::seed_from_u64(config.seed),
            samples: vec![],
            iteration: 0,
        })
    }
    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }
    pub fn phase(&self) -> Phase {
        if self.config.iterations <= self.iteration {
            Phase::Done
        } else if self.config.burn_in < self.iteration {
            Phase::Sampling
        } else {
            Phase::WarmingUp
        }
    }
    /// The current model.
    pub fn current(&self) -> &Model {
        &self.model
    }
    /// Cached log likelihood of the current model.
    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }
    pub fn samples(&self) -> &[Model] {
        &self.samples
    }
    /// Number of iterations done.
    pub fn iteration(&self) -> usize {
        self.iteration
    }
    /// Run one iteration. Return `None` if the chain is already done.
    pub fn step(&mut self) -> Result<Option<IterationRecord>> {
        if self.phase() == Phase::Done {
            return Ok(None);
        }
        let i = self.iteration;
        let (mv, proposal) = crate::moves::propose(&self.model, &mut self.rng);
        let unchanged = proposal.is_unchanged();
        let (ratio, accepted) = match proposal {
            Proposal::Unchanged => {
                trace!("SELF\t{}\t{}", i, mv);
                (1f64, true)
            }
            Proposal::Changed(candidate) => {
                let lk = crate::hmm::log_likelihood_inner(&candidate, &self.seqs)?;
                let fits = candidate.states() <= self.config.max_states;
                let (ratio, accept) = metropolis(self.log_likelihood, lk, fits, &mut self.rng);
                if accept {
                    trace!("ACCEPT\t{}\t{}\t{:.3}->{:.3}", i, mv, self.log_likelihood, lk);
                    self.model = candidate;
                    self.log_likelihood = lk;
                }
                (ratio, accept)
            }
        };
        debug!(
            "ITER\t{}\t{}\t{}\t{:.3}\t{}",
            i,
            self.model.states(),
            mv,
            self.log_likelihood,
            accepted
        );
        if self.config.burn_in < i && i % self.config.sample_every == 0 {
            debug!("SAMPLE\t{}\t{}", i, self.model.states());
            self.samples.push(self.model.clone());
        }
        self.iteration += 1;
        Ok(Some(IterationRecord {
            iteration: i,
            log_likelihood: self.log_likelihood,
            mv,
            unchanged,
            ratio,
            accepted,
            states: self.model.states(),
        }))
    }
    /// Run the chain to the end, passing every record to `report`. Return the samples.
    pub fn run<F>(mut self, mut report: F) -> Result<Vec<Model>>
    where
        F: FnMut(&IterationRecord) -> Result<()>,
    {
        while let Some(record) = self.step()? {
            report(&record)?;
        }
        info!(
            "Sampled {} models in {} iterations",
            self.samples.len(),
            self.iteration
        );
        Ok(self.samples)
    }
}

// Metropolis rule on log likelihoods. Returns the likelihood ratio and the decision.
// An overflowing ratio is infinite and accepts. A candidate which does not fit is never accepted.
fn metropolis<R: Rng>(current: f64, candidate: f64, fits: bool, rng: &mut R) -> (f64, bool) {
    let ratio = (candidate - current).exp();
    let accept = fits && (current < candidate || rng.gen::<f64>() < ratio);
    (ratio, accept)
}

/// Run `chains` independent chains from `model` in parallel and return their samples,
/// concatenated in the order of the chains. Each chain has its own seed drawn from `config.seed`.
pub fn run_chains<T: std::borrow::Borrow<[u8]> + Sync>(
    model: &Model,
    seqs: &[T],
    config: SamplerConfig,
    chains: usize,
) -> Result<Vec<Model>> {
    let mut rng: Xoshiro256StarStar = SeedableRng::seed_from_u64(config.seed);
    let seeds: Vec<u64> = (0..chains).map(|_| rng.gen()).collect();
    let samples = seeds
        .into_par_iter()
        .enumerate()
        .map(|(chain, seed)| {
            let config = SamplerConfig { seed, ..config };
            debug!("CHAIN\t{}\t{}", chain, seed);
            Sampler::new(model.clone(), seqs, config)?.run(|_| Ok(()))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(samples.concat())
}
