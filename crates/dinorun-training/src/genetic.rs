//! Generation advancement for populations of policy networks.
//!
//! [`TrainingSession::next_generation`] turns the networks of one generation
//! and their final fitness scores into the networks of the next one.
//!
//! # Algorithm Overview
//!
//! 1. **Rank** - Order the population by fitness, best first
//! 2. **Elitism** - Carry the top `elite_count` networks over unchanged
//! 3. **Truncation** - Only the top `truncation_fraction` of the ranking may reproduce
//! 4. **Roulette** - Sample parents with weight `(score + ε)^k`, with replacement
//! 5. **Reproduce** - Clone the parent with probability `clone_probability`,
//!    otherwise mutate it (optionally after crossover with a second parent)
//! 6. **Decay** - Mutation rate and amount shrink with the generation number,
//!    but never below half of their base values
//! 7. **Stagnation** - After `stagnation_limit` generations without a new best
//!    score, the weakest offspring are replaced by random networks
//!
//! # Degenerate Inputs
//!
//! Training never halts on inconsistent data. An empty population, an empty
//! score list or a length mismatch between the two yields a fully random
//! generation; a missing parent network is replaced by a random one. The
//! returned population always has exactly the requested size.
//!
//! # Example
//!
//! ```
//! use dinorun_brain::{Network, Topology};
//! use dinorun_training::genetic::{EvolutionParams, TrainingSession};
//! use rand::SeedableRng as _;
//! use rand_pcg::Pcg32;
//!
//! let mut rng = Pcg32::seed_from_u64(0);
//! let topology = Topology::new(4, 4).unwrap();
//! let mut session = TrainingSession::new(topology, EvolutionParams::default());
//!
//! let parents: Vec<_> = (0..20)
//!     .map(|_| Some(Network::random(topology, &mut rng)))
//!     .collect();
//! let scores: Vec<f64> = (0..20).map(f64::from).collect();
//!
//! let next = session.next_generation(&parents, &scores, 20, &mut rng);
//! assert_eq!(next.len(), 20);
//! assert_eq!(session.generation(), 1);
//! assert_eq!(session.best_score(), 19.0);
//! ```

use dinorun_brain::{Network, Noise, Topology};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Parameters of the evolution policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionParams {
    /// Number of top networks copied unchanged into the next generation.
    pub elite_count: usize,
    /// Fraction of the ranked population allowed to reproduce.
    pub truncation_fraction: f64,
    /// Exponent `k` of the selection weight `(score + ε)^k`.
    pub selection_exponent: f64,
    /// Offset `ε` keeping selection weights positive.
    pub selection_epsilon: f64,
    /// Probability that an offspring is an exact copy of its parent.
    pub clone_probability: f64,
    /// Probability that a parameter is perturbed by a mutation.
    pub mutation_rate: f64,
    /// Scale of the perturbation.
    pub mutation_amount: f64,
    /// Per-generation decay factor of rate and amount.
    pub mutation_decay: f64,
    pub noise: Noise,
    /// Probability of combining two parents before mutating.
    pub crossover_rate: f64,
    /// Generations without improvement that trigger random injection.
    pub stagnation_limit: u32,
    /// Number of offspring replaced by random networks on stagnation.
    pub stagnation_injection: usize,
}

impl Default for EvolutionParams {
    fn default() -> Self {
        Self {
            elite_count: 3,
            truncation_fraction: 0.1,
            selection_exponent: 3.0,
            selection_epsilon: 1e-3,
            clone_probability: 0.08,
            mutation_rate: 0.15,
            mutation_amount: 0.25,
            mutation_decay: 0.99,
            noise: Noise::Gaussian,
            crossover_rate: 0.0,
            stagnation_limit: 25,
            stagnation_injection: 5,
        }
    }
}

impl EvolutionParams {
    /// Multiplier applied to mutation rate and amount at `generation`.
    ///
    /// Starts at `1` and decays geometrically towards `0.5`.
    ///
    /// ```
    /// use dinorun_training::genetic::EvolutionParams;
    ///
    /// let params = EvolutionParams::default();
    /// assert_eq!(params.mutation_scale(0), 1.0);
    /// assert!(params.mutation_scale(10_000) >= 0.5);
    /// ```
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn mutation_scale(&self, generation: u64) -> f64 {
        0.5 + 0.5 * self.mutation_decay.clamp(0.0, 1.0).powf(generation as f64)
    }
}

/// How an offspring network came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Elite,
    Clone,
    Mutant,
    Crossover,
    Random,
}

#[derive(Debug, Clone)]
pub struct Offspring {
    pub network: Network,
    pub origin: Origin,
}

impl Offspring {
    fn new(network: Network, origin: Origin) -> Self {
        Self { network, origin }
    }
}

/// Ranking key: NaN sorts below every other score.
fn rank_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

/// A member of the reproducing pool.
struct Candidate<'a> {
    network: &'a Network,
    score: f64,
    weight: f64,
}

/// Picks a candidate with probability proportional to its weight.
///
/// Falls back to a uniform pick if the weights do not form a usable
/// distribution.
fn roulette<'a, 'b, R>(pool: &'b [Candidate<'a>], rng: &mut R) -> &'b Candidate<'a>
where
    R: Rng + ?Sized,
{
    let total: f64 = pool.iter().map(|c| c.weight).sum();
    if !(total.is_finite() && total > 0.0) {
        return &pool[rng.random_range(0..pool.len())];
    }
    let mut threshold = rng.random::<f64>() * total;
    for candidate in pool {
        threshold -= candidate.weight;
        if threshold <= 0.0 {
            return candidate;
        }
    }
    &pool[pool.len() - 1]
}

/// Explicit state of a training run.
///
/// Holds the generation counter, the best score seen so far and the number of
/// generations since it last improved. Nothing is kept in global state, so
/// any number of sessions can run side by side.
#[derive(Debug, Clone)]
pub struct TrainingSession {
    params: EvolutionParams,
    topology: Topology,
    generation: u64,
    best_score: f64,
    best_network: Option<Network>,
    stagnation: u32,
}

impl TrainingSession {
    #[must_use]
    pub fn new(topology: Topology, params: EvolutionParams) -> Self {
        Self {
            params,
            topology,
            generation: 0,
            best_score: f64::NEG_INFINITY,
            best_network: None,
            stagnation: 0,
        }
    }

    #[must_use]
    pub fn params(&self) -> &EvolutionParams {
        &self.params
    }

    #[must_use]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Number of generations produced so far.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Best score seen so far, or negative infinity before the first
    /// generation was scored.
    #[must_use]
    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    /// The network that achieved [`Self::best_score`].
    #[must_use]
    pub fn best_network(&self) -> Option<&Network> {
        self.best_network.as_ref()
    }

    /// Generations since the best score last improved.
    #[must_use]
    pub fn stagnation(&self) -> u32 {
        self.stagnation
    }

    /// Creates a generation of random networks.
    pub fn random_population<R>(&self, size: usize, rng: &mut R) -> Vec<Network>
    where
        R: Rng + ?Sized,
    {
        (0..size)
            .map(|_| Network::random(self.topology, rng))
            .collect()
    }

    fn random_offspring<R>(&self, size: usize, rng: &mut R) -> Vec<Offspring>
    where
        R: Rng + ?Sized,
    {
        self.random_population(size, rng)
            .into_iter()
            .map(|network| Offspring::new(network, Origin::Random))
            .collect()
    }

    fn record_scores(&mut self, best_index: usize, best_score: f64, parents: &[Option<Network>]) {
        if best_score > self.best_score {
            tracing::debug!(
                previous = self.best_score,
                best = best_score,
                "new best score"
            );
            self.best_score = best_score;
            self.stagnation = 0;
            if let Some(network) = &parents[best_index] {
                self.best_network = Some(network.clone());
            }
        } else {
            self.stagnation = self.stagnation.saturating_add(1);
        }
    }

    /// Produces exactly `size` networks for the next generation.
    ///
    /// `parents[i]` scored `scores[i]`. Elites occupy the first slots of the
    /// result, in ranking order.
    pub fn next_generation<R>(
        &mut self,
        parents: &[Option<Network>],
        scores: &[f64],
        size: usize,
        rng: &mut R,
    ) -> Vec<Offspring>
    where
        R: Rng + ?Sized,
    {
        if parents.is_empty() || scores.is_empty() || parents.len() != scores.len() {
            tracing::warn!(
                parents = parents.len(),
                scores = scores.len(),
                "population and scores unusable, starting from random networks"
            );
            self.generation += 1;
            return self.random_offspring(size, rng);
        }

        let mut ranked: Vec<usize> = (0..scores.len()).collect();
        ranked.sort_by(|&a, &b| rank_key(scores[b]).total_cmp(&rank_key(scores[a])));
        self.record_scores(ranked[0], rank_key(scores[ranked[0]]), parents);

        let params = &self.params;
        let mut next = Vec::with_capacity(size);

        // elites
        for &i in ranked.iter().take(params.elite_count.min(size)) {
            match &parents[i] {
                Some(network) => next.push(Offspring::new(network.clone(), Origin::Elite)),
                None => {
                    tracing::warn!(index = i, "elite network missing, using a random network");
                    let network = Network::random(self.topology, rng);
                    next.push(Offspring::new(network, Origin::Random));
                }
            }
        }
        let elite_len = next.len();

        // reproducing pool
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            clippy::cast_precision_loss
        )]
        let pool_len = ((params.truncation_fraction * ranked.len() as f64).ceil() as usize)
            .clamp(1, ranked.len());
        let pool_members: Vec<(&Network, f64)> = ranked[..pool_len]
            .iter()
            .filter_map(|&i| parents[i].as_ref().map(|network| (network, scores[i])))
            .collect();
        let shift = pool_members
            .iter()
            .map(|(_, score)| *score)
            .filter(|score| score.is_finite())
            .fold(0.0, f64::min)
            .abs();
        let pool: Vec<Candidate<'_>> = pool_members
            .into_iter()
            .map(|(network, score)| Candidate {
                network,
                score,
                weight: if score.is_finite() {
                    (score + shift + params.selection_epsilon).powf(params.selection_exponent)
                } else {
                    0.0
                },
            })
            .collect();

        // parent score of each non-elite offspring, for stagnation recovery
        let mut parent_scores = Vec::with_capacity(size.saturating_sub(elite_len));
        let scale = params.mutation_scale(self.generation);
        let rate = params.mutation_rate * scale;
        let amount = params.mutation_amount * scale;

        while next.len() < size {
            if pool.is_empty() {
                next.push(Offspring::new(Network::random(self.topology, rng), Origin::Random));
                parent_scores.push(f64::NEG_INFINITY);
                continue;
            }
            let parent = roulette(&pool, rng);
            let offspring = if params.crossover_rate > 0.0
                && rng.random_bool(params.crossover_rate.min(1.0))
            {
                let other = roulette(&pool, rng);
                let child = parent
                    .network
                    .crossover(other.network, rng)
                    .unwrap_or_else(|_| parent.network.clone());
                Offspring::new(child.mutate(rate, amount, params.noise, rng), Origin::Crossover)
            } else if rng.random_bool(params.clone_probability.clamp(0.0, 1.0)) {
                Offspring::new(parent.network.clone(), Origin::Clone)
            } else {
                Offspring::new(
                    parent.network.mutate(rate, amount, params.noise, rng),
                    Origin::Mutant,
                )
            };
            next.push(offspring);
            parent_scores.push(rank_key(parent.score));
        }

        if self.stagnation >= params.stagnation_limit {
            let mut weakest: Vec<usize> = (0..parent_scores.len()).collect();
            weakest.sort_by(|&a, &b| parent_scores[a].total_cmp(&parent_scores[b]));
            let count = params.stagnation_injection.min(weakest.len());
            for &i in &weakest[..count] {
                next[elite_len + i] =
                    Offspring::new(Network::random(self.topology, rng), Origin::Random);
            }
            tracing::info!(
                generation = self.generation,
                stagnation = self.stagnation,
                injected = count,
                "best score stagnated, injecting random networks"
            );
            self.stagnation = 0;
        }

        // exact size
        next.truncate(size);
        while next.len() < size {
            let network = match &parents[ranked[0]] {
                Some(best) => best.mutate(rate, amount, params.noise, rng),
                None => Network::random(self.topology, rng),
            };
            next.push(Offspring::new(network, Origin::Mutant));
        }

        self.generation += 1;
        next
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;

    fn topology() -> Topology {
        Topology::new(4, 4).unwrap()
    }

    fn population(size: usize, rng: &mut Pcg32) -> Vec<Option<Network>> {
        (0..size)
            .map(|_| Some(Network::random(topology(), rng)))
            .collect()
    }

    #[test]
    fn test_population_size_is_exact() {
        let mut rng = Pcg32::seed_from_u64(1);
        for input_size in [0, 1, 2, 5, 30] {
            for size in [0, 1, 2, 3, 7, 50] {
                let mut session = TrainingSession::new(topology(), EvolutionParams::default());
                let parents = population(input_size, &mut rng);
                #[expect(clippy::cast_precision_loss)]
                let scores: Vec<f64> = (0..input_size).map(|i| i as f64).collect();
                let next = session.next_generation(&parents, &scores, size, &mut rng);
                assert_eq!(next.len(), size, "input {input_size}, size {size}");
            }
        }
    }

    #[test]
    fn test_empty_or_mismatched_input_yields_random_networks() {
        let mut rng = Pcg32::seed_from_u64(2);
        let mut session = TrainingSession::new(topology(), EvolutionParams::default());
        let next = session.next_generation(&[], &[], 10, &mut rng);
        assert!(next.iter().all(|o| o.origin.is_random()));

        let parents = population(5, &mut rng);
        let next = session.next_generation(&parents, &[1.0, 2.0], 10, &mut rng);
        assert_eq!(next.len(), 10);
        assert!(next.iter().all(|o| o.origin.is_random()));
        assert_eq!(session.generation(), 2);
    }

    #[test]
    fn test_elites_are_copied_unchanged() {
        let mut rng = Pcg32::seed_from_u64(3);
        let parents = population(30, &mut rng);
        let scores: Vec<f64> = (0..30).map(|i| f64::from((i * 7) % 30)).collect();
        let mut session = TrainingSession::new(topology(), EvolutionParams::default());
        let next = session.next_generation(&parents, &scores, 30, &mut rng);

        let mut ranked: Vec<usize> = (0..30).collect();
        ranked.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        for (slot, &i) in ranked.iter().take(3).enumerate() {
            assert!(next[slot].origin.is_elite());
            assert_eq!(Some(&next[slot].network), parents[i].as_ref());
        }
        assert!(next[3..].iter().all(|o| !o.origin.is_elite()));
    }

    #[test]
    fn test_only_truncated_pool_reproduces() {
        let mut rng = Pcg32::seed_from_u64(4);
        let parents = population(20, &mut rng);
        let scores: Vec<f64> = (0..20).map(f64::from).collect();
        let params = EvolutionParams {
            clone_probability: 1.0,
            ..EvolutionParams::default()
        };
        let mut session = TrainingSession::new(topology(), params);
        let next = session.next_generation(&parents, &scores, 20, &mut rng);

        // top 10% of 20 = indices 19 and 18
        for offspring in &next[3..] {
            assert!(offspring.origin.is_clone());
            assert!(
                Some(&offspring.network) == parents[19].as_ref()
                    || Some(&offspring.network) == parents[18].as_ref()
            );
        }
    }

    #[test]
    fn test_zero_scores_still_select() {
        let mut rng = Pcg32::seed_from_u64(5);
        let parents = population(10, &mut rng);
        let mut session = TrainingSession::new(topology(), EvolutionParams::default());
        let next = session.next_generation(&parents, &[0.0; 10], 10, &mut rng);
        assert_eq!(next.len(), 10);
        assert!(next[3..].iter().all(|o| !o.origin.is_random()));
        assert_eq!(session.best_score(), 0.0);
    }

    #[test]
    fn test_nan_and_negative_scores_are_tolerated() {
        let mut rng = Pcg32::seed_from_u64(6);
        let parents = population(6, &mut rng);
        let scores = [f64::NAN, -5.0, 3.0, -1.0, f64::NAN, 2.0];
        let mut session = TrainingSession::new(topology(), EvolutionParams::default());
        let next = session.next_generation(&parents, &scores, 6, &mut rng);
        assert_eq!(next.len(), 6);
        assert_eq!(Some(&next[0].network), parents[2].as_ref());
        assert_eq!(Some(&next[1].network), parents[5].as_ref());
        assert_eq!(session.best_score(), 3.0);
    }

    #[test]
    fn test_missing_parents_fall_back_to_random() {
        let mut rng = Pcg32::seed_from_u64(7);
        let mut parents = population(10, &mut rng);
        parents[9] = None;
        parents[8] = None;
        let scores: Vec<f64> = (0..10).map(f64::from).collect();
        let mut session = TrainingSession::new(topology(), EvolutionParams::default());
        let next = session.next_generation(&parents, &scores, 10, &mut rng);
        assert_eq!(next.len(), 10);
        assert!(next[0].origin.is_random());
        assert!(next[1].origin.is_random());
        assert!(next[2].origin.is_elite());
        // best score still counts even though its network is gone
        assert_eq!(session.best_score(), 9.0);
        assert!(session.best_network().is_none());
    }

    #[test]
    fn test_all_parents_missing() {
        let mut rng = Pcg32::seed_from_u64(8);
        let parents = vec![None; 5];
        let mut session = TrainingSession::new(topology(), EvolutionParams::default());
        let next = session.next_generation(&parents, &[1.0; 5], 8, &mut rng);
        assert_eq!(next.len(), 8);
        assert!(next.iter().all(|o| o.origin.is_random()));
    }

    #[test]
    fn test_stagnation_injects_random_networks() {
        let mut rng = Pcg32::seed_from_u64(9);
        let params = EvolutionParams {
            stagnation_limit: 4,
            stagnation_injection: 6,
            ..EvolutionParams::default()
        };
        let mut session = TrainingSession::new(topology(), params);
        let scores: Vec<f64> = (0..40).map(|i| f64::from(i % 10)).collect();

        for generation in 0..=4 {
            let parents = population(40, &mut rng);
            let next = session.next_generation(&parents, &scores, 40, &mut rng);
            let random = next.iter().filter(|o| o.origin.is_random()).count();
            if generation < 4 {
                assert_eq!(random, 0, "generation {generation}");
                assert_eq!(session.stagnation(), generation);
            } else {
                assert!(random >= 6);
                assert!(next[..3].iter().all(|o| o.origin.is_elite()));
                assert_eq!(session.stagnation(), 0);
            }
        }
    }

    #[test]
    fn test_improvement_resets_stagnation() {
        let mut rng = Pcg32::seed_from_u64(10);
        let mut session = TrainingSession::new(topology(), EvolutionParams::default());
        let parents = population(5, &mut rng);
        session.next_generation(&parents, &[1.0; 5], 5, &mut rng);
        session.next_generation(&parents, &[1.0; 5], 5, &mut rng);
        assert_eq!(session.stagnation(), 1);
        session.next_generation(&parents, &[1.0, 1.0, 2.0, 1.0, 1.0], 5, &mut rng);
        assert_eq!(session.stagnation(), 0);
        assert_eq!(session.best_network(), parents[2].as_ref());
    }

    #[test]
    fn test_crossover_origin_when_enabled() {
        let mut rng = Pcg32::seed_from_u64(11);
        let params = EvolutionParams {
            crossover_rate: 1.0,
            ..EvolutionParams::default()
        };
        let parents = population(20, &mut rng);
        let scores: Vec<f64> = (0..20).map(f64::from).collect();
        let mut session = TrainingSession::new(topology(), params);
        let next = session.next_generation(&parents, &scores, 20, &mut rng);
        assert!(next[3..].iter().all(|o| o.origin.is_crossover()));
    }

    #[test]
    fn test_mutation_scale_decays_to_half() {
        let params = EvolutionParams::default();
        assert_eq!(params.mutation_scale(0), 1.0);
        assert!(params.mutation_scale(10) < params.mutation_scale(1));
        assert!(params.mutation_scale(1_000_000) >= 0.5);
    }
}
