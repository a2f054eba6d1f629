//! Seeded train/test partitioning.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{Error, Result};

fn validate_weights(weights: &[f64]) -> Result<f64>
{
    let valid = !weights.is_empty() && weights.iter().all(|w| w.is_finite() && *w >= 0.0);
    let total: f64 = weights.iter().sum();
    if !valid || total <= 0.0 {
        return Err(Error::InvalidSplitWeights(weights.to_vec()));
    }
    Ok(total)
}

/// Partitions `items` into `weights.len()` disjoint sets covering every item.
///
/// Weights are normalized by their sum. The items are shuffled with a
/// generator seeded from `seed` and then cut at the cumulative weight
/// boundaries, so each partition receives `round(weight * n)` items (the last
/// one takes the remainder). The same items, weights and seed always give the
/// same partitions.
pub fn random_split<T>(items: Vec<T>, weights: &[f64], seed: u64) -> Result<Vec<Vec<T>>>
{
    let total = validate_weights(weights)?;

    let mut items = items;
    let mut rng = StdRng::seed_from_u64(seed);
    items.shuffle(&mut rng);

    let n = items.len();
    let mut remaining = items.into_iter();
    let mut partitions = Vec::with_capacity(weights.len());
    let mut cumulative = 0.0;
    let mut lower = 0;
    for (i, weight) in weights.iter().enumerate() {
        cumulative += weight;
        let upper = if i == weights.len() - 1 {
            n
        } else {
            (((cumulative / total) * n as f64).round() as usize).clamp(lower, n)
        };
        partitions.push(remaining.by_ref().take(upper - lower).collect());
        lower = upper;
    }

    Ok(partitions)
}

#[cfg(test)]
mod tests
{
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn partitions_are_disjoint_and_cover_input()
    {
        let items: Vec<u32> = (0..100).collect();
        let parts = random_split(items, &[0.7, 0.3], 12345).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].len(), 70);
        assert_eq!(parts[1].len(), 30);

        let train: HashSet<u32> = parts[0].iter().copied().collect();
        let test: HashSet<u32> = parts[1].iter().copied().collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), 100);
    }

    #[test]
    fn same_seed_reproduces_partition()
    {
        let a = random_split((0..57).collect::<Vec<u32>>(), &[0.7, 0.3], 12345).unwrap();
        let b = random_split((0..57).collect::<Vec<u32>>(), &[0.7, 0.3], 12345).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_shuffle_differently()
    {
        let a = random_split((0..200).collect::<Vec<u32>>(), &[0.5, 0.5], 1).unwrap();
        let b = random_split((0..200).collect::<Vec<u32>>(), &[0.5, 0.5], 2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn weights_are_normalized()
    {
        let parts = random_split((0..10).collect::<Vec<u32>>(), &[7.0, 3.0], 12345).unwrap();
        assert_eq!(parts[0].len(), 7);
        assert_eq!(parts[1].len(), 3);

        let parts = random_split((0..12).collect::<Vec<u32>>(), &[1.0, 1.0, 2.0], 9).unwrap();
        assert_eq!(parts.iter().map(|p| p.len()).collect::<Vec<_>>(), vec![3, 3, 6]);
    }

    #[test]
    fn empty_input()
    {
        let parts = random_split(Vec::<u32>::new(), &[0.7, 0.3], 12345).unwrap();
        assert!(parts.iter().all(|p| p.is_empty()));
    }

    #[test]
    fn invalid_weights_are_rejected()
    {
        for weights in [vec![], vec![0.0, 0.0], vec![-0.5, 1.5], vec![f64::NAN, 1.0], vec![f64::INFINITY]] {
            let result = random_split(vec![1, 2, 3], &weights, 1);
            assert!(matches!(result, Err(Error::InvalidSplitWeights(_))), "{:?}", weights);
        }
    }
}
