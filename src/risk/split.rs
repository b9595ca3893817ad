//! Train/test partition at entity granularity.

use crate::dataset::EntityId;
use crate::error::DataQualityError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashSet};

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSplit {
    /// Row indices, ascending
    pub train: Vec<usize>,
    pub test: Vec<usize>,
    pub train_entities: Vec<EntityId>,
    pub test_entities: Vec<EntityId>,
}

/// Hold out `ceil(test_fraction * entities)` entities chosen by one seeded
/// shuffle. Every row of an entity lands on the same side.
pub fn group_split(groups: &[EntityId], test_fraction: f64, seed: u64) -> Result<GroupSplit, DataQualityError> {
    let mut entities: Vec<EntityId> = groups.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
    let n = entities.len();
    if n < 2 {
        return Err(DataQualityError::DegenerateSplit {
            reason: format!("{n} entities; at least 2 are needed"),
        });
    }
    let n_test = ((test_fraction * n as f64).ceil() as usize).max(1);
    if n_test >= n {
        return Err(DataQualityError::DegenerateSplit {
            reason: format!("test_fraction {test_fraction} holds out all {n} entities"),
        });
    }

    entities.shuffle(&mut StdRng::seed_from_u64(seed));
    let mut test_entities = entities.split_off(n - n_test);
    let mut train_entities = entities;
    test_entities.sort();
    train_entities.sort();

    let held_out: HashSet<&EntityId> = test_entities.iter().collect();
    let (test, train): (Vec<usize>, Vec<usize>) = (0..groups.len()).partition(|&i| held_out.contains(&groups[i]));
    Ok(GroupSplit {
        train,
        test,
        train_entities,
        test_entities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(entities: usize, rows_each: usize) -> Vec<EntityId> {
        (0..entities)
            .flat_map(|e| std::iter::repeat(EntityId::from(e as u32)).take(rows_each))
            .collect()
    }

    #[test]
    fn no_entity_on_both_sides() {
        let g = groups(10, 5);
        for seed in 0..50 {
            let s = group_split(&g, 0.2, seed).unwrap();
            let train: HashSet<&EntityId> = s.train.iter().map(|&i| &g[i]).collect();
            assert!(s.test.iter().all(|&i| !train.contains(&g[i])), "seed {seed}");
            assert_eq!(s.test_entities.len(), 2);
            assert_eq!(s.train.len() + s.test.len(), g.len());
        }
    }

    #[test]
    fn same_seed_same_split() {
        let g = groups(12, 3);
        assert_eq!(group_split(&g, 0.25, 5).unwrap(), group_split(&g, 0.25, 5).unwrap());
    }

    #[test]
    fn single_entity_is_degenerate() {
        let g = groups(1, 10);
        assert!(matches!(
            group_split(&g, 0.2, 42),
            Err(DataQualityError::DegenerateSplit { .. })
        ));
    }

    #[test]
    fn test_fraction_rounds_up() {
        let g = groups(3, 2);
        let s = group_split(&g, 0.2, 1).unwrap();
        assert_eq!(s.test_entities.len(), 1);
        assert_eq!(s.train_entities.len(), 2);
    }
}
