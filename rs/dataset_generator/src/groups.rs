use anyhow::{anyhow, Result};
use rand::seq::index;
use rand::Rng;

use crate::dataset::Predicates;

/// Labels train rows in consecutive blocks of `group_size`, starting at id 1. A trailing partial
/// block gets its own id, so the result always has exactly `train_count` entries.
pub fn assign_train_groups(train_count: usize, group_size: usize) -> Vec<i32> {
    (0..train_count)
        .map(|idx| (idx / group_size + 1) as i32)
        .collect()
}

/// For every query, draws between 1 and `max_groups_per_query` distinct group ids from
/// `1..=num_groups`, returned in ascending order.
pub fn sample_query_groups<R: Rng + ?Sized>(
    rng: &mut R,
    test_count: usize,
    num_groups: usize,
    max_groups_per_query: usize,
) -> Vec<Vec<i32>> {
    (0..test_count)
        .map(|_| {
            let num_picks = rng.gen_range(1..=max_groups_per_query).min(num_groups);
            let mut ids: Vec<i32> = index::sample(rng, num_groups, num_picks)
                .into_iter()
                .map(|idx| (idx + 1) as i32)
                .collect();
            ids.sort_unstable();
            ids
        })
        .collect()
}

pub fn assign_groups<R: Rng + ?Sized>(
    rng: &mut R,
    train_count: usize,
    test_count: usize,
    group_size: usize,
    max_groups_per_query: usize,
) -> Result<Predicates> {
    if group_size == 0 || max_groups_per_query == 0 {
        return Err(anyhow!(
            "group_size and max_groups_per_query must be greater than 0"
        ));
    }
    let num_groups = train_count.div_ceil(group_size);
    if num_groups == 0 {
        return Err(anyhow!("No train vectors to group"));
    }

    Ok(Predicates {
        train_ids: assign_train_groups(train_count, group_size),
        test_ids: sample_query_groups(rng, test_count, num_groups, max_groups_per_query),
    })
}
