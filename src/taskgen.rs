//! Random task-set generation
//!
//! Produces structured task records for experiments and tests: solid
//! rectangular embeddings with correlated side lengths, sample budgets drawn
//! from a configurable range, and arrivals spread linearly over a horizon
//! proportional to the mean budget. The random source is injected so a seed
//! pins the whole set.

use rand::Rng;

use crate::task::TaskSpec;

/// Default sample-budget choices: 100..=1000 step 100
pub fn default_sample_range() -> Vec<u32> {
    (1..=10).map(|i| i * 100).collect()
}

/// Generate `num` task records
///
/// `embd_size` bounds the embedding side lengths; every task shares
/// `anneal_time`, and arrivals are rounded down to a multiple of it.
pub fn random_tasks<R: Rng + ?Sized>(
    num: usize,
    embd_size: (usize, usize),
    anneal_time: u64,
    sample_range: &[u32],
    rng: &mut R,
) -> Vec<TaskSpec> {
    if num == 0 || sample_range.is_empty() {
        return Vec::new();
    }
    let (max_rows, max_cols) = embd_size;
    let width = num.to_string().len();

    let rows: Vec<usize> = (0..num).map(|_| rng.gen_range(1..=max_rows)).collect();
    let cols: Vec<usize> = rows
        .iter()
        .map(|&r| (r as i64 + rng.gen_range(-2..=2)).clamp(1, max_cols as i64) as usize)
        .collect();
    let num_reads: Vec<u32> = (0..num)
        .map(|_| sample_range[rng.gen_range(0..sample_range.len())])
        .collect();

    let mean_reads =
        sample_range.iter().map(|&r| f64::from(r)).sum::<f64>() / sample_range.len() as f64;
    let horizon = num as f64 / 4.0 * mean_reads * anneal_time as f64;

    (0..num)
        .map(|i| {
            let linear = if num == 1 {
                0.0
            } else {
                i as f64 * horizon / (num - 1) as f64
            };
            let t_arrive = (linear as u64 / anneal_time) * anneal_time;
            TaskSpec {
                name: format!("t{i:0width$}"),
                embd: vec![vec![1; cols[i]]; rows[i]],
                num_reads: num_reads[i],
                anneal_time,
                t_arrive,
                anneal_schedule: None,
            }
        })
        .collect()
}
