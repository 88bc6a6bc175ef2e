//! Bounded, order-preserving parallel mapping.
//!
//! Items are mapped on the rayon pool in windows of `max_concurrent`, so that
//! memory-heavy work (one volume per item) stays bounded. Outputs are handed
//! to a sequential consumer in input order as soon as their window finishes.

use rayon::prelude::*;

/// Maps `map` over `items` with at most `max_concurrent` items in flight and
/// feeds every output to `consume` in input order.
///
/// Stops at the first error from `consume`: outputs already consumed stay
/// consumed, later windows are never started.
///
/// # Panics
///
/// Panics if `max_concurrent` is 0.
pub fn par_map_ordered<T, R, E, F, C>(
    items: &[T],
    max_concurrent: usize,
    map: F,
    mut consume: C,
) -> Result<(), E>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
    C: FnMut(R) -> Result<(), E>,
{
    assert!(max_concurrent > 0, "max_concurrent must be > 0");

    for window in items.chunks(max_concurrent) {
        let outputs: Vec<R> = window.par_iter().map(&map).collect();
        for output in outputs {
            consume(output)?;
        }
    }
    Ok(())
}
