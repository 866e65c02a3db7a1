//! Fork-join execution of per-band jobs.
//!
//! The two heavy phases of the decoder, up-resolution and color
//! conversion, slice the frame into horizontal bands that touch disjoint
//! output rows. Jobs are drained from a shared queue by a small pool of
//! scoped worker threads plus the calling thread; a band whose thread
//! could not be spawned is simply picked up by whoever drains it next, so
//! decode still succeeds with fewer (or zero) workers. Output is
//! bit-identical regardless of how bands get scheduled.

/// Worker threads used per phase, including the calling thread.
pub(crate) const BAND_COUNT: usize = 8;

/// Split `rows` output rows into at most [`BAND_COUNT`] contiguous ranges.
/// Band boundaries are aligned to `granularity` rows; the final band
/// absorbs the remainder.
pub(crate) fn band_ranges(rows: usize, granularity: usize) -> Vec<(usize, usize)> {
    debug_assert!(rows.is_multiple_of(granularity));
    let chunk = (rows / BAND_COUNT) / granularity * granularity;
    if chunk == 0 {
        return vec![(0, rows)];
    }
    let mut ranges = Vec::with_capacity(BAND_COUNT);
    let mut start = 0;
    for band in 0..BAND_COUNT {
        let end = if band == BAND_COUNT - 1 { rows } else { start + chunk };
        ranges.push((start, end));
        start = end;
    }
    ranges
}

/// Run one job per band, in parallel when the `threads` feature is on.
pub(crate) fn run_bands<J, F>(jobs: Vec<J>, worker: F)
where
    J: Send,
    F: Fn(J) + Sync,
{
    #[cfg(feature = "threads")]
    if jobs.len() > 1 {
        let queue = std::sync::Mutex::new(jobs.into_iter());
        let next = || queue.lock().ok().and_then(|mut queue| queue.next());
        std::thread::scope(|scope| {
            for _ in 0..BAND_COUNT - 1 {
                // A failed spawn is fine: the remaining workers and the
                // calling thread drain that band's share of the queue.
                let _ = std::thread::Builder::new().spawn_scoped(scope, || {
                    while let Some(job) = next() {
                        worker(job);
                    }
                });
            }
            while let Some(job) = next() {
                worker(job);
            }
        });
        return;
    }

    for job in jobs {
        worker(job);
    }
}
