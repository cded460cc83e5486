use std::panic;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Runs `work` over `items` on at most `workers` scoped threads.
///
/// Results come back in input order regardless of completion order, one per
/// item. A panic inside `work` is re-raised on the calling thread.
pub fn map_bounded<T, R, F>(items: &[T], workers: usize, work: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let workers = workers.clamp(1, items.len().max(1));
    if workers == 1 {
        return items.iter().map(&work).collect();
    }

    let next = AtomicUsize::new(0);
    let mut done: Vec<(usize, R)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| {
                    let mut local = Vec::new();
                    loop {
                        let idx = next.fetch_add(1, Ordering::Relaxed);
                        let Some(item) = items.get(idx) else {
                            break;
                        };
                        local.push((idx, work(item)));
                    }
                    local
                })
            })
            .collect();

        let mut done = Vec::with_capacity(items.len());
        for handle in handles {
            match handle.join() {
                Ok(local) => done.extend(local),
                Err(payload) => panic::resume_unwind(payload),
            }
        }
        done
    });

    // Each index is claimed by exactly one worker.
    debug_assert_eq!(done.len(), items.len());
    done.sort_unstable_by_key(|(idx, _)| *idx);
    done.into_iter().map(|(_, out)| out).collect()
}

#[cfg(test)]
mod tests {
    use super::map_bounded;
    use std::time::Duration;

    #[test]
    fn preserves_input_order() {
        let items: Vec<u64> = (0..32).collect();
        let out = map_bounded(&items, 6, |n| {
            std::thread::sleep(Duration::from_millis((32 - n) % 5));
            n * 10
        });
        assert_eq!(out, items.iter().map(|n| n * 10).collect::<Vec<_>>());
    }

    #[test]
    fn zero_workers_still_runs_sequentially() {
        let out = map_bounded(&["a", "b"], 0, |s| s.to_uppercase());
        assert_eq!(out, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn every_item_yields_exactly_one_result() {
        let items: Vec<usize> = (0..257).collect();
        for workers in [2, 7, 64, 300] {
            let out = map_bounded(&items, workers, |n| *n);
            assert_eq!(out, items, "workers={workers}");
        }
    }

    #[test]
    #[should_panic(expected = "unreadable item 5")]
    fn worker_panic_is_raised_instead_of_dropping_a_result() {
        let items: Vec<u32> = (0..12).collect();
        let _ = map_bounded(&items, 4, |n| {
            if *n == 5 {
                panic!("unreadable item 5");
            }
            *n
        });
    }

    #[test]
    fn empty_input_is_fine() {
        let out: Vec<u8> = map_bounded(&Vec::<u8>::new(), 4, |b| *b);
        assert!(out.is_empty());
    }
}
