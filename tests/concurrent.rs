use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use rand::seq::SliceRandom;
use rand::Rng;
use relix::{SparseBitSet, Trie};

const THREADS: usize = 8;

#[test]
fn parallel_trie_insertion() {
    const N: usize = 10_000;

    // A deduplicated list of random pairs.
    let mut rng = rand::thread_rng();
    let filter = Trie::<2>::new();
    let mut list = Vec::new();
    while filter.size() < N {
        let entry = [rng.gen_range(0..N as i32), rng.gen_range(0..N as i32)];
        if filter.insert(entry) {
            list.push(entry);
        }
    }

    // Insert the list with every tuple duplicated 1 to 3 times, shuffled,
    // from many threads at once.
    for duplicates in 1..4 {
        let mut full = Vec::with_capacity(N * duplicates);
        for _ in 0..duplicates {
            full.extend_from_slice(&list);
        }
        full.shuffle(&mut rng);

        let result = Trie::<2>::new();
        let fresh = AtomicUsize::new(0);
        thread::scope(|scope| {
            for chunk in full.chunks(full.len().div_ceil(THREADS)) {
                let result = &result;
                let fresh = &fresh;
                scope.spawn(move || {
                    let mut mine = 0;
                    for &entry in chunk {
                        if result.insert(entry) {
                            mine += 1;
                        }
                    }
                    fresh.fetch_add(mine, Ordering::Relaxed);
                });
            }
        });

        // Every tuple went in exactly once, no matter how many threads
        // raced on it.
        assert_eq!(result.size(), N);
        assert_eq!(fresh.load(Ordering::Relaxed), N);

        let should: BTreeSet<[i32; 2]> = full.iter().copied().collect();
        let is: BTreeSet<[i32; 2]> = result.iter().collect();
        for entry in &should {
            assert!(result.contains(*entry), "missing {entry:?}");
        }
        assert_eq!(should, is);
    }
}

#[test]
fn parallel_bitset_insertion() {
    const N: u32 = 50_000;

    let set = SparseBitSet::new();
    thread::scope(|scope| {
        for worker in 0..THREADS as u32 {
            let set = &set;
            scope.spawn(move || {
                // Overlapping strides so every key is raced by two workers.
                for key in (worker / 2..N).step_by(THREADS / 2) {
                    set.set(key * 3);
                }
            });
        }
    });

    let mut expected = BTreeSet::new();
    for worker in 0..THREADS as u32 {
        for key in (worker / 2..N).step_by(THREADS / 2) {
            expected.insert(key * 3);
        }
    }
    assert_eq!(set.size(), expected.len());
    assert!(set.iter().eq(expected.into_iter()));
}

#[test]
fn duplicate_insertions_race_for_one_flag() {
    const ROUNDS: usize = 200;

    let set = Trie::<2>::new();
    for round in 0..ROUNDS as i32 {
        let entry = [round * 7, round * 13];
        let winners = AtomicUsize::new(0);
        thread::scope(|scope| {
            for _ in 0..THREADS {
                scope.spawn(|| {
                    if set.insert(entry) {
                        winners.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
        });
        assert_eq!(winners.load(Ordering::Relaxed), 1, "round {round}");
    }
    assert_eq!(set.size(), ROUNDS);
}

#[test]
fn readers_observe_a_monotone_prefix() {
    const N: i32 = 30_000;

    let set = Trie::<2>::new();
    thread::scope(|scope| {
        // Writers fill the set in ascending order.
        for worker in 0..4i32 {
            let set = &set;
            scope.spawn(move || {
                let mut value = worker;
                while value < N {
                    set.insert([value, value * 2]);
                    value += 4;
                }
            });
        }

        // Readers watch size and iteration grow, never shrink.
        for _ in 0..3 {
            let set = &set;
            scope.spawn(move || {
                let mut last_size = 0;
                loop {
                    let size = set.size();
                    assert!(size >= last_size, "size shrank: {last_size} -> {size}");
                    last_size = size;

                    let mut counted = 0usize;
                    let mut previous = None;
                    for tuple in set.iter() {
                        assert!(previous < Some(tuple), "iteration out of order");
                        assert!(set.contains(tuple));
                        previous = Some(tuple);
                        counted += 1;
                    }
                    assert!(counted <= N as usize);
                    if size as i32 >= N {
                        break;
                    }
                }
            });
        }
    });

    assert_eq!(set.size(), N as usize);
}
