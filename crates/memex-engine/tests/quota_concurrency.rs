//! Invariant 8: 2N concurrent saves against a remaining quota of N yield
//! exactly N successes and N `QuotaExceeded`, never more of either.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use memex_core::config::MemexConfig;
use memex_core::MemexError;
use memex_engine::Engine;

#[test]
fn exactly_n_saves_succeed_under_concurrent_pressure() {
    let n = 5usize;
    let mut config = MemexConfig::default();
    config.quota.max_memories_per_user = n as u64;
    config.rate_limit.enabled = false;
    let engine = Arc::new(Engine::open_in_memory(config).unwrap());

    let successes = Arc::new(AtomicUsize::new(0));
    let quota_errors = Arc::new(AtomicUsize::new(0));

    std::thread::scope(|scope| {
        for i in 0..(2 * n) {
            let engine = Arc::clone(&engine);
            let successes = Arc::clone(&successes);
            let quota_errors = Arc::clone(&quota_errors);
            scope.spawn(move || {
                match engine.save("alice", "s1", format!("memory {i}"), 0.5, None, None, vec![]) {
                    Ok(_) => {
                        successes.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(MemexError::QuotaExceeded(_)) => {
                        quota_errors.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => panic!("unexpected error: {e}"),
                }
            });
        }
    });

    assert_eq!(successes.load(Ordering::SeqCst), n);
    assert_eq!(quota_errors.load(Ordering::SeqCst), n);
}
