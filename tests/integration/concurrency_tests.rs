//! Concurrency integration tests
//!
//! Parallel callers must never be admitted beyond a bucket's capacity.

#[cfg(test)]
mod tests {
    use crate::common::GatewayFactory;
    use bookgate::core::rate_limit::{Category, RequestInfo};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_parallel_tasks_admit_exactly_capacity() {
        let state = GatewayFactory::with_policy("payment", 10, 60);
        let allowed = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let limiter = state.limiter.clone();
                let allowed = allowed.clone();
                tokio::spawn(async move {
                    let decision = limiter.try_consume("1.2.3.4", Category::Payment).unwrap();
                    if decision.allowed {
                        allowed.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(allowed.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_each_client_gets_its_own_capacity_under_contention() {
        let state = GatewayFactory::with_policy("search", 5, 60);
        let clients = ["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.4"];

        let counts: Vec<usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = clients
                .iter()
                .map(|client| {
                    let limiter = state.limiter.clone();
                    scope.spawn(move || {
                        (0..50)
                            .filter(|_| {
                                limiter
                                    .try_consume(client, Category::Search)
                                    .unwrap()
                                    .allowed
                            })
                            .count()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(counts, vec![5, 5, 5, 5]);
        assert_eq!(state.limiter.bucket_count().unwrap(), 4);
    }

    #[test]
    fn test_concurrent_admission_through_the_gate_logic() {
        let state = GatewayFactory::with_policy("login", 3, 300);
        let admitted = AtomicUsize::new(0);
        let throttled = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    let info = RequestInfo::new("/login", "POST", "7.7.7.7");
                    let outcome = state.admission.evaluate(&info);
                    if outcome.is_forward() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    } else {
                        throttled.fetch_add(1, Ordering::SeqCst);
                    }
                });
            }
        });

        assert_eq!(admitted.load(Ordering::SeqCst), 3);
        assert_eq!(throttled.load(Ordering::SeqCst), 13);
    }
}
