//! Bridge from the synchronous pipeline to async HTTP adapters.
//!
//! Sync jobs run on plain worker threads. Adapters that speak HTTP are async,
//! so each blocking call drives its future on a fresh current-thread runtime
//! owned by the calling worker.

use std::future::Future;

/// Runs `future` to completion on a current-thread runtime with timers enabled.
///
/// # Errors
///
/// Returns an error if the runtime cannot be created.
pub fn block_on<F: Future>(future: F) -> std::io::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn drives_timers() {
        let value = block_on(async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            7
        })
        .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn works_from_worker_threads() {
        let handles: Vec<_> = (0..4)
            .map(|i| thread::spawn(move || block_on(async move { i * 2 })))
            .collect();
        let results: Vec<i32> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        assert_eq!(results, vec![0, 2, 4, 6]);
    }
}
