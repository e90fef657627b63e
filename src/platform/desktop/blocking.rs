use std::time::Instant;

/// Runs a synchronous engine call from a UI handler and logs slow ones.
pub fn run_blocking<F, T>(label: &str, f: F) -> T
where
    F: FnOnce() -> T,
{
    let started = Instant::now();
    let out = f();
    let elapsed = started.elapsed();
    if elapsed.as_millis() > 100 {
        tracing::debug!(label, elapsed_ms = elapsed.as_millis() as u64, "slow grid call");
    }
    out
}
