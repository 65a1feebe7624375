/// Randomized pre-run delay.
///
/// Scheduled runs across many deployments tend to fire on the same minute;
/// a bounded random sleep before the first request spreads them out. The
/// sleep blocks the whole process and cannot be cancelled once started.

use std::time::Duration;

use rand::Rng;
use tracing::info;

use crate::logging::DataSource;

/// Pick a delay uniformly from `[0, max]`, at millisecond resolution.
pub fn jitter_delay(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// Sleep for a random delay of at most `max`. Returns the delay taken.
pub fn sleep_before_run(max: Duration) -> Duration {
    let delay = jitter_delay(max);
    if !delay.is_zero() {
        info!(source = %DataSource::System, delay_ms = delay.as_millis() as u64, "delaying run");
        std::thread::sleep(delay);
    }
    delay
}
