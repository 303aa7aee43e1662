use std::time::{Duration, Instant};

/// Wall-clock origin shared by every stream of a session.
///
/// Captured once, after the container header is written and before the
/// first tick. Audio and video are stamped against the same origin, which
/// keeps them in real-time sync without any cross-stream coordination.
/// Backed by a monotonic clock, so elapsed time never goes backwards.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
}

impl SessionClock {
    /// Capture the origin now.
    pub fn start() -> Self {
        let clock = Self {
            origin: Instant::now(),
        };
        tracing::debug!("session clock started");
        clock
    }

    /// Microseconds elapsed since the origin.
    pub fn elapsed_micros(&self) -> u64 {
        u64::try_from(self.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn elapsed_is_non_decreasing() {
        let clock = SessionClock::start();
        let mut previous = clock.elapsed_micros();
        for _ in 0..1000 {
            let now = clock.elapsed_micros();
            assert!(now >= previous);
            previous = now;
        }
    }

    #[test]
    fn elapsed_tracks_wall_time() {
        let clock = SessionClock::start();
        thread::sleep(Duration::from_millis(5));
        assert!(clock.elapsed_micros() >= 5_000);
    }

    #[test]
    fn copies_share_origin() {
        let clock = SessionClock::start();
        let copy = clock;
        thread::sleep(Duration::from_millis(1));
        let a = clock.elapsed_micros();
        let b = copy.elapsed_micros();
        assert!(b >= a);
    }
}
