use std::time::SystemTime;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

// The engine's notion of time is driven entirely by the `Instant`s passed through the API.
// Hello randoms and ticket timestamps still need wall-clock seconds, so we freeze one
// moment as both an Instant and a SystemTime and translate relative to it.
static BEGINNING_OF_TIME: Lazy<(Instant, SystemTime)> = Lazy::new(|| {
    let now = Instant::now();
    let now_sys = SystemTime::now();

    // Go back up to an hour so slightly older Instants still map forward.
    let beginning_of_time = (0..=3600)
        .rev()
        .find_map(|secs| now.checked_sub(Duration::from_secs(secs)))
        .unwrap_or(now);

    let since_beginning_of_time = now - beginning_of_time;
    let beginning_of_time_sys = now_sys - since_beginning_of_time;

    (beginning_of_time, beginning_of_time_sys)
});

pub trait InstantExt {
    /// Convert an Instant to the duration since the unix epoch.
    fn to_unix_duration(&self) -> Duration;

    /// Whole seconds since the unix epoch, as carried in hello randoms and tickets.
    fn to_unix_secs(&self) -> u32 {
        self.to_unix_duration().as_secs() as u32
    }
}

impl InstantExt for Instant {
    fn to_unix_duration(&self) -> Duration {
        if *self < BEGINNING_OF_TIME.0 {
            warn!("Time went backwards from beginning_of_time Instant");
        }

        let duration_since_time_0 = self.saturating_duration_since(BEGINNING_OF_TIME.0);
        let system_time = BEGINNING_OF_TIME.1 + duration_since_time_0;

        system_time
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_instants_map_to_later_seconds() {
        let now = Instant::now();
        let a = now.to_unix_secs();
        let b = (now + Duration::from_secs(90)).to_unix_secs();
        assert!(b >= a + 89 && b <= a + 91);
    }
}
