//! Anchor-based virtual clock with pause/resume and speed control

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from clock control operations
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClockError {
    #[error("invalid speed {0}: must be finite and > 0")]
    InvalidSpeed(f64),

    #[error("cannot travel back in time: target {target} is before current virtual time {now}")]
    InvalidTimeTravel {
        target: DateTime<Utc>,
        now: DateTime<Utc>,
    },
}

/// Anchor pair plus speed and paused flag.
///
/// Virtual time is always derived from the last anchor, never from total
/// elapsed wall time: every speed/pause/resume/jump re-anchors, so speed
/// changes never produce discontinuities and drift cannot accumulate.
struct Anchor {
    wall_ref: Instant,
    sim_ref: DateTime<Utc>,
    speed: f64,
    paused: bool,
}

impl Anchor {
    fn now(&self) -> DateTime<Utc> {
        if self.paused {
            return self.sim_ref;
        }
        let wall_elapsed = self.wall_ref.elapsed().as_secs_f64();
        let sim_elapsed = wall_elapsed * self.speed;
        self.sim_ref + chrono::Duration::from_std(Duration::from_secs_f64(sim_elapsed)).unwrap_or(chrono::Duration::zero())
    }

    fn reanchor(&mut self) {
        self.sim_ref = self.now();
        self.wall_ref = Instant::now();
    }
}

/// Virtual time source for the simulation
pub struct SimulationClock {
    inner: Mutex<Anchor>,
}

impl SimulationClock {
    /// Create a clock starting at the given virtual time and speed
    pub fn new(start_time: DateTime<Utc>, speed: f64) -> Result<Self, ClockError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ClockError::InvalidSpeed(speed));
        }
        Ok(Self {
            inner: Mutex::new(Anchor {
                wall_ref: Instant::now(),
                sim_ref: start_time,
                speed,
                paused: false,
            }),
        })
    }

    /// Create a real-time clock starting at the current wall time
    pub fn realtime() -> Self {
        Self::new(Utc::now(), 1.0).expect("1.0 is a valid speed")
    }

    /// Current virtual time
    pub fn now(&self) -> DateTime<Utc> {
        self.inner.lock().unwrap().now()
    }

    /// Change the virtual-time-per-real-time ratio
    pub fn set_speed(&self, speed: f64) -> Result<(), ClockError> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(ClockError::InvalidSpeed(speed));
        }
        let mut anchor = self.inner.lock().unwrap();
        anchor.reanchor();
        anchor.speed = speed;
        Ok(())
    }

    /// Current speed multiplier
    pub fn speed(&self) -> f64 {
        self.inner.lock().unwrap().speed
    }

    /// Freeze virtual time. Idempotent.
    pub fn pause(&self) {
        let mut anchor = self.inner.lock().unwrap();
        if !anchor.paused {
            anchor.reanchor();
            anchor.paused = true;
        }
    }

    /// Resume from the paused virtual time with no jump. Idempotent.
    pub fn resume(&self) {
        let mut anchor = self.inner.lock().unwrap();
        if anchor.paused {
            anchor.wall_ref = Instant::now();
            anchor.paused = false;
        }
    }

    /// Whether the clock is paused
    pub fn is_paused(&self) -> bool {
        self.inner.lock().unwrap().paused
    }

    /// Jump virtual time forward to `target`
    ///
    /// Fails if `target` is before the current virtual time; the clock only
    /// travels forward.
    pub fn advance_to(&self, target: DateTime<Utc>) -> Result<(), ClockError> {
        let mut anchor = self.inner.lock().unwrap();
        let now = anchor.now();
        if target < now {
            return Err(ClockError::InvalidTimeTravel { target, now });
        }
        anchor.sim_ref = target;
        anchor.wall_ref = Instant::now();
        Ok(())
    }

    /// Advance virtual time by a duration
    pub fn advance(&self, delta: chrono::Duration) -> Result<(), ClockError> {
        let target = self.now() + delta;
        self.advance_to(target)
    }

    /// Wall-clock duration until the given virtual instant at current speed
    ///
    /// Returns None if the clock is paused or the target is not in the
    /// future.
    pub fn wall_until(&self, target: DateTime<Utc>) -> Option<Duration> {
        let anchor = self.inner.lock().unwrap();
        if anchor.paused {
            return None;
        }
        let now = anchor.now();
        if target <= now {
            return None;
        }
        let sim_secs = (target - now).to_std().ok()?.as_secs_f64();
        Some(Duration::from_secs_f64(sim_secs / anchor.speed))
    }
}
