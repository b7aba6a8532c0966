//! Process-wide request pacing: a fair token bucket with a blocking acquire,
//! refilled at the per-minute rate, plus a rolling daily ceiling.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use super::LlmError;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy)]
pub struct RateLimits {
    pub per_minute: u32,
    pub per_day: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            per_minute: 50,
            per_day: 4000,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    day_spent: u32,
    day_window_start: Instant,
}

#[derive(Debug, PartialEq)]
enum Poll {
    Granted,
    Wait(Duration),
    Exhausted,
}

/// Token bucket shared by every caller of the gateway. Callers block in
/// `acquire` until a token frees up; the condvar keeps waiters fair enough
/// that no caller starves under steady load.
pub struct TokenBucket {
    limits: RateLimits,
    state: Mutex<BucketState>,
    cv: Condvar,
}

impl TokenBucket {
    pub fn new(limits: RateLimits) -> Self {
        let now = Instant::now();
        Self {
            limits,
            state: Mutex::new(BucketState {
                tokens: limits.per_minute as f64,
                last_refill: now,
                day_spent: 0,
                day_window_start: now,
            }),
            cv: Condvar::new(),
        }
    }

    /// Block until a token is granted. Errors only when the daily ceiling
    /// is spent and the day window has not rolled over.
    pub fn acquire(&self) -> Result<(), LlmError> {
        let mut state = self.state.lock().expect("rate bucket lock poisoned");
        loop {
            match poll(&mut state, &self.limits, Instant::now()) {
                Poll::Granted => {
                    self.cv.notify_one();
                    return Ok(());
                }
                Poll::Exhausted => return Err(LlmError::BudgetExhausted),
                Poll::Wait(delay) => {
                    let (next, _timeout) = self
                        .cv
                        .wait_timeout(state, delay)
                        .expect("rate bucket lock poisoned");
                    state = next;
                }
            }
        }
    }
}

fn poll(state: &mut BucketState, limits: &RateLimits, now: Instant) -> Poll {
    // Roll the daily window before judging the ceiling.
    if now.duration_since(state.day_window_start) >= DAY {
        state.day_window_start = now;
        state.day_spent = 0;
    }
    if state.day_spent >= limits.per_day {
        return Poll::Exhausted;
    }

    let rate_per_sec = limits.per_minute as f64 / 60.0;
    let elapsed = now.duration_since(state.last_refill).as_secs_f64();
    state.tokens = (state.tokens + elapsed * rate_per_sec).min(limits.per_minute as f64);
    state.last_refill = now;

    if state.tokens >= 1.0 {
        state.tokens -= 1.0;
        state.day_spent += 1;
        Poll::Granted
    } else {
        let deficit = 1.0 - state.tokens;
        Poll::Wait(Duration::from_secs_f64(deficit / rate_per_sec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_at(now: Instant, limits: &RateLimits) -> BucketState {
        BucketState {
            tokens: limits.per_minute as f64,
            last_refill: now,
            day_spent: 0,
            day_window_start: now,
        }
    }

    #[test]
    fn grants_up_to_capacity_then_waits() {
        let limits = RateLimits {
            per_minute: 3,
            per_day: 100,
        };
        let now = Instant::now();
        let mut state = state_at(now, &limits);

        for _ in 0..3 {
            assert_eq!(poll(&mut state, &limits, now), Poll::Granted);
        }
        match poll(&mut state, &limits, now) {
            Poll::Wait(delay) => {
                // 3/min = one token every 20s.
                assert!(delay > Duration::from_secs(19) && delay <= Duration::from_secs(20));
            }
            other => panic!("expected Wait, got {other:?}"),
        }
    }

    #[test]
    fn refills_at_the_per_minute_rate() {
        let limits = RateLimits {
            per_minute: 60,
            per_day: 1000,
        };
        let now = Instant::now();
        let mut state = state_at(now, &limits);
        for _ in 0..60 {
            assert_eq!(poll(&mut state, &limits, now), Poll::Granted);
        }
        assert!(matches!(poll(&mut state, &limits, now), Poll::Wait(_)));

        // Two seconds later there are two fresh tokens.
        let later = now + Duration::from_secs(2);
        assert_eq!(poll(&mut state, &limits, later), Poll::Granted);
        assert_eq!(poll(&mut state, &limits, later), Poll::Granted);
        assert!(matches!(poll(&mut state, &limits, later), Poll::Wait(_)));
    }

    #[test]
    fn tokens_never_exceed_capacity() {
        let limits = RateLimits {
            per_minute: 5,
            per_day: 1000,
        };
        let now = Instant::now();
        let mut state = state_at(now, &limits);

        // A long idle stretch must not bank more than one minute's worth.
        let much_later = now + Duration::from_secs(3600);
        for _ in 0..5 {
            assert_eq!(poll(&mut state, &limits, much_later), Poll::Granted);
        }
        assert!(matches!(poll(&mut state, &limits, much_later), Poll::Wait(_)));
    }

    #[test]
    fn daily_ceiling_exhausts_then_rolls_over() {
        let limits = RateLimits {
            per_minute: 60,
            per_day: 2,
        };
        let now = Instant::now();
        let mut state = state_at(now, &limits);

        assert_eq!(poll(&mut state, &limits, now), Poll::Granted);
        assert_eq!(poll(&mut state, &limits, now), Poll::Granted);
        assert_eq!(poll(&mut state, &limits, now), Poll::Exhausted);

        let tomorrow = now + DAY;
        assert_eq!(poll(&mut state, &limits, tomorrow), Poll::Granted);
    }

    #[test]
    fn blocking_acquire_grants_under_capacity() {
        let bucket = TokenBucket::new(RateLimits {
            per_minute: 100,
            per_day: 100,
        });
        for _ in 0..10 {
            bucket.acquire().unwrap();
        }
    }

    #[test]
    fn blocking_acquire_errors_when_day_is_spent() {
        let bucket = TokenBucket::new(RateLimits {
            per_minute: 100,
            per_day: 1,
        });
        bucket.acquire().unwrap();
        assert!(matches!(bucket.acquire(), Err(LlmError::BudgetExhausted)));
    }
}
