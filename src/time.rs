//! GraniteChess - Turn Clock Module
//!
//! Wall-clock budget for a single turn. The budget is sampled once when
//! the turn starts; the search polls `out_of_time` and stops once the
//! time already spent, scaled by a safety factor, exceeds it. With the
//! factor at 30 a turn consumes roughly 1/30th of the remaining clock.

use std::time::Instant;

pub const TIME_SAFETY_FACTOR: u64 = 30;

#[derive(Clone, Copy)]
pub struct TurnClock {
    start: Instant,
    budget_ms: u64,
}

impl TurnClock {
    /// Budget from the remaining clock time of the side to move
    pub fn from_remaining(remaining_ms: u64) -> Self {
        TurnClock {
            start: Instant::now(),
            budget_ms: remaining_ms,
        }
    }

    /// Budget that lets the search spend the given time on this one move
    pub fn for_move_time(move_time_ms: u64) -> Self {
        TurnClock {
            start: Instant::now(),
            budget_ms: move_time_ms.saturating_mul(TIME_SAFETY_FACTOR),
        }
    }

    pub fn infinite() -> Self {
        TurnClock {
            start: Instant::now(),
            budget_ms: u64::MAX,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    pub fn out_of_time(&self) -> bool {
        self.elapsed_ms().saturating_mul(TIME_SAFETY_FACTOR) > self.budget_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_clock_has_time() {
        assert!(!TurnClock::from_remaining(10_000).out_of_time());
        assert!(!TurnClock::infinite().out_of_time());
    }

    #[test]
    fn zero_budget_is_immediately_out_of_time() {
        let clock = TurnClock::from_remaining(0);
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(clock.out_of_time());
    }
}
