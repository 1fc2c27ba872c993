use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GameTick(pub u64);

#[derive(Debug, Clone)]
pub struct GameClock {
    tick_length: Duration,
    tick: GameTick,
}

impl GameClock {
    pub fn new(tick_length: Duration) -> Self {
        let tick_length = if tick_length.is_zero() {
            Duration::from_millis(1)
        } else {
            tick_length
        };
        Self {
            tick_length,
            tick: GameTick(0),
        }
    }

    pub fn tick_length(&self) -> Duration {
        self.tick_length
    }

    pub fn now(&self) -> GameTick {
        self.tick
    }

    pub fn advance(&mut self, ticks: u64) -> GameTick {
        self.tick.0 = self.tick.0.saturating_add(ticks);
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_tick_length_is_clamped() {
        let clock = GameClock::new(Duration::ZERO);
        assert_eq!(clock.tick_length(), Duration::from_millis(1));
    }

    #[test]
    fn advance_saturates() {
        let mut clock = GameClock::new(Duration::from_millis(600));
        assert_eq!(clock.advance(3), GameTick(3));
        clock.advance(u64::MAX);
        assert_eq!(clock.now(), GameTick(u64::MAX));
    }
}
