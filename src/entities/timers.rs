use std::collections::HashMap;

/// Name and behaviour of a per-pawn timer. Count-down timers fire once their
/// value reaches zero; count-up timers only accumulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub name: &'static str,
    pub remove_on_zero: bool,
    pub tick_forward: bool,
}

impl TimerKey {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            remove_on_zero: true,
            tick_forward: false,
        }
    }

    pub const fn counter(name: &'static str) -> Self {
        Self {
            name,
            remove_on_zero: false,
            tick_forward: true,
        }
    }

    pub const fn persistent(name: &'static str) -> Self {
        Self {
            name,
            remove_on_zero: false,
            tick_forward: false,
        }
    }
}

pub const FROZEN_TIMER: TimerKey = TimerKey::new("frozen");
pub const STUN_TIMER: TimerKey = TimerKey::new("stunned");
pub const RESET_PAWN_FACING_TIMER: TimerKey = TimerKey::new("reset_pawn_facing");
pub const ACTIVE_COMBAT_TIMER: TimerKey = TimerKey::new("active_combat");

#[derive(Debug, Default, Clone)]
pub struct TimerMap {
    timers: HashMap<TimerKey, i32>,
}

impl TimerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count-down timers are active while above zero, count-up timers while
    /// present.
    pub fn has(&self, key: TimerKey) -> bool {
        match self.timers.get(&key) {
            Some(&value) if key.tick_forward => value >= 0,
            Some(&value) => value > 0,
            None => false,
        }
    }

    pub fn exists(&self, key: TimerKey) -> bool {
        self.timers.contains_key(&key)
    }

    pub fn get(&self, key: TimerKey) -> i32 {
        self.timers.get(&key).copied().unwrap_or(0)
    }

    pub fn set(&mut self, key: TimerKey, value: i32) {
        self.timers.insert(key, value);
    }

    pub fn remove(&mut self, key: TimerKey) {
        self.timers.remove(&key);
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Count-down timers that reached zero, in a stable order.
    pub fn expired(&self) -> Vec<TimerKey> {
        let mut keys: Vec<TimerKey> = self
            .timers
            .iter()
            .filter(|(key, &value)| !key.tick_forward && value <= 0)
            .map(|(key, _)| *key)
            .collect();
        keys.sort_by_key(|key| key.name);
        keys
    }

    /// Drops fired timers that nobody re-armed, then advances the rest one tick.
    pub fn finish_cycle(&mut self, fired: &[TimerKey]) {
        for key in fired {
            if key.remove_on_zero && self.get(*key) <= 0 {
                self.timers.remove(key);
            }
        }
        for (key, value) in self.timers.iter_mut() {
            if key.tick_forward {
                *value = value.saturating_add(1);
            } else if *value > 0 {
                *value -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOGOUT: TimerKey = TimerKey::new("logout");
    const PLAYED: TimerKey = TimerKey::counter("played");

    #[test]
    fn countdown_fires_at_zero_and_is_removed() {
        let mut timers = TimerMap::new();
        timers.set(LOGOUT, 2);
        for _ in 0..2 {
            assert!(timers.expired().is_empty());
            timers.finish_cycle(&[]);
        }
        let fired = timers.expired();
        assert_eq!(fired, vec![LOGOUT]);
        timers.finish_cycle(&fired);
        assert!(!timers.exists(LOGOUT));
    }

    #[test]
    fn rearmed_timer_survives() {
        let mut timers = TimerMap::new();
        timers.set(LOGOUT, 0);
        let fired = timers.expired();
        timers.set(LOGOUT, 5);
        timers.finish_cycle(&fired);
        assert_eq!(timers.get(LOGOUT), 4);
    }

    #[test]
    fn counters_tick_forward() {
        let mut timers = TimerMap::new();
        timers.set(PLAYED, 0);
        timers.finish_cycle(&[]);
        timers.finish_cycle(&[]);
        assert_eq!(timers.get(PLAYED), 2);
        assert!(timers.expired().is_empty());
    }

    #[test]
    fn frozen_is_active_only_above_zero() {
        let mut timers = TimerMap::new();
        assert!(!timers.has(FROZEN_TIMER));
        timers.set(FROZEN_TIMER, 1);
        assert!(timers.has(FROZEN_TIMER));
        timers.finish_cycle(&[]);
        assert!(!timers.has(FROZEN_TIMER));
    }
}
