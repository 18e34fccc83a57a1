// src/generators/clock.rs
//! Shared spawn clock.
//! Every timer is a one-shot countdown advanced in fixed quanta. A timer that
//! runs out stays finished until its owner re-arms it with `set_length_and_reset`.

use bevy::prelude::*; // Timer, TimerMode
use std::collections::BTreeMap;
use std::time::Duration;

use super::entry::EntryHandle;

/// Quantum used when nothing else is configured (one server tick).
pub const DEFAULT_TICK_QUANTUM: Duration = Duration::from_millis(50);

/// Handle to a timer owned by a `SpawnClock`. Ids are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Who is told when a timer runs out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerOwner {
    pub generator: String,
    pub entry: EntryHandle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerStatus {
    /// Created but never started.
    Idle,
    Running,
    Paused,
}

/// A timer that ran out during `SpawnClock::advance`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expired {
    pub timer: TimerId,
    pub owner: TimerOwner,
}

struct SpawnTimer {
    countdown: Timer,
    owner: TimerOwner,
    status: TimerStatus,
}

pub struct SpawnClock {
    quantum: Duration,
    next_id: u64,
    // BTreeMap so expiries come back in creation order.
    timers: BTreeMap<TimerId, SpawnTimer>,
}

impl Default for SpawnClock {
    fn default() -> Self { Self::new(DEFAULT_TICK_QUANTUM) }
}

impl SpawnClock {
    pub fn new(quantum: Duration) -> Self {
        Self { quantum, next_id: 1, timers: BTreeMap::new() }
    }

    pub fn quantum(&self) -> Duration { self.quantum }

    pub fn len(&self) -> usize { self.timers.len() }
    pub fn is_empty(&self) -> bool { self.timers.is_empty() }

    pub fn create_timer(&mut self, length: Duration, owner: TimerOwner) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;

        let mut countdown = Timer::new(length, TimerMode::Once);
        countdown.pause();
        self.timers.insert(id, SpawnTimer { countdown, owner, status: TimerStatus::Idle });
        id
    }

    /// Begin counting down. No effect on a running timer.
    pub fn start(&mut self, id: TimerId) {
        if let Some(t) = self.timers.get_mut(&id) {
            t.countdown.unpause();
            t.status = TimerStatus::Running;
        }
    }

    /// Freeze a running timer; remaining time is kept.
    pub fn pause(&mut self, id: TimerId) {
        if let Some(t) = self.timers.get_mut(&id) {
            if t.status == TimerStatus::Running {
                t.countdown.pause();
                t.status = TimerStatus::Paused;
            }
        }
    }

    /// Resume a paused timer from where it stopped.
    pub fn unpause(&mut self, id: TimerId) {
        if let Some(t) = self.timers.get_mut(&id) {
            if t.status == TimerStatus::Paused {
                t.countdown.unpause();
                t.status = TimerStatus::Running;
            }
        }
    }

    /// Drop the timer. Returns false if it was already gone.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    /// Replace the length and restart the countdown from the top.
    /// The running/paused state is left alone.
    pub fn set_length_and_reset(&mut self, id: TimerId, length: Duration) {
        if let Some(t) = self.timers.get_mut(&id) {
            t.countdown.set_duration(length);
            t.countdown.reset();
        }
    }

    pub fn contains(&self, id: TimerId) -> bool { self.timers.contains_key(&id) }

    pub fn length(&self, id: TimerId) -> Option<Duration> {
        self.timers.get(&id).map(|t| t.countdown.duration())
    }

    pub fn remaining(&self, id: TimerId) -> Option<Duration> {
        self.timers.get(&id).map(|t| t.countdown.remaining())
    }

    pub fn status(&self, id: TimerId) -> Option<TimerStatus> {
        self.timers.get(&id).map(|t| t.status)
    }

    /// Advance every running timer by one quantum and report the ones that ran out.
    pub fn advance(&mut self) -> Vec<Expired> {
        let quantum = self.quantum;

        let mut expired = Vec::new();
        for (id, t) in self.timers.iter_mut() {
            if t.status != TimerStatus::Running { continue; }
            if t.countdown.tick(quantum).just_finished() {
                expired.push(Expired { timer: *id, owner: t.owner.clone() });
            }
        }
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> TimerOwner {
        TimerOwner { generator: "gold".into(), entry: EntryHandle::next() }
    }

    fn clock() -> SpawnClock { SpawnClock::new(Duration::from_millis(50)) }

    #[test]
    fn idle_timer_does_not_count_down() {
        let mut clock = clock();
        let id = clock.create_timer(Duration::from_millis(100), owner());
        assert_eq!(clock.status(id), Some(TimerStatus::Idle));
        for _ in 0..5 { assert!(clock.advance().is_empty()); }
        assert_eq!(clock.remaining(id), Some(Duration::from_millis(100)));
    }

    #[test]
    fn running_timer_expires_once_until_rearmed() {
        let mut clock = clock();
        let id = clock.create_timer(Duration::from_millis(100), owner());
        clock.start(id);

        assert!(clock.advance().is_empty());
        let fired = clock.advance();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].timer, id);

        // Not re-armed: stays finished, never fires again.
        for _ in 0..4 { assert!(clock.advance().is_empty()); }

        clock.set_length_and_reset(id, Duration::from_millis(100));
        assert!(clock.advance().is_empty());
        assert_eq!(clock.advance().len(), 1);
    }

    #[test]
    fn pause_freezes_remaining_time_and_is_idempotent() {
        let mut clock = clock();
        let id = clock.create_timer(Duration::from_millis(200), owner());
        clock.start(id);
        clock.advance();

        clock.pause(id);
        let frozen = clock.remaining(id);
        clock.pause(id);
        for _ in 0..10 { clock.advance(); }
        assert_eq!(clock.remaining(id), frozen);
        assert_eq!(clock.status(id), Some(TimerStatus::Paused));

        clock.unpause(id);
        assert_eq!(clock.remaining(id), Some(Duration::from_millis(150)));
        clock.advance();
        clock.advance();
        assert_eq!(clock.advance().len(), 1);
    }

    #[test]
    fn reset_applies_new_length_immediately() {
        let mut clock = clock();
        let id = clock.create_timer(Duration::from_millis(1000), owner());
        clock.start(id);
        for _ in 0..15 { clock.advance(); }

        clock.set_length_and_reset(id, Duration::from_millis(150));
        assert_eq!(clock.length(id), Some(Duration::from_millis(150)));
        assert_eq!(clock.remaining(id), Some(Duration::from_millis(150)));
        assert!(clock.advance().is_empty());
        assert!(clock.advance().is_empty());
        assert_eq!(clock.advance().len(), 1);
    }

    #[test]
    fn cancelled_timer_is_gone() {
        let mut clock = clock();
        let id = clock.create_timer(Duration::ZERO, owner());
        clock.start(id);
        assert!(clock.cancel(id));
        assert!(!clock.cancel(id));
        assert!(clock.advance().is_empty());
        assert_eq!(clock.remaining(id), None);
    }

    #[test]
    fn expiries_come_back_in_creation_order() {
        let mut clock = clock();
        let a = clock.create_timer(Duration::from_millis(50), owner());
        let b = clock.create_timer(Duration::from_millis(50), owner());
        clock.start(b);
        clock.start(a);
        let fired: Vec<TimerId> = clock.advance().into_iter().map(|e| e.timer).collect();
        assert_eq!(fired, vec![a, b]);
    }
}
