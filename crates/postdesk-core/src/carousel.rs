//! Slide carousel with a single-flight transition guard.
//!
//! [`CarouselState`] is the pure state machine. [`Carousel`] wraps it with
//! the render protocol and timers: begin, settle after 50 ms, clean up
//! after the transition delay, then back to idle. Any request that arrives
//! while a transition is running is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::CarouselConfig;
use crate::ui::{SlideDeck, SlideView};

const SETTLE_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Transitioning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// A transition that was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: usize,
    pub to: usize,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarouselState {
    index: usize,
    count: usize,
    phase: Phase,
}

impl CarouselState {
    pub fn new(count: usize) -> Self {
        Self {
            index: 0,
            count,
            phase: Phase::Idle,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn next_index(&self) -> usize {
        if self.count == 0 {
            return 0;
        }
        (self.index + 1) % self.count
    }

    pub fn prev_index(&self) -> usize {
        if self.count == 0 {
            return 0;
        }
        (self.index + self.count - 1) % self.count
    }

    /// Check-and-set: starts a transition to `target` unless one is running,
    /// the target is out of range, or it is already current.
    pub fn begin(&mut self, target: usize, direction: Direction) -> Option<Transition> {
        if self.phase == Phase::Transitioning || target >= self.count || target == self.index {
            return None;
        }
        let transition = Transition {
            from: self.index,
            to: target,
            direction,
        };
        self.index = target;
        self.phase = Phase::Transitioning;
        Some(transition)
    }

    pub fn finish(&mut self) {
        self.phase = Phase::Idle;
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared<V> {
    state: Mutex<CarouselState>,
    deck: Mutex<SlideDeck>,
    view: Arc<V>,
    transition: Duration,
}

/// Timer-driven carousel bound to a view.
pub struct Carousel<V> {
    shared: Arc<Shared<V>>,
}

impl<V> Clone for Carousel<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V: SlideView> Carousel<V> {
    /// Renders the initial deck: slide 0 and dot 0 active.
    pub fn new(count: usize, transition: Duration, view: Arc<V>) -> Self {
        let deck = SlideDeck::new(count);
        view.render(&deck);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(CarouselState::new(count)),
                deck: Mutex::new(deck),
                view,
                transition: transition.max(SETTLE_DELAY),
            }),
        }
    }

    pub fn from_config(count: usize, config: &CarouselConfig, view: Arc<V>) -> Self {
        Self::new(count, config.transition(), view)
    }

    pub fn index(&self) -> usize {
        lock(&self.shared.state).index()
    }

    pub fn phase(&self) -> Phase {
        lock(&self.shared.state).phase()
    }

    pub fn deck(&self) -> SlideDeck {
        lock(&self.shared.deck).clone()
    }

    pub fn advance(&self) -> bool {
        self.request(|state| state.next_index(), Direction::Forward)
    }

    pub fn recede(&self) -> bool {
        self.request(|state| state.prev_index(), Direction::Backward)
    }

    /// Jumps to a 1-based slide number.
    pub fn select(&self, number: usize) -> bool {
        let Some(target) = number.checked_sub(1) else {
            return false;
        };
        let transition = {
            let mut state = lock(&self.shared.state);
            let direction = if target > state.index() {
                Direction::Forward
            } else {
                Direction::Backward
            };
            state.begin(target, direction)
        };
        self.play(transition)
    }

    fn request(&self, target: impl FnOnce(&CarouselState) -> usize, direction: Direction) -> bool {
        let transition = {
            let mut state = lock(&self.shared.state);
            let target = target(&state);
            state.begin(target, direction)
        };
        self.play(transition)
    }

    fn play(&self, transition: Option<Transition>) -> bool {
        let Some(transition) = transition else {
            return false;
        };
        tracing::debug!(from = transition.from, to = transition.to, "slide transition");
        {
            let mut deck = lock(&self.shared.deck);
            deck.begin(
                transition.from,
                transition.to,
                transition.direction == Direction::Forward,
            );
            self.shared.view.render(&deck);
        }

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            tokio::time::sleep(SETTLE_DELAY).await;
            {
                let mut deck = lock(&shared.deck);
                deck.settle(transition.to);
                shared.view.render(&deck);
            }

            tokio::time::sleep(shared.transition.saturating_sub(SETTLE_DELAY)).await;
            {
                let mut deck = lock(&shared.deck);
                deck.cleanup();
                shared.view.render(&deck);
            }
            lock(&shared.state).finish();
        });
        true
    }

    /// Calls [`advance`](Self::advance) every `period` until the task is aborted.
    pub fn spawn_autoplay(&self, period: Duration) -> JoinHandle<()> {
        let carousel = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !carousel.advance() {
                    tracing::trace!("autoplay tick dropped");
                }
            }
        })
    }
}
