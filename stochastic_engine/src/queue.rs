use std::collections::VecDeque;

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry<T> {
    pub tick: u32,
    pub value: T,
}

/// CV update payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CvEvent {
    pub volts: f32,
    pub slide: bool,
}

/// Bounded queue of entries kept sorted by tick.
///
/// Pushing at a tick that is already queued replaces that entry's value. A push
/// that would exceed the capacity is rejected with [`EngineError::QueueFull`].
#[derive(Debug, Clone)]
pub struct EventQueue<T> {
    entries: VecDeque<Entry<T>>,
    capacity: usize,
}

impl<T> EventQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Free slots left before pushes of new ticks start failing.
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.entries.len())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn front(&self) -> Option<&Entry<T>> {
        self.entries.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry<T>> {
        self.entries.iter()
    }

    pub fn push_replace(&mut self, tick: u32, value: T) -> Result<(), EngineError> {
        // Ticks are unique, a hit means replace.
        match self.entries.binary_search_by_key(&tick, |entry| entry.tick) {
            Ok(index) => {
                self.entries[index].value = value;
                Ok(())
            }
            Err(index) => {
                if self.entries.len() >= self.capacity {
                    return Err(EngineError::QueueFull {
                        tick,
                        capacity: self.capacity,
                    });
                }
                self.entries.insert(index, Entry { tick, value });
                Ok(())
            }
        }
    }

    /// Pops the front entry if it is due at `tick`.
    pub fn pop_due(&mut self, tick: u32) -> Option<Entry<T>> {
        match self.entries.front() {
            Some(entry) if entry.tick <= tick => self.entries.pop_front(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::Random;

    #[test]
    fn test_sorted_insert() {
        let mut queue = EventQueue::new(8);
        queue.push_replace(30, 'c').unwrap();
        queue.push_replace(10, 'a').unwrap();
        queue.push_replace(20, 'b').unwrap();
        let ticks: Vec<u32> = queue.iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![10, 20, 30]);
    }

    #[test]
    fn test_push_replace_overwrites() {
        let mut queue = EventQueue::new(4);
        queue.push_replace(12, true).unwrap();
        queue.push_replace(12, false).unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(
            queue.front(),
            Some(&Entry {
                tick: 12,
                value: false
            })
        );
    }

    #[test]
    fn test_pop_due() {
        let mut queue = EventQueue::new(4);
        queue.push_replace(5, 1).unwrap();
        queue.push_replace(9, 2).unwrap();
        assert_eq!(queue.pop_due(4), None);
        assert_eq!(queue.pop_due(7).map(|e| e.value), Some(1));
        assert_eq!(queue.pop_due(7), None);
        assert_eq!(queue.pop_due(100).map(|e| e.tick), Some(9));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_full_queue_rejects_new_ticks() {
        let mut queue = EventQueue::new(2);
        queue.push_replace(1, 'a').unwrap();
        queue.push_replace(2, 'b').unwrap();
        assert!(matches!(
            queue.push_replace(3, 'c'),
            Err(EngineError::QueueFull {
                tick: 3,
                capacity: 2
            })
        ));
        // Replacing an existing tick still works when full.
        queue.push_replace(2, 'z').unwrap();
        assert_eq!(queue.remaining(), 0);
    }

    #[test]
    fn test_interleaved_pushes_drain_in_order() {
        let mut rng = Random::new(31);
        let mut queue = EventQueue::new(64);
        let mut last = std::collections::BTreeMap::new();
        for i in 0..200u32 {
            let tick = rng.next_range(48);
            queue.push_replace(tick, i).unwrap();
            last.insert(tick, i);
        }

        let mut drained = Vec::new();
        while let Some(entry) = queue.pop_due(u32::MAX) {
            drained.push((entry.tick, entry.value));
        }
        assert!(drained.windows(2).all(|w| w[0].0 <= w[1].0));
        let expected: Vec<(u32, u32)> = last.into_iter().collect();
        assert_eq!(drained, expected);
    }
}
