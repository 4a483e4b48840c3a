use std::ops::Range;

use super::error::TranslateError;

/// Reusable, fixed-capacity list of output events.
///
/// Event bytes are packed into one buffer allocated once; [`EventList::reset`]
/// clears the list without releasing the allocation.
#[derive(Debug)]
pub struct EventList {
    bytes: Vec<u8>,
    events: Vec<Range<usize>>,
    capacity: usize,
}

impl EventList {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            events: Vec::new(),
            capacity,
        }
    }

    pub fn reset(&mut self) {
        self.bytes.clear();
        self.events.clear();
    }

    /// Bytes still available for events.
    pub fn remaining(&self) -> usize {
        self.capacity - self.bytes.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&mut self, event: &[u8]) -> Result<(), TranslateError> {
        if event.is_empty() {
            return Err(TranslateError::EmptyEvent);
        }
        if event.len() > self.remaining() {
            return Err(TranslateError::Overflow {
                needed: event.len(),
                available: self.remaining(),
            });
        }
        let start = self.bytes.len();
        self.bytes.extend_from_slice(event);
        self.events.push(start..self.bytes.len());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.events.iter().map(|range| &self.bytes[range.clone()])
    }
}

#[cfg(test)]
mod tests {
    use super::EventList;
    use crate::translate::error::TranslateError;

    #[test]
    fn push_and_iterate() {
        let mut list = EventList::with_capacity(8);
        list.push(&[0x90, 0x3c, 0x40]).unwrap();
        list.push(&[0x80, 0x3c]).unwrap();
        let events: Vec<&[u8]> = list.iter().collect();
        assert_eq!(events, vec![&[0x90, 0x3c, 0x40][..], &[0x80, 0x3c][..]]);
        assert_eq!(list.remaining(), 3);
    }

    #[test]
    fn overflow_is_rejected() {
        let mut list = EventList::with_capacity(4);
        list.push(&[1, 2, 3]).unwrap();
        let err = list.push(&[4, 5]).unwrap_err();
        assert_eq!(
            err,
            TranslateError::Overflow {
                needed: 2,
                available: 1
            }
        );
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn reset_forgets_previous_events() {
        let mut list = EventList::with_capacity(4);
        list.push(&[1, 2, 3, 4]).unwrap();
        list.reset();
        assert!(list.is_empty());
        list.push(&[9]).unwrap();
        assert_eq!(list.iter().next(), Some(&[9u8][..]));
    }

    #[test]
    fn empty_event_is_rejected() {
        let mut list = EventList::with_capacity(4);
        assert_eq!(list.push(&[]), Err(TranslateError::EmptyEvent));
    }
}
