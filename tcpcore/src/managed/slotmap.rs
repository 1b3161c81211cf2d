use crate::alloc::vec::Vec;

/// The bookkeeping of a single element.
///
/// Separated from the elements themselves so that scans of the free list never have to touch the
/// (much larger) element memory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Slot {
    /// The generation of the element stored here, or the link to the next free slot.
    ///
    /// If the given out key mismatches the generation then the element was removed already and
    /// we can return `None` on lookup.
    occupancy: Occupancy,
}

/// A bounded pool of elements addressed by stable, generation-checked keys.
///
/// A slotmap provides a `Vec`-like interface where each entry is associated with a stable
/// index-like key. Lookup with the key will detect if an entry has been removed but does not
/// require any lifetime relation.
///
/// ## Usage
///
/// The backing store starts out with a number of preallocated elements. When all of them are in
/// use it may grow in steps of `grow_by` elements until it holds `limit` elements. A `limit` of
/// zero removes the upper bound, a `grow_by` of zero makes the store fixed.
///
/// ```
/// # use tcpcore::managed::SlotMap;
/// let mut map: SlotMap<usize> = SlotMap::new(2, 0, 0);
/// let index = map.insert(42).unwrap();
/// assert_eq!(map.get(index).cloned(), Some(42));
/// ```
pub struct SlotMap<T> {
    elements: Vec<T>,
    slots: Vec<Slot>,
    generation: Generation,
    free_top: Option<usize>,
    len: usize,
    grow_by: usize,
    limit: usize,
}

/// An index into a slotmap.
///
/// The index remains valid until the entry is removed. If accessing the slotmap with the index
/// again after the entry was removed will fail, even if the index where the element was previously
/// stored has been reused for another element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key {
    idx: usize,
    generation: Generation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Occupancy {
    Used(Generation),
    Free { next: Option<usize> },
}

/// The generation counter.
///
/// Has strictly positive values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Generation(u32);

impl<T: Default> SlotMap<T> {
    /// Create a pool with `preallocated` elements that may grow by `grow_by` up to `limit`.
    pub fn new(preallocated: usize, grow_by: usize, limit: usize) -> Self {
        let preallocated = if limit == 0 { preallocated } else { preallocated.min(limit) };
        let mut map = SlotMap {
            elements: Vec::with_capacity(preallocated),
            slots: Vec::with_capacity(preallocated),
            generation: Generation::default(),
            free_top: None,
            len: 0,
            grow_by,
            limit,
        };
        map.extend(preallocated);
        map
    }

    /// Reserve a new entry.
    ///
    /// The element is reset to its default value before it is handed out.
    pub fn reserve(&mut self) -> Option<(Key, &mut T)> {
        let index = self.free()?;
        let slot = &mut self.slots[index];
        let next = match slot.occupancy {
            Occupancy::Free { next } => next,
            Occupancy::Used(_) => unreachable!("Free list pointed at a used slot"),
        };

        slot.occupancy = Occupancy::Used(self.generation);
        let key = Key {
            idx: index,
            generation: self.generation,
        };

        self.free_top = next;
        self.generation.advance();
        self.len += 1;

        let element = &mut self.elements[index];
        *element = T::default();
        Some((key, element))
    }

    /// Sugar wrapper around `reserve` for inserting values.
    pub fn insert(&mut self, value: T) -> Option<Key> {
        let (key, element) = self.reserve()?;
        *element = value;
        Some(key)
    }

    /// Get the next free slot, growing the backing store if permitted.
    fn free(&mut self) -> Option<usize> {
        if self.free_top.is_none() {
            let room = match self.limit {
                0 => self.grow_by,
                limit => self.grow_by.min(limit - self.slots.len()),
            };
            self.extend(room);
        }

        self.free_top
    }

    fn extend(&mut self, count: usize) {
        for _ in 0..count {
            let index = self.slots.len();
            self.elements.push(T::default());
            self.slots.push(Slot {
                occupancy: Occupancy::Free { next: self.free_top },
            });
            self.free_top = Some(index);
        }
    }
}

impl<T> SlotMap<T> {
    /// Retrieve a value by index.
    pub fn get(&self, index: Key) -> Option<&T> {
        if !self.contains(index) {
            return None;
        }

        self.elements.get(index.idx)
    }

    /// Retrieve a mutable value by index.
    pub fn get_mut(&mut self, index: Key) -> Option<&mut T> {
        if !self.contains(index) {
            return None;
        }

        self.elements.get_mut(index.idx)
    }

    /// Check if the key refers to a live element.
    pub fn contains(&self, index: Key) -> bool {
        match self.slots.get(index.idx) {
            Some(Slot { occupancy: Occupancy::Used(generation) }) => *generation == index.generation,
            _ => false,
        }
    }

    /// Remove an element.
    ///
    /// If successful, return a mutable reference to the removed element. Returns `None` if the
    /// provided index did not refer to an element that could be freed.
    pub fn remove(&mut self, index: Key) -> Option<&mut T> {
        if !self.contains(index) {
            return None;
        }

        self.slots[index.idx].occupancy = Occupancy::Free { next: self.free_top };
        self.free_top = Some(index.idx);
        self.len -= 1;

        Some(&mut self.elements[index.idx])
    }

    /// The number of elements in use.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no element is in use.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The number of elements currently backed by memory.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl Generation {
    fn advance(&mut self) {
        debug_assert!(self.0 > 0);
        self.0 = self.0.wrapping_add(1).max(1)
    }
}

impl Default for Generation {
    fn default() -> Self {
        Generation(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple() {
        let mut map = SlotMap::new(2, 0, 0);
        let key42 = map.insert(42u32).unwrap();
        let keylo = map.insert('K' as _).unwrap();

        assert_eq!(map.insert(0x9999), None);
        assert_eq!(map.get(key42).cloned(), Some(42));
        assert_eq!(map.get(keylo).cloned(), Some('K' as _));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn retained() {
        let mut map = SlotMap::new(1, 0, 0);
        let key = map.insert(0xdeu32).unwrap();
        map.remove(key).unwrap();
        assert_eq!(map.get(key), None);

        let new_key = map.insert(0xad).unwrap();

        assert_eq!(map.get(key), None);
        assert_eq!(map.get(new_key).cloned(), Some(0xad));

        assert_eq!(map.remove(key), None);
        map.remove(new_key).unwrap();

        assert_eq!(map.get(key), None);
        assert_eq!(map.get(new_key), None);
        assert!(map.is_empty());
    }

    #[test]
    fn grows_to_limit() {
        let mut map = SlotMap::new(1, 2, 4);
        let keys: Vec<_> = (0..4u8).map(|i| map.insert(i).unwrap()).collect();
        assert_eq!(map.capacity(), 4);
        assert_eq!(map.insert(9), None);

        map.remove(keys[2]).unwrap();
        let again = map.insert(7).unwrap();
        assert_eq!(map.get(again).cloned(), Some(7));
        assert_eq!(map.capacity(), 4);
    }

    #[test]
    fn reserve_resets_element() {
        let mut map = SlotMap::new(1, 0, 0);
        let key = map.insert(5u32).unwrap();
        map.remove(key);
        let (_, element) = map.reserve().unwrap();
        assert_eq!(*element, 0);
    }
}
