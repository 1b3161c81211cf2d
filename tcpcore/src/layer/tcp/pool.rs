use crate::managed::SlotMap;

use super::config::Config;
use super::connection::{Connection, State};
use super::endpoint::SlotKey;

/// The bounded store of connection records.
///
/// Records are preallocated and may grow in steps up to a configured maximum. A reserved record
/// is always reset to its default, there is no state carried over from a previous user of the
/// slot. Reclaiming closing connections when the store is exhausted is a policy of the endpoint,
/// the pool itself only ever fails.
pub struct Pool {
    slots: SlotMap<Connection>,
}

impl Pool {
    /// Create a pool sized according to the configuration.
    pub fn new(config: &Config) -> Self {
        Pool {
            slots: SlotMap::new(config.preallocated, config.grow_by, config.max_connections),
        }
    }

    /// Take a fresh record out of the pool.
    pub fn try_alloc(&mut self) -> Option<(SlotKey, &mut Connection)> {
        let (key, conn) = self.slots.reserve()?;
        Some((SlotKey { key }, conn))
    }

    /// Return a record to the pool.
    ///
    /// Returns `false` if the key did not refer to an allocated record.
    pub fn release(&mut self, key: SlotKey) -> bool {
        match self.slots.remove(key.key) {
            Some(conn) => {
                *conn = Connection::default();
                debug_assert!(conn.is(State::Closed));
                true
            },
            None => false,
        }
    }

    /// Get a record by key.
    pub fn get(&self, key: SlotKey) -> Option<&Connection> {
        self.slots.get(key.key)
    }

    /// Get a mutable record by key.
    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut Connection> {
        self.slots.get_mut(key.key)
    }

    /// The number of records in use.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if no record is in use.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The number of records backed by memory.
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_growth() {
        let config = Config {
            preallocated: 1,
            grow_by: 1,
            max_connections: 2,
            ..Config::default()
        };
        let mut pool = Pool::new(&config);
        let (first, _) = pool.try_alloc().unwrap();
        let (second, _) = pool.try_alloc().unwrap();
        assert!(pool.try_alloc().is_none());
        assert_eq!(pool.capacity(), 2);

        assert!(pool.release(first));
        assert!(!pool.release(first));
        assert!(pool.get(first).is_none());
        assert!(pool.get(second).is_some());
        assert!(pool.try_alloc().is_some());
    }

    #[test]
    fn records_are_reset() {
        let mut pool = Pool::new(&Config::default());
        let (key, conn) = pool.try_alloc().unwrap();
        conn.current = State::Established;
        conn.readahead.extend_from_slice(b"leftover");
        pool.release(key);

        let (_, conn) = pool.try_alloc().unwrap();
        assert!(conn.is(State::Closed));
        assert!(conn.readahead.is_empty());
    }
}
