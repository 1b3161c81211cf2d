use crate::wire::{Domain, IpAddress};

use super::connection::{Connection, State};
use super::endpoint::SlotKey;
use super::family;
use super::io::Incoming;
use super::pool::Pool;

/// The list of active connections.
///
/// A doubly linked list threaded through the connection records themselves, in insertion order.
/// The table only stores the ends, the links live in each record and are maintained here.
#[derive(Clone, Copy, Debug, Default)]
pub struct Table {
    head: Option<SlotKey>,
    tail: Option<SlotKey>,
    len: usize,
}

/// Iterates over the active connections in insertion order.
pub struct Iter<'a> {
    pool: &'a Pool,
    next: Option<SlotKey>,
}

impl Table {
    /// Append a connection to the end of the list.
    pub(crate) fn link_last(&mut self, pool: &mut Pool, key: SlotKey) {
        let prev = self.tail;
        match pool.get_mut(key) {
            Some(conn) => {
                if conn.link.linked {
                    return;
                }
                conn.link.linked = true;
                conn.link.prev = prev;
                conn.link.next = None;
            },
            None => return,
        }

        match prev.and_then(|prev| pool.get_mut(prev)) {
            Some(tail) => tail.link.next = Some(key),
            None => self.head = Some(key),
        }

        self.tail = Some(key);
        self.len += 1;
    }

    /// Remove a connection from the list.
    ///
    /// Unlinking a connection that is not part of the list does nothing.
    pub(crate) fn unlink(&mut self, pool: &mut Pool, key: SlotKey) {
        let link = match pool.get(key) {
            Some(conn) => conn.link,
            None => return,
        };

        if !link.linked {
            return;
        }

        match link.prev.and_then(|prev| pool.get_mut(prev)) {
            Some(prev) => prev.link.next = link.next,
            None => self.head = link.next,
        }

        match link.next.and_then(|next| pool.get_mut(next)) {
            Some(next) => next.link.prev = link.prev,
            None => self.tail = link.prev,
        }

        if let Some(conn) = pool.get_mut(key) {
            conn.link = Default::default();
        }
        self.len -= 1;
    }

    /// The connection following `after`, or the first one for `None`.
    pub fn next(&self, pool: &Pool, after: Option<SlotKey>) -> Option<SlotKey> {
        match after {
            None => self.head,
            Some(key) => pool.get(key)?.link.next,
        }
    }

    /// Iterate over all active connections.
    pub fn iter<'a>(&self, pool: &'a Pool) -> Iter<'a> {
        Iter {
            pool,
            next: self.head,
        }
    }

    /// The number of active connections.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if there are no active connections.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Find a connection that owns a local port.
    ///
    /// Matches any connection that is not closed whose local port is `port` and whose local
    /// address overlaps `addr`, with the wildcard address overlapping everything.
    pub fn find_listener(&self, pool: &Pool, domain: Domain, addr: IpAddress, port: u16)
        -> Option<SlotKey>
    {
        self.iter(pool)
            .find(|(_, conn)| {
                !conn.is(State::Closed)
                    && conn.domain == domain
                    && conn.tuple.local_port == port
                    && family::overlaps(domain, conn.tuple.local, addr)
            })
            .map(|(key, _)| key)
    }

    /// Find the connection a received segment belongs to.
    pub fn find_active(&self, pool: &Pool, domain: Domain, segment: &Incoming)
        -> Option<SlotKey>
    {
        self.iter(pool)
            .find(|(_, conn)| {
                !conn.is(State::Closed)
                    && conn.domain == domain
                    && family::matches(conn, segment)
            })
            .map(|(key, _)| key)
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (SlotKey, &'a Connection);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.next?;
        let conn = self.pool.get(key)?;
        self.next = conn.link.next;
        Some((key, conn))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::tcp::Config;

    fn active(pool: &mut Pool, port: u16) -> SlotKey {
        let (key, conn) = pool.try_alloc().unwrap();
        conn.current = State::Established;
        conn.tuple.local_port = port;
        key
    }

    fn ports(table: &Table, pool: &Pool) -> Vec<u16> {
        table.iter(pool).map(|(_, conn)| conn.tuple.local_port).collect()
    }

    #[test]
    fn insertion_order() {
        let mut pool = Pool::new(&Config::default());
        let mut table = Table::default();
        let a = active(&mut pool, 1);
        let b = active(&mut pool, 2);
        let c = active(&mut pool, 3);
        table.link_last(&mut pool, a);
        table.link_last(&mut pool, b);
        table.link_last(&mut pool, c);
        assert_eq!(ports(&table, &pool), [1, 2, 3]);
        assert_eq!(table.next(&pool, None), Some(a));
        assert_eq!(table.next(&pool, Some(a)), Some(b));
        assert_eq!(table.next(&pool, Some(c)), None);

        table.unlink(&mut pool, b);
        assert_eq!(ports(&table, &pool), [1, 3]);
        table.unlink(&mut pool, b);
        assert_eq!(table.len(), 2);

        table.unlink(&mut pool, a);
        table.unlink(&mut pool, c);
        assert!(table.is_empty());
        assert_eq!(table.next(&pool, None), None);

        table.link_last(&mut pool, b);
        table.link_last(&mut pool, b);
        assert_eq!(ports(&table, &pool), [2]);
        assert!(pool.get(b).unwrap().is_linked());
    }

    #[test]
    fn listener_lookup() {
        let mut pool = Pool::new(&Config::default());
        let mut table = Table::default();
        let key = active(&mut pool, 23);
        table.link_last(&mut pool, key);

        let any = IpAddress::unspecified(Domain::Inet);
        let addr = IpAddress::v4(10, 0, 0, 1);
        assert_eq!(table.find_listener(&pool, Domain::Inet, addr, 23), Some(key));
        assert_eq!(table.find_listener(&pool, Domain::Inet, any, 23), Some(key));
        assert_eq!(table.find_listener(&pool, Domain::Inet, addr, 24), None);
        assert_eq!(table.find_listener(&pool, Domain::Inet6, IpAddress::unspecified(Domain::Inet6), 23), None);

        pool.get_mut(key).unwrap().current = State::Closed;
        assert_eq!(table.find_listener(&pool, Domain::Inet, addr, 23), None);
    }
}
