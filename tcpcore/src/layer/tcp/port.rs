use core::ops::Range;

use crate::layer::{Error, Result};
use crate::wire::{Domain, IpAddress};

use super::io::PortTranslation;
use super::pool::Pool;
use super::table::Table;

/// Chooses and verifies local ports.
///
/// Ephemeral ports are handed out from a rotating counter so that a recently closed port is not
/// reused right away. The counter is the only state, conflicts are always checked against the
/// current connection table.
#[derive(Clone, Debug)]
pub struct PortAllocator {
    range: Range<u16>,
    last: u16,
}

impl PortAllocator {
    /// Create an allocator for a range of ephemeral ports.
    ///
    /// The first port handed out follows `seed`, wrapping into the range.
    pub fn new(range: Range<u16>, seed: u16) -> Self {
        PortAllocator {
            range,
            last: seed,
        }
    }

    /// Select a local port.
    ///
    /// A nonzero `requested` port is verified and returned unchanged. For zero, the ephemeral range
    /// is probed once, starting after the last port handed out. Either way the port is in use if
    /// a live connection of the same domain has it bound to an overlapping address, or the port
    /// translation reserved it.
    pub fn select<P>(
        &mut self,
        table: &Table,
        pool: &Pool,
        translation: &P,
        domain: Domain,
        addr: IpAddress,
        requested: u16,
    ) -> Result<u16>
        where P: PortTranslation + ?Sized,
    {
        let taken = |port: u16| {
            table.find_listener(pool, domain, addr, port).is_some()
                || translation.port_in_use(domain, addr, port)
        };

        if requested != 0 {
            return if taken(requested) {
                net_debug!("tcp port {} in use", requested);
                Err(Error::InUse)
            } else {
                Ok(requested)
            };
        }

        let candidates = usize::from(self.range.end.saturating_sub(self.range.start));
        for _ in 0..candidates {
            let port = self.advance();
            if !taken(port) {
                return Ok(port);
            }
        }

        net_warn!("tcp ephemeral ports exhausted for {}", addr);
        Err(Error::InUse)
    }

    fn advance(&mut self) -> u16 {
        let next = self.last.wrapping_add(1);
        self.last = if next < self.range.start || next >= self.range.end {
            self.range.start
        } else {
            next
        };
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::tcp::{Config, State};

    struct NoTranslation;

    impl PortTranslation for NoTranslation { }

    struct Reserved(u16);

    impl PortTranslation for Reserved {
        fn port_in_use(&self, _: Domain, _: IpAddress, port: u16) -> bool {
            port == self.0
        }
    }

    fn bind(pool: &mut Pool, table: &mut Table, addr: IpAddress, port: u16) {
        let (key, conn) = pool.try_alloc().unwrap();
        conn.current = State::Listen;
        conn.tuple.local = addr;
        conn.tuple.local_port = port;
        table.link_last(pool, key);
    }

    #[test]
    fn requested_port() {
        let mut pool = Pool::new(&Config::default());
        let mut table = Table::default();
        let mut ports = PortAllocator::new(4096..32000, 0);
        let any = IpAddress::unspecified(Domain::Inet);
        let a = IpAddress::v4(10, 0, 0, 1);
        let b = IpAddress::v4(10, 0, 0, 2);

        assert_eq!(ports.select(&table, &pool, &NoTranslation, Domain::Inet, a, 80), Ok(80));
        bind(&mut pool, &mut table, a, 80);
        assert_eq!(ports.select(&table, &pool, &NoTranslation, Domain::Inet, a, 80), Err(Error::InUse));
        assert_eq!(ports.select(&table, &pool, &NoTranslation, Domain::Inet, any, 80), Err(Error::InUse));
        assert_eq!(ports.select(&table, &pool, &NoTranslation, Domain::Inet, b, 80), Ok(80));
        assert_eq!(ports.select(&table, &pool, &NoTranslation, Domain::Inet6,
            IpAddress::unspecified(Domain::Inet6), 80), Ok(80));
        assert_eq!(ports.select(&table, &pool, &Reserved(81), Domain::Inet, a, 81), Err(Error::InUse));
    }

    #[test]
    fn ephemeral_rotation() {
        let pool = Pool::new(&Config::default());
        let table = Table::default();
        let mut ports = PortAllocator::new(4096..32000, 0);
        let any = IpAddress::unspecified(Domain::Inet);
        assert_eq!(ports.select(&table, &pool, &NoTranslation, Domain::Inet, any, 0), Ok(4096));
        assert_eq!(ports.select(&table, &pool, &NoTranslation, Domain::Inet, any, 0), Ok(4097));
        assert_eq!(ports.select(&table, &pool, &Reserved(4098), Domain::Inet, any, 0), Ok(4099));

        let mut ports = PortAllocator::new(4096..32000, 31999);
        assert_eq!(ports.select(&table, &pool, &NoTranslation, Domain::Inet, any, 0), Ok(4096));
    }

    #[test]
    fn ephemeral_exhaustion() {
        let mut pool = Pool::new(&Config { preallocated: 4, ..Config::default() });
        let mut table = Table::default();
        let mut ports = PortAllocator::new(5000..5003, 0);
        let any = IpAddress::unspecified(Domain::Inet);

        for _ in 0..3 {
            let port = ports.select(&table, &pool, &NoTranslation, Domain::Inet, any, 0).unwrap();
            bind(&mut pool, &mut table, any, port);
        }

        assert_eq!(ports.select(&table, &pool, &NoTranslation, Domain::Inet, any, 0), Err(Error::InUse));
    }
}
