//! Per address family behaviour.
//!
//! IPv4 and IPv6 connections share all of their logic except for address comparisons and a few
//! constants. These differences are collected in the [`Family`] trait with one implementation per
//! family. The domain stored in each connection selects the implementation.
use crate::wire::{Domain, IpAddress, Ipv4Address, Ipv6Address};

use super::connection::Connection;
use super::io::Incoming;

/// The capabilities that differ between the address families.
pub(crate) trait Family {
    /// The address type of the family.
    type Addr: Copy + Eq;

    /// The minimum segment size every host of the family accepts.
    const INITIAL_MSS: u16;

    /// Narrow an address to this family.
    fn narrow(addr: IpAddress) -> Option<Self::Addr>;

    /// Check for the wildcard address.
    fn is_unspecified(addr: Self::Addr) -> bool;

    /// Local addresses that may be bound without belonging to a device.
    fn is_special_local(addr: Self::Addr) -> bool;
}

pub(crate) struct Inet4;

pub(crate) struct Inet6;

impl Family for Inet4 {
    type Addr = Ipv4Address;

    const INITIAL_MSS: u16 = 536;

    fn narrow(addr: IpAddress) -> Option<Ipv4Address> {
        match addr {
            IpAddress::Ipv4(addr) => Some(addr),
            IpAddress::Ipv6(_) => None,
        }
    }

    fn is_unspecified(addr: Ipv4Address) -> bool {
        addr.is_unspecified()
    }

    fn is_special_local(addr: Ipv4Address) -> bool {
        addr.is_unspecified() || addr.is_loopback() || addr.is_broadcast() || addr.is_multicast()
    }
}

impl Family for Inet6 {
    type Addr = Ipv6Address;

    const INITIAL_MSS: u16 = 1220;

    fn narrow(addr: IpAddress) -> Option<Ipv6Address> {
        match addr {
            IpAddress::Ipv6(addr) => Some(addr),
            IpAddress::Ipv4(_) => None,
        }
    }

    fn is_unspecified(addr: Ipv6Address) -> bool {
        addr.is_unspecified()
    }

    fn is_special_local(addr: Ipv6Address) -> bool {
        addr.is_unspecified()
            || addr.is_loopback()
            || addr == Ipv6Address::LINK_LOCAL_ALL_NODES
    }
}

/// Does a bound local address accept a packet for `dst`?
fn local_accepts<F: Family>(local: IpAddress, dst: IpAddress) -> bool {
    match (F::narrow(local), F::narrow(dst)) {
        (Some(local), Some(dst)) => F::is_unspecified(local) || local == dst,
        _ => false,
    }
}

fn segment_matches<F: Family>(conn: &Connection, segment: &Incoming) -> bool {
    let remote = match (F::narrow(conn.tuple.remote), F::narrow(segment.src)) {
        (Some(remote), Some(src)) => remote == src,
        _ => false,
    };

    segment.header.dst_port == conn.tuple.local_port
        && segment.header.src_port == conn.tuple.remote_port
        && local_accepts::<F>(conn.tuple.local, segment.dst)
        && remote
}

fn bindings_overlap<F: Family>(bound: IpAddress, query: IpAddress) -> bool {
    match (F::narrow(bound), F::narrow(query)) {
        (Some(bound), Some(query)) => {
            bound == query || F::is_unspecified(bound) || F::is_unspecified(query)
        },
        _ => false,
    }
}

fn is_special_local<F: Family>(addr: IpAddress) -> bool {
    F::narrow(addr).map_or(false, F::is_special_local)
}

/// The initial maximum segment size of a domain.
pub(crate) fn initial_mss(domain: Domain) -> u16 {
    match domain {
        Domain::Inet => Inet4::INITIAL_MSS,
        Domain::Inet6 => Inet6::INITIAL_MSS,
    }
}

/// Check if a received segment belongs to a connection.
///
/// Ports must match exactly, the remote address must equal the source and the local address must
/// be the destination or the wildcard.
pub(crate) fn matches(conn: &Connection, segment: &Incoming) -> bool {
    match conn.domain {
        Domain::Inet => segment_matches::<Inet4>(conn, segment),
        Domain::Inet6 => segment_matches::<Inet6>(conn, segment),
    }
}

/// Check if two local bindings on the same port conflict.
///
/// They do when the addresses are equal or either one is the wildcard.
pub(crate) fn overlaps(domain: Domain, bound: IpAddress, query: IpAddress) -> bool {
    match domain {
        Domain::Inet => bindings_overlap::<Inet4>(bound, query),
        Domain::Inet6 => bindings_overlap::<Inet6>(bound, query),
    }
}

/// Check if a local address may be bound without a device owning it.
pub(crate) fn is_special(domain: Domain, addr: IpAddress) -> bool {
    match domain {
        Domain::Inet => is_special_local::<Inet4>(addr),
        Domain::Inet6 => is_special_local::<Inet6>(addr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{TcpFlags, TcpHeader, TcpSeqNumber};

    fn incoming(src: IpAddress, dst: IpAddress, src_port: u16, dst_port: u16) -> Incoming {
        Incoming {
            src,
            dst,
            header: TcpHeader {
                src_port,
                dst_port,
                seq_number: TcpSeqNumber(0),
                ack_number: TcpSeqNumber(0),
                flags: TcpFlags::ACK,
                window_len: 0,
                header_len: 20,
            },
        }
    }

    #[test]
    fn wildcard_local_matches_any_destination() {
        let mut conn = Connection::default();
        conn.tuple.local = IpAddress::unspecified(Domain::Inet);
        conn.tuple.local_port = 80;
        conn.tuple.remote = IpAddress::v4(192, 168, 1, 1);
        conn.tuple.remote_port = 5000;

        let seg = incoming(IpAddress::v4(192, 168, 1, 1), IpAddress::v4(10, 0, 0, 2), 5000, 80);
        assert!(matches(&conn, &seg));

        let other_peer = incoming(IpAddress::v4(192, 168, 1, 2), IpAddress::v4(10, 0, 0, 2), 5000, 80);
        assert!(!matches(&conn, &other_peer));

        conn.tuple.local = IpAddress::v4(10, 0, 0, 3);
        assert!(!matches(&conn, &seg));
    }

    #[test]
    fn families_do_not_mix() {
        let mut conn = Connection::default();
        conn.domain = Domain::Inet6;
        conn.tuple = crate::layer::tcp::FourTuple::unspecified(Domain::Inet6);
        let seg = incoming(IpAddress::v4(1, 2, 3, 4), IpAddress::v4(5, 6, 7, 8), 0, 0);
        assert!(!matches(&conn, &seg));
        assert!(!overlaps(Domain::Inet6, IpAddress::v4(0, 0, 0, 0), IpAddress::v4(0, 0, 0, 0)));
    }

    #[test]
    fn binding_overlap() {
        let any = IpAddress::unspecified(Domain::Inet);
        let a = IpAddress::v4(10, 0, 0, 1);
        let b = IpAddress::v4(10, 0, 0, 2);
        assert!(overlaps(Domain::Inet, any, any));
        assert!(overlaps(Domain::Inet, any, a));
        assert!(overlaps(Domain::Inet, a, any));
        assert!(overlaps(Domain::Inet, a, a));
        assert!(!overlaps(Domain::Inet, a, b));
    }

    #[test]
    fn special_addresses() {
        assert!(is_special(Domain::Inet, IpAddress::v4(127, 0, 0, 1)));
        assert!(is_special(Domain::Inet, IpAddress::v4(239, 1, 1, 1)));
        assert!(!is_special(Domain::Inet, IpAddress::v4(10, 0, 0, 1)));
        assert!(is_special(Domain::Inet6, IpAddress::unspecified(Domain::Inet6)));
        assert!(!is_special(Domain::Inet6, IpAddress::v4(127, 0, 0, 1)));
        assert_eq!(initial_mss(Domain::Inet6), 1220);
    }
}
