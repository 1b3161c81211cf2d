use core::fmt;
use byteorder::{ByteOrder, NetworkEndian};

/// The address family of a connection.
///
/// Chosen once when a connection record is allocated and never changed afterwards. All address
/// comparisons of that connection happen within this family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Domain {
    /// Internet protocol version 4, `PF_INET`.
    Inet,
    /// Internet protocol version 6, `PF_INET6`.
    Inet6,
}

/// A four-octet IPv4 address, in network byte order.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Ipv4Address(pub [u8; 4]);

/// A sixteen-octet IPv6 address, in network byte order.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Default)]
pub struct Ipv6Address(pub [u8; 16]);

/// An internetworking address of either family.
///
/// There is no family-less unspecified address. Each family has its own wildcard value so that a
/// wildcard always keeps the domain of the connection it belongs to.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum Address {
    /// An IPv4 address.
    Ipv4(Ipv4Address),

    /// An IPv6 address.
    Ipv6(Ipv6Address),
}

impl Ipv4Address {
    /// The unspecified address, `INADDR_ANY`.
    pub const UNSPECIFIED: Ipv4Address = Ipv4Address([0; 4]);

    /// The limited broadcast address.
    pub const BROADCAST: Ipv4Address = Ipv4Address([255; 4]);

    /// The loopback address, `127.0.0.1`.
    pub const LOOPBACK: Ipv4Address = Ipv4Address([127, 0, 0, 1]);

    /// Construct an IPv4 address from parts.
    pub const fn new(a0: u8, a1: u8, a2: u8, a3: u8) -> Ipv4Address {
        Ipv4Address([a0, a1, a2, a3])
    }

    /// Return an IPv4 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The address as an integer in network order, the first octet is the most significant.
    pub fn to_network_integer(self) -> u32 {
        NetworkEndian::read_u32(&self.0)
    }

    /// Query whether the address is the unspecified address.
    pub fn is_unspecified(&self) -> bool {
        *self == Self::UNSPECIFIED
    }

    /// Query whether the address is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }

    /// Query whether the address is a multicast address, `224.0.0.0/4`.
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0xf0 == 224
    }

    /// Query whether the address is the canonical loopback address.
    pub fn is_loopback(&self) -> bool {
        *self == Self::LOOPBACK
    }
}

impl Ipv6Address {
    /// The unspecified address, `::`.
    pub const UNSPECIFIED: Ipv6Address = Ipv6Address([0; 16]);

    /// The loopback address, `::1`.
    pub const LOOPBACK: Ipv6Address =
        Ipv6Address([0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);

    /// The link-local all nodes multicast address, `ff02::1`.
    pub const LINK_LOCAL_ALL_NODES: Ipv6Address =
        Ipv6Address([0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);

    /// Construct an IPv6 address from its eight 16-bit groups.
    pub fn new(a0: u16, a1: u16, a2: u16, a3: u16, a4: u16, a5: u16, a6: u16, a7: u16)
        -> Ipv6Address
    {
        let mut addr = [0u8; 16];
        NetworkEndian::write_u16_into(&[a0, a1, a2, a3, a4, a5, a6, a7], &mut addr);
        Ipv6Address(addr)
    }

    /// Return an IPv6 address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The two 64-bit halves of the address in network order.
    pub fn to_network_halves(self) -> (u64, u64) {
        (NetworkEndian::read_u64(&self.0[..8]), NetworkEndian::read_u64(&self.0[8..]))
    }

    /// Query whether the address is the unspecified address.
    pub fn is_unspecified(&self) -> bool {
        *self == Self::UNSPECIFIED
    }

    /// Query whether the address is a multicast address, `ff00::/8`.
    pub fn is_multicast(&self) -> bool {
        self.0[0] == 0xff
    }

    /// Query whether the address is the loopback address.
    pub fn is_loopback(&self) -> bool {
        *self == Self::LOOPBACK
    }
}

impl Address {
    /// Create an address wrapping an IPv4 address with the given octets.
    pub const fn v4(a0: u8, a1: u8, a2: u8, a3: u8) -> Address {
        Address::Ipv4(Ipv4Address::new(a0, a1, a2, a3))
    }

    /// The wildcard address of a domain.
    pub fn unspecified(domain: Domain) -> Address {
        match domain {
            Domain::Inet => Address::Ipv4(Ipv4Address::UNSPECIFIED),
            Domain::Inet6 => Address::Ipv6(Ipv6Address::UNSPECIFIED),
        }
    }

    /// The loopback address of a domain.
    pub fn loopback(domain: Domain) -> Address {
        match domain {
            Domain::Inet => Address::Ipv4(Ipv4Address::LOOPBACK),
            Domain::Inet6 => Address::Ipv6(Ipv6Address::LOOPBACK),
        }
    }

    /// The domain this address belongs to.
    pub fn domain(&self) -> Domain {
        match self {
            Address::Ipv4(_) => Domain::Inet,
            Address::Ipv6(_) => Domain::Inet6,
        }
    }

    /// Return an address as a sequence of octets, in big-endian.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Address::Ipv4(addr) => addr.as_bytes(),
            Address::Ipv6(addr) => addr.as_bytes(),
        }
    }

    /// Query whether the address falls into the "unspecified" range.
    pub fn is_unspecified(&self) -> bool {
        match self {
            Address::Ipv4(addr) => addr.is_unspecified(),
            Address::Ipv6(addr) => addr.is_unspecified(),
        }
    }

    /// Query whether the address is a valid multicast address.
    pub fn is_multicast(&self) -> bool {
        match self {
            Address::Ipv4(addr) => addr.is_multicast(),
            Address::Ipv6(addr) => addr.is_multicast(),
        }
    }

    /// Query whether the address is the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        match self {
            Address::Ipv4(addr) => addr.is_broadcast(),
            Address::Ipv6(_) => false,
        }
    }

    /// Query whether the address is the loopback address of its family.
    pub fn is_loopback(&self) -> bool {
        match self {
            Address::Ipv4(addr) => addr.is_loopback(),
            Address::Ipv6(addr) => addr.is_loopback(),
        }
    }
}

#[cfg(feature = "std")]
impl From<::std::net::IpAddr> for Address {
    fn from(x: ::std::net::IpAddr) -> Address {
        match x {
            ::std::net::IpAddr::V4(ipv4) => Address::Ipv4(Ipv4Address(ipv4.octets())),
            ::std::net::IpAddr::V6(ipv6) => Address::Ipv6(Ipv6Address(ipv6.octets())),
        }
    }
}

impl From<Ipv4Address> for Address {
    fn from(addr: Ipv4Address) -> Self {
        Address::Ipv4(addr)
    }
}

impl From<Ipv6Address> for Address {
    fn from(addr: Ipv6Address) -> Self {
        Address::Ipv6(addr)
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{}.{}.{}.{}", a, b, c, d)
    }
}

impl fmt::Display for Ipv6Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut groups = [0u16; 8];
        NetworkEndian::read_u16_into(&self.0, &mut groups);
        for (i, group) in groups.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:x}", group)?;
        }
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Address::Ipv4(addr) => write!(f, "{}", addr),
            Address::Ipv6(addr) => write!(f, "{}", addr),
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Domain::Inet => f.write_str("inet"),
            Domain::Inet6 => f.write_str("inet6"),
        }
    }
}
