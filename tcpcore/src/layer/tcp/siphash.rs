//! Initial sequence number generation, as recommended by rfc6528.
//!
//! Uses a keyed cryptographic hash function (SipHash-2-4) instead of appending the secret key to
//! the four tuple for hashing. Hash function SipHash-2-4 from:
//!
//! > SipHash: a fast short-input PRF, Jean-Philippe Aumasson and Daniel J. Bernstein
use byteorder::{ByteOrder, LittleEndian};

use crate::time::Instant;
use crate::wire::{IpAddress, Ipv6Address, TcpSeqNumber};

use super::connection::FourTuple;

/// An initial sequence number generator based on SipHash-2-4.
///
/// > ISN = M + SipHash-2-4(secretkey, localip, localport, remoteip, remoteport)
///
/// where `M` is a clock ticking every four microseconds. The hash separates the sequence spaces
/// of different connections while the clock keeps a reused four tuple from overlapping with
/// segments of its previous incarnation.
#[derive(Clone, Debug)]
pub struct IsnGenerator {
    keys: (u64, u64),
}

// Yes, that's the initial values, as ASCII text.
const IV: [&[u8; 8]; 4] = [
    b"somepseu",
    b"dorandom",
    b"lygenera",
    b"tedbytes"];

struct State {
    v0: u64,
    v1: u64,
    v2: u64,
    v3: u64,
}

impl IsnGenerator {
    /// Create a generator with some pre-defined secret key.
    ///
    /// Really, create the key with some cryptographic random means or derive them from some other
    /// key with a key derivation function.
    pub fn from_secret_key_bytes(bytes: [u8; 16]) -> Self {
        let a = LittleEndian::read_u64(&bytes[..8]);
        let b = LittleEndian::read_u64(&bytes[8..]);
        IsnGenerator { keys: (a, b), }
    }

    /// Get the initial sequence number for a connection.
    ///
    /// The value advances every 4µs or when the underlying secret key is updated.
    pub fn get_isn(&self, connection: FourTuple, time: Instant) -> TcpSeqNumber {
        let mut state = State::init(self.keys.0, self.keys.1);
        let ports = u64::from(connection.local_port)
            | u64::from(connection.remote_port) << 16;

        let num = match (connection.local, connection.remote) {
            (IpAddress::Ipv4(here), IpAddress::Ipv4(there)) => {
                let m = u64::from(here.to_network_integer())
                    | u64::from(there.to_network_integer()) << 32;
                state.absorb(m);
                // Message length = 12
                state.absorb(ports | 12_u64 << 56);
                state.finalize()
            },
            (IpAddress::Ipv6(here), IpAddress::Ipv6(there)) => {
                let (m0, m1) = Self::ipv6_to_messages(here);
                let (m2, m3) = Self::ipv6_to_messages(there);
                state.absorb(m0);
                state.absorb(m1);
                state.absorb(m2);
                state.absorb(m3);
                // Message length = 36
                state.absorb(ports | 36_u64 << 56);
                state.finalize()
            },
            // Mapped addresses, never produced by the endpoint but still keyed consistently.
            (IpAddress::Ipv4(here), IpAddress::Ipv6(there)) => {
                let m0 = u64::from(here.to_network_integer()) | ports << 32;
                let (m1, m2) = Self::ipv6_to_messages(there);
                state.absorb(m0);
                state.absorb(m1);
                state.absorb(m2);
                // Message length = 24
                state.absorb(24_u64 << 56);
                state.finalize()
            },
            (IpAddress::Ipv6(here), IpAddress::Ipv4(there)) => {
                let (m0, m1) = Self::ipv6_to_messages(here);
                let m2 = u64::from(there.to_network_integer()) | ports << 32;
                state.absorb(m0);
                state.absorb(m1);
                state.absorb(m2);
                // Message length = 24
                state.absorb(24_u64 << 56);
                state.finalize()
            },
        };

        let clock = (time.total_millis() as u64).wrapping_mul(250) as u32;
        TcpSeqNumber((num as u32).wrapping_add(clock) as i32)
    }

    fn ipv6_to_messages(addr: Ipv6Address) -> (u64, u64) {
        addr.to_network_halves()
    }
}

impl State {
    const SIP_C: usize = 2;
    const SIP_D: usize = 4;

    fn init(k0: u64, k1: u64) -> Self {
        State {
            v0: u64::from_be_bytes(*IV[0]) ^ k0,
            v1: u64::from_be_bytes(*IV[1]) ^ k1,
            v2: u64::from_be_bytes(*IV[2]) ^ k0,
            v3: u64::from_be_bytes(*IV[3]) ^ k1,
        }
    }

    fn round(&mut self) {
        self.v0 = self.v0.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(13);
        self.v1 ^= self.v0;
        self.v0 = self.v0.rotate_left(32);
        self.v2 = self.v2.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(16);
        self.v3 ^= self.v2;
        self.v0 = self.v0.wrapping_add(self.v3);
        self.v3 = self.v3.rotate_left(21);
        self.v3 ^= self.v0;
        self.v2 = self.v2.wrapping_add(self.v1);
        self.v1 = self.v1.rotate_left(17);
        self.v1 ^= self.v2;
        self.v2 = self.v2.rotate_left(32);
    }

    /// Process a single portion of the message.
    ///
    /// All users add the length themselves in the last block. The input then only consists of
    /// 8-byte blocks and the length block is a constant.
    fn absorb(&mut self, m: u64) {
        self.v3 ^= m;
        (0..Self::SIP_C).for_each(|_| self.round());
        self.v0 ^= m;
    }

    /// Do the finalization rounds.
    fn finalize(mut self) -> u64 {
        self.v2 ^= 0xff;
        (0..Self::SIP_D).for_each(|_| self.round());
        self.v0 ^ self.v1 ^ self.v2 ^ self.v3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Domain;

    /// See the paper, Appendix A.
    #[test]
    fn paper_test_vector() {
        let k0 = u64::from_le_bytes(0x0001020304050607_u64.to_be_bytes());
        let k1 = u64::from_le_bytes(0x08090a0b0c0d0e0f_u64.to_be_bytes());

        let mut state = State::init(k0, k1);
        let m0 = u64::from_le_bytes(0x0001020304050607_u64.to_be_bytes());
        state.absorb(m0);
        let m1 = u64::from_le_bytes(0x08090a0b0c0d0e0f_u64.to_be_bytes());
        state.absorb(m1);

        assert_eq!(state.finalize(), 0xa129ca6149be45e5);
    }

    #[test]
    fn key_bytes_are_little_endian() {
        let mut key = [0u8; 16];
        key[0] = 1;
        key[8] = 2;
        let isn = IsnGenerator::from_secret_key_bytes(key);
        assert_eq!(isn.keys, (1, 2));
    }

    #[test]
    fn isn_depends_on_tuple_and_clock() {
        let isn = IsnGenerator::from_secret_key_bytes(*b"0123456789abcdef");
        let mut tuple = FourTuple::unspecified(Domain::Inet);
        tuple.local = IpAddress::v4(10, 0, 0, 1);
        tuple.remote = IpAddress::v4(10, 0, 0, 5);
        tuple.local_port = 4096;
        tuple.remote_port = 80;

        let now = Instant::from_millis(1000);
        let first = isn.get_isn(tuple, now);
        assert_eq!(first, isn.get_isn(tuple, now));
        assert_eq!(isn.get_isn(tuple, Instant::from_millis(1001)) - first, 250);

        tuple.remote_port = 81;
        assert_ne!(first, isn.get_isn(tuple, now));
    }
}
