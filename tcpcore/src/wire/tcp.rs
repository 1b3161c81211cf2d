use core::{i32, ops, cmp, fmt};
use byteorder::{ByteOrder, NetworkEndian};

use crate::layer::{Error, Result};

/// A TCP sequence number.
///
/// A sequence number is a monotonically advancing integer modulo 2<sup>32</sup>.
/// Sequence numbers do not have a discontiguity when compared pairwise across a signed overflow.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct SeqNumber(pub i32);

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0 as u32)
    }
}

impl ops::Add<usize> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: usize) -> SeqNumber {
        if rhs > i32::MAX as usize {
            panic!("attempt to add to sequence number with unsigned overflow")
        }
        SeqNumber(self.0.wrapping_add(rhs as i32))
    }
}

impl ops::Sub<usize> for SeqNumber {
    type Output = SeqNumber;

    fn sub(self, rhs: usize) -> SeqNumber {
        if rhs > i32::MAX as usize {
            panic!("attempt to subtract to sequence number with unsigned overflow")
        }
        SeqNumber(self.0.wrapping_sub(rhs as i32))
    }
}

impl ops::AddAssign<usize> for SeqNumber {
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}

impl ops::Sub for SeqNumber {
    type Output = usize;

    /// The distance between two sequence numbers.
    ///
    /// Saturates at zero when `rhs` is ahead of `self`.
    fn sub(self, rhs: SeqNumber) -> usize {
        let result = self.0.wrapping_sub(rhs.0);
        if result < 0 {
            0
        } else {
            result as usize
        }
    }
}

impl cmp::PartialOrd for SeqNumber {
    fn partial_cmp(&self, other: &SeqNumber) -> Option<cmp::Ordering> {
        self.0.wrapping_sub(other.0).partial_cmp(&0)
    }
}

/// A set of tcp flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Flags(pub u16);

mod field {
    #![allow(non_snake_case)]

    use core::ops::Range;

    pub(crate) type Field = Range<usize>;

    pub(crate) const SRC_PORT: Field = 0..2;
    pub(crate) const DST_PORT: Field = 2..4;
    pub(crate) const SEQ_NUM:  Field = 4..8;
    pub(crate) const ACK_NUM:  Field = 8..12;
    pub(crate) const FLAGS:    Field = 12..14;
    pub(crate) const WIN_SIZE: Field = 14..16;
    pub(crate) const CHECKSUM: Field = 16..18;
    pub(crate) const URGENT:   Field = 18..20;

    pub(crate) const FLG_FIN: u16 = 0x001;
    pub(crate) const FLG_SYN: u16 = 0x002;
    pub(crate) const FLG_RST: u16 = 0x004;
    pub(crate) const FLG_PSH: u16 = 0x008;
    pub(crate) const FLG_ACK: u16 = 0x010;
    pub(crate) const FLG_URG: u16 = 0x020;
}

/// The length of a TCP header without options.
pub const HEADER_LEN: usize = field::URGENT.end;

impl Flags {
    /// The flags of a bare acknowledgement.
    pub const ACK: Flags = Flags(field::FLG_ACK);

    /// The flags of an initial synchronization.
    pub const SYN: Flags = Flags(field::FLG_SYN);

    /// The flags answering a synchronization.
    pub const SYN_ACK: Flags = Flags(field::FLG_SYN | field::FLG_ACK);

    /// The flags of a finalizing segment.
    pub const FIN_ACK: Flags = Flags(field::FLG_FIN | field::FLG_ACK);

    /// The flags of a reset, acknowledging all data seen so far.
    pub const RST_ACK: Flags = Flags(field::FLG_RST | field::FLG_ACK);

    /// Return the FIN flag.
    pub fn fin(self) -> bool {
        self.0 & field::FLG_FIN != 0
    }

    /// Return the SYN flag.
    pub fn syn(self) -> bool {
        self.0 & field::FLG_SYN != 0
    }

    /// Return the RST flag.
    pub fn rst(self) -> bool {
        self.0 & field::FLG_RST != 0
    }

    /// Return the PSH flag.
    pub fn psh(self) -> bool {
        self.0 & field::FLG_PSH != 0
    }

    /// Return the ACK flag.
    pub fn ack(self) -> bool {
        self.0 & field::FLG_ACK != 0
    }

    /// Return the URG flag.
    pub fn urg(self) -> bool {
        self.0 & field::FLG_URG != 0
    }

    /// Set the FIN flag.
    pub fn set_fin(&mut self, value: bool) {
        self.set(field::FLG_FIN, value)
    }

    /// Set the SYN flag.
    pub fn set_syn(&mut self, value: bool) {
        self.set(field::FLG_SYN, value)
    }

    /// Set the RST flag.
    pub fn set_rst(&mut self, value: bool) {
        self.set(field::FLG_RST, value)
    }

    /// Set the PSH flag.
    pub fn set_psh(&mut self, value: bool) {
        self.set(field::FLG_PSH, value)
    }

    /// Set the ACK flag.
    pub fn set_ack(&mut self, value: bool) {
        self.set(field::FLG_ACK, value)
    }

    /// Set the URG flag.
    pub fn set_urg(&mut self, value: bool) {
        self.set(field::FLG_URG, value)
    }

    fn set(&mut self, mask: u16, value: bool) {
        if value {
            self.0 |= mask
        } else {
            self.0 &= !mask
        }
    }

    /// The sequence space consumed by a segment with these flags.
    ///
    /// A SYN and a FIN each occupy one sequence number.
    pub fn sequence_len(self) -> usize {
        usize::from(self.syn()) + usize::from(self.fin())
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (self.syn(), "SYN"),
            (self.fin(), "FIN"),
            (self.rst(), "RST"),
            (self.psh(), "PSH"),
            (self.ack(), "ACK"),
            (self.urg(), "URG"),
        ];
        let mut first = true;
        for (_, name) in names.iter().filter(|(set, _)| *set) {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(name)?;
            first = false;
        }
        if first {
            f.write_str("-")?;
        }
        Ok(())
    }
}

/// The fields of a TCP header that the connection core reads and writes.
///
/// Checksums and options are produced and consumed by the ip layer below and are not represented.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Header {
    /// The port of the sender.
    pub src_port: u16,
    /// The port of the receiver.
    pub dst_port: u16,
    /// The first sequence number occupied by this segment.
    pub seq_number: SeqNumber,
    /// The next sequence number the sender expects, if the ACK flag is set.
    pub ack_number: SeqNumber,
    /// The control flags.
    pub flags: Flags,
    /// The advertised receive window.
    pub window_len: u16,
    /// The header length in octets, including options.
    pub header_len: u8,
}

impl Header {
    /// Parse the fixed part of a TCP header.
    ///
    /// Returns `Err(Error::Truncated)` if the buffer is too short and `Err(Error::Malformed)` if
    /// the header length field has a value smaller than the minimal header length.
    pub fn parse(data: &[u8]) -> Result<Header> {
        if data.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }

        let raw = NetworkEndian::read_u16(&data[field::FLAGS]);
        let header_len = ((raw >> 12) * 4) as u8;
        if usize::from(header_len) < HEADER_LEN {
            return Err(Error::Malformed);
        }
        if data.len() < usize::from(header_len) {
            return Err(Error::Truncated);
        }

        Ok(Header {
            src_port: NetworkEndian::read_u16(&data[field::SRC_PORT]),
            dst_port: NetworkEndian::read_u16(&data[field::DST_PORT]),
            seq_number: SeqNumber(NetworkEndian::read_i32(&data[field::SEQ_NUM])),
            ack_number: SeqNumber(NetworkEndian::read_i32(&data[field::ACK_NUM])),
            flags: Flags(raw & 0x1ff),
            window_len: NetworkEndian::read_u16(&data[field::WIN_SIZE]),
            header_len,
        })
    }

    /// Emit the fixed part of the header into a buffer.
    ///
    /// The checksum and urgent pointer are zeroed, options are left untouched.
    pub fn emit(&self, data: &mut [u8]) -> Result<()> {
        if data.len() < HEADER_LEN || usize::from(self.header_len) < HEADER_LEN {
            return Err(Error::Truncated);
        }

        NetworkEndian::write_u16(&mut data[field::SRC_PORT], self.src_port);
        NetworkEndian::write_u16(&mut data[field::DST_PORT], self.dst_port);
        NetworkEndian::write_i32(&mut data[field::SEQ_NUM], self.seq_number.0);
        NetworkEndian::write_i32(&mut data[field::ACK_NUM], self.ack_number.0);
        let raw = (u16::from(self.header_len) / 4) << 12 | (self.flags.0 & 0x1ff);
        NetworkEndian::write_u16(&mut data[field::FLAGS], raw);
        NetworkEndian::write_u16(&mut data[field::WIN_SIZE], self.window_len);
        NetworkEndian::write_u16(&mut data[field::CHECKSUM], 0);
        NetworkEndian::write_u16(&mut data[field::URGENT], 0);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static SYN_BYTES: [u8; 20] = [
        0xbf, 0x00, 0x00, 0x50,
        0x01, 0x23, 0x45, 0x67,
        0x89, 0xab, 0xcd, 0xef,
        0x50, 0x02, 0x01, 0x23,
        0x00, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn seq_number_wraps() {
        let near_end = SeqNumber(i32::MAX);
        let wrapped = near_end + 2;
        assert!(wrapped > near_end);
        assert_eq!(wrapped - near_end, 2);
        assert_eq!(near_end - wrapped, 0);
        assert_eq!(wrapped - 2, near_end);
    }

    #[test]
    fn parse_syn() {
        let header = Header::parse(&SYN_BYTES).unwrap();
        assert_eq!(header.src_port, 48896);
        assert_eq!(header.dst_port, 80);
        assert_eq!(header.seq_number, SeqNumber(0x01234567));
        assert_eq!(header.ack_number, SeqNumber(0x89abcdefu32 as i32));
        assert!(header.flags.syn());
        assert!(!header.flags.ack());
        assert_eq!(header.window_len, 0x0123);
        assert_eq!(header.header_len, 20);
    }

    #[test]
    fn emit_matches_parse() {
        let header = Header::parse(&SYN_BYTES).unwrap();
        let mut bytes = [0xff; 20];
        header.emit(&mut bytes).unwrap();
        assert_eq!(bytes, SYN_BYTES);
    }

    #[test]
    fn reject_short() {
        assert_eq!(Header::parse(&SYN_BYTES[..19]), Err(Error::Truncated));
        let mut bad = SYN_BYTES;
        bad[12] = 0x40;
        assert_eq!(Header::parse(&bad), Err(Error::Malformed));
        bad[12] = 0x60;
        assert_eq!(Header::parse(&bad), Err(Error::Truncated));
    }

    #[test]
    fn flags() {
        let mut flags = Flags::default();
        flags.set_syn(true);
        flags.set_ack(true);
        assert_eq!(flags, Flags::SYN_ACK);
        assert_eq!(flags.sequence_len(), 1);
        assert_eq!(format!("{}", Flags::RST_ACK), "RST|ACK");
        flags.set_syn(false);
        assert_eq!(flags, Flags::ACK);
    }
}
