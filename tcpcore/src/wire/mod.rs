/*! Low-level packet representation.

The connection core only touches the addressing of a segment and the fixed part of the TCP
header. Addresses are modelled per family, with the [`Domain`] selecting between them. The TCP
[`Header`] can be parsed from and emitted into a sequence of octets, anything beyond it (options,
checksums, the ip header) belongs to the layers below.

[`Domain`]: enum.Domain.html
[`Header`]: struct.TcpHeader.html
*/

mod ip;
mod tcp;

pub use self::ip::{
    Address as IpAddress,
    Domain,
    Ipv4Address,
    Ipv6Address,
};

pub use self::tcp::{
    Flags as TcpFlags,
    Header as TcpHeader,
    SeqNumber as TcpSeqNumber,
    HEADER_LEN as TCP_HEADER_LEN,
};
