//! The process logic of protocol layers.
//!
//! ## Layering
//!
//! Each protocol layer is split into two parts; the packet logic contained in `wire` and the
//! processing part in this module. An endpoint represents the local state of a protocol. This
//! state can be used to process packets of that layer. The state is open to modifications as part
//! of a user program while processing does not take place, similar to reconfiguration on the OS
//! level with utilities such as `netstat` or `ss`.
//!
//! Only the transport layer is implemented here. Devices, routing, address resolution and the
//! deferred work queue are provided by the embedding stack through the capability traits in
//! [`tcp::io`].
//!
//! [`tcp::io`]: tcp/io/index.html
use core::fmt;

pub mod tcp;

/// The result type of all fallible layer operations.
pub type Result<T> = core::result::Result<T, Error>;

/// An error raised synchronously by a layer operation.
///
/// Protocol level failures such as a retransmission timeout are never returned as an error. They
/// are delivered to the upper layer as an event instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// The operation was not permitted.
    ///
    /// Returned when the connection is in a state that does not allow the operation, for example
    /// when binding a connection that already has a local port.
    Illegal,

    /// The requested local address and port are already taken.
    InUse,

    /// The local address is not owned by any device.
    AddrNotAvailable,

    /// The connection was already connected or is otherwise active.
    AlreadyConnected,

    /// Unable to find a route towards the destination address.
    Unreachable,

    /// The action could not be completed because there were not enough resources.
    ///
    /// The main difference towards `Illegal` is that implies that it would have been legal with
    /// more resources. For connections this is only returned after an attempt to reclaim a
    /// closing connection already failed.
    Exhausted,

    /// A packet was too short for the header it should contain.
    Truncated,

    /// A header field had an impossible value.
    Malformed,
}

impl Error {
    /// The negated POSIX error number the socket layer reports for this error.
    #[cfg(feature = "libc")]
    pub fn to_errno(self) -> i32 {
        -match self {
            Error::Illegal => libc::EINVAL,
            Error::InUse => libc::EADDRINUSE,
            Error::AddrNotAvailable => libc::EADDRNOTAVAIL,
            Error::AlreadyConnected => libc::EISCONN,
            Error::Unreachable => libc::ENETUNREACH,
            Error::Exhausted => libc::ENOMEM,
            Error::Truncated | Error::Malformed => libc::EBADMSG,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            Error::Illegal => "invalid argument",
            Error::InUse => "address in use",
            Error::AddrNotAvailable => "address not available",
            Error::AlreadyConnected => "already connected",
            Error::Unreachable => "network unreachable",
            Error::Exhausted => "no free connection",
            Error::Truncated => "truncated packet",
            Error::Malformed => "malformed packet",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(all(test, feature = "libc"))]
mod tests {
    use super::Error;

    #[test]
    fn errno_is_negative() {
        assert_eq!(Error::InUse.to_errno(), -libc::EADDRINUSE);
        assert_eq!(Error::Unreachable.to_errno(), -libc::ENETUNREACH);
        assert!(Error::Exhausted.to_errno() < 0);
    }
}
