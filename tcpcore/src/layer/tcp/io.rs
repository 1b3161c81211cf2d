//! Capabilities the connection core consumes from the surrounding stack.
//!
//! The core does not own devices, does not build ip headers and has no clock or work queue of its
//! own. Each of these is a trait here, implemented by the embedding stack (or a mock in tests) and
//! passed to the endpoint operations that need it. All calls happen with the network lock held,
//! that is while the caller has exclusive access to the [`Endpoint`].
//!
//! [`Endpoint`]: ../struct.Endpoint.html
use core::ops;

use crate::layer::Result;
use crate::time::{Hsec, Instant, MSEC_PER_HSEC};
use crate::wire::{Domain, IpAddress, TcpHeader};

use super::endpoint::SlotKey;

/// Identifies a network device of the embedding stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceId(pub usize);

/// Identifies an upper layer callback registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackId(pub usize);

/// An asynchronous event delivered to the upper layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// The connection was closed by a timeout, retransmission or wait ceiling.
    TimedOut,

    /// The connection was aborted after unanswered keepalive or window probes.
    Abort,

    /// Unacknowledged data is about to be retransmitted.
    Retransmit,

    /// The connection may send, data queued now is transmitted immediately.
    Poll,

    /// The connection record is being released.
    Close,
}

/// The events a segment or timer tick carried, as seen by the input path.
///
/// Used to decide whether a stalled connection should start probing the send window.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Events(pub u16);

impl Events {
    /// The segment acknowledged previously sent data.
    pub const ACKDATA: Events = Events(0x0001);
    /// The segment carried new data.
    pub const NEWDATA: Events = Events(0x0002);
    /// Data is about to be retransmitted.
    pub const REXMIT: Events = Events(0x0004);
    /// The connection was polled for new data.
    pub const POLL: Events = Events(0x0008);

    /// Check if any of the events in `other` is present.
    pub fn contains_any(self, other: Events) -> bool {
        self.0 & other.0 != 0
    }
}

impl ops::BitOr for Events {
    type Output = Events;

    fn bitor(self, rhs: Events) -> Events {
        Events(self.0 | rhs.0)
    }
}

/// The addressing and TCP header of a received segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Incoming {
    /// Source address from the ip header.
    pub src: IpAddress,
    /// Destination address from the ip header.
    pub dst: IpAddress,
    /// The parsed TCP header.
    pub header: TcpHeader,
}

/// A segment handed to the device for transmission.
///
/// The ip layer below completes it with its own header and the checksums.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment<'a> {
    /// The source address.
    pub src: IpAddress,
    /// The destination address.
    pub dst: IpAddress,
    /// The TCP header, ports included.
    pub header: TcpHeader,
    /// Time to live of the packet.
    pub ttl: u8,
    /// Type of service of the packet.
    pub tos: u8,
    /// The payload, empty for control segments and probes.
    pub payload: &'a [u8],
}

/// The directory of network devices.
pub trait Devices {
    /// The address family configured on a device.
    fn domain_of(&self, device: DeviceId) -> Domain;

    /// The device owning a local address, if any.
    fn owns(&self, addr: IpAddress) -> Option<DeviceId>;

    /// The device that can reach a remote address.
    fn route(&self, remote: IpAddress) -> Option<DeviceId>;
}

/// Link layer address resolution, ARP or neighbor discovery.
pub trait Resolve {
    /// Make sure the link address of `addr` is or becomes known.
    ///
    /// Only reports whether resolution could be started, the error value is not inspected.
    fn ensure_resolvable(&mut self, addr: IpAddress) -> Result<()>;
}

/// Sending segments.
pub trait Transmit {
    /// Construct the packet for a segment and queue it on a device.
    fn send(&mut self, device: DeviceId, segment: &Segment);
}

/// The deferred work queue and its clock.
///
/// One work item exists per connection, identified by the connection key. Queueing an item that
/// is already pending replaces its deadline.
pub trait Schedule {
    /// The current time.
    fn now(&self) -> Instant;

    /// Queue the timer work of a connection to run after `ticks`.
    fn schedule(&mut self, conn: SlotKey, ticks: u64);

    /// Cancel the timer work of a connection, if queued.
    fn cancel(&mut self, conn: SlotKey);

    /// Ticks until the queued timer work of a connection runs, `None` if it is not queued.
    fn time_left(&self, conn: SlotKey) -> Option<u64>;

    /// Cancel the deferred close work of a connection.
    ///
    /// Returns `false` when the work is already running and can no longer be cancelled.
    fn cancel_close(&mut self, conn: SlotKey) -> bool;

    /// Number of ticks in one half-second.
    fn ticks_per_hsec(&self) -> u64 {
        MSEC_PER_HSEC
    }

    /// Convert half-seconds to ticks.
    fn hsec_to_ticks(&self, hsec: Hsec) -> u64 {
        u64::from(hsec.0) * self.ticks_per_hsec()
    }

    /// Convert ticks to half-seconds, rounding to the nearest.
    fn ticks_to_hsec(&self, ticks: u64) -> Hsec {
        let per = self.ticks_per_hsec();
        let hsec = (ticks + per / 2) / per;
        Hsec(if hsec > u64::from(u32::max_value()) { u32::max_value() } else { hsec as u32 })
    }
}

/// Port reservations made outside the connection table, such as by network address translation.
pub trait PortTranslation {
    /// Check if a local port is taken by a translation entry.
    fn port_in_use(&self, domain: Domain, addr: IpAddress, port: u16) -> bool {
        let _ = (domain, addr, port);
        false
    }
}

/// The socket layer above.
pub trait Upper {
    /// Deliver an event for a connection.
    fn notify(&mut self, conn: SlotKey, event: Event);

    /// Release a callback registration of a connection that is being freed.
    fn release_callback(&mut self, conn: SlotKey, callback: CallbackId);

    /// Wake anyone waiting for send buffer space.
    fn send_buffer_available(&mut self, conn: SlotKey);
}
