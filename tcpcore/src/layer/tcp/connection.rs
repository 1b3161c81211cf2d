use crate::alloc::collections::VecDeque;
use crate::alloc::vec::Vec;

use crate::time::{Dsec, Duration, Expiration, Hsec};
use crate::wire::{Domain, IpAddress, TcpSeqNumber};

use super::endpoint::SlotKey;
use super::io::{CallbackId, DeviceId};

/// The state of a connection.
///
/// Includes the current state machine state, the identity of the connection, the timer state
/// driving retransmissions and probes, and the in- and out-buffers. Fields are public: the owner
/// of the endpoint may inspect and adjust them between operations, the transitions mandated by
/// the protocol are performed by the endpoint and its timer.
#[derive(Clone, Debug)]
pub struct Connection {
    /// The address family, fixed at allocation.
    pub domain: Domain,

    /// Local and remote addresses and ports.
    pub tuple: FourTuple,

    /// The current state of the state machine.
    pub current: State,

    /// The device this connection sends on, once known.
    pub device: Option<DeviceId>,

    /// The sending state.
    ///
    /// In RFC793 this is referred to as `SND`.
    pub send: Send,

    /// The receiving state.
    ///
    /// In RFC793 this is referred to as `RCV`.
    pub recv: Receive,

    /// Sequence space sent but not yet acknowledged.
    ///
    /// A SYN or FIN counts as one.
    pub tx_unacked: u32,

    /// Retransmission, probe and wait timing.
    pub timers: Timers,

    /// Keepalive probing of an idle connection.
    pub keepalive: Keepalive,

    /// The flow control mechanism.
    pub flow_control: NewReno,

    /// Settings inherited by accepted connections.
    pub options: Options,

    /// The maximum segment size.
    ///
    /// Starts out as the minimum every host of the family must accept and is only raised by the
    /// MSS option of the peer.
    pub mss: u16,

    /// The number of sockets referring to this connection.
    pub refs: u8,

    /// A deferred close work item was scheduled for this connection.
    pub close_arranged: bool,

    /// Upper layer callbacks registered on this connection.
    pub callbacks: Vec<CallbackId>,

    /// Received in-order data not yet consumed.
    pub readahead: Vec<u8>,

    /// Received data beyond a gap.
    pub out_of_order: Vec<OutOfOrder>,

    /// Data queued by the upper layer and not yet sent.
    pub write_queue: VecDeque<Vec<u8>>,

    /// Data sent and waiting for acknowledgement.
    pub unacked_queue: VecDeque<Sent>,

    /// Connections accepted on this listener and not yet picked up.
    pub backlog: Option<Backlog>,

    /// The listener whose backlog contains this connection.
    pub backlog_parent: Option<SlotKey>,

    /// Position in the active list.
    pub(crate) link: Link,
}

/// The addresses and ports identifying a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FourTuple {
    /// Local address, the family wildcard when bound to all addresses.
    pub local: IpAddress,
    /// Remote address.
    pub remote: IpAddress,
    /// Local port, zero while unassigned.
    pub local_port: u16,
    /// Remote port.
    pub remote_port: u16,
}

/// State enum of the statemachine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// The slot is free or the connection is dead.
    Closed,

    /// Reserved but not yet part of the active list.
    Allocated,

    /// A listening connection.
    ///
    /// Akin to an open server socket. Incoming SYNs matching it create new connections in
    /// `SynReceived`.
    Listen,

    /// An open connection request.
    SynSent,

    /// Connection request we intend to answer, waiting on ack.
    SynReceived,

    /// An open connection.
    Established,

    /// Closed our side of the connection.
    FinWait1,

    /// Closing connection nicely, initiated by us and acknowledged.
    FinWait2,

    /// Closed both sides but we don't know the other knows.
    Closing,

    /// Both sides recognized connection as closed.
    TimeWait,

    /// Connection closed after other side closed its already.
    LastAck,
}

/// Sequence numbers of the sending side.
#[derive(Clone, Copy, Debug, Default, Hash)]
pub struct Send {
    /// The next not yet acknowledged sequence number.
    ///
    /// In RFC793 this is referred to as `SND.UNA`.
    pub unacked: TcpSeqNumber,

    /// The next sequence number to use for transmission.
    ///
    /// In RFC793 this is referred to as `SND.NXT`.
    pub next: TcpSeqNumber,

    /// The send window size indicated by the receiver.
    ///
    /// Must not send packet containing a sequence number beyond `unacked + window`. In RFC793 this
    /// is referred to as `SND.WND`.
    pub window: u32,

    /// The initial sequence number.
    ///
    /// In RFC793 this is referred to as `ISS`.
    pub initial_seq: TcpSeqNumber,

    /// The sequence number that control segments are retransmitted from.
    pub rexmit: TcpSeqNumber,

    /// The highest sequence number sent so far, probes included.
    pub max: TcpSeqNumber,
}

/// Sequence numbers of the receiving side.
#[derive(Clone, Copy, Debug, Default, Hash)]
pub struct Receive {
    /// The next expected sequence number.
    ///
    /// In RFC793 this is referred to as `RCV.NXT`.
    pub next: TcpSeqNumber,

    /// The sequence number up to which we advertised the window.
    pub adv: TcpSeqNumber,

    /// The receive window size indicated by us.
    pub window: u16,

    /// The initial receive sequence number.
    ///
    /// In RFC793 this is referred to as `IRS`.
    pub initial_seq: TcpSeqNumber,
}

/// The owner of the generic half-second timer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Nothing is counted.
    Idle,
    /// Retransmission of unacknowledged sequence space.
    Retransmit,
    /// Probing a closed send window.
    ZeroProbe,
    /// Expiry of `TimeWait` or `FinWait2`.
    TimeWait,
}

/// Timer state of a connection.
#[derive(Clone, Copy, Debug, Hash)]
pub struct Timers {
    /// The generic countdown, in half-seconds.
    pub timer: Hsec,

    /// What `timer` is counting for.
    pub purpose: Purpose,

    /// The current retransmission timeout.
    pub rto: Hsec,

    /// Number of retransmissions (or window probes) since the last acknowledgement.
    pub nrtx: u8,

    /// Smoothed round trip time.
    pub sa: u16,

    /// Round trip time variance.
    pub sv: u16,

    /// The deferred timer fired and the device has not yet polled the connection.
    ///
    /// Also set on connect so that the SYN is sent on the next poll.
    pub timeout: bool,

    /// Zero window probing is active.
    pub zero_probe: bool,

    /// Received segments not yet acknowledged.
    pub rx_unackseg: u8,

    /// Time an acknowledgement has been delayed.
    pub rx_acktimer: Hsec,

    /// Deadline after which a lingering close resets the connection.
    pub linger: Expiration,
}

/// Keepalive settings and countdown.
#[derive(Clone, Copy, Debug, Hash)]
pub struct Keepalive {
    /// Probing is enabled.
    pub enabled: bool,
    /// The remaining idle time before the next probe.
    pub timer: Dsec,
    /// Probes sent without an answer.
    pub retries: u8,
    /// Idle time before the first probe.
    pub idle: Dsec,
    /// Time between unanswered probes.
    pub interval: Dsec,
    /// Unanswered probes before the connection is aborted.
    pub count: u8,
}

/// Models TCP NewReno flow control and congestion avoidance.
#[derive(Clone, Copy, Debug, Default, Hash)]
pub struct NewReno {
    /// Decider between slow-start and congestion.
    ///
    /// Set to MAX initially, then updated on occurance of congestion.
    pub ssthresh: u32,

    /// The window dictated by congestion.
    pub cwnd: u32,

    /// A slowly moving maximum of the congestion window.
    pub max_cwnd: u32,

    /// In fast recovery after duplicate acknowledgements.
    pub fast_recovery: bool,
}

/// Socket level settings of a connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Options {
    /// Time to live of outgoing packets.
    pub ttl: u8,
    /// Type of service of outgoing packets.
    pub tos: u8,
    /// Timeout of blocking receives.
    pub recv_timeout: Option<Duration>,
    /// Timeout of blocking sends.
    pub send_timeout: Option<Duration>,
    /// The device the socket was bound to, if any.
    pub bound_device: Option<DeviceId>,
    /// Receive buffer size hint.
    pub recv_buffer: usize,
    /// Send buffer size hint.
    pub send_buffer: usize,
}

/// The pending children of a listener.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Backlog {
    /// The maximum number of pending connections.
    pub limit: usize,
    /// Connections created by incoming SYNs, in arrival order.
    pub pending: Vec<SlotKey>,
}

/// A segment of data received out of order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutOfOrder {
    /// Sequence number of the first byte.
    pub seq: TcpSeqNumber,
    /// The data.
    pub data: Vec<u8>,
}

/// A segment of data sent and not yet acknowledged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sent {
    /// Sequence number of the first byte.
    pub seq: TcpSeqNumber,
    /// The data.
    pub data: Vec<u8>,
}

/// Intrusive double links of the active list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub(crate) struct Link {
    pub(crate) linked: bool,
    pub(crate) prev: Option<SlotKey>,
    pub(crate) next: Option<SlotKey>,
}

impl Connection {
    /// Whether the state machine is in `state`.
    pub fn is(&self, state: State) -> bool {
        self.current == state
    }

    /// Whether the connection is open, neither dead nor only reserved.
    pub fn is_active(&self) -> bool {
        !self.is(State::Closed) && !self.is(State::Allocated)
    }

    /// Whether the connection is linked into the active list.
    ///
    /// Stays true after the state machine reached `Closed`, until the record is freed.
    pub fn is_linked(&self) -> bool {
        self.link.linked
    }

    /// Whether the connection may be reclaimed when the pool runs dry.
    pub fn is_reclaimable(&self) -> bool {
        self.refs == 0 && match self.current {
            State::Closed
            | State::Closing
            | State::FinWait1
            | State::FinWait2
            | State::TimeWait
            | State::LastAck => true,
            _ => false,
        }
    }

    /// Change state, logging the transition.
    pub(crate) fn change_state(&mut self, next: State) {
        if self.current != next {
            net_debug!("tcp {}:{} state {:?} -> {:?}",
                self.tuple.local, self.tuple.local_port, self.current, next);
        }
        self.current = next;
    }

    /// Release all buffered receive data.
    pub(crate) fn free_rx_buffers(&mut self) {
        self.readahead.clear();
        self.out_of_order.clear();
    }

    /// Queue data for transmission.
    pub fn queue(&mut self, data: Vec<u8>) {
        if !data.is_empty() {
            self.write_queue.push_back(data);
        }
    }
}

impl Timers {
    /// Hand the generic timer to a purpose.
    pub(crate) fn arm(&mut self, purpose: Purpose, hsec: Hsec) {
        if self.purpose != purpose && self.purpose != Purpose::Idle && self.timer.0 > 0 {
            net_trace!("tcp timer {:?} replaced by {:?}", self.purpose, purpose);
        }
        self.timer = hsec;
        self.purpose = if hsec.0 == 0 { Purpose::Idle } else { purpose };
    }

    /// Return the generic timer to the idle state.
    pub(crate) fn disarm(&mut self) {
        self.timer = Hsec(0);
        self.purpose = Purpose::Idle;
    }
}

impl NewReno {
    /// Initial congestion state for a segment size.
    pub fn new(mss: u16) -> Self {
        let cwnd = 2 * u32::from(mss);
        NewReno {
            ssthresh: u32::max_value(),
            cwnd,
            max_cwnd: cwnd,
            fast_recovery: false,
        }
    }

    /// Fold a retransmission timeout into the window.
    ///
    /// Leaves fast recovery and restarts slow start from a single segment.
    pub fn on_timeout(&mut self, tx_unacked: u32, mss: u16) {
        let mss = u32::from(mss);
        self.fast_recovery = false;
        self.max_cwnd = ((u64::from(self.max_cwnd) + 7 * u64::from(self.cwnd)) >> 3) as u32;
        self.ssthresh = (tx_unacked / 2).max(2 * mss);
        self.cwnd = mss;
    }
}

impl Default for Connection {
    fn default() -> Self {
        Connection {
            domain: Domain::Inet,
            tuple: FourTuple::unspecified(Domain::Inet),
            current: State::Closed,
            device: None,
            send: Send::default(),
            recv: Receive::default(),
            tx_unacked: 0,
            timers: Timers::default(),
            keepalive: Keepalive::default(),
            flow_control: NewReno::default(),
            options: Options::default(),
            mss: 0,
            refs: 0,
            close_arranged: false,
            callbacks: Vec::new(),
            readahead: Vec::new(),
            out_of_order: Vec::new(),
            write_queue: VecDeque::new(),
            unacked_queue: VecDeque::new(),
            backlog: None,
            backlog_parent: None,
            link: Link::default(),
        }
    }
}

impl FourTuple {
    /// A tuple with wildcard addresses and no ports.
    pub fn unspecified(domain: Domain) -> Self {
        FourTuple {
            local: IpAddress::unspecified(domain),
            remote: IpAddress::unspecified(domain),
            local_port: 0,
            remote_port: 0,
        }
    }
}

impl Default for Timers {
    fn default() -> Self {
        Timers {
            timer: Hsec(0),
            purpose: Purpose::Idle,
            rto: Hsec(0),
            nrtx: 0,
            sa: 0,
            sv: 0,
            timeout: false,
            zero_probe: false,
            rx_unackseg: 0,
            rx_acktimer: Hsec(0),
            linger: Expiration::Never,
        }
    }
}

impl Default for Keepalive {
    fn default() -> Self {
        Keepalive {
            enabled: false,
            timer: Dsec(0),
            retries: 0,
            idle: Dsec(0),
            interval: Dsec(0),
            count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reclaimable_states() {
        let mut conn = Connection::default();
        for &state in &[State::Closed, State::Closing, State::FinWait1,
                        State::FinWait2, State::TimeWait, State::LastAck] {
            conn.current = state;
            assert!(conn.is_reclaimable(), "{:?}", state);
        }
        for &state in &[State::Allocated, State::Listen, State::SynSent,
                        State::SynReceived, State::Established] {
            conn.current = state;
            assert!(!conn.is_reclaimable(), "{:?}", state);
        }
        conn.current = State::TimeWait;
        conn.refs = 1;
        assert!(!conn.is_reclaimable());
    }

    #[test]
    fn newreno_timeout() {
        let mut reno = NewReno::new(536);
        assert_eq!(reno.cwnd, 1072);
        reno.fast_recovery = true;
        reno.on_timeout(4000, 536);
        assert!(!reno.fast_recovery);
        assert_eq!(reno.max_cwnd, (1072 + 7 * 1072) >> 3);
        assert_eq!(reno.ssthresh, 2000);
        assert_eq!(reno.cwnd, 536);

        reno.on_timeout(100, 536);
        assert_eq!(reno.ssthresh, 1072);
    }

    #[test]
    fn timer_ownership() {
        let mut timers = Timers::default();
        timers.arm(Purpose::Retransmit, Hsec(3));
        assert_eq!(timers.purpose, Purpose::Retransmit);
        timers.arm(Purpose::Retransmit, Hsec(0));
        assert_eq!(timers.purpose, Purpose::Idle);
        timers.arm(Purpose::ZeroProbe, Hsec(1));
        timers.disarm();
        assert_eq!(timers.timer, Hsec(0));
        assert_eq!(timers.purpose, Purpose::Idle);
    }
}
