use core::ops::Range;

use crate::time::{Dsec, Hsec};

/// Tunables of a TCP endpoint.
///
/// The defaults follow the usual constants of small embedded stacks: a base retransmission
/// timeout of one and a half seconds, two hours of keepalive idle time and a one minute
/// `TIME_WAIT`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Connection records allocated up front.
    pub preallocated: usize,

    /// Connection records added each time the pool runs dry, zero for a fixed pool.
    pub grow_by: usize,

    /// Upper bound of connection records, zero for no bound.
    pub max_connections: usize,

    /// Default time to live of outgoing packets.
    pub ttl: u8,

    /// Default receive buffer size, also bounds the advertised window.
    pub recv_buffer: usize,

    /// Default send buffer size.
    pub send_buffer: usize,

    /// Keepalive idle time before the first probe.
    pub keepalive_idle: Dsec,

    /// Keepalive time between probes.
    pub keepalive_interval: Dsec,

    /// Unanswered keepalive probes before the connection is aborted.
    pub keepalive_count: u8,

    /// The base retransmission timeout.
    pub rto: Hsec,

    /// The first delay of zero window probing.
    pub rto_min: Hsec,

    /// The ceiling of the zero window probe backoff.
    pub rto_max: Hsec,

    /// Retransmissions of an established connection before it is timed out.
    pub max_retransmits: u8,

    /// Retransmissions of a SYN or SYN-ACK before the handshake is given up.
    pub max_syn_retransmits: u8,

    /// Duration of the `TIME_WAIT` and `FIN_WAIT_2` states.
    pub time_wait: Hsec,

    /// The longest an acknowledgement may be delayed.
    pub ack_delay: Hsec,

    /// Local ports handed out when the caller does not choose one.
    pub ephemeral_ports: Range<u16>,

    /// Where the rotating ephemeral port counter starts.
    ///
    /// Should be random so that the first ports after a restart are not predictable. The default
    /// of zero hands out the start of the range first, see [`with_secret`].
    ///
    /// [`with_secret`]: #method.with_secret
    pub port_seed: u16,

    /// The secret of initial sequence number generation.
    ///
    /// Must be generated randomly for any real deployment, the default is all zeroes.
    pub isn_key: [u8; 16],
}

impl Config {
    /// The largest shift applied to the retransmission timeout.
    pub const MAX_BACKOFF_SHIFT: u8 = 4;

    /// The default configuration keyed with a random secret.
    ///
    /// The secret keys initial sequence numbers and its first two bytes seed the ephemeral port
    /// counter.
    pub fn with_secret(secret: [u8; 16]) -> Self {
        Config {
            port_seed: u16::from_le_bytes([secret[0], secret[1]]),
            isn_key: secret,
            ..Config::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            preallocated: 8,
            grow_by: 0,
            max_connections: 0,
            ttl: 64,
            recv_buffer: 4096,
            send_buffer: 4096,
            keepalive_idle: Dsec(2 * 60 * 60 * 10),
            keepalive_interval: Dsec(2 * 10),
            keepalive_count: 3,
            rto: Hsec(3),
            rto_min: Hsec(1),
            rto_max: Hsec(240),
            max_retransmits: 8,
            max_syn_retransmits: 5,
            time_wait: Hsec(120),
            ack_delay: Hsec(1),
            ephemeral_ports: 4096..32000,
            port_seed: 0,
            isn_key: [0; 16],
        }
    }
}
