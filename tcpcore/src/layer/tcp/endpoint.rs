use core::{cmp, mem};

use crate::alloc::vec::Vec;
use crate::layer::{Error, Result};
use crate::managed::Key;
use crate::time::{Duration, Expiration};
use crate::wire::{Domain, IpAddress, TcpSeqNumber};

use super::config::Config;
use super::connection::{Backlog, Connection, FourTuple, NewReno, Purpose, Send, State};
use super::family;
use super::io::{
    CallbackId,
    Devices,
    DeviceId,
    Event,
    Incoming,
    PortTranslation,
    Resolve,
    Schedule,
    Transmit,
    Upper};
use super::pool::Pool;
use super::port::PortAllocator;
use super::siphash::IsnGenerator;
use super::table::{Iter, Table};

/// Refers to a connection record.
///
/// A key stays valid until its connection is freed. It is never valid for a connection that later
/// reuses the same slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotKey {
    pub(crate) key: Key,
}

/// The TCP connection core.
///
/// Owns the connection records, the active list, the port counter and the sequence number
/// generator. Holding `&mut Endpoint` is holding the network lock.
pub struct Endpoint {
    pub(crate) pool: Pool,
    pub(crate) table: Table,
    pub(crate) ports: PortAllocator,
    pub(crate) isn: IsnGenerator,
    pub(crate) config: Config,
    pub(crate) stats: Stats,
}

/// Counters of notable protocol events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Stats {
    /// Segments or control flags sent again after a retransmission timeout.
    pub retransmissions: u64,
    /// Resets sent.
    pub resets: u64,
    /// Connections closed by a timeout.
    pub timeouts: u64,
    /// Keepalive probes sent.
    pub keepalive_probes: u64,
    /// Zero window probes sent.
    pub window_probes: u64,
    /// Delayed acknowledgements sent by the timer.
    pub delayed_acks: u64,
    /// Closing connections reclaimed for a new allocation.
    pub evictions: u64,
}

/// The outcome of freeing a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Release {
    /// The record is back in the pool and its key is invalid.
    Freed,

    /// The close work of the connection is already running and frees it when done.
    Deferred,
}

impl Endpoint {
    /// Create an endpoint with an empty connection table.
    pub fn new(config: Config) -> Self {
        Endpoint {
            pool: Pool::new(&config),
            table: Table::default(),
            ports: PortAllocator::new(config.ephemeral_ports.clone(), config.port_seed),
            isn: IsnGenerator::from_secret_key_bytes(config.isn_key),
            config,
            stats: Stats::default(),
        }
    }

    /// The configuration the endpoint was created with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Counters since creation.
    pub fn stats(&self) -> Stats {
        self.stats
    }

    /// Get a connection by key.
    pub fn get(&self, key: SlotKey) -> Option<&Connection> {
        self.pool.get(key)
    }

    /// Get a mutable connection by key.
    ///
    /// Changes bypass the state machine, the caller is responsible to keep the record consistent.
    pub fn get_mut(&mut self, key: SlotKey) -> Option<&mut Connection> {
        self.pool.get_mut(key)
    }

    /// The number of allocated connection records.
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Check if no connection record is allocated.
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    /// Iterate over the active list in insertion order.
    pub fn iter(&self) -> Iter<'_> {
        self.table.iter(&self.pool)
    }

    /// Step through the active list.
    ///
    /// Returns the first connection for `None`, otherwise the one following `after`.
    pub fn nextconn(&self, after: Option<SlotKey>) -> Option<SlotKey> {
        self.table.next(&self.pool, after)
    }

    /// Allocate a fresh connection record.
    ///
    /// When the pool is exhausted, the closing connection without references and with the least
    /// time left on its timer is freed and its record reused. Fails with `Exhausted` when there is
    /// no such connection.
    pub fn alloc<I>(&mut self, io: &mut I, domain: Domain) -> Result<SlotKey>
        where I: Schedule + Upper + ?Sized,
    {
        let key = match self.pool.try_alloc() {
            Some((key, _)) => key,
            None => self.reclaim(io)?,
        };

        let config = &self.config;
        let conn = self.pool.get_mut(key).ok_or(Error::Exhausted)?;
        conn.domain = domain;
        conn.tuple = FourTuple::unspecified(domain);
        conn.current = State::Allocated;
        conn.mss = family::initial_mss(domain);
        conn.flow_control = NewReno::new(conn.mss);
        conn.options.ttl = config.ttl;
        conn.options.recv_buffer = config.recv_buffer;
        conn.options.send_buffer = config.send_buffer;
        conn.recv.window = advertised(config.recv_buffer);
        conn.keepalive.idle = config.keepalive_idle;
        conn.keepalive.interval = config.keepalive_interval;
        conn.keepalive.count = config.keepalive_count;
        conn.timers.rto = config.rto;

        net_trace!("tcp alloc {:?} ({})", key, domain);
        Ok(key)
    }

    fn reclaim<I>(&mut self, io: &mut I) -> Result<SlotKey>
        where I: Schedule + Upper + ?Sized,
    {
        let victim = self.table.iter(&self.pool)
            .filter(|(_, conn)| conn.is_reclaimable())
            .min_by_key(|(_, conn)| conn.timers.timer)
            .map(|(key, _)| key);

        let victim = match victim {
            Some(victim) => victim,
            None => {
                net_debug!("tcp connections exhausted");
                return Err(Error::Exhausted);
            },
        };

        net_warn!("tcp connections exhausted, reclaiming {:?}", victim);
        if self.free(io, victim)? == Release::Deferred {
            return Err(Error::Exhausted);
        }

        self.stats.evictions += 1;
        self.pool.try_alloc()
            .map(|(key, _)| key)
            .ok_or(Error::Exhausted)
    }

    /// Free a connection record.
    ///
    /// The connection must not be referenced by any socket. All of its timers, buffers and
    /// callbacks are released, it leaves the active list and the backlogs it takes part in. If a
    /// close work item is running for the connection the record is left to that work.
    pub fn free<I>(&mut self, io: &mut I, key: SlotKey) -> Result<Release>
        where I: Schedule + Upper + ?Sized,
    {
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        if conn.refs != 0 {
            net_debug!("tcp free of {:?} with {} references", key, conn.refs);
            return Err(Error::Illegal);
        }

        if conn.close_arranged && !io.cancel_close(key) {
            net_trace!("tcp free of {:?} deferred to close work", key);
            return Ok(Release::Deferred);
        }

        io.cancel(key);
        conn.timers.disarm();
        conn.keepalive.enabled = false;
        conn.free_rx_buffers();
        conn.write_queue.clear();
        conn.unacked_queue.clear();
        let callbacks = mem::replace(&mut conn.callbacks, Vec::new());
        let backlog = conn.backlog.take();
        let parent = conn.backlog_parent.take();
        conn.change_state(State::Closed);

        io.notify(key, Event::Close);
        for callback in callbacks {
            io.release_callback(key, callback);
        }
        io.send_buffer_available(key);

        self.table.unlink(&mut self.pool, key);

        for child in backlog.into_iter().flat_map(|backlog| backlog.pending) {
            if let Some(child) = self.pool.get_mut(child) {
                child.backlog_parent = None;
            }
        }

        let siblings = parent
            .and_then(|parent| self.pool.get_mut(parent))
            .and_then(|parent| parent.backlog.as_mut());
        if let Some(backlog) = siblings {
            backlog.pending.retain(|&pending| pending != key);
        }

        self.pool.release(key);
        Ok(Release::Freed)
    }

    /// Select a local port.
    ///
    /// Verifies a nonzero `port` or picks an unused ephemeral one for zero.
    pub fn select_port<P>(&mut self, translation: &P, domain: Domain, addr: IpAddress, port: u16)
        -> Result<u16>
        where P: PortTranslation + ?Sized,
    {
        self.ports.select(&self.table, &self.pool, translation, domain, addr, port)
    }

    /// Bind an allocated connection to a local address and port.
    ///
    /// A port of zero selects an ephemeral port. The address must belong to a device unless it is
    /// the wildcard or another address every host accepts. Nothing is changed on failure.
    pub fn bind<I>(&mut self, io: &I, key: SlotKey, addr: IpAddress, port: u16) -> Result<()>
        where I: Devices + PortTranslation + ?Sized,
    {
        let domain = {
            let conn = self.pool.get(key).ok_or(Error::Illegal)?;
            if !conn.is(State::Allocated) || conn.tuple.local_port != 0 {
                return Err(Error::Illegal);
            }
            conn.domain
        };

        if addr.domain() != domain {
            return Err(Error::Illegal);
        }

        if !family::is_special(domain, addr) && io.owns(addr).is_none() {
            net_debug!("tcp bind to foreign address {}", addr);
            return Err(Error::AddrNotAvailable);
        }

        let port = self.select_port(io, domain, addr, port)?;

        let device = if addr.is_unspecified() {
            None
        } else {
            match io.owns(addr).or_else(|| io.route(addr)) {
                Some(device) => Some(device),
                None => {
                    net_debug!("tcp no device for {}", addr);
                    return Err(Error::Unreachable);
                },
            }
        };

        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        conn.tuple.local = addr;
        conn.tuple.local_port = port;
        conn.device = device;
        Ok(())
    }

    /// Start an active open.
    ///
    /// Assigns an ephemeral port if the connection is not bound yet, routes towards the remote
    /// and arms the retransmission timer. The SYN itself goes out when the device polls the
    /// connection. Connecting to the wildcard address connects to loopback.
    pub fn connect<I>(&mut self, io: &mut I, key: SlotKey, remote: IpAddress, port: u16)
        -> Result<()>
        where I: Devices + Resolve + Schedule + PortTranslation + ?Sized,
    {
        let (domain, local, local_port) = {
            let conn = self.pool.get(key).ok_or(Error::Illegal)?;
            if !conn.is(State::Allocated) {
                return Err(Error::AlreadyConnected);
            }
            (conn.domain, conn.tuple.local, conn.tuple.local_port)
        };

        if remote.domain() != domain {
            return Err(Error::Illegal);
        }

        let local_port = match local_port {
            0 => self.select_port(&*io, domain, local, 0)?,
            port => port,
        };

        let remote = if remote.is_unspecified() {
            IpAddress::loopback(domain)
        } else {
            remote
        };

        let device = match io.route(remote) {
            Some(device) => device,
            None => {
                net_debug!("tcp no route to {}", remote);
                return Err(Error::Unreachable);
            },
        };

        if io.ensure_resolvable(remote).is_err() {
            net_debug!("tcp unable to resolve {}", remote);
            return Err(Error::Unreachable);
        }

        let now = io.now();
        let rto = self.config.rto;
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        conn.tuple.remote = remote;
        conn.tuple.remote_port = port;
        conn.tuple.local_port = local_port;
        conn.device = Some(device);

        let isn = self.isn.get_isn(conn.tuple, now);
        conn.send = initial_send(isn, 0);
        conn.tx_unacked = 1;
        conn.flow_control = NewReno::new(conn.mss);
        conn.timers.nrtx = 0;
        conn.timers.timeout = true;
        conn.timers.rto = rto;
        conn.timers.sa = 0;
        conn.timers.sv = 16;
        conn.change_state(State::SynSent);

        net_debug!("tcp connect {}:{} -> {}:{}", local, local_port, remote, port);
        self.table.link_last(&mut self.pool, key);
        self.update_retrantimer(io, key, rto)
    }

    /// Accept incoming connection requests on a bound connection.
    ///
    /// A nonzero `backlog` keeps up to that many connections created by incoming SYNs pending on
    /// the listener, see [`accept`].
    ///
    /// [`accept`]: #method.accept
    pub fn listen(&mut self, key: SlotKey, backlog: usize) -> Result<()> {
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        if !conn.is(State::Allocated) || conn.tuple.local_port == 0 {
            return Err(Error::Illegal);
        }

        conn.backlog = if backlog > 0 {
            Some(Backlog {
                limit: backlog,
                pending: Vec::with_capacity(backlog),
            })
        } else {
            None
        };
        conn.change_state(State::Listen);
        self.table.link_last(&mut self.pool, key);
        Ok(())
    }

    /// Create the connection for a SYN received by a listener.
    ///
    /// The new connection answers from the destination of the segment and inherits the socket
    /// options of the listener. It starts in `SynReceived` with the retransmission timer armed and
    /// joins the backlog of the listener, if that has one.
    pub fn alloc_accept<I>(
        &mut self,
        io: &mut I,
        device: DeviceId,
        segment: &Incoming,
        listener: SlotKey,
    ) -> Result<SlotKey>
        where I: Devices + Schedule + Upper + ?Sized,
    {
        let (options, mss, backlog) = {
            let parent = self.pool.get(listener).ok_or(Error::Illegal)?;
            if !parent.is(State::Listen) {
                return Err(Error::Illegal);
            }
            if let Some(backlog) = &parent.backlog {
                if backlog.pending.len() >= backlog.limit {
                    net_debug!("tcp backlog of {}:{} full",
                        parent.tuple.local, parent.tuple.local_port);
                    return Err(Error::Exhausted);
                }
            }
            (parent.options, parent.mss, parent.backlog.is_some())
        };

        let domain = io.domain_of(device);
        if segment.src.domain() != domain || segment.dst.domain() != domain {
            return Err(Error::Illegal);
        }

        let key = self.alloc(io, domain)?;

        let route = match io.route(segment.src) {
            Some(route) => route,
            None => {
                net_error!("tcp no device towards {}", segment.src);
                self.free(io, key)?;
                return Err(Error::Unreachable);
            },
        };

        let now = io.now();
        let rto = self.config.rto;
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        conn.tuple = FourTuple {
            local: segment.dst,
            remote: segment.src,
            local_port: segment.header.dst_port,
            remote_port: segment.header.src_port,
        };
        conn.device = Some(route);
        conn.options = options;
        conn.recv.window = advertised(options.recv_buffer);
        conn.mss = mss;
        conn.timers.rto = rto;
        conn.timers.sa = 0;
        conn.timers.sv = 4;
        conn.timers.nrtx = 0;

        let isn = self.isn.get_isn(conn.tuple, now);
        conn.send = initial_send(isn, u32::from(segment.header.window_len));
        conn.tx_unacked = 1;
        conn.flow_control = NewReno::new(mss);

        let irs = segment.header.seq_number;
        conn.recv.initial_seq = irs;
        conn.recv.next = irs + 1;
        conn.recv.adv = irs + 1;
        conn.change_state(State::SynReceived);

        if backlog {
            conn.backlog_parent = Some(listener);
        }

        self.table.link_last(&mut self.pool, key);

        if backlog {
            if let Some(backlog) = self.pool.get_mut(listener).and_then(|l| l.backlog.as_mut()) {
                backlog.pending.push(key);
            }
        }

        self.update_retrantimer(io, key, rto)?;
        Ok(key)
    }

    /// Take the oldest established connection off the backlog of a listener.
    pub fn accept(&mut self, listener: SlotKey) -> Option<SlotKey> {
        let pending = self.pool.get(listener)?.backlog.as_ref()?.pending.clone();
        let ready = pending.iter()
            .position(|&child| self.pool.get(child).map_or(false, |c| c.is(State::Established)))?;
        let child = pending[ready];

        if let Some(backlog) = self.pool.get_mut(listener).and_then(|l| l.backlog.as_mut()) {
            backlog.pending.remove(ready);
        }
        if let Some(conn) = self.pool.get_mut(child) {
            conn.backlog_parent = None;
        }
        Some(child)
    }

    /// Find the connection a received segment belongs to.
    ///
    /// The address family is the one of the receiving device.
    pub fn active<I>(&self, io: &I, device: DeviceId, segment: &Incoming) -> Option<SlotKey>
        where I: Devices + ?Sized,
    {
        self.table.find_active(&self.pool, io.domain_of(device), segment)
    }

    /// Find a connection owning a local address and port.
    pub fn find_listener(&self, domain: Domain, addr: IpAddress, port: u16) -> Option<SlotKey> {
        self.table.find_listener(&self.pool, domain, addr, port)
    }

    /// Close the local side of a connection.
    ///
    /// An established connection queues a FIN and waits in `FinWait1`, data not yet sent is
    /// dropped. Connections without a synchronized peer go straight to `Closed`. Closing an
    /// already closing connection does nothing.
    pub fn close<I>(&mut self, io: &mut I, key: SlotKey) -> Result<()>
        where I: Schedule + ?Sized,
    {
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        match conn.current {
            State::Established => {
                if !conn.write_queue.is_empty() {
                    net_debug!("tcp close drops {} queued writes", conn.write_queue.len());
                    conn.write_queue.clear();
                }
                conn.send.rexmit = conn.send.next;
                conn.tx_unacked += 1;
                conn.timers.nrtx = 0;
                conn.timers.zero_probe = false;
                conn.timers.timeout = true;
                conn.keepalive.timer = Default::default();
                conn.change_state(State::FinWait1);
                let rto = conn.timers.rto;
                self.update_retrantimer(io, key, rto)
            },
            State::Allocated | State::Listen | State::SynSent | State::SynReceived => {
                conn.timers.disarm();
                conn.change_state(State::Closed);
                io.cancel(key);
                Ok(())
            },
            _ => Ok(()),
        }
    }

    /// Reset a connection.
    ///
    /// Sends a RST to a synchronized peer and closes the connection immediately. The record stays
    /// allocated until it is freed.
    pub fn abort<I>(&mut self, io: &mut I, key: SlotKey) -> Result<()>
        where I: Schedule + Transmit + ?Sized,
    {
        let Endpoint { pool, stats, .. } = self;
        let conn = pool.get_mut(key).ok_or(Error::Illegal)?;
        match conn.current {
            State::SynReceived
            | State::Established
            | State::FinWait1
            | State::FinWait2
            | State::Closing
            | State::LastAck
            | State::TimeWait => super::timer::send_reset(io, conn, stats),
            _ => (),
        }

        conn.timers.disarm();
        conn.timers.zero_probe = false;
        conn.keepalive.enabled = false;
        conn.change_state(State::Closed);
        io.cancel(key);
        Ok(())
    }

    /// Count another socket referring to the connection.
    pub fn add_ref(&mut self, key: SlotKey) -> Result<u8> {
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        conn.refs = conn.refs.checked_add(1).ok_or(Error::Exhausted)?;
        Ok(conn.refs)
    }

    /// Drop a socket reference, returning the remaining count.
    pub fn release_ref(&mut self, key: SlotKey) -> Result<u8> {
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        conn.refs = conn.refs.checked_sub(1).ok_or(Error::Illegal)?;
        Ok(conn.refs)
    }

    /// Register an upper layer callback, released again when the connection is freed.
    pub fn register_callback(&mut self, key: SlotKey, callback: CallbackId) -> Result<()> {
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        conn.callbacks.push(callback);
        Ok(())
    }

    /// Set or clear the linger deadline of a connection.
    ///
    /// Once the deadline passes, the next timer run resets the connection no matter what else it
    /// is waiting for.
    pub fn set_linger<I>(&mut self, io: &mut I, key: SlotKey, linger: Option<Duration>)
        -> Result<()>
        where I: Schedule + ?Sized,
    {
        let now = io.now();
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        conn.timers.linger = match linger {
            Some(linger) => Expiration::When(now + linger),
            None => Expiration::Never,
        };
        self.update_timer(io, key)
    }

    /// Enable or disable keepalive probing.
    ///
    /// The idle countdown starts right away for an established connection, otherwise once it
    /// becomes established.
    pub fn set_keepalive<I>(&mut self, io: &mut I, key: SlotKey, enabled: bool) -> Result<()>
        where I: Schedule + ?Sized,
    {
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        conn.keepalive.enabled = enabled;
        conn.keepalive.retries = 0;
        let idle = if enabled && conn.is(State::Established) {
            conn.keepalive.idle
        } else {
            Default::default()
        };
        self.update_keeptimer(io, key, idle)
    }

    /// Restart the keepalive idle countdown after activity of the peer.
    pub fn keepalive_reset<I>(&mut self, io: &mut I, key: SlotKey) -> Result<()>
        where I: Schedule + ?Sized,
    {
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        if !conn.keepalive.enabled {
            return Ok(());
        }
        conn.keepalive.retries = 0;
        let idle = conn.keepalive.idle;
        self.update_keeptimer(io, key, idle)
    }

    /// Note a received segment whose acknowledgement is delayed.
    pub fn delay_ack<I>(&mut self, io: &mut I, key: SlotKey) -> Result<()>
        where I: Schedule + ?Sized,
    {
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        conn.timers.rx_unackseg = conn.timers.rx_unackseg.saturating_add(1);
        self.update_timer(io, key)
    }

    /// Process the acknowledgement and window of a received segment.
    ///
    /// Releases acknowledged data and restarts or stops the retransmission timer. An
    /// acknowledged SYN establishes the connection. Window probing ends when the peer opens its
    /// window again.
    pub fn acknowledge<I>(&mut self, io: &mut I, key: SlotKey, ack: TcpSeqNumber, window: u16)
        -> Result<()>
        where I: Schedule + ?Sized,
    {
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        if !conn.is_active() {
            return Err(Error::Illegal);
        }

        let acked = ack - conn.send.unacked;
        if acked as u64 > u64::from(conn.tx_unacked) {
            net_trace!("tcp ack {} beyond sent data", ack);
            return Ok(());
        }

        conn.send.window = u32::from(window);
        if window > 0 && conn.timers.zero_probe {
            conn.timers.zero_probe = false;
            conn.timers.nrtx = 0;
            if conn.timers.purpose == Purpose::ZeroProbe {
                conn.timers.disarm();
            }
        }

        if acked > 0 {
            conn.tx_unacked -= acked as u32;
            conn.send.unacked = ack;
            if conn.send.next < ack {
                conn.send.next = ack;
            }
            while let Some(sent) = conn.unacked_queue.front() {
                if sent.seq + sent.data.len() <= ack {
                    conn.unacked_queue.pop_front();
                } else {
                    break;
                }
            }
            conn.timers.nrtx = 0;

            if conn.tx_unacked == 0 {
                if conn.timers.purpose == Purpose::Retransmit {
                    conn.timers.disarm();
                }
            } else {
                let rto = conn.timers.rto;
                conn.timers.arm(Purpose::Retransmit, rto);
            }

            match conn.current {
                State::SynSent | State::SynReceived if conn.tx_unacked == 0 => {
                    conn.change_state(State::Established);
                },
                _ => (),
            }
        }

        if conn.keepalive.enabled && conn.is(State::Established) {
            conn.keepalive.retries = 0;
            conn.keepalive.timer = conn.keepalive.idle;
        }

        self.update_timer(io, key)
    }

    /// Enter `TimeWait` or `FinWait2` and start the wait timer.
    pub fn enter_time_wait<I>(&mut self, io: &mut I, key: SlotKey, state: State) -> Result<()>
        where I: Schedule + ?Sized,
    {
        match state {
            State::TimeWait | State::FinWait2 => (),
            _ => return Err(Error::Illegal),
        }

        let time_wait = self.config.time_wait;
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        if !conn.is_active() {
            return Err(Error::Illegal);
        }
        conn.keepalive.timer = Default::default();
        conn.timers.zero_probe = false;
        conn.timers.arm(Purpose::TimeWait, time_wait);
        conn.change_state(state);
        self.update_timer(io, key)
    }
}

fn initial_send(isn: TcpSeqNumber, window: u32) -> Send {
    Send {
        unacked: isn,
        next: isn,
        window,
        initial_seq: isn,
        rexmit: isn,
        max: isn,
    }
}

fn advertised(buffer: usize) -> u16 {
    cmp::min(buffer, usize::from(u16::max_value())) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertised_window_is_clamped() {
        assert_eq!(advertised(4096), 4096);
        assert_eq!(advertised(1 << 20), u16::max_value());
    }

    #[test]
    fn references() {
        let mut endpoint = Endpoint::new(Config::default());
        let (key, _) = endpoint.pool.try_alloc().unwrap();
        assert_eq!(endpoint.release_ref(key), Err(Error::Illegal));
        assert_eq!(endpoint.add_ref(key), Ok(1));
        assert_eq!(endpoint.add_ref(key), Ok(2));
        assert_eq!(endpoint.release_ref(key), Ok(1));
        endpoint.get_mut(key).unwrap().refs = u8::max_value();
        assert_eq!(endpoint.add_ref(key), Err(Error::Exhausted));
    }

    #[test]
    fn listen_requires_a_port() {
        let mut endpoint = Endpoint::new(Config::default());
        let (key, conn) = endpoint.pool.try_alloc().unwrap();
        conn.current = State::Allocated;
        assert_eq!(endpoint.listen(key, 2), Err(Error::Illegal));

        endpoint.get_mut(key).unwrap().tuple.local_port = 23;
        assert_eq!(endpoint.listen(key, 2), Ok(()));
        assert_eq!(endpoint.get(key).unwrap().backlog.as_ref().map(|b| b.limit), Some(2));
        assert_eq!(endpoint.nextconn(None), Some(key));
        assert_eq!(endpoint.listen(key, 2), Err(Error::Illegal));
    }
}
