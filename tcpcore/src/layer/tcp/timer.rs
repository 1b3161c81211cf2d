//! The per connection timer.
//!
//! Every connection owns a single deferred work item in the [`Schedule`] of the embedding stack.
//! It is queued for the nearest of three deadlines: the generic half-second timer (used in turn
//! for retransmission, zero window probing and the final wait states), the keepalive countdown
//! kept in deciseconds, and a delayed acknowledgement. A linger deadline can only shorten it.
//!
//! When the work runs, the stack marks the connection with [`expire`] and its device polls it
//! through [`poll`], which runs the timer engine once with the delay that was scheduled as the
//! elapsed time. Everything the engine sends goes through [`Transmit`], everything the socket
//! layer has to learn about through [`Upper`].
//!
//! [`Schedule`]: ../io/trait.Schedule.html
//! [`Transmit`]: ../io/trait.Transmit.html
//! [`Upper`]: ../io/trait.Upper.html
//! [`expire`]: ../struct.Endpoint.html#method.expire
//! [`poll`]: ../struct.Endpoint.html#method.poll
use core::{cmp, mem};

use crate::alloc::collections::VecDeque;
use crate::layer::{Error, Result};
use crate::time::{Dsec, Hsec, Instant};
use crate::wire::{TcpFlags, TcpHeader, TcpSeqNumber, TCP_HEADER_LEN};

use super::config::Config;
use super::connection::{Connection, Purpose, Sent, State};
use super::endpoint::{Endpoint, SlotKey, Stats};
use super::io::{DeviceId, Event, Events, Schedule, Segment, Transmit, Upper};

/// What the next run of the timer work of a connection is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cause {
    /// The generic timer, with its current owner.
    Timer(Purpose),

    /// The keepalive countdown.
    Keepalive,

    /// An acknowledgement that has been delayed.
    DelayedAck,
}

/// The nearest deadline of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Pending {
    /// The timer that is due.
    pub cause: Cause,

    /// Half-seconds until it is due.
    pub delay: Hsec,
}

/// Compute the nearest deadline of a connection, ignoring linger.
///
/// The generic timer counts when it is nonzero. The keepalive countdown is rounded up to whole
/// half-seconds and wins when it is shorter. A delayed acknowledgement counts only for an
/// established connection with nothing in flight. `None` means there is nothing to wait for.
pub fn effective_timeout(conn: &Connection, ack_delay: Hsec) -> Option<Pending> {
    let mut pending = None;
    let mut consider = |cause: Cause, delay: Hsec| {
        let shorter = match pending {
            Some(Pending { delay: current, .. }) => delay < current,
            None => true,
        };
        if delay.0 > 0 && shorter {
            pending = Some(Pending { cause, delay });
        }
    };

    consider(Cause::Timer(conn.timers.purpose), conn.timers.timer);
    consider(Cause::Keepalive, conn.keepalive.timer.as_hsec_ceil());
    // With data in flight the timer only retransmits, which acknowledges anyway.
    if conn.is(State::Established) && conn.tx_unacked == 0 && conn.timers.rx_unackseg > 0 {
        let left = ack_delay - conn.timers.rx_acktimer;
        consider(Cause::DelayedAck, cmp::max(left, Hsec(1)));
    }

    pending
}

/// The delay to schedule, with a lingering close cutting it short.
fn due(conn: &Connection, ack_delay: Hsec, now: Instant) -> Option<Hsec> {
    let delay = effective_timeout(conn, ack_delay)?.delay;
    Some(match conn.timers.linger.remaining(now) {
        Some(left) => cmp::min(delay, Hsec::from_duration_ceil(left)),
        None => delay,
    })
}

impl Endpoint {
    /// Queue, requeue or cancel the timer work after the timers of a connection changed.
    ///
    /// Work that is already queued for the same delay keeps its original deadline.
    pub fn update_timer<I>(&mut self, io: &mut I, key: SlotKey) -> Result<()>
        where I: Schedule + ?Sized,
    {
        let now = io.now();
        let conn = self.pool.get(key).ok_or(Error::Illegal)?;
        let delay = match due(conn, self.config.ack_delay, now) {
            Some(delay) => delay,
            None => {
                io.cancel(key);
                return Ok(());
            },
        };

        match io.time_left(key) {
            Some(left) if io.ticks_to_hsec(left) == delay => (),
            _ => {
                let ticks = io.hsec_to_ticks(delay);
                net_trace!("tcp timer of {:?} in {}", key, delay);
                io.schedule(key, ticks);
            },
        }

        Ok(())
    }

    /// Restart the retransmission timer.
    pub fn update_retrantimer<I>(&mut self, io: &mut I, key: SlotKey, timeout: Hsec) -> Result<()>
        where I: Schedule + ?Sized,
    {
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        conn.timers.arm(Purpose::Retransmit, timeout);
        self.update_timer(io, key)
    }

    /// Restart the keepalive countdown, zero stops it.
    pub fn update_keeptimer<I>(&mut self, io: &mut I, key: SlotKey, timeout: Dsec) -> Result<()>
        where I: Schedule + ?Sized,
    {
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        conn.keepalive.timer = timeout;
        self.update_timer(io, key)
    }

    /// Cancel the queued timer work of a connection.
    ///
    /// The timers themselves are left as they are.
    pub fn stop_timer<I>(&mut self, io: &mut I, key: SlotKey)
        where I: Schedule + ?Sized,
    {
        io.cancel(key);
    }

    /// Start zero window probing if the connection has stalled.
    ///
    /// That is when an established connection has queued data, nothing in flight and the events
    /// of the last segment or poll carried no new data. Probing starts at the minimum timeout
    /// and only if the generic timer is idle.
    pub fn set_zero_probe<I>(&mut self, io: &mut I, key: SlotKey, events: Events) -> Result<()>
        where I: Schedule + ?Sized,
    {
        let rto_min = self.config.rto_min;
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        let stalled = conn.is(State::Established)
            && !events.contains_any(Events::NEWDATA)
            && events.contains_any(Events::POLL | Events::REXMIT | Events::ACKDATA)
            && conn.tx_unacked == 0
            && !conn.write_queue.is_empty()
            && !conn.timers.timeout
            && !conn.timers.zero_probe
            && conn.timers.purpose == Purpose::Idle;

        if !stalled {
            return Ok(());
        }

        net_debug!("tcp {}:{} send window closed, probing",
            conn.tuple.remote, conn.tuple.remote_port);
        conn.timers.arm(Purpose::ZeroProbe, rto_min);
        conn.timers.zero_probe = true;
        self.update_timer(io, key)
    }

    /// Mark a connection whose timer work ran.
    ///
    /// Returns the device to poll, `None` if the connection was freed in the meantime or has no
    /// device.
    pub fn expire(&mut self, key: SlotKey) -> Option<DeviceId> {
        let conn = match self.pool.get_mut(key) {
            Some(conn) if conn.is_linked() => conn,
            _ => {
                net_trace!("tcp timer of stale {:?}", key);
                return None;
            },
        };
        conn.timers.timeout = true;
        conn.device
    }

    /// Poll a connection on behalf of its device.
    ///
    /// Runs the timer engine if the timer expired. Otherwise an established connection asks the
    /// upper layer for data and sends what is queued, starting window probes if nothing fits.
    pub fn poll<I>(&mut self, io: &mut I, key: SlotKey) -> Result<()>
        where I: Schedule + Transmit + Upper + ?Sized,
    {
        let conn = self.pool.get_mut(key).ok_or(Error::Illegal)?;
        if conn.timers.timeout {
            conn.timers.timeout = false;
            return self.timer(io, key);
        }

        if !conn.is(State::Established) {
            return Ok(());
        }

        io.notify(key, Event::Poll);
        if let Some(conn) = self.pool.get_mut(key) {
            send_queued(io, conn);
        }
        self.set_zero_probe(io, key, Events::POLL)?;
        self.update_timer(io, key)
    }

    /// Run the timer engine with the scheduled delay as the elapsed time.
    pub fn timer<I>(&mut self, io: &mut I, key: SlotKey) -> Result<()>
        where I: Schedule + Transmit + Upper + ?Sized,
    {
        let now = io.now();
        let conn = self.pool.get(key).ok_or(Error::Illegal)?;
        let elapsed = due(conn, self.config.ack_delay, now).unwrap_or(Hsec(0));
        self.timer_elapsed(io, key, elapsed)
    }

    /// Run the timer engine after `hsec` half-seconds have elapsed.
    ///
    /// In order of precedence: a passed linger deadline resets the connection, the wait states
    /// count down to `Closed`, unacknowledged sequence space is retransmitted with exponential
    /// backoff, and an idle established connection sends keepalive probes, window probes, or a
    /// delayed acknowledgement before the upper layer is polled for new data. The timer work is
    /// rescheduled afterwards, a connection that timed out in `SynReceived` is freed instead.
    pub fn timer_elapsed<I>(&mut self, io: &mut I, key: SlotKey, hsec: Hsec) -> Result<()>
        where I: Schedule + Transmit + Upper + ?Sized,
    {
        let now = io.now();
        let Endpoint { pool, config, stats, .. } = self;
        let conn = pool.get_mut(key).ok_or(Error::Illegal)?;
        if conn.is(State::Closed) {
            return Ok(());
        }

        let free = if conn.timers.linger.elapsed(now) {
            net_debug!("tcp {}:{} linger expired", conn.tuple.local, conn.tuple.local_port);
            conn.timers.disarm();
            conn.change_state(State::Closed);
            io.notify(key, Event::TimedOut);
            send_reset(io, conn, stats);
            stats.timeouts += 1;
            false
        } else {
            match conn.current {
                State::TimeWait | State::FinWait2 => {
                    wait(io, key, conn, stats, hsec);
                    false
                },
                _ if conn.tx_unacked > 0 => retransmit(io, key, conn, config, stats, hsec),
                State::Established => {
                    idle(io, key, conn, config, stats, hsec);
                    false
                },
                _ => false,
            }
        };

        if free {
            self.free(io, key)?;
            return Ok(());
        }

        self.update_timer(io, key)
    }
}

fn wait<I>(io: &mut I, key: SlotKey, conn: &mut Connection, stats: &mut Stats, hsec: Hsec)
    where I: Upper + ?Sized,
{
    if conn.timers.timer <= hsec {
        conn.timers.disarm();
        conn.change_state(State::Closed);
        stats.timeouts += 1;
        io.notify(key, Event::TimedOut);
    } else {
        conn.timers.timer = conn.timers.timer - hsec;
    }
}

/// Returns whether the connection must be freed.
fn retransmit<I>(
    io: &mut I,
    key: SlotKey,
    conn: &mut Connection,
    config: &Config,
    stats: &mut Stats,
    hsec: Hsec,
) -> bool
    where I: Transmit + Upper + ?Sized,
{
    if conn.timers.timer > hsec {
        conn.timers.timer = conn.timers.timer - hsec;
        return false;
    }

    conn.timers.disarm();
    let nrtx = conn.timers.nrtx;

    if conn.is(State::SynReceived) && nrtx >= config.max_syn_retransmits {
        net_debug!("tcp {}:{} handshake unanswered", conn.tuple.remote, conn.tuple.remote_port);
        conn.change_state(State::Closed);
        send_reset(io, conn, stats);
        stats.timeouts += 1;
        conn.refs = 0;
        return true;
    }

    if nrtx >= config.max_retransmits
        || (conn.is(State::SynSent) && nrtx >= config.max_syn_retransmits)
    {
        net_debug!("tcp {}:{} retransmissions exhausted",
            conn.tuple.remote, conn.tuple.remote_port);
        conn.change_state(State::Closed);
        io.notify(key, Event::TimedOut);
        send_reset(io, conn, stats);
        stats.timeouts += 1;
        return false;
    }

    let shift = cmp::min(nrtx, Config::MAX_BACKOFF_SHIFT);
    let backoff = Hsec(config.rto.0.checked_shl(u32::from(shift)).unwrap_or(u32::max_value()));
    conn.timers.rto = backoff;
    conn.timers.arm(Purpose::Retransmit, backoff);
    conn.timers.nrtx += 1;
    stats.retransmissions += 1;
    net_trace!("tcp {}:{} retransmission {}, next in {}",
        conn.tuple.remote, conn.tuple.remote_port, conn.timers.nrtx, backoff);

    match conn.current {
        State::SynReceived => {
            conn.send.next = conn.send.rexmit;
            let seq = conn.send.next;
            transmit(io, conn, TcpFlags::SYN_ACK, seq, &[]);
        },
        State::SynSent => {
            conn.send.next = conn.send.rexmit;
            let seq = conn.send.next;
            transmit(io, conn, TcpFlags::SYN, seq, &[]);
        },
        State::Established => {
            io.notify(key, Event::Retransmit);
            resend(io, conn);
            let (tx_unacked, mss) = (conn.tx_unacked, conn.mss);
            conn.flow_control.on_timeout(tx_unacked, mss);
        },
        State::FinWait1 | State::Closing | State::LastAck => {
            conn.send.next = conn.send.rexmit;
            let seq = conn.send.next;
            transmit(io, conn, TcpFlags::FIN_ACK, seq, &[]);
        },
        _ => (),
    }

    false
}

fn idle<I>(
    io: &mut I,
    key: SlotKey,
    conn: &mut Connection,
    config: &Config,
    stats: &mut Stats,
    hsec: Hsec,
)
    where I: Transmit + Upper + ?Sized,
{
    if conn.keepalive.enabled {
        let elapsed = hsec.as_dsec();
        if conn.keepalive.timer > elapsed {
            conn.keepalive.timer = conn.keepalive.timer - elapsed;
        } else if conn.keepalive.retries >= conn.keepalive.count {
            net_debug!("tcp {}:{} keepalive unanswered", conn.tuple.remote, conn.tuple.remote_port);
            abort(io, key, conn, stats);
            return;
        } else {
            probe(io, conn);
            conn.keepalive.timer = conn.keepalive.interval;
            conn.keepalive.retries += 1;
            stats.keepalive_probes += 1;
            return;
        }
    }

    if conn.timers.zero_probe {
        if conn.timers.timer > hsec {
            conn.timers.timer = conn.timers.timer - hsec;
        } else if conn.timers.nrtx >= config.max_retransmits {
            net_debug!("tcp {}:{} window stayed closed", conn.tuple.remote, conn.tuple.remote_port);
            abort(io, key, conn, stats);
            return;
        } else {
            probe(io, conn);
            conn.timers.nrtx += 1;
            let shift = cmp::min(u32::from(conn.timers.nrtx), 32);
            let backoff = u64::from(config.rto_min.0) << shift;
            let backoff = cmp::min(backoff, u64::from(config.rto_max.0)) as u32;
            conn.timers.arm(Purpose::ZeroProbe, Hsec(backoff));
            stats.window_probes += 1;
            return;
        }
    }

    if conn.timers.rx_unackseg > 0 {
        conn.timers.rx_acktimer = Hsec(conn.timers.rx_acktimer.0.saturating_add(hsec.0));
        if conn.timers.rx_acktimer >= config.ack_delay {
            let seq = conn.send.next;
            transmit(io, conn, TcpFlags::ACK, seq, &[]);
            stats.delayed_acks += 1;
            return;
        }
    }

    io.notify(key, Event::Poll);
    send_queued(io, conn);
}

/// Close after unanswered probes, without a reset.
fn abort<I>(io: &mut I, key: SlotKey, conn: &mut Connection, stats: &mut Stats)
    where I: Upper + ?Sized,
{
    conn.timers.disarm();
    conn.timers.zero_probe = false;
    conn.keepalive.enabled = false;
    conn.keepalive.timer = Dsec(0);
    conn.change_state(State::Closed);
    stats.timeouts += 1;
    io.notify(key, Event::Abort);
}

/// Send an acknowledgement for the last byte already acknowledged by the peer.
///
/// The peer has to answer with its current acknowledgement, which tells us it is alive and what
/// its window is.
fn probe<T>(io: &mut T, conn: &mut Connection)
    where T: Transmit + ?Sized,
{
    let seq = conn.send.next - 1;
    transmit(io, conn, TcpFlags::ACK, seq, &[]);
}

/// Send a reset from the current sequence number.
pub(crate) fn send_reset<T>(io: &mut T, conn: &mut Connection, stats: &mut Stats)
    where T: Transmit + ?Sized,
{
    let seq = conn.send.next;
    if transmit(io, conn, TcpFlags::RST_ACK, seq, &[]) {
        stats.resets += 1;
    }
}

/// Transmit all unacknowledged data again.
fn resend<T>(io: &mut T, conn: &mut Connection)
    where T: Transmit + ?Sized,
{
    let queue = mem::replace(&mut conn.unacked_queue, VecDeque::new());
    for sent in &queue {
        transmit(io, conn, data_flags(), sent.seq, &sent.data);
    }
    conn.unacked_queue = queue;
}

/// Send queued data as far as the send and congestion windows allow.
///
/// Returns the number of bytes sent. Data is cut into segments of at most one MSS.
pub(crate) fn send_queued<T>(io: &mut T, conn: &mut Connection) -> usize
    where T: Transmit + ?Sized,
{
    let mut sent = 0;
    loop {
        let window = cmp::min(conn.send.window, conn.flow_control.cwnd);
        let room = window.saturating_sub(conn.tx_unacked) as usize;
        let limit = cmp::min(room, usize::from(conn.mss));
        let queued = match conn.write_queue.front() {
            Some(front) => front.len(),
            None => break,
        };
        if limit == 0 {
            break;
        }

        let data = if queued > limit {
            match conn.write_queue.front_mut() {
                Some(front) => {
                    let rest = front.split_off(limit);
                    mem::replace(front, rest)
                },
                None => break,
            }
        } else {
            match conn.write_queue.pop_front() {
                Some(data) => data,
                None => break,
            }
        };

        let seq = conn.send.next;
        transmit(io, conn, data_flags(), seq, &data);
        conn.send.next += data.len();
        conn.tx_unacked += data.len() as u32;
        sent += data.len();
        conn.unacked_queue.push_back(Sent { seq, data });
    }

    if sent > 0 && conn.timers.purpose == Purpose::Idle {
        let rto = conn.timers.rto;
        conn.timers.arm(Purpose::Retransmit, rto);
    }

    sent
}

fn data_flags() -> TcpFlags {
    let mut flags = TcpFlags::ACK;
    flags.set_psh(true);
    flags
}

/// Hand one segment of a connection to its device.
///
/// Returns `false` if the connection has no device to send on.
fn transmit<T>(
    io: &mut T,
    conn: &mut Connection,
    flags: TcpFlags,
    seq: TcpSeqNumber,
    payload: &[u8],
) -> bool
    where T: Transmit + ?Sized,
{
    let device = match conn.device {
        Some(device) => device,
        None => {
            net_warn!("tcp {}:{} has no device, dropping {}",
                conn.tuple.local, conn.tuple.local_port, flags);
            return false;
        },
    };

    // The SYN carries the MSS option.
    let header_len = if flags.syn() { TCP_HEADER_LEN + 4 } else { TCP_HEADER_LEN };
    let header = TcpHeader {
        src_port: conn.tuple.local_port,
        dst_port: conn.tuple.remote_port,
        seq_number: seq,
        ack_number: if flags.ack() { conn.recv.next } else { TcpSeqNumber::default() },
        flags,
        window_len: conn.recv.window,
        header_len: header_len as u8,
    };

    io.send(device, &Segment {
        src: conn.tuple.local,
        dst: conn.tuple.remote,
        header,
        ttl: conn.options.ttl,
        tos: conn.options.tos,
        payload,
    });

    let end = seq + flags.sequence_len() + payload.len();
    if conn.send.max < end {
        conn.send.max = end;
    }

    if flags.ack() {
        conn.recv.adv = conn.recv.next + usize::from(conn.recv.window);
        conn.timers.rx_unackseg = 0;
        conn.timers.rx_acktimer = Hsec(0);
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{Duration, Expiration};

    #[test]
    fn nearest_deadline_wins() {
        let mut conn = Connection::default();
        assert_eq!(effective_timeout(&conn, Hsec(1)), None);

        conn.timers.arm(Purpose::Retransmit, Hsec(6));
        assert_eq!(effective_timeout(&conn, Hsec(1)), Some(Pending {
            cause: Cause::Timer(Purpose::Retransmit),
            delay: Hsec(6),
        }));

        conn.keepalive.timer = Dsec(21);
        assert_eq!(effective_timeout(&conn, Hsec(1)), Some(Pending {
            cause: Cause::Keepalive,
            delay: Hsec(5),
        }));

        conn.timers.disarm();
        conn.keepalive.timer = Dsec(72000);
        assert_eq!(effective_timeout(&conn, Hsec(1)).map(|p| p.delay), Some(Hsec(14400)));
    }

    #[test]
    fn delayed_ack_only_when_established() {
        let mut conn = Connection::default();
        conn.timers.rx_unackseg = 1;
        assert_eq!(effective_timeout(&conn, Hsec(1)), None);

        conn.current = State::Established;
        assert_eq!(effective_timeout(&conn, Hsec(1)), Some(Pending {
            cause: Cause::DelayedAck,
            delay: Hsec(1),
        }));

        conn.tx_unacked = 5;
        conn.timers.arm(Purpose::Retransmit, Hsec(48));
        assert_eq!(effective_timeout(&conn, Hsec(1)), Some(Pending {
            cause: Cause::Timer(Purpose::Retransmit),
            delay: Hsec(48),
        }));
    }

    #[test]
    fn linger_shortens_the_delay() {
        let mut conn = Connection::default();
        conn.timers.arm(Purpose::TimeWait, Hsec(120));
        let now = Instant::from_millis(10_000);
        assert_eq!(due(&conn, Hsec(1), now), Some(Hsec(120)));

        conn.timers.linger = Expiration::When(now + Duration::from_millis(1200));
        assert_eq!(due(&conn, Hsec(1), now), Some(Hsec(3)));

        conn.timers.linger = Expiration::When(Instant::from_millis(0));
        assert_eq!(due(&conn, Hsec(1), now), Some(Hsec(0)));
    }
}
