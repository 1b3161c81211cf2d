//! The TCP connection core.
//!
//! Keeps the state of every TCP connection of a host and everything that happens to a connection
//! without a segment arriving: allocation, binding, connecting, accepting, and the timer that
//! retransmits, probes and finally expires it. Parsing and answering segments is left to the input
//! path of the embedding stack, which uses [`Endpoint::active`] to demultiplex and the operations
//! here to change connection state.
//!
//! ## Structure
//!
//! The [`Endpoint`] owns a bounded [`Pool`] of [`Connection`] records addressed by [`SlotKey`]s
//! (which behave similar to specialized file descriptors). Connections that left the `Allocated`
//! state are threaded into the active list, a [`Table`] in insertion order, until they are freed.
//! Local ports come from the [`PortAllocator`] and initial sequence numbers from the
//! [`IsnGenerator`].
//!
//! [`Endpoint`]: struct.Endpoint.html
//! [`Endpoint::active`]: struct.Endpoint.html#method.active
//! [`Pool`]: struct.Pool.html
//! [`Connection`]: struct.Connection.html
//! [`SlotKey`]: struct.SlotKey.html
//! [`Table`]: struct.Table.html
//! [`PortAllocator`]: struct.PortAllocator.html
//! [`IsnGenerator`]: struct.IsnGenerator.html
//!
//! Unlike standard stacks where state and user must be assumed to be in different protection
//! domains and which manage their state opaquely, it poses no problem for this library to allow
//! inspection of internal state or modification (by the user) beyond the transitions mandated in
//! the protocol standard. All connection fields are public.
//!
//! ## Creating a connection
//!
//! An active open allocates a record, optionally binds it and then connects it. Connecting does
//! not send anything by itself. It marks the connection as timed out and arms the retransmission
//! timer, the SYN is sent by the timer engine when the device polls the connection next.
//!
//! ## Accepting connections
//!
//! A listening connection is bound and then put into `Listen`. For every SYN the input path finds
//! a listener for, [`alloc_accept`] creates a new connection in `SynReceived` that inherits the
//! socket options of the listener and waits in its backlog until [`accept`] picks it up.
//!
//! [`alloc_accept`]: struct.Endpoint.html#method.alloc_accept
//! [`accept`]: struct.Endpoint.html#method.accept
//!
//! ## Deviations
//!
//! Connections that reach `Closed` through a timeout stay in the active list until their owner
//! frees them. They are invisible to lookups but remain candidates for reclaiming when the pool
//! runs dry.
//!
//! A connection that never completed its handshake after a SYN-ACK is freed by the timer itself,
//! there is no socket that could do it.
mod config;
mod connection;
mod endpoint;
mod family;
pub mod io;
mod pool;
mod port;
mod table;
pub mod timer;

mod siphash;


pub use config::Config;

pub use connection::{
    Backlog,
    Connection,
    FourTuple,
    Keepalive,
    NewReno,
    Options,
    OutOfOrder,
    Purpose,
    Receive,
    Send,
    Sent,
    State,
    Timers};

pub use endpoint::{
    Endpoint,
    Release,
    SlotKey,
    Stats};

pub use pool::Pool;

pub use port::PortAllocator;

pub use table::{
    Iter,
    Table};

// publically exposed for initialization.
pub use siphash::IsnGenerator;
