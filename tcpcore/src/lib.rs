//! The connection core of a TCP implementation for embedded and single address space stacks.
//!
//! ## Table of contents
//!
//! This is also a recommended reading order but feel free to skip ahead, each chapter tries to be
//! somewhat self-contained.
//!
//! 1. [Design](#design-and-relevant-core-concepts)
//! 2. [The wire module](wire/index.html)
//! 3. [The tcp layer](layer/tcp/index.html)
//!    1. [Connection records](layer/tcp/struct.Connection.html)
//!    1. [Binding and connecting](layer/tcp/struct.Endpoint.html)
//!    1. [The timer engine](layer/tcp/timer/index.html)
//! 4. Internals
//!    1. [The managed module](managed/index.html)
//!    2. [Time](time/index.html)
//!
//! ## Design and relevant core concepts
//!
//! This library does not drive a network interface on its own. It keeps the authoritative table of
//! TCP connections, decides which connection an incoming segment belongs to, hands out local
//! ports, and runs the per-connection timer that retransmits, probes, and expires connections.
//! Everything around it (devices, neighbor resolution, segment construction, deferred work) is
//! reached through small capability traits that the embedding stack implements, see
//! [`layer::tcp::io`].
//!
//! All state lives in one [`Endpoint`] value. There are no process wide globals, two endpoints
//! are two fully independent stacks. Exclusive access to the endpoint is the network lock: every
//! operation that mutates connections takes `&mut Endpoint` and nothing in here blocks or waits.
//!
//! Connections are stored in a generation-checked arena. A [`SlotKey`] keeps referring to the
//! same record until it is freed and never to a record that reused the slot afterwards, so stale
//! references held by a socket layer or a pending timer are detected instead of followed.
//!
//! [`layer::tcp::io`]: layer/tcp/io/index.html
//! [`Endpoint`]: layer/tcp/struct.Endpoint.html
//! [`SlotKey`]: layer/tcp/struct.SlotKey.html
#![warn(missing_docs)]
#![warn(unreachable_pub)]

// tests should be able to use `std`
#![cfg_attr(all(
    not(feature = "std"),
    not(test)),
no_std)]

/// The `alloc` crate, the backing store for growable pools and connection buffers.
pub extern crate alloc;

#[macro_use] mod macros;
pub mod layer;
pub mod managed;
pub mod time;
pub mod wire;

pub use layer::{Error, Result};
