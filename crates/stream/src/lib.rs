//! Push-channel client for live flood updates.
//!
//! Provides typed frame parsing, the WebSocket connection helper, the frame
//! processor that feeds normalized points into a [`sink::PointSink`], and
//! [`session::ChannelSession`], which owns one connection with its poll
//! timer and explicit teardown.

pub mod client;
pub mod events;
pub mod messages;
pub mod processor;
pub mod session;
pub mod sink;
