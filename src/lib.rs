//! Synchronous game server query client.
//!
//! Speaks Valve A2S (Source engine titles, Arma 3 with its binary rules),
//! the Frostbite remote administration protocol (Battlefield) and id Tech 3
//! `getstatus`, and normalizes every answer into one [ServerInfo] shape.
//!
//! ```no_run
//! use gsq::{registry, GsqErr};
//!
//! fn main() -> Result<(), GsqErr> {
//!     let mut query = registry::create("arma3", "127.0.0.1", 2302)?;
//!     query.query_server(true, true);
//!
//!     println!("{}", query.info());
//!     Ok(())
//! }
//! ```

mod conf;
mod error;
mod info;
mod query;
mod share;

pub mod challenge;
pub mod huffman;
pub mod protocol;
pub mod reader;
pub mod registry;
pub mod transport;

pub use challenge::ChallengeRing;
pub use conf::{Conf, SocketConf, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use error::GsqErr;
pub use huffman::{HuffmanCodec, HuffmanTable};
pub use info::{Password, PlayerRecord, ServerInfo, Value};
pub use protocol::Protocol;
pub use query::ServerQuery;
pub use reader::PacketReader;
pub use transport::{
    Capture, ExchangeLog, NetTransport, ReplayDocument, ReplayTransport, Transport,
};
