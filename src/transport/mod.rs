//! Request/response plumbing shared by every protocol.
//!
//! [Transport] is the seam between the protocol state machines and the wire:
//! [NetTransport] talks to real sockets, [ReplayTransport] plays back captured
//! exchanges. Every call appends what it sent and received to the
//! [ExchangeLog] passed in by the caller.

mod exchange;
mod net;
mod replay;

pub use exchange::{Capture, Direction, ExchangeEntry, ExchangeLog, ReplayDocument};
pub use net::NetTransport;
pub use replay::ReplayTransport;

use crate::{reader::PacketReader, Conf, PlayerRecord};
use std::time::Duration;
use tracing::debug;

/// Prefix of every connectionless Source engine packet.
pub const A2S_HEADER: [u8; 4] = [0xFF, 0xFF, 0xFF, 0xFF];
/// Token sent when asking the server for a fresh challenge.
pub const A2S_NO_CHALLENGE: u32 = u32::MAX;

pub const A2S_PLAYER: u8 = 0x55;
pub const A2S_CHALLENGE_RESPONSE: u8 = 0x41;
pub const A2S_PLAYER_RESPONSE: u8 = 0x44;

/// Reports the total length of the frame at the start of `bufs`, once enough
/// of the header has arrived to know it.
pub type FrameLen<'a> = &'a dyn Fn(&[u8]) -> Option<usize>;

pub trait Transport {
    /// Send one datagram and collect everything that arrives until the read
    /// timeout expires. `None` when nothing arrived or the socket failed.
    fn query(&mut self, addr: &Conf, packet: &[u8], log: &mut ExchangeLog) -> Option<Vec<u8>>;

    /// Send one datagram and collect up to `max_packets` (0 = unlimited)
    /// response datagrams, pausing `inter_packet_timeout` between reads.
    fn query_multi_packet(
        &mut self,
        addr: &Conf,
        packet: &[u8],
        max_packets: usize,
        inter_packet_timeout: Duration,
        log: &mut ExchangeLog,
    ) -> Vec<Vec<u8>>;

    /// Open a TCP connection, write `packet` and read until `frame_len`
    /// reports a complete frame. A failed write is a hard failure.
    fn query_tcp(
        &mut self,
        addr: &Conf,
        packet: &[u8],
        frame_len: FrameLen<'_>,
        log: &mut ExchangeLog,
    ) -> Option<Vec<u8>>;

    /// Two step A2S player list handshake: ask for a challenge, then ask for
    /// the players with the challenge attached.
    ///
    /// Players cut off by the end of the buffer are dropped, the complete ones
    /// are still returned.
    fn query_players(&mut self, addr: &Conf, log: &mut ExchangeLog) -> Option<Vec<PlayerRecord>> {
        let response = self.query(addr, &a2s_request(A2S_PLAYER, A2S_NO_CHALLENGE), log)?;

        let bufs = match parse_challenge(&response, A2S_PLAYER_RESPONSE) {
            ChallengeReply::Token(token) => {
                self.query(addr, &a2s_request(A2S_PLAYER, token), log)?
            }
            // Some servers skip the challenge and answer right away.
            ChallengeReply::Answered => response,
            ChallengeReply::Malformed => {
                debug!("Malformed player challenge reply from {}", addr);
                return None;
            }
        };

        parse_players(&bufs)
    }
}

/// `FF FF FF FF <kind> <token as LE u32>`
pub fn a2s_request(kind: u8, token: u32) -> Vec<u8> {
    [
        A2S_HEADER.as_slice(),
        [kind].as_slice(),
        token.to_le_bytes().as_slice(),
    ]
    .concat()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeReply {
    /// Server wants the request repeated with this token.
    Token(u32),
    /// Server replied with the data packet (`answer_kind`) directly.
    Answered,
    Malformed,
}

/// Classify the reply to a challenge request.
pub fn parse_challenge(bufs: &[u8], answer_kind: u8) -> ChallengeReply {
    let mut reader = PacketReader::create(bufs);

    if reader.read_bytes(4) != Some(A2S_HEADER.as_slice()) {
        return ChallengeReply::Malformed;
    }

    match reader.read_u8() {
        Some(A2S_CHALLENGE_RESPONSE) => match reader.read_u32() {
            Some(token) => ChallengeReply::Token(token),
            None => ChallengeReply::Malformed,
        },
        Some(kind) if kind == answer_kind => ChallengeReply::Answered,
        _ => ChallengeReply::Malformed,
    }
}

/// Decode an `A2S_PLAYER` response.
///
/// Layout: header, `0x44`, player count, then per player an index byte, a
/// null-terminated name, an LE i32 score and an LE f32 connection time.
pub fn parse_players(bufs: &[u8]) -> Option<Vec<PlayerRecord>> {
    let mut reader = PacketReader::create(bufs);

    if reader.read_bytes(4) != Some(A2S_HEADER.as_slice())
        || reader.read_u8() != Some(A2S_PLAYER_RESPONSE)
    {
        debug!("Player response does not start with the A2S_PLAYER header");
        return None;
    }

    let count = reader.read_u8()?;
    let mut players = Vec::with_capacity(count as usize);

    for _ in 0..count {
        match read_player(&mut reader) {
            Some(player) => players.push(player),
            None => {
                debug!(
                    "Player list truncated after {} of {} players",
                    players.len(),
                    count
                );
                break;
            }
        }
    }

    Some(players)
}

fn read_player(reader: &mut PacketReader<'_>) -> Option<PlayerRecord> {
    let _index = reader.read_u8()?;
    let name = reader.read_str()?;
    let score = reader.read_i32()?;
    let time = reader.read_f32()?;

    let mut player = PlayerRecord::create(name);
    player.insert("score", score);
    player.insert("time", time);

    Some(player)
}
