use super::{ExchangeLog, FrameLen, ReplayDocument, Transport};
use crate::{share::bufs_to_hex, Conf, GsqErr};
use std::{collections::VecDeque, time::Duration};
use tracing::warn;

/// [Transport] that answers from a recorded [ReplayDocument] instead of the
/// network.
///
/// Captures are consumed in order. A capture with a non-empty `sent` only
/// answers the exact same outgoing bytes; captures with an empty `sent` are
/// extra datagrams belonging to the request before them.
#[derive(Debug, Clone)]
pub struct ReplayTransport {
    exchanges: VecDeque<(Vec<u8>, Vec<u8>)>,
}

impl ReplayTransport {
    pub fn create(doc: &ReplayDocument) -> Result<Self, GsqErr> {
        let exchanges = doc
            .captures
            .iter()
            .map(|capture| Ok((capture.sent_bufs()?, capture.received_bufs()?)))
            .collect::<Result<VecDeque<_>, GsqErr>>()?;

        Ok(Self { exchanges })
    }

    pub fn from_json(json: &str) -> Result<Self, GsqErr> {
        Self::create(&ReplayDocument::from_json(json)?)
    }

    /// Captures not consumed yet.
    pub fn remaining(&self) -> usize {
        self.exchanges.len()
    }

    /// Pop the capture answering `packet`. Only the sent side is logged.
    fn next_reply(&mut self, packet: &[u8], log: &mut ExchangeLog) -> Option<Vec<u8>> {
        log.sent(packet);

        let (sent, received) = self.exchanges.pop_front()?;

        if !sent.is_empty() && sent != packet {
            warn!(
                "Replay mismatch, expected [{}] but got [{}]",
                bufs_to_hex(&sent),
                bufs_to_hex(packet)
            );
            return None;
        }

        (!received.is_empty()).then_some(received)
    }

    fn answer(&mut self, packet: &[u8], log: &mut ExchangeLog) -> Option<Vec<u8>> {
        let received = self.next_reply(packet, log)?;

        log.received(&received);
        Some(received)
    }
}

impl Transport for ReplayTransport {
    fn query(&mut self, _addr: &Conf, packet: &[u8], log: &mut ExchangeLog) -> Option<Vec<u8>> {
        self.answer(packet, log)
    }

    fn query_multi_packet(
        &mut self,
        _addr: &Conf,
        packet: &[u8],
        max_packets: usize,
        _inter_packet_timeout: Duration,
        log: &mut ExchangeLog,
    ) -> Vec<Vec<u8>> {
        let mut packets = match self.answer(packet, log) {
            Some(first) => vec![first],
            None => return Vec::new(),
        };

        while max_packets == 0 || packets.len() < max_packets {
            match self.exchanges.front() {
                Some((sent, received)) if sent.is_empty() && !received.is_empty() => {
                    log.received(received);
                    packets.push(received.clone());
                    self.exchanges.pop_front();
                }
                _ => break,
            }
        }

        packets
    }

    fn query_tcp(
        &mut self,
        _addr: &Conf,
        packet: &[u8],
        frame_len: FrameLen<'_>,
        log: &mut ExchangeLog,
    ) -> Option<Vec<u8>> {
        let mut received = self.next_reply(packet, log)?;

        match frame_len(&received) {
            Some(len) if len <= received.len() => {
                received.truncate(len);
                log.received(&received);

                Some(received)
            }
            _ => None,
        }
    }
}
