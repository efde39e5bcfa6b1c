use super::{ExchangeLog, FrameLen, Transport};
use crate::{
    share::{create_tcp_socket, create_udp_socket, is_timeout},
    Conf, GsqErr,
};
use std::{
    io::{Read, Write},
    net::UdpSocket,
    thread,
    time::Duration,
};
use tracing::{debug, trace, warn};

const MAX_DATAGRAM: usize = 65535;

/// [Transport] over real sockets. Every call opens its own socket, sized by
/// the address' [crate::SocketConf], and closes it before returning.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetTransport;

impl NetTransport {
    pub fn create() -> Self {
        Self
    }
}

fn open_udp(addr: &Conf, packet: &[u8], log: &mut ExchangeLog) -> Result<UdpSocket, GsqErr> {
    let socket = create_udp_socket(&addr.socket_conf)?;

    socket.connect(addr)?;
    socket.send(packet)?;
    log.sent(packet);
    trace!("Sent {} bytes to {}", packet.len(), addr);

    Ok(socket)
}

/// Read one datagram. `None` on timeout, error or an empty datagram.
fn recv_datagram(socket: &UdpSocket, addr: &Conf) -> Option<Vec<u8>> {
    let mut bufs = vec![0u8; MAX_DATAGRAM];

    match socket.recv(&mut bufs) {
        Ok(0) => None,
        Ok(size) => {
            bufs.truncate(size);
            Some(bufs)
        }
        Err(err) if is_timeout(&err) => None,
        Err(err) => {
            debug!("Reading from {} failed: {}", addr, err);
            None
        }
    }
}

impl Transport for NetTransport {
    fn query(&mut self, addr: &Conf, packet: &[u8], log: &mut ExchangeLog) -> Option<Vec<u8>> {
        let socket = match open_udp(addr, packet, log) {
            Ok(socket) => socket,
            Err(err) => {
                debug!("UDP query to {} failed: {}", addr, err);
                return None;
            }
        };

        let mut result = Vec::new();

        while let Some(datagram) = recv_datagram(&socket, addr) {
            result.extend_from_slice(&datagram);
        }

        if result.is_empty() {
            debug!("No response from {}", addr);
            return None;
        }

        log.received(&result);
        Some(result)
    }

    fn query_multi_packet(
        &mut self,
        addr: &Conf,
        packet: &[u8],
        max_packets: usize,
        inter_packet_timeout: Duration,
        log: &mut ExchangeLog,
    ) -> Vec<Vec<u8>> {
        let socket = match open_udp(addr, packet, log) {
            Ok(socket) => socket,
            Err(err) => {
                debug!("UDP query to {} failed: {}", addr, err);
                return Vec::new();
            }
        };

        let mut packets = Vec::new();

        while let Some(datagram) = recv_datagram(&socket, addr) {
            log.received(&datagram);
            packets.push(datagram);

            if max_packets != 0 && packets.len() >= max_packets {
                break;
            }

            thread::sleep(inter_packet_timeout);
        }

        debug!("Received {} packets from {}", packets.len(), addr);
        packets
    }

    fn query_tcp(
        &mut self,
        addr: &Conf,
        packet: &[u8],
        frame_len: FrameLen<'_>,
        log: &mut ExchangeLog,
    ) -> Option<Vec<u8>> {
        let mut socket = match create_tcp_socket(addr) {
            Ok(socket) => socket,
            Err(err) => {
                debug!("TCP connect to {} failed: {}", addr, err);
                return None;
            }
        };

        if let Err(err) = socket.write_all(packet) {
            warn!("TCP write to {} failed: {}", addr, err);
            return None;
        }
        log.sent(packet);

        let mut result = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            if let Some(len) = frame_len(&result) {
                if result.len() >= len {
                    result.truncate(len);
                    log.received(&result);

                    return Some(result);
                }
            }

            match socket.read(&mut chunk) {
                Ok(0) => break,
                Ok(size) => result.extend_from_slice(&chunk[..size]),
                Err(err) => {
                    if !is_timeout(&err) {
                        debug!("TCP read from {} failed: {}", addr, err);
                    }
                    break;
                }
            }
        }

        debug!(
            "Connection to {} ended before a full frame arrived ({} bytes)",
            addr,
            result.len()
        );
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::battlefield::{frame_len, Frame};
    use std::net::TcpListener;

    fn local_conf(port: u16) -> Conf {
        let mut conf = Conf::create_with_port("127.0.0.1", port);
        conf.socket_conf.read_time_out = Some(Duration::from_millis(200));
        conf
    }

    /// Answer the first datagram with `replies`, one datagram each.
    fn udp_server(replies: &'static [&'static [u8]]) -> (u16, thread::JoinHandle<Vec<u8>>) {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let mut bufs = [0u8; 512];
            let (size, peer) = server.recv_from(&mut bufs).unwrap();
            for reply in replies {
                server.send_to(reply, peer).unwrap();
            }
            bufs[..size].to_vec()
        });

        (port, handle)
    }

    /// Accept one connection, read `request_len` bytes, write `reply` and hang up.
    fn tcp_server(request_len: usize, reply: Vec<u8>) -> (u16, thread::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = vec![0u8; request_len];
            stream.read_exact(&mut request).unwrap();
            stream.write_all(&reply).unwrap();
            request
        });

        (port, handle)
    }

    #[test]
    fn udp_datagrams_are_concatenated() {
        let (port, server) = udp_server(&[b"\xFF\xFF\xFF\xFFI", b"rest"]);
        let mut log = ExchangeLog::create();

        let response = NetTransport::create().query(&local_conf(port), b"ping", &mut log);

        assert_eq!(response, Some(b"\xFF\xFF\xFF\xFFIrest".to_vec()));
        assert_eq!(server.join().unwrap(), b"ping");
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn silent_udp_server_is_none() {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();
        let mut log = ExchangeLog::create();

        assert_eq!(NetTransport::create().query(&local_conf(port), b"ping", &mut log), None);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn multi_packet_stops_at_limit() {
        let (port, server) = udp_server(&[b"one", b"two", b"three"]);
        let mut log = ExchangeLog::create();

        let packets = NetTransport::create().query_multi_packet(
            &local_conf(port),
            b"rules",
            2,
            Duration::from_millis(1),
            &mut log,
        );

        assert_eq!(packets, vec![b"one".to_vec(), b"two".to_vec()]);
        assert_eq!(server.join().unwrap(), b"rules");
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn tcp_returns_exactly_one_frame() {
        let request = Frame::request(1, &["serverInfo"]).encode();
        let frame = Frame::request(1, &["OK", "BF4 Server"]).encode();
        let mut reply = frame.clone();
        reply.extend_from_slice(&Frame::request(2, &["player.onJoin"]).encode()[..6]);

        let (port, server) = tcp_server(request.len(), reply);
        let mut log = ExchangeLog::create();

        let response =
            NetTransport::create().query_tcp(&local_conf(port), &request, &frame_len, &mut log);

        assert_eq!(response, Some(frame.clone()));
        assert_eq!(server.join().unwrap(), request);
        assert_eq!(log.entries()[1].bufs, frame);
    }

    #[test]
    fn tcp_close_mid_frame_is_none() {
        let request = Frame::request(1, &["serverInfo"]).encode();
        let frame = Frame::request(1, &["OK", "BF4 Server"]).encode();

        let (port, server) = tcp_server(request.len(), frame[..frame.len() - 3].to_vec());
        let mut log = ExchangeLog::create();

        let response =
            NetTransport::create().query_tcp(&local_conf(port), &request, &frame_len, &mut log);

        assert_eq!(response, None);
        server.join().unwrap();
        assert_eq!(log.len(), 1);
    }
}
