use crate::{conf::Conf, GsqErr, SocketConf};
use std::{
    net::{TcpStream, ToSocketAddrs, UdpSocket},
    time::{SystemTime, UNIX_EPOCH},
};

/// Seconds since the Unix epoch, with sub-second precision.
pub fn get_current_time() -> Result<f64, GsqErr> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs_f64())
}

pub fn create_tcp_socket(conf: &Conf) -> Result<TcpStream, GsqErr> {
    let timeout = conf.socket_conf.write_timeout_or_default();
    let mut last_err = None;

    // Try every resolved address, like `TcpStream::connect` does, but bounded.
    for addr in conf.to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(socket) => {
                socket.set_read_timeout(Some(conf.socket_conf.read_timeout_or_default()))?;
                socket.set_write_timeout(Some(timeout))?;

                return Ok(socket);
            }
            Err(err) => last_err = Some(err),
        }
    }

    Err(match last_err {
        Some(err) => GsqErr::IoErr(err),
        None => GsqErr::DataErr(format!("{} did not resolve to any address", conf)),
    })
}

pub fn create_udp_socket(socket_conf: &SocketConf) -> Result<UdpSocket, GsqErr> {
    let socket = UdpSocket::bind((socket_conf.rep_udp_ipv4, socket_conf.rep_udp_port))?;

    socket.set_read_timeout(Some(socket_conf.read_timeout_or_default()))?;
    socket.set_write_timeout(Some(socket_conf.write_timeout_or_default()))?;

    Ok(socket)
}

/// Render bytes as space separated upper-case hex, e.g. `FF FF 54`.
pub fn bufs_to_hex(bufs: &[u8]) -> String {
    bufs.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether an I/O error only means "nothing more arrived in time".
pub fn is_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_rendering() {
        assert_eq!(bufs_to_hex(&[0xFF, 0x00, 0x54]), "FF 00 54");
        assert_eq!(bufs_to_hex(&[]), "");
    }
}
