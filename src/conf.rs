use crate::{registry, GsqErr, ServerQuery};
use std::{
    net::{Ipv4Addr, SocketAddr, ToSocketAddrs},
    time::Duration,
};

/// Port used by [Conf::create], the Source engine default.
pub const DEFAULT_PORT: u16 = 27015;

/// Socket timeout applied when the caller does not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Main struct used for configuring the connection.
#[derive(Debug, Clone)]
pub struct Conf {
    /// Server IP address or a domain name.
    pub host: String,
    /// Server (game) port.
    pub port: u16,
    /// See [SocketConf].
    pub socket_conf: SocketConf,
}

/// Additional socket configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketConf {
    /// Set the read timeout for socket.
    ///
    /// UDP reads keep collecting datagrams until this expires, so it bounds
    /// the duration of every round trip. `None` falls back to [DEFAULT_TIMEOUT].
    pub read_time_out: Option<Duration>,
    /// Set the write timeout for socket.
    pub write_timeout: Option<Duration>,
    /// Specify the local address for UDP sockets.
    /// The default value is [Ipv4Addr::UNSPECIFIED].
    pub rep_udp_ipv4: Ipv4Addr,
    /// Specify the local port for UDP sockets.
    /// The default value is 0, an ephemeral port.
    pub rep_udp_port: u16,
}

impl Default for SocketConf {
    fn default() -> Self {
        Self {
            read_time_out: Some(DEFAULT_TIMEOUT),
            write_timeout: Some(DEFAULT_TIMEOUT),
            rep_udp_ipv4: Ipv4Addr::UNSPECIFIED,
            rep_udp_port: 0,
        }
    }
}

impl SocketConf {
    pub fn read_timeout_or_default(&self) -> Duration {
        self.read_time_out.unwrap_or(DEFAULT_TIMEOUT)
    }

    pub fn write_timeout_or_default(&self) -> Duration {
        self.write_timeout.unwrap_or(DEFAULT_TIMEOUT)
    }
}

impl ToSocketAddrs for Conf {
    type Iter = std::vec::IntoIter<SocketAddr>;

    fn to_socket_addrs(&self) -> std::io::Result<Self::Iter> {
        (&*self.host, self.port).to_socket_addrs()
    }
}

impl std::fmt::Display for Conf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl Conf {
    /// Create a connection configuration using the default port.
    ///
    /// # Examples
    ///
    /// ```
    /// # use gsq::{Conf, SocketConf};
    /// #
    /// let conf = Conf::create("www.example.com");
    /// #
    /// # assert_eq!(conf.host, "www.example.com");
    /// # assert_eq!(conf.port, 27015);
    /// # assert_eq!(conf.socket_conf, SocketConf::default());
    /// ```
    pub fn create(host: &str) -> Self {
        Self::create_with_port(host, DEFAULT_PORT)
    }

    /// Create a connection configuration using the specified port.
    ///
    /// # Example
    ///
    /// ```
    /// # use gsq::Conf;
    /// #
    /// let conf = Conf::create_with_port("www.example.com", 47200);
    /// #
    /// # assert_eq!(conf.port, 47200);
    /// ```
    pub fn create_with_port(host: &str, port: u16) -> Self {
        Self {
            host: host.trim().into(),
            port,
            socket_conf: SocketConf::default(),
        }
    }

    /// Create a connection configuration by using a `host:port` string.
    ///
    /// If the port cannot be converted to [u16], it will return a
    /// [GsqErr::ConfErr] error.
    ///
    /// # Example
    ///
    /// ```
    /// # use gsq::{Conf, GsqErr};
    /// #
    /// # fn main() -> Result<(), GsqErr> {
    ///     let conf = Conf::create_from_str("www.example.com:27015")?;
    /// #
    /// #   assert_eq!(conf.host, "www.example.com");
    /// #   assert_eq!(conf.port, 27015);
    /// #
    /// #   assert!(Conf::create_from_str("27015").is_err());
    /// #   assert!(Conf::create_from_str("www.example.com:-1").is_err());
    /// #   Ok(())
    /// # }
    /// ```
    pub fn create_from_str(addr: &str) -> Result<Self, GsqErr> {
        let (host, port) = match addr.trim().rsplit_once(':') {
            Some((host, port)) if !host.trim().is_empty() => (host.trim(), port.trim()),
            _ => {
                return Err(GsqErr::ConfErr(format!(
                    "Invalid socket address syntax: {}",
                    addr
                )));
            }
        };

        match port.parse::<u16>() {
            Ok(port) => Ok(Self::create_with_port(host, port)),
            Err(_) => Err(GsqErr::ConfErr(format!("Invalid port: {}", port))),
        }
    }

    /// Replace the socket configuration.
    pub fn with_socket_conf(mut self, socket_conf: SocketConf) -> Self {
        self.socket_conf = socket_conf;
        self
    }

    /// Same server, port shifted by `delta`. Used for protocols whose query
    /// port sits at a fixed offset from the game port.
    pub fn shifted(&self, delta: i32) -> Result<Self, GsqErr> {
        let port = i32::from(self.port) + delta;

        match u16::try_from(port) {
            Ok(port) => Ok(Self {
                port,
                ..self.clone()
            }),
            Err(_) => Err(GsqErr::ConfErr(format!(
                "Port {} shifted by {} is out of range",
                self.port, delta
            ))),
        }
    }

    /// Build a query for this server with the protocol registered under `alias`.
    ///
    /// Unknown aliases fail immediately, without touching the network.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use gsq::{Conf, GsqErr};
    ///
    /// fn main() -> Result<(), GsqErr> {
    ///     let mut query = Conf::create_with_port("www.example.com", 27015).query_with("tf2")?;
    ///
    ///     if query.query_server(true, false) {
    ///         println!("{}", query.info());
    ///     }
    ///
    ///     Ok(())
    /// }
    /// ```
    pub fn query_with(&self, alias: &str) -> Result<ServerQuery, GsqErr> {
        registry::create_with_conf(alias, self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_from_str() {
        let conf = Conf::create_from_str("192.168.1.10:2302").unwrap();

        assert_eq!(conf.host, "192.168.1.10");
        assert_eq!(conf.port, 2302);
        assert!(Conf::create_from_str(":2302").is_err());
        assert!(Conf::create_from_str("host:70000").unwrap_err().is_conf());
    }

    #[test]
    fn shifted_port() {
        let conf = Conf::create_with_port("localhost", 2302);

        assert_eq!(conf.shifted(1).unwrap().port, 2303);
        assert!(Conf::create_with_port("localhost", 65535).shifted(1).is_err());
    }
}
