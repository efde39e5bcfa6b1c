use crate::{
    protocol::Protocol,
    transport::{ExchangeLog, NetTransport, Transport},
    Conf, GsqErr, ServerInfo,
};
use tracing::{debug, info};

/// A configured server plus the protocol to talk to it with.
///
/// Holds the result of the last query. Each call to [ServerQuery::query_server]
/// starts from a fresh [ServerInfo], so nothing from an earlier call leaks into
/// the next one.
pub struct ServerQuery {
    conf: Conf,
    protocol: Protocol,
    transport: Box<dyn Transport>,
    info: ServerInfo,
}

impl ServerQuery {
    /// Query over the network.
    pub fn create(protocol: Protocol, conf: Conf) -> Self {
        Self::with_transport(protocol, conf, Box::new(NetTransport::create()))
    }

    /// Query over any [Transport], e.g. a [crate::ReplayTransport].
    pub fn with_transport(protocol: Protocol, conf: Conf, transport: Box<dyn Transport>) -> Self {
        let info = ServerInfo::create(&conf.host, conf.port);

        Self {
            conf,
            protocol,
            transport,
            info,
        }
    }

    pub fn conf(&self) -> &Conf {
        &self.conf
    }

    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// Result of the last query.
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Failure reason of the last query, if it failed.
    pub fn errstr(&self) -> Option<&str> {
        self.info.errstr.as_deref()
    }

    /// Run a query and store its result. Returns whether the server answered.
    /// On failure [ServerQuery::info] is offline and carries the reason.
    pub fn query_server(&mut self, get_players: bool, get_rules: bool) -> bool {
        let mut log = ExchangeLog::create();

        self.query_server_logged(get_players, get_rules, &mut log)
    }

    /// [ServerQuery::query_server], recording every packet into `log`.
    pub fn query_server_logged(
        &mut self,
        get_players: bool,
        get_rules: bool,
        log: &mut ExchangeLog,
    ) -> bool {
        match self.fetch_logged(get_players, get_rules, log) {
            Ok(info) => {
                self.info = info;
                true
            }
            Err(err) => {
                let mut info = ServerInfo::create(&self.conf.host, self.conf.port);
                info.errstr = Some(err.to_string());
                self.info = info;
                false
            }
        }
    }

    /// Run a query and hand back the result without storing it.
    pub fn fetch(&mut self, get_players: bool, get_rules: bool) -> Result<ServerInfo, GsqErr> {
        let mut log = ExchangeLog::create();

        self.fetch_logged(get_players, get_rules, &mut log)
    }

    pub fn fetch_logged(
        &mut self,
        get_players: bool,
        get_rules: bool,
        log: &mut ExchangeLog,
    ) -> Result<ServerInfo, GsqErr> {
        debug!(
            "Querying {} as {} (players: {}, rules: {})",
            self.conf,
            self.protocol.name(),
            get_players,
            get_rules
        );

        let result = self.protocol.query(
            self.transport.as_mut(),
            &self.conf,
            get_players,
            get_rules,
            log,
        );

        match &result {
            Ok(info) => info!(
                "{} is online: {} on {} ({}/{})",
                self.conf, info.servertitle, info.mapname, info.numplayers, info.maxplayers
            ),
            Err(err) => info!("{} query failed: {}", self.conf, err),
        }

        result
    }
}

impl std::fmt::Debug for ServerQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerQuery")
            .field("conf", &self.conf)
            .field("protocol", &self.protocol)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{protocol::UNSUPPORTED_MSG, transport::ReplayTransport, ReplayDocument};

    fn replay_query(protocol: Protocol) -> ServerQuery {
        let transport = ReplayTransport::create(&ReplayDocument::default()).unwrap();

        ServerQuery::with_transport(
            protocol,
            Conf::create_with_port("127.0.0.1", 27015),
            Box::new(transport),
        )
    }

    #[test]
    fn unsupported_protocol_fails_cleanly() {
        let mut query = replay_query(Protocol::Unsupported);

        assert!(!query.query_server(true, true));
        assert!(!query.info().online);
        assert_eq!(query.errstr(), Some(UNSUPPORTED_MSG));
    }

    #[test]
    fn silent_server_is_offline() {
        let mut query = replay_query(crate::registry::lookup("css").unwrap().clone());
        let mut log = ExchangeLog::create();

        assert!(!query.query_server_logged(false, false, &mut log));
        assert!(query.errstr().is_some());
        assert_eq!(query.info().address, "127.0.0.1");
        assert_eq!(log.len(), 1);
    }
}
