//! Protocol shapes. Every game title in the registry is one of these,
//! parametrized by a small config record.

pub mod arma3;
pub mod battlefield;
pub mod quake3;
pub mod source;

pub use battlefield::BattlefieldConf;
pub use quake3::Quake3Conf;
pub use source::SourceConf;

use crate::{transport::ExchangeLog, transport::Transport, Conf, GsqErr, ServerInfo};

/// Reason reported by [Protocol::Unsupported].
pub const UNSUPPORTED_MSG: &str = "this class cannot be used to query a server";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Protocol {
    /// Valve A2S challenge/response datagrams. Arma 3 is this shape with its
    /// binary rules blob enabled.
    Source(SourceConf),
    /// Frostbite length-framed TCP.
    Battlefield(BattlefieldConf),
    /// id Tech 3 `getstatus`.
    Quake3(Quake3Conf),
    /// No wire format attached. Every query fails.
    #[default]
    Unsupported,
}

impl Protocol {
    pub fn name(&self) -> &'static str {
        match self {
            Protocol::Source(conf) if conf.arma3_rules => "arma3",
            Protocol::Source(_) => "source",
            Protocol::Battlefield(_) => "battlefield",
            Protocol::Quake3(_) => "quake3",
            Protocol::Unsupported => "unsupported",
        }
    }

    /// Offset between the game port and the port the query is sent to.
    pub fn port_delta(&self) -> i32 {
        match self {
            Protocol::Source(conf) => conf.port_delta,
            Protocol::Battlefield(conf) => conf.port_delta,
            Protocol::Quake3(conf) => conf.port_delta,
            Protocol::Unsupported => 0,
        }
    }

    /// Run one query against `conf`.
    pub fn query(
        &self,
        transport: &mut dyn Transport,
        conf: &Conf,
        get_players: bool,
        get_rules: bool,
        log: &mut ExchangeLog,
    ) -> Result<ServerInfo, GsqErr> {
        match self {
            Protocol::Source(source_conf) => {
                source::query(transport, conf, source_conf, get_players, get_rules, log)
            }
            Protocol::Battlefield(bf_conf) => {
                battlefield::query(transport, conf, bf_conf, get_players, get_rules, log)
            }
            Protocol::Quake3(q3_conf) => {
                quake3::query(transport, conf, q3_conf, get_players, get_rules, log)
            }
            Protocol::Unsupported => Err(GsqErr::NoImpl(UNSUPPORTED_MSG.into())),
        }
    }
}
