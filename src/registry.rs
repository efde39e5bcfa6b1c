//! Game aliases and the protocol each one speaks.

use crate::{
    protocol::{BattlefieldConf, Protocol, Quake3Conf, SourceConf},
    Conf, GsqErr, ServerQuery,
};

const fn source(port_delta: i32) -> Protocol {
    Protocol::Source(SourceConf {
        port_delta,
        arma3_rules: false,
    })
}

const fn battlefield(gamename: &'static str) -> Protocol {
    Protocol::Battlefield(BattlefieldConf {
        port_delta: 0,
        gamename,
    })
}

const QUAKE3: Protocol = Protocol::Quake3(Quake3Conf { port_delta: 0 });

const ARMA3: Protocol = Protocol::Source(SourceConf {
    port_delta: 1,
    arma3_rules: true,
});

static PROTOCOLS: &[(&str, Protocol)] = &[
    ("source", source(0)),
    ("Source", source(0)),
    ("halflife", source(0)),
    ("hl2dm", source(0)),
    ("cstrike", source(0)),
    ("css", source(0)),
    ("csgo", source(0)),
    ("cs2", source(0)),
    ("tf2", source(0)),
    ("dods", source(0)),
    ("l4d", source(0)),
    ("l4d2", source(0)),
    ("gmod", source(0)),
    ("garrysmod", source(0)),
    ("insurgency", source(0)),
    ("rust", source(0)),
    ("ark", source(0)),
    ("squad", source(0)),
    ("7d2d", source(0)),
    ("unturned", source(1)),
    ("valheim", source(1)),
    ("arma3", ARMA3),
    ("Arma3", ARMA3),
    ("bfbc2", battlefield("bfbc2")),
    ("bf3", battlefield("bf3")),
    ("bf4", battlefield("bf4")),
    ("bfh", battlefield("bfh")),
    ("Battlefield3", battlefield("bf3")),
    ("Battlefield4", battlefield("bf4")),
    ("quake3", QUAKE3),
    ("q3a", QUAKE3),
    ("openarena", QUAKE3),
    ("urbanterror", QUAKE3),
    ("wolfet", QUAKE3),
];

/// Every registered alias, in registration order.
pub fn aliases() -> impl Iterator<Item = &'static str> {
    PROTOCOLS.iter().map(|(alias, _)| *alias)
}

/// Resolve an alias. An exact match wins, then a case-insensitive one.
pub fn lookup(alias: &str) -> Result<&'static Protocol, GsqErr> {
    PROTOCOLS
        .iter()
        .find(|(name, _)| *name == alias)
        .or_else(|| {
            PROTOCOLS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(alias))
        })
        .map(|(_, protocol)| protocol)
        .ok_or_else(|| GsqErr::ConfErr(format!("Unknown protocol: {}", alias)))
}

/// Query for `host:port` with the protocol registered under `alias`.
pub fn create(alias: &str, host: &str, port: u16) -> Result<ServerQuery, GsqErr> {
    create_with_conf(alias, Conf::create_with_port(host, port))
}

pub fn create_with_conf(alias: &str, conf: Conf) -> Result<ServerQuery, GsqErr> {
    let protocol = lookup(alias)?;

    Ok(ServerQuery::create(protocol.clone(), conf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive_after_exact() {
        assert_eq!(lookup("tf2").unwrap().name(), "source");
        assert_eq!(lookup("ARMA3").unwrap().port_delta(), 1);
        assert_eq!(lookup("BF4").unwrap().name(), "battlefield");
        assert_eq!(lookup("UrbanTerror").unwrap().name(), "quake3");
    }

    #[test]
    fn unknown_alias() {
        let err = lookup("pong").unwrap_err();

        assert!(err.is_conf());
        assert_eq!(err.to_string(), "Unknown protocol: pong");
        assert!(create("pong", "localhost", 27015).is_err());
    }

    #[test]
    fn every_alias_resolves() {
        for alias in aliases() {
            assert!(lookup(alias).is_ok(), "{}", alias);
        }
    }
}
