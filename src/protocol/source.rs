//! Valve [A2S](https://developer.valvesoftware.com/wiki/Server_queries) queries.

use super::arma3;
use crate::{
    reader::PacketReader,
    transport::{
        a2s_request, parse_challenge, ChallengeReply, ExchangeLog, Transport, A2S_HEADER,
        A2S_NO_CHALLENGE,
    },
    Conf, GsqErr, Password, ServerInfo, Value,
};
use std::time::Duration;
use tracing::debug;

pub const A2S_INFO: u8 = 0x54;
pub const A2S_INFO_RESPONSE: u8 = 0x49;
pub const A2S_RULES: u8 = 0x56;
pub const A2S_RULES_RESPONSE: u8 = 0x45;

const INFO_PAYLOAD: &[u8] = b"Source Engine Query\0";
const SPLIT_HEADER: [u8; 4] = [0xFE, 0xFF, 0xFF, 0xFF];
const COMPRESSED_FLAG: u32 = 0x8000_0000;

// Extra data flags trailing the info response.
const EDF_PORT: u8 = 0x80;
const EDF_STEAM_ID: u8 = 0x10;
const EDF_SOURCE_TV: u8 = 0x40;
const EDF_KEYWORDS: u8 = 0x20;
const EDF_GAME_ID: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceConf {
    /// Query port minus game port.
    pub port_delta: i32,
    /// Decode the Arma 3 binary blob hidden in the rules.
    pub arma3_rules: bool,
}

/// A2S_INFO request, with the challenge attached when the server asked for one.
pub fn info_request(token: Option<u32>) -> Vec<u8> {
    let mut packet = [A2S_HEADER.as_slice(), [A2S_INFO].as_slice(), INFO_PAYLOAD].concat();

    if let Some(token) = token {
        packet.extend_from_slice(&token.to_le_bytes());
    }

    packet
}

pub fn query(
    transport: &mut dyn Transport,
    conf: &Conf,
    source_conf: &SourceConf,
    get_players: bool,
    get_rules: bool,
    log: &mut ExchangeLog,
) -> Result<ServerInfo, GsqErr> {
    let addr = conf.shifted(source_conf.port_delta)?;
    let mut info = ServerInfo::create(&conf.host, addr.port);

    let response = request_info(transport, &addr, log)?;
    parse_info(&response, &mut info)?;
    info.online = true;

    if get_players {
        match transport.query_players(&addr, log) {
            Some(players) => info.players = players,
            None => debug!("No player list from {}", addr),
        }
    }

    if get_rules {
        match query_rules(transport, &addr, log) {
            Some(rules) if source_conf.arma3_rules => arma3::apply_rules(rules, &mut info),
            Some(rules) => {
                for (key, value) in rules {
                    info.set_rule(
                        String::from_utf8_lossy(&key).into_owned(),
                        String::from_utf8_lossy(&value).into_owned(),
                    );
                }
            }
            None => debug!("No rules from {}", addr),
        }
    }

    Ok(info)
}

fn request_info(
    transport: &mut dyn Transport,
    addr: &Conf,
    log: &mut ExchangeLog,
) -> Result<Vec<u8>, GsqErr> {
    let no_response = || GsqErr::DataErr(format!("No A2S_INFO response from {}", addr));
    let response = transport
        .query(addr, &info_request(None), log)
        .ok_or_else(no_response)?;

    match parse_challenge(&response, A2S_INFO_RESPONSE) {
        ChallengeReply::Answered => Ok(response),
        ChallengeReply::Token(token) => transport
            .query(addr, &info_request(Some(token)), log)
            .ok_or_else(no_response),
        ChallengeReply::Malformed => Err(GsqErr::DataErr(format!(
            "A2S_INFO response has an invalid header, expected FF FF FF FF 49, got {} bytes",
            response.len()
        ))),
    }
}

/// Decode an A2S_INFO response into `info`.
pub fn parse_info(bufs: &[u8], info: &mut ServerInfo) -> Result<(), GsqErr> {
    let mut reader = PacketReader::create(bufs);

    if reader.read_bytes(4) != Some(A2S_HEADER.as_slice())
        || reader.read_u8() != Some(A2S_INFO_RESPONSE)
    {
        return Err(GsqErr::DataErr(
            "A2S_INFO response should start with FF FF FF FF 49".into(),
        ));
    }

    let truncated = || GsqErr::DataErr("A2S_INFO response is truncated".into());

    let protocol = reader.read_u8().ok_or_else(truncated)?;
    info.servertitle = reader.read_str().ok_or_else(truncated)?;
    info.mapname = reader.read_str().ok_or_else(truncated)?;
    let folder = reader.read_str().ok_or_else(truncated)?;
    info.gamename = reader.read_str().ok_or_else(truncated)?;
    let app_id = reader.read_u16().ok_or_else(truncated)?;
    info.numplayers = reader.read_u8().ok_or_else(truncated)?.into();
    info.maxplayers = reader.read_u8().ok_or_else(truncated)?.into();
    let bots = reader.read_u8().ok_or_else(truncated)?;
    let server_type = reader.read_u8().ok_or_else(truncated)?;
    let environment = reader.read_u8().ok_or_else(truncated)?;
    let visibility = reader.read_u8().ok_or_else(truncated)?;
    let vac = reader.read_u8().ok_or_else(truncated)?;

    info.gametype = folder.clone();
    info.password = Password::from(visibility != 0);
    info.gameversion = reader.read_str().unwrap_or_default();

    info.set_rule("protocol", protocol);
    info.set_rule("gamedir", folder);
    info.set_rule("appid", u32::from(app_id));
    info.set_rule("bots", bots);
    info.set_rule("dedicated", char::from(server_type).to_string());
    info.set_rule("os", char::from(environment).to_string());
    info.set_rule("secure", vac != 0);

    if let Some(edf) = reader.read_u8() {
        parse_extra_data(&mut reader, edf, info);
    }

    Ok(())
}

fn parse_extra_data(reader: &mut PacketReader<'_>, edf: u8, info: &mut ServerInfo) {
    if edf & EDF_PORT != 0 {
        if let Some(port) = reader.read_u16() {
            info.set_rule("port", u32::from(port));
        }
    }

    if edf & EDF_STEAM_ID != 0 {
        if let Some(steam_id) = reader.read_u64() {
            info.set_rule("steamid", steam_id.to_string());
        }
    }

    if edf & EDF_SOURCE_TV != 0 {
        if let (Some(port), Some(name)) = (reader.read_u16(), reader.read_str()) {
            info.set_rule("sourcetv_port", u32::from(port));
            info.set_rule("sourcetv_name", name);
        }
    }

    if edf & EDF_KEYWORDS != 0 {
        if let Some(keywords) = reader.read_str() {
            info.set_rule("keywords", keywords);
        }
    }

    if edf & EDF_GAME_ID != 0 {
        if let Some(game_id) = reader.read_u64() {
            info.set_rule("gameid", steam_id_value(game_id));
        }
    }
}

fn steam_id_value(id: u64) -> Value {
    match i64::try_from(id) {
        Ok(id) => Value::Int(id),
        Err(_) => Value::Str(id.to_string()),
    }
}

/// Raw rule pairs. Keys and values stay bytes, Arma 3 hides binary data in them.
pub type RawRules = Vec<(Vec<u8>, Vec<u8>)>;

fn query_rules(
    transport: &mut dyn Transport,
    addr: &Conf,
    log: &mut ExchangeLog,
) -> Option<RawRules> {
    let response = transport.query(addr, &a2s_request(A2S_RULES, A2S_NO_CHALLENGE), log)?;

    let bufs = match parse_challenge(&response, A2S_RULES_RESPONSE) {
        ChallengeReply::Token(token) => {
            let packets = transport.query_multi_packet(
                addr,
                &a2s_request(A2S_RULES, token),
                0,
                Duration::ZERO,
                log,
            );

            reassemble(packets)?
        }
        ChallengeReply::Answered => response,
        ChallengeReply::Malformed => {
            debug!("Malformed rules challenge reply from {}", addr);
            return None;
        }
    };

    parse_rules(&bufs)
}

/// Join the datagrams of a response. A single `FF FF FF FF` datagram is
/// returned as is; `FE FF FF FF` split datagrams are ordered by their packet
/// number and their payloads concatenated.
pub fn reassemble(packets: Vec<Vec<u8>>) -> Option<Vec<u8>> {
    let first = packets.first()?;

    if first.starts_with(&A2S_HEADER) {
        return packets.into_iter().next();
    }

    let mut parts: Vec<Option<Vec<u8>>> = Vec::new();

    for packet in &packets {
        let mut reader = PacketReader::create(packet);

        if reader.read_bytes(4) != Some(SPLIT_HEADER.as_slice()) {
            debug!("Ignoring datagram without split header");
            continue;
        }

        let id = reader.read_u32()?;
        let total = reader.read_u8()? as usize;
        let number = reader.read_u8()? as usize;
        let _split_size = reader.read_u16()?;

        if id & COMPRESSED_FLAG != 0 {
            debug!("Compressed split responses are not supported");
            return None;
        }

        if parts.is_empty() {
            parts.resize(total, None);
        }

        match parts.get_mut(number) {
            Some(part) => *part = Some(reader.rest().to_vec()),
            None => debug!("Split packet {} out of range ({})", number, total),
        }
    }

    if parts.is_empty() || parts.iter().any(Option::is_none) {
        debug!("Split response incomplete");
        return None;
    }

    Some(parts.into_iter().flatten().flatten().collect())
}

/// Decode an A2S_RULES response. Pairs cut off by the end of the buffer are
/// dropped.
pub fn parse_rules(bufs: &[u8]) -> Option<RawRules> {
    let mut reader = PacketReader::create(bufs);

    if reader.read_bytes(4) != Some(A2S_HEADER.as_slice())
        || reader.read_u8() != Some(A2S_RULES_RESPONSE)
    {
        debug!("Rules response does not start with the A2S_RULES header");
        return None;
    }

    let count = reader.read_u16()?;
    let mut rules = Vec::with_capacity(count as usize);

    for _ in 0..count {
        match (reader.read_cstring(), reader.read_cstring()) {
            (Some(key), Some(value)) => rules.push((key.to_vec(), value.to_vec())),
            _ => break,
        }
    }

    Some(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_bufs(name: &str, map: &str, players: u8, visibility: u8) -> Vec<u8> {
        let mut bufs = vec![0xFF, 0xFF, 0xFF, 0xFF, A2S_INFO_RESPONSE, 17];
        for field in [name, map, "cstrike", "Counter-Strike: Source"] {
            bufs.extend_from_slice(field.as_bytes());
            bufs.push(0);
        }
        bufs.extend_from_slice(&240u16.to_le_bytes());
        bufs.extend_from_slice(&[players, 32, 2, b'd', b'l', visibility, 1]);
        bufs.extend_from_slice(b"1.0.0.71\0");

        bufs
    }

    #[test]
    fn info_request_layout() {
        assert_eq!(
            info_request(None),
            b"\xFF\xFF\xFF\xFFTSource Engine Query\0".to_vec()
        );
        assert!(info_request(Some(0x01020304)).ends_with(&[0x04, 0x03, 0x02, 0x01]));
    }

    #[test]
    fn parse_info_fields() {
        let mut info = ServerInfo::default();
        parse_info(&info_bufs("My Server", "de_dust2", 5, 1), &mut info).unwrap();

        assert_eq!(info.servertitle, "My Server");
        assert_eq!(info.mapname, "de_dust2");
        assert_eq!(info.gamename, "Counter-Strike: Source");
        assert_eq!(info.gametype, "cstrike");
        assert_eq!(info.gameversion, "1.0.0.71");
        assert_eq!(info.numplayers, 5);
        assert_eq!(info.maxplayers, 32);
        assert_eq!(info.password, Password::Protected);
        assert_eq!(info.rules["appid"], Value::Int(240));
        assert_eq!(info.rules["dedicated"], Value::Str("d".into()));
        assert_eq!(info.rules["secure"], Value::Bool(true));
    }

    #[test]
    fn parse_info_extra_data() {
        let mut bufs = info_bufs("edf", "cp_badlands", 0, 0);
        bufs.push(EDF_PORT | EDF_KEYWORDS);
        bufs.extend_from_slice(&27015u16.to_le_bytes());
        bufs.extend_from_slice(b"alltalk,nocrits\0");

        let mut info = ServerInfo::default();
        parse_info(&bufs, &mut info).unwrap();

        assert_eq!(info.password, Password::Open);
        assert_eq!(info.rules["port"], Value::Int(27015));
        assert_eq!(info.rules["keywords"], Value::Str("alltalk,nocrits".into()));
    }

    #[test]
    fn truncated_info_is_an_error() {
        let bufs = info_bufs("My Server", "de_dust2", 5, 0);
        let mut info = ServerInfo::default();

        assert!(parse_info(&bufs[..30], &mut info).is_err());
        assert!(parse_info(b"\xFF\xFF\xFF\xFF\x6D", &mut info).is_err());
    }

    #[test]
    fn rules_parse_and_truncate() {
        let mut bufs = vec![0xFF, 0xFF, 0xFF, 0xFF, A2S_RULES_RESPONSE, 3, 0];
        bufs.extend_from_slice(b"mp_friendlyfire\x000\x00sv_gravity\x00800\x00sv_cheats\x00");

        let rules = parse_rules(&bufs).unwrap();

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1], (b"sv_gravity".to_vec(), b"800".to_vec()));
    }

    #[test]
    fn split_packets_are_reordered() {
        let payload = b"\xFF\xFF\xFF\xFF\x45\x01\x00key\x00value\x00";
        let split = |number: u8, part: &[u8]| {
            let mut packet = SPLIT_HEADER.to_vec();
            packet.extend_from_slice(&7u32.to_le_bytes());
            packet.extend_from_slice(&[2, number]);
            packet.extend_from_slice(&1248u16.to_le_bytes());
            packet.extend_from_slice(part);
            packet
        };

        let bufs = reassemble(vec![split(1, &payload[8..]), split(0, &payload[..8])]).unwrap();
        assert_eq!(bufs, payload);

        assert!(reassemble(vec![split(1, &payload[8..])]).is_none());
        assert!(reassemble(Vec::new()).is_none());
    }

    #[test]
    fn compressed_split_is_rejected() {
        let mut packet = SPLIT_HEADER.to_vec();
        packet.extend_from_slice(&(COMPRESSED_FLAG | 7).to_le_bytes());
        packet.extend_from_slice(&[1, 0, 0xE0, 0x04]);

        assert!(reassemble(vec![packet]).is_none());
    }
}
