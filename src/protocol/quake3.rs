//! id Tech 3 `getstatus` queries (Quake III Arena, Urban Terror,
//! OpenArena, Wolfenstein: Enemy Territory).

use crate::{
    transport::{ExchangeLog, Transport, A2S_HEADER},
    Conf, GsqErr, Password, PlayerRecord, ServerInfo, Value,
};

const STATUS_REQUEST: &[u8] = b"getstatus\n";
const STATUS_RESPONSE: &[u8] = b"statusResponse\n";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Quake3Conf {
    pub port_delta: i32,
}

pub fn status_request() -> Vec<u8> {
    [A2S_HEADER.as_slice(), STATUS_REQUEST].concat()
}

/// Remove `^N` color codes.
pub fn strip_colors(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '^' && matches!(chars.peek(), Some(next) if *next != '^') {
            chars.next();
            continue;
        }

        result.push(c);
    }

    result
}

/// Decode a `statusResponse` datagram into `info`.
pub fn parse_status(bufs: &[u8], info: &mut ServerInfo) -> Result<(), GsqErr> {
    let body = bufs
        .strip_prefix(A2S_HEADER.as_slice())
        .and_then(|rest| rest.strip_prefix(STATUS_RESPONSE))
        .ok_or_else(|| GsqErr::DataErr("Response is not a statusResponse".into()))?;

    let text = String::from_utf8_lossy(body);
    let mut lines = text.lines();

    let vars = lines.next().unwrap_or_default();
    let mut parts = vars.split('\\').skip(1);

    while let (Some(key), Some(value)) = (parts.next(), parts.next()) {
        info.set_rule(key, Value::Str(value.into()));

        match key.to_ascii_lowercase().as_str() {
            "sv_hostname" => info.servertitle = strip_colors(value),
            "mapname" => info.mapname = value.into(),
            "g_gametype" => info.gametype = value.into(),
            "sv_maxclients" => info.maxplayers = value.parse().unwrap_or_default(),
            "g_needpass" => info.password = Password::from(value == "1"),
            "gamename" => info.gamename = value.into(),
            "version" => info.gameversion = value.into(),
            _ => {}
        }
    }

    info.players = lines.filter_map(parse_player_line).collect();
    info.numplayers = info.players.len() as u32;

    Ok(())
}

/// `score ping "name"`
fn parse_player_line(line: &str) -> Option<PlayerRecord> {
    let mut fields = line.trim().splitn(3, ' ');
    let score: i64 = fields.next()?.parse().ok()?;
    let ping: i64 = fields.next()?.parse().ok()?;
    let name = fields.next().unwrap_or_default().trim_matches('"');

    let mut player = PlayerRecord::create(strip_colors(name));
    player.insert("score", score);
    player.insert("ping", ping);

    Some(player)
}

pub fn query(
    transport: &mut dyn Transport,
    conf: &Conf,
    q3_conf: &Quake3Conf,
    get_players: bool,
    _get_rules: bool,
    log: &mut ExchangeLog,
) -> Result<ServerInfo, GsqErr> {
    let addr = conf.shifted(q3_conf.port_delta)?;
    let mut info = ServerInfo::create(&conf.host, addr.port);

    let response = transport
        .query(&addr, &status_request(), log)
        .ok_or_else(|| GsqErr::DataErr(format!("No statusResponse from {}", addr)))?;

    parse_status(&response, &mut info)?;
    info.online = true;

    if !get_players {
        info.players.clear();
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_response() {
        let bufs = b"\xFF\xFF\xFF\xFFstatusResponse\n\\sv_hostname\\^1Red ^7Arena\\mapname\\q3dm17\\sv_maxclients\\16\\g_needpass\\0\\gamename\\baseq3\n12 48 \"^2Sarge\"\n-1 999 \"Bot Doom\"\n";

        let mut info = ServerInfo::default();
        parse_status(bufs, &mut info).unwrap();

        assert_eq!(info.servertitle, "Red Arena");
        assert_eq!(info.mapname, "q3dm17");
        assert_eq!(info.maxplayers, 16);
        assert_eq!(info.gamename, "baseq3");
        assert_eq!(info.password, Password::Open);
        assert_eq!(info.numplayers, 2);
        assert_eq!(info.players[0].name(), "Sarge");
        assert_eq!(info.players[1].get("score"), Some(&Value::Int(-1)));
        assert_eq!(info.rules["sv_hostname"], Value::Str("^1Red ^7Arena".into()));
    }

    #[test]
    fn wrong_header() {
        let mut info = ServerInfo::default();

        assert!(parse_status(b"\xFF\xFF\xFF\xFFinfoResponse\n", &mut info).is_err());
    }

    #[test]
    fn colors() {
        assert_eq!(strip_colors("^1Red^7Arena"), "RedArena");
        assert_eq!(strip_colors("100%^"), "100%^");
    }
}
