//! Frostbite remote administration protocol (Battlefield: Bad Company 2,
//! Battlefield 3, Battlefield 4, Battlefield Hardline).
//!
//! Every packet is a frame of three little-endian `u32` (header, total
//! length, word count) followed by the words, each `u32` length + bytes + NUL.

use crate::{
    reader::PacketReader,
    transport::{ExchangeLog, Transport},
    Conf, GsqErr, Password, PlayerRecord, ServerInfo, Value,
};
use tracing::debug;

pub const IS_FROM_CLIENT: u32 = 0x8000_0000;
pub const IS_RESPONSE: u32 = 0x4000_0000;
pub const SEQUENCE_MASK: u32 = 0x3FFF_FFFF;

const HEADER_SIZE: usize = 12;
const PING_UNKNOWN: i64 = 65535;

// serverInfo words after the team scores.
const SERVER_INFO_TAIL: [&str; 13] = [
    "targetscore",
    "onlinestate",
    "ranked",
    "punkbuster",
    "hasgamepassword",
    "serveruptime",
    "roundtime",
    "gameipandport",
    "punkbusterversion",
    "joinqueueenabled",
    "region",
    "closestpingsite",
    "country",
];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BattlefieldConf {
    pub port_delta: i32,
    /// Reported until the `version` command answers.
    pub gamename: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: u32,
    pub words: Vec<String>,
}

impl Frame {
    /// A client-originated request with the given sequence number.
    pub fn request(sequence: u32, words: &[&str]) -> Self {
        Self {
            header: IS_FROM_CLIENT | (sequence & SEQUENCE_MASK),
            words: words.iter().map(|word| word.to_string()).collect(),
        }
    }

    pub fn sequence(&self) -> u32 {
        self.header & SEQUENCE_MASK
    }

    pub fn is_response(&self) -> bool {
        self.header & IS_RESPONSE != 0
    }

    pub fn encode(&self) -> Vec<u8> {
        let body_len: usize = self.words.iter().map(|word| 4 + word.len() + 1).sum();
        let total_len = HEADER_SIZE + body_len;
        let mut bufs = Vec::with_capacity(total_len);

        bufs.extend_from_slice(&self.header.to_le_bytes());
        bufs.extend_from_slice(&(total_len as u32).to_le_bytes());
        bufs.extend_from_slice(&(self.words.len() as u32).to_le_bytes());

        for word in &self.words {
            bufs.extend_from_slice(&(word.len() as u32).to_le_bytes());
            bufs.extend_from_slice(word.as_bytes());
            bufs.push(0);
        }

        bufs
    }

    /// Decode exactly one frame. `bufs` must be the whole frame, no more.
    pub fn decode(bufs: &[u8]) -> Result<Self, GsqErr> {
        let mut reader = PacketReader::create(bufs);
        let invalid = |reason: &str| GsqErr::DataErr(format!("Invalid Frostbite frame: {}", reason));

        let header = reader.read_u32().ok_or_else(|| invalid("short header"))?;
        let total_len = reader.read_u32().ok_or_else(|| invalid("short header"))?;
        let word_count = reader.read_u32().ok_or_else(|| invalid("short header"))?;

        if total_len as usize != bufs.len() {
            return Err(invalid(&format!(
                "length field says {}, frame has {}",
                total_len,
                bufs.len()
            )));
        }

        let mut words = Vec::new();

        for _ in 0..word_count {
            let len = reader.read_u32().ok_or_else(|| invalid("truncated word"))?;
            let word = reader
                .read_bytes(len as usize)
                .ok_or_else(|| invalid("truncated word"))?;

            if reader.read_u8() != Some(0) {
                return Err(invalid("word without terminator"));
            }

            words.push(String::from_utf8_lossy(word).into_owned());
        }

        Ok(Self { header, words })
    }
}

/// Full frame length once the length field has arrived.
pub fn frame_len(bufs: &[u8]) -> Option<usize> {
    let mut reader = PacketReader::create(bufs);
    reader.read_u32()?;

    reader.read_u32().map(|len| len as usize)
}

/// Decoded answer, classified by the command that asked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    ServerInfo(Vec<String>),
    PlayerList(Vec<String>),
    Version(Vec<String>),
    /// Server-originated events and answers to commands not normalized here.
    Other,
}

impl Packet {
    pub fn classify(command: &str, frame: Frame) -> Self {
        if !frame.is_response() {
            return Packet::Other;
        }

        match command {
            "serverInfo" => Packet::ServerInfo(frame.words),
            "listPlayers" => Packet::PlayerList(frame.words),
            "version" => Packet::Version(frame.words),
            _ => Packet::Other,
        }
    }

    pub fn apply(&self, info: &mut ServerInfo) -> Result<(), GsqErr> {
        match self {
            Packet::ServerInfo(words) => apply_server_info(words, info),
            Packet::PlayerList(words) => apply_players(words, info),
            Packet::Version(words) => apply_version(words, info),
            Packet::Other => Ok(()),
        }
    }
}

fn check_status(command: &str, words: &[String]) -> Result<(), GsqErr> {
    match words.first().map(String::as_str) {
        Some("OK") => Ok(()),
        Some(status) => Err(GsqErr::DataErr(format!("{} failed: {}", command, status))),
        None => Err(GsqErr::DataErr(format!("{} returned no words", command))),
    }
}

fn word_value(word: &str) -> Value {
    match word {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::parse_scalar(word),
    }
}

fn apply_server_info(words: &[String], info: &mut ServerInfo) -> Result<(), GsqErr> {
    check_status("serverInfo", words)?;

    let word = |index: usize| {
        words
            .get(index)
            .ok_or_else(|| GsqErr::DataErr(format!("serverInfo is missing word {}", index)))
    };

    info.servertitle = word(1)?.clone();
    info.numplayers = word(2)?.parse()?;
    info.maxplayers = word(3)?.parse()?;
    info.gametype = word(4)?.clone();
    info.mapname = word(5)?.clone();

    info.set_rule("roundsplayed", word_value(word(6)?));
    info.set_rule("roundstotal", word_value(word(7)?));

    // Bounded by the words actually present, whatever the server claims.
    let num_teams = word(8)?.parse::<usize>()?.min(words.len() - 9);
    let scores_end = 9 + num_teams;
    let scores: Vec<Value> = words[9..scores_end].iter().map(|w| word_value(w)).collect();
    info.set_rule("numteams", u32::try_from(num_teams).unwrap_or(u32::MAX));
    info.set_rule("team_scores", scores);

    for (name, word) in SERVER_INFO_TAIL.iter().zip(words.iter().skip(scores_end)) {
        if *name == "hasgamepassword" {
            info.password = Password::from(word == "true");
        }
        info.set_rule(*name, word_value(word));
    }

    Ok(())
}

fn apply_version(words: &[String], info: &mut ServerInfo) -> Result<(), GsqErr> {
    check_status("version", words)?;

    if let Some(game) = words.get(1) {
        info.gamename = game.clone();
    }
    if let Some(version) = words.get(2) {
        info.gameversion = version.clone();
    }

    Ok(())
}

/// `OK`, column count, column names, player count, then the values row by
/// row. Rows cut off by the end of the packet are dropped.
fn apply_players(words: &[String], info: &mut ServerInfo) -> Result<(), GsqErr> {
    check_status("listPlayers", words)?;

    let mut iter = words.iter().skip(1);
    let truncated = || GsqErr::DataErr("listPlayers answer is truncated".into());

    let column_count: usize = iter.next().ok_or_else(truncated)?.parse()?;
    let columns: Vec<&str> = iter.by_ref().take(column_count).map(String::as_str).collect();
    if columns.len() != column_count {
        return Err(truncated());
    }

    let player_count: usize = iter.next().ok_or_else(truncated)?.parse()?;
    let values: Vec<&String> = iter.collect();

    info.players = values
        .chunks_exact(column_count.max(1))
        .take(player_count)
        .map(|row| player_from_row(&columns, row))
        .collect();

    Ok(())
}

fn player_from_row(columns: &[&str], row: &[&String]) -> PlayerRecord {
    let mut player = PlayerRecord::create("");

    for (column, raw) in columns.iter().zip(row) {
        let key = match *column {
            "teamId" => "team",
            column => column,
        };

        let value = match (key, Value::parse_scalar(raw)) {
            ("name", _) => Value::Str(raw.to_string()),
            ("ping", Value::Int(ping)) if ping >= PING_UNKNOWN => Value::Int(0),
            (_, value) => value,
        };

        player.insert(key, value);
    }

    player
}

struct Session<'t, 'l> {
    transport: &'t mut dyn Transport,
    addr: Conf,
    sequence: u32,
    log: &'l mut ExchangeLog,
}

impl Session<'_, '_> {
    fn command(&mut self, words: &[&str]) -> Result<Packet, GsqErr> {
        let command = words.first().copied().unwrap_or_default();
        let request = Frame::request(self.sequence, words);
        self.sequence = self.sequence.wrapping_add(1);

        let bufs = self
            .transport
            .query_tcp(&self.addr, &request.encode(), &frame_len, self.log)
            .ok_or_else(|| GsqErr::DataErr(format!("No answer to {} from {}", command, self.addr)))?;

        let frame = Frame::decode(&bufs)?;
        if !frame.is_response() {
            return Err(GsqErr::DataErr(format!(
                "Answer to {} is not flagged as a response",
                command
            )));
        }

        Ok(Packet::classify(command, frame))
    }
}

pub fn query(
    transport: &mut dyn Transport,
    conf: &Conf,
    bf_conf: &BattlefieldConf,
    get_players: bool,
    _get_rules: bool,
    log: &mut ExchangeLog,
) -> Result<ServerInfo, GsqErr> {
    let addr = conf.shifted(bf_conf.port_delta)?;
    let mut info = ServerInfo::create(&conf.host, addr.port);
    info.gamename = bf_conf.gamename.into();

    let mut session = Session {
        transport,
        addr,
        sequence: 0,
        log,
    };

    session.command(&["serverInfo"])?.apply(&mut info)?;
    info.online = true;

    match session.command(&["version"]) {
        Ok(packet) => {
            if let Err(err) = packet.apply(&mut info) {
                debug!("Ignoring version answer: {}", err);
            }
        }
        Err(err) => debug!("No version: {}", err),
    }

    if get_players {
        match session
            .command(&["listPlayers", "all"])
            .and_then(|packet| packet.apply(&mut info))
        {
            Ok(()) => {}
            Err(err) => debug!("No player list: {}", err),
        }
    }

    Ok(info)
}
