//! Arma 3 binary rules. The server splits an escaped blob over rules whose
//! keys are two raw bytes, the 1-based chunk index and the chunk count.

use super::source::RawRules;
use crate::{reader::PacketReader, ServerInfo, Value};
use tracing::debug;

/// DLC names in bit order of the two DLC bytes.
pub const DLC_NAMES: [&str; 12] = [
    "Karts",
    "Marksmen",
    "Helicopters",
    "Zeus",
    "Apex",
    "Jets",
    "Laws of War",
    "Malden",
    "Tac-Ops",
    "Tanks",
    "Contact",
    "Enoch",
];

const ESCAPE: u8 = 0x01;
const MIN_BLOB_LEN: usize = 8;
// Chunk counts above this would collide with printable rule names.
const MAX_CHUNKS: u8 = 0x20;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Arma3Mod {
    pub hash: u32,
    pub dlc: bool,
    pub steam_id: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Arma3Rules {
    pub dlcs: Vec<&'static str>,
    pub third_person: u8,
    pub advanced_flight_mode: u8,
    pub difficulty_ai: u8,
    pub difficulty_level: u8,
    pub crosshair: u8,
    pub mods: Vec<Arma3Mod>,
    pub signatures: Vec<String>,
}

impl Arma3Rules {
    /// Flatten into `info.rules`. Mods become parallel lists.
    pub fn apply(&self, info: &mut ServerInfo) {
        info.set_rule("dlcs", self.dlcs.clone());
        info.set_rule("3rd_person", self.third_person);
        info.set_rule("advanced_flight_mode", self.advanced_flight_mode);
        info.set_rule("difficulty_ai", self.difficulty_ai);
        info.set_rule("difficulty_level", self.difficulty_level);
        info.set_rule("crosshair", self.crosshair);

        info.set_rule(
            "mods",
            self.mods.iter().map(|m| m.name.clone()).collect::<Vec<_>>(),
        );
        info.set_rule(
            "mod_hashes",
            self.mods
                .iter()
                .map(|m| format!("{:08x}", m.hash))
                .collect::<Vec<_>>(),
        );
        info.set_rule(
            "mod_steam_ids",
            self.mods.iter().map(|m| m.steam_id).collect::<Vec<_>>(),
        );
        info.set_rule(
            "mod_dlc",
            self.mods.iter().map(|m| m.dlc).collect::<Vec<_>>(),
        );
        info.set_rule("signatures", self.signatures.clone());
    }
}

fn is_chunk_key(key: &[u8]) -> bool {
    matches!(key, [index, total] if *total < MAX_CHUNKS && *index > 0 && index <= total)
}

/// Undo the blob escaping: `01 01` is `01`, `01 02` is `00`, `01 03` is `FF`.
/// Any other byte after `01` leaves both bytes untouched.
pub fn unescape(bufs: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(bufs.len());
    let mut iter = bufs.iter().copied().peekable();

    while let Some(byte) = iter.next() {
        if byte != ESCAPE {
            result.push(byte);
            continue;
        }

        let replacement = match iter.peek() {
            Some(0x01) => Some(0x01),
            Some(0x02) => Some(0x00),
            Some(0x03) => Some(0xFF),
            _ => None,
        };

        match replacement {
            Some(unescaped) => {
                result.push(unescaped);
                iter.next();
            }
            None => result.push(byte),
        }
    }

    result
}

/// Decode an escaped rules blob. Returns `None` when it is too short to
/// carry the fixed header. A blob cut off inside the mod or signature lists
/// keeps whatever was complete.
pub fn decode_rules_blob(bufs: &[u8]) -> Option<Arma3Rules> {
    let bufs = unescape(bufs);

    if bufs.len() < MIN_BLOB_LEN {
        debug!("Arma 3 rules blob too short ({} bytes)", bufs.len());
        return None;
    }

    let mut reader = PacketReader::create(&bufs);
    let mut rules = Arma3Rules::default();

    let dlc_low = reader.read_u8()?;
    let dlc_high = reader.read_u8()?;
    let dlc_mask = u16::from(dlc_low) | u16::from(dlc_high) << 8;

    rules.dlcs = DLC_NAMES
        .iter()
        .enumerate()
        .filter(|(bit, _)| dlc_mask & (1 << bit) != 0)
        .map(|(_, name)| *name)
        .collect();

    let difficulty = reader.read_u8()?;
    rules.third_person = difficulty >> 7;
    rules.advanced_flight_mode = (difficulty >> 6) & 1;
    rules.difficulty_ai = (difficulty >> 3) & 0b111;
    rules.difficulty_level = difficulty & 1;
    rules.crosshair = reader.read_u8()?;

    let mod_count = reader.read_u8()?;
    for _ in 0..mod_count {
        match read_mod(&mut reader) {
            Some(m) => rules.mods.push(m),
            None => {
                debug!("Arma 3 mod list truncated after {}", rules.mods.len());
                return Some(rules);
            }
        }
    }

    let signature_count = reader.read_u8().unwrap_or(0);
    for _ in 0..signature_count {
        let signature = reader
            .read_u8()
            .and_then(|len| reader.read_bytes(len as usize));

        match signature {
            Some(signature) => rules
                .signatures
                .push(String::from_utf8_lossy(signature).into_owned()),
            None => break,
        }
    }

    Some(rules)
}

fn read_mod(reader: &mut PacketReader<'_>) -> Option<Arma3Mod> {
    let hash = reader.read_u32_be()?;
    let info = reader.read_u8()?;
    let steam_id = reader.read_u32_be()?;
    let name_len = reader.read_u8()?;
    let name = reader.read_bytes(name_len as usize)?;

    Some(Arma3Mod {
        hash,
        dlc: info & 0x0F != 0,
        steam_id,
        name: String::from_utf8_lossy(name).into_owned(),
    })
}

/// Separate blob chunks from plain rules and join the chunks by index.
pub fn split_rules(rules: RawRules) -> (Option<Vec<u8>>, Vec<(String, String)>) {
    let mut chunks = Vec::new();
    let mut plain = Vec::new();

    for (key, value) in rules {
        if is_chunk_key(&key) {
            chunks.push((key[0], value));
        } else {
            plain.push((
                String::from_utf8_lossy(&key).into_owned(),
                String::from_utf8_lossy(&value).into_owned(),
            ));
        }
    }

    if chunks.is_empty() {
        return (None, plain);
    }

    chunks.sort_by_key(|(index, _)| *index);
    let blob = chunks.into_iter().flat_map(|(_, value)| value).collect();

    (Some(blob), plain)
}

/// Store A2S rules on `info`, decoding the binary blob when present.
pub fn apply_rules(rules: RawRules, info: &mut ServerInfo) {
    let (blob, plain) = split_rules(rules);

    for (key, value) in plain {
        info.set_rule(key, Value::Str(value));
    }

    if let Some(decoded) = blob.as_deref().and_then(decode_rules_blob) {
        decoded.apply(info);
    }
}
