use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Scalar (or list of scalars) carried by players and rules.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Interpret text coming off the wire: integers and decimals become numbers,
    /// everything else stays a string.
    pub fn parse_scalar(text: &str) -> Self {
        if let Ok(int) = text.parse::<i64>() {
            return Value::Int(int);
        }

        match text.parse::<f64>() {
            Ok(float) if text.contains('.') && float.is_finite() => Value::Float(float),
            _ => Value::Str(text.into()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i.into())
    }
}

impl From<u8> for Value {
    fn from(i: u8) -> Self {
        Value::Int(i.into())
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(list: Vec<T>) -> Self {
        Value::List(list.into_iter().map(Into::into).collect())
    }
}

/// One player entry. The key set depends on the protocol, only `name` is
/// guaranteed to be present.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(from = "IndexMap<String, Value>")]
pub struct PlayerRecord(IndexMap<String, Value>);

impl PlayerRecord {
    pub fn create(name: impl Into<String>) -> Self {
        let mut fields = IndexMap::new();
        fields.insert("name".to_string(), Value::Str(name.into()));

        Self(fields)
    }

    pub fn name(&self) -> &str {
        self.0.get("name").and_then(Value::as_str).unwrap_or("")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.0
    }
}

impl From<IndexMap<String, Value>> for PlayerRecord {
    fn from(mut fields: IndexMap<String, Value>) -> Self {
        if !fields.contains_key("name") {
            fields.insert("name".to_string(), Value::Str(String::new()));
        }

        Self(fields)
    }
}

/// Whether joining needs a password.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Password {
    #[default]
    Unknown,
    Protected,
    Open,
}

impl From<bool> for Password {
    fn from(protected: bool) -> Self {
        if protected {
            Password::Protected
        } else {
            Password::Open
        }
    }
}

/// Normalized server status, the same shape for every protocol.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ServerInfo {
    /// Host the query was addressed to.
    pub address: String,
    /// Port the query packets were actually sent to.
    pub queryport: u16,
    pub online: bool,
    pub gamename: String,
    pub gameversion: String,
    pub servertitle: String,
    pub mapname: String,
    pub gametype: String,
    pub numplayers: u32,
    pub maxplayers: u32,
    pub password: Password,
    pub players: Vec<PlayerRecord>,
    pub rules: IndexMap<String, Value>,
    /// Short failure reason, set only when `online` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errstr: Option<String>,
}

impl ServerInfo {
    pub fn create(address: &str, queryport: u16) -> Self {
        Self {
            address: address.into(),
            queryport,
            ..Default::default()
        }
    }

    pub fn set_rule(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.rules.insert(key.into(), value.into());
    }
}

impl std::fmt::Display for ServerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            serde_json::to_string_pretty(self).map_err(|_| std::fmt::Error)?
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_always_has_name() {
        let player: PlayerRecord = serde_json::from_str(r#"{"score": 3}"#).unwrap();

        assert_eq!(player.name(), "");
        assert_eq!(player.get("score"), Some(&Value::Int(3)));
        assert_eq!(player.fields().keys().last().map(String::as_str), Some("name"));
    }

    #[test]
    fn scalar_parsing() {
        assert_eq!(Value::parse_scalar("42"), Value::Int(42));
        assert_eq!(Value::parse_scalar("-7"), Value::Int(-7));
        assert_eq!(Value::parse_scalar("1.5"), Value::Float(1.5));
        assert_eq!(Value::parse_scalar("inf"), Value::Str("inf".into()));
        assert_eq!(Value::parse_scalar("R-38"), Value::Str("R-38".into()));
    }

    #[test]
    fn server_info_json_shape() {
        let mut info = ServerInfo::create("127.0.0.1", 27015);
        info.online = true;
        info.password = Password::Open;
        info.set_rule("mp_timelimit", 30);

        let mut player = PlayerRecord::create("Alice");
        player.insert("score", 12);
        info.players.push(player);

        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["password"], "open");
        assert_eq!(json["players"][0]["name"], "Alice");
        assert_eq!(json["rules"]["mp_timelimit"], 30);
        assert!(json.get("errstr").is_none());

        let back: ServerInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back, info);
    }
}
