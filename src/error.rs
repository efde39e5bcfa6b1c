/// Gsq uniform error definition.
#[derive(Debug, thiserror::Error)]
pub enum GsqErr {
    /// Unintended errors occur when processing data, such as a malformed
    /// or truncated response packet.
    #[error("{0}")]
    DataErr(String),
    /// Internal errors sent, including type conversion, string analysis, etc.
    #[error("{0}")]
    InternalErr(String),
    /// Misconfiguration by the caller: unknown protocol alias, invalid address
    /// string, undecodable replay fixture.
    #[error("{0}")]
    ConfErr(String),
    /// Unimplemented features.
    #[error("{0}")]
    NoImpl(String),
    /// Handling errors that occur during sockets.
    #[error("{0}")]
    IoErr(#[from] std::io::Error),
}

impl GsqErr {
    /// Whether the error signals misconfiguration rather than a network or
    /// protocol condition.
    pub fn is_conf(&self) -> bool {
        matches!(self, GsqErr::ConfErr(_))
    }
}

impl From<std::time::SystemTimeError> for GsqErr {
    fn from(err: std::time::SystemTimeError) -> Self {
        GsqErr::InternalErr(err.to_string())
    }
}

impl From<std::num::ParseIntError> for GsqErr {
    fn from(err: std::num::ParseIntError) -> Self {
        GsqErr::InternalErr(err.to_string())
    }
}

impl From<base64::DecodeError> for GsqErr {
    fn from(err: base64::DecodeError) -> Self {
        GsqErr::ConfErr(format!("Invalid base64 in capture: {}", err))
    }
}

impl From<serde_json::Error> for GsqErr {
    fn from(err: serde_json::Error) -> Self {
        GsqErr::ConfErr(format!("Invalid replay document: {}", err))
    }
}
