use thiserror::Error;

/// Errors raised by the tracker library.
///
/// `Network`/`Status` cover failed outbound calls, `Parse`/`Timestamp` cover
/// malformed API payloads, `Config` covers startup configuration problems.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("config error: {0}")]
    Config(String),
}

impl TrackerError {
    /// True for transport failures and non-success responses.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Status { .. })
    }

    /// True for malformed payloads (JSON shape, integers, timestamps).
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Timestamp { .. })
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let parse = TrackerError::Parse("bad".into());
        assert!(parse.is_parse());
        assert!(!parse.is_network());

        let ts = chrono::NaiveDateTime::parse_from_str("nope", "%Y").unwrap_err();
        let err = TrackerError::Timestamp {
            value: "nope".into(),
            source: ts,
        };
        assert!(err.is_parse());

        let cfg = TrackerError::Config("missing".into());
        assert!(!cfg.is_parse() && !cfg.is_network());
        assert_eq!(cfg.to_string(), "config error: missing");
    }

    #[test]
    fn json_errors_map_to_parse() {
        let e = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(TrackerError::from(e).is_parse());
    }
}
