use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not reach {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Http { url: String, status: u16 },
    #[error("could not resolve agent card from {url}: {message}")]
    Resolution { url: String, message: String },
    #[error("unexpected response from {url}: {message}")]
    Protocol { url: String, message: String },
    #[error("remote agent returned JSON-RPC error {code}: {message}")]
    Rpc {
        code: i32,
        message: String,
        data: Option<serde_json::Value>,
    },
}

impl ClientError {
    /// Wraps a transport failure. Timeouts and refused connections are
    /// connection errors; anything else that reqwest reports is a protocol error.
    pub(crate) fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() || error.is_request() {
            ClientError::Connection {
                url: url.to_string(),
                source: error,
            }
        } else if let Some(status) = error.status() {
            ClientError::Http {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            ClientError::Protocol {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }
}
