//! Envelope framing and the well-known names.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tokio::io::{AsyncBufReadExt, AsyncBufRead, AsyncWrite, AsyncWriteExt};

pub const SERVICE_NAME: &str = "com.ubuntu.location.Service";
pub const SERVICE_PATH: &str = "/com/ubuntu/location/Service";
pub const SERVICE_INTERFACE: &str = "com.ubuntu.location.Service";
pub const SESSION_INTERFACE: &str = "com.ubuntu.location.Service.Session";
pub const PROVIDER_INTERFACE: &str = "com.ubuntu.location.Service.Provider";

// Structured error names carried in error replies.
pub const ERROR_PERMISSION_DENIED: &str = "com.ubuntu.location.Service.Error.PermissionDenied";
pub const ERROR_NO_PROVIDER: &str = "com.ubuntu.location.Service.Error.NoProviderForCriteria";
pub const ERROR_UNKNOWN_OBJECT: &str = "com.ubuntu.location.Service.Error.UnknownObject";
pub const ERROR_UNKNOWN_METHOD: &str = "com.ubuntu.location.Service.Error.UnknownMethod";
pub const ERROR_INVALID_ARGUMENTS: &str = "com.ubuntu.location.Service.Error.InvalidArguments";
pub const ERROR_FAILED: &str = "com.ubuntu.location.Service.Error.Failed";

/// One message on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Envelope {
    MethodCall {
        id: u64,
        path: String,
        interface: String,
        member: String,
        #[serde(default, skip_serializing_if = "Value::is_null")]
        body: Value,
    },
    MethodReturn {
        id: u64,
        #[serde(default, skip_serializing_if = "Value::is_null")]
        body: Value,
    },
    Error {
        id: u64,
        name: String,
        message: String,
    },
    Signal {
        path: String,
        interface: String,
        member: String,
        #[serde(default, skip_serializing_if = "Value::is_null")]
        body: Value,
    },
}

impl Envelope {
    pub fn method_return(id: u64, body: Value) -> Self {
        Envelope::MethodReturn { id, body }
    }

    pub fn error(id: u64, name: &str, message: impl Into<String>) -> Self {
        Envelope::Error {
            id,
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Writes one envelope as a JSON line.
pub async fn write_envelope<W: AsyncWrite + Unpin>(
    writer: &mut W,
    envelope: &Envelope,
) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(envelope)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

/// Reads one envelope; `None` on a cleanly closed stream. A malformed line
/// is an error on the connection.
pub async fn read_envelope<R: AsyncBufRead + Unpin>(
    reader: &mut R,
) -> std::io::Result<Option<Envelope>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    let envelope = serde_json::from_str(line.trim_end())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(Some(envelope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn envelopes_round_trip_over_a_buffer() {
        let call = Envelope::MethodCall {
            id: 1,
            path: SERVICE_PATH.to_string(),
            interface: SERVICE_INTERFACE.to_string(),
            member: "CreateSessionForCriteria".to_string(),
            body: json!({"criteria": {}}),
        };
        let signal = Envelope::Signal {
            path: "/sessions/abc".to_string(),
            interface: SESSION_INTERFACE.to_string(),
            member: "PositionChanged".to_string(),
            body: Value::Null,
        };

        let mut buffer = Vec::new();
        write_envelope(&mut buffer, &call).await.unwrap();
        write_envelope(&mut buffer, &signal).await.unwrap();

        let mut reader = tokio::io::BufReader::new(buffer.as_slice());
        assert_eq!(read_envelope(&mut reader).await.unwrap(), Some(call));
        assert_eq!(read_envelope(&mut reader).await.unwrap(), Some(signal));
        assert_eq!(read_envelope(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn malformed_lines_error_out() {
        let mut reader = tokio::io::BufReader::new(&b"this is not json\n"[..]);
        assert!(read_envelope(&mut reader).await.is_err());
    }
}
