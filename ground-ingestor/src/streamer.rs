//! Thin wrapper over the upstream streaming WebSocket telemetry source.
//!
//! Grounded in `OpenC3Streamer`/`StreamingWebSocketApi`: connect, subscribe
//! to a packet list, read an indefinite stream of JSON records. Unlike the
//! original's blocking `api.read()` polling loop, this drives the socket
//! as an async stream; the reconnect-on-failure loop lives in `main`.
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use ground_protocol::error::CoreError;

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One record as delivered by the upstream source: `__packet` plus a
/// base64-encoded raw buffer, forwarded verbatim to the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamRecord {
    #[serde(rename = "__packet")]
    pub packet: String,
    pub buffer: String,
    #[serde(default)]
    pub received_time_ns: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    packets: &'a [String],
}

/// Connect and subscribe to `packets`, returning the open socket for the
/// caller to read from.
pub async fn connect_and_subscribe(ws_url: &str, packets: &[String]) -> Result<Socket, CoreError> {
    use futures_util::SinkExt as _;
    use tokio_tungstenite::tungstenite::Message;

    let (mut socket, _) = tokio_tungstenite::connect_async(ws_url)
        .await
        .map_err(|e| CoreError::TransientIo(format!("websocket connect: {e}")))?;

    let subscribe = serde_json::to_string(&SubscribeRequest { packets })
        .map_err(|e| CoreError::Input(format!("serializing subscribe request: {e}")))?;
    socket
        .send(Message::Text(subscribe))
        .await
        .map_err(|e| CoreError::TransientIo(format!("websocket subscribe: {e}")))?;

    Ok(socket)
}

/// Parse one inbound WebSocket text/binary frame into an [`UpstreamRecord`].
/// Returns `None` for control frames the caller should simply skip.
pub fn parse_record(msg: tokio_tungstenite::tungstenite::Message) -> Option<Result<UpstreamRecord, CoreError>> {
    use tokio_tungstenite::tungstenite::Message;
    let text = match msg {
        Message::Text(t) => t,
        Message::Binary(b) => String::from_utf8_lossy(&b).into_owned(),
        _ => return None,
    };
    Some(serde_json::from_str(&text).map_err(|e| CoreError::Input(format!("malformed upstream record: {e}"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_record_round_trips_through_json() {
        let raw = r#"{"__packet":"RAW__TLM__EMULATOR__HEALTH_ADCS_CSS_VECTOR","buffer":"AAA=","received_time_ns":123}"#;
        let rec: UpstreamRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(rec.packet, "RAW__TLM__EMULATOR__HEALTH_ADCS_CSS_VECTOR");
        assert_eq!(rec.received_time_ns, Some(123));
    }

    #[test]
    fn parse_record_rejects_malformed_json() {
        let msg = tokio_tungstenite::tungstenite::Message::Text("not json".to_string());
        assert!(parse_record(msg).unwrap().is_err());
    }
}
