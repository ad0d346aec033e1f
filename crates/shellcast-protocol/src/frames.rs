use serde::{Deserialize, Serialize};

/// Server → client frame sent on the attach WebSocket.
///
/// `Replay` carries the scrollback buffer and is sent at most once, as the
/// first frame after a successful attach. `Output` carries live PTY bytes
/// and is sent zero or more times thereafter.
/// Wire: `{"type":"replay","data":"..."}` / `{"type":"output","data":"..."}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Replay { data: String },
    Output { data: String },
}

/// Client → server frame sent on the attach WebSocket.
/// Wire: `{"type":"input","data":"..."}` / `{"type":"resize","cols":N,"rows":M}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Input { data: String },
    Resize { cols: u16, rows: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_frame_wire_shape() {
        let frame = ServerFrame::Replay {
            data: "hello".to_string(),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json, serde_json::json!({"type": "replay", "data": "hello"}));
    }

    #[test]
    fn output_frame_wire_shape() {
        let frame = ServerFrame::Output {
            data: "hi\n".to_string(),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json, serde_json::json!({"type": "output", "data": "hi\n"}));
    }

    #[test]
    fn input_frame_round_trip() {
        let json = r#"{"type":"input","data":"echo hi\n"}"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();
        assert_eq!(
            frame,
            ClientFrame::Input {
                data: "echo hi\n".to_string()
            }
        );
    }

    #[test]
    fn resize_frame_round_trip() {
        let json = r#"{"type":"resize","cols":80,"rows":24}"#;
        let frame: ClientFrame = serde_json::from_str(json).unwrap();
        assert_eq!(frame, ClientFrame::Resize { cols: 80, rows: 24 });
    }

    #[test]
    fn unknown_client_frame_type_is_rejected() {
        let json = r#"{"type":"ping"}"#;
        let result: Result<ClientFrame, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
