// Verify the attach-channel wire format matches what terminal clients expect.

use shellcast_protocol::{ClientFrame, ServerFrame};

#[test]
fn replay_is_first_frame_shape() {
    let frame = ServerFrame::Replay {
        data: "previous output".to_string(),
    };
    let json = serde_json::to_string(&frame).unwrap();
    assert!(json.contains(r#""type":"replay""#));
    assert!(json.contains(r#""data":"previous output""#));
}

#[test]
fn output_frame_shape() {
    let frame = ServerFrame::Output {
        data: "ls\n".to_string(),
    };
    let json = serde_json::to_string(&frame).unwrap();
    assert!(json.contains(r#""type":"output""#));
}

#[test]
fn input_frame_parses_from_client_json() {
    let json = r#"{"type":"input","data":"echo hi\n"}"#;
    let frame: ClientFrame = serde_json::from_str(json).unwrap();
    match frame {
        ClientFrame::Input { data } => assert_eq!(data, "echo hi\n"),
        _ => panic!("expected input frame"),
    }
}

#[test]
fn resize_frame_parses_from_client_json() {
    let json = r#"{"type":"resize","cols":100,"rows":40}"#;
    let frame: ClientFrame = serde_json::from_str(json).unwrap();
    match frame {
        ClientFrame::Resize { cols, rows } => {
            assert_eq!(cols, 100);
            assert_eq!(rows, 40);
        }
        _ => panic!("expected resize frame"),
    }
}

#[test]
fn server_frames_never_deserialize_as_client_frames() {
    let json = r#"{"type":"replay","data":"x"}"#;
    let result: Result<ClientFrame, _> = serde_json::from_str(json);
    assert!(result.is_err());
}
