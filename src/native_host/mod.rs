use crate::events::{Effect, IdleState, Signal};
use crate::tracker::{Tracker, UsageSnapshot};
use log::warn;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

/// Presentation of the limit alert, rendered by the extension.
const NOTIFY_TITLE: &str = "WebTime Alert";
const BADGE_ALERT_TEXT: &str = "!";
const BADGE_COLOR: &str = "#d32f2f";

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum IncomingMessage {
    #[serde(rename = "tabActivated")]
    TabActivated {
        #[serde(default)]
        url: Option<String>,
    },
    #[serde(rename = "navigationCompleted")]
    NavigationCompleted { url: String },
    #[serde(rename = "windowFocusChanged")]
    WindowFocusChanged {
        #[serde(default)]
        url: Option<String>,
    },
    #[serde(rename = "idleStateChanged")]
    IdleStateChanged {
        state: IdleState,
        #[serde(default)]
        url: Option<String>,
    },
    #[serde(rename = "getData")]
    GetData,
    #[serde(rename = "setLimit")]
    SetLimit { domain: String, minutes: i64 },
    #[serde(rename = "clearToday")]
    ClearToday,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    #[serde(rename = "data")]
    Data {
        #[serde(flatten)]
        snapshot: UsageSnapshot,
    },
    #[serde(rename = "ok")]
    Ok,
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "notification")]
    Notification { title: String, message: String },
    #[serde(rename = "badge")]
    Badge { text: String, color: String },
}

/// Writer shared between the request loop and the ticker thread; the mutex
/// keeps their frames from interleaving.
pub type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

pub fn shared_writer<W: Write + Send + 'static>(writer: W) -> SharedWriter {
    let boxed: Box<dyn Write + Send> = Box::new(writer);
    Arc::new(Mutex::new(boxed))
}

/// Translate an engine effect into the message the extension acts on.
pub fn effect_message(effect: Effect) -> OutgoingMessage {
    match effect {
        Effect::Notify {
            domain,
            limit_minutes,
        } => OutgoingMessage::Notification {
            title: NOTIFY_TITLE.to_string(),
            message: format!("{} exceeded its limit of {} minutes", domain, limit_minutes),
        },
        Effect::SetAlertBadge => OutgoingMessage::Badge {
            text: BADGE_ALERT_TEXT.to_string(),
            color: BADGE_COLOR.to_string(),
        },
        Effect::ClearBadge => OutgoingMessage::Badge {
            text: String::new(),
            color: BADGE_COLOR.to_string(),
        },
    }
}

pub fn write_message(output: &SharedWriter, message: &OutgoingMessage) -> io::Result<()> {
    let json = serde_json::to_vec(message)?;
    let len = json.len() as u32;

    let mut out = output.lock().unwrap_or_else(|p| p.into_inner());
    // Chrome Native Messaging protocol specifies little-endian byte order
    out.write_all(&len.to_le_bytes())?;
    out.write_all(&json)?;
    out.flush()
}

fn read_frame<R: Read>(input: &mut R) -> io::Result<Vec<u8>> {
    let mut len_bytes = [0u8; 4];
    input.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    // Chrome limits native messaging to 1MB (1024 * 1024 bytes)
    const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
    if len > MAX_MESSAGE_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Message too large: {} bytes (max: {} bytes)", len, MAX_MESSAGE_SIZE),
        ));
    }

    let mut buffer = vec![0u8; len];
    input.read_exact(&mut buffer)?;
    Ok(buffer)
}

pub struct NativeHost {
    tracker: Arc<Tracker>,
}

impl NativeHost {
    pub fn new(tracker: Arc<Tracker>) -> Self {
        Self { tracker }
    }

    /// Serve until the input closes. A frame that fails to decode is
    /// dropped with a warning; only I/O errors end the loop.
    pub fn run<R: Read>(&self, input: &mut R, output: &SharedWriter) -> io::Result<()> {
        loop {
            let frame = read_frame(input)?;
            let message: IncomingMessage = match serde_json::from_slice(&frame) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Dropping undecodable message: {}", e);
                    continue;
                }
            };

            for response in self.handle_message(message) {
                write_message(output, &response)?;
            }
        }
    }

    pub fn handle_message(&self, message: IncomingMessage) -> Vec<OutgoingMessage> {
        match message {
            IncomingMessage::TabActivated { url } => {
                self.dispatch_signal(Signal::TabActivated { url })
            }
            IncomingMessage::NavigationCompleted { url } => {
                self.dispatch_signal(Signal::NavigationCompleted { url })
            }
            IncomingMessage::WindowFocusChanged { url } => {
                self.dispatch_signal(Signal::WindowFocusChanged { url })
            }
            IncomingMessage::IdleStateChanged { state, url } => {
                self.dispatch_signal(Signal::IdleStateChanged { state, url })
            }
            IncomingMessage::GetData => match self.tracker.get_data() {
                Ok((snapshot, effects)) => {
                    let mut responses: Vec<OutgoingMessage> =
                        effects.into_iter().map(effect_message).collect();
                    responses.push(OutgoingMessage::Data { snapshot });
                    responses
                }
                Err(e) => {
                    warn!("Failed to build usage snapshot: {}", e);
                    vec![OutgoingMessage::Error {
                        message: "Failed to load usage data".to_string(),
                    }]
                }
            },
            IncomingMessage::SetLimit { domain, minutes } => {
                match self.tracker.set_limit(&domain, minutes) {
                    Ok(()) => vec![OutgoingMessage::Ok],
                    Err(e) => vec![OutgoingMessage::Error {
                        message: e.to_string(),
                    }],
                }
            }
            IncomingMessage::ClearToday => match self.tracker.clear_today() {
                Ok(()) => vec![OutgoingMessage::Ok],
                Err(e) => vec![OutgoingMessage::Error {
                    message: e.to_string(),
                }],
            },
        }
    }

    /// Storage failures on a signal lose that one update; the next tick or
    /// transition retries with fresh reads.
    fn dispatch_signal(&self, signal: Signal) -> Vec<OutgoingMessage> {
        match self.tracker.handle_signal(&signal) {
            Ok(effects) => effects.into_iter().map(effect_message).collect(),
            Err(e) => {
                warn!("Signal handling failed: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{migrations, Database};
    use serde_json::{json, Value};
    use std::io::Cursor;
    use tempfile::tempdir;

    /// In-memory sink that lets tests read back what the host wrote.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn bytes(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn setup_host() -> (NativeHost, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(&db_path).unwrap();
        migrations::run(db.connection()).unwrap();
        let tracker = Arc::new(Tracker::new(Arc::new(Mutex::new(db))));
        (NativeHost::new(tracker), dir)
    }

    fn frame(value: &Value) -> Vec<u8> {
        let json = serde_json::to_vec(value).unwrap();
        let mut framed = (json.len() as u32).to_le_bytes().to_vec();
        framed.extend_from_slice(&json);
        framed
    }

    fn decode_frames(bytes: &[u8]) -> Vec<Value> {
        let mut cursor = Cursor::new(bytes.to_vec());
        let mut frames = Vec::new();
        while (cursor.position() as usize) < bytes.len() {
            let frame = read_frame(&mut cursor).unwrap();
            frames.push(serde_json::from_slice(&frame).unwrap());
        }
        frames
    }

    #[test]
    fn test_incoming_messages_decode() {
        let msg: IncomingMessage =
            serde_json::from_value(json!({"type": "setLimit", "domain": "youtube.com", "minutes": 30}))
                .unwrap();
        assert!(matches!(
            msg,
            IncomingMessage::SetLimit { ref domain, minutes: 30 } if domain == "youtube.com"
        ));

        // Signals may omit the url entirely
        let msg: IncomingMessage = serde_json::from_value(json!({"type": "tabActivated"})).unwrap();
        assert!(matches!(msg, IncomingMessage::TabActivated { url: None }));

        let msg: IncomingMessage =
            serde_json::from_value(json!({"type": "idleStateChanged", "state": "locked"})).unwrap();
        assert!(matches!(
            msg,
            IncomingMessage::IdleStateChanged { state: IdleState::Locked, url: None }
        ));
    }

    #[test]
    fn test_effect_messages_carry_presentation() {
        let msg = effect_message(Effect::Notify {
            domain: "example.com".to_string(),
            limit_minutes: 5,
        });
        match msg {
            OutgoingMessage::Notification { title, message } => {
                assert_eq!(title, "WebTime Alert");
                assert_eq!(message, "example.com exceeded its limit of 5 minutes");
            }
            other => panic!("Expected notification, got {:?}", other),
        }

        let msg = effect_message(Effect::SetAlertBadge);
        assert!(matches!(
            msg,
            OutgoingMessage::Badge { ref text, ref color } if text == "!" && color == "#d32f2f"
        ));

        let msg = effect_message(Effect::ClearBadge);
        assert!(matches!(msg, OutgoingMessage::Badge { ref text, .. } if text.is_empty()));
    }

    #[test]
    fn test_frame_write_and_read_roundtrip() {
        let buf = SharedBuf::default();
        let writer = shared_writer(buf.clone());

        write_message(&writer, &OutgoingMessage::Ok).unwrap();

        let bytes = buf.bytes();
        let frames = decode_frames(&bytes);
        assert_eq!(frames, vec![json!({"type": "ok"})]);
    }

    #[test]
    fn test_oversized_frame_is_rejected() {
        let mut input = Cursor::new((2 * 1024 * 1024u32).to_le_bytes().to_vec());
        let err = read_frame(&mut input).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_set_limit_and_get_data_over_the_wire() {
        let (host, _dir) = setup_host();
        let buf = SharedBuf::default();
        let writer = shared_writer(buf.clone());

        let mut input = Vec::new();
        input.extend(frame(&json!({"type": "setLimit", "domain": "youtube.com", "minutes": 30})));
        input.extend(frame(&json!({"type": "getData"})));
        let mut input = Cursor::new(input);

        // Input is exhausted after the second frame: a clean shutdown
        let err = host.run(&mut input, &writer).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        let frames = decode_frames(&buf.bytes());
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], json!({"type": "ok"}));
        assert_eq!(frames[1]["type"], "data");
        assert_eq!(frames[1]["limits"]["youtube.com"], 30);
        assert_eq!(frames[1]["usageToday"], json!({}));
    }

    #[test]
    fn test_undecodable_frame_is_dropped_not_fatal() {
        let (host, _dir) = setup_host();
        let buf = SharedBuf::default();
        let writer = shared_writer(buf.clone());

        let mut input = Vec::new();
        let garbage = b"not json at all";
        input.extend((garbage.len() as u32).to_le_bytes());
        input.extend_from_slice(garbage);
        input.extend(frame(&json!({"type": "clearToday"})));
        let mut input = Cursor::new(input);

        let err = host.run(&mut input, &writer).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        // The garbage frame was skipped; clearToday still got its ack
        let frames = decode_frames(&buf.bytes());
        assert_eq!(frames, vec![json!({"type": "ok"})]);
    }

    #[test]
    fn test_deactivation_signal_produces_badge_clear() {
        let (host, _dir) = setup_host();

        let responses = host.handle_message(IncomingMessage::TabActivated {
            url: Some("https://www.example.com/".to_string()),
        });
        assert!(responses.is_empty());

        let responses = host.handle_message(IncomingMessage::WindowFocusChanged { url: None });
        assert_eq!(responses.len(), 1);
        assert!(matches!(
            responses[0],
            OutgoingMessage::Badge { ref text, .. } if text.is_empty()
        ));
    }

    #[test]
    fn test_invalid_set_limit_reports_error() {
        let (host, _dir) = setup_host();

        let responses = host.handle_message(IncomingMessage::SetLimit {
            domain: "   ".to_string(),
            minutes: 5,
        });
        assert_eq!(responses.len(), 1);
        assert!(matches!(responses[0], OutgoingMessage::Error { .. }));
    }
}
