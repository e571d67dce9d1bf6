use inkpad_core::AccessLevel;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frames a client sends over the relay socket
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinNotebook {
        notebook_id: Uuid,
    },
    LeaveNotebook {
        notebook_id: Uuid,
    },
    UpdateNote {
        notebook_id: Uuid,
        content: String,
    },
    Draw {
        notebook_id: Uuid,
        #[serde(default)]
        data: serde_json::Value,
    },
    UpdateSketch {
        notebook_id: Uuid,
        data: String,
    },
}

impl ClientEvent {
    pub fn notebook_id(&self) -> Uuid {
        match self {
            ClientEvent::JoinNotebook { notebook_id }
            | ClientEvent::LeaveNotebook { notebook_id }
            | ClientEvent::UpdateNote { notebook_id, .. }
            | ClientEvent::Draw { notebook_id, .. }
            | ClientEvent::UpdateSketch { notebook_id, .. } => *notebook_id,
        }
    }
}

/// Frames the relay sends to a client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    Joined {
        notebook_id: Uuid,
        access: AccessLevel,
    },
    Left {
        notebook_id: Uuid,
    },
    NoteUpdated {
        notebook_id: Uuid,
        content: String,
        from: Uuid,
    },
    Draw {
        notebook_id: Uuid,
        data: serde_json::Value,
        from: Uuid,
    },
    SketchUpdated {
        notebook_id: Uuid,
        data: String,
        from: Uuid,
    },
    /// Sent only to the connection whose request was refused
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_client_events() {
        let id = Uuid::new_v4();
        let join: ClientEvent =
            serde_json::from_value(json!({"event": "join-notebook", "notebookId": id})).unwrap();
        assert_eq!(join, ClientEvent::JoinNotebook { notebook_id: id });

        let note: ClientEvent = serde_json::from_value(
            json!({"event": "update-note", "notebookId": id, "content": "hi"}),
        )
        .unwrap();
        assert_eq!(note.notebook_id(), id);

        let draw: ClientEvent = serde_json::from_value(
            json!({"event": "draw", "notebookId": id, "data": {"x": 1, "y": 2}}),
        )
        .unwrap();
        match draw {
            ClientEvent::Draw { data, .. } => assert_eq!(data["x"], 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_rejected() {
        let id = Uuid::new_v4();
        let parsed =
            serde_json::from_value::<ClientEvent>(json!({"event": "delete", "notebookId": id}));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_server_event_wire_names() {
        let id = Uuid::new_v4();
        let from = Uuid::new_v4();
        let v = serde_json::to_value(ServerEvent::NoteUpdated {
            notebook_id: id,
            content: "hi".into(),
            from,
        })
        .unwrap();
        assert_eq!(v["event"], "note-updated");
        assert_eq!(v["notebookId"], json!(id));
        assert_eq!(v["content"], "hi");

        let v = serde_json::to_value(ServerEvent::SketchUpdated {
            notebook_id: id,
            data: "png".into(),
            from,
        })
        .unwrap();
        assert_eq!(v["event"], "sketch-updated");

        let v = serde_json::to_value(ServerEvent::Joined {
            notebook_id: id,
            access: AccessLevel::Write,
        })
        .unwrap();
        assert_eq!(v["access"], "write");
    }
}
