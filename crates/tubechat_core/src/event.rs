use serde::Deserialize;

/// Prefix marking an event line in the chat stream.
pub const EVENT_PREFIX: &str = "data:";

/// One retrieved passage backing an assistant answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(
        default,
        rename = "score",
        alias = "relevance_score",
        alias = "relevanceScore"
    )]
    pub relevance_score: f64,
    #[serde(default)]
    pub title: Option<String>,
}

/// A decoded chat stream event.
///
/// Event types this client does not know about decode as [`StreamEvent::Unknown`]
/// and are dropped by the decoder.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Text {
        #[serde(default)]
        content: String,
    },
    Sources {
        #[serde(default)]
        sources: Vec<Source>,
    },
    Done {
        #[serde(default)]
        thread_id: Option<String>,
        /// Full answer text; informational only.
        #[serde(default)]
        content: Option<String>,
    },
    Error {
        #[serde(default)]
        content: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Event(StreamEvent),
    /// Not an event line (blank, comment, other field).
    Ignored,
    Malformed { payload: String, reason: String },
}

/// Parses a single complete line of the chat stream.
pub fn parse_event_line(line: &str) -> ParsedLine {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let Some(payload) = line.strip_prefix(EVENT_PREFIX) else {
        return ParsedLine::Ignored;
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.trim().is_empty() {
        return ParsedLine::Ignored;
    }
    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => ParsedLine::Event(event),
        Err(err) => ParsedLine::Malformed {
            payload: payload.to_string(),
            reason: err.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_event_with_extra_fields() {
        let parsed = parse_event_line(r#"data: {"type":"text","content":"hi ","is_complete":false}"#);
        assert_eq!(
            parsed,
            ParsedLine::Event(StreamEvent::Text {
                content: "hi ".to_string()
            })
        );
    }

    #[test]
    fn accepts_prefix_without_space_and_crlf() {
        let parsed = parse_event_line("data:{\"type\":\"done\",\"thread_id\":\"t-1\"}\r");
        assert_eq!(
            parsed,
            ParsedLine::Event(StreamEvent::Done {
                thread_id: Some("t-1".to_string()),
                content: None,
            })
        );
    }

    #[test]
    fn source_score_aliases() {
        let parsed = parse_event_line(
            r#"data: {"type":"sources","sources":[{"url":"u","content":"c","score":0.5},{"url":"v","content":"d","relevance_score":0.25,"title":"T"}]}"#,
        );
        let ParsedLine::Event(StreamEvent::Sources { sources }) = parsed else {
            panic!("expected sources event");
        };
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].relevance_score, 0.5);
        assert_eq!(sources[1].relevance_score, 0.25);
        assert_eq!(sources[1].title.as_deref(), Some("T"));
    }

    #[test]
    fn unknown_types_and_foreign_lines() {
        assert_eq!(
            parse_event_line(r#"data: {"type":"queries_generated","queries":["a"]}"#),
            ParsedLine::Event(StreamEvent::Unknown)
        );
        assert_eq!(parse_event_line(""), ParsedLine::Ignored);
        assert_eq!(parse_event_line(": keep-alive"), ParsedLine::Ignored);
        assert_eq!(parse_event_line("event: message"), ParsedLine::Ignored);
        assert_eq!(parse_event_line("data: "), ParsedLine::Ignored);
    }

    #[test]
    fn broken_json_is_malformed() {
        match parse_event_line(r#"data: {"type":"text","content":"#) {
            ParsedLine::Malformed { payload, .. } => {
                assert_eq!(payload, r#"{"type":"text","content":"#)
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
