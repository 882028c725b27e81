use serde::Deserialize;

/// 服务器下发的 JSON 信封，`type` 字段区分消息种类
/// 未知类型解析为 `Unknown`，新消息不会破坏旧客户端
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// 用户语音的实时转写
    Transcription {
        #[serde(default)]
        text: String,
        #[serde(default)]
        is_final: bool,
    },
    /// 咨询师回复：文本和合成语音都是可选的
    AgentResponse {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        audio_data: Option<String>,
        #[serde(default)]
        audio_mime_type: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// 解析失败不算错误，记一条 debug 日志然后丢弃
    pub fn parse(text: &str) -> Option<ServerEvent> {
        match serde_json::from_str(text) {
            Ok(event) => Some(event),
            Err(e) => {
                log::debug!("Ignoring unparseable server message: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_partial_transcription() {
        let event = ServerEvent::parse(r#"{"type":"transcription","text":"hel","is_final":false}"#);
        match event {
            Some(ServerEvent::Transcription { text, is_final }) => {
                assert_eq!(text, "hel");
                assert!(!is_final);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_transcription_defaults() {
        // is_final missing defaults to false
        let event = ServerEvent::parse(r#"{"type":"transcription","text":"hi"}"#);
        assert!(matches!(
            event,
            Some(ServerEvent::Transcription { is_final: false, .. })
        ));
    }

    #[test]
    fn test_parse_agent_response_with_audio() {
        let raw = r#"{
            "type": "agent_response",
            "text": "I hear you.",
            "audio_data": "AAAA",
            "audio_mime_type": "audio/L16;codec=pcm;rate=24000",
            "is_final": true
        }"#;
        match ServerEvent::parse(raw) {
            Some(ServerEvent::AgentResponse {
                text,
                audio_data,
                audio_mime_type,
            }) => {
                assert_eq!(text.as_deref(), Some("I hear you."));
                assert_eq!(audio_data.as_deref(), Some("AAAA"));
                assert_eq!(
                    audio_mime_type.as_deref(),
                    Some("audio/L16;codec=pcm;rate=24000")
                );
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_agent_response_text_only() {
        let event = ServerEvent::parse(r#"{"type":"agent_response","text":"ok"}"#);
        match event {
            Some(ServerEvent::AgentResponse {
                audio_data,
                audio_mime_type,
                ..
            }) => {
                assert!(audio_data.is_none());
                assert!(audio_mime_type.is_none());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_type_is_ignored_not_error() {
        let event = ServerEvent::parse(r#"{"type":"vad_event","energy":0.3}"#);
        assert!(matches!(event, Some(ServerEvent::Unknown)));
    }

    #[test]
    fn test_malformed_json_yields_none() {
        assert!(ServerEvent::parse("not json at all").is_none());
        assert!(ServerEvent::parse(r#"{"type":"#).is_none());
        assert!(ServerEvent::parse("[1,2,3]").is_none());
    }
}
