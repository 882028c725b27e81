use chrono::{DateTime, Local};
use std::fmt;

/// 消息的发言方
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Agent,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::User => write!(f, "user"),
            Speaker::Agent => write!(f, "agent"),
        }
    }
}

/// 一条已提交的会话消息
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: u64,
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

/// 会话记录：按提交顺序保存，id 单调递增，部分文本不进这里
#[derive(Debug, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
    next_id: u64,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条消息，返回分配的 id
    pub fn push(&mut self, speaker: Speaker, text: String) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.messages.push(ChatMessage {
            id,
            speaker,
            text,
            timestamp: Local::now(),
        });
        id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic_and_order_preserved() {
        let mut log = ChatLog::new();
        assert!(log.is_empty());

        let a = log.push(Speaker::Agent, "hello".to_string());
        let b = log.push(Speaker::User, "hi".to_string());
        let c = log.push(Speaker::Agent, "how are you".to_string());

        assert_eq!((a, b, c), (0, 1, 2));
        assert_eq!(log.len(), 3);

        let texts: Vec<&str> = log.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["hello", "hi", "how are you"]);
    }

    #[test]
    fn test_timestamps_never_go_backwards() {
        let mut log = ChatLog::new();
        for i in 0..5 {
            log.push(Speaker::User, format!("msg {}", i));
        }
        for pair in log.messages().windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn test_timestamps_carry_local_offset() {
        let mut log = ChatLog::new();
        log.push(Speaker::Agent, "hi".to_string());
        assert_eq!(log.messages()[0].timestamp.offset(), Local::now().offset());
    }

    #[test]
    fn test_speaker_display() {
        assert_eq!(Speaker::User.to_string(), "user");
        assert_eq!(Speaker::Agent.to_string(), "agent");
    }
}
