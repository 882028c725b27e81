use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use std::sync::mpsc as std_mpsc;
use tokio::sync::mpsc;

use crate::audio::playback::{PlayerCommand, PlayerEvent};
use crate::net_link::{NetCommand, NetEvent};
use crate::protocol::ServerEvent;
use crate::state_machine::SessionState;
use crate::transcript::{ChatLog, Speaker};
use crate::user::UserProfile;

/// 会话开场白，与后端的欢迎语保持一致
const WELCOME_TEXT: &str =
    "Hello! I'm here to listen and support you. Feel free to share whatever is on your mind.";

/// 会话控制器：持有会话记录和外发闸门，把服务器消息分发到
/// 会话记录和播放线程。所有方法都在主事件循环里调用
pub struct SessionController {
    state: SessionState,
    connected: bool,
    muted: bool,
    playing: bool,
    partial_user_text: String,
    partial_agent_text: String,
    log: ChatLog,
    net_tx: mpsc::Sender<NetCommand>,
    player_tx: std_mpsc::Sender<PlayerCommand>,
}

impl SessionController {
    pub fn new(
        net_tx: mpsc::Sender<NetCommand>,
        player_tx: std_mpsc::Sender<PlayerCommand>,
        user: Option<&UserProfile>,
    ) -> Self {
        let mut controller = Self {
            state: SessionState::Idle,
            connected: false,
            muted: false,
            playing: false,
            partial_user_text: String::new(),
            partial_agent_text: String::new(),
            log: ChatLog::new(),
            net_tx,
            player_tx,
        };
        match user {
            Some(user) => log::info!("Session for {} <{}>", user.name, user.email),
            None => log::info!("Anonymous session"),
        }
        // 开场白直接进会话记录，后端不会重发
        controller.commit(Speaker::Agent, WELCOME_TEXT.to_string());
        controller
    }

    pub fn handle_net_event(&mut self, event: NetEvent) {
        match event {
            NetEvent::Connected => {
                log::info!("WebSocket Connected");
                self.connected = true;
                self.set_state(SessionState::Idle);
            }
            NetEvent::Disconnected => {
                log::warn!("WebSocket Disconnected, capture frames will be dropped");
                self.connected = false;
                self.set_state(SessionState::Disconnected);
            }
            NetEvent::Text(text) => {
                if let Some(event) = ServerEvent::parse(&text) {
                    self.apply_server_event(event);
                }
            }
        }
    }

    /// 应用一条服务器消息
    pub fn apply_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Transcription { text, is_final } => {
                // 转写总是覆盖部分文本槽，最终版才进会话记录
                self.partial_user_text = text;
                if is_final {
                    let text = std::mem::take(&mut self.partial_user_text);
                    self.commit(Speaker::User, text);
                }
            }
            ServerEvent::AgentResponse {
                text,
                audio_data,
                audio_mime_type,
            } => {
                if let Some(text) = text {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        self.commit(Speaker::Agent, trimmed.to_string());
                        // 完整回复提交后清空咨询师的部分文本槽
                        self.partial_agent_text.clear();
                    }
                }
                if let Some(encoded) = audio_data {
                    self.dispatch_agent_audio(&encoded, audio_mime_type);
                }
            }
            ServerEvent::Unknown => {}
        }
    }

    /// 采集帧只在连接打开且未静音时外发，否则直接丢弃
    pub async fn handle_capture_frame(&mut self, frame: Bytes) {
        if !self.connected || self.muted {
            return;
        }
        if self.state == SessionState::Idle {
            self.set_state(SessionState::Listening);
        }
        if let Err(e) = self.net_tx.send(NetCommand::SendFrame(frame)).await {
            log::warn!("Net channel closed, dropping capture frame: {}", e);
        }
    }

    pub fn handle_player_event(&mut self, event: PlayerEvent) {
        match event {
            PlayerEvent::Started => {
                self.playing = true;
                self.set_state(SessionState::Speaking);
            }
            PlayerEvent::Finished => {
                self.playing = false;
                self.end_speaking();
            }
            PlayerEvent::Failed(e) => {
                self.playing = false;
                log::error!("Agent audio playback failed: {}", e);
                self.end_speaking();
            }
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        if self.muted != muted {
            self.muted = muted;
            log::info!("Microphone {}", if muted { "muted" } else { "unmuted" });
        }
    }

    pub fn set_volume(&self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        log::info!("Playback volume set to {:.2}", volume);
        let _ = self.player_tx.send(PlayerCommand::SetVolume(volume));
    }

    /// 打断当前正在播放的咨询师语音
    pub fn stop_playback(&self) {
        let _ = self.player_tx.send(PlayerCommand::Stop);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn partial_text(&self) -> &str {
        &self.partial_user_text
    }

    pub fn agent_partial_text(&self) -> &str {
        &self.partial_agent_text
    }

    pub fn transcript(&self) -> &ChatLog {
        &self.log
    }

    /// base64 载荷解码后交给播放线程，空载荷和坏载荷只记日志
    fn dispatch_agent_audio(&mut self, encoded: &str, mime: Option<String>) {
        match BASE64.decode(encoded) {
            Ok(data) if !data.is_empty() => {
                let _ = self.player_tx.send(PlayerCommand::Play { data, mime });
            }
            Ok(_) => log::debug!("Empty agent audio payload"),
            Err(e) => log::warn!("Agent audio is not valid base64: {}", e),
        }
    }

    fn commit(&mut self, speaker: Speaker, text: String) {
        log::info!("[{}] {}", speaker, text);
        self.log.push(speaker, text);
    }

    fn end_speaking(&mut self) {
        if self.state == SessionState::Speaking {
            self.set_state(if self.connected {
                SessionState::Idle
            } else {
                SessionState::Disconnected
            });
        }
    }

    fn set_state(&mut self, next: SessionState) {
        if self.state != next {
            log::info!("Session state: {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}
