use crate::config::Config;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

#[derive(Debug)]
pub enum NetEvent {
    Text(String),
    Connected,
    Disconnected,
}

#[derive(Debug)]
pub enum NetCommand {
    /// 一帧编码好的采集音频，走二进制消息
    SendFrame(Bytes),
    /// 主动关闭连接并结束网络任务
    Shutdown,
}

pub struct NetLink {
    config: Config,
    tx: mpsc::Sender<NetEvent>,
    rx_cmd: mpsc::Receiver<NetCommand>,
}

impl NetLink {
    pub fn new(
        config: Config,
        tx: mpsc::Sender<NetEvent>,
        rx_cmd: mpsc::Receiver<NetCommand>,
    ) -> Self {
        Self { config, tx, rx_cmd }
    }

    // 连接失败或断开后不再重连，会话继续但音频链路关闭
    pub async fn run(mut self) {
        if let Err(e) = self.connect_and_loop().await {
            log::error!("WebSocket link error: {}", e);
        }
        let _ = self.tx.send(NetEvent::Disconnected).await;
        log::info!("Network link task ended");
    }

    // 进入连接和主循环，读服务器消息，写采集帧
    async fn connect_and_loop(&mut self) -> anyhow::Result<()> {
        let url = validate_url(self.config.ws_url)?;

        log::info!("Connecting to {}...", url);
        let (ws_stream, _) = connect_async(self.config.ws_url).await?;
        log::info!("Connected");

        let (mut write, mut read) = ws_stream.split();

        self.tx.send(NetEvent::Connected).await?;

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.tx.send(NetEvent::Text(text.to_string())).await?;
                        }
                        Some(Ok(Message::Binary(data))) => {
                            // 协议里服务器只发文本信封
                            log::debug!("Ignoring unexpected binary message: {} bytes", data.len());
                        }
                        Some(Ok(Message::Close(frame))) => {
                            log::info!("Server closed connection: {:?}", frame);
                            return Ok(());
                        }
                        Some(Ok(_)) => {} // ping/pong 由 tungstenite 处理
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(()),
                    }
                }
                cmd = self.rx_cmd.recv() => {
                    match cmd {
                        Some(NetCommand::SendFrame(frame)) => {
                            write.send(Message::Binary(frame)).await?;
                        }
                        Some(NetCommand::Shutdown) | None => {
                            // 尽力发 Close 然后立即退出，不等回执
                            let _ = write.send(Message::Close(None)).await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

// 只接受 ws/wss，其他 scheme 直接报错而不是发起无意义的连接
fn validate_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => anyhow::bail!("Unsupported socket scheme: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_accepts_ws_schemes() {
        assert!(validate_url("ws://127.0.0.1:8000/ws/audio").is_ok());
        assert!(validate_url("wss://solace.example.com/ws/audio").is_ok());
    }

    #[test]
    fn test_validate_url_rejects_everything_else() {
        assert!(validate_url("http://example.com").is_err());
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("").is_err());
    }
}
