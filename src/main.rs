mod audio;
mod config;
mod net_link;
mod protocol;
mod session;
mod state_machine;
mod transcript;
mod user;

use audio::{CaptureConfig, CaptureHandle, Player, PlayerEvent, PlayerSettings};
use config::Config;
use net_link::{NetCommand, NetEvent, NetLink};
use session::SessionController;
use user::UserProfile;

use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::mpsc;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::init();

    // 加载配置
    let config = Config::new().unwrap_or_default();
    log::info!("{} v{} starting", config.app_name, config.app_version);

    // 每次运行生成新的会话ID，只用于日志定位
    let session_id = Uuid::new_v4();
    log::info!("Session ID: {}", session_id);

    // 用户信息从环境变量读取，读不到就按匿名会话处理
    let user = UserProfile::from_env();

    // 创建通道，用于组件间通信
    // 网络事件通道
    let (tx_net_event, mut rx_net_event) = mpsc::channel::<NetEvent>(100);

    // 网络命令通道
    let (tx_net_cmd, rx_net_cmd) = mpsc::channel::<NetCommand>(100);

    // 采集帧通道，有界队列，网络跟不上时采集端直接丢帧
    let (tx_frame, mut rx_frame) = mpsc::channel::<Bytes>(config.frame_buffer_size.max(1));

    // 播放事件通道
    let (tx_player_event, mut rx_player_event) = mpsc::channel::<PlayerEvent>(16);

    // 启动播放线程
    let mut player = Player::start(
        PlayerSettings {
            default_mime: config.default_mime.to_string(),
            fallback_sample_rate: config.fallback_sample_rate,
            volume: config.volume,
        },
        tx_player_event,
    )?;

    // 会话控制器，持有会话记录、外发闸门和播放命令通道
    let mut session = SessionController::new(tx_net_cmd.clone(), player.sender(), user.as_ref());

    // 启动网络链接，与语音后端通信
    let net_link = NetLink::new(config.clone(), tx_net_event, rx_net_cmd);
    tokio::spawn(async move {
        net_link.run().await;
    });

    // 启动麦克风采集；没有麦克风就进入只听模式，不中止会话
    let capture_config = CaptureConfig {
        device: config.capture_device.to_string(),
        target_sample_rate: config.target_sample_rate,
        channels: config.capture_channels,
        echo_cancellation: config.echo_cancellation,
        noise_suppression: config.noise_suppression,
    };
    let mut capture: Option<CaptureHandle> = match audio::capture::start(&capture_config, tx_frame) {
        Ok(handle) => {
            log::info!(
                "Microphone: \"{}\" @ {}Hz/{}ch",
                handle.device_name(),
                handle.source_rate(),
                handle.channels(),
            );
            Some(handle)
        }
        Err(e) => {
            log::error!("Capture unavailable: {}", e);
            None
        }
    };

    // 终端命令输入，代替图形界面做会话控制
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut stdin_open = true;
    println!("Solace Voice Core Started. Type 'help' for commands.");

    // 主事件循环，处理各组件事件
    loop {
        tokio::select! {
            // 监听 Ctrl+C 信号
            _ = signal::ctrl_c() => {
                println!("Received Ctrl+C, shutting down...");
                break;
            }

            // 网络事件：连接状态变化和服务器文本信封
            Some(event) = rx_net_event.recv() => {
                session.handle_net_event(event);
            }

            // 采集帧外发
            Some(frame) = rx_frame.recv() => {
                session.handle_capture_frame(frame).await;
            }

            // 播放生命周期事件
            Some(event) = rx_player_event.recv() => {
                session.handle_player_event(event);
            }

            // 终端命令；stdin 关闭后这个分支整体停用
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        if !handle_command(line.trim(), &session_id, user.as_ref(), &mut session) {
                            break;
                        }
                    }
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        log::debug!("stdin closed: {}", e);
                        stdin_open = false;
                    }
                }
            }
        }
    }

    // 收尾：每一步都容忍资源已经不在
    if let Some(handle) = capture.as_mut() {
        handle.stop();
    }
    let _ = tx_net_cmd.send(NetCommand::Shutdown).await;
    player.shutdown();

    log::info!(
        "Session {} ended with {} messages",
        session_id,
        session.transcript().len(),
    );
    Ok(())
}

// 处理一条终端命令，返回 false 表示退出会话
fn handle_command(
    cmd: &str,
    session_id: &Uuid,
    user: Option<&UserProfile>,
    session: &mut SessionController,
) -> bool {
    match cmd {
        "" => {}
        "help" => {
            println!("Commands: status, log, mute, unmute, stop, vol <0.0-1.0>, whoami, quit");
        }
        "status" => {
            println!("Session {}", session_id);
            println!(
                "  state: {:?}  connected: {}  muted: {}  playing: {}",
                session.state(),
                session.is_connected(),
                session.is_muted(),
                session.is_playing(),
            );
            if !session.partial_text().is_empty() {
                println!("  hearing: {}", session.partial_text());
            }
            if !session.agent_partial_text().is_empty() {
                println!("  thinking: {}", session.agent_partial_text());
            }
        }
        "log" => {
            if session.transcript().is_empty() {
                println!("(no messages yet)");
            }
            for msg in session.transcript().messages() {
                println!(
                    "[{}] {} {}: {}",
                    msg.id,
                    msg.timestamp.format("%H:%M:%S"),
                    msg.speaker,
                    msg.text,
                );
            }
        }
        "mute" => session.set_muted(true),
        "unmute" => session.set_muted(false),
        "stop" => session.stop_playback(),
        "whoami" => match user {
            Some(user) => {
                println!("{} <{}>", user.name, user.email);
                if let Some(avatar) = &user.avatar_url {
                    println!("avatar: {}", avatar);
                }
            }
            None => println!("anonymous session"),
        },
        "quit" | "exit" => return false,
        other => {
            if let Some(value) = other.strip_prefix("vol ") {
                match value.trim().parse::<f32>() {
                    Ok(v) => session.set_volume(v),
                    Err(_) => println!("Usage: vol <0.0-1.0>"),
                }
            } else {
                println!("Unknown command: {} (try 'help')", other);
            }
        }
    }
    true
}
