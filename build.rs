use std::fs;
use std::path::Path;
use serde::Deserialize;

#[derive(Deserialize)]
struct Config {
    application: Application,
    network: Network,
    capture: Capture,
    playback: Playback,
}

#[derive(Deserialize)]
struct Application {
    name: String,
    version: String,
}

#[derive(Deserialize)]
struct Network {
    ws_url: String,
}

#[derive(Deserialize)]
struct Capture {
    device: String,
    target_sample_rate: u32,
    channels: u16,
    echo_cancellation: bool,
    noise_suppression: bool,
    frame_buffer_size: usize,
}

#[derive(Deserialize)]
struct Playback {
    fallback_sample_rate: u32,
    default_mime: String,
    volume: f32,
}

// 在编译时读取 config.toml 并设置环境变量
fn main() {
    println!("cargo:rerun-if-changed=config.toml");

    let config_path = Path::new("config.toml");
    if !config_path.exists() {
        panic!("config.toml not found!");
    }

    let config_str = fs::read_to_string(config_path).expect("Failed to read config.toml");
    let config: Config = toml::from_str(&config_str).expect("Failed to parse config.toml");

    // 应用信息
    println!("cargo:rustc-env=APP_NAME={}", config.application.name);
    println!("cargo:rustc-env=APP_VERSION={}", config.application.version);

    // 网络配置
    println!("cargo:rustc-env=WS_URL={}", config.network.ws_url);

    // 采集配置
    println!("cargo:rustc-env=CAPTURE_DEVICE={}", config.capture.device);
    println!("cargo:rustc-env=TARGET_SAMPLE_RATE={}", config.capture.target_sample_rate);
    println!("cargo:rustc-env=CAPTURE_CHANNELS={}", config.capture.channels);
    println!("cargo:rustc-env=ECHO_CANCELLATION={}", config.capture.echo_cancellation);
    println!("cargo:rustc-env=NOISE_SUPPRESSION={}", config.capture.noise_suppression);
    println!("cargo:rustc-env=FRAME_BUFFER_SIZE={}", config.capture.frame_buffer_size);

    // 播放配置
    println!("cargo:rustc-env=FALLBACK_SAMPLE_RATE={}", config.playback.fallback_sample_rate);
    println!("cargo:rustc-env=DEFAULT_AUDIO_MIME={}", config.playback.default_mime);
    println!("cargo:rustc-env=PLAYBACK_VOLUME={}", config.playback.volume);
}
