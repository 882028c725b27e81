#[derive(Debug, Clone)]
pub struct Config {
    // 应用信息
    pub app_name: &'static str,
    pub app_version: &'static str,

    // 网络配置
    pub ws_url: &'static str,

    // 采集配置
    pub capture_device: &'static str,
    pub target_sample_rate: u32,
    pub capture_channels: u16,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub frame_buffer_size: usize,

    // 播放配置
    pub fallback_sample_rate: u32,
    pub default_mime: &'static str,
    pub volume: f32,
}

impl Config {
    /// 从编译时设置的环境变量创建配置
    /// 所有参数都在编译时从 config.toml 中读取
    pub fn new() -> Result<Self, &'static str> {
        Ok(Self {
            // 应用信息
            app_name: env!("APP_NAME"),
            app_version: env!("APP_VERSION"),

            // 网络配置
            ws_url: env!("WS_URL"),

            // 采集配置
            capture_device: env!("CAPTURE_DEVICE"),
            target_sample_rate: env!("TARGET_SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse TARGET_SAMPLE_RATE")?,
            capture_channels: env!("CAPTURE_CHANNELS").parse()
                .map_err(|_| "Failed to parse CAPTURE_CHANNELS")?,
            echo_cancellation: env!("ECHO_CANCELLATION").parse()
                .map_err(|_| "Failed to parse ECHO_CANCELLATION")?,
            noise_suppression: env!("NOISE_SUPPRESSION").parse()
                .map_err(|_| "Failed to parse NOISE_SUPPRESSION")?,
            frame_buffer_size: env!("FRAME_BUFFER_SIZE").parse()
                .map_err(|_| "Failed to parse FRAME_BUFFER_SIZE")?,

            // 播放配置
            fallback_sample_rate: env!("FALLBACK_SAMPLE_RATE").parse()
                .map_err(|_| "Failed to parse FALLBACK_SAMPLE_RATE")?,
            default_mime: env!("DEFAULT_AUDIO_MIME"),
            volume: env!("PLAYBACK_VOLUME").parse()
                .map_err(|_| "Failed to parse PLAYBACK_VOLUME")?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new().expect("Failed to create default Config from build-time environment variables")
    }
}
