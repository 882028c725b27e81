/// 会话的粗粒度状态，只用于变更日志和状态查询
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// 已连接，没有音频在流动
    Idle,
    /// 麦克风帧正在发往服务器
    Listening,
    /// 正在播放咨询师语音
    Speaking,
    /// 连接已断开，采集帧被丢弃
    Disconnected,
}
