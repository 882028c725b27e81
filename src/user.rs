/// 登录用户信息，由外部身份服务写进进程环境
/// 姓名和邮箱要么同时存在，要么整体缺失（匿名会话）
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

impl UserProfile {
    /// 从 SOLACE_USER_NAME / SOLACE_USER_EMAIL / SOLACE_USER_AVATAR 读取
    pub fn from_env() -> Option<Self> {
        let name = std::env::var("SOLACE_USER_NAME").ok()?;
        let email = std::env::var("SOLACE_USER_EMAIL").ok()?;
        let avatar_url = std::env::var("SOLACE_USER_AVATAR").ok();
        Some(Self {
            name,
            email,
            avatar_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_requires_name_and_email() {
        // 单个测试串行修改环境变量，避免并行测试互相干扰
        unsafe {
            std::env::remove_var("SOLACE_USER_NAME");
            std::env::remove_var("SOLACE_USER_EMAIL");
            std::env::remove_var("SOLACE_USER_AVATAR");
        }
        assert!(UserProfile::from_env().is_none());

        unsafe {
            std::env::set_var("SOLACE_USER_NAME", "Ada");
            std::env::set_var("SOLACE_USER_EMAIL", "ada@example.com");
        }
        let profile = UserProfile::from_env().expect("name and email are set");
        assert_eq!(profile.name, "Ada");
        assert_eq!(profile.email, "ada@example.com");
        assert!(profile.avatar_url.is_none());

        unsafe {
            std::env::remove_var("SOLACE_USER_NAME");
            std::env::remove_var("SOLACE_USER_EMAIL");
        }
    }
}
