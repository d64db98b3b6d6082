//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 服务监听地址
//! - 管理员哨兵名与管理通道密钥
//! - 封禁名单
//! - 上传目录与删除封锁时长
//!
//! 默认值适用于单机开发，生产通过 `KONEK_` 前缀的环境变量覆盖，
//! 嵌套字段用双下划线分隔（如 `KONEK_SERVER__PORT=9000`）。

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务配置
    pub server: ServerConfig,
    /// 管理员配置
    pub admin: AdminConfig,
    /// 封禁名单配置
    pub bans: BanConfig,
    /// 上传配置
    pub upload: UploadConfig,
    /// 内容时限配置
    pub retention: RetentionConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 管理员配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// 保留的管理员资料名，接入时名字与之完全相等才参与角色仲裁
    pub reserved_name: String,
    /// `admin_login` 握手的共享密钥，留空则禁用管理通道
    pub secret: String,
}

/// 封禁名单配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BanConfig {
    pub names: Vec<String>,
    pub numbers: Vec<String>,
}

/// 上传配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// 分片与完整文件的落盘目录
    pub dir: String,
}

/// 内容时限配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// 删除用户后的内存封锁时长（秒），吸收墓碑生效前的立即重连
    pub temp_block_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            reserved_name: "Admin".to_string(),
            secret: String::new(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: "uploads".to_string(),
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self { temp_block_secs: 60 }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            admin: AdminConfig::default(),
            bans: BanConfig::default(),
            upload: UploadConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从环境变量加载配置，未设置的字段落到默认值。
    pub fn load() -> Result<Self, ConfigError> {
        let config: AppConfig = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Env::prefixed("KONEK_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.host.is_empty() {
            return Err(ConfigError::InvalidServerConfig(
                "server host cannot be empty".to_string(),
            ));
        }
        if self.admin.reserved_name.is_empty() {
            return Err(ConfigError::InvalidAdminConfig(
                "reserved admin name cannot be empty".to_string(),
            ));
        }
        if self.upload.dir.is_empty() {
            return Err(ConfigError::InvalidUploadConfig(
                "upload directory cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server configuration: {0}")]
    InvalidServerConfig(String),
    #[error("Invalid admin configuration: {0}")]
    InvalidAdminConfig(String),
    #[error("Invalid upload configuration: {0}")]
    InvalidUploadConfig(String),
    #[error("Configuration extraction error: {0}")]
    Extraction(#[from] figment::Error),
}
