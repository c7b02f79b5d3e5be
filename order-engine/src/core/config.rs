use crate::utils::time;
use chrono_tz::Tz;
use shared::AppResult;
use std::path::PathBuf;
use std::time::Duration;

/// 订单引擎配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | /var/lib/crab/orders | 工作目录 (redb 文件、日志) |
/// | RESTAURANT_ID | DEFAULT | 餐厅命名空间 |
/// | BUSINESS_TIMEZONE | UTC | 营业时区 (IANA) |
/// | RECONCILE_INTERVAL_SECS | 300 | 桌台对账周期 |
/// | OUTBOX_SCAN_INTERVAL_SECS | 30 | outbox 重试扫描周期 |
/// | OUTBOX_MAX_RETRIES | 5 | 进入死信前的最大重试次数 |
/// | FAVORITE_ITEMS_CAP | 10 | 顾客常点菜品上限 |
/// | LOG_LEVEL | info | 日志级别 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/orders RESTAURANT_ID=spice-garden cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录
    pub work_dir: String,
    /// 餐厅标识 (规范化为大写命名空间)
    pub restaurant_id: String,
    /// 营业时区名称
    pub business_timezone: String,
    pub reconcile_interval_secs: u64,
    pub outbox_scan_interval_secs: u64,
    pub outbox_max_retries: u32,
    pub favorite_items_cap: usize,
    pub log_level: String,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/crab/orders".into()),
            restaurant_id: std::env::var("RESTAURANT_ID").unwrap_or_else(|_| "DEFAULT".into()),
            business_timezone: std::env::var("BUSINESS_TIMEZONE").unwrap_or_else(|_| "UTC".into()),
            reconcile_interval_secs: env_or("RECONCILE_INTERVAL_SECS", 300),
            outbox_scan_interval_secs: env_or("OUTBOX_SCAN_INTERVAL_SECS", 30),
            outbox_max_retries: env_or("OUTBOX_MAX_RETRIES", 5),
            favorite_items_cap: env_or("FAVORITE_ITEMS_CAP", 10),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, restaurant_id: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.restaurant_id = restaurant_id.into();
        config
    }

    pub fn timezone(&self) -> AppResult<Tz> {
        time::parse_timezone(&self.business_timezone)
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("orders.redb")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }

    pub fn outbox_scan_interval(&self) -> Duration {
        Duration::from_secs(self.outbox_scan_interval_secs.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_and_derived_paths() {
        let config = Config::with_overrides("/tmp/engine", "spice");
        assert_eq!(config.restaurant_id, "spice");
        assert_eq!(config.database_path(), PathBuf::from("/tmp/engine/orders.redb"));
        assert_eq!(config.log_dir(), PathBuf::from("/tmp/engine/logs"));
    }

    #[test]
    fn test_bad_timezone_is_a_config_error() {
        let mut config = Config::with_overrides("/tmp", "x");
        config.business_timezone = "Nowhere/Town".into();
        let err = config.timezone().unwrap_err();
        assert_eq!(err.code, shared::ErrorCode::ConfigError);
    }
}
