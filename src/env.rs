//! 统一的环境变量管理
//!
//! 命令行工具读取的环境变量，提供类型安全的访问器。

use std::env;
use std::fmt;
use std::path::PathBuf;

use crate::config::constants::DEFAULT_CONTAINER;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "环境变量 '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "未设置必需的环境变量".to_string(),
                    })
                }
            }
        }
    }
}

/// 日志相关环境变量
pub mod logging {
    use super::*;

    /// 日志过滤规则（`tracing-subscriber` 的 EnvFilter 语法）
    pub struct LogFilter;
    impl EnvVar<String> for LogFilter {
        const NAME: &'static str = "GADGET_REWRITE_LOG";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "日志过滤规则，例如 warn 或 gadget_rewrite=debug";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("warn".to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            let filter = value.trim();
            if filter.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "过滤规则不能为空".to_string(),
                });
            }
            Ok(filter.to_string())
        }
    }

    /// 禁用颜色输出
    pub struct NoColor;
    impl EnvVar<bool> for NoColor {
        const NAME: &'static str = "NO_COLOR";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "设置为任意非空值时禁用彩色日志";

        fn parse(value: &str) -> EnvResult<bool> {
            // NO_COLOR 遵循标准：任何值都表示禁用颜色
            Ok(!value.is_empty())
        }
    }
}

/// 重写相关环境变量
pub mod rewrite {
    use super::*;

    /// 容器配置文件路径
    pub struct ConfigPath;
    impl EnvVar<PathBuf> for ConfigPath {
        const NAME: &'static str = "GADGET_REWRITE_CONFIG";
        const DEFAULT: Option<PathBuf> = None;
        const DESCRIPTION: &'static str = "容器配置JSON文件路径";

        fn parse(value: &str) -> EnvResult<PathBuf> {
            let path = value.trim();
            if path.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "路径不能为空".to_string(),
                });
            }
            Ok(PathBuf::from(path))
        }
    }

    /// 默认容器ID
    pub struct Container;
    impl EnvVar<String> for Container {
        const NAME: &'static str = "GADGET_REWRITE_CONTAINER";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "未指定 --container 时使用的容器ID";

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok(DEFAULT_CONTAINER.to_string()),
            }
        }

        fn parse(value: &str) -> EnvResult<String> {
            let container = value.trim();
            if container.is_empty() || container.contains(char::is_whitespace) {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("无效的容器ID '{}'", value),
                });
            }
            Ok(container.to_string())
        }
    }
}

/// 环境变量配置汇总
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub log_filter: String,
    pub no_color: bool,
    pub config_path: Option<PathBuf>,
    pub container: String,
}

impl EnvConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> EnvResult<Self> {
        Ok(Self {
            log_filter: logging::LogFilter::get()?,
            no_color: logging::NoColor::get()?,
            config_path: rewrite::ConfigPath::get().ok(),
            container: rewrite::Container::get()?,
        })
    }
}

/// 环境变量文档生成器
pub fn generate_env_docs() -> String {
    let mut docs = String::new();
    docs.push_str("# 环境变量\n\n");
    docs.push_str(&format!(
        "- `{}`: {} (默认: warn)\n",
        logging::LogFilter::NAME,
        logging::LogFilter::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {} (默认: {:?})\n",
        logging::NoColor::NAME,
        logging::NoColor::DESCRIPTION,
        logging::NoColor::DEFAULT
    ));
    docs.push_str(&format!(
        "- `{}`: {}\n",
        rewrite::ConfigPath::NAME,
        rewrite::ConfigPath::DESCRIPTION
    ));
    docs.push_str(&format!(
        "- `{}`: {} (默认: {})\n",
        rewrite::Container::NAME,
        rewrite::Container::DESCRIPTION,
        DEFAULT_CONTAINER
    ));
    docs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filter_parsing() {
        assert_eq!(
            logging::LogFilter::parse(" gadget_rewrite=debug ").unwrap(),
            "gadget_rewrite=debug"
        );
        assert!(logging::LogFilter::parse("  ").is_err());
    }

    #[test]
    fn test_no_color_parsing() {
        assert!(logging::NoColor::parse("1").unwrap());
        assert!(!logging::NoColor::parse("").unwrap());
    }

    #[test]
    fn test_container_parsing() {
        assert_eq!(rewrite::Container::parse("shindig").unwrap(), "shindig");
        assert!(rewrite::Container::parse("").is_err());
        assert!(rewrite::Container::parse("two words").is_err());
    }

    #[test]
    fn test_config_path_parsing() {
        assert_eq!(
            rewrite::ConfigPath::parse("/etc/containers.json").unwrap(),
            PathBuf::from("/etc/containers.json")
        );
        assert!(rewrite::ConfigPath::parse("").is_err());
    }

    #[test]
    fn test_env_docs_lists_every_variable() {
        let docs = generate_env_docs();
        for name in [
            "GADGET_REWRITE_LOG",
            "NO_COLOR",
            "GADGET_REWRITE_CONFIG",
            "GADGET_REWRITE_CONTAINER",
        ] {
            assert!(docs.contains(name), "missing {}", name);
        }
    }
}
