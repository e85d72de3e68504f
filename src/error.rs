//! 内容重写统一错误处理
//!
//! 提供结构化错误类型。配置类错误在策略解析阶段被吸收（策略降级为禁用），
//! 只有字符编码错误会传播给调用方。

use thiserror::Error;

/// 重写错误类型
#[derive(Error, Debug)]
pub enum RewriteError {
    /// 配置错误（缺少键、类型不符等）
    #[error("配置错误: {0}")]
    Config(String),

    /// URL 模式无法编译
    #[error("无效的URL模式 `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// 不支持的字符编码
    #[error("不支持的字符编码: {0}")]
    UnsupportedEncoding(String),

    /// 内容无法按声明的编码解码
    #[error("内容无法按 {0} 解码")]
    Undecodable(&'static str),

    /// HTML 流式改写失败
    #[error("HTML改写错误: {0}")]
    Html(#[from] lol_html::errors::RewritingError),

    /// JSON 解析错误
    #[error("JSON解析错误: {0}")]
    Json(#[from] serde_json::Error),

    /// 读取配置或输入时的IO错误
    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Encoding,
    Markup,
    Io,
}

impl RewriteError {
    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            RewriteError::Config(_) => ErrorCategory::Configuration,
            RewriteError::InvalidPattern { .. } => ErrorCategory::Configuration,
            RewriteError::Json(_) => ErrorCategory::Configuration,
            RewriteError::UnsupportedEncoding(_) => ErrorCategory::Encoding,
            RewriteError::Undecodable(_) => ErrorCategory::Encoding,
            RewriteError::Html(_) => ErrorCategory::Markup,
            RewriteError::Io(_) => ErrorCategory::Io,
        }
    }

    /// 该错误是否必须中止当前重写调用并返回给调用方
    ///
    /// 无法安全解码的内容不能原样透传，其余错误都按"不改写"处理。
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Encoding
    }

    /// 便捷构造：缺少配置键
    pub fn missing_key(key: &str) -> Self {
        RewriteError::Config(format!("缺少配置键 `{}`", key))
    }
}

/// 重写结果类型
pub type RewriteResult<T> = Result<T, RewriteError>;
