//! # 工具模块
//!
//! - `url` - URL解析、代理参数编码、MIME类型判断

pub mod url;

// Re-export commonly used items for convenience
pub use url::{
    encode_url, is_network_url, media_kind, mime_essence, parse_charset, resolve_url, MediaKind,
    Url, URL_ENCODE_SET,
};
