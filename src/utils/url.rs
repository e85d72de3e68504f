//! URL 与媒体类型工具函数

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

pub use url::Url;

/// 代理参数的编码集合：除 ASCII 字母数字与 `-._*` 外全部编码
///
/// 与表单编码兼容，逗号会被编码，因此可以安全地用作合并脚本URL的分隔符。
pub const URL_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'*');

/// 相对于基准URL解析链接
///
/// 无法解析的引用返回 `None`，调用方应原样保留该链接。
pub fn resolve_url(base_url: &Url, href: &str) -> Option<Url> {
    base_url.join(href.trim()).ok()
}

/// 对URL做参数级编码
pub fn encode_url(url: &str) -> String {
    utf8_percent_encode(url, URL_ENCODE_SET).to_string()
}

/// 是否为可代理的网络地址
pub fn is_network_url(url: &Url) -> bool {
    url.scheme() == "http" || url.scheme() == "https"
}

/// 引擎能够处理的内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Html,
    Css,
    Other,
}

/// 根据 MIME 类型判断内容种类
///
/// 只看主类型部分，忽略大小写和 `;charset=...` 等参数。
pub fn media_kind(mime_type: &str) -> MediaKind {
    let essence = mime_essence(mime_type);
    if essence.starts_with("text/html") {
        MediaKind::Html
    } else if essence.starts_with("text/css") {
        MediaKind::Css
    } else {
        MediaKind::Other
    }
}

/// 提取 MIME 类型的主体部分（小写、去参数）
pub fn mime_essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// 从 `Content-Type` 中提取 charset 参数
pub fn parse_charset(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if name.trim().eq_ignore_ascii_case("charset") {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            if value.is_empty() {
                None
            } else {
                Some(value.to_string())
            }
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_url() {
        assert_eq!(encode_url("http://x/a.png"), "http%3A%2F%2Fx%2Fa.png");
        assert_eq!(encode_url("a b,c~d"), "a%20b%2Cc%7Ed");
        assert_eq!(encode_url("-._*"), "-._*");
    }

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("http://x/dir/page.html").unwrap();
        assert_eq!(
            resolve_url(&base, "img/a.png").unwrap().as_str(),
            "http://x/dir/img/a.png"
        );
        assert_eq!(
            resolve_url(&base, "  /root.css ").unwrap().as_str(),
            "http://x/root.css"
        );
        assert!(resolve_url(&base, "http://[::1").is_none());
    }

    #[test]
    fn test_media_kind() {
        assert_eq!(media_kind("text/html"), MediaKind::Html);
        assert_eq!(media_kind(" Text/HTML; charset=UTF-8"), MediaKind::Html);
        assert_eq!(media_kind("text/css;charset=utf-8"), MediaKind::Css);
        assert_eq!(media_kind("application/javascript"), MediaKind::Other);
        assert_eq!(media_kind(""), MediaKind::Other);
    }

    #[test]
    fn test_parse_charset() {
        assert_eq!(
            parse_charset("text/html; charset=ISO-8859-1").as_deref(),
            Some("ISO-8859-1")
        );
        assert_eq!(
            parse_charset("text/css;Charset=\"utf-8\"").as_deref(),
            Some("utf-8")
        );
        assert_eq!(parse_charset("text/html"), None);
        assert_eq!(parse_charset("text/html; charset="), None);
    }
}
