//! 链接重写模块
//!
//! 负责把资源链接改写为经过代理端点的地址，以及构造合并脚本的URL。
//!
//! 代理URL格式：`proxy-url + encode(绝对URL)`，过期指令为固定秒数时追加
//! `&refresh=N`。合并URL格式：`concat-url + encode(url1) + "," + encode(url2) ...`，
//! 每个成员内部的逗号都已编码，所以逗号分隔可以无歧义地还原顺序。

use std::sync::Arc;

use crate::policy::{ExpiryDirective, RewritePolicy};
use crate::utils::url::{encode_url, is_network_url, resolve_url, Url};

/// 合并URL中成员之间的分隔符
pub const CONCAT_SEPARATOR: char = ',';

/// 刷新间隔参数名
pub const REFRESH_PARAM: &str = "refresh";

/// 链接重写器
///
/// 纯函数：不做IO，不修改共享状态，可以在任意多个线程中并发调用。
pub trait LinkRewriter: Send + Sync {
    /// 改写单个链接，不在改写范围内时返回解析后的原始地址
    fn rewrite(&self, link: &str, base_url: &Url) -> String;
}

impl<F> LinkRewriter for F
where
    F: Fn(&str, &Url) -> String + Send + Sync,
{
    fn rewrite(&self, link: &str, base_url: &Url) -> String {
        self(link, base_url)
    }
}

/// 通过代理端点改写链接
#[derive(Debug, Clone)]
pub struct ProxyingLinkRewriter {
    policy: Arc<RewritePolicy>,
    proxy_url: String,
}

impl ProxyingLinkRewriter {
    pub fn new(policy: Arc<RewritePolicy>, proxy_url: impl Into<String>) -> Self {
        Self {
            policy,
            proxy_url: proxy_url.into(),
        }
    }

    /// 使用策略中配置的代理端点，未配置时返回 `None`
    pub fn from_policy(policy: &Arc<RewritePolicy>) -> Option<Self> {
        let proxy_url = policy.proxy_url()?.to_string();
        Some(Self::new(Arc::clone(policy), proxy_url))
    }
}

impl LinkRewriter for ProxyingLinkRewriter {
    fn rewrite(&self, link: &str, base_url: &Url) -> String {
        let link = link.trim();
        // 空链接不值得代理
        if link.is_empty() {
            return link.to_string();
        }

        let Some(resolved) = resolve_url(base_url, link) else {
            return link.to_string();
        };
        if !is_network_url(&resolved) {
            return link.to_string();
        }

        if !self.policy.should_rewrite_url(resolved.as_str()) {
            tracing::trace!("链接不在改写范围内: {}", resolved);
            return resolved.to_string();
        }

        let mut result = format!("{}{}", self.proxy_url, encode_url(resolved.as_str()));
        append_refresh(&mut result, self.policy.expiry());
        result
    }
}

/// 解析链接并判断是否可以改写
///
/// 返回可以改写的绝对地址；无法解析、非网络地址或不在范围内时返回 `None`。
pub fn eligible_url(policy: &RewritePolicy, link: &str, base_url: &Url) -> Option<Url> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    resolve_url(base_url, link)
        .filter(is_network_url)
        .filter(|resolved| policy.should_rewrite_url(resolved.as_str()))
}

/// 构造合并脚本的URL，成员保持传入顺序
pub fn build_concat_url(concat_url: &str, urls: &[Url], expiry: ExpiryDirective) -> String {
    let members: Vec<String> = urls.iter().map(|url| encode_url(url.as_str())).collect();
    let mut result = format!(
        "{}{}",
        concat_url,
        members.join(&CONCAT_SEPARATOR.to_string())
    );
    append_refresh(&mut result, expiry);
    result
}

fn append_refresh(url: &mut String, expiry: ExpiryDirective) {
    if let Some(seconds) = expiry.refresh_seconds() {
        url.push('&');
        url.push_str(REFRESH_PARAM);
        url.push('=');
        url.push_str(&seconds.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ContentRewriteConfig, ExpiresValue, TagList};

    fn policy(include: &str, exclude: &str, expires: &str) -> Arc<RewritePolicy> {
        let config = ContentRewriteConfig {
            include_tags: TagList::List(vec!["img".to_string()]),
            include_urls: include.to_string(),
            exclude_urls: exclude.to_string(),
            expires: ExpiresValue::Text(expires.to_string()),
            proxy_url: Some("http://p/?u=".to_string()),
            concat_url: Some("http://c/?u=".to_string()),
        };
        RewritePolicy::build(&config, None)
            .unwrap()
            .policy()
            .cloned()
            .unwrap()
    }

    fn base() -> Url {
        Url::parse("http://x/dir/page.html").unwrap()
    }

    #[test]
    fn test_rewrite_absolute_url() {
        let rewriter = ProxyingLinkRewriter::from_policy(&policy(".*", "", "HTTP")).unwrap();
        assert_eq!(
            rewriter.rewrite("http://x/a.png", &base()),
            "http://p/?u=http%3A%2F%2Fx%2Fa.png"
        );
    }

    #[test]
    fn test_rewrite_relative_url() {
        let rewriter = ProxyingLinkRewriter::from_policy(&policy(".*", "", "HTTP")).unwrap();
        assert_eq!(
            rewriter.rewrite(" img/a.png ", &base()),
            "http://p/?u=http%3A%2F%2Fx%2Fdir%2Fimg%2Fa.png"
        );
    }

    #[test]
    fn test_ineligible_url_is_resolved_but_not_proxied() {
        let rewriter = ProxyingLinkRewriter::from_policy(&policy(".*", "\\.js$", "HTTP")).unwrap();
        assert_eq!(rewriter.rewrite("lib.js", &base()), "http://x/dir/lib.js");
    }

    #[test]
    fn test_passthrough_cases() {
        let rewriter = ProxyingLinkRewriter::from_policy(&policy(".*", "", "HTTP")).unwrap();
        assert_eq!(rewriter.rewrite("", &base()), "");
        assert_eq!(rewriter.rewrite("   ", &base()), "");
        assert_eq!(
            rewriter.rewrite("data:image/png;base64,AAAA", &base()),
            "data:image/png;base64,AAAA"
        );
        assert_eq!(
            rewriter.rewrite("javascript:void(0)", &base()),
            "javascript:void(0)"
        );
        assert_eq!(rewriter.rewrite("http://[::1", &base()), "http://[::1");
    }

    #[test]
    fn test_refresh_parameter() {
        let rewriter = ProxyingLinkRewriter::from_policy(&policy(".*", "", "3600")).unwrap();
        assert_eq!(
            rewriter.rewrite("http://x/a.png", &base()),
            "http://p/?u=http%3A%2F%2Fx%2Fa.png&refresh=3600"
        );
    }

    #[test]
    fn test_closure_rewriter() {
        let identity = |link: &str, _base: &Url| link.to_string();
        assert_eq!(identity.rewrite("a.png", &base()), "a.png");
    }

    #[test]
    fn test_eligible_url() {
        let policy = policy("x/", "private", "HTTP");
        assert_eq!(
            eligible_url(&policy, "a.js", &base()).map(|u| u.to_string()),
            Some("http://x/dir/a.js".to_string())
        );
        assert!(eligible_url(&policy, "private/a.js", &base()).is_none());
        assert!(eligible_url(&policy, "", &base()).is_none());
        assert!(eligible_url(&policy, "data:text/javascript,1", &base()).is_none());
    }

    #[test]
    fn test_build_concat_url() {
        let urls = vec![
            Url::parse("http://x/a.js").unwrap(),
            Url::parse("http://x/b.js?v=1,2").unwrap(),
        ];
        assert_eq!(
            build_concat_url("http://c/?u=", &urls, ExpiryDirective::Http),
            "http://c/?u=http%3A%2F%2Fx%2Fa.js,http%3A%2F%2Fx%2Fb.js%3Fv%3D1%2C2"
        );
        assert_eq!(
            build_concat_url("http://c/?u=", &urls[..1], ExpiryDirective::Seconds(10)),
            "http://c/?u=http%3A%2F%2Fx%2Fa.js&refresh=10"
        );
    }
}
