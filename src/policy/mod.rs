//! 重写策略模块
//!
//! `RewritePolicy` 是针对某个（容器，文档）组合解析出来的不可变规则集合：
//! 哪些标签可以改写、哪些URL在范围内、代理与合并端点、以及过期指令。
//!
//! 策略构建失败（缺少键、正则无效、过期指令无法识别）不会向上传播，
//! 而是得到 [`ResolvedPolicy::Disabled`]。

pub mod resolver;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;

use crate::config::{ContentRewriteConfig, ContentRewriteOverride};
use crate::error::{RewriteError, RewriteResult};

pub use resolver::{GadgetDocument, PolicyResolver};

/// 匹配全部URL的包含模式
const MATCH_ALL: &str = ".*";

/// 代理请求的过期指令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpiryDirective {
    /// 遵循源站的HTTP缓存头
    Http,
    /// 固定的刷新间隔（秒）
    Seconds(u64),
}

impl ExpiryDirective {
    /// 需要附加到代理URL上的 `refresh` 参数
    pub fn refresh_seconds(&self) -> Option<u64> {
        match self {
            ExpiryDirective::Http => None,
            ExpiryDirective::Seconds(seconds) => Some(*seconds),
        }
    }
}

impl FromStr for ExpiryDirective {
    type Err = RewriteError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        let token = token.trim();
        if token.is_empty() || token.eq_ignore_ascii_case("http") {
            return Ok(ExpiryDirective::Http);
        }
        token
            .parse::<u64>()
            .map(ExpiryDirective::Seconds)
            .map_err(|_| RewriteError::Config(format!("无法识别的过期指令 `{}`", token)))
    }
}

impl fmt::Display for ExpiryDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpiryDirective::Http => write!(f, "HTTP"),
            ExpiryDirective::Seconds(seconds) => write!(f, "{}", seconds),
        }
    }
}

/// URL 适用范围
#[derive(Debug, Clone)]
enum UrlScope {
    /// 包含模式为 `.*` 且没有排除模式
    All,
    Patterns {
        include: Regex,
        exclude: Option<Regex>,
    },
}

/// 解析完成的重写策略
#[derive(Debug, Clone)]
pub struct RewritePolicy {
    included_tags: BTreeSet<String>,
    url_scope: UrlScope,
    expiry: ExpiryDirective,
    proxy_url: Option<String>,
    concat_url: Option<String>,
}

/// 策略解析结果
///
/// 用显式的 `Disabled` 区分"没有策略"与"策略不产生效果"。
#[derive(Debug, Clone)]
pub enum ResolvedPolicy {
    Disabled,
    Enabled(Arc<RewritePolicy>),
}

impl ResolvedPolicy {
    pub fn is_enabled(&self) -> bool {
        matches!(self, ResolvedPolicy::Enabled(_))
    }

    pub fn policy(&self) -> Option<&Arc<RewritePolicy>> {
        match self {
            ResolvedPolicy::Disabled => None,
            ResolvedPolicy::Enabled(policy) => Some(policy),
        }
    }
}

impl RewritePolicy {
    /// 由容器配置和可选的文档级覆盖构建策略
    ///
    /// # 合并规则
    ///
    /// - `include-urls`：覆盖值非空时替换容器值
    /// - `exclude-urls`：覆盖中出现该键即替换，空值表示清除排除模式
    /// - `include-tags`、`expires`：覆盖中出现即替换
    ///
    /// 包含模式缺失或排除模式为 `.*` 时返回 `Disabled`。
    pub fn build(
        config: &ContentRewriteConfig,
        doc_override: Option<&ContentRewriteOverride>,
    ) -> RewriteResult<ResolvedPolicy> {
        let mut include = normalize_param(&config.include_urls);
        let mut exclude = normalize_param(&config.exclude_urls);
        let mut tags = config.include_tags.normalized();
        let mut expires = config.expires.as_token();

        if let Some(doc_override) = doc_override {
            if let Some(value) = &doc_override.include_urls {
                include = normalize_param(value).or(include);
            }
            if let Some(value) = &doc_override.exclude_urls {
                exclude = normalize_param(value);
            }
            if let Some(value) = &doc_override.include_tags {
                tags = value.normalized();
            }
            if let Some(value) = &doc_override.expires {
                expires = value.as_token();
            }
        }

        let expiry = expires.parse::<ExpiryDirective>()?;

        let Some(include) = include else {
            return Ok(ResolvedPolicy::Disabled);
        };
        if exclude.as_deref() == Some(MATCH_ALL) {
            return Ok(ResolvedPolicy::Disabled);
        }

        let url_scope = if include == MATCH_ALL && exclude.is_none() {
            UrlScope::All
        } else {
            UrlScope::Patterns {
                include: compile_pattern(&include)?,
                exclude: exclude.as_deref().map(compile_pattern).transpose()?,
            }
        };

        Ok(ResolvedPolicy::Enabled(Arc::new(RewritePolicy {
            included_tags: tags.into_iter().collect(),
            url_scope,
            expiry,
            proxy_url: config.proxy_url.as_deref().and_then(normalize_param),
            concat_url: config.concat_url.as_deref().and_then(normalize_param),
        })))
    }

    pub fn included_tags(&self) -> &BTreeSet<String> {
        &self.included_tags
    }

    pub fn includes_tag(&self, tag: &str) -> bool {
        self.included_tags.contains(&tag.to_ascii_lowercase())
    }

    /// URL是否在改写范围内：匹配包含模式且不匹配排除模式（排除优先）
    pub fn should_rewrite_url(&self, url: &str) -> bool {
        match &self.url_scope {
            UrlScope::All => true,
            UrlScope::Patterns { include, exclude } => {
                include.is_match(url) && !exclude.as_ref().is_some_and(|e| e.is_match(url))
            }
        }
    }

    pub fn expiry(&self) -> ExpiryDirective {
        self.expiry
    }

    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }

    pub fn concat_url(&self) -> Option<&str> {
        self.concat_url.as_deref()
    }
}

fn normalize_param(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn compile_pattern(pattern: &str) -> RewriteResult<Regex> {
    Regex::new(pattern).map_err(|source| RewriteError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExpiresValue, TagList};

    fn config(include: &str, exclude: &str, expires: &str) -> ContentRewriteConfig {
        ContentRewriteConfig {
            include_tags: TagList::List(vec!["IMG".to_string(), "Script".to_string()]),
            include_urls: include.to_string(),
            exclude_urls: exclude.to_string(),
            expires: ExpiresValue::Text(expires.to_string()),
            proxy_url: Some("http://p/?u=".to_string()),
            concat_url: Some("  ".to_string()),
        }
    }

    fn enabled(resolved: RewriteResult<ResolvedPolicy>) -> Arc<RewritePolicy> {
        resolved.unwrap().policy().cloned().expect("policy should be enabled")
    }

    #[test]
    fn test_include_all() {
        let policy = enabled(RewritePolicy::build(&config(".*", "", "HTTP"), None));
        assert!(policy.should_rewrite_url("http://anything/at/all"));
        assert!(policy.includes_tag("img"));
        assert!(policy.includes_tag("SCRIPT"));
        assert!(!policy.includes_tag("link"));
        assert_eq!(policy.expiry(), ExpiryDirective::Http);
        assert_eq!(policy.proxy_url(), Some("http://p/?u="));
        assert_eq!(policy.concat_url(), None);
    }

    #[test]
    fn test_exclude_wins() {
        let policy = enabled(RewritePolicy::build(&config("example", "\\.js$", "60"), None));
        assert!(policy.should_rewrite_url("http://example.org/a.png"));
        assert!(!policy.should_rewrite_url("http://example.org/a.js"));
        assert!(!policy.should_rewrite_url("http://other.org/a.png"));
        assert_eq!(policy.expiry(), ExpiryDirective::Seconds(60));
    }

    #[test]
    fn test_disabled_cases() {
        let blank_include = RewritePolicy::build(&config("  ", "", "HTTP"), None).unwrap();
        assert!(!blank_include.is_enabled());

        let exclude_all = RewritePolicy::build(&config(".*", ".*", "HTTP"), None).unwrap();
        assert!(!exclude_all.is_enabled());
    }

    #[test]
    fn test_build_errors() {
        assert!(matches!(
            RewritePolicy::build(&config("(", "", "HTTP"), None),
            Err(RewriteError::InvalidPattern { .. })
        ));
        assert!(matches!(
            RewritePolicy::build(&config(".*", "", "tomorrow"), None),
            Err(RewriteError::Config(_))
        ));
    }

    #[test]
    fn test_override_merge() {
        let base = config("example", "private", "HTTP");
        let doc_override = ContentRewriteOverride {
            include_tags: Some(TagList::Delimited("link, style".to_string())),
            include_urls: Some("   ".to_string()),
            exclude_urls: Some(String::new()),
            expires: Some(ExpiresValue::Seconds(3600)),
        };
        let policy = enabled(RewritePolicy::build(&base, Some(&doc_override)));

        // blank include falls back to the container pattern, blank exclude clears it
        assert!(policy.should_rewrite_url("http://example.org/private/a.png"));
        assert!(!policy.should_rewrite_url("http://other.org/a.png"));
        assert!(policy.includes_tag("style"));
        assert!(!policy.includes_tag("img"));
        assert_eq!(policy.expiry().refresh_seconds(), Some(3600));
    }

    #[test]
    fn test_expiry_parsing() {
        assert_eq!("HTTP".parse::<ExpiryDirective>().unwrap(), ExpiryDirective::Http);
        assert_eq!("http".parse::<ExpiryDirective>().unwrap(), ExpiryDirective::Http);
        assert_eq!("".parse::<ExpiryDirective>().unwrap(), ExpiryDirective::Http);
        assert_eq!(
            " 86400 ".parse::<ExpiryDirective>().unwrap(),
            ExpiryDirective::Seconds(86400)
        );
        assert!("-1".parse::<ExpiryDirective>().is_err());
        assert_eq!(ExpiryDirective::Seconds(5).to_string(), "5");
    }
}
