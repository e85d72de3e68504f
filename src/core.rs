//! 重写引擎
//!
//! 负责策略解析、按 MIME 类型分派（HTML 走标签流遍历，CSS 走 CSS 重写器），
//! 并给出改写结果的缓存提示。
//!
//! 两个入口：
//!
//! - [`RewriteEngine::rewrite_response`]：改写抓取到的资源响应体
//! - [`RewriteEngine::rewrite_document`]：改写即将渲染的 gadget 文档
//!
//! 配置问题和格式错误的内容都按"不改写"处理；只有字符编码问题会作为错误返回。

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

use crate::config::ContainerConfig;
use crate::error::{RewriteError, RewriteResult};
use crate::parsers::css::rewrite_css;
use crate::parsers::html::{walk, TransformerSet};
use crate::parsers::link_rewriter::ProxyingLinkRewriter;
use crate::policy::{ExpiryDirective, GadgetDocument, PolicyResolver, ResolvedPolicy, RewritePolicy};
use crate::utils::url::{media_kind, parse_charset, MediaKind, Url};

/// 渲染文档时使用的内容类型
const DOCUMENT_MIME_TYPE: &str = "text/html";

/// 改写结果的缓存提示
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cacheability {
    /// 可以无限期缓存（源站HTTP缓存头决定代理资源的过期）
    Indefinitely,
    /// 在给定时长后需要重新改写
    Ttl(Duration),
}

impl From<ExpiryDirective> for Cacheability {
    fn from(expiry: ExpiryDirective) -> Self {
        match expiry {
            ExpiryDirective::Http => Cacheability::Indefinitely,
            ExpiryDirective::Seconds(seconds) => Cacheability::Ttl(Duration::from_secs(seconds)),
        }
    }
}

/// 重写结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome<T = String> {
    /// 未改写，调用方应使用原始内容
    Unchanged,
    Rewritten {
        content: T,
        cacheability: Cacheability,
    },
}

impl<T> RewriteOutcome<T> {
    pub fn is_rewritten(&self) -> bool {
        matches!(self, RewriteOutcome::Rewritten { .. })
    }

    pub fn content(&self) -> Option<&T> {
        match self {
            RewriteOutcome::Unchanged => None,
            RewriteOutcome::Rewritten { content, .. } => Some(content),
        }
    }

    pub fn cacheability(&self) -> Option<Cacheability> {
        match self {
            RewriteOutcome::Unchanged => None,
            RewriteOutcome::Rewritten { cacheability, .. } => Some(*cacheability),
        }
    }

    pub fn map<U, F>(self, f: F) -> RewriteOutcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            RewriteOutcome::Unchanged => RewriteOutcome::Unchanged,
            RewriteOutcome::Rewritten {
                content,
                cacheability,
            } => RewriteOutcome::Rewritten {
                content: f(content),
                cacheability,
            },
        }
    }

    /// 改写后的内容，未改写时返回 `original`
    pub fn into_content_or(self, original: T) -> T {
        match self {
            RewriteOutcome::Unchanged => original,
            RewriteOutcome::Rewritten { content, .. } => content,
        }
    }
}

/// 发起抓取的请求
#[derive(Debug, Clone)]
pub struct ResourceRequest {
    pub url: Url,
    pub container: String,
    /// 覆盖响应 `Content-Type` 的改写类型
    pub rewrite_mime_type: Option<String>,
    /// 发起请求的 gadget 文档
    pub document: Option<Arc<GadgetDocument>>,
}

impl ResourceRequest {
    pub fn new(url: Url, container: impl Into<String>) -> Self {
        Self {
            url,
            container: container.into(),
            rewrite_mime_type: None,
            document: None,
        }
    }

    pub fn with_rewrite_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.rewrite_mime_type = Some(mime_type.into());
        self
    }

    pub fn with_document(mut self, document: Arc<GadgetDocument>) -> Self {
        self.document = Some(document);
        self
    }
}

/// 抓取到的响应
#[derive(Debug, Clone)]
pub struct ResourceResponse {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl ResourceResponse {
    pub fn new(content_type: Option<&str>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: content_type.map(str::to_string),
            body: body.into(),
        }
    }
}

/// 内容重写引擎
///
/// 可以在多个线程间共享；除策略缓存外没有可变状态。
pub struct RewriteEngine {
    resolver: PolicyResolver,
}

impl RewriteEngine {
    pub fn new(config: Arc<dyn ContainerConfig>) -> Self {
        Self {
            resolver: PolicyResolver::new(config),
        }
    }

    pub fn resolver(&self) -> &PolicyResolver {
        &self.resolver
    }

    /// 改写一段内容
    ///
    /// # 参数
    ///
    /// * `content` - 已解码的文本
    /// * `mime_type` - 内容类型，只看主体部分
    /// * `source_url` - 内容的来源地址，作为相对链接的基准
    /// * `container` - 容器ID
    /// * `document` - 可选的 gadget 文档，携带文档级的策略覆盖
    pub fn rewrite(
        &self,
        content: &str,
        mime_type: &str,
        source_url: &Url,
        container: &str,
        document: Option<&GadgetDocument>,
    ) -> RewriteOutcome {
        let ResolvedPolicy::Enabled(policy) = self.resolver.resolve(container, document) else {
            tracing::debug!("容器 {} 未启用内容重写", container);
            return RewriteOutcome::Unchanged;
        };

        rewrite_with_policy(content, media_kind(mime_type), source_url, &policy)
    }

    /// 改写抓取到的资源响应体
    ///
    /// 内容类型取请求的改写类型，否则取响应的 `Content-Type`；字符集取自响应的
    /// `Content-Type`（默认 UTF-8），输出使用相同的编码。
    ///
    /// # 错误
    ///
    /// 字符集无法识别或响应体无法按该字符集解码时返回错误。
    pub fn rewrite_response(
        &self,
        request: &ResourceRequest,
        response: &ResourceResponse,
    ) -> RewriteResult<RewriteOutcome<Vec<u8>>> {
        let Some(mime_type) = request
            .rewrite_mime_type
            .as_deref()
            .or(response.content_type.as_deref())
        else {
            tracing::debug!("响应缺少内容类型，跳过: {}", request.url);
            return Ok(RewriteOutcome::Unchanged);
        };

        let kind = media_kind(mime_type);
        if kind == MediaKind::Other {
            return Ok(RewriteOutcome::Unchanged);
        }

        let ResolvedPolicy::Enabled(policy) = self
            .resolver
            .resolve(&request.container, request.document.as_deref())
        else {
            return Ok(RewriteOutcome::Unchanged);
        };

        let encoding = response_encoding(response.content_type.as_deref())?;
        let text = decode_body(&response.body, encoding)?;

        let outcome = rewrite_with_policy(&text, kind, &request.url, &policy);
        Ok(outcome.map(|content| encode_body(&content, encoding)))
    }

    /// 改写即将渲染的文档
    ///
    /// 相对链接以当前视图的 href 为基准，没有时使用文档地址。
    pub fn rewrite_document(
        &self,
        document: &GadgetDocument,
        container: &str,
        markup: &str,
    ) -> RewriteOutcome {
        self.rewrite(
            markup,
            DOCUMENT_MIME_TYPE,
            document.base_url(),
            container,
            Some(document),
        )
    }
}

fn rewrite_with_policy(
    content: &str,
    kind: MediaKind,
    base_url: &Url,
    policy: &Arc<RewritePolicy>,
) -> RewriteOutcome {
    let cacheability = Cacheability::from(policy.expiry());

    match kind {
        MediaKind::Html => {
            let transformers = TransformerSet::for_policy(policy);
            if transformers.is_empty() {
                tracing::debug!("没有可用的标签转换器，跳过HTML: {}", base_url);
                return RewriteOutcome::Unchanged;
            }
            tracing::debug!("改写HTML: {} ({} 个标签转换器)", base_url, transformers.len());
            match walk(content, base_url, policy, &transformers) {
                Ok(content) => RewriteOutcome::Rewritten {
                    content,
                    cacheability,
                },
                Err(e) => {
                    tracing::warn!("HTML改写失败，保留原文 {}: {}", base_url, e);
                    RewriteOutcome::Unchanged
                }
            }
        }
        MediaKind::Css => {
            let Some(rewriter) = ProxyingLinkRewriter::from_policy(policy) else {
                tracing::debug!("未配置代理端点，跳过CSS: {}", base_url);
                return RewriteOutcome::Unchanged;
            };
            tracing::debug!("改写CSS: {}", base_url);
            RewriteOutcome::Rewritten {
                content: rewrite_css(content, base_url, &rewriter),
                cacheability,
            }
        }
        MediaKind::Other => RewriteOutcome::Unchanged,
    }
}

fn response_encoding(content_type: Option<&str>) -> RewriteResult<&'static Encoding> {
    match content_type.and_then(parse_charset) {
        None => Ok(UTF_8),
        Some(label) => Encoding::for_label_no_replacement(label.as_bytes())
            .ok_or(RewriteError::UnsupportedEncoding(label)),
    }
}

fn decode_body<'a>(body: &'a [u8], encoding: &'static Encoding) -> RewriteResult<Cow<'a, str>> {
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or(RewriteError::Undecodable(encoding.name()))
}

fn encode_body(text: &str, encoding: &'static Encoding) -> Vec<u8> {
    // encoding_rs 只能输出 UTF-8 兼容的编码
    if encoding == UTF_16LE {
        return text.encode_utf16().flat_map(u16::to_le_bytes).collect();
    }
    if encoding == UTF_16BE {
        return text.encode_utf16().flat_map(u16::to_be_bytes).collect();
    }

    let (bytes, _, unmappable) = encoding.encode(text);
    if unmappable {
        tracing::debug!("部分字符无法用 {} 表示，已写为数字字符引用", encoding.name());
    }
    bytes.into_owned()
}
