//! 策略解析与缓存
//!
//! - 容器默认策略缓存在 `DashMap` 中，按容器ID计算一次
//! - 文档策略缓存在文档自身的 `OnceLock` 字段中，每个文档实例最多计算一次
//!
//! 并发解析同一容器时可能重复计算，但结果相同且不可变，先发布者胜出。

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;

use crate::config::{ContainerConfig, ContentRewriteOverride};
use crate::utils::url::Url;

use super::{ResolvedPolicy, RewritePolicy};

/// 待渲染或作为请求来源的 gadget 文档
///
/// 由规格解析组件构建。重写策略在首次解析后写入 `rewrite_policy`，之后不再变化；
/// 规格重新加载时外部组件会构建新的文档实例。
#[derive(Debug)]
pub struct GadgetDocument {
    url: Url,
    view_href: Option<Url>,
    rewrite_override: Option<ContentRewriteOverride>,
    rewrite_policy: OnceLock<ResolvedPolicy>,
}

impl GadgetDocument {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            view_href: None,
            rewrite_override: None,
            rewrite_policy: OnceLock::new(),
        }
    }

    /// 当前视图的 href（type="url" 视图）
    pub fn with_view_href(mut self, href: Url) -> Self {
        self.view_href = Some(href);
        self
    }

    pub fn with_rewrite_override(mut self, rewrite_override: ContentRewriteOverride) -> Self {
        self.rewrite_override = Some(rewrite_override);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn view_href(&self) -> Option<&Url> {
        self.view_href.as_ref()
    }

    /// 渲染文档时解析相对链接的基准URL：视图 href 优先，否则为文档URL
    pub fn base_url(&self) -> &Url {
        self.view_href.as_ref().unwrap_or(&self.url)
    }

    pub fn rewrite_override(&self) -> Option<&ContentRewriteOverride> {
        self.rewrite_override.as_ref()
    }

    /// 已缓存的策略（尚未解析时为 `None`）
    pub fn cached_policy(&self) -> Option<&ResolvedPolicy> {
        self.rewrite_policy.get()
    }
}

/// 策略解析器，由引擎持有
pub struct PolicyResolver {
    config: Arc<dyn ContainerConfig>,
    defaults: DashMap<String, ResolvedPolicy>,
}

impl PolicyResolver {
    pub fn new(config: Arc<dyn ContainerConfig>) -> Self {
        Self {
            config,
            defaults: DashMap::new(),
        }
    }

    /// 解析（容器，文档）对应的策略
    pub fn resolve(&self, container: &str, document: Option<&GadgetDocument>) -> ResolvedPolicy {
        match document {
            Some(document) => self.for_document(container, document),
            None => self.container_default(container),
        }
    }

    /// 容器默认策略
    pub fn container_default(&self, container: &str) -> ResolvedPolicy {
        if let Some(cached) = self.defaults.get(container) {
            tracing::trace!("容器策略缓存命中: {}", container);
            return cached.value().clone();
        }

        let resolved = self.build(container, None);
        self.defaults
            .entry(container.to_string())
            .or_insert(resolved)
            .value()
            .clone()
    }

    /// 文档策略，计算一次后缓存在文档上
    pub fn for_document(&self, container: &str, document: &GadgetDocument) -> ResolvedPolicy {
        document
            .rewrite_policy
            .get_or_init(|| self.build(container, document.rewrite_override()))
            .clone()
    }

    /// 容器配置重新加载后丢弃该容器的缓存
    pub fn invalidate(&self, container: &str) {
        self.defaults.remove(container);
    }

    pub fn clear(&self) {
        self.defaults.clear();
    }

    fn build(
        &self,
        container: &str,
        doc_override: Option<&ContentRewriteOverride>,
    ) -> ResolvedPolicy {
        let built = self
            .config
            .content_rewrite(container)
            .and_then(|config| RewritePolicy::build(&config, doc_override));

        match built {
            Ok(resolved) => {
                tracing::debug!(
                    "容器 {} 的重写策略已解析 (启用: {})",
                    container,
                    resolved.is_enabled()
                );
                resolved
            }
            Err(e) => {
                tracing::warn!("容器 {} 的重写配置无效，禁用重写: {}", container, e);
                ResolvedPolicy::Disabled
            }
        }
    }
}
