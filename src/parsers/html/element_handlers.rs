//! 标签转换器
//!
//! 驱动器遍历标签流时按标签名选择转换器。支持的转换器是一个封闭集合：
//!
//! - `GenericLink`：改写 img/embed/link/script 上承载URL的属性
//! - `InlineStyle`：`<style>` 元素的内容交给CSS重写器
//! - `ScriptMerge`：外部脚本交给脚本合并器
//!
//! 标签名到转换器的映射在构造 [`TransformerSet`] 时一次性确定，
//! 只有同时出现在策略包含标签集合和支持标签集合中的标签才会被处理。

use std::collections::HashMap;

use lol_html::html_content::{ContentType, Element, TextChunk};
use lol_html::HandlerResult;

use crate::parsers::css::rewrite_css;
use crate::parsers::link_rewriter::LinkRewriter;
use crate::policy::RewritePolicy;
use crate::utils::url::Url;

/// 支持的标签及其承载URL的属性
pub const LINK_ATTRIBUTES: &[(&str, &str)] = &[
    ("img", "src"),
    ("embed", "src"),
    ("link", "href"),
    ("script", "src"),
];

pub(crate) const STYLE_TAG: &str = "style";
pub(crate) const SCRIPT_TAG: &str = "script";
const STYLE_ATTRIBUTE: &str = "style";

/// 标签转换器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagTransformer {
    GenericLink,
    InlineStyle,
    ScriptMerge,
}

/// 标签承载URL的属性名
pub fn link_attribute(tag: &str) -> Option<&'static str> {
    LINK_ATTRIBUTES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(tag))
        .map(|(_, attribute)| *attribute)
}

/// 一次HTML重写使用的转换器映射
#[derive(Debug, Clone, Default)]
pub struct TransformerSet {
    transformers: HashMap<&'static str, TagTransformer>,
    rewrite_style_attributes: bool,
}

impl TransformerSet {
    /// 按策略构造映射
    ///
    /// - 配置了代理端点时，包含标签中的链接标签使用 `GenericLink`；
    ///   包含 `style` 时 `<style>` 使用 `InlineStyle`，并同时改写已处理标签的 `style` 属性
    /// - 配置了合并端点且包含 `script` 时，`<script>` 改用 `ScriptMerge`
    pub fn for_policy(policy: &RewritePolicy) -> Self {
        let mut set = Self::default();

        if policy.proxy_url().is_some() {
            for &(tag, _) in LINK_ATTRIBUTES {
                if policy.includes_tag(tag) {
                    set.transformers.insert(tag, TagTransformer::GenericLink);
                }
            }
            if policy.includes_tag(STYLE_TAG) {
                set.transformers.insert(STYLE_TAG, TagTransformer::InlineStyle);
                set.rewrite_style_attributes = true;
            }
        }

        if policy.concat_url().is_some() && policy.includes_tag(SCRIPT_TAG) {
            set.transformers.insert(SCRIPT_TAG, TagTransformer::ScriptMerge);
        }

        set
    }

    /// 标签对应的转换器，`tag` 须为小写
    pub fn get(&self, tag: &str) -> Option<TagTransformer> {
        self.transformers.get(tag).copied()
    }

    /// 按标签名排序遍历，保证处理器注册顺序稳定
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, TagTransformer)> + '_ {
        let mut entries: Vec<_> = self
            .transformers
            .iter()
            .map(|(tag, transformer)| (*tag, *transformer))
            .collect();
        entries.sort_by_key(|(tag, _)| *tag);
        entries.into_iter()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    pub fn rewrites_style_attributes(&self) -> bool {
        self.rewrite_style_attributes
    }

    pub fn len(&self) -> usize {
        self.transformers.len()
    }
}

fn decoded_attribute(el: &Element<'_, '_>, name: &str) -> Option<String> {
    el.get_attribute(name)
        .map(|value| html_escape::decode_html_entities(&value).into_owned())
}

/// 改写链接标签的URL属性（以及可选的 `style` 属性）
///
/// 值没有变化的属性不会被改动，标签保持源文本。
pub fn rewrite_link_element(
    el: &mut Element<'_, '_>,
    rewriter: &dyn LinkRewriter,
    base_url: &Url,
    rewrite_style_attribute: bool,
) -> HandlerResult {
    if let Some(attribute) = link_attribute(&el.tag_name()) {
        if let Some(link) = decoded_attribute(el, attribute) {
            let rewritten = rewriter.rewrite(&link, base_url);
            if rewritten != link {
                el.set_attribute(attribute, &rewritten)?;
            }
        }
    }

    if rewrite_style_attribute {
        if let Some(style) = decoded_attribute(el, STYLE_ATTRIBUTE) {
            let rewritten = rewrite_css(&style, base_url, rewriter);
            if rewritten != style {
                el.set_attribute(STYLE_ATTRIBUTE, &rewritten)?;
            }
        }
    }

    Ok(())
}

/// `<style>` 元素内容的缓冲区
///
/// 文本可能分多个块到达，块先被移除，在文本节点的最后一块处整体改写后输出。
#[derive(Debug, Default)]
pub struct StyleBuffer {
    css: String,
}

impl StyleBuffer {
    pub fn push(
        &mut self,
        chunk: &mut TextChunk<'_>,
        rewriter: &dyn LinkRewriter,
        base_url: &Url,
    ) -> HandlerResult {
        self.css.push_str(chunk.as_str());
        if !chunk.last_in_text_node() {
            chunk.remove();
            return Ok(());
        }

        let css = std::mem::take(&mut self.css);
        let rewritten = rewrite_css(&css, base_url, rewriter);
        chunk.replace(&rewritten, ContentType::Html);
        Ok(())
    }
}
