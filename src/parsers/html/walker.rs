//! 标签流遍历器
//!
//! HTML 重写的驱动入口：对转换器映射中存在的标签注册对应的处理器，
//! 其余标签、文本、注释按源文本原样输出，文档结构保持不变。

use std::sync::Arc;

use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, text, RewriteStrSettings};

use crate::error::RewriteResult;
use crate::parsers::link_rewriter::ProxyingLinkRewriter;
use crate::policy::RewritePolicy;
use crate::utils::url::Url;

use super::element_handlers::{rewrite_link_element, StyleBuffer, TagTransformer, TransformerSet, SCRIPT_TAG};
use super::script_merger::{collect_scripts, ScriptAction, ScriptMerger};

/// 遍历并改写整个HTML文档
///
/// # 参数
///
/// * `html` - 文档源文本
/// * `base_url` - 解析相对链接的基准URL
/// * `policy` - 已启用的重写策略
/// * `transformers` - 由策略构造的转换器映射
///
/// # 返回值
///
/// 改写后的文档。映射为空时结果与输入逐字节相同。
pub fn walk(
    html: &str,
    base_url: &Url,
    policy: &Arc<RewritePolicy>,
    transformers: &TransformerSet,
) -> RewriteResult<String> {
    let link_rewriter = ProxyingLinkRewriter::from_policy(policy);
    let script_actions = match transformers.get(SCRIPT_TAG) {
        Some(TagTransformer::ScriptMerge) => match ScriptMerger::from_policy(policy) {
            Some(merger) => merger.plan(&collect_scripts(html)?, base_url),
            None => Vec::new(),
        },
        _ => Vec::new(),
    };

    let mut handlers = Vec::with_capacity(transformers.len());
    for (tag, transformer) in transformers.iter() {
        let Some(rewriter) = link_rewriter.as_ref() else {
            break;
        };
        match transformer {
            TagTransformer::GenericLink => {
                let style_attributes = transformers.rewrites_style_attributes();
                handlers.push(element!(tag, move |el| {
                    rewrite_link_element(el, rewriter, base_url, style_attributes)
                }));
            }
            TagTransformer::InlineStyle => {
                let mut buffer = StyleBuffer::default();
                handlers.push(text!(tag, move |chunk| buffer.push(chunk, rewriter, base_url)));
            }
            // 脚本按第一遍的计划处理
            TagTransformer::ScriptMerge => {}
        }
    }

    if script_actions
        .iter()
        .any(|action| *action != ScriptAction::Keep)
    {
        let mut actions = script_actions.into_iter();
        handlers.push(element!(SCRIPT_TAG, move |el| {
            match actions.next() {
                Some(ScriptAction::Replace(merged)) => el.replace(&merged, ContentType::Html),
                Some(ScriptAction::Remove) => el.remove(),
                Some(ScriptAction::Keep) | None => {}
            }
            Ok(())
        }));
    }

    let rewritten = rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    )?;
    Ok(rewritten)
}
