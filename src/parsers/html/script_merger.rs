//! 脚本合并器
//!
//! 把连续的、可改写的外部脚本合并为一个请求合并端点的 `<script>`，
//! 替换批次第一个成员，其余成员删除。
//!
//! 流式改写无法向前看，所以合并分两遍完成：第一遍 [`collect_scripts`] 记录文档中的脚本和
//! 批次边界，[`ScriptMerger::plan`] 据此为每个脚本生成 [`ScriptAction`]，第二遍按序执行。
//!
//! 状态：
//!
//! - `Idle`：没有待合并的脚本
//! - `Accumulating`：已缓存一个或多个脚本，等待边界
//!
//! 遇到其他任何内容（内联脚本、不可合并的外部脚本、其他标签、注释、非空白文本、文档结束）
//! 时输出批次。批次之间只有空白文本时不会中断合并。

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use lol_html::html_content::{EndTag, Element};
use lol_html::{doc_comments, doc_text, element, rewrite_str, text, HandlerResult, RewriteStrSettings};

use crate::error::RewriteResult;
use crate::parsers::link_rewriter::{build_concat_url, eligible_url};
use crate::policy::RewritePolicy;
use crate::utils::url::Url;

/// 出现即不可合并的脚本属性
const BLOCKING_ATTRIBUTES: &[&str] = &["async", "defer", "integrity", "nomodule"];

/// 可以合并的脚本类型（不区分大小写，忽略参数）
const SCRIPT_TYPES: &[&str] = &[
    "text/javascript",
    "application/javascript",
    "application/x-javascript",
    "text/ecmascript",
    "application/ecmascript",
];

/// 第一遍遍历看到的一个 `<script>` 元素
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptElement {
    pub src: Option<String>,
    pub script_type: Option<String>,
    /// 带有任一阻止合并的属性
    pub blocking: bool,
    /// 内容为空或只有空白
    pub blank_body: bool,
    /// 源文本中存在结束标签
    pub closed: bool,
}

impl ScriptElement {
    /// 读取开始标签上的属性，内容和结束标签由后续事件补全
    pub fn from_element(el: &Element<'_, '_>) -> Self {
        let decoded = |name: &str| {
            el.get_attribute(name)
                .map(|value| html_escape::decode_html_entities(&value).into_owned())
        };
        Self {
            src: decoded("src"),
            script_type: decoded("type"),
            blocking: BLOCKING_ATTRIBUTES
                .iter()
                .any(|attribute| el.has_attribute(attribute)),
            blank_body: true,
            closed: false,
        }
    }

    fn is_external(&self) -> bool {
        self.src.is_some() && self.blank_body && self.closed
    }

    fn has_script_type(&self) -> bool {
        match self.script_type.as_deref() {
            None => true,
            Some(value) => {
                let essence = value.split(';').next().unwrap_or_default().trim();
                essence.is_empty()
                    || SCRIPT_TYPES
                        .iter()
                        .any(|candidate| candidate.eq_ignore_ascii_case(essence))
            }
        }
    }
}

/// 第一遍遍历的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeEvent {
    Script(ScriptElement),
    /// 结束当前批次的内容
    Boundary,
}

/// 第二遍对每个 `<script>` 元素的处理，按文档顺序排列
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptAction {
    Keep,
    /// 用合并后的脚本替换整个元素
    Replace(String),
    Remove,
}

#[derive(Debug, Default)]
struct ScriptCollector {
    events: Vec<MergeEvent>,
    in_script: bool,
}

impl ScriptCollector {
    fn boundary(&mut self) {
        if self.events.last() != Some(&MergeEvent::Boundary) {
            self.events.push(MergeEvent::Boundary);
        }
    }

    fn current_script(&mut self) -> Option<&mut ScriptElement> {
        match self.events.last_mut() {
            Some(MergeEvent::Script(script)) => Some(script),
            _ => None,
        }
    }
}

/// 第一遍：记录文档中的脚本元素和批次边界
pub fn collect_scripts(html: &str) -> RewriteResult<Vec<MergeEvent>> {
    let collector = Rc::new(RefCell::new(ScriptCollector::default()));

    let on_element = Rc::clone(&collector);
    let on_script_text = Rc::clone(&collector);
    let on_comment = Rc::clone(&collector);
    let on_text = Rc::clone(&collector);

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("*", move |el| {
                    let is_script = el.tag_name() == "script";
                    {
                        let mut state = on_element.borrow_mut();
                        if is_script {
                            state.events.push(MergeEvent::Script(ScriptElement::from_element(el)));
                            state.in_script = true;
                        } else {
                            state.boundary();
                        }
                    }

                    if let Some(handlers) = el.end_tag_handlers() {
                        let state = Rc::clone(&on_element);
                        handlers.push(Box::new(move |_: &mut EndTag<'_>| -> HandlerResult {
                            let mut state = state.borrow_mut();
                            if is_script {
                                state.in_script = false;
                                if let Some(script) = state.current_script() {
                                    script.closed = true;
                                }
                            } else {
                                state.boundary();
                            }
                            Ok(())
                        }));
                    }
                    Ok(())
                }),
                text!("script", move |chunk| {
                    if !chunk.as_str().trim().is_empty() {
                        if let Some(script) = on_script_text.borrow_mut().current_script() {
                            script.blank_body = false;
                        }
                    }
                    Ok(())
                }),
            ],
            document_content_handlers: vec![
                doc_comments!(move |_| {
                    on_comment.borrow_mut().boundary();
                    Ok(())
                }),
                doc_text!(move |chunk| {
                    let mut state = on_text.borrow_mut();
                    if !state.in_script && !chunk.as_str().trim().is_empty() {
                        state.boundary();
                    }
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )?;

    let events = std::mem::take(&mut collector.borrow_mut().events);
    Ok(events)
}

#[derive(Debug)]
enum MergeState {
    Idle,
    Accumulating { first: usize, pending: Vec<Url> },
}

/// 单次文档重写使用的脚本合并器，不跨调用共享
#[derive(Debug)]
pub struct ScriptMerger {
    policy: Arc<RewritePolicy>,
    concat_url: String,
    state: MergeState,
    actions: Vec<ScriptAction>,
}

impl ScriptMerger {
    pub fn new(policy: Arc<RewritePolicy>, concat_url: impl Into<String>) -> Self {
        Self {
            policy,
            concat_url: concat_url.into(),
            state: MergeState::Idle,
            actions: Vec::new(),
        }
    }

    /// 使用策略中配置的合并端点，未配置时返回 `None`
    pub fn from_policy(policy: &Arc<RewritePolicy>) -> Option<Self> {
        let concat_url = policy.concat_url()?.to_string();
        Some(Self::new(Arc::clone(policy), concat_url))
    }

    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, MergeState::Accumulating { .. })
    }

    /// 可以加入批次的脚本返回其绝对地址
    pub fn mergeable_url(&self, script: &ScriptElement, base_url: &Url) -> Option<Url> {
        if !script.is_external() || !script.has_script_type() || script.blocking {
            return None;
        }
        let src = script.src.as_deref()?;
        eligible_url(&self.policy, src, base_url)
    }

    /// 处理下一个脚本元素
    pub fn push_script(&mut self, script: &ScriptElement, base_url: &Url) {
        let index = self.actions.len();
        match self.mergeable_url(script, base_url) {
            Some(url) => {
                tracing::trace!("脚本加入合并批次: {}", url);
                match &mut self.state {
                    MergeState::Accumulating { pending, .. } => pending.push(url),
                    MergeState::Idle => {
                        self.state = MergeState::Accumulating {
                            first: index,
                            pending: vec![url],
                        };
                    }
                }
                self.actions.push(ScriptAction::Remove);
            }
            None => {
                self.flush();
                self.actions.push(ScriptAction::Keep);
            }
        }
    }

    /// 结束当前批次，合并后的脚本替换批次第一个成员
    pub fn flush(&mut self) {
        let MergeState::Accumulating { first, pending } =
            std::mem::replace(&mut self.state, MergeState::Idle)
        else {
            return;
        };

        let concat = build_concat_url(&self.concat_url, &pending, self.policy.expiry());
        tracing::debug!("合并 {} 个脚本", pending.len());
        self.actions[first] = ScriptAction::Replace(format!(
            "<script src=\"{}\"></script>",
            html_escape::encode_double_quoted_attribute(&concat)
        ));
    }

    /// 文档结束，返回每个脚本的处理方式
    pub fn finish(mut self) -> Vec<ScriptAction> {
        self.flush();
        self.actions
    }

    /// 按第一遍的事件生成处理计划
    pub fn plan(mut self, events: &[MergeEvent], base_url: &Url) -> Vec<ScriptAction> {
        for event in events {
            match event {
                MergeEvent::Script(script) => self.push_script(script, base_url),
                MergeEvent::Boundary => self.flush(),
            }
        }
        self.finish()
    }
}
