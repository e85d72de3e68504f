//! HTML重写模块
//!
//! - `element_handlers`: 标签转换器及其映射
//! - `script_merger`: 外部脚本合并状态机
//! - `walker`: 标签流遍历入口

pub mod element_handlers;
pub mod script_merger;
pub mod walker;

pub use element_handlers::{link_attribute, TagTransformer, TransformerSet, LINK_ATTRIBUTES};
pub use script_merger::{collect_scripts, MergeEvent, ScriptAction, ScriptElement, ScriptMerger};
pub use walker::walk;
