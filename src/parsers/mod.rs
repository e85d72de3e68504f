//! # 解析器模块
//!
//! 负责定位并改写HTML与CSS中的资源引用：
//!
//! - `html` - 基于 lol_html 的标签转换器、脚本合并、标签流遍历
//! - `css` - 基于 cssparser 的 `url(...)` 替换
//! - `link_rewriter` - 代理链接与合并脚本URL的构造

pub mod css;
pub mod html;
pub mod link_rewriter;

pub use css::rewrite_css;
pub use html::{walk, TagTransformer, TransformerSet};
pub use link_rewriter::{build_concat_url, eligible_url, LinkRewriter, ProxyingLinkRewriter};
