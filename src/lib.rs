//! # Gadget Rewrite
//!
//! gadget 容器的内容重写引擎：把HTML和CSS中的外部资源引用改写为经过代理的地址，
//! 并把连续的外部脚本合并为一个请求。
//!
//! ## 模块组织
//!
//! - `core` - 重写引擎与入口
//! - `policy` - 重写策略解析与缓存
//! - `config` - 容器配置
//! - `parsers` - HTML、CSS 与链接重写
//! - `utils` - URL 与媒体类型工具函数
//! - `error` - 错误类型
//! - `env` - 命令行使用的环境变量
//!
//! ## 示例
//!
//! ```rust
//! use std::sync::Arc;
//! use gadget_rewrite::config::JsonContainerConfig;
//! use gadget_rewrite::core::RewriteEngine;
//! use gadget_rewrite::utils::url::Url;
//!
//! let config = JsonContainerConfig::from_json_str(r#"{
//!     "default": {
//!         "gadgets.content-rewrite": {
//!             "include-tags": ["img"],
//!             "include-urls": ".*",
//!             "exclude-urls": "",
//!             "expires": "HTTP",
//!             "proxy-url": "http://p/?u="
//!         }
//!     }
//! }"#).unwrap();
//! let engine = RewriteEngine::new(Arc::new(config));
//!
//! let base = Url::parse("http://x/").unwrap();
//! let outcome = engine.rewrite("<img src=\"a.png\">", "text/html", &base, "default", None);
//! assert_eq!(
//!     outcome.content().map(String::as_str),
//!     Some("<img src=\"http://p/?u=http%3A%2F%2Fx%2Fa.png\">")
//! );
//! ```

pub mod config;
pub mod core;
pub mod env;
pub mod error;
pub mod parsers;
pub mod policy;
pub mod utils;

// Re-export commonly used items for convenience
pub use crate::core::{Cacheability, ResourceRequest, ResourceResponse, RewriteEngine, RewriteOutcome};
pub use config::{ContainerConfig, ContentRewriteConfig, ContentRewriteOverride, JsonContainerConfig};
pub use error::{RewriteError, RewriteResult};
pub use policy::{ExpiryDirective, GadgetDocument, PolicyResolver, ResolvedPolicy, RewritePolicy};
