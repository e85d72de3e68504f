// 集成测试公共模块
//
// 提供测试用的容器配置和引擎构造工具

use std::sync::Arc;

use serde_json::{json, Value};

use gadget_rewrite::config::{constants, JsonContainerConfig};
use gadget_rewrite::core::RewriteEngine;
use gadget_rewrite::utils::url::Url;

pub const DEFAULT_PROXY_BASE: &str = "http://www.test.com/dir/proxy?url=";
pub const DEFAULT_CONCAT_BASE: &str = "http://www.test.com/dir/concat?";
pub const DEFAULT_CONTAINER: &str = "shindig";
pub const SPEC_URL: &str = "http://www.example.org/dir/g.xml";

/// 默认的 content-rewrite 配置段
pub fn rewrite_section() -> Value {
    json!({
        "include-tags": ["embed", "img", "script", "link", "style"],
        "include-urls": ".*",
        "exclude-urls": "",
        "expires": "HTTP",
        "proxy-url": DEFAULT_PROXY_BASE,
        "concat-url": DEFAULT_CONCAT_BASE
    })
}

/// 测试配置构建器
pub struct TestConfigBuilder {
    section: Value,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            section: rewrite_section(),
        }
    }

    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.section[key] = value;
        self
    }

    pub fn remove(mut self, key: &str) -> Self {
        if let Value::Object(map) = &mut self.section {
            map.remove(key);
        }
        self
    }

    pub fn section(&self) -> &Value {
        &self.section
    }

    pub fn build(self) -> JsonContainerConfig {
        JsonContainerConfig::new().with_container(
            DEFAULT_CONTAINER,
            constants::CONTENT_REWRITE_KEY,
            self.section,
        )
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 测试环境
pub struct TestEnvironment {
    pub engine: RewriteEngine,
    pub spec_url: Url,
}

impl TestEnvironment {
    pub fn new(config: JsonContainerConfig) -> Self {
        Self {
            engine: RewriteEngine::new(Arc::new(config)),
            spec_url: Url::parse(SPEC_URL).expect("valid spec url"),
        }
    }

    /// 以 text/html 在默认容器下改写，未改写时返回原文
    pub fn rewrite_html(&self, html: &str) -> String {
        self.engine
            .rewrite(html, "text/html", &self.spec_url, DEFAULT_CONTAINER, None)
            .into_content_or(html.to_string())
    }

    pub fn rewrite_css(&self, css: &str) -> String {
        self.engine
            .rewrite(css, "text/css", &self.spec_url, DEFAULT_CONTAINER, None)
            .into_content_or(css.to_string())
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new(TestConfigBuilder::new().build())
    }
}

/// 代理后的地址
pub fn proxied(url: &str) -> String {
    format!("{}{}", DEFAULT_PROXY_BASE, gadget_rewrite::utils::url::encode_url(url))
}
