//! 容器配置模块
//!
//! 容器配置由外部组件加载，这里只定义读取接口和 `gadgets.content-rewrite`
//! 配置段的结构。配置按容器ID组织，缺少配置段的容器回退到 `default` 容器。
//!
//! ```json
//! {
//!   "default": {
//!     "gadgets.content-rewrite": {
//!       "include-tags": ["img", "link", "script", "style", "embed"],
//!       "include-urls": ".*",
//!       "exclude-urls": "",
//!       "expires": "HTTP",
//!       "proxy-url": "http://www.test.com/dir/proxy?url=",
//!       "concat-url": "http://www.test.com/dir/concat?"
//!     }
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{RewriteError, RewriteResult};

/// 配置常量
pub mod constants {
    pub const CONTENT_REWRITE_KEY: &str = "gadgets.content-rewrite";
    pub const INCLUDE_TAGS_KEY: &str = "include-tags";
    pub const INCLUDE_URLS_KEY: &str = "include-urls";
    pub const EXCLUDE_URLS_KEY: &str = "exclude-urls";
    pub const EXPIRES_KEY: &str = "expires";
    pub const PROXY_URL_KEY: &str = "proxy-url";
    pub const CONCAT_URL_KEY: &str = "concat-url";

    /// 其他容器继承配置的父容器
    pub const DEFAULT_CONTAINER: &str = "default";
}

/// 标签列表：JSON数组或逗号分隔的字符串
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TagList {
    List(Vec<String>),
    Delimited(String),
}

impl TagList {
    /// 规范化后的标签名（去空白、小写、去空项）
    pub fn normalized(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            TagList::List(tags) => tags.iter().map(String::as_str).collect(),
            TagList::Delimited(tags) => tags.split(',').collect(),
        };
        raw.into_iter()
            .map(|tag| tag.trim().to_ascii_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect()
    }
}

/// 过期指令的原始取值：字符串或秒数
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExpiresValue {
    Seconds(u64),
    Text(String),
}

impl ExpiresValue {
    pub fn as_token(&self) -> String {
        match self {
            ExpiresValue::Seconds(seconds) => seconds.to_string(),
            ExpiresValue::Text(text) => text.trim().to_string(),
        }
    }
}

/// 容器级 `gadgets.content-rewrite` 配置段
///
/// 前四个键是必需的，缺失时整个容器的重写被禁用。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContentRewriteConfig {
    pub include_tags: TagList,
    pub include_urls: String,
    /// URL排除模式（不是标签列表）
    pub exclude_urls: String,
    pub expires: ExpiresValue,
    #[serde(default)]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub concat_url: Option<String>,
}

/// 文档级覆盖配置，由规格解析组件附加在文档上
///
/// 所有键都是可选的，缺省时沿用容器配置。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContentRewriteOverride {
    #[serde(default)]
    pub include_tags: Option<TagList>,
    #[serde(default)]
    pub include_urls: Option<String>,
    #[serde(default)]
    pub exclude_urls: Option<String>,
    #[serde(default)]
    pub expires: Option<ExpiresValue>,
}

impl ContentRewriteOverride {
    pub fn from_json_str(json: &str) -> RewriteResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// 容器配置读取接口
pub trait ContainerConfig: Send + Sync {
    /// 读取指定容器的某个配置项
    fn get_json(&self, container: &str, key: &str) -> Option<&Value>;

    /// 读取并反序列化内容重写配置段
    fn content_rewrite(&self, container: &str) -> RewriteResult<ContentRewriteConfig> {
        let section = self
            .get_json(container, constants::CONTENT_REWRITE_KEY)
            .ok_or_else(|| RewriteError::missing_key(constants::CONTENT_REWRITE_KEY))?;
        Ok(ContentRewriteConfig::deserialize(section)?)
    }
}

/// 基于JSON文档的容器配置
#[derive(Debug, Clone, Default)]
pub struct JsonContainerConfig {
    containers: HashMap<String, Map<String, Value>>,
}

impl JsonContainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从已解析的JSON值构建，顶层必须是 `容器ID -> 配置对象` 的映射
    pub fn from_value(value: Value) -> RewriteResult<Self> {
        let Value::Object(root) = value else {
            return Err(RewriteError::Config("容器配置顶层必须是对象".to_string()));
        };

        let mut containers = HashMap::with_capacity(root.len());
        for (container, settings) in root {
            match settings {
                Value::Object(settings) => {
                    containers.insert(container, settings);
                }
                _ => {
                    return Err(RewriteError::Config(format!(
                        "容器 `{}` 的配置必须是对象",
                        container
                    )))
                }
            }
        }

        Ok(Self { containers })
    }

    pub fn from_json_str(json: &str) -> RewriteResult<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> RewriteResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// 设置单个容器的某个配置项
    pub fn with_container(mut self, container: &str, key: &str, value: Value) -> Self {
        self.containers
            .entry(container.to_string())
            .or_default()
            .insert(key.to_string(), value);
        self
    }
}

impl ContainerConfig for JsonContainerConfig {
    fn get_json(&self, container: &str, key: &str) -> Option<&Value> {
        self.containers
            .get(container)
            .and_then(|settings| settings.get(key))
            .or_else(|| {
                self.containers
                    .get(constants::DEFAULT_CONTAINER)
                    .and_then(|settings| settings.get(key))
            })
    }
}
