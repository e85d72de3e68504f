//! 脚本合并集成测试
//!
//! 验证合并批次的边界和执行顺序

use serde_json::json;

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{TestConfigBuilder, TestEnvironment, DEFAULT_CONCAT_BASE};

fn concat(paths: &[&str]) -> String {
    let members: Vec<String> = paths
        .iter()
        .map(|path| {
            gadget_rewrite::utils::url::encode_url(&format!("http://www.example.org/dir/{}", path))
        })
        .collect();
    format!(
        "<script src=\"{}{}\"></script>",
        DEFAULT_CONCAT_BASE,
        members.join(",")
    )
}

fn merging_env() -> TestEnvironment {
    TestEnvironment::new(
        TestConfigBuilder::new()
            .set("include-tags", json!(["script"]))
            .set("exclude-urls", json!("nomerge"))
            .build(),
    )
}

#[test]
fn test_two_batches_around_ineligible_script() {
    let env = merging_env();
    let html = "<script src=\"1.js\"></script><script src=\"2.js\"></script>\
                <script src=\"nomerge/3.js\"></script>\
                <script src=\"4.js\"></script><script src=\"5.js\"></script>";
    assert_eq!(
        env.rewrite_html(html),
        format!(
            "{}<script src=\"nomerge/3.js\"></script>{}",
            concat(&["1.js", "2.js"]),
            concat(&["4.js", "5.js"])
        )
    );
}

#[test]
fn test_batch_is_inserted_at_first_member() {
    let env = merging_env();
    let html = "<head>\n  <script src=\"a.js\"></script>\n  <script src=\"b.js\"></script>\n</head>";
    assert_eq!(
        env.rewrite_html(html),
        format!("<head>\n  {}\n  \n</head>", concat(&["a.js", "b.js"]))
    );
}

#[test]
fn test_inline_script_keeps_its_position() {
    let env = merging_env();
    let html = "<script src=\"lib.js\"></script>\
                <script>lib.init();</script>\
                <script src=\"app.js\"></script>";
    assert_eq!(
        env.rewrite_html(html),
        format!(
            "{}<script>lib.init();</script>{}",
            concat(&["lib.js"]),
            concat(&["app.js"])
        )
    );
}

#[test]
fn test_async_and_typed_scripts_are_boundaries() {
    let env = merging_env();
    let html = "<script src=\"a.js\"></script>\
                <script async src=\"b.js\"></script>\
                <script type=\"text/x-template\" src=\"c.html\"></script>\
                <script type=\"text/javascript\" src=\"d.js\"></script>";
    assert_eq!(
        env.rewrite_html(html),
        format!(
            "{}<script async src=\"b.js\"></script>\
             <script type=\"text/x-template\" src=\"c.html\"></script>{}",
            concat(&["a.js"]),
            concat(&["d.js"])
        )
    );
}

#[test]
fn test_comment_between_scripts_splits_batch() {
    let env = merging_env();
    let html = "<script src=\"a.js\"></script><!-- x --><script src=\"b.js\"></script>";
    assert_eq!(
        env.rewrite_html(html),
        format!("{}<!-- x -->{}", concat(&["a.js"]), concat(&["b.js"]))
    );
}

#[test]
fn test_refresh_is_appended_to_concat_url() {
    let env = TestEnvironment::new(
        TestConfigBuilder::new()
            .set("include-tags", json!(["script"]))
            .set("expires", json!("600"))
            .build(),
    );
    let html = "<script src=\"a.js\"></script><script src=\"b.js\"></script>";
    let merged = env.rewrite_html(html);
    assert!(merged.ends_with("b.js&amp;refresh=600\"></script>"), "{}", merged);
    assert_eq!(merged.matches("<script").count(), 1);
}

#[test]
fn test_unclosed_script_is_not_merged() {
    let env = merging_env();
    let html = "<p>x</p><script src=\"a.js\">";
    assert_eq!(env.rewrite_html(html), html);

    let html = "<script src=\"a.js\"></script><script src=\"b.js\">";
    assert_eq!(
        env.rewrite_html(html),
        format!("{}<script src=\"b.js\">", concat(&["a.js"]))
    );
}

#[test]
fn test_script_text_is_never_reparsed() {
    let env = TestEnvironment::default();
    let html = "<script><!--document.write('<script src=x.js></script>'); \
                var s='<img src=a.png>';--></script>\
                <noembed><img src=b.png></noembed>";
    assert_eq!(env.rewrite_html(html), html);
}
