//! CSS 重写模块
//!
//! 使用 cssparser 逐个扫描 token，只替换 `url(...)` 引用，其余文本（选择器、属性、
//! 注释、字符串、@import 等）都按源文本原样复制。注释和字符串中的 `url(` 不会被
//! 识别为引用，因为它们在词法层面就是单个 token。
//!
//! 格式错误的CSS（未闭合的字符串、注释或 `url(`）从出错处起原样保留，不会报错。
//!
//! # 使用示例
//!
//! ```rust
//! use gadget_rewrite::parsers::css::rewrite_css;
//! use gadget_rewrite::utils::url::Url;
//!
//! let base = Url::parse("http://x/dir/").unwrap();
//! let upper = |link: &str, _: &Url| link.to_uppercase();
//! let css = rewrite_css("a{background:url(b.png)}", &base, &upper);
//! assert_eq!(css, "a{background:url(\"B.PNG\")}");
//! ```

use cssparser::{serialize_string, ParseError, Parser, ParserInput, Token};

use crate::parsers::link_rewriter::LinkRewriter;
use crate::utils::url::Url;

/// 改写样式表中的全部 `url(...)` 引用
///
/// # 参数
///
/// * `css` - 样式表文本
/// * `base_url` - 样式表自身的地址，用于解析相对引用
/// * `rewriter` - 链接重写器
///
/// # 返回值
///
/// 改写后的样式表。改写结果与原引用相同的 `url(...)` 保持原样。
pub fn rewrite_css(css: &str, base_url: &Url, rewriter: &dyn LinkRewriter) -> String {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut result = String::with_capacity(css.len() + css.len() / 10);

    rewrite_tokens(&mut parser, base_url, rewriter, &mut result);

    result
}

/// 格式化带引号的CSS字符串
pub fn format_quoted_string(string: &str) -> String {
    let mut res: String = "".to_string();
    let _ = serialize_string(string, &mut res);
    res
}

fn rewrite_tokens<'i, 't>(
    parser: &mut Parser<'i, 't>,
    base_url: &Url,
    rewriter: &dyn LinkRewriter,
    result: &mut String,
) {
    loop {
        let token_offset = parser.position();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        match token {
            // url(foo.png)
            Token::UnquotedUrl(ref reference) => {
                let original = parser.slice_from(token_offset);
                push_url(result, original, reference, base_url, rewriter);
            }
            // url("foo.png")
            Token::Function(ref name) if name.eq_ignore_ascii_case("url") => {
                let reference = parser
                    .parse_nested_block(|nested| {
                        Ok::<_, ParseError<'i, ()>>(quoted_url_argument(nested))
                    })
                    .unwrap_or(None);
                let original = parser.slice_from(token_offset);
                match reference {
                    Some(reference) => push_url(result, original, &reference, base_url, rewriter),
                    None => result.push_str(original),
                }
            }
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => {
                result.push_str(parser.slice_from(token_offset));

                let mut block_end = None;
                let _ = parser.parse_nested_block(|nested| {
                    rewrite_tokens(nested, base_url, rewriter, result);
                    block_end = Some(nested.position());
                    Ok::<_, ParseError<'i, ()>>(())
                });
                // 未闭合的块没有结束符
                if let Some(block_end) = block_end {
                    result.push_str(parser.slice_from(block_end));
                }
            }
            _ => result.push_str(parser.slice_from(token_offset)),
        }
    }
}

/// 提取 `url(` 函数中唯一的带引号参数
fn quoted_url_argument(parser: &mut Parser) -> Option<String> {
    let mut reference = None;
    let mut well_formed = true;

    while let Ok(token) = parser.next_including_whitespace_and_comments() {
        match token {
            Token::WhiteSpace(_) => {}
            Token::QuotedString(value) if reference.is_none() => {
                reference = Some(String::from(&**value));
            }
            _ => well_formed = false,
        }
    }

    reference.filter(|_| well_formed)
}

fn push_url(
    result: &mut String,
    original: &str,
    reference: &str,
    base_url: &Url,
    rewriter: &dyn LinkRewriter,
) {
    // 未闭合的 url( 原样保留
    if !original.ends_with(')') || reference.trim().is_empty() {
        result.push_str(original);
        return;
    }

    let rewritten = rewriter.rewrite(reference, base_url);
    if rewritten == reference {
        result.push_str(original);
        return;
    }

    result.push_str("url(");
    result.push_str(&format_quoted_string(&rewritten));
    result.push(')');
}
