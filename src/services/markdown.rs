//! Markdown 渲染
//! 题目描述与讲解以 Markdown 存储，详情页渲染为 HTML

use pulldown_cmark::{html, Options, Parser};

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// 将 Markdown 文本渲染为 HTML 片段
pub fn render_markdown(source: &str) -> String {
    let parser = Parser::new_ext(source, options());
    let mut output = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_paragraph_and_code() {
        let html = render_markdown("Use `HashMap` here.\n\n```rust\nlet x = 1;\n```");
        assert!(html.contains("<p>Use <code>HashMap</code> here.</p>"));
        assert!(html.contains("<pre><code class=\"language-rust\">let x = 1;\n</code></pre>"));
    }

    #[test]
    fn test_extensions_enabled() {
        let html = render_markdown("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~old~~\n\n- [x] done");
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>old</del>"));
        assert!(html.contains("checkbox"));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(render_markdown(""), "");
    }
}
