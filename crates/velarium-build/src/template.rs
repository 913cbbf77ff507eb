//! Dockerfileテンプレートの展開
//!
//! テンプレートは `{version}` プレースホルダーを1種類だけ持つ。
//! `{{` と `}}` はそれぞれ波括弧1文字にエスケープされる。

use crate::error::{BuildError, Result};

pub const VERSION_PLACEHOLDER: &str = "version";

/// テンプレートにバージョンを埋め込んでDockerfileを生成
pub fn render_dockerfile(template: &str, version: &str) -> Result<String> {
    let mut rendered = String::with_capacity(template.len() + version.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    rendered.push('{');
                    continue;
                }

                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }

                if !closed {
                    return Err(BuildError::Template(format!(
                        "unterminated placeholder at byte {}",
                        pos
                    )));
                }
                if name != VERSION_PLACEHOLDER {
                    return Err(BuildError::Template(format!(
                        "unknown placeholder {{{}}} at byte {}",
                        name, pos
                    )));
                }
                rendered.push_str(version);
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    rendered.push('}');
                } else {
                    return Err(BuildError::Template(format!(
                        "single '}}' encountered at byte {}",
                        pos
                    )));
                }
            }
            _ => rendered.push(c),
        }
    }

    Ok(rendered)
}
