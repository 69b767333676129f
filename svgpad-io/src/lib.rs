pub mod identity;
pub mod reader;

use std::fs;
use std::path::Path;

use svgpad_core::markup::{Element, Fragment, Node};
use thiserror::Error;
use tracing::debug;

pub use identity::{FileRecord, IdentityError, WriteOutcome, content_hash};
pub use reader::{AbortHandle, DisplayHandle, DisplayHandles, ReadError, SvgFileReader};

/// SVG 文档的 MIME 类型。
pub const SVG_MIME_TYPE: &str = "image/svg+xml";

#[derive(Debug, Error)]
pub enum IoError {
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid document structure: {0}")]
    InvalidDocument(String),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Fragment, IoError>;
}

pub trait DocumentSaver {
    fn save(&self, markup: &Fragment, path: &Path) -> Result<(), IoError>;
}

pub struct SvgFacade;

impl SvgFacade {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SvgFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for SvgFacade {
    fn load(&self, path: &Path) -> Result<Fragment, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        parse_markup(&data)
    }
}

impl DocumentSaver for SvgFacade {
    fn save(&self, markup: &Fragment, path: &Path) -> Result<(), IoError> {
        let content = markup.to_markup();
        fs::write(path, content.as_bytes()).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), bytes = content.len(), "已写出 SVG 文档");
        Ok(())
    }
}

/// 把 SVG 文本解析为节点片段。文本与属性值保持转义形式。
pub fn parse_markup(source: &str) -> Result<Fragment, IoError> {
    MarkupParser::new(source)
        .parse()
        .map_err(|err| IoError::InvalidDocument(err.message))
}

#[derive(Debug)]
struct MarkupError {
    message: String,
}

impl MarkupError {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

struct MarkupParser<'a> {
    reader: MarkupReader<'a>,
    stack: Vec<Element>,
    top_level: Vec<Node>,
}

impl<'a> MarkupParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: MarkupReader::new(source),
            stack: Vec::new(),
            top_level: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Fragment, MarkupError> {
        while !self.reader.at_end() {
            if self.reader.starts_with("<!--") {
                let comment = self.reader.take_delimited("<!--", "-->")?;
                self.append(Node::Comment(comment.to_string()));
            } else if self.reader.starts_with("<![CDATA[") {
                let start = self.reader.position();
                self.reader.take_delimited("<![CDATA[", "]]>")?;
                let raw = self.reader.slice_from(start);
                self.append(Node::Raw(raw.to_string()));
            } else if self.reader.starts_with("<?") {
                let start = self.reader.position();
                self.reader.take_delimited("<?", "?>")?;
                let raw = self.reader.slice_from(start);
                self.append(Node::Raw(raw.to_string()));
            } else if self.reader.starts_with("<!") {
                let raw = self.reader.take_declaration()?;
                self.append(Node::Raw(raw.to_string()));
            } else if self.reader.starts_with("</") {
                self.close_element()?;
            } else if self.reader.starts_with("<") {
                self.open_element()?;
            } else {
                let text = self.reader.take_until('<');
                self.append(Node::Text(text.to_string()));
            }
        }
        if let Some(unclosed) = self.stack.last() {
            return Err(MarkupError::invalid(format!(
                "元素 <{}> 未闭合（文件在第 {} 行结束）",
                unclosed.name,
                self.reader.line()
            )));
        }
        Ok(Fragment::new(self.top_level))
    }

    fn append(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.top_level.push(node),
        }
    }

    fn open_element(&mut self) -> Result<(), MarkupError> {
        self.reader.expect("<")?;
        let name = self.reader.take_name();
        if name.is_empty() {
            return Err(MarkupError::invalid(format!(
                "第 {} 行的 '<' 之后缺少元素名",
                self.reader.line()
            )));
        }
        let mut element = Element::new(name);
        loop {
            self.reader.skip_whitespace();
            if self.reader.starts_with("/>") {
                self.reader.expect("/>")?;
                self.append(Node::Element(element));
                return Ok(());
            }
            if self.reader.starts_with(">") {
                self.reader.expect(">")?;
                self.stack.push(element);
                return Ok(());
            }
            if self.reader.at_end() {
                return Err(MarkupError::invalid(format!(
                    "元素 <{}> 的起始标签未结束",
                    element.name
                )));
            }
            let attr_name = self.reader.take_name();
            if attr_name.is_empty() {
                return Err(MarkupError::invalid(format!(
                    "第 {} 行的元素 <{}> 中出现无法识别的字符",
                    self.reader.line(),
                    element.name
                )));
            }
            self.reader.skip_whitespace();
            self.reader.expect("=").map_err(|_| {
                MarkupError::invalid(format!(
                    "第 {} 行的属性 {attr_name} 缺少取值",
                    self.reader.line()
                ))
            })?;
            self.reader.skip_whitespace();
            let value = self.reader.take_quoted()?;
            element.push_raw_attr(attr_name, value);
        }
    }

    fn close_element(&mut self) -> Result<(), MarkupError> {
        self.reader.expect("</")?;
        let name = self.reader.take_name().to_string();
        self.reader.skip_whitespace();
        self.reader.expect(">")?;
        let Some(element) = self.stack.pop() else {
            return Err(MarkupError::invalid(format!(
                "第 {} 行出现多余的结束标签 </{name}>",
                self.reader.line()
            )));
        };
        if element.name != name {
            return Err(MarkupError::invalid(format!(
                "第 {} 行的结束标签 </{name}> 与 <{}> 不匹配",
                self.reader.line(),
                element.name
            )));
        }
        self.append(Node::Element(element));
        Ok(())
    }
}

struct MarkupReader<'a> {
    source: &'a str,
    position: usize,
}

impl<'a> MarkupReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            position: 0,
        }
    }

    #[inline]
    fn rest(&self) -> &'a str {
        &self.source[self.position..]
    }

    #[inline]
    fn at_end(&self) -> bool {
        self.position >= self.source.len()
    }

    #[inline]
    fn position(&self) -> usize {
        self.position
    }

    fn slice_from(&self, start: usize) -> &'a str {
        &self.source[start..self.position]
    }

    fn line(&self) -> usize {
        self.source[..self.position].matches('\n').count() + 1
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    fn expect(&mut self, token: &str) -> Result<(), MarkupError> {
        if self.starts_with(token) {
            self.position += token.len();
            Ok(())
        } else {
            Err(MarkupError::invalid(format!(
                "第 {} 行期望 {token:?}",
                self.line()
            )))
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.position += rest.len() - trimmed.len();
    }

    fn take_name(&mut self) -> &'a str {
        let rest = self.rest();
        let end = rest
            .find(|ch: char| ch.is_whitespace() || matches!(ch, '/' | '>' | '=' | '<' | '"' | '\''))
            .unwrap_or(rest.len());
        self.position += end;
        &rest[..end]
    }

    fn take_until(&mut self, stop: char) -> &'a str {
        let rest = self.rest();
        let end = rest.find(stop).unwrap_or(rest.len());
        self.position += end;
        &rest[..end]
    }

    /// 读取 `open ... close` 包围的内容，返回中间部分。
    fn take_delimited(&mut self, open: &str, close: &str) -> Result<&'a str, MarkupError> {
        let line = self.line();
        self.expect(open)?;
        let rest = self.rest();
        let Some(end) = rest.find(close) else {
            return Err(MarkupError::invalid(format!(
                "第 {line} 行开始的 {open} 缺少 {close}"
            )));
        };
        self.position += end + close.len();
        Ok(&rest[..end])
    }

    /// DOCTYPE 等声明，允许内部子集 `[...]`。
    fn take_declaration(&mut self) -> Result<&'a str, MarkupError> {
        let start = self.position;
        let mut depth = 0usize;
        for (offset, ch) in self.rest().char_indices() {
            match ch {
                '[' => depth += 1,
                ']' => depth = depth.saturating_sub(1),
                '>' if depth == 0 => {
                    self.position += offset + 1;
                    return Ok(&self.source[start..self.position]);
                }
                _ => {}
            }
        }
        Err(MarkupError::invalid(format!(
            "第 {} 行的声明缺少结束符 '>'",
            self.line()
        )))
    }

    /// 读取引号包围的属性值；单引号值中的双引号转写为 `&quot;`。
    fn take_quoted(&mut self) -> Result<String, MarkupError> {
        let line = self.line();
        let quote = match self.rest().chars().next() {
            Some(ch @ ('"' | '\'')) => ch,
            _ => {
                return Err(MarkupError::invalid(format!(
                    "第 {line} 行的属性值缺少引号"
                )));
            }
        };
        self.position += 1;
        let rest = self.rest();
        let Some(end) = rest.find(quote) else {
            return Err(MarkupError::invalid(format!(
                "第 {line} 行的属性值缺少结束引号"
            )));
        };
        self.position += end + 1;
        let value = &rest[..end];
        Ok(if quote == '\'' {
            value.replace('"', "&quot;")
        } else {
            value.to_string()
        })
    }
}
