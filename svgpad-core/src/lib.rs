pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn translate(self, offset: Vector2) -> Self {
            Self(self.0 + offset.0)
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    impl From<DVec2> for Point2 {
        fn from(value: DVec2) -> Self {
            Self::from_vec(value)
        }
    }

    /// 二维向量，用于指针位移与平移量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_points(start: Point2, end: Point2) -> Self {
            Self(end.0 - start.0)
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    impl From<DVec2> for Vector2 {
        fn from(value: DVec2) -> Self {
            Self(value)
        }
    }

    /// 轴对齐边界框，用于命中测试。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn empty() -> Self {
            Self {
                min: Point2::new(f64::INFINITY, f64::INFINITY),
                max: Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        pub fn include_point(&mut self, point: Point2) {
            if self.is_empty() {
                self.min = point;
                self.max = point;
                return;
            }
            let min_vec = self.min.as_vec2().min(point.as_vec2());
            let max_vec = self.max.as_vec2().max(point.as_vec2());
            self.min = Point2::from_vec(min_vec);
            self.max = Point2::from_vec(max_vec);
        }

        pub fn include_bounds(&mut self, other: &Bounds2D) {
            if other.is_empty() {
                return;
            }
            self.include_point(other.min);
            self.include_point(other.max);
        }

        /// 向四周扩展 `margin`，细线与单点路径依赖它才能被拾取。
        pub fn inflate(&self, margin: f64) -> Self {
            if self.is_empty() {
                return *self;
            }
            let delta = DVec2::splat(margin.max(0.0));
            Self {
                min: Point2::from_vec(self.min.as_vec2() - delta),
                max: Point2::from_vec(self.max.as_vec2() + delta),
            }
        }

        #[inline]
        pub fn contains(&self, point: Point2) -> bool {
            !self.is_empty()
                && point.x() >= self.min.x()
                && point.x() <= self.max.x()
                && point.y() >= self.min.y()
                && point.y() <= self.max.y()
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            debug_assert!(!self.is_empty());
            let min_vec = self.min.as_vec2();
            let max_vec = self.max.as_vec2();
            let center = (min_vec + max_vec) * 0.5;
            Point2::from_vec(center)
        }
    }
}

pub mod markup {
    use std::fmt;

    use serde::{Deserialize, Serialize};

    /// 属性值以转义后的源文本形式保存，保证解析再序列化时字节稳定。
    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Attribute {
        pub name: String,
        pub value: String,
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub enum Node {
        Element(Element),
        /// 已转义的文本。
        Text(String),
        Comment(String),
        /// 原样保留的声明、处理指令或 CDATA 段。
        Raw(String),
    }

    impl Node {
        #[inline]
        pub fn as_element(&self) -> Option<&Element> {
            match self {
                Node::Element(element) => Some(element),
                _ => None,
            }
        }

        #[inline]
        pub fn as_element_mut(&mut self) -> Option<&mut Element> {
            match self {
                Node::Element(element) => Some(element),
                _ => None,
            }
        }

        fn write(&self, out: &mut String, options: &WriteOptions) {
            match self {
                Node::Element(element) => element.write(out, options),
                Node::Text(text) => out.push_str(text),
                Node::Comment(comment) => {
                    out.push_str("<!--");
                    out.push_str(comment);
                    out.push_str("-->");
                }
                Node::Raw(raw) => out.push_str(raw),
            }
        }
    }

    /// 从内容根出发的子节点下标路径。下标计入文本节点。
    #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct NodePath(Vec<usize>);

    impl NodePath {
        #[inline]
        pub fn root() -> Self {
            Self(Vec::new())
        }

        #[inline]
        pub fn new(indices: impl Into<Vec<usize>>) -> Self {
            Self(indices.into())
        }

        #[inline]
        pub fn is_root(&self) -> bool {
            self.0.is_empty()
        }

        #[inline]
        pub fn indices(&self) -> &[usize] {
            &self.0
        }

        pub fn child(&self, index: usize) -> Self {
            let mut indices = self.0.clone();
            indices.push(index);
            Self(indices)
        }

        pub fn parent(&self) -> Option<Self> {
            if self.0.is_empty() {
                None
            } else {
                Some(Self(self.0[..self.0.len() - 1].to_vec()))
            }
        }
    }

    impl fmt::Display for NodePath {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let parts: Vec<String> = self.0.iter().map(usize::to_string).collect();
            write!(f, "/{}", parts.join("/"))
        }
    }

    /// 序列化选项：`omit_attributes` 中的属性不会写出。
    #[derive(Debug, Clone, Copy, Default)]
    pub struct WriteOptions<'a> {
        pub omit_attributes: &'a [&'a str],
    }

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Element {
        pub name: String,
        attributes: Vec<Attribute>,
        pub children: Vec<Node>,
    }

    impl Element {
        pub fn new(name: impl Into<String>) -> Self {
            Self {
                name: name.into(),
                attributes: Vec::new(),
                children: Vec::new(),
            }
        }

        /// 以构建器方式追加属性，`value` 为未转义文本。
        pub fn with_attr(mut self, name: impl Into<String>, value: impl AsRef<str>) -> Self {
            self.set_attr(name, value);
            self
        }

        /// 直接追加已转义的属性，供解析器使用。
        pub fn push_raw_attr(&mut self, name: impl Into<String>, escaped: impl Into<String>) {
            self.attributes.push(Attribute {
                name: name.into(),
                value: escaped.into(),
            });
        }

        pub fn with_child(mut self, child: Node) -> Self {
            self.children.push(child);
            self
        }

        #[inline]
        pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
            self.attributes.iter()
        }

        pub fn attr(&self, name: &str) -> Option<&str> {
            self.attributes
                .iter()
                .find(|attr| attr.name == name)
                .map(|attr| attr.value.as_str())
        }

        #[inline]
        pub fn has_attr(&self, name: &str) -> bool {
            self.attributes.iter().any(|attr| attr.name == name)
        }

        /// 设置属性（存在则原位替换，保持属性顺序）。
        pub fn set_attr(&mut self, name: impl Into<String>, value: impl AsRef<str>) {
            let name = name.into();
            let escaped = escape_attr(value.as_ref());
            match self.attributes.iter_mut().find(|attr| attr.name == name) {
                Some(attr) => attr.value = escaped,
                None => self.attributes.push(Attribute {
                    name,
                    value: escaped,
                }),
            }
        }

        pub fn remove_attr(&mut self, name: &str) -> Option<String> {
            let index = self.attributes.iter().position(|attr| attr.name == name)?;
            Some(self.attributes.remove(index).value)
        }

        /// 非空 id。
        pub fn id(&self) -> Option<&str> {
            self.attr("id").filter(|id| !id.is_empty())
        }

        pub fn classes(&self) -> impl Iterator<Item = &str> {
            self.attr("class").unwrap_or_default().split_whitespace()
        }

        pub fn has_class(&self, class: &str) -> bool {
            self.classes().any(|candidate| candidate == class)
        }

        /// 本地名（去掉命名空间前缀），小写。
        pub fn local_name(&self) -> String {
            let name = self.name.rsplit(':').next().unwrap_or(&self.name);
            name.to_ascii_lowercase()
        }

        pub fn child_elements(&self) -> impl Iterator<Item = (usize, &Element)> {
            self.children
                .iter()
                .enumerate()
                .filter_map(|(index, node)| node.as_element().map(|element| (index, element)))
        }

        pub fn last_element_child(&self) -> Option<(usize, &Element)> {
            self.child_elements().last()
        }

        pub fn push_element(&mut self, element: Element) -> usize {
            self.children.push(Node::Element(element));
            self.children.len() - 1
        }

        pub fn get(&self, path: &NodePath) -> Option<&Element> {
            if path.is_root() {
                return Some(self);
            }
            resolve(&self.children, path.indices())
        }

        pub fn get_mut(&mut self, path: &NodePath) -> Option<&mut Element> {
            if path.is_root() {
                return Some(self);
            }
            resolve_mut(&mut self.children, path.indices())
        }

        /// 深度优先（先序）查找第一个满足条件的后代元素。
        pub fn find(&self, predicate: impl Fn(&Element) -> bool) -> Option<NodePath> {
            find_in(&self.children, &NodePath::root(), &predicate)
        }

        /// 依据 `tag#id.class` 形式的简单选择器匹配自身。
        pub fn matches(&self, tag: Option<&str>, id: Option<&str>, classes: &[&str]) -> bool {
            if let Some(tag) = tag {
                if !self.local_name().eq_ignore_ascii_case(tag) {
                    return false;
                }
            }
            if let Some(id) = id {
                if self.id() != Some(id) {
                    return false;
                }
            }
            classes.iter().all(|class| self.has_class(class))
        }

        pub fn outer_markup(&self) -> String {
            self.outer_markup_with(&WriteOptions::default())
        }

        pub fn outer_markup_with(&self, options: &WriteOptions) -> String {
            let mut out = String::new();
            self.write(&mut out, options);
            out
        }

        pub fn inner_markup(&self) -> String {
            write_nodes(&self.children, &WriteOptions::default())
        }

        fn write(&self, out: &mut String, options: &WriteOptions) {
            out.push('<');
            out.push_str(&self.name);
            for attr in &self.attributes {
                if options.omit_attributes.contains(&attr.name.as_str()) {
                    continue;
                }
                out.push(' ');
                out.push_str(&attr.name);
                out.push_str("=\"");
                out.push_str(&attr.value);
                out.push('"');
            }
            if self.children.is_empty() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in &self.children {
                child.write(out, options);
            }
            out.push_str("</");
            out.push_str(&self.name);
            out.push('>');
        }
    }

    /// 一组顶层节点，相当于容器的 innerHTML。
    #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Fragment {
        pub nodes: Vec<Node>,
    }

    impl Fragment {
        #[inline]
        pub fn new(nodes: Vec<Node>) -> Self {
            Self { nodes }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.nodes.is_empty()
        }

        /// 片段根本身不是元素，因此空路径返回 `None`。
        pub fn get(&self, path: &NodePath) -> Option<&Element> {
            resolve(&self.nodes, path.indices())
        }

        pub fn get_mut(&mut self, path: &NodePath) -> Option<&mut Element> {
            resolve_mut(&mut self.nodes, path.indices())
        }

        pub fn find(&self, predicate: impl Fn(&Element) -> bool) -> Option<NodePath> {
            find_in(&self.nodes, &NodePath::root(), &predicate)
        }

        pub fn elements(&self) -> impl Iterator<Item = (usize, &Element)> {
            self.nodes
                .iter()
                .enumerate()
                .filter_map(|(index, node)| node.as_element().map(|element| (index, element)))
        }

        /// 先序遍历所有元素及其路径。
        pub fn walk(&self) -> Vec<(NodePath, &Element)> {
            let mut out = Vec::new();
            walk_in(&self.nodes, &NodePath::root(), &mut out);
            out
        }

        pub fn to_markup(&self) -> String {
            write_nodes(&self.nodes, &WriteOptions::default())
        }

        pub fn to_markup_with(&self, options: &WriteOptions) -> String {
            write_nodes(&self.nodes, options)
        }
    }

    fn resolve<'a>(nodes: &'a [Node], indices: &[usize]) -> Option<&'a Element> {
        let (first, rest) = indices.split_first()?;
        let element = nodes.get(*first)?.as_element()?;
        if rest.is_empty() {
            Some(element)
        } else {
            resolve(&element.children, rest)
        }
    }

    fn resolve_mut<'a>(nodes: &'a mut [Node], indices: &[usize]) -> Option<&'a mut Element> {
        let (first, rest) = indices.split_first()?;
        let element = nodes.get_mut(*first)?.as_element_mut()?;
        if rest.is_empty() {
            Some(element)
        } else {
            resolve_mut(&mut element.children, rest)
        }
    }

    fn find_in(
        nodes: &[Node],
        base: &NodePath,
        predicate: &dyn Fn(&Element) -> bool,
    ) -> Option<NodePath> {
        for (index, node) in nodes.iter().enumerate() {
            let Some(element) = node.as_element() else {
                continue;
            };
            let path = base.child(index);
            if predicate(element) {
                return Some(path);
            }
            if let Some(found) = find_in(&element.children, &path, predicate) {
                return Some(found);
            }
        }
        None
    }

    fn walk_in<'a>(nodes: &'a [Node], base: &NodePath, out: &mut Vec<(NodePath, &'a Element)>) {
        for (index, node) in nodes.iter().enumerate() {
            if let Some(element) = node.as_element() {
                let path = base.child(index);
                out.push((path.clone(), element));
                walk_in(&element.children, &path, out);
            }
        }
    }

    fn write_nodes(nodes: &[Node], options: &WriteOptions) -> String {
        let mut out = String::new();
        for node in nodes {
            node.write(&mut out, options);
        }
        out
    }

    pub fn escape_attr(raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for ch in raw.chars() {
            match ch {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                other => out.push(other),
            }
        }
        out
    }

    pub fn escape_text(raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        for ch in raw.chars() {
            match ch {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                other => out.push(other),
            }
        }
        out
    }

    /// 还原常见实体与数字字符引用，未知实体原样保留。
    pub fn unescape(escaped: &str) -> String {
        let mut out = String::with_capacity(escaped.len());
        let mut rest = escaped;
        while let Some(start) = rest.find('&') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];
            let Some(end) = tail.find(';') else {
                out.push_str(tail);
                return out;
            };
            let entity = &tail[1..end];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16)
                        .ok()
                        .and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => {
                    entity[1..].parse::<u32>().ok().and_then(char::from_u32)
                }
                _ => None,
            };
            match decoded {
                Some(ch) => out.push(ch),
                None => out.push_str(&tail[..=end]),
            }
            rest = &tail[end + 1..];
        }
        out.push_str(rest);
        out
    }
}

pub mod path_data {
    use std::fmt;

    use kurbo::{BezPath, PathEl};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum CommandKind {
        Move,
        Line,
    }

    /// 手绘路径中的一条绝对坐标命令。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct PathCommand {
        pub kind: CommandKind,
        pub x: f64,
        pub y: f64,
    }

    impl PathCommand {
        #[inline]
        pub fn move_to(x: f64, y: f64) -> Self {
            Self {
                kind: CommandKind::Move,
                x,
                y,
            }
        }

        #[inline]
        pub fn line_to(x: f64, y: f64) -> Self {
            Self {
                kind: CommandKind::Line,
                x,
                y,
            }
        }
    }

    impl fmt::Display for PathCommand {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let letter = match self.kind {
                CommandKind::Move => 'M',
                CommandKind::Line => 'L',
            };
            write!(f, "{letter}{} {}", self.x, self.y)
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum PathDataError {
        Syntax(String),
        Unsupported(&'static str),
    }

    impl fmt::Display for PathDataError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                PathDataError::Syntax(reason) => write!(f, "路径数据无法解析: {reason}"),
                PathDataError::Unsupported(kind) => write!(f, "手绘路径不支持 {kind} 段"),
            }
        }
    }

    impl std::error::Error for PathDataError {}

    /// 手绘路径：只包含 M / L 两种命令，按提交顺序排列。
    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct DrawPath {
        commands: Vec<PathCommand>,
    }

    impl DrawPath {
        #[inline]
        pub fn new() -> Self {
            Self::default()
        }

        #[inline]
        pub fn commands(&self) -> &[PathCommand] {
            &self.commands
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.commands.is_empty()
        }

        #[inline]
        pub fn last_kind(&self) -> Option<CommandKind> {
            self.commands.last().map(|command| command.kind)
        }

        #[inline]
        pub fn push(&mut self, command: PathCommand) {
            self.commands.push(command);
        }

        pub fn to_data(&self) -> String {
            let parts: Vec<String> = self.commands.iter().map(ToString::to_string).collect();
            parts.join(" ")
        }

        /// 解析 `d` 属性，仅接受 M/L（含相对与 H/V 形式），统一换算为绝对坐标。
        pub fn parse(data: &str) -> Result<Self, PathDataError> {
            let parsed =
                BezPath::from_svg(data).map_err(|err| PathDataError::Syntax(err.to_string()))?;
            let mut path = DrawPath::new();
            for element in parsed.elements() {
                let command = match *element {
                    PathEl::MoveTo(point) => PathCommand::move_to(point.x, point.y),
                    PathEl::LineTo(point) => PathCommand::line_to(point.x, point.y),
                    PathEl::QuadTo(..) => return Err(PathDataError::Unsupported("二次曲线")),
                    PathEl::CurveTo(..) => return Err(PathDataError::Unsupported("曲线")),
                    PathEl::ClosePath => return Err(PathDataError::Unsupported("闭合")),
                };
                path.push(command);
            }
            Ok(path)
        }
    }
}

pub mod document {
    use kurbo::{Affine, BezPath, PathEl, Point, Rect, Shape};
    use serde::{Deserialize, Serialize};

    use crate::geometry::{Bounds2D, Point2};
    use crate::markup::{Element, Fragment, Node, NodePath, unescape};

    /// 横向 A4 纸张比例。
    pub const LANDSCAPE_ASPECT: f64 = 297.0 / 210.0;
    /// 纵向 A4 纸张比例。
    pub const PORTRAIT_ASPECT: f64 = 210.0 / 297.0;
    pub const DEFAULT_PAGE_WIDTH: f64 = 1000.0;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Orientation {
        Landscape,
        Portrait,
    }

    impl Orientation {
        #[inline]
        pub fn aspect(self) -> f64 {
            match self {
                Orientation::Landscape => LANDSCAPE_ASPECT,
                Orientation::Portrait => PORTRAIT_ASPECT,
            }
        }
    }

    /// 页面几何：宽高比与视口宽度，高度由二者推导。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct PageGeometry {
        pub aspect: f64,
        pub width: f64,
    }

    impl PageGeometry {
        pub fn new(aspect: f64, width: f64) -> Self {
            let aspect = if aspect.is_finite() && aspect > 0.0 {
                aspect
            } else {
                LANDSCAPE_ASPECT
            };
            Self { aspect, width }
        }

        #[inline]
        pub fn height(&self) -> f64 {
            (self.width / self.aspect).round()
        }

        #[inline]
        pub fn center(&self) -> Point2 {
            Point2::new(self.width / 2.0, self.height() / 2.0)
        }

        /// 在横向与纵向之间切换；非标准比例切换为纵向。
        pub fn toggle_orientation(&mut self) {
            self.aspect = if self.aspect == LANDSCAPE_ASPECT {
                PORTRAIT_ASPECT
            } else {
                LANDSCAPE_ASPECT
            };
        }
    }

    impl Default for PageGeometry {
        fn default() -> Self {
            Self::new(LANDSCAPE_ASPECT, DEFAULT_PAGE_WIDTH)
        }
    }

    /// 编辑会话中的唯一文档：去掉包装层后的内容树与页面几何。
    #[derive(Debug, Clone, Default, PartialEq)]
    pub struct Document {
        content: Fragment,
        page: PageGeometry,
    }

    impl Document {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_content(content: Fragment, page: PageGeometry) -> Self {
            Self { content, page }
        }

        #[inline]
        pub fn content(&self) -> &Fragment {
            &self.content
        }

        #[inline]
        pub fn content_mut(&mut self) -> &mut Fragment {
            &mut self.content
        }

        #[inline]
        pub fn page(&self) -> PageGeometry {
            self.page
        }

        #[inline]
        pub fn page_mut(&mut self) -> &mut PageGeometry {
            &mut self.page
        }
    }

    fn number_attr(element: &Element, name: &str) -> Option<f64> {
        let raw = element.attr(name)?;
        let trimmed = raw.trim().trim_end_matches("px");
        trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
    }

    fn points_attr(element: &Element) -> Vec<Point2> {
        let raw = unescape(element.attr("points").unwrap_or_default());
        let numbers: Vec<f64> = raw
            .split(|ch: char| ch.is_whitespace() || ch == ',')
            .filter(|part| !part.is_empty())
            .filter_map(|part| part.parse::<f64>().ok())
            .collect();
        numbers
            .chunks_exact(2)
            .map(|pair| Point2::new(pair[0], pair[1]))
            .collect()
    }

    /// 文本包围盒估算用的缺省字号与字宽系数。
    const DEFAULT_FONT_SIZE: f64 = 16.0;
    const GLYPH_ADVANCE: f64 = 0.6;

    fn text_content(element: &Element, out: &mut String) {
        for child in &element.children {
            match child {
                Node::Text(text) => out.push_str(&unescape(text)),
                Node::Element(inner) => text_content(inner, out),
                _ => {}
            }
        }
    }

    /// 按字号与字符数粗估文本占据的矩形，基线在 `y`。
    fn text_box(element: &Element) -> Rect {
        let x = number_attr(element, "x").unwrap_or(0.0);
        let y = number_attr(element, "y").unwrap_or(0.0);
        let size = number_attr(element, "font-size")
            .filter(|size| *size > 0.0)
            .unwrap_or(DEFAULT_FONT_SIZE);
        let mut text = String::new();
        text_content(element, &mut text);
        let glyphs = text.trim().chars().count().max(1) as f64;
        Rect::new(x, y - size, x + glyphs * size * GLYPH_ADVANCE, y + size * 0.25)
    }

    enum Outline {
        Path(BezPath),
        Area(Rect),
    }

    impl Outline {
        fn bounds(&self, transform: Affine) -> Option<Rect> {
            match self {
                Outline::Area(rect) => Some(transform.transform_rect_bbox(*rect)),
                Outline::Path(path) => {
                    let mut path = path.clone();
                    path.apply_affine(transform);
                    if path.segments().next().is_some() {
                        return Some(path.bounding_box());
                    }
                    // 只有 moveto 的路径退化为一点
                    path.elements().iter().find_map(|element| match element {
                        PathEl::MoveTo(point) => Some(Rect::from_points(*point, *point)),
                        _ => None,
                    })
                }
            }
        }
    }

    fn outline(element: &Element) -> Option<Outline> {
        let outline = match element.local_name().as_str() {
            "path" => Outline::Path(BezPath::from_svg(&unescape(element.attr("d")?)).ok()?),
            "line" => {
                let mut path = BezPath::new();
                path.move_to((
                    number_attr(element, "x1").unwrap_or(0.0),
                    number_attr(element, "y1").unwrap_or(0.0),
                ));
                path.line_to((
                    number_attr(element, "x2").unwrap_or(0.0),
                    number_attr(element, "y2").unwrap_or(0.0),
                ));
                Outline::Path(path)
            }
            "rect" | "image" | "use" => {
                let x = number_attr(element, "x").unwrap_or(0.0);
                let y = number_attr(element, "y").unwrap_or(0.0);
                let width = number_attr(element, "width")?;
                let height = number_attr(element, "height")?;
                Outline::Area(Rect::new(x, y, x + width, y + height).abs())
            }
            "circle" => {
                let cx = number_attr(element, "cx").unwrap_or(0.0);
                let cy = number_attr(element, "cy").unwrap_or(0.0);
                let r = number_attr(element, "r")?.abs();
                Outline::Area(Rect::new(cx - r, cy - r, cx + r, cy + r))
            }
            "ellipse" => {
                let cx = number_attr(element, "cx").unwrap_or(0.0);
                let cy = number_attr(element, "cy").unwrap_or(0.0);
                let rx = number_attr(element, "rx")?.abs();
                let ry = number_attr(element, "ry")?.abs();
                Outline::Area(Rect::new(cx - rx, cy - ry, cx + rx, cy + ry))
            }
            "polyline" | "polygon" => {
                let mut path = BezPath::new();
                for (index, point) in points_attr(element).into_iter().enumerate() {
                    let point = Point::new(point.x(), point.y());
                    if index == 0 {
                        path.move_to(point);
                    } else {
                        path.line_to(point);
                    }
                }
                Outline::Path(path)
            }
            "text" => Outline::Area(text_box(element)),
            _ => return None,
        };
        Some(outline)
    }

    fn to_bounds(rect: Rect) -> Bounds2D {
        Bounds2D::new(Point2::new(rect.x0, rect.y0), Point2::new(rect.x1, rect.y1))
    }

    /// 解析 `transform` 属性，变换按书写顺序右乘。无法识别时返回 `None`。
    pub fn parse_transform(raw: &str) -> Option<Affine> {
        let mut transform = Affine::IDENTITY;
        for item in raw.split(')') {
            let item = item.trim().trim_start_matches(',').trim();
            if item.is_empty() {
                continue;
            }
            let (name, args) = item.split_once('(')?;
            let args: Vec<f64> = args
                .split(|ch: char| ch.is_whitespace() || ch == ',')
                .filter(|part| !part.is_empty())
                .map(str::parse)
                .collect::<Result<_, _>>()
                .ok()?;
            let next = match (name.trim(), args.as_slice()) {
                ("matrix", &[a, b, c, d, e, f]) => Affine::new([a, b, c, d, e, f]),
                ("translate", &[x]) => Affine::translate((x, 0.0)),
                ("translate", &[x, y]) => Affine::translate((x, y)),
                ("scale", &[factor]) => Affine::scale(factor),
                ("scale", &[sx, sy]) => Affine::scale_non_uniform(sx, sy),
                ("rotate", &[angle]) => Affine::rotate(angle.to_radians()),
                ("rotate", &[angle, cx, cy]) => {
                    Affine::rotate_about(angle.to_radians(), Point::new(cx, cy))
                }
                ("skewX", &[angle]) => Affine::skew(angle.to_radians().tan(), 0.0),
                ("skewY", &[angle]) => Affine::skew(0.0, angle.to_radians().tan()),
                _ => return None,
            };
            transform = transform * next;
        }
        Some(transform)
    }

    /// 元素自身的变换；缺省或无法解析时为恒等变换。
    pub fn element_transform(element: &Element) -> Affine {
        element
            .attr("transform")
            .and_then(|raw| parse_transform(&unescape(raw)))
            .unwrap_or(Affine::IDENTITY)
    }

    /// 从内容根到该节点（含自身）累积的变换。
    pub fn accumulated_transform(content: &Fragment, path: &NodePath) -> Affine {
        let indices = path.indices();
        (1..=indices.len())
            .filter_map(|depth| content.get(&NodePath::new(&indices[..depth])))
            .fold(Affine::IDENTITY, |transform, element| {
                transform * element_transform(element)
            })
    }

    /// 基本图形在自身坐标系下的包围盒，容器与未知元素返回 `None`。
    /// 曲线与圆弧按真实外形计算，文本按字号粗估。
    pub fn shape_bounds(element: &Element) -> Option<Bounds2D> {
        outline(element)?.bounds(Affine::IDENTITY).map(to_bounds)
    }

    /// 节点在内容坐标系下的包围盒，计入自身与所有祖先的 `transform`。
    pub fn placed_bounds(content: &Fragment, path: &NodePath) -> Option<Bounds2D> {
        let element = content.get(path)?;
        outline(element)?
            .bounds(accumulated_transform(content, path))
            .map(to_bounds)
    }

}
