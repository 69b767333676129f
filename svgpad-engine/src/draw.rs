use svgpad_core::document::PageGeometry;
use svgpad_core::geometry::Point2;
use svgpad_core::markup::{Element, Fragment, Node, NodePath, unescape};
use svgpad_core::path_data::{CommandKind, DrawPath, PathCommand};
use tracing::{debug, warn};

use crate::errors::EngineError;
use crate::view::{ViewTransform, WRAPPER_CLASS};

pub const DRAWING_LAYER_CLASS: &str = "itspath";

/// 新建路径的描边样式。
#[derive(Debug, Clone, PartialEq)]
pub struct DrawStyle {
    pub stroke: String,
    pub stroke_width: f64,
    pub stroke_dasharray: String,
    pub fill: String,
}

impl Default for DrawStyle {
    fn default() -> Self {
        Self {
            stroke: "#000000".to_string(),
            stroke_width: 1.0,
            stroke_dasharray: "none".to_string(),
            fill: "none".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrawState {
    #[default]
    Idle,
    Drawing,
}

/// 绘制完成通知。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawResult {
    pub path: String,
    pub id: String,
    pub class: String,
}

/// 自由绘制会话：把指针点追加到绘制层中由 `(class, id)` 标识的路径。
#[derive(Debug, Clone)]
pub struct DrawSession {
    path_id: String,
    path_class: String,
    style: DrawStyle,
    state: DrawState,
}

fn is_drawing_layer(element: &Element) -> bool {
    element.matches(Some("g"), None, &[WRAPPER_CLASS, DRAWING_LAYER_CLASS])
}

impl DrawSession {
    pub fn new(path_id: impl Into<String>, path_class: impl Into<String>, style: DrawStyle) -> Self {
        Self {
            path_id: path_id.into(),
            path_class: path_class.into(),
            style,
            state: DrawState::Idle,
        }
    }

    #[inline]
    pub fn state(&self) -> DrawState {
        self.state
    }

    #[inline]
    pub fn path_id(&self) -> &str {
        &self.path_id
    }

    #[inline]
    pub fn path_class(&self) -> &str {
        &self.path_class
    }

    #[inline]
    pub fn style(&self) -> &DrawStyle {
        &self.style
    }

    /// 更换路径 id；发生变化时回到 `Idle`，下一个点开始新路径。
    pub fn set_path_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        if id != self.path_id {
            self.path_id = id;
            self.state = DrawState::Idle;
        }
    }

    pub fn set_path_class(&mut self, class: impl Into<String>) {
        let class = class.into();
        if class != self.path_class {
            self.path_class = class;
            self.state = DrawState::Idle;
        }
    }

    pub fn reset(&mut self) {
        self.state = DrawState::Idle;
    }

    fn is_own_path(&self, element: &Element) -> bool {
        element.local_name() == "path"
            && element.id() == Some(self.path_id.as_str())
            && element.has_class(&self.path_class)
    }

    /// 绘制层：内容末尾的 `g.itssvg.itspath`，不存在时创建。
    fn ensure_layer(content: &mut Fragment) -> NodePath {
        let last = content.elements().last();
        if let Some((index, element)) = last {
            if is_drawing_layer(element) {
                return NodePath::new([index]);
            }
        }
        let existing = content
            .elements()
            .filter(|(_, element)| is_drawing_layer(element))
            .map(|(index, _)| index)
            .last();
        if let Some(index) = existing {
            // 图层不在末尾时移到末尾
            let layer = content.nodes.remove(index);
            content.nodes.push(layer);
        } else {
            debug!("创建绘制层");
            let layer = Element::new("g")
                .with_attr("class", format!("{WRAPPER_CLASS} {DRAWING_LAYER_CLASS}"));
            content.nodes.push(Node::Element(layer));
        }
        NodePath::new([content.nodes.len() - 1])
    }

    /// 绘制层中可续画的路径（最后一个元素且 id、class 匹配）。
    fn resumable(&self, content: &Fragment, layer: &NodePath) -> Option<(NodePath, DrawPath)> {
        let layer_element = content.get(layer)?;
        let (index, element) = layer_element.last_element_child()?;
        if !self.is_own_path(element) {
            return None;
        }
        let data = unescape(element.attr("d").unwrap_or_default());
        match DrawPath::parse(&data) {
            Ok(path) => Some((layer.child(index), path)),
            Err(err) => {
                warn!(id = %self.path_id, error = %err, "路径数据无法解析，另起新路径");
                None
            }
        }
    }

    fn new_path_element(&self) -> Element {
        Element::new("path")
            .with_attr("class", &self.path_class)
            .with_attr("id", &self.path_id)
            .with_attr("stroke", &self.style.stroke)
            .with_attr("stroke-width", self.style.stroke_width.to_string())
            .with_attr("stroke-dasharray", &self.style.stroke_dasharray)
            .with_attr("fill", &self.style.fill)
            .with_attr("d", "")
    }

    /// 提交一个屏幕坐标点。`start` 请求开始新的子路径。
    pub fn submit(
        &mut self,
        content: &mut Fragment,
        view: &ViewTransform,
        page: &PageGeometry,
        screen: Point2,
        start: bool,
    ) -> Result<NodePath, EngineError> {
        let point = view.to_document(screen, page);
        if !(point.x().is_finite() && point.y().is_finite()) {
            return Err(EngineError::InvariantViolation(
                "draw point must be finite".to_string(),
            ));
        }
        let layer = Self::ensure_layer(content);
        let (path_node, mut path) = match self.resumable(content, &layer) {
            Some(found) => found,
            None => {
                let layer_element = content
                    .get_mut(&layer)
                    .ok_or_else(|| EngineError::NodeNotFound(layer.to_string()))?;
                let index = layer_element.push_element(self.new_path_element());
                debug!(id = %self.path_id, class = %self.path_class, "开始新路径");
                (layer.child(index), DrawPath::new())
            }
        };

        let command = match path.last_kind() {
            None => PathCommand::move_to(point.x(), point.y()),
            Some(kind) if start && kind != CommandKind::Move => {
                PathCommand::move_to(point.x(), point.y())
            }
            Some(_) => PathCommand::line_to(point.x(), point.y()),
        };
        path.push(command);

        let element = content
            .get_mut(&path_node)
            .ok_or_else(|| EngineError::NodeNotFound(path_node.to_string()))?;
        element.set_attr("d", path.to_data());
        self.state = DrawState::Drawing;
        Ok(path_node)
    }

    /// 输出当前路径的标记，不改变会话状态。
    /// 空闲时（例如刚载入文档）按续画规则找绘制层末尾的同名路径。
    pub fn finish(&self, content: &Fragment) -> Option<DrawResult> {
        let layer = last_layer(content)?;
        let element = match self.state {
            DrawState::Drawing => content.get(&layer)?.last_element_child()?.1,
            DrawState::Idle => {
                let (path, _) = self.resumable(content, &layer)?;
                content.get(&path)?
            }
        };
        if !self.is_own_path(element) {
            return None;
        }
        Some(DrawResult {
            path: element.outer_markup(),
            id: self.path_id.clone(),
            class: self.path_class.clone(),
        })
    }

    /// 当前路径的命令序列。
    pub fn current_path(&self, content: &Fragment) -> Option<DrawPath> {
        let layer = last_layer(content)?;
        self.resumable(content, &layer).map(|(_, path)| path)
    }
}

fn last_layer(content: &Fragment) -> Option<NodePath> {
    content
        .elements()
        .filter(|(_, element)| is_drawing_layer(element))
        .map(|(index, _)| NodePath::new([index]))
        .last()
}

impl Default for DrawSession {
    fn default() -> Self {
        Self::new("path", "itspath", DrawStyle::default())
    }
}
