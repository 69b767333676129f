use std::fmt;

use svgpad_core::document::placed_bounds;
use svgpad_core::geometry::Point2;
use svgpad_core::markup::{Element, Fragment, Node, NodePath};
use tracing::debug;

use crate::errors::EngineError;

/// 选中标记属性，仅用于渲染，持久化时会被剥离。
pub const SELECTED_MARKER: &str = "selected";
pub const GRID_CLASS: &str = "grid";

/// 由标签、类名与 id 组成的确定性选择器，例如 `path.itspath#p1`。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StableSelector {
    tag: String,
    classes: Vec<String>,
    id: Option<String>,
}

impl StableSelector {
    pub fn of(element: &Element) -> Self {
        Self {
            tag: element.name.clone(),
            classes: element.classes().map(str::to_string).collect(),
            id: element.id().map(str::to_string),
        }
    }

    #[inline]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }

    #[inline]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn matches(&self, element: &Element) -> bool {
        let classes: Vec<&str> = self.classes().collect();
        element.name == self.tag && element.matches(None, self.id(), &classes)
    }

    /// 在内容树中按文档顺序查找第一个匹配元素。
    pub fn locate(&self, content: &Fragment) -> Option<NodePath> {
        content.find(|element| self.matches(element))
    }
}

impl fmt::Display for StableSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag)?;
        for class in &self.classes {
            write!(f, ".{class}")?;
        }
        if let Some(id) = &self.id {
            write!(f, "#{id}")?;
        }
        Ok(())
    }
}

/// 选中通知：选择器与选中元素的完整标记。清除选中时两者均为 `None`。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionResult {
    pub element: Option<StableSelector>,
    pub result: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureMode {
    #[default]
    None,
    Select,
    Pan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoverState {
    pub screen: Point2,
    pub target: NodePath,
    pub label: String,
}

/// 元素可选：位于内容树内部（非根），不带 `grid` 类，标签不含 `svg`。
pub fn is_selectable(content: &Fragment, path: &NodePath) -> bool {
    if path.is_root() {
        return false;
    }
    content.get(path).is_some_and(|element| {
        !element.has_class(GRID_CLASS) && !element.local_name().contains("svg")
    })
}

/// 取包围盒（计入 `transform`，按容差放大）包含该点的最上层（文档顺序最后）可选图形。
pub fn hit_test(content: &Fragment, point: Point2, tolerance: f64) -> Option<NodePath> {
    content
        .walk()
        .into_iter()
        .rev()
        .filter(|(path, _)| is_selectable(content, path))
        .find(|(path, _)| {
            placed_bounds(content, path)
                .is_some_and(|bounds| bounds.inflate(tolerance).contains(point))
        })
        .map(|(path, _)| path)
}

/// 移除所有选中标记，返回移除的数量。
pub fn strip_markers(nodes: &mut [Node]) -> usize {
    let mut cleared = 0;
    for node in nodes {
        if let Node::Element(element) = node {
            if element.remove_attr(SELECTED_MARKER).is_some() {
                cleared += 1;
            }
            cleared += strip_markers(&mut element.children);
        }
    }
    cleared
}

/// 单选模型：选中状态、手势标记与悬停目标。
#[derive(Debug, Clone, Default)]
pub struct SelectionModel {
    selected: Option<NodePath>,
    selector: Option<StableSelector>,
    gesture: GestureMode,
    hover: Option<HoverState>,
}

impl SelectionModel {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn selected_path(&self) -> Option<&NodePath> {
        self.selected.as_ref()
    }

    #[inline]
    pub fn selector(&self) -> Option<&StableSelector> {
        self.selector.as_ref()
    }

    #[inline]
    pub fn gesture(&self) -> GestureMode {
        self.gesture
    }

    #[inline]
    pub fn hover_state(&self) -> Option<&HoverState> {
        self.hover.as_ref()
    }

    /// 丢弃所有运行时状态（打开或关闭文档时）。
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 清除旧标记并标记新目标。目标不存在时返回错误且不改变状态。
    pub fn select(
        &mut self,
        content: &mut Fragment,
        target: Option<&NodePath>,
    ) -> Result<SelectionResult, EngineError> {
        if let Some(path) = target {
            if content.get(path).is_none() {
                return Err(EngineError::NodeNotFound(path.to_string()));
            }
        }
        let cleared = strip_markers(&mut content.nodes);
        self.selected = None;
        self.selector = None;

        let Some(path) = target else {
            debug!(cleared, "选中已清除");
            return Ok(SelectionResult::default());
        };
        let element = content
            .get_mut(path)
            .ok_or_else(|| EngineError::NodeNotFound(path.to_string()))?;
        element.set_attr(SELECTED_MARKER, "true");
        let selector = StableSelector::of(element);
        let result = element.outer_markup();
        debug!(target = %path, selector = %selector, "元素已选中");
        self.selected = Some(path.clone());
        self.selector = Some(selector.clone());
        Ok(SelectionResult {
            element: Some(selector),
            result: Some(result),
        })
    }

    /// 只在选中目标变化时执行 [`Self::select`]，否则返回 `None`。
    pub fn change(
        &mut self,
        content: &mut Fragment,
        target: Option<&NodePath>,
    ) -> Result<Option<SelectionResult>, EngineError> {
        if self.selected.as_ref() == target {
            return Ok(None);
        }
        self.select(content, target).map(Some)
    }

    /// 当前选中状态对应的通知内容。
    pub fn result(&self, content: &Fragment) -> SelectionResult {
        let element = self.selected.as_ref().and_then(|path| content.get(path));
        match (element, &self.selector) {
            (Some(element), Some(selector)) => SelectionResult {
                element: Some(selector.clone()),
                result: Some(element.outer_markup()),
            },
            _ => SelectionResult::default(),
        }
    }

    /// 内容结构变化后按标记重新定位选中元素。
    pub fn sync(&mut self, content: &Fragment) {
        self.selected = content.find(|element| element.has_attr(SELECTED_MARKER));
        if self.selected.is_none() {
            self.selector = None;
        }
    }

    pub fn press(&mut self) {
        self.gesture = GestureMode::Select;
    }

    /// 按下后的拖动转为平移手势。返回是否处于按下状态。
    pub fn drag(&mut self) -> bool {
        if self.gesture == GestureMode::None {
            return false;
        }
        self.gesture = GestureMode::Pan;
        true
    }

    /// 松开指针。平移手势或选中未变化时返回 `None`。
    pub fn release(
        &mut self,
        content: &mut Fragment,
        target: Option<&NodePath>,
    ) -> Result<Option<SelectionResult>, EngineError> {
        let gesture = std::mem::take(&mut self.gesture);
        if gesture != GestureMode::Select {
            return Ok(None);
        }
        let selectable = target
            .filter(|path| is_selectable(content, path))
            .filter(|path| {
                content
                    .get(path)
                    .is_some_and(|element| !element.has_attr(SELECTED_MARKER))
            });
        self.change(content, selectable)
    }

    /// 指针移动：目标可选时记录悬停，否则清除。
    pub fn hover(
        &mut self,
        content: &Fragment,
        screen: Point2,
        target: Option<&NodePath>,
    ) -> Option<&HoverState> {
        self.hover = target
            .filter(|path| is_selectable(content, path))
            .and_then(|path| {
                let element = content.get(path)?;
                Some(HoverState {
                    screen,
                    target: path.clone(),
                    label: StableSelector::of(element).to_string(),
                })
            });
        self.hover.as_ref()
    }

    pub fn leave(&mut self) {
        self.hover = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Fragment {
        Fragment::new(vec![
            Node::Element(
                Element::new("rect")
                    .with_attr("class", "grid")
                    .with_attr("width", "100")
                    .with_attr("height", "100"),
            ),
            Node::Text("\n".to_string()),
            Node::Element(
                Element::new("g").with_attr("id", "layer").with_child(Node::Element(
                    Element::new("circle")
                        .with_attr("class", "a b")
                        .with_attr("id", "c1")
                        .with_attr("cx", "10")
                        .with_attr("cy", "10")
                        .with_attr("r", "5"),
                )),
            ),
            Node::Element(Element::new("svg").with_attr("width", "3")),
        ])
    }

    #[test]
    fn selector_format_is_deterministic() {
        let content = sample();
        let circle = content.get(&NodePath::new([2, 0])).expect("circle");
        let selector = StableSelector::of(circle);
        assert_eq!(selector.to_string(), "circle.a.b#c1");
        assert_eq!(selector.locate(&content), Some(NodePath::new([2, 0])));

        let group = content.get(&NodePath::new([2])).expect("group");
        assert_eq!(StableSelector::of(group).to_string(), "g#layer");
        assert_eq!(StableSelector::of(&Element::new("path")).to_string(), "path");
    }

    #[test]
    fn selectable_rules() {
        let content = sample();
        assert!(!is_selectable(&content, &NodePath::root()));
        assert!(!is_selectable(&content, &NodePath::new([0])));
        assert!(!is_selectable(&content, &NodePath::new([1])));
        assert!(is_selectable(&content, &NodePath::new([2, 0])));
        assert!(!is_selectable(&content, &NodePath::new([3])));
        assert!(!is_selectable(&content, &NodePath::new([9])));
    }

    #[test]
    fn select_moves_single_marker() {
        let mut content = sample();
        let mut model = SelectionModel::new();
        let first = model
            .select(&mut content, Some(&NodePath::new([2])))
            .expect("select group");
        assert_eq!(first.element.map(|s| s.to_string()).as_deref(), Some("g#layer"));
        assert!(first.result.expect("markup").contains("selected=\"true\""));

        model
            .select(&mut content, Some(&NodePath::new([2, 0])))
            .expect("select circle");
        let marked: Vec<_> = content
            .walk()
            .into_iter()
            .filter(|(_, element)| element.has_attr(SELECTED_MARKER))
            .map(|(path, _)| path)
            .collect();
        assert_eq!(marked, vec![NodePath::new([2, 0])]);

        let cleared = model.select(&mut content, None).expect("clear");
        assert_eq!(cleared, SelectionResult::default());
        assert!(content.walk().iter().all(|(_, e)| !e.has_attr(SELECTED_MARKER)));
        assert!(model.selected_path().is_none());

        let err = model
            .select(&mut content, Some(&NodePath::new([7])))
            .unwrap_err();
        assert!(matches!(err, EngineError::NodeNotFound(_)));
    }

    #[test]
    fn release_toggles_and_pan_keeps_selection() {
        let mut content = sample();
        let mut model = SelectionModel::new();
        let circle = NodePath::new([2, 0]);

        model.press();
        let result = model.release(&mut content, Some(&circle)).expect("release");
        assert!(result.expect("changed").element.is_some());
        assert_eq!(model.gesture(), GestureMode::None);

        model.press();
        assert!(model.drag());
        assert_eq!(model.gesture(), GestureMode::Pan);
        assert!(model.release(&mut content, None).expect("pan release").is_none());
        assert_eq!(model.selected_path(), Some(&circle));

        // 再次点击已选中的元素会取消选中
        model.press();
        let result = model.release(&mut content, Some(&circle)).expect("release");
        assert_eq!(result, Some(SelectionResult::default()));

        model.press();
        let result = model
            .release(&mut content, Some(&NodePath::new([0])))
            .expect("grid release");
        assert!(result.is_none());
        assert!(!model.drag());
    }

    #[test]
    fn unchanged_selection_reports_nothing() {
        let mut content = sample();
        let mut model = SelectionModel::new();
        for _ in 0..2 {
            model.press();
            assert!(model.release(&mut content, None).expect("release").is_none());
        }
        assert!(model.change(&mut content, None).expect("clear").is_none());

        let circle = NodePath::new([2, 0]);
        assert!(model.change(&mut content, Some(&circle)).expect("select").is_some());
        assert!(model.change(&mut content, Some(&circle)).expect("again").is_none());

        // 点击空白处清除已有选中
        model.press();
        let cleared = model.release(&mut content, None).expect("release");
        assert_eq!(cleared, Some(SelectionResult::default()));
        model.press();
        assert!(model.release(&mut content, None).expect("release").is_none());
    }

    #[test]
    fn grid_is_never_hovered() {
        let content = sample();
        let mut model = SelectionModel::new();
        assert!(model
            .hover(&content, Point2::new(1.0, 1.0), Some(&NodePath::new([0])))
            .is_none());
        let hover = model
            .hover(&content, Point2::new(4.0, 2.0), Some(&NodePath::new([2, 0])))
            .expect("hover circle");
        assert_eq!(hover.label, "circle.a.b#c1");
        model.leave();
        assert!(model.hover_state().is_none());
    }

    #[test]
    fn hit_test_prefers_topmost_shape() {
        let content = sample();
        assert_eq!(
            hit_test(&content, Point2::new(12.0, 9.0), 0.0),
            Some(NodePath::new([2, 0]))
        );
        // 网格矩形不可选
        assert_eq!(hit_test(&content, Point2::new(80.0, 80.0), 0.0), None);
        assert_eq!(
            hit_test(&content, Point2::new(16.0, 10.0), 2.0),
            Some(NodePath::new([2, 0]))
        );
    }

    #[test]
    fn hit_test_reaches_transformed_shapes_and_text() {
        let moved = Element::new("g")
            .with_attr("transform", "translate(200 0)")
            .with_child(Node::Element(
                Element::new("rect")
                    .with_attr("width", "10")
                    .with_attr("height", "10")
                    .with_attr("transform", "rotate(45)"),
            ));
        let label = Element::new("text")
            .with_attr("x", "300")
            .with_attr("y", "100")
            .with_child(Node::Text("距离".to_string()));
        let content = Fragment::new(vec![Node::Element(moved), Node::Element(label)]);

        assert_eq!(
            hit_test(&content, Point2::new(200.0, 7.0), 0.0),
            Some(NodePath::new([0, 0]))
        );
        // 未计入变换时矩形位于原点附近
        assert_eq!(hit_test(&content, Point2::new(5.0, 5.0), 0.0), None);
        assert_eq!(
            hit_test(&content, Point2::new(305.0, 95.0), 0.0),
            Some(NodePath::new([1]))
        );
    }
}
