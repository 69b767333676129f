pub mod command;
pub mod draw;
pub mod selection;
pub mod view;

pub mod errors {
    use thiserror::Error;

    #[derive(Debug, Error)]
    pub enum EngineError {
        #[error("invariant violated: {0}")]
        InvariantViolation(String),
        #[error("node {0} not found in content")]
        NodeNotFound(String),
        #[error("node {0} is not selectable")]
        NotSelectable(String),
    }
}

pub mod scene {
    use svgpad_core::document::{Document, PageGeometry};
    use svgpad_core::geometry::{Point2, Vector2};
    use svgpad_core::markup::{Element, Fragment, Node, NodePath, WriteOptions, escape_text};
    use tracing::{debug, info};

    use crate::draw::{DrawResult, DrawSession, DrawStyle};
    use crate::errors::EngineError;
    use crate::selection::{
        HoverState, SELECTED_MARKER, SelectionModel, SelectionResult, hit_test, is_selectable,
        strip_markers,
    };
    use crate::view::{
        self, RulerUnit, ScaleRuler, ViewSteps, ViewTransform, ViewTransformState, WheelInput,
    };

    const DEFAULT_HIT_TOLERANCE: f64 = 3.0;

    /// 构建场景所需的参数，通常来自配置文件。
    #[derive(Debug, Clone)]
    pub struct SceneSettings {
        pub steps: ViewSteps,
        pub page: PageGeometry,
        pub ruler_unit: RulerUnit,
        pub path_id: String,
        pub path_class: String,
        pub style: DrawStyle,
        pub hit_tolerance: f64,
    }

    impl Default for SceneSettings {
        fn default() -> Self {
            Self {
                steps: ViewSteps::default(),
                page: PageGeometry::default(),
                ruler_unit: RulerUnit::default(),
                path_id: "path".to_string(),
                path_class: "itspath".to_string(),
                style: DrawStyle::default(),
                hit_tolerance: DEFAULT_HIT_TOLERANCE,
            }
        }
    }

    /// 引擎层维护去包装后的文档以及视图、比例尺、选中和绘制等运行时状态。
    #[derive(Debug)]
    pub struct Scene {
        document: Document,
        view: ViewTransform,
        ruler: ScaleRuler,
        selection: SelectionModel,
        draw: DrawSession,
        settings: SceneSettings,
    }

    #[derive(Debug, Clone)]
    pub struct DemoShapes {
        pub grid: NodePath,
        pub baseline: NodePath,
        pub marker: NodePath,
        pub sketch: NodePath,
        pub label: NodePath,
    }

    impl Scene {
        pub fn new(settings: SceneSettings) -> Self {
            Self {
                document: Document::with_content(Fragment::default(), settings.page),
                view: ViewTransform::new(settings.steps),
                ruler: ScaleRuler::hidden(),
                selection: SelectionModel::new(),
                draw: DrawSession::new(
                    settings.path_id.clone(),
                    settings.path_class.clone(),
                    settings.style.clone(),
                ),
                settings,
            }
        }

        /// 清空文档与全部运行时状态。
        pub fn reset(&mut self) {
            self.document = Document::with_content(Fragment::default(), self.settings.page);
            self.view.reset();
            self.ruler = ScaleRuler::hidden();
            self.selection.reset();
            self.draw.reset();
        }

        /// 从完整文档（含包装层）载入，替换全部子状态。
        pub fn load(&mut self, document: &Fragment) {
            let unwrapped = view::unwrap(document);
            let page = unwrapped.page.unwrap_or(self.settings.page);
            let mut content = unwrapped.content;
            let mut selection = SelectionModel::new();
            // 旧文件中残留的选中标记不代表当前选中
            if let Err(err) = selection.select(&mut content, None) {
                debug!(error = %err, "清理选中标记失败");
            }
            let mut view = ViewTransform::new(self.settings.steps);
            if let Err(err) = view.set_state(unwrapped.state) {
                debug!(error = %err, "文件中的视图状态不合法，使用恒等变换");
            }
            self.document = Document::with_content(content, page);
            self.view = view;
            self.ruler = unwrapped.ruler;
            self.selection = selection;
            self.draw.reset();
            info!(
                scale = self.view.state().scale,
                rotation = self.view.state().rotation_degrees,
                ruler = self.ruler.value,
                "文档已载入场景"
            );
        }

        #[inline]
        pub fn document(&self) -> &Document {
            &self.document
        }

        #[inline]
        pub fn content(&self) -> &Fragment {
            self.document.content()
        }

        #[inline]
        pub fn page(&self) -> PageGeometry {
            self.document.page()
        }

        #[inline]
        pub fn view(&self) -> &ViewTransform {
            &self.view
        }

        #[inline]
        pub fn view_state(&self) -> ViewTransformState {
            self.view.state()
        }

        #[inline]
        pub fn ruler(&self) -> ScaleRuler {
            self.ruler
        }

        #[inline]
        pub fn selection(&self) -> &SelectionModel {
            &self.selection
        }

        #[inline]
        pub fn draw_session(&self) -> &DrawSession {
            &self.draw
        }

        #[inline]
        pub fn settings(&self) -> &SceneSettings {
            &self.settings
        }

        /// 重新包装为完整文档，包含选中标记。
        pub fn wrap(&self) -> Element {
            view::wrap(
                self.document.content(),
                &self.view.state(),
                &self.ruler,
                &self.document.page(),
            )
        }

        /// 持久化形式：去掉只用于渲染的选中标记。
        pub fn to_markup(&self) -> String {
            self.wrap().outer_markup_with(&WriteOptions {
                omit_attributes: &[SELECTED_MARKER],
            })
        }

        /// 持久化形式的节点树，供 `DocumentSaver` 写出。
        pub fn persisted(&self) -> Fragment {
            let mut wrapped = self.wrap();
            strip_markers(&mut wrapped.children);
            Fragment::new(vec![Node::Element(wrapped)])
        }

        pub fn pan(&mut self, delta: Vector2) -> Result<bool, EngineError> {
            self.view.pan(delta)
        }

        pub fn wheel(&mut self, input: WheelInput) -> Result<bool, EngineError> {
            self.view.wheel(input)
        }

        pub fn zoom(&mut self, direction: f64, precise: bool) -> Result<bool, EngineError> {
            self.view.zoom(direction, precise)
        }

        pub fn rotate(&mut self, direction: f64, precise: bool) -> Result<bool, EngineError> {
            self.view.rotate(direction, precise)
        }

        #[inline]
        pub fn reset_view(&mut self) -> bool {
            self.view.reset()
        }

        pub fn set_ruler(&mut self, ruler: ScaleRuler) -> Result<bool, EngineError> {
            if !ruler.value.is_finite() {
                return Err(EngineError::InvariantViolation(format!(
                    "ruler value must be finite, got {}",
                    ruler.value
                )));
            }
            let changed = ruler != self.ruler;
            self.ruler = ruler;
            Ok(changed)
        }

        /// 横向与纵向页面互换。
        pub fn toggle_orientation(&mut self) -> bool {
            self.document.page_mut().toggle_orientation();
            debug!(aspect = self.document.page().aspect, "页面方向已切换");
            true
        }

        /// 屏幕坐标下最上层的可选元素。
        pub fn target_at(&self, screen: Point2) -> Option<NodePath> {
            let point = self.view.to_document(screen, &self.document.page());
            hit_test(self.document.content(), point, self.settings.hit_tolerance)
        }

        pub fn press(&mut self) {
            self.selection.press();
        }

        /// 按下后的拖动平移视图，返回视图是否改变。
        pub fn drag(&mut self, delta: Vector2) -> Result<bool, EngineError> {
            if !self.selection.drag() {
                return Ok(false);
            }
            self.view.pan(delta)
        }

        pub fn release(
            &mut self,
            target: Option<&NodePath>,
        ) -> Result<Option<SelectionResult>, EngineError> {
            self.selection.release(self.document.content_mut(), target)
        }

        pub fn release_at(&mut self, screen: Point2) -> Result<Option<SelectionResult>, EngineError> {
            let target = self.target_at(screen);
            self.release(target.as_ref())
        }

        pub fn hover(&mut self, screen: Point2, target: Option<&NodePath>) -> Option<&HoverState> {
            self.selection.hover(self.document.content(), screen, target)
        }

        pub fn hover_at(&mut self, screen: Point2) -> Option<&HoverState> {
            let target = self.target_at(screen);
            self.selection
                .hover(self.document.content(), screen, target.as_ref())
        }

        pub fn leave(&mut self) {
            self.selection.leave();
        }

        /// 程序化选中。目标必须可选；选中未变化时返回 `None`。
        pub fn select(
            &mut self,
            target: &NodePath,
        ) -> Result<Option<SelectionResult>, EngineError> {
            if !is_selectable(self.document.content(), target) {
                return Err(EngineError::NotSelectable(target.to_string()));
            }
            self.selection
                .change(self.document.content_mut(), Some(target))
        }

        pub fn clear_selection(&mut self) -> Result<Option<SelectionResult>, EngineError> {
            self.selection.change(self.document.content_mut(), None)
        }

        pub fn selection_result(&self) -> SelectionResult {
            self.selection.result(self.document.content())
        }

        /// 提交一个绘制点（屏幕坐标）。
        pub fn draw(&mut self, screen: Point2, start: bool) -> Result<NodePath, EngineError> {
            let page = self.document.page();
            let path = self.draw.submit(
                self.document.content_mut(),
                &self.view,
                &page,
                screen,
                start,
            )?;
            self.selection.sync(self.document.content());
            Ok(path)
        }

        pub fn finish_draw(&self) -> Option<DrawResult> {
            self.draw.finish(self.document.content())
        }

        pub fn set_path_id(&mut self, id: impl Into<String>) {
            self.draw.set_path_id(id);
        }

        pub fn set_path_class(&mut self, class: impl Into<String>) {
            self.draw.set_path_class(class);
        }

        /// 为 CLI / 快速验证填充一份示例图纸。
        pub fn populate_demo(&mut self) -> DemoShapes {
            self.reset();
            let content = self.document.content_mut();
            let shape = |element: Element| Node::Element(element);
            content.nodes = vec![
                shape(
                    Element::new("rect")
                        .with_attr("class", "grid")
                        .with_attr("width", "1000")
                        .with_attr("height", "707")
                        .with_attr("fill", "none"),
                ),
                shape(
                    Element::new("line")
                        .with_attr("id", "baseline")
                        .with_attr("x1", "100")
                        .with_attr("y1", "600")
                        .with_attr("x2", "900")
                        .with_attr("y2", "600")
                        .with_attr("stroke", "#333"),
                ),
                shape(
                    Element::new("circle")
                        .with_attr("id", "marker")
                        .with_attr("class", "poi")
                        .with_attr("cx", "500")
                        .with_attr("cy", "300")
                        .with_attr("r", "40"),
                ),
                shape(
                    Element::new("polyline")
                        .with_attr("id", "sketch")
                        .with_attr("points", "100,100 200,180 320,120")
                        .with_attr("fill", "none")
                        .with_attr("stroke", "#06c"),
                ),
                shape(
                    Element::new("text")
                        .with_attr("id", "label")
                        .with_attr("x", "120")
                        .with_attr("y", "650")
                        .with_child(Node::Text(escape_text("svgpad 示例"))),
                ),
            ];
            self.ruler = ScaleRuler::new(100.0, self.settings.ruler_unit);
            let shapes = DemoShapes {
                grid: NodePath::new([0]),
                baseline: NodePath::new([1]),
                marker: NodePath::new([2]),
                sketch: NodePath::new([3]),
                label: NodePath::new([4]),
            };
            debug!(
                marker = %shapes.marker,
                sketch = %shapes.sketch,
                label = %shapes.label,
                "已创建演示图形"
            );
            shapes
        }
    }

    impl Default for Scene {
        fn default() -> Self {
            Self::new(SceneSettings::default())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::selection::GestureMode;

        #[test]
        fn demo_population_creates_shapes() {
            let mut scene = Scene::default();
            let shapes = scene.populate_demo();
            assert_eq!(scene.content().elements().count(), 5);
            assert!(scene.content().get(&shapes.sketch).is_some());
            assert!(scene.ruler().is_shown());
        }

        #[test]
        fn selection_never_reaches_persisted_markup() {
            let mut scene = Scene::default();
            let shapes = scene.populate_demo();
            let before = scene.to_markup();
            scene.select(&shapes.marker).expect("select marker");
            assert!(scene.wrap().outer_markup().contains("selected=\"true\""));
            assert_eq!(scene.to_markup(), before);
            assert_eq!(scene.persisted().to_markup(), before);

            let err = scene.select(&shapes.grid).unwrap_err();
            assert!(matches!(err, EngineError::NotSelectable(_)));
        }

        #[test]
        fn press_and_release_on_screen_point_selects_topmost_shape() {
            let mut scene = Scene::default();
            let shapes = scene.populate_demo();
            scene.press();
            let result = scene
                .release_at(Point2::new(510.0, 290.0))
                .expect("release")
                .expect("selection change");
            assert_eq!(
                result.element.map(|selector| selector.to_string()).as_deref(),
                Some("circle.poi#marker")
            );
            assert_eq!(scene.selection().selected_path(), Some(&shapes.marker));

            // 拖动只平移视图，不影响选中
            scene.press();
            assert!(scene.drag(Vector2::new(5.0, 0.0)).expect("drag"));
            assert_eq!(scene.selection().gesture(), GestureMode::Pan);
            assert!(scene.release(None).expect("release").is_none());
            assert_eq!(scene.selection().selected_path(), Some(&shapes.marker));
            assert_eq!(scene.view_state().offset_x, 5.0);

            assert!(!scene.drag(Vector2::new(5.0, 0.0)).expect("drag without press"));
        }

        #[test]
        fn release_on_demo_label_selects_text() {
            let mut scene = Scene::default();
            let shapes = scene.populate_demo();
            scene.press();
            scene
                .release_at(Point2::new(150.0, 645.0))
                .expect("release")
                .expect("selection change");
            assert_eq!(scene.selection().selected_path(), Some(&shapes.label));

            // 再次点击取消选中，之后点击空白处不再产生变化
            scene.press();
            let cleared = scene.release_at(Point2::new(150.0, 645.0)).expect("release");
            assert_eq!(cleared, Some(SelectionResult::default()));
            scene.press();
            assert!(scene.release_at(Point2::new(950.0, 20.0)).expect("release").is_none());
        }

        #[test]
        fn hover_uses_hit_testing() {
            let mut scene = Scene::default();
            scene.populate_demo();
            let hover = scene.hover_at(Point2::new(500.0, 300.0)).expect("hover");
            assert_eq!(hover.label, "circle.poi#marker");
            // 空白处只命中网格，不算悬停
            assert!(scene.hover_at(Point2::new(950.0, 50.0)).is_none());
            scene.leave();
            assert!(scene.selection().hover_state().is_none());
        }

        #[test]
        fn drawing_keeps_selection_marker_in_place() {
            let mut scene = Scene::default();
            let shapes = scene.populate_demo();
            scene.select(&shapes.label).expect("select");
            scene.draw(Point2::new(10.0, 10.0), true).expect("draw");
            scene.draw(Point2::new(20.0, 10.0), false).expect("draw");
            assert_eq!(scene.selection().selected_path(), Some(&shapes.label));
            let result = scene.finish_draw().expect("finished");
            assert!(result.path.contains("d=\"M10 10 L20 10\""));
        }

        #[test]
        fn load_replaces_state_from_wrapped_markup() {
            let mut scene = Scene::default();
            scene.populate_demo();
            scene.zoom(1.0, false).expect("zoom");
            scene.toggle_orientation();
            scene
                .set_ruler(ScaleRuler::new(5.0, RulerUnit::Kilometers))
                .expect("ruler");
            let wrapped = Fragment::new(vec![Node::Element(scene.wrap())]);

            let mut other = Scene::default();
            other.load(&wrapped);
            assert_eq!(other.view_state(), scene.view_state());
            assert_eq!(other.ruler(), scene.ruler());
            assert_eq!(other.page(), scene.page());
            assert_eq!(other.content(), scene.content());
            assert_eq!(other.to_markup(), scene.to_markup());
        }

        #[test]
        fn ruler_rejects_non_finite_values() {
            let mut scene = Scene::default();
            assert!(scene.set_ruler(ScaleRuler::new(f64::NAN, RulerUnit::Meters)).is_err());
            assert!(!scene.set_ruler(ScaleRuler::hidden()).expect("unchanged"));
            assert!(scene
                .set_ruler(ScaleRuler::new(1.0, RulerUnit::Meters))
                .expect("changed"));
        }
    }
}
