//! 视图变换：平移、缩放、旋转，以及它们在文档中的持久化形式。
//!
//! 持久化布局：
//!
//! ```text
//! <svg id="container" class="itssvg" style="aspect-ratio: A" viewBox="0 0 W H">
//!   <g class="itssvg" id="content" transform="scale(S) rotate(R) translate(X Y)">…</g>
//!   <symbol id="ruler">… <text id="gridscale">V U</text></symbol>
//!   <use id="use-ruler" href="#ruler" …/>
//! </svg>
//! ```

use std::fmt;

use glam::DVec2;
use svgpad_core::document::{DEFAULT_PAGE_WIDTH, LANDSCAPE_ASPECT, PageGeometry};
use svgpad_core::geometry::{Point2, Vector2};
use svgpad_core::markup::{Element, Fragment, Node, escape_text, unescape};
use tracing::{debug, warn};

use crate::errors::EngineError;

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";
pub const WRAPPER_CLASS: &str = "itssvg";
pub const CONTAINER_ID: &str = "container";
pub const CONTENT_ID: &str = "content";
pub const RULER_ID: &str = "ruler";
pub const RULER_USE_ID: &str = "use-ruler";
pub const RULER_TEXT_ID: &str = "gridscale";

const RULER_WIDTH_DIVISOR: f64 = 3.3;
const RULER_BOTTOM_MARGIN: f64 = 50.0;

/// 平移 / 缩放 / 旋转状态，缺省为恒等变换。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransformState {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
    pub rotation_degrees: f64,
}

impl ViewTransformState {
    pub const IDENTITY: Self = Self {
        offset_x: 0.0,
        offset_y: 0.0,
        scale: 1.0,
        rotation_degrees: 0.0,
    };

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(EngineError::InvariantViolation(format!(
                "scale must be positive, got {}",
                self.scale
            )));
        }
        if !(self.offset_x.is_finite()
            && self.offset_y.is_finite()
            && self.rotation_degrees.is_finite())
        {
            return Err(EngineError::InvariantViolation(
                "offset and rotation must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// `scale(S) rotate(R) translate(X Y)`，顺序固定。
    pub fn to_transform_attr(&self) -> String {
        format!(
            "scale({}) rotate({}) translate({} {})",
            self.scale, self.rotation_degrees, self.offset_x, self.offset_y
        )
    }
}

impl Default for ViewTransformState {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RulerUnit {
    #[default]
    Meters,
    Kilometers,
}

impl RulerUnit {
    #[inline]
    pub fn token(self) -> &'static str {
        match self {
            RulerUnit::Meters => "м",
            RulerUnit::Kilometers => "км",
        }
    }

    /// 接受 `м`/`км` 以及 ASCII 写法 `m`/`km`。
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "м" | "m" => Some(RulerUnit::Meters),
            "км" | "km" => Some(RulerUnit::Kilometers),
            _ => None,
        }
    }
}

impl fmt::Display for RulerUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// 比例尺注记。`value == 0` 表示不显示，此时单位不参与比较。
#[derive(Debug, Clone, Copy, Default)]
pub struct ScaleRuler {
    pub value: f64,
    pub unit: RulerUnit,
}

impl ScaleRuler {
    #[inline]
    pub fn new(value: f64, unit: RulerUnit) -> Self {
        Self { value, unit }
    }

    #[inline]
    pub fn hidden() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_shown(&self) -> bool {
        self.value != 0.0
    }

    pub fn label(&self) -> String {
        format!("{} {}", self.value, self.unit)
    }

    /// 解析 `text#gridscale` 的内容，例如 `"250 км"`。
    fn parse_label(raw: &str) -> Self {
        let text = unescape(raw);
        let text = text.trim();
        let number: String = text
            .chars()
            .take_while(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+' | 'e' | 'E'))
            .collect();
        let value = number
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .unwrap_or(0.0);
        if value == 0.0 {
            return Self::hidden();
        }
        let unit = if text.contains("км") || text.contains("km") {
            RulerUnit::Kilometers
        } else {
            RulerUnit::Meters
        };
        Self { value, unit }
    }
}

impl PartialEq for ScaleRuler {
    fn eq(&self, other: &Self) -> bool {
        if !self.is_shown() && !other.is_shown() {
            return true;
        }
        self.value == other.value && self.unit == other.unit
    }
}

/// 滚轮步长。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewSteps {
    pub zoom: f64,
    pub precise_zoom: f64,
    pub rotate: f64,
    pub precise_rotate: f64,
}

impl Default for ViewSteps {
    fn default() -> Self {
        Self {
            zoom: 0.05,
            precise_zoom: 0.005,
            rotate: 5.0,
            precise_rotate: 1.0,
        }
    }
}

/// 一次滚轮输入。`delta_y < 0` 表示放大（或正向旋转）。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelInput {
    pub delta_y: f64,
    pub precise: bool,
    pub rotate: bool,
}

impl WheelInput {
    fn direction(&self) -> f64 {
        if self.delta_y < 0.0 {
            1.0
        } else if self.delta_y > 0.0 {
            -1.0
        } else {
            0.0
        }
    }
}

/// `unwrap` 的结果。`page` 仅在找到外层容器时存在。
#[derive(Debug, Clone, PartialEq)]
pub struct Unwrapped {
    pub content: Fragment,
    pub state: ViewTransformState,
    pub ruler: ScaleRuler,
    pub page: Option<PageGeometry>,
}

/// 把屏幕位移换算成内容坐标系下的平移量：先逆旋转，再除以缩放。
pub fn document_delta(delta: Vector2, rotation_degrees: f64, scale: f64) -> Vector2 {
    let r = rotation_degrees.to_radians();
    let (dx, dy) = (delta.x(), delta.y());
    let x = dx * (-r).cos() + dy * r.sin();
    let y = dx * (-r).sin() + dy * r.cos();
    Vector2::new(x / scale, y / scale)
}

#[derive(Debug, Clone)]
pub struct ViewTransform {
    state: ViewTransformState,
    steps: ViewSteps,
}

impl ViewTransform {
    pub fn new(steps: ViewSteps) -> Self {
        Self {
            state: ViewTransformState::IDENTITY,
            steps,
        }
    }

    #[inline]
    pub fn state(&self) -> ViewTransformState {
        self.state
    }

    #[inline]
    pub fn steps(&self) -> ViewSteps {
        self.steps
    }

    /// 替换状态；非法状态被拒绝且不改变当前值。
    pub fn set_state(&mut self, state: ViewTransformState) -> Result<bool, EngineError> {
        state.validate()?;
        let changed = state != self.state;
        self.state = state;
        Ok(changed)
    }

    pub fn reset(&mut self) -> bool {
        let changed = self.state != ViewTransformState::IDENTITY;
        self.state = ViewTransformState::IDENTITY;
        changed
    }

    pub fn pan(&mut self, delta: Vector2) -> Result<bool, EngineError> {
        if delta.length_squared() == 0.0 {
            return Ok(false);
        }
        let moved = document_delta(delta, self.state.rotation_degrees, self.state.scale);
        let next = ViewTransformState {
            offset_x: self.state.offset_x + moved.x(),
            offset_y: self.state.offset_y + moved.y(),
            ..self.state
        };
        self.set_state(next)
    }

    /// 缩放一步；`direction` 为正表示放大。结果不大于 0 时拒绝。
    pub fn zoom(&mut self, direction: f64, precise: bool) -> Result<bool, EngineError> {
        let step = if precise {
            self.steps.precise_zoom
        } else {
            self.steps.zoom
        };
        if direction == 0.0 {
            return Ok(false);
        }
        let next = ViewTransformState {
            scale: self.state.scale + direction.signum() * step,
            ..self.state
        };
        self.set_state(next)
    }

    /// 旋转一步，结果归一化到 `[0, 360)`。
    pub fn rotate(&mut self, direction: f64, precise: bool) -> Result<bool, EngineError> {
        if direction == 0.0 {
            return Ok(false);
        }
        let step = if precise {
            self.steps.precise_rotate
        } else {
            self.steps.rotate
        };
        let next = ViewTransformState {
            rotation_degrees: (self.state.rotation_degrees + direction.signum() * step)
                .rem_euclid(360.0),
            ..self.state
        };
        self.set_state(next)
    }

    pub fn wheel(&mut self, input: WheelInput) -> Result<bool, EngineError> {
        let direction = input.direction();
        if input.rotate {
            self.rotate(direction, input.precise)
        } else {
            self.zoom(direction, input.precise)
        }
    }

    /// 屏幕坐标 → 内容坐标，变换原点为页面中心。
    pub fn to_document(&self, screen: Point2, page: &PageGeometry) -> Point2 {
        let center = page.center().as_vec2();
        let scaled = (screen.as_vec2() - center) / self.state.scale;
        let unrotated = DVec2::from_angle(-self.state.rotation_degrees.to_radians()).rotate(scaled);
        let offset = DVec2::new(self.state.offset_x, self.state.offset_y);
        Point2::from_vec(unrotated - offset + center)
    }

    /// 内容坐标 → 屏幕坐标，`to_document` 的逆。
    pub fn to_screen(&self, point: Point2, page: &PageGeometry) -> Point2 {
        let center = page.center().as_vec2();
        let offset = DVec2::new(self.state.offset_x, self.state.offset_y);
        let shifted = point.as_vec2() - center + offset;
        let rotated = DVec2::from_angle(self.state.rotation_degrees.to_radians()).rotate(shifted);
        Point2::from_vec(rotated * self.state.scale + center)
    }
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new(ViewSteps::default())
    }
}

fn is_wrapper(element: &Element, name: &str, id: &str) -> bool {
    element.matches(Some(name), Some(id), &[WRAPPER_CLASS])
}

fn is_ruler_node(node: &Node) -> bool {
    node.as_element().is_some_and(|element| {
        matches!(element.id(), Some(RULER_ID) | Some(RULER_USE_ID))
    })
}

fn parse_page(container: &Element) -> PageGeometry {
    let aspect = container
        .attr("style")
        .and_then(|style| {
            style.split(';').find_map(|decl| {
                let (key, value) = decl.split_once(':')?;
                (key.trim() == "aspect-ratio").then(|| value.trim().parse::<f64>().ok())?
            })
        })
        .unwrap_or(LANDSCAPE_ASPECT);
    let width = container
        .attr("viewBox")
        .and_then(|view_box| {
            view_box
                .split(|ch: char| ch.is_whitespace() || ch == ',')
                .filter(|part| !part.is_empty())
                .nth(2)
                .and_then(|value| value.parse::<f64>().ok())
        })
        .filter(|width| width.is_finite() && *width > 0.0)
        .unwrap_or(DEFAULT_PAGE_WIDTH);
    PageGeometry::new(aspect, width)
}

/// 解析变换列表，允许任意顺序与逗号分隔；未知操作忽略。
pub fn parse_transform(raw: &str) -> ViewTransformState {
    let mut state = ViewTransformState::IDENTITY;
    let mut rest = raw;
    while let Some(open) = rest.find('(') {
        let name = rest[..open].trim().trim_start_matches(',').trim();
        let Some(close) = rest[open..].find(')') else {
            break;
        };
        let args: Vec<f64> = rest[open + 1..open + close]
            .split(|ch: char| ch.is_whitespace() || ch == ',')
            .filter(|part| !part.is_empty())
            .filter_map(|part| part.parse::<f64>().ok())
            .collect();
        match name {
            "scale" => {
                if let Some(&sx) = args.first() {
                    state.scale = if sx == 0.0 {
                        args.get(1).copied().unwrap_or(sx)
                    } else {
                        sx
                    };
                }
            }
            "rotate" => {
                if let Some(&angle) = args.first() {
                    state.rotation_degrees = angle;
                }
            }
            "translate" => {
                if let Some(&x) = args.first() {
                    state.offset_x = x;
                    state.offset_y = args.get(1).copied().unwrap_or(0.0);
                }
            }
            other => debug!(operation = other, "忽略未知的变换操作"),
        }
        rest = &rest[open + close + 1..];
    }
    if state.validate().is_err() {
        warn!(transform = raw, "包装层中的变换不合法，非法分量已重置");
        if !(state.scale.is_finite() && state.scale > 0.0) {
            state.scale = 1.0;
        }
        if !state.offset_x.is_finite() {
            state.offset_x = 0.0;
        }
        if !state.offset_y.is_finite() {
            state.offset_y = 0.0;
        }
        if !state.rotation_degrees.is_finite() {
            state.rotation_degrees = 0.0;
        }
    }
    state
}

fn find_ruler(scope: &[Node]) -> ScaleRuler {
    let scope = Fragment::new(scope.to_vec());
    let Some(symbol_path) =
        scope.find(|element| element.local_name() == "symbol" && element.id() == Some(RULER_ID))
    else {
        return ScaleRuler::hidden();
    };
    let Some(symbol) = scope.get(&symbol_path) else {
        return ScaleRuler::hidden();
    };
    symbol
        .find(|element| element.local_name() == "text" && element.id() == Some(RULER_TEXT_ID))
        .and_then(|path| symbol.get(&path))
        .map(|text| ScaleRuler::parse_label(&text.inner_markup()))
        .unwrap_or_else(ScaleRuler::hidden)
}

/// 从文档中取出内容、变换状态、比例尺与页面几何。
/// 找不到包装层时返回恒等状态与原文档，不视为错误。
pub fn unwrap(document: &Fragment) -> Unwrapped {
    let container_path =
        document.find(|element| is_wrapper(element, "svg", CONTAINER_ID));
    let container = container_path.as_ref().and_then(|path| document.get(path));
    let page = container.map(parse_page);
    let scope: &[Node] = match container {
        Some(container) => &container.children,
        None => &document.nodes,
    };

    let ruler = find_ruler(scope);

    let scope_fragment = Fragment::new(scope.to_vec());
    let content_wrapper = scope_fragment
        .find(|element| is_wrapper(element, "g", CONTENT_ID))
        .and_then(|path| scope_fragment.get(&path));

    match content_wrapper {
        Some(wrapper) => {
            let state = wrapper
                .attr("transform")
                .map(|raw| parse_transform(&unescape(raw)))
                .unwrap_or_default();
            Unwrapped {
                content: Fragment::new(wrapper.children.clone()),
                state,
                ruler,
                page,
            }
        }
        None => {
            debug!(has_container = container.is_some(), "未找到内容包装层，使用缺省变换");
            let nodes = if container.is_some() {
                scope
                    .iter()
                    .filter(|node| !is_ruler_node(node))
                    .cloned()
                    .collect()
            } else {
                scope.to_vec()
            };
            Unwrapped {
                content: Fragment::new(nodes),
                state: ViewTransformState::IDENTITY,
                ruler,
                page,
            }
        }
    }
}

fn ruler_symbol(ruler: &ScaleRuler) -> Element {
    let text = |x: f64, value: String, id: Option<&str>| {
        let mut element = Element::new("text");
        if let Some(id) = id {
            element.set_attr("id", id);
        }
        element
            .with_attr("class", "scale-text")
            .with_attr("x", x.to_string())
            .with_attr("y", "14")
            .with_child(Node::Text(escape_text(&value)))
    };
    let value = ruler.value;
    Element::new("symbol")
        .with_attr("id", RULER_ID)
        .with_attr("viewBox", "0 0 250 25")
        .with_child(Node::Element(
            Element::new("rect")
                .with_attr("id", "ruler-bg")
                .with_attr("stroke", "none")
                .with_attr("fill", "rgba(255,255,255,0.5)")
                .with_attr("width", "250")
                .with_attr("height", "25"),
        ))
        .with_child(Node::Element(
            Element::new("path")
                .with_attr("id", "ruler-path")
                .with_attr("stroke", "#000")
                .with_attr("stroke-width", "1px")
                .with_attr("fill", "none")
                .with_attr(
                    "d",
                    "M 25,15 l 0,5 l 200,0 l 0,-5 m -50,0 l 0,5 m -50,0 l 0,-5 m -50,0 l 0,5",
                ),
        ))
        .with_child(Node::Element(text(25.0, "0".to_string(), None)))
        .with_child(Node::Element(text(75.0, (value / 4.0).to_string(), None)))
        .with_child(Node::Element(text(125.0, (value / 2.0).to_string(), None)))
        .with_child(Node::Element(text(175.0, (value * 0.75).to_string(), None)))
        .with_child(Node::Element(text(225.0, ruler.label(), Some(RULER_TEXT_ID))))
}

/// `unwrap` 的逆：把内容重新包进带变换与比例尺的容器。
pub fn wrap(
    content: &Fragment,
    state: &ViewTransformState,
    ruler: &ScaleRuler,
    page: &PageGeometry,
) -> Element {
    let width = page.width;
    let height = page.height();
    let mut wrapper = Element::new("g")
        .with_attr("class", WRAPPER_CLASS)
        .with_attr("id", CONTENT_ID)
        .with_attr("style", "transform-origin: center center")
        .with_attr("transform", state.to_transform_attr());
    wrapper.children = content.nodes.clone();

    let mut container = Element::new("svg")
        .with_attr("id", CONTAINER_ID)
        .with_attr("class", WRAPPER_CLASS)
        .with_attr("style", format!("aspect-ratio: {}", page.aspect))
        .with_attr("viewBox", format!("0 0 {width} {height}"))
        .with_attr("xmlns", SVG_NAMESPACE)
        .with_child(Node::Element(wrapper));

    if ruler.is_shown() {
        let use_width = width / RULER_WIDTH_DIVISOR;
        container.push_element(ruler_symbol(ruler));
        container.push_element(
            Element::new("use")
                .with_attr("id", RULER_USE_ID)
                .with_attr("href", format!("#{RULER_ID}"))
                .with_attr("width", use_width.to_string())
                .with_attr("height", (use_width / 10.0).to_string())
                .with_attr("x", "0")
                .with_attr("y", (height - RULER_BOTTOM_MARGIN).to_string()),
        );
    }
    container
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn pan_without_rotation_moves_by_raw_delta() {
        let mut view = ViewTransform::default();
        assert!(view.pan(Vector2::new(3.0, -4.0)).expect("pan"));
        let state = view.state();
        assert_close(state.offset_x, 3.0);
        assert_close(state.offset_y, -4.0);
        assert!(!view.pan(Vector2::new(0.0, 0.0)).expect("zero pan"));
    }

    #[test]
    fn pan_under_rotation_and_scale_is_inverse_rotated_then_unscaled() {
        let mut view = ViewTransform::default();
        view.set_state(ViewTransformState {
            scale: 2.0,
            rotation_degrees: 90.0,
            ..ViewTransformState::IDENTITY
        })
        .expect("state");
        view.pan(Vector2::new(10.0, 0.0)).expect("pan");
        // cos(-90°)=0, sin(-90°)=-1：x 方向的拖动落在 -y
        assert_close(view.state().offset_x, 0.0);
        assert_close(view.state().offset_y, -5.0);
    }

    #[test]
    fn zoom_steps_follow_precision() {
        let mut view = ViewTransform::default();
        view.wheel(WheelInput {
            delta_y: -120.0,
            ..WheelInput::default()
        })
        .expect("zoom in");
        assert_close(view.state().scale, 1.05);

        let mut precise = ViewTransform::default();
        precise
            .wheel(WheelInput {
                delta_y: -1.0,
                precise: true,
                rotate: false,
            })
            .expect("precise zoom");
        assert_close(precise.state().scale, 1.005);

        assert!(!precise.wheel(WheelInput::default()).expect("no-op"));
    }

    #[test]
    fn zoom_never_reaches_non_positive_scale() {
        let mut view = ViewTransform::default();
        view.set_state(ViewTransformState {
            scale: 0.1,
            ..ViewTransformState::IDENTITY
        })
        .expect("state");
        view.zoom(-1.0, false).expect("zoom out");
        assert_close(view.state().scale, 0.05);
        view.set_state(ViewTransformState {
            scale: 0.05,
            ..ViewTransformState::IDENTITY
        })
        .expect("state");
        let err = view.zoom(-1.0, false).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
        assert_close(view.state().scale, 0.05);
    }

    #[test]
    fn rotation_steps_and_normalises() {
        let mut view = ViewTransform::default();
        view.wheel(WheelInput {
            delta_y: 1.0,
            precise: false,
            rotate: true,
        })
        .expect("rotate");
        assert_close(view.state().rotation_degrees, 355.0);
        view.rotate(1.0, true).expect("precise rotate");
        assert_close(view.state().rotation_degrees, 356.0);
        view.rotate(1.0, false).expect("rotate");
        assert_close(view.state().rotation_degrees, 1.0);
    }

    #[test]
    fn screen_and_document_mapping_are_inverse() {
        let page = PageGeometry::new(LANDSCAPE_ASPECT, 800.0);
        let mut view = ViewTransform::default();
        assert_eq!(
            view.to_document(Point2::new(12.0, 34.0), &page),
            Point2::new(12.0, 34.0)
        );
        view.set_state(ViewTransformState {
            offset_x: 15.0,
            offset_y: -7.5,
            scale: 1.75,
            rotation_degrees: 33.0,
        })
        .expect("state");
        let screen = Point2::new(120.0, 80.0);
        let back = view.to_screen(view.to_document(screen, &page), &page);
        assert_close(back.x(), screen.x());
        assert_close(back.y(), screen.y());
    }

    #[test]
    fn transform_parsing_is_tolerant() {
        let state = parse_transform("translate(5,6) rotate(30 10 10) scale(0 2)");
        assert_eq!(
            state,
            ViewTransformState {
                offset_x: 5.0,
                offset_y: 6.0,
                scale: 2.0,
                rotation_degrees: 30.0,
            }
        );
        let state = parse_transform("scale(-3) skewX(4)");
        assert_close(state.scale, 1.0);
        assert_eq!(parse_transform(""), ViewTransformState::IDENTITY);
    }

    #[test]
    fn ruler_label_parsing() {
        assert_eq!(
            ScaleRuler::parse_label(" 250 км"),
            ScaleRuler::new(250.0, RulerUnit::Kilometers)
        );
        assert_eq!(
            ScaleRuler::parse_label("1.5 м"),
            ScaleRuler::new(1.5, RulerUnit::Meters)
        );
        assert!(!ScaleRuler::parse_label("abc").is_shown());
        assert_eq!(RulerUnit::parse("km"), Some(RulerUnit::Kilometers));
        assert_eq!(RulerUnit::parse("ft"), None);
    }

    #[test]
    fn unwrap_without_wrapper_keeps_document() {
        let document = Fragment::new(vec![Node::Element(
            Element::new("svg").with_child(Node::Element(Element::new("path"))),
        )]);
        let unwrapped = unwrap(&document);
        assert_eq!(unwrapped.content, document);
        assert_eq!(unwrapped.state, ViewTransformState::IDENTITY);
        assert!(!unwrapped.ruler.is_shown());
        assert!(unwrapped.page.is_none());
    }

    #[test]
    fn wrap_places_ruler_only_when_shown() {
        let content = Fragment::new(vec![Node::Element(Element::new("circle"))]);
        let page = PageGeometry::new(LANDSCAPE_ASPECT, 660.0);
        let hidden = wrap(&content, &ViewTransformState::IDENTITY, &ScaleRuler::hidden(), &page);
        assert_eq!(hidden.child_elements().count(), 1);

        let shown = wrap(
            &content,
            &ViewTransformState::IDENTITY,
            &ScaleRuler::new(10.0, RulerUnit::Meters),
            &page,
        );
        let ids: Vec<&str> = shown.child_elements().filter_map(|(_, e)| e.id()).collect();
        assert_eq!(ids, [CONTENT_ID, RULER_ID, RULER_USE_ID]);
        let (_, use_element) = shown.last_element_child().expect("use");
        assert_eq!(
            use_element.attr("width"),
            Some(&*(660.0 / RULER_WIDTH_DIVISOR).to_string())
        );
        assert_eq!(use_element.attr("y"), Some(&*(page.height() - 50.0).to_string()));
        let (_, wrapper) = shown.child_elements().next().expect("wrapper");
        assert_eq!(
            wrapper.attr("transform"),
            Some("scale(1) rotate(0) translate(0 0)")
        );
    }
}
