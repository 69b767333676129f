use std::path::PathBuf;

use svgpad_config::{AppConfig, RulerUnitName};
use svgpad_core::document::PageGeometry;
use svgpad_engine::draw::DrawStyle;
use svgpad_engine::scene::{DemoShapes, Scene, SceneSettings};
use svgpad_engine::view::{RulerUnit, ViewSteps};
use tracing::{info, warn};

use crate::editor::{DocumentEditor, EditorSettings};
use crate::errors::FrontendError;

/// 内置示例使用的文件名。
pub const DEMO_FILE_NAME: &str = "demo.svg";

/// 文档来源，便于前端呈现加载信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
    File(PathBuf),
    Demo,
}

/// 把配置映射为编辑器参数。
pub fn editor_settings(config: &AppConfig) -> EditorSettings {
    let view = &config.view;
    let draw = &config.draw;
    let ruler_unit = match view.ruler_unit {
        RulerUnitName::Meters => RulerUnit::Meters,
        RulerUnitName::Kilometers => RulerUnit::Kilometers,
    };
    EditorSettings {
        scene: SceneSettings {
            steps: ViewSteps {
                zoom: view.zoom_step,
                precise_zoom: view.precise_zoom_step,
                rotate: view.rotate_step,
                precise_rotate: view.precise_rotate_step,
            },
            page: PageGeometry::new(view.orientation.aspect(), view.page_width),
            ruler_unit,
            path_id: draw.path_id.clone(),
            path_class: draw.path_class.clone(),
            style: DrawStyle {
                stroke: draw.stroke.clone(),
                stroke_width: draw.stroke_width,
                stroke_dasharray: draw.stroke_dasharray.clone(),
                fill: draw.fill.clone(),
            },
            ..SceneSettings::default()
        },
        default_file_name: config.frontend.default_file_name.clone(),
    }
}

pub fn load_app_config() -> AppConfig {
    match AppConfig::discover() {
        Ok(cfg) => cfg,
        Err(err) => {
            warn!(error = %err, "读取配置失败，使用默认配置");
            AppConfig::default()
        }
    }
}

/// 在编辑器中打开来源。示例文档会返回各图形的路径。
pub async fn open_source(
    editor: &mut DocumentEditor,
    source: &DocumentSource,
) -> Result<Option<DemoShapes>, FrontendError> {
    match source {
        DocumentSource::File(path) => {
            editor.open_path(path).await?;
            info!(path = %path.display(), "从 SVG 加载文档成功");
            Ok(None)
        }
        DocumentSource::Demo => {
            let mut scene = Scene::new(editor.scene().settings().clone());
            let shapes = scene.populate_demo();
            editor
                .new_file(DEMO_FILE_NAME, Some(&scene.to_markup()))
                .await?;
            info!("已载入内置示例");
            Ok(Some(shapes))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::AcceptSuggestion;
    use svgpad_core::document::Orientation;
    use tokio::sync::mpsc;

    #[test]
    fn config_maps_to_scene_settings() {
        let mut config = AppConfig::default();
        config.view.zoom_step = 0.1;
        config.view.orientation = Orientation::Portrait;
        config.view.ruler_unit = RulerUnitName::Kilometers;
        config.draw.path_id = "route".to_string();
        config.draw.stroke_width = 2.5;
        config.frontend.default_file_name = "plan".to_string();

        let settings = editor_settings(&config);
        assert_eq!(settings.scene.steps.zoom, 0.1);
        assert_eq!(settings.scene.steps.precise_rotate, 1.0);
        assert_eq!(settings.scene.page.aspect, Orientation::Portrait.aspect());
        assert_eq!(settings.scene.ruler_unit, RulerUnit::Kilometers);
        assert_eq!(settings.scene.path_id, "route");
        assert_eq!(settings.scene.style.stroke_width, 2.5);
        assert_eq!(settings.default_file_name, "plan");
    }

    #[tokio::test]
    async fn demo_source_keeps_shape_paths_valid() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut editor = DocumentEditor::new(
            editor_settings(&AppConfig::default()),
            Box::new(AcceptSuggestion),
            tx,
        );
        let shapes = open_source(&mut editor, &DocumentSource::Demo)
            .await
            .expect("open demo")
            .expect("demo shapes");
        assert_eq!(editor.file_name(), Some(DEMO_FILE_NAME));
        let marker = editor.scene().content().get(&shapes.marker).expect("marker");
        assert_eq!(marker.id(), Some("marker"));
        assert!(editor.scene().ruler().is_shown());
        assert!(!editor.changed());
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut editor =
            DocumentEditor::new(EditorSettings::default(), Box::new(AcceptSuggestion), tx);
        let dir = tempfile::tempdir().expect("temp dir");
        let err = open_source(&mut editor, &DocumentSource::File(dir.path().join("none.svg")))
            .await
            .unwrap_err();
        assert!(matches!(err, FrontendError::Read(_)));
        assert!(editor.file_name().is_none());
    }
}
