use std::path::PathBuf;

use svgpad_config::AppConfig;
use svgpad_core::geometry::{Point2, Vector2};
use svgpad_core::markup::NodePath;
use svgpad_engine::command::CommandRequest;
use svgpad_engine::selection::StableSelector;
use svgpad_engine::view::{RulerUnit, WheelInput};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{info, warn};

use crate::access::{AcceptSuggestion, ExportPanel};
use crate::editor::{DocumentEditor, EditorNotification};
use crate::errors::FrontendError;
use crate::loader::{DocumentSource, editor_settings, open_source};

/// 命令行参数中与前端相关的部分。
#[derive(Debug, Clone, Default)]
pub struct CliOptions {
    pub open: Option<PathBuf>,
    pub save: Option<PathBuf>,
    /// 以分号或换行分隔的脚本指令。
    pub script: Option<String>,
}

/// 脚本中的一条指令。坐标均为屏幕坐标。
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptCommand {
    Pan(Vector2),
    Wheel(WheelInput),
    Zoom { direction: f64, precise: bool },
    Rotate { direction: f64, precise: bool },
    Press,
    Drag(Vector2),
    Release(Point2),
    Hover(Point2),
    Leave,
    Select(NodePath),
    Draw { point: Point2, start: bool },
    Finish,
    Ruler { value: f64, unit: RulerUnit },
    Orientation,
    PathId(String),
    PathClass(String),
    /// 交给命令总线的其它命令。
    Bus(CommandRequest),
}

/// 解析单行脚本。空行与 `#` 开头的注释返回 `None`。
pub fn parse_line(line: &str) -> Result<Option<ScriptCommand>, FrontendError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();
    let flag = |name: &str| args.iter().skip(1).any(|arg| *arg == name);

    let command = match head {
        "pan" => ScriptCommand::Pan(vector(&args)?),
        "drag" => ScriptCommand::Drag(vector(&args)?),
        "wheel" => {
            let delta_y = number(&args, 0)?;
            ScriptCommand::Wheel(WheelInput {
                delta_y,
                precise: flag("precise"),
                rotate: flag("rotate"),
            })
        }
        "zoom" => ScriptCommand::Zoom {
            direction: direction(&args, "in", "out")?,
            precise: flag("precise"),
        },
        "rotate" => ScriptCommand::Rotate {
            direction: direction(&args, "cw", "ccw")?,
            precise: flag("precise"),
        },
        "press" => ScriptCommand::Press,
        "release" => ScriptCommand::Release(point(&args)?),
        "hover" => ScriptCommand::Hover(point(&args)?),
        "leave" => ScriptCommand::Leave,
        "select" => ScriptCommand::Select(node_path(&args)?),
        "draw" => ScriptCommand::Draw {
            point: point(&args)?,
            start: args.get(2).is_some_and(|arg| *arg == "start"),
        },
        "finish" => ScriptCommand::Finish,
        "ruler" => {
            let value = number(&args, 0)?;
            let unit = match args.get(1) {
                Some(token) => RulerUnit::parse(token).ok_or_else(|| {
                    FrontendError::Script(format!("未知的比例尺单位: {token}"))
                })?,
                None => RulerUnit::default(),
            };
            ScriptCommand::Ruler { value, unit }
        }
        "orientation" => ScriptCommand::Orientation,
        "path-id" => ScriptCommand::PathId(word(&args, 0)?.to_string()),
        "path-class" => ScriptCommand::PathClass(word(&args, 0)?.to_string()),
        other => ScriptCommand::Bus(CommandRequest {
            name: other.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }),
    };
    Ok(Some(command))
}

/// 解析整段脚本（分号或换行分隔），错误信息带指令序号。
pub fn parse_script(source: &str) -> Result<Vec<ScriptCommand>, FrontendError> {
    let mut commands = Vec::new();
    for (index, line) in source.split([';', '\n']).enumerate() {
        match parse_line(line) {
            Ok(Some(command)) => commands.push(command),
            Ok(None) => {}
            Err(FrontendError::Script(message)) => {
                return Err(FrontendError::Script(format!("第 {} 条指令: {message}", index + 1)));
            }
            Err(err) => return Err(err),
        }
    }
    Ok(commands)
}

fn word<'a>(args: &[&'a str], index: usize) -> Result<&'a str, FrontendError> {
    args.get(index)
        .copied()
        .ok_or_else(|| FrontendError::Script(format!("缺少第 {} 个参数", index + 1)))
}

fn number(args: &[&str], index: usize) -> Result<f64, FrontendError> {
    let raw = word(args, index)?;
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| FrontendError::Script(format!("无法解析数值: {raw}")))
}

fn vector(args: &[&str]) -> Result<Vector2, FrontendError> {
    Ok(Vector2::new(number(args, 0)?, number(args, 1)?))
}

fn point(args: &[&str]) -> Result<Point2, FrontendError> {
    Ok(Point2::new(number(args, 0)?, number(args, 1)?))
}

fn direction(args: &[&str], positive: &str, negative: &str) -> Result<f64, FrontendError> {
    match word(args, 0)? {
        token if token == positive => Ok(1.0),
        token if token == negative => Ok(-1.0),
        token => Err(FrontendError::Script(format!(
            "方向应为 {positive} 或 {negative}，得到 {token}"
        ))),
    }
}

/// `1/0/2` 形式的节点路径。
fn node_path(args: &[&str]) -> Result<NodePath, FrontendError> {
    let raw = word(args, 0)?;
    raw.split('/')
        .map(|part| {
            part.parse::<usize>()
                .map_err(|_| FrontendError::Script(format!("无法解析节点路径: {raw}")))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(NodePath::new)
}

/// 依次执行脚本指令。
pub async fn run_script(
    editor: &mut DocumentEditor,
    commands: &[ScriptCommand],
) -> Result<(), FrontendError> {
    for command in commands {
        match command {
            ScriptCommand::Pan(delta) => {
                editor.pan(*delta).await?;
            }
            ScriptCommand::Wheel(input) => {
                editor.wheel(*input).await?;
            }
            ScriptCommand::Zoom { direction, precise } => {
                editor.zoom(*direction, *precise).await?;
            }
            ScriptCommand::Rotate { direction, precise } => {
                editor.rotate(*direction, *precise).await?;
            }
            ScriptCommand::Press => editor.press(),
            ScriptCommand::Drag(delta) => {
                editor.drag(*delta).await?;
            }
            ScriptCommand::Release(screen) => editor.release_at(*screen)?,
            ScriptCommand::Hover(screen) => match editor.hover_at(*screen) {
                Some(label) => println!("悬停: {label}"),
                None => println!("悬停: <无>"),
            },
            ScriptCommand::Leave => editor.leave(),
            ScriptCommand::Select(path) => editor.select(path)?,
            ScriptCommand::Draw { point, start } => editor.draw(*point, *start).await?,
            ScriptCommand::Finish => {
                if editor.finish_draw().is_none() {
                    warn!("当前没有进行中的绘制");
                }
            }
            ScriptCommand::Ruler { value, unit } => {
                editor.set_ruler(*value, *unit).await?;
            }
            ScriptCommand::Orientation => {
                editor.toggle_orientation().await?;
            }
            ScriptCommand::PathId(id) => editor.set_path_id(id.clone()),
            ScriptCommand::PathClass(class) => editor.set_path_class(class.clone()),
            ScriptCommand::Bus(request) => {
                let response = editor.command(request).await?;
                if let Some(message) = response.message {
                    println!("{}: {message}", request.name);
                }
            }
        }
    }
    Ok(())
}

/// CLI 前端：打开文档（缺省为内置示例），执行脚本，打印状态并按需保存。
pub async fn run(config: &AppConfig, options: CliOptions) -> Result<(), FrontendError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut editor = DocumentEditor::new(editor_settings(config), Box::new(AcceptSuggestion), tx);
    let panel = ExportPanel::new();
    editor.attach(Box::new(panel.clone()));

    let source = options
        .open
        .clone()
        .map(DocumentSource::File)
        .unwrap_or(DocumentSource::Demo);
    let shapes = open_source(&mut editor, &source).await?;

    println!("Rust 版 SVG 编辑器 CLI");
    match &source {
        DocumentSource::File(path) => println!("已打开文档：{}", path.display()),
        DocumentSource::Demo => {
            if let Some(shapes) = &shapes {
                println!("已构建内置示例图形：");
                println!("  - 网格 = {}", shapes.grid);
                println!("  - 基线 = {}", shapes.baseline);
                println!("  - 标记 = {}", shapes.marker);
                println!("  - 草图 = {}", shapes.sketch);
                println!("  - 文字 = {}", shapes.label);
            }
        }
    }
    print_notifications(&mut rx);

    if let Some(script) = &options.script {
        let commands = parse_script(script)?;
        info!(count = commands.len(), "执行脚本");
        run_script(&mut editor, &commands).await?;
        print_notifications(&mut rx);
    }

    print_summary(&editor);
    if let Some(snapshot) = panel.latest() {
        println!(
            "导出面板：{} ({} 字节, changed={})",
            snapshot.name,
            snapshot.content.len(),
            snapshot.changed
        );
    }

    if let Some(path) = &options.save {
        editor.save_to(path)?;
        println!("已保存到 {}", path.display());
    }
    Ok(())
}

fn print_notifications(rx: &mut UnboundedReceiver<EditorNotification>) {
    while let Ok(notification) = rx.try_recv() {
        match notification {
            EditorNotification::DocumentChanged(change) => println!(
                "文档已变化：{} ({}, {} 字节)",
                change.name,
                change.options.mime_type,
                change.content.len()
            ),
            EditorNotification::SelectionChanged(result) => match result.element {
                Some(selector) => println!("已选中：{selector}"),
                None => println!("选中已清空"),
            },
            EditorNotification::DrawFinished(result) => {
                println!("绘制完成：{}#{} {}", result.class, result.id, result.path)
            }
        }
    }
}

fn print_summary(editor: &DocumentEditor) {
    let state = editor.view_state();
    let scene = editor.scene();
    let page = scene.page();
    println!(
        "视图：缩放={:.3}, 旋转={:.1}°, 偏移=({:.2}, {:.2})",
        state.scale, state.rotation_degrees, state.offset_x, state.offset_y
    );
    println!("页面：{}x{}", page.width, page.height());
    if scene.ruler().is_shown() {
        println!("比例尺：{}", scene.ruler().label());
    } else {
        println!("比例尺：隐藏");
    }
    match scene.selection().selector() {
        Some(selector) => println!("当前选中：{selector}"),
        None => println!("当前尚未选中任何元素。"),
    }
    println!("支持的命令: {}", editor.available_commands().join(", "));
    println!("当前文档元素：");
    for (path, element) in scene.content().walk() {
        println!("  - {path} {}", StableSelector::of(element));
    }
    if let Some(hash) = editor.last_known_hash() {
        println!("内容摘要：{hash}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_view_and_gesture_commands() {
        let script = "# 缩放后平移\nzoom in precise\nrotate ccw\npan 3 -4\n\npress\ndrag 1 1\nrelease 500 300\nwheel -100 rotate\n";
        let commands = parse_script(script).expect("parse");
        assert_eq!(
            commands,
            vec![
                ScriptCommand::Zoom {
                    direction: 1.0,
                    precise: true
                },
                ScriptCommand::Rotate {
                    direction: -1.0,
                    precise: false
                },
                ScriptCommand::Pan(Vector2::new(3.0, -4.0)),
                ScriptCommand::Press,
                ScriptCommand::Drag(Vector2::new(1.0, 1.0)),
                ScriptCommand::Release(Point2::new(500.0, 300.0)),
                ScriptCommand::Wheel(WheelInput {
                    delta_y: -100.0,
                    precise: false,
                    rotate: true
                }),
            ]
        );
    }

    #[test]
    fn parses_draw_ruler_and_bus_commands() {
        assert_eq!(
            parse_line("draw 10 20 start").expect("parse"),
            Some(ScriptCommand::Draw {
                point: Point2::new(10.0, 20.0),
                start: true
            })
        );
        assert_eq!(
            parse_line("ruler 250 km").expect("parse"),
            Some(ScriptCommand::Ruler {
                value: 250.0,
                unit: RulerUnit::Kilometers
            })
        );
        assert_eq!(
            parse_line("select 0/2").expect("parse"),
            Some(ScriptCommand::Select(NodePath::new([0, 2])))
        );
        match parse_line("reset_view").expect("parse") {
            Some(ScriptCommand::Bus(request)) => assert_eq!(request.name, "reset_view"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn reports_line_numbers_for_bad_arguments() {
        let err = parse_script("pan 1 1\nzoom sideways").unwrap_err();
        assert!(matches!(err, FrontendError::Script(ref msg) if msg.starts_with("第 2 条指令")));
        assert!(parse_line("pan 1").is_err());
        assert!(parse_line("ruler 10 miles").is_err());
        assert!(parse_line("draw x 1").is_err());
    }

    #[tokio::test]
    async fn script_runs_against_demo_and_saves() {
        let dir = tempfile::tempdir().expect("temp dir");
        let output = dir.path().join("out.svg");

        run(
            &AppConfig::default(),
            CliOptions {
                open: None,
                save: Some(output.clone()),
                script: Some(
                    "press; release 500 300; draw 100 100 start; draw 120 110; finish; zoom in"
                        .to_string(),
                ),
            },
        )
        .await
        .expect("run");

        let saved = std::fs::read_to_string(&output).expect("read output");
        assert!(saved.contains("scale(1.05)"));
        assert!(saved.contains("class=\"itssvg itspath\""));
        assert!(saved.contains("M100 100 L120 110"));
        assert!(!saved.contains("selected"));
    }
}
