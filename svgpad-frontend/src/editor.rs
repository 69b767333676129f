//! 文档编辑器：持有唯一的场景与文件记录，把每次改动写回 SVG 文本并发出通知。

use std::path::Path;
use std::sync::Arc;

use svgpad_core::geometry::{Point2, Vector2};
use svgpad_core::markup::NodePath;
use svgpad_engine::command::{CommandBus, CommandContext, CommandRequest, CommandResponse};
use svgpad_engine::draw::DrawResult;
use svgpad_engine::scene::{Scene, SceneSettings};
use svgpad_engine::selection::SelectionResult;
use svgpad_engine::view::{RulerUnit, ScaleRuler, ViewTransformState, WheelInput};
use svgpad_io::reader::open_file;
use svgpad_io::{
    AbortHandle, DisplayHandles, DocumentSaver, FileRecord, SVG_MIME_TYPE, SvgFacade,
    SvgFileReader, WriteOutcome, parse_markup,
};
use tokio::io::AsyncRead;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::access::{FileAccess, FileSnapshot, NameResolver};
use crate::errors::FrontendError;

#[derive(Debug, Clone)]
pub struct EditorSettings {
    pub scene: SceneSettings,
    /// 名称解析器放弃时使用的文件名。
    pub default_file_name: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            scene: SceneSettings::default(),
            default_file_name: "unnamed".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChangeOptions {
    pub mime_type: String,
}

/// 文档内容变化通知。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub name: String,
    pub content: String,
    pub options: FileChangeOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorNotification {
    DocumentChanged(FileChange),
    SelectionChanged(SelectionResult),
    DrawFinished(DrawResult),
}

pub struct DocumentEditor {
    scene: Scene,
    reader: SvgFileReader,
    handles: DisplayHandles,
    record: Option<FileRecord>,
    resolver: Box<dyn NameResolver>,
    notifier: UnboundedSender<EditorNotification>,
    collaborators: Vec<Box<dyn FileAccess>>,
    commands: CommandBus,
    default_file_name: String,
}

impl DocumentEditor {
    pub fn new(
        settings: EditorSettings,
        resolver: Box<dyn NameResolver>,
        notifier: UnboundedSender<EditorNotification>,
    ) -> Self {
        let handles = DisplayHandles::new();
        Self {
            scene: Scene::new(settings.scene),
            reader: SvgFileReader::new(handles.clone()),
            handles,
            record: None,
            resolver,
            notifier,
            collaborators: Vec::new(),
            commands: CommandBus::new(),
            default_file_name: settings.default_file_name,
        }
    }

    #[inline]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// 当前文件名；尚未建立文件记录时为 `None`。
    pub fn file_name(&self) -> Option<&str> {
        self.record.as_ref().map(FileRecord::name)
    }

    /// 最近一次写入是否改变了内容。
    pub fn changed(&self) -> bool {
        self.record.as_ref().is_some_and(FileRecord::changed)
    }

    pub fn last_known_hash(&self) -> Option<String> {
        self.record.as_ref().map(FileRecord::last_known_hash)
    }

    /// 下一次读取使用的中止句柄。
    pub fn abort_handle(&self) -> AbortHandle {
        self.reader.abort_handle()
    }

    #[inline]
    pub fn progress(&self) -> Option<u8> {
        self.reader.progress()
    }

    #[inline]
    pub fn display_handles(&self) -> &DisplayHandles {
        &self.handles
    }

    pub fn available_commands(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.commands.available_commands().copied().collect();
        names.sort_unstable();
        names
    }

    /// 登记协作者；支持文件访问的协作者立即收到当前文件。
    pub fn attach(&mut self, mut collaborator: Box<dyn FileAccess>) {
        if collaborator.supports_file_access() {
            collaborator.set_file(self.snapshot());
        } else {
            debug!("协作者不支持文件访问，不分发文件");
        }
        self.collaborators.push(collaborator);
    }

    /// 读取并打开文档。读取、解析或摘要任一步失败时保持原状态。
    /// 包装只发生在内存里，摘要仍对应原始文本，直到第一次编辑才写入。
    pub async fn open<R>(
        &mut self,
        name: impl Into<String>,
        source: R,
        total: Option<u64>,
    ) -> Result<(), FrontendError>
    where
        R: AsyncRead + Unpin,
    {
        let name = name.into();
        let text = self.reader.fetch(&name, source, total).await?;
        let document = parse_markup(&text)?;
        let record = FileRecord::open(name.clone(), Arc::<[u8]>::from(text.as_bytes())).await?;

        self.reader.accept(name.clone(), text);
        self.scene.load(&document);
        self.record = Some(record);
        self.distribute();
        info!(name = %name, "文档已打开");
        Ok(())
    }

    pub async fn open_path(&mut self, path: &Path) -> Result<(), FrontendError> {
        let (name, file, total) = open_file(path).await?;
        self.open(name, file, total).await
    }

    /// 以给定文本新建文档。已有打开的文件时需要先关闭。
    pub async fn new_file(
        &mut self,
        name: impl Into<String>,
        content: Option<&str>,
    ) -> Result<(), FrontendError> {
        let name = name.into();
        let text = content.unwrap_or_default();
        let document = parse_markup(text)?;
        let record = FileRecord::open(name.clone(), Arc::<[u8]>::from(text.as_bytes())).await?;
        self.reader.new_file(name.clone(), Some(text))?;
        self.scene.load(&document);
        self.record = Some(record);
        self.distribute();
        info!(name = %name, "已新建文档");
        Ok(())
    }

    /// 关闭文档：清空全部子状态并撤销展示句柄。
    pub fn close(&mut self) {
        self.scene.reset();
        self.reader.close();
        self.record = None;
        self.distribute();
        info!("文档已关闭");
    }

    /// 把持久化形式写到本地文件。
    pub fn save_to(&self, path: &Path) -> Result<(), FrontendError> {
        if self.record.is_none() {
            return Err(FrontendError::NoDocument);
        }
        SvgFacade::new().save(&self.scene.persisted(), path)?;
        info!(path = %path.display(), "文档已保存");
        Ok(())
    }

    pub async fn pan(&mut self, delta: Vector2) -> Result<bool, FrontendError> {
        let changed = self.scene.pan(delta)?;
        self.persist_if(changed).await
    }

    pub async fn wheel(&mut self, input: WheelInput) -> Result<bool, FrontendError> {
        let changed = self.scene.wheel(input)?;
        self.persist_if(changed).await
    }

    pub async fn zoom(&mut self, direction: f64, precise: bool) -> Result<bool, FrontendError> {
        let changed = self.scene.zoom(direction, precise)?;
        self.persist_if(changed).await
    }

    pub async fn rotate(&mut self, direction: f64, precise: bool) -> Result<bool, FrontendError> {
        let changed = self.scene.rotate(direction, precise)?;
        self.persist_if(changed).await
    }

    pub async fn set_ruler(&mut self, value: f64, unit: RulerUnit) -> Result<bool, FrontendError> {
        let changed = self.scene.set_ruler(ScaleRuler::new(value, unit))?;
        self.persist_if(changed).await
    }

    pub async fn toggle_orientation(&mut self) -> Result<bool, FrontendError> {
        let changed = self.scene.toggle_orientation();
        self.persist_if(changed).await
    }

    pub fn view_state(&self) -> ViewTransformState {
        self.scene.view_state()
    }

    pub fn press(&mut self) {
        self.scene.press();
    }

    /// 按下后的拖动平移视图。
    pub async fn drag(&mut self, delta: Vector2) -> Result<bool, FrontendError> {
        let changed = self.scene.drag(delta)?;
        self.persist_if(changed).await
    }

    /// 松开指针；目标由渲染层给出。
    pub fn release(&mut self, target: Option<&NodePath>) -> Result<(), FrontendError> {
        if let Some(result) = self.scene.release(target)? {
            self.notify(EditorNotification::SelectionChanged(result));
        }
        Ok(())
    }

    /// 松开指针；目标由命中测试得出。
    pub fn release_at(&mut self, screen: Point2) -> Result<(), FrontendError> {
        if let Some(result) = self.scene.release_at(screen)? {
            self.notify(EditorNotification::SelectionChanged(result));
        }
        Ok(())
    }

    pub fn hover(&mut self, screen: Point2, target: Option<&NodePath>) -> Option<String> {
        self.scene
            .hover(screen, target)
            .map(|hover| hover.label.clone())
    }

    pub fn hover_at(&mut self, screen: Point2) -> Option<String> {
        self.scene.hover_at(screen).map(|hover| hover.label.clone())
    }

    pub fn leave(&mut self) {
        self.scene.leave();
    }

    pub fn select(&mut self, target: &NodePath) -> Result<(), FrontendError> {
        if let Some(result) = self.scene.select(target)? {
            self.notify(EditorNotification::SelectionChanged(result));
        }
        Ok(())
    }

    pub fn clear_selection(&mut self) -> Result<(), FrontendError> {
        if let Some(result) = self.scene.clear_selection()? {
            self.notify(EditorNotification::SelectionChanged(result));
        }
        Ok(())
    }

    /// 提交一个绘制点（屏幕坐标）。
    pub async fn draw(&mut self, screen: Point2, start: bool) -> Result<(), FrontendError> {
        self.scene.draw(screen, start)?;
        self.persist().await?;
        Ok(())
    }

    /// 结束当前笔画并发出绘制完成通知。
    pub fn finish_draw(&mut self) -> Option<DrawResult> {
        let result = self.scene.finish_draw()?;
        self.notify(EditorNotification::DrawFinished(result.clone()));
        Some(result)
    }

    pub fn set_path_id(&mut self, id: impl Into<String>) {
        self.scene.set_path_id(id);
    }

    pub fn set_path_class(&mut self, class: impl Into<String>) {
        self.scene.set_path_class(class);
    }

    /// 通过命令总线执行命令，成功后写回文档。
    pub async fn command(&mut self, request: &CommandRequest) -> Result<CommandResponse, FrontendError> {
        let response = {
            let mut context = CommandContext {
                scene: &mut self.scene,
            };
            self.commands.dispatch(request, &mut context)
        };
        if let Some(selection) = &response.selection {
            self.notify(EditorNotification::SelectionChanged(selection.clone()));
        }
        if response.success {
            self.persist().await?;
        } else {
            warn!(command = %request.name, message = ?response.message, "命令执行失败");
        }
        Ok(response)
    }

    async fn persist_if(&mut self, changed: bool) -> Result<bool, FrontendError> {
        if changed {
            self.persist().await?;
        }
        Ok(changed)
    }

    /// 重新序列化并写入文件记录；只有内容真正变化时才通知。
    async fn persist(&mut self) -> Result<WriteOutcome, FrontendError> {
        if self.record.is_none() {
            if self.scene.content().is_empty() {
                return Ok(WriteOutcome::Unchanged);
            }
            let name = self.resolve_name();
            self.record = Some(FileRecord::with_hash(
                name,
                Arc::<[u8]>::from(Vec::new()),
                String::new(),
            ));
        }
        let Some(record) = self.record.as_ref() else {
            return Err(FrontendError::NoDocument);
        };

        let content = self.scene.to_markup();
        let outcome = record.write(Arc::<[u8]>::from(content.as_bytes())).await?;
        let name = record.name().to_string();
        match outcome {
            WriteOutcome::Changed => {
                if self.reader.is_open() {
                    self.reader.write(&content)?;
                } else {
                    self.reader.new_file(name.clone(), Some(&content))?;
                }
                self.distribute();
                debug!(name = %name, bytes = content.len(), "文档内容已变化");
                self.notify(EditorNotification::DocumentChanged(FileChange {
                    name,
                    content,
                    options: FileChangeOptions {
                        mime_type: SVG_MIME_TYPE.to_string(),
                    },
                }));
            }
            WriteOutcome::Unchanged => debug!(name = %name, "内容未变化"),
            WriteOutcome::Superseded => debug!(name = %name, "写入已被更新的写入取代"),
        }
        Ok(outcome)
    }

    fn resolve_name(&self) -> String {
        let draw = self.scene.draw_session();
        let suggestion = format!("{}.{}.svg", draw.path_id(), draw.path_class());
        match self.resolver.resolve(&suggestion) {
            Some(name) if !name.trim().is_empty() => name,
            _ => {
                debug!(fallback = %self.default_file_name, "未提供文件名，使用缺省名称");
                self.default_file_name.clone()
            }
        }
    }

    fn snapshot(&self) -> Option<FileSnapshot> {
        let record = self.record.as_ref()?;
        Some(FileSnapshot {
            name: record.name().to_string(),
            content: record.content(),
            hash: record.last_known_hash(),
            changed: record.changed(),
            display: self.reader.display_handle(),
        })
    }

    fn distribute(&mut self) {
        let snapshot = self.snapshot();
        for collaborator in &mut self.collaborators {
            if collaborator.supports_file_access() {
                collaborator.set_file(snapshot.clone());
            }
        }
    }

    fn notify(&self, notification: EditorNotification) {
        if self.notifier.send(notification).is_err() {
            debug!("通知接收端已关闭");
        }
    }
}
