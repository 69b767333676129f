//! 文件访问能力与命名。

use std::sync::{Arc, Mutex, PoisonError};

use svgpad_io::DisplayHandle;
use tracing::debug;

/// 交给协作者的当前文件快照。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub name: String,
    pub content: Arc<[u8]>,
    pub hash: String,
    pub changed: bool,
    pub display: Option<DisplayHandle>,
}

/// 需要读写当前文件的协作者。只有 `supports_file_access` 返回 true 的协作者才会收到文件。
pub trait FileAccess: Send {
    fn supports_file_access(&self) -> bool;

    /// `None` 表示文件已关闭。
    fn set_file(&mut self, file: Option<FileSnapshot>);
}

/// 没有文件记录时为新文件取名，返回 `None` 表示放弃。
pub trait NameResolver: Send + Sync {
    fn resolve(&self, suggestion: &str) -> Option<String>;
}

/// 直接采用建议的文件名。
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptSuggestion;

impl NameResolver for AcceptSuggestion {
    fn resolve(&self, suggestion: &str) -> Option<String> {
        Some(suggestion.to_string())
    }
}

/// 固定返回给定名称；`None` 模拟用户取消。
#[derive(Debug, Clone, Default)]
pub struct FixedName(pub Option<String>);

impl NameResolver for FixedName {
    fn resolve(&self, _suggestion: &str) -> Option<String> {
        self.0.clone()
    }
}

/// 导出面板：保留最近一次收到的文件，供保存或下载使用。
#[derive(Debug, Clone, Default)]
pub struct ExportPanel {
    latest: Arc<Mutex<Option<FileSnapshot>>>,
}

impl ExportPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<FileSnapshot> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl FileAccess for ExportPanel {
    fn supports_file_access(&self) -> bool {
        true
    }

    fn set_file(&mut self, file: Option<FileSnapshot>) {
        debug!(
            name = file.as_ref().map(|file| file.name.as_str()),
            "导出面板收到文件"
        );
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = file;
    }
}
