use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

const CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("the file is not accessible anymore")]
    Access,
    #[error("close the currently opened file first")]
    AlreadyOpen,
    #[error("svg file read aborted after {loaded} of {total} bytes")]
    Aborted { loaded: u64, total: u64 },
    #[error("svg file read failed on reading {loaded} of {total} bytes: {source}")]
    ReadFailure {
        loaded: u64,
        total: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("svg file is not valid UTF-8 (read {loaded} bytes)")]
    InvalidUtf8 { loaded: u64 },
}

/// 供调用方取消进行中的读取。
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 为原始字节签发的展示句柄（类似 object URL）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisplayHandle(u64);

impl DisplayHandle {
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
struct DisplayRegistry {
    next: u64,
    live: HashMap<u64, Arc<[u8]>>,
}

/// 展示句柄登记表，可在多个读取器间共享。
#[derive(Debug, Clone, Default)]
pub struct DisplayHandles {
    inner: Arc<Mutex<DisplayRegistry>>,
}

impl DisplayHandles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self, bytes: Arc<[u8]>) -> DisplayHandle {
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        registry.next += 1;
        let id = registry.next;
        registry.live.insert(id, bytes);
        DisplayHandle(id)
    }

    /// 撤销句柄，返回句柄此前是否有效。
    pub fn revoke(&self, handle: DisplayHandle) -> bool {
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        registry.live.remove(&handle.0).is_some()
    }

    pub fn resolve(&self, handle: DisplayHandle) -> Option<Arc<[u8]>> {
        let registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        registry.live.get(&handle.0).cloned()
    }

    pub fn live_count(&self) -> usize {
        let registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        registry.live.len()
    }
}

#[derive(Debug, Clone)]
struct AccessibleFile {
    name: String,
    bytes: Arc<[u8]>,
}

/// 以块为单位读取 SVG 文本，支持进度与中止。
/// 读取失败或被中止时保持读取前的状态。
#[derive(Debug)]
pub struct SvgFileReader {
    accessor: Option<AccessibleFile>,
    content: Option<String>,
    display: Option<DisplayHandle>,
    handles: DisplayHandles,
    progress: Option<u8>,
    abort: AbortHandle,
}

impl SvgFileReader {
    pub fn new(handles: DisplayHandles) -> Self {
        Self {
            accessor: None,
            content: None,
            display: None,
            handles,
            progress: None,
            abort: AbortHandle::default(),
        }
    }

    /// 当前读取使用的中止句柄。中止生效后会换发新的句柄。
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn name(&self) -> Result<&str, ReadError> {
        self.accessor
            .as_ref()
            .map(|file| file.name.as_str())
            .ok_or(ReadError::Access)
    }

    pub fn bytes(&self) -> Result<Arc<[u8]>, ReadError> {
        self.accessor
            .as_ref()
            .map(|file| Arc::clone(&file.bytes))
            .ok_or(ReadError::Access)
    }

    #[inline]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    #[inline]
    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    #[inline]
    pub fn display_handle(&self) -> Option<DisplayHandle> {
        self.display
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.accessor.is_some()
    }

    pub async fn read_path(&mut self, path: &Path) -> Result<String, ReadError> {
        let (name, file, total) = open_file(path).await?;
        self.read(name, file, total).await
    }

    /// 读取并替换当前文件。
    pub async fn read<R>(
        &mut self,
        name: impl Into<String>,
        source: R,
        total: Option<u64>,
    ) -> Result<String, ReadError>
    where
        R: AsyncRead + Unpin,
    {
        let name = name.into();
        let text = self.fetch(&name, source, total).await?;
        self.accept(name, text.clone());
        Ok(text)
    }

    /// 只读取文本，不改变当前文件。调用方校验内容后再调用 [`Self::accept`]。
    pub async fn fetch<R>(
        &mut self,
        name: &str,
        mut source: R,
        total: Option<u64>,
    ) -> Result<String, ReadError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buffer = Vec::with_capacity(total.unwrap_or(0).min(1 << 20) as usize);
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut loaded: u64 = 0;
        self.progress = Some(0);

        loop {
            if self.abort.is_aborted() {
                return Err(self.aborted(loaded, total.unwrap_or(loaded)));
            }
            let read = match source.read(&mut chunk).await {
                Ok(read) => read,
                Err(source) => {
                    self.progress = None;
                    warn!(name, loaded, "读取 SVG 文件失败");
                    return Err(ReadError::ReadFailure {
                        loaded,
                        total: total.unwrap_or(loaded),
                        source,
                    });
                }
            };
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
            loaded += read as u64;
            if let Some(total) = total.filter(|total| *total > 0) {
                self.progress = Some(((loaded.min(total) * 100) / total) as u8);
            }
        }

        let text = String::from_utf8(buffer).map_err(|_| {
            self.progress = None;
            ReadError::InvalidUtf8 { loaded }
        })?;
        self.progress = Some(100);
        debug!(name, bytes = loaded, "SVG 文件读取完成");
        Ok(text)
    }

    /// 以读取到的文本替换当前文件，并换发展示句柄。
    pub fn accept(&mut self, name: impl Into<String>, content: String) {
        self.replace(name.into(), content);
    }

    /// 以新内容替换当前文件，并换发展示句柄。
    pub fn write(&mut self, content: &str) -> Result<(), ReadError> {
        let name = self.name()?.to_string();
        self.replace(name, content.to_string());
        self.progress = None;
        Ok(())
    }

    /// 创建新文件。已有打开的文件时需要先关闭。
    pub fn new_file(&mut self, name: impl Into<String>, content: Option<&str>) -> Result<(), ReadError> {
        if self.accessor.is_some() {
            return Err(ReadError::AlreadyOpen);
        }
        self.replace(name.into(), content.unwrap_or_default().to_string());
        self.progress = None;
        Ok(())
    }

    /// 关闭文件并撤销已签发的展示句柄。
    pub fn close(&mut self) {
        self.revoke_display();
        self.accessor = None;
        self.content = None;
        self.progress = None;
    }

    fn replace(&mut self, name: String, content: String) {
        let bytes: Arc<[u8]> = Arc::from(content.as_bytes());
        self.revoke_display();
        self.display = Some(self.handles.issue(Arc::clone(&bytes)));
        self.accessor = Some(AccessibleFile { name, bytes });
        self.content = Some(content);
    }

    fn revoke_display(&mut self) {
        if let Some(handle) = self.display.take() {
            self.handles.revoke(handle);
        }
    }

    fn aborted(&mut self, loaded: u64, total: u64) -> ReadError {
        self.progress = None;
        self.abort = AbortHandle::default();
        debug!(loaded, total, "SVG 文件读取已中止");
        ReadError::Aborted { loaded, total }
    }
}

/// 打开本地文件，返回文件名、句柄与长度。
pub async fn open_file(path: &Path) -> Result<(String, tokio::fs::File, Option<u64>), ReadError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|source| ReadError::ReadFailure {
            loaded: 0,
            total: 0,
            source,
        })?;
    let total = file.metadata().await.map(|meta| meta.len()).ok();
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed.svg".to_string());
    Ok((name, file, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingReader {
        served: bool,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            if self.served {
                std::task::Poll::Ready(Err(std::io::Error::other("disk gone")))
            } else {
                self.served = true;
                buf.put_slice(b"<svg>");
                std::task::Poll::Ready(Ok(()))
            }
        }
    }

    #[tokio::test]
    async fn read_replaces_content_and_issues_display_handle() {
        let handles = DisplayHandles::new();
        let mut reader = SvgFileReader::new(handles.clone());
        let text = reader
            .read("a.svg", &b"<svg/>"[..], Some(6))
            .await
            .expect("read");
        assert_eq!(text, "<svg/>");
        assert_eq!(reader.name().expect("name"), "a.svg");
        assert_eq!(reader.progress(), Some(100));
        let first = reader.display_handle().expect("handle");
        assert_eq!(handles.resolve(first).as_deref(), Some(&b"<svg/>"[..]));

        reader.write("<svg><path/></svg>").expect("write");
        let second = reader.display_handle().expect("handle");
        assert_ne!(first, second);
        assert!(handles.resolve(first).is_none());
        assert_eq!(handles.live_count(), 1);

        reader.close();
        assert_eq!(handles.live_count(), 0);
        assert!(matches!(reader.name(), Err(ReadError::Access)));
        assert!(matches!(reader.write("x"), Err(ReadError::Access)));
    }

    #[tokio::test]
    async fn aborted_read_keeps_previous_file() {
        let mut reader = SvgFileReader::new(DisplayHandles::new());
        reader.read("a.svg", &b"<svg/>"[..], None).await.expect("read");

        let handle = reader.abort_handle();
        handle.abort();
        let err = reader
            .read("b.svg", &b"<svg><g/></svg>"[..], Some(15))
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::Aborted { loaded: 0, total: 15 }));
        assert_eq!(reader.name().expect("name"), "a.svg");
        assert_eq!(reader.content(), Some("<svg/>"));
        assert!(!reader.abort_handle().is_aborted());
    }

    #[tokio::test]
    async fn failed_read_reports_bytes_transferred() {
        let mut reader = SvgFileReader::new(DisplayHandles::new());
        let err = reader
            .read("c.svg", FailingReader { served: false }, Some(100))
            .await
            .unwrap_err();
        assert!(matches!(err, ReadError::ReadFailure { loaded: 5, total: 100, .. }));
        assert!(err.to_string().contains("5 of 100 bytes"));
        assert!(!reader.is_open());
    }

    #[tokio::test]
    async fn fetch_leaves_current_file_until_accepted() {
        let mut reader = SvgFileReader::new(DisplayHandles::new());
        reader.read("a.svg", &b"<svg/>"[..], None).await.expect("read");
        let text = reader
            .fetch("b.svg", &b"<svg><g/></svg>"[..], None)
            .await
            .expect("fetch");
        assert_eq!(reader.name().expect("name"), "a.svg");
        reader.accept("b.svg", text);
        assert_eq!(reader.content(), Some("<svg><g/></svg>"));
    }

    #[tokio::test]
    async fn new_file_requires_close() {
        let mut reader = SvgFileReader::new(DisplayHandles::new());
        reader.new_file("new.svg", None).expect("new file");
        assert_eq!(reader.content(), Some(""));
        assert!(matches!(
            reader.new_file("other.svg", Some("<svg/>")),
            Err(ReadError::AlreadyOpen)
        ));
        reader.close();
        reader.new_file("other.svg", Some("<svg/>")).expect("new file after close");
    }

    #[tokio::test]
    async fn read_path_uses_file_name() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("plan.svg");
        std::fs::write(&path, "<svg/>").expect("write fixture");
        let mut reader = SvgFileReader::new(DisplayHandles::new());
        let text = reader.read_path(&path).await.expect("read path");
        assert_eq!(text, "<svg/>");
        assert_eq!(reader.name().expect("name"), "plan.svg");
    }
}
