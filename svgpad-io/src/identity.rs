//! 基于内容摘要的变更检测。
//!
//! 每次写入都会与上一次提交的摘要比较；并发写入按开始顺序排队，
//! 摘要计算完成得晚但开始得早的写入不会覆盖较新的结果。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("content digest task failed: {0}")]
    Digest(#[from] tokio::task::JoinError),
}

/// SHA-256 摘要的小写十六进制形式。
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect::<String>()
}

async fn digest_off_thread(content: Arc<[u8]>) -> Result<String, IdentityError> {
    let hash = tokio::task::spawn_blocking(move || content_hash(&content)).await?;
    Ok(hash)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Changed,
    Unchanged,
    /// 开始得更晚的写入已经提交，本次结果被丢弃。
    Superseded,
}

impl WriteOutcome {
    #[inline]
    pub fn changed(self) -> bool {
        matches!(self, WriteOutcome::Changed)
    }
}

#[derive(Debug)]
struct Committed {
    version: u64,
    hash: String,
    changed: bool,
    content: Arc<[u8]>,
}

/// 一次写入的序号与内容，摘要在 [`WriteTicket::digest`] 中计算。
#[derive(Debug)]
pub struct WriteTicket {
    version: u64,
    content: Arc<[u8]>,
}

impl WriteTicket {
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub async fn digest(self) -> Result<WriteDigest, IdentityError> {
        let hash = digest_off_thread(Arc::clone(&self.content)).await?;
        Ok(WriteDigest {
            version: self.version,
            content: self.content,
            hash,
        })
    }
}

#[derive(Debug)]
pub struct WriteDigest {
    version: u64,
    content: Arc<[u8]>,
    hash: String,
}

impl WriteDigest {
    #[inline]
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// 文件记录：文件名、最近一次提交的内容与摘要，以及 `changed` 标记。
#[derive(Debug)]
pub struct FileRecord {
    name: String,
    next_version: AtomicU64,
    committed: Mutex<Committed>,
}

impl FileRecord {
    /// 打开已有内容：计算初始摘要，`changed` 为 false。
    pub async fn open(
        name: impl Into<String>,
        content: impl Into<Arc<[u8]>>,
    ) -> Result<Self, IdentityError> {
        let content = content.into();
        let hash = digest_off_thread(Arc::clone(&content)).await?;
        Ok(Self::with_hash(name, content, hash))
    }

    pub fn with_hash(name: impl Into<String>, content: impl Into<Arc<[u8]>>, hash: String) -> Self {
        Self {
            name: name.into(),
            next_version: AtomicU64::new(1),
            committed: Mutex::new(Committed {
                version: 0,
                hash,
                changed: false,
                content: content.into(),
            }),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn last_known_hash(&self) -> String {
        self.lock().hash.clone()
    }

    pub fn changed(&self) -> bool {
        self.lock().changed
    }

    pub fn content(&self) -> Arc<[u8]> {
        Arc::clone(&self.lock().content)
    }

    /// 领取写入序号。序号单调递增，决定提交时的先后。
    pub fn begin_write(&self, content: impl Into<Arc<[u8]>>) -> WriteTicket {
        WriteTicket {
            version: self.next_version.fetch_add(1, Ordering::SeqCst),
            content: content.into(),
        }
    }

    /// 提交摘要：与上一次提交的摘要比较并替换之。
    pub fn commit(&self, digest: WriteDigest) -> WriteOutcome {
        let mut committed = self.lock();
        if digest.version < committed.version {
            debug!(
                name = %self.name,
                version = digest.version,
                latest = committed.version,
                "丢弃过期的写入"
            );
            return WriteOutcome::Superseded;
        }
        let changed = committed.hash != digest.hash;
        committed.version = digest.version;
        committed.hash = digest.hash;
        committed.changed = changed;
        committed.content = digest.content;
        if changed {
            WriteOutcome::Changed
        } else {
            WriteOutcome::Unchanged
        }
    }

    pub async fn write(&self, content: impl Into<Arc<[u8]>>) -> Result<WriteOutcome, IdentityError> {
        let ticket = self.begin_write(content);
        let digest = ticket.digest().await?;
        Ok(self.commit(digest))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Committed> {
        self.committed.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(text: &str) -> Arc<[u8]> {
        Arc::<[u8]>::from(text.as_bytes())
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(content_hash(b"abc").len(), 64);
        assert_ne!(content_hash(b"ab"), content_hash(b"ba"));
    }

    #[tokio::test]
    async fn open_then_write_reports_delta_since_last_write() {
        let record = FileRecord::open("a.svg", bytes("<svg/>")).await.expect("open");
        assert_eq!(record.last_known_hash(), content_hash(b"<svg/>"));
        assert!(!record.changed());

        let outcome = record.write(bytes("<svg><path/></svg>")).await.expect("write");
        assert_eq!(outcome, WriteOutcome::Changed);
        assert!(record.changed());
        assert_eq!(record.last_known_hash(), content_hash(b"<svg><path/></svg>"));

        let outcome = record.write(bytes("<svg><path/></svg>")).await.expect("write");
        assert_eq!(outcome, WriteOutcome::Unchanged);
        assert!(!record.changed());

        // 回到原始内容仍相对上一次写入报告变化
        let outcome = record.write(bytes("<svg/>")).await.expect("write");
        assert!(outcome.changed());
        assert_eq!(&*record.content(), b"<svg/>");
    }

    #[tokio::test]
    async fn stale_digest_is_superseded() {
        let record = FileRecord::open("a.svg", bytes("<svg/>")).await.expect("open");
        let older = record.begin_write(bytes("<svg><g/></svg>"));
        let newer = record.begin_write(bytes("<svg><rect/></svg>"));
        assert!(older.version() < newer.version());

        let newer = newer.digest().await.expect("digest");
        assert_eq!(record.commit(newer), WriteOutcome::Changed);

        let older = older.digest().await.expect("digest");
        assert_eq!(record.commit(older), WriteOutcome::Superseded);
        assert_eq!(record.last_known_hash(), content_hash(b"<svg><rect/></svg>"));
        assert!(record.changed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_writes_settle_on_latest_started() {
        let record = Arc::new(FileRecord::open("a.svg", bytes("")).await.expect("open"));
        let mut tasks = Vec::new();
        for index in 0..8 {
            let record = Arc::clone(&record);
            tasks.push(tokio::spawn(async move {
                let content = format!("<svg id=\"{index}\"/>");
                record.write(Arc::<[u8]>::from(content.as_bytes())).await
            }));
        }
        for task in tasks {
            task.await.expect("join").expect("write");
        }
        let latest = record.lock().version;
        assert_eq!(latest, 8);
        assert_eq!(record.last_known_hash(), content_hash(&record.content()));
    }
}
