use foundation::time::now_ms;

/// Severity of a user-facing notice; maps onto the host's toast styles.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A user-facing notification produced at an operation boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at_ms: u64,
}

/// Ordered queue of notices waiting to be shown by the host.
///
/// Every notice is mirrored to `tracing` so headless hosts still see outcomes.
#[derive(Debug, Default)]
pub struct NoticeBus {
    notices: Vec<Notice>,
}

impl NoticeBus {
    pub fn new() -> Self {
        Self {
            notices: Vec::new(),
        }
    }

    pub fn emit(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            NoticeLevel::Error => tracing::error!(target: "notice", "{message}"),
            NoticeLevel::Warning => tracing::warn!(target: "notice", "{message}"),
            NoticeLevel::Info | NoticeLevel::Success => {
                tracing::info!(target: "notice", "{message}")
            }
        }
        self.notices.push(Notice {
            level,
            message,
            at_ms: now_ms(),
        });
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.emit(NoticeLevel::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.emit(NoticeLevel::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.emit(NoticeLevel::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.emit(NoticeLevel::Error, message);
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}
