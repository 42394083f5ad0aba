//! User-facing notifications.
//!
//! The core never renders anything itself; it reports through a
//! [`Notifier`] the embedder implements. Transient notices map to a toast
//! or message line; `fatal` is reserved for the initialization-loop halt,
//! which requires an explicit user action (acknowledge/reload) before
//! playback resumes.

/// Severity of a transient notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Sink for user-visible playback notifications.
pub trait Notifier: Send + Sync {
    /// Transient, non-blocking notice.
    fn notice(&self, level: NoticeLevel, message: &str);

    /// Blocking prompt requiring explicit user acknowledgment.
    fn fatal(&self, title: &str, message: &str);
}

/// Default notifier that routes everything to the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notice(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info | NoticeLevel::Success => tracing::info!("{message}"),
            NoticeLevel::Warning => tracing::warn!("{message}"),
            NoticeLevel::Error => tracing::error!("{message}"),
        }
    }

    fn fatal(&self, title: &str, message: &str) {
        tracing::error!("FATAL: {title}: {message}");
    }
}
