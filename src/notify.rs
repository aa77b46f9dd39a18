use tracing::info;

/// User-facing alert surface. The host renders these as desktop
/// notifications; the reference impl logs them.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, message: &str);
}

pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, title: &str, message: &str) {
        info!(target: "notification", "{}: {}", title, message);
    }
}
