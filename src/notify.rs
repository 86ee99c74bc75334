use notify_rust::Notification;

use crate::history_view::Notice;

/// Mirror a history notice as a desktop notification. Runs off the UI thread;
/// delivery failures are only logged.
pub fn desktop(notice: &Notice) {
    let (summary, body) = match notice {
        Notice::Success(message) => ("Turbo".to_string(), message.clone()),
        Notice::Failure { summary, detail } => (summary.clone(), detail.clone()),
    };

    std::thread::spawn(move || {
        if let Err(e) = Notification::new()
            .appname("Turbo")
            .summary(&summary)
            .body(&body)
            .show()
        {
            tracing::debug!(error = %e, "desktop notification failed");
        }
    });
}
