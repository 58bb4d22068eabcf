//! Plain-text audit report rendering.

use crate::secret::SecretReport;
use std::fmt::Write;

/// Render a secret's metadata and audit trail as a plain-text report.
///
/// The output is what the serving layer hands to humans, one metadata block
/// followed by one line per recorded access, newest ordering left to the
/// caller.
pub fn render_secret_report(report: &SecretReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Secret Metadata");
    let _ = writeln!(out, " - Name: {}", report.secret.name);
    let _ = writeln!(out, " - ARN: {}", report.secret.arn);
    let _ = writeln!(out, " - Version: {}", report.secret.version);
    let _ = writeln!(out, " - Created At: {}", report.secret.created_at);
    let _ = writeln!(out, " - Last Accessed: {}", report.secret.last_accessed);
    let _ = writeln!(out, "# Access Log");
    for event in &report.access_log {
        let _ = writeln!(
            out,
            " - [{}] {} by {} via {}",
            event.event_time, event.event_name, event.user, event.event_source
        );
    }
    out
}
