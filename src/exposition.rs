//! Text exposition of all collectors' latest values.

use crate::metric::MetricHandle;

/// Render every published sample as one text line, in registration order.
///
/// Collectors with no published value contribute nothing; zero published
/// samples render as an empty string. Pure read-only over the handle list,
/// safe to call concurrently with any number of in-flight collection loops.
pub fn render(handles: &[MetricHandle]) -> String {
    let mut lines = Vec::new();
    for handle in handles {
        handle.render_into(&mut lines);
    }
    lines.join("\n")
}
