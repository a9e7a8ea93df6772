//! Download progress rendering.
//!
//! Terminals get one indicatif bar per active label; anything else gets
//! throttled plain lines.

use std::collections::HashMap;
use std::io::{self, IsTerminal};
use std::time::{Duration, Instant};

use indicatif::{HumanBytes, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

const MAX_LABEL: usize = 32;

/// Progress display that picks terminal or plain output.
pub struct ProgressBoard {
    inner: BoardRender,
}

enum BoardRender {
    Fancy(FancyBoard),
    Plain(PlainBoard),
}

impl ProgressBoard {
    /// Auto-detect terminal capability.
    pub fn new() -> Self {
        if io::stdout().is_terminal() {
            Self {
                inner: BoardRender::Fancy(FancyBoard::new()),
            }
        } else {
            Self {
                inner: BoardRender::Plain(PlainBoard::new()),
            }
        }
    }

    /// A download started (or restarted for a retry).
    pub fn start(&mut self, label: &str, retry_count: u32) {
        match &mut self.inner {
            BoardRender::Fancy(inner) => inner.start(label, retry_count),
            BoardRender::Plain(inner) => inner.start(label, retry_count),
        }
    }

    pub fn update(&mut self, label: &str, downloaded: u64, total: u64) {
        match &mut self.inner {
            BoardRender::Fancy(inner) => inner.update(label, downloaded, total),
            BoardRender::Plain(inner) => inner.update(label, downloaded, total),
        }
    }

    /// Remove the label's bar and print a final line for it.
    pub fn finish(&mut self, label: &str, line: &str) {
        match &mut self.inner {
            BoardRender::Fancy(inner) => inner.finish(label, line),
            BoardRender::Plain(_) => println!("{line}"),
        }
    }

    /// Clear everything still on screen.
    pub fn clear(&mut self) {
        if let BoardRender::Fancy(inner) = &mut self.inner {
            inner.clear();
        }
    }
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Fancy Terminal Progress (indicatif)
// ============================================================================

struct FancyBoard {
    multi: MultiProgress,
    bars: HashMap<String, ProgressBar>,
}

impl FancyBoard {
    fn new() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::stdout()),
            bars: HashMap::new(),
        }
    }

    fn start(&mut self, label: &str, retry_count: u32) {
        let bar = self
            .bars
            .entry(label.to_string())
            .or_insert_with(|| self.multi.add(ProgressBar::new(0)));
        bar.set_style(Self::bar_style());
        bar.set_position(0);
        if retry_count == 0 {
            bar.set_message(format_label(label));
        } else {
            bar.set_message(format!("{} (retry {retry_count})", format_label(label)));
        }
    }

    fn update(&mut self, label: &str, downloaded: u64, total: u64) {
        if let Some(bar) = self.bars.get(label) {
            if bar.length() != Some(total) {
                bar.set_length(total);
            }
            bar.set_position(downloaded.min(total));
        }
    }

    fn finish(&mut self, label: &str, line: &str) {
        if let Some(bar) = self.bars.remove(label) {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
        // println only fails when the draw target is gone
        if self.multi.println(line).is_err() {
            println!("{line}");
        }
    }

    fn clear(&mut self) {
        for (_, bar) in self.bars.drain() {
            bar.finish_and_clear();
        }
        let _ = self.multi.clear();
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{msg:32} {bar:28.cyan/blue} {bytes:>9} / {total_bytes:>9} ({percent:>3}%) {binary_bytes_per_sec}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

// ============================================================================
// Plain Progress (non-terminal)
// ============================================================================

struct PlainBoard {
    last_emit: HashMap<String, Instant>,
}

impl PlainBoard {
    const MIN_INTERVAL: Duration = Duration::from_millis(500);

    fn new() -> Self {
        Self {
            last_emit: HashMap::new(),
        }
    }

    fn start(&mut self, label: &str, retry_count: u32) {
        self.last_emit.insert(label.to_string(), Instant::now());
        if retry_count == 0 {
            println!("→ {label}");
        } else {
            println!("→ {label} (retry {retry_count})");
        }
    }

    fn update(&mut self, label: &str, downloaded: u64, total: u64) {
        let now = Instant::now();
        let due = self
            .last_emit
            .get(label)
            .is_none_or(|last| now.duration_since(*last) >= Self::MIN_INTERVAL);
        if !due || downloaded >= total {
            return;
        }
        self.last_emit.insert(label.to_string(), now);
        println!("  {label}: {}", format_transfer(downloaded, total));
    }
}

// ============================================================================
// Formatting
// ============================================================================

/// `"1.50 MiB / 3.00 MiB (50.0%)"`
pub fn format_transfer(downloaded: u64, total: u64) -> String {
    #[allow(clippy::cast_precision_loss)]
    let percent = if total > 0 {
        (downloaded as f64 / total as f64) * 100.0
    } else {
        100.0
    };
    format!(
        "{} / {} ({percent:.1}%)",
        HumanBytes(downloaded),
        HumanBytes(total)
    )
}

fn format_label(raw: &str) -> String {
    let char_count = raw.chars().count();
    if char_count <= MAX_LABEL {
        return raw.to_string();
    }
    let mut buf: String = raw.chars().take(MAX_LABEL - 1).collect();
    buf.push('…');
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_transfer() {
        assert_eq!(format_transfer(512, 1024), "512 B / 1.00 KiB (50.0%)");
        assert_eq!(format_transfer(0, 0), "0 B / 0 B (100.0%)");
    }

    #[test]
    fn test_long_labels_are_truncated() {
        let long = "x".repeat(40);
        let formatted = format_label(&long);
        assert_eq!(formatted.chars().count(), MAX_LABEL);
        assert!(formatted.ends_with('…'));
        assert_eq!(format_label("ui"), "ui");
    }
}
