/// Screen seam. Rendering lives outside this crate; the agent only hands over
/// the lines to show.
pub trait Display {
    fn show(&mut self, lines: &[String]);
}

/// Writes every screen to the log.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl Display for LogDisplay {
    fn show(&mut self, lines: &[String]) {
        tracing::info!(screen = %lines.join(" | "), "display");
    }
}

/// Keeps every screen shown, newest last.
#[derive(Debug, Default)]
pub struct BufferDisplay {
    screens: Vec<Vec<String>>,
}

impl BufferDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&[String]> {
        self.screens.last().map(Vec::as_slice)
    }

    pub fn screens(&self) -> &[Vec<String>] {
        &self.screens
    }

    /// True if any line of any screen contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.screens.iter().flatten().any(|line| line.contains(needle))
    }
}

impl Display for BufferDisplay {
    fn show(&mut self, lines: &[String]) {
        self.screens.push(lines.to_vec());
    }
}
