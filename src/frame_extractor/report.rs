use crate::core::error::VideoResult;
use log::info;
use std::path::Path;

/// 单个视频所有选帧决策的文本记录
#[derive(Debug, Clone, Default)]
pub struct SelectionReport {
    lines: Vec<String>,
}

impl SelectionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn section(&mut self, title: &str) {
        if !self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.lines.push(format!("=== {} ===", title));
    }

    pub fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> VideoResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_string())?;
        info!("📝 Selection report saved: {:?}", path);
        Ok(())
    }
}

impl std::fmt::Display for SelectionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}
