use std::fs;
use std::path::{Path, PathBuf};

use super::registry::Registry;
use crate::error::AutostartError;
use crate::util::{self, Owner};

/// First line of the autostart block; identifies it in the startup file.
pub const MARKER: &str = "# Auto-start application on boot";

/// Lines after the marker that can belong to a block (`if`, command, `fi`).
const BLOCK_BODY_MAX: usize = 3;

/// The block that switches to `app_id` on a console login without display.
pub fn autostart_block(install_path: &Path, config: Option<&Path>, app_id: &str) -> String {
    format!(
        "{MARKER}\n\
         if [[ -z $DISPLAY ]] && [[ $(tty) = /dev/tty1 ]]; then\n\
         \x20 sudo {}\n\
         fi\n",
        util::switch_command(install_path, config, app_id)
    )
}

/// Line ranges `(start, end_exclusive)` of every marker block in `lines`.
///
/// A block is the marker line plus everything up to the next `fi` within
/// the following three lines. A marker without such a `fi` is treated as a
/// lone stale line so nothing the user wrote gets swallowed.
fn marker_blocks(lines: &[&str]) -> Vec<(usize, usize)> {
    let mut blocks = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if lines[i].trim() != MARKER {
            i += 1;
            continue;
        }
        let end = lines
            .iter()
            .enumerate()
            .skip(i + 1)
            .take(BLOCK_BODY_MAX)
            .find(|(_, line)| line.trim() == "fi")
            .map(|(idx, _)| idx + 1)
            .unwrap_or(i + 1);
        blocks.push((i, end));
        i = end;
    }
    blocks
}

fn finish(lines: Vec<&str>) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Put `new_block` in place of the first marker block of `original`, drop
/// any further marker blocks, or append it when there is none.
pub fn rewrite_marker_block(original: &str, new_block: &str) -> String {
    let lines: Vec<&str> = original.lines().collect();
    let blocks = marker_blocks(&lines);
    let block_lines: Vec<&str> = new_block.lines().collect();

    let Some(&(first_start, _)) = blocks.first() else {
        let mut out = lines;
        if out.last().is_some_and(|line| !line.trim().is_empty()) {
            out.push("");
        }
        out.extend(block_lines);
        return finish(out);
    };

    let mut out = Vec::with_capacity(lines.len() + block_lines.len());
    let mut blocks = blocks.iter().peekable();
    let mut i = 0;
    while i < lines.len() {
        if let Some(&&(start, end)) = blocks.peek() {
            if i == start {
                if start == first_start {
                    out.extend(block_lines.iter().copied());
                }
                blocks.next();
                i = end;
                continue;
            }
        }
        out.push(lines[i]);
        i += 1;
    }
    finish(out)
}

/// `original` with every marker block removed. A block that ends the file
/// also takes the single blank separator line written in front of it.
pub fn strip_marker_blocks(original: &str) -> String {
    let lines: Vec<&str> = original.lines().collect();
    let mut removed: Vec<(usize, usize)> = marker_blocks(&lines);
    if let Some(last) = removed.last_mut() {
        if last.1 == lines.len() && last.0 > 0 && lines[last.0 - 1].trim().is_empty() {
            last.0 -= 1;
        }
    }
    let kept: Vec<&str> = lines
        .iter()
        .enumerate()
        .filter(|(idx, _)| !removed.iter().any(|(s, e)| (*s..*e).contains(idx)))
        .map(|(_, line)| *line)
        .collect();
    finish(kept)
}

/// Application id referenced by the first marker block, if any.
pub fn parse_autostart(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let &(start, end) = marker_blocks(&lines).first()?;
    lines[start + 1..end]
        .iter()
        .map(|line| line.trim())
        .find(|line| line.contains(" switch "))
        .and_then(|line| line.split_whitespace().last())
        .map(str::to_string)
}

/// Persists the boot application in the interactive user's startup file.
pub struct AutostartConfigurator<'a> {
    registry: &'a Registry,
    path: PathBuf,
    install_path: PathBuf,
    /// Configuration file passed to the boot-time switch.
    config: Option<PathBuf>,
    owner: Option<Owner>,
}

impl<'a> AutostartConfigurator<'a> {
    pub fn new(
        registry: &'a Registry,
        path: PathBuf,
        install_path: PathBuf,
        config: Option<PathBuf>,
        owner: Option<Owner>,
    ) -> Self {
        Self {
            registry,
            path,
            install_path,
            config,
            owner,
        }
    }

    pub fn set_autostart(&self, app_id: &str) -> bool {
        match self.try_set(app_id) {
            Ok(()) => {
                log::info!(
                    "{} will now start on boot ({})",
                    app_id,
                    self.path.display()
                );
                true
            }
            Err(AutostartError::UnknownApp(id)) => {
                log::error!("Invalid boot app: {}", id);
                log::info!(
                    "Valid options are: {}",
                    self.registry.enabled_gui_ids().join(", ")
                );
                false
            }
            Err(e) => {
                log::error!("Failed to configure autostart: {}", e);
                false
            }
        }
    }

    pub fn clear_autostart(&self) -> bool {
        let result = self.read().and_then(|content| match content {
            Some(text) if text.contains(MARKER) => {
                self.write(&strip_marker_blocks(&text))
            }
            _ => Ok(()),
        });
        match result {
            Ok(()) => {
                log::info!("Removed autostart from {}", self.path.display());
                true
            }
            Err(e) => {
                log::error!("Failed to remove autostart: {}", e);
                false
            }
        }
    }

    pub fn current_autostart(&self) -> Option<String> {
        match self.read() {
            Ok(content) => content.as_deref().and_then(parse_autostart),
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        }
    }

    fn try_set(&self, app_id: &str) -> Result<(), AutostartError> {
        if self.registry.enabled_gui_application(app_id).is_none() {
            return Err(AutostartError::UnknownApp(app_id.to_string()));
        }
        let original = self.read()?.unwrap_or_default();
        let block = autostart_block(&self.install_path, self.config.as_deref(), app_id);
        self.write(&rewrite_marker_block(&original, &block))
    }

    fn read(&self) -> Result<Option<String>, AutostartError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(AutostartError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn write(&self, content: &str) -> Result<(), AutostartError> {
        util::write_atomic(&self.path, content, None, self.owner)?;
        Ok(())
    }
}
