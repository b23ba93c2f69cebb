use color_eyre::eyre::Result;
use notify_debouncer_mini::{DebounceEventResult, DebouncedEventKind};
use winit::event_loop::EventLoopProxy;

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    time::Duration,
};

/// Sends the path of every changed `.wgsl` file to the event loop.
pub struct Watcher {
    watcher: notify_debouncer_mini::Debouncer<notify::RecommendedWatcher>,
}

impl Watcher {
    pub fn new(proxy: EventLoopProxy<PathBuf>) -> Result<Self> {
        let watcher = notify_debouncer_mini::new_debouncer(
            Duration::from_millis(100),
            watch_callback(proxy),
        )?;

        Ok(Self { watcher })
    }

    pub fn unwatch_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.watcher.watcher().unwatch(path.as_ref())?;
        Ok(())
    }

    pub fn watch_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        self.watcher
            .watcher()
            .watch(path.as_ref(), notify::RecursiveMode::NonRecursive)?;
        Ok(())
    }
}

fn is_shader(path: &Path) -> bool {
    path.extension() == Some(OsStr::new("wgsl"))
}

fn watch_callback(proxy: EventLoopProxy<PathBuf>) -> impl FnMut(DebounceEventResult) {
    move |event| match event {
        Ok(events) => {
            for path in events
                .into_iter()
                .filter(|e| e.kind == DebouncedEventKind::Any)
                .map(|event| event.path)
            {
                if !is_shader(&path) {
                    log::debug!("Ignoring change to {}", path.display());
                    continue;
                }
                if proxy.send_event(path).is_err() {
                    log::warn!("Event loop is gone, dropping shader change");
                    return;
                }
            }
        }
        Err(err) => log::error!("File watcher error: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_wgsl_files_are_shaders() {
        assert!(is_shader(Path::new("shaders/postfx/lut.wgsl")));
        assert!(!is_shader(Path::new("shaders/postfx/lut.glsl")));
        assert!(!is_shader(Path::new("postfx.toml")));
    }
}
