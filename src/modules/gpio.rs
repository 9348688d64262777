use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A digital output line.
pub trait OutputPin: Send {
    fn set_level(&mut self, high: bool) -> io::Result<()>;
}

/// GPIO line driven through the Linux sysfs interface (`/sys/class/gpio`).
#[derive(Debug)]
pub struct SysfsPin {
    value_path: PathBuf,
}

impl SysfsPin {
    /// Export `pin` if needed and configure it as an output.
    pub fn open(gpio_root: &Path, pin: u32) -> io::Result<Self> {
        let line = gpio_root.join(format!("gpio{pin}"));
        if !line.exists() {
            fs::write(gpio_root.join("export"), pin.to_string())?;
        }
        fs::write(line.join("direction"), "out")?;
        Ok(Self {
            value_path: line.join("value"),
        })
    }
}

impl OutputPin for SysfsPin {
    fn set_level(&mut self, high: bool) -> io::Result<()> {
        fs::write(&self.value_path, if high { "1" } else { "0" })
    }
}

/// In-memory output line. Clones share the same level.
#[derive(Debug, Clone, Default)]
pub struct MemoryPin {
    level: Arc<AtomicBool>,
    writes: Arc<AtomicUsize>,
}

impl MemoryPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self) -> bool {
        self.level.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl OutputPin for MemoryPin {
    fn set_level(&mut self, high: bool) -> io::Result<()> {
        self.level.store(high, Ordering::SeqCst);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
