use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::Context;
use client_core::{Receipt, ReceiptSink};
use tracing::info;

pub struct StdoutReceiptSink;

impl ReceiptSink for StdoutReceiptSink {
    fn deliver(&self, receipt: &Receipt) -> anyhow::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout)?;
        write!(stdout, "{receipt}")?;
        stdout.flush()?;
        Ok(())
    }
}

/// Spools each receipt to its own text file for a printer daemon to pick up.
pub struct FileReceiptSink {
    dir: PathBuf,
}

impl FileReceiptSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, receipt: &Receipt) -> PathBuf {
        let code: String = receipt
            .code
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!(
            "receipt-{code}-{}.txt",
            receipt.printed_at.format("%Y%m%dT%H%M%S")
        ))
    }
}

impl ReceiptSink for FileReceiptSink {
    fn deliver(&self, receipt: &Receipt) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("failed to create receipt directory '{}'", self.dir.display())
        })?;
        let path = self.path_for(receipt);
        fs::write(&path, receipt.to_string())
            .with_context(|| format!("failed to write receipt '{}'", path.display()))?;
        info!(path = %path.display(), code = %receipt.code, "receipt spooled");
        println!("Receipt written to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/sink_tests.rs"]
mod tests;
