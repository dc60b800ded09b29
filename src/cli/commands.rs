//! CLI command implementations
//!
//! Thin clients over the transaction API: each command initializes a
//! manager for the configured root, drives one transaction, and reports a
//! single JSON result line.

use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::layout::{Layout, DEFAULT_MAX_READ_SLOTS};
use crate::txn::TxManager;
use crate::volume::{BtrfsVolumes, DirVolumes, VolumeOps};

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Which adapter backend serves the managed root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Real btrfs subvolumes via ioctls
    #[default]
    Btrfs,
    /// Plain-directory emulation (testing, non-btrfs filesystems)
    Dir,
}

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Managed root directory (required)
    pub root_dir: String,

    /// Bound on concurrent read transactions (optional, default 2)
    #[serde(default = "default_max_read_slots")]
    pub max_read_slots: usize,

    /// Adapter backend (optional, default "btrfs")
    #[serde(default)]
    pub backend: Backend,
}

fn default_max_read_slots() -> usize {
    DEFAULT_MAX_READ_SLOTS
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config(format!("failed to read config: {}", e)))?;

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| CliError::config(format!("invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.root_dir.is_empty() {
            return Err(CliError::config("root_dir must not be empty"));
        }
        if self.max_read_slots == 0 {
            return Err(CliError::config("max_read_slots must be >= 1"));
        }
        Ok(())
    }

    /// Get the managed root as a Path
    pub fn root_path(&self) -> &Path {
        Path::new(&self.root_dir)
    }
}

/// Run the appropriate command based on CLI args.
///
/// This is the only function that main.rs should call.
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => {
            let config = Config::load(&config)?;
            match config.backend {
                Backend::Btrfs => init_root(&config, BtrfsVolumes::new()),
                Backend::Dir => init_root(&config, DirVolumes::new()),
            }
        }
        Command::Write {
            config,
            file,
            content,
        } => {
            let config = Config::load(&config)?;
            match config.backend {
                Backend::Btrfs => write_file(&config, BtrfsVolumes::new(), &file, content),
                Backend::Dir => write_file(&config, DirVolumes::new(), &file, content),
            }
        }
        Command::Read { config, file } => {
            let config = Config::load(&config)?;
            match config.backend {
                Backend::Btrfs => read_file(&config, BtrfsVolumes::new(), &file),
                Backend::Dir => read_file(&config, DirVolumes::new(), &file),
            }
        }
        Command::Remove { config, file } => {
            let config = Config::load(&config)?;
            match config.backend {
                Backend::Btrfs => remove_file(&config, BtrfsVolumes::new(), &file),
                Backend::Dir => remove_file(&config, DirVolumes::new(), &file),
            }
        }
        Command::Status { config } => {
            let config = Config::load(&config)?;
            match config.backend {
                Backend::Btrfs => status(&config, BtrfsVolumes::new()),
                Backend::Dir => status(&config, DirVolumes::new()),
            }
        }
    }
}

fn init_manager<V: VolumeOps>(config: &Config, volumes: V) -> CliResult<TxManager<V>> {
    Ok(TxManager::init_with_slots(
        config.root_path(),
        volumes,
        config.max_read_slots,
    )?)
}

/// If a termination signal was recorded, run cleanup and exit with the
/// signal number.
fn finish<V: VolumeOps>(manager: &mut TxManager<V>) -> CliResult<()> {
    if let Some(signum) = manager.drive_pending_cleanup()? {
        std::process::exit(signum);
    }
    Ok(())
}

fn emit(value: serde_json::Value) -> CliResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer(&mut handle, &value)?;
    writeln!(handle)?;
    Ok(())
}

fn init_root<V: VolumeOps>(config: &Config, volumes: V) -> CliResult<()> {
    let mut manager = init_manager(config, volumes)?;
    finish(&mut manager)?;
    emit(json!({
        "status": "ok",
        "root": manager.root().display().to_string(),
        "state": manager.state().as_str(),
    }))
}

fn write_file<V: VolumeOps>(
    config: &Config,
    volumes: V,
    file: &str,
    content: Option<String>,
) -> CliResult<()> {
    let mut manager = init_manager(config, volumes)?;

    let payload = match content {
        Some(text) => text.into_bytes(),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };

    manager.start_write()?;
    let write_result: CliResult<()> = (|| {
        let mut handle = manager.create(file)?;
        handle.write_all(&payload)?;
        handle.sync_all()?;
        Ok(())
    })();
    if let Err(e) = write_result {
        let _ = manager.abort();
        return Err(e);
    }
    manager.commit()?;
    finish(&mut manager)?;

    emit(json!({
        "status": "ok",
        "committed": file,
        "bytes": payload.len(),
    }))
}

fn read_file<V: VolumeOps>(config: &Config, volumes: V, file: &str) -> CliResult<()> {
    let mut manager = init_manager(config, volumes)?;

    manager.start_read()?;
    let read_result: CliResult<String> = (|| {
        let mut handle = manager.open(file)?;
        let mut contents = String::new();
        handle.read_to_string(&mut contents)?;
        Ok(contents)
    })();
    let contents = match read_result {
        Ok(contents) => contents,
        Err(e) => {
            let _ = manager.stop_read();
            return Err(e);
        }
    };
    manager.stop_read()?;
    finish(&mut manager)?;

    print!("{}", contents);
    io::stdout().flush()?;
    Ok(())
}

fn remove_file<V: VolumeOps>(config: &Config, volumes: V, file: &str) -> CliResult<()> {
    let mut manager = init_manager(config, volumes)?;

    manager.start_write()?;
    if let Err(e) = manager.unlink(file) {
        let _ = manager.abort();
        return Err(e.into());
    }
    manager.commit()?;
    finish(&mut manager)?;

    emit(json!({
        "status": "ok",
        "removed": file,
    }))
}

/// Inspect the managed root without mutating it.
fn status<V: VolumeOps>(config: &Config, volumes: V) -> CliResult<()> {
    let layout = Layout::new(config.root_path(), config.max_read_slots);

    let occupied: Vec<usize> = (0..layout.max_read_slots())
        .filter(|&i| layout.ro_slot(i).exists())
        .collect();
    let head_is_subvolume = volumes.is_subvolume(layout.head()).unwrap_or(false);

    emit(json!({
        "root": layout.root().display().to_string(),
        "head": layout.head().exists(),
        "head_is_subvolume": head_is_subvolume,
        "head_old": layout.head_old().exists(),
        "wr_snap": layout.wr_snap().exists(),
        "ro_snaps": layout.ro_snaps().exists(),
        "occupied_slots": occupied,
        "max_read_slots": layout.max_read_slots(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_config(dir: &Path, root: &Path) -> PathBuf {
        let config_path = dir.join("btrfstxn.json");
        let config = json!({
            "root_dir": root.display().to_string(),
            "backend": "dir",
        });
        fs::write(&config_path, config.to_string()).unwrap();
        config_path
    }

    #[test]
    fn test_config_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(tmp.path(), tmp.path());
        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_read_slots, DEFAULT_MAX_READ_SLOTS);
        assert_eq!(config.backend, Backend::Dir);
    }

    #[test]
    fn test_config_backend_defaults_to_btrfs() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.json");
        fs::write(&path, r#"{"root_dir": "/mnt/x"}"#).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.backend, Backend::Btrfs);
    }

    #[test]
    fn test_config_rejects_zero_slots() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.json");
        fs::write(&path, r#"{"root_dir": "/mnt/x", "max_read_slots": 0}"#).unwrap();
        assert!(matches!(Config::load(&path), Err(CliError::Config(_))));
    }

    #[test]
    fn test_config_rejects_empty_root() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.json");
        fs::write(&path, r#"{"root_dir": ""}"#).unwrap();
        assert!(matches!(Config::load(&path), Err(CliError::Config(_))));
    }

    #[test]
    fn test_config_rejects_malformed_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("c.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(Config::load(&path), Err(CliError::Config(_))));
    }

    #[test]
    fn test_init_write_remove_cycle() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir(&root).unwrap();
        let config_path = write_config(tmp.path(), &root);

        run_command(Command::Init {
            config: config_path.clone(),
        })
        .unwrap();
        assert!(root.join("head").exists());
        assert!(root.join("ro_snaps").exists());

        run_command(Command::Write {
            config: config_path.clone(),
            file: "f".to_string(),
            content: Some("hello".to_string()),
        })
        .unwrap();
        assert_eq!(fs::read(root.join("head/f")).unwrap(), b"hello");

        run_command(Command::Read {
            config: config_path.clone(),
            file: "f".to_string(),
        })
        .unwrap();

        run_command(Command::Remove {
            config: config_path.clone(),
            file: "f".to_string(),
        })
        .unwrap();
        assert!(!root.join("head/f").exists());

        run_command(Command::Status {
            config: config_path,
        })
        .unwrap();
    }
}
