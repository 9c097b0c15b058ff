//! Lifecycle of the Baileys sidecar process.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use {
    anyhow::{Context, Result, bail},
    tokio::{
        io::{AsyncBufReadExt, AsyncRead, BufReader},
        process::{Child, Command},
    },
    tracing::{debug, error, info, warn},
};

/// Env var pointing at the sidecar directory.
pub const SIDECAR_DIR_ENV: &str = "TASKWIRE_WHATSAPP_SIDECAR_DIR";

const SIDECAR_REL_DIR: &str = "sidecar/whatsapp-baileys";
const STARTUP_GRACE: Duration = Duration::from_millis(500);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for spawning the sidecar.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    /// Directory containing the sidecar `package.json`.
    pub sidecar_dir: PathBuf,
    /// Port for the sidecar WebSocket server.
    pub port: u16,
    /// Where the sidecar stores WhatsApp session credentials.
    pub auth_dir: Option<PathBuf>,
}

/// A running sidecar. The child is killed if the handle is dropped.
pub struct SidecarProcess {
    child: Child,
    port: u16,
}

impl SidecarProcess {
    /// Build the sidecar if needed, spawn it and make sure it survives
    /// startup.
    pub async fn spawn(config: &SidecarConfig) -> Result<Self> {
        let dir = &config.sidecar_dir;
        if !has_package_json(dir) {
            bail!(
                "WhatsApp sidecar not found at {}. Run `npm install && npm run build` there first.",
                dir.display()
            );
        }

        if !dir.join("dist/index.js").exists() {
            info!(path = %dir.display(), "building WhatsApp sidecar");
            if !dir.join("node_modules").exists() {
                run_npm(dir, &["install"]).await?;
            }
            run_npm(dir, &["run", "build"]).await?;
        }

        info!(path = %dir.display(), port = config.port, "starting WhatsApp sidecar process");

        let mut cmd = Command::new("node");
        cmd.arg("dist/index.js")
            .current_dir(dir)
            .env("TASKWIRE_WHATSAPP_PORT", config.port.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(auth_dir) = &config.auth_dir {
            cmd.env("TASKWIRE_WHATSAPP_AUTH_DIR", auth_dir);
        }

        let mut child = cmd.spawn().context("failed to spawn sidecar process")?;
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(forward_logs(stdout, false));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(forward_logs(stderr, true));
        }

        tokio::time::sleep(STARTUP_GRACE).await;
        if let Some(status) = child
            .try_wait()
            .context("failed to check sidecar process status")?
        {
            bail!("sidecar process exited immediately with status: {status}");
        }

        info!(port = config.port, "WhatsApp sidecar process started");
        Ok(Self {
            child,
            port: config.port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Ask the process to exit, killing it if it lingers.
    pub async fn stop(&mut self) -> Result<()> {
        info!("stopping WhatsApp sidecar process");
        self.terminate().await;

        match tokio::time::timeout(STOP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => info!(?status, "WhatsApp sidecar process exited"),
            Ok(Err(e)) => warn!(error = %e, "error waiting for sidecar process"),
            Err(_) => {
                warn!("sidecar process did not exit gracefully, killing");
                self.child
                    .kill()
                    .await
                    .context("failed to kill sidecar process")?;
            },
        }
        Ok(())
    }

    #[cfg(unix)]
    async fn terminate(&mut self) {
        use nix::{
            sys::signal::{Signal, kill},
            unistd::Pid,
        };

        let Some(pid) = self.child.id().and_then(|p| i32::try_from(p).ok()) else {
            return;
        };
        if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
            debug!(pid, error = %e, "SIGTERM failed");
        }
    }

    #[cfg(not(unix))]
    async fn terminate(&mut self) {
        if let Err(e) = self.child.kill().await {
            debug!(error = %e, "kill failed");
        }
    }
}

fn has_package_json(dir: &Path) -> bool {
    dir.join("package.json").exists()
}

/// Candidate sidecar locations, most specific first.
fn candidate_dirs(exe_dir: Option<&Path>) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(exe_dir) = exe_dir {
        // Installed binary, then `cargo run` from target/<profile>.
        dirs.push(exe_dir.join("../").join(SIDECAR_REL_DIR));
        dirs.push(exe_dir.join("../../").join(SIDECAR_REL_DIR));
    }
    for prefix in ["", "../", "../../"] {
        dirs.push(PathBuf::from(format!("{prefix}{SIDECAR_REL_DIR}")));
    }
    dirs
}

/// Locate the sidecar directory.
///
/// Order: explicit path, `TASKWIRE_WHATSAPP_SIDECAR_DIR`, paths relative to
/// the executable, then development paths relative to the working directory.
pub fn find_sidecar_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if has_package_json(path) {
            return Ok(path.to_path_buf());
        }
        bail!(
            "sidecar directory does not exist or is missing package.json: {}",
            path.display()
        );
    }

    if let Ok(dir) = std::env::var(SIDECAR_DIR_ENV) {
        let path = PathBuf::from(&dir);
        if has_package_json(&path) {
            return Ok(path);
        }
        warn!(path = %dir, "{SIDECAR_DIR_ENV} set but package.json not found");
    }

    let exe = std::env::current_exe().ok();
    candidate_dirs(exe.as_deref().and_then(Path::parent))
        .into_iter()
        .find(|p| has_package_json(p))
        .map(|p| p.canonicalize().unwrap_or(p))
        .with_context(|| {
            format!("WhatsApp sidecar not found. Set {SIDECAR_DIR_ENV} or create {SIDECAR_REL_DIR}")
        })
}

async fn run_npm(dir: &Path, args: &[&str]) -> Result<()> {
    let label = args.join(" ");
    info!(path = %dir.display(), "running npm {label} for sidecar");

    let output = Command::new("npm")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .with_context(|| format!("failed to run npm {label}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("npm {label} failed: {stderr}");
    }
    Ok(())
}

/// Pino numeric level for a JSON log line, if it is one.
fn pino_level(line: &str) -> Option<(u64, String)> {
    if !line.starts_with('{') {
        return None;
    }
    let log: serde_json::Value = serde_json::from_str(line).ok()?;
    let level = log.get("level").and_then(|v| v.as_u64()).unwrap_or(30);
    let msg = log
        .get("msg")
        .and_then(|v| v.as_str())
        .unwrap_or(line)
        .to_string();
    Some((level, msg))
}

/// Re-emit sidecar output through tracing.
async fn forward_logs(stream: impl AsyncRead + Unpin, is_stderr: bool) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match pino_level(&line) {
            Some((10 | 20, msg)) => debug!(target: "whatsapp_sidecar", "{msg}"),
            Some((30, msg)) => info!(target: "whatsapp_sidecar", "{msg}"),
            Some((40, msg)) => warn!(target: "whatsapp_sidecar", "{msg}"),
            Some((_, msg)) => error!(target: "whatsapp_sidecar", "{msg}"),
            None if is_stderr => warn!(target: "whatsapp_sidecar", "{line}"),
            None => info!(target: "whatsapp_sidecar", "{line}"),
        }
    }
}
