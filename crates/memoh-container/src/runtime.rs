//! `ContainerRuntime`: the narrow surface the service layer needs from a
//! container backend. Grounded on `elisplash-paw::engine::sandbox`'s
//! `bollard` usage (image pull, create/start/wait/logs/remove) and generalized
//! into a trait so the service layer in [`crate::service`] never names
//! `bollard` directly — a containerd-backed implementation could replace
//! [`BollardRuntime`] without touching callers. `containerd`'s native gRPC
//! surface has no widely maintained Rust binding, so
//! `bollard` (Docker Engine API) is the only runtime implemented here.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, KillContainerOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::{CommitContainerOptions, CreateImageOptions};
use bollard::models::HostConfig;
use bollard::Docker;
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::error::{ContainerError, Result};

/// Outcome of a capture-mode [`ContainerRuntime::exec`].
#[derive(Debug, Clone, Default)]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i64,
}

/// One incrementally-delivered piece of a stream-mode exec: output as it
/// arrives, followed by exactly one `Exit` once the command finishes.
#[derive(Debug, Clone)]
pub enum ExecChunk {
    Stdout(String),
    Stderr(String),
    Exit(i64),
}

pub type ExecStream = Pin<Box<dyn Stream<Item = Result<ExecChunk>> + Send>>;

/// Whether `exec` buffers the whole run before returning, or hands output
/// back to the caller as it's produced — spec §4.G requires both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    #[default]
    Capture,
    Stream,
}

/// What to run and how long to let it run before it's killed.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    pub cmd: Vec<String>,
    pub workdir: Option<String>,
    pub timeout: Duration,
    pub mode: ExecMode,
}

impl ExecRequest {
    pub fn capture(cmd: Vec<String>, workdir: Option<String>, timeout: Duration) -> Self {
        Self {
            cmd,
            workdir,
            timeout,
            mode: ExecMode::Capture,
        }
    }
}

/// Result of [`ContainerRuntime::exec`]: a fully-buffered outcome in
/// capture mode, or a live stream of [`ExecChunk`] in stream mode.
pub enum ExecResult {
    Captured(ExecOutcome),
    Streamed(ExecStream),
}

impl ExecResult {
    /// Unwraps a capture-mode result, collapsing a misused stream-mode
    /// result into an error rather than panicking — callers that only ever
    /// request `ExecMode::Capture` (the MCP tool, snapshot helpers) use
    /// this to stay in the non-streaming `ExecOutcome` shape they already
    /// had before streaming existed.
    pub fn into_captured(self) -> Result<ExecOutcome> {
        match self {
            ExecResult::Captured(outcome) => Ok(outcome),
            ExecResult::Streamed(_) => Err(ContainerError::InvalidSpec(
                "expected a captured exec result, got a stream".to_string(),
            )),
        }
    }
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Creates a container bound to `host_path:/data` and returns the
    /// runtime's own reference for it (a Docker container id).
    async fn create(&self, name: &str, image: &str, host_path: &str) -> Result<String>;

    /// Idempotent: starting an already-running container is a no-op.
    async fn start(&self, runtime_ref: &str) -> Result<()>;

    /// SIGTERM, then SIGKILL after `grace` if the container hasn't exited.
    async fn stop(&self, runtime_ref: &str, grace: Duration) -> Result<()>;

    /// Runs `req.cmd` inside the running container. `req.mode` selects
    /// whether the whole run is buffered into an [`ExecOutcome`] before
    /// returning, or delivered incrementally as an [`ExecStream`].
    async fn exec(&self, runtime_ref: &str, req: ExecRequest) -> Result<ExecResult>;

    /// Commits the container's current filesystem to a new image tag —
    /// this tag *is* the snapshot's `archive_path`.
    async fn commit(&self, runtime_ref: &str, tag: &str) -> Result<()>;

    /// Starts a fresh container from a previously committed snapshot tag.
    async fn run_from_snapshot(&self, name: &str, tag: &str, host_path: &str) -> Result<String>;

    async fn remove(&self, runtime_ref: &str) -> Result<()>;
}

pub struct BollardRuntime {
    docker: Docker,
}

impl BollardRuntime {
    pub fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
        .map_err(|e| ContainerError::Runtime(e.to_string()))?;
        Ok(Self { docker })
    }

    async fn ensure_image(&self, image: &str) -> Result<()> {
        if self.docker.inspect_image(image).await.is_ok() {
            return Ok(());
        }
        info!(image, "pulling container image");
        let opts = CreateImageOptions {
            from_image: image,
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(opts), None, None);
        while let Some(progress) = stream.next().await {
            progress?;
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn create(&self, name: &str, image: &str, host_path: &str) -> Result<String> {
        self.ensure_image(image).await?;

        let host_config = HostConfig {
            binds: Some(vec![format!("{host_path}:/data")]),
            cap_drop: Some(vec!["ALL".to_string()]),
            ..Default::default()
        };
        let config = ContainerConfig {
            image: Some(image.to_string()),
            working_dir: Some("/data".to_string()),
            host_config: Some(host_config),
            tty: Some(false),
            ..Default::default()
        };
        let create_opts = CreateContainerOptions {
            name,
            platform: None,
        };
        let container = self.docker.create_container(Some(create_opts), config).await?;
        Ok(container.id)
    }

    async fn start(&self, runtime_ref: &str) -> Result<()> {
        match self
        .docker
        .start_container(runtime_ref, None::<StartContainerOptions<String>>)
        .await
        {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 304, ..
            }) => Ok(()), // already running
            Err(e) => Err(e.into()),
        }
    }

    async fn stop(&self, runtime_ref: &str, grace: Duration) -> Result<()> {
        let opts = StopContainerOptions {
            t: grace.as_secs() as i64,
        };
        match self.docker.stop_container(runtime_ref, Some(opts)).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 304 | 404,
                    ..
            }) => Ok(()),
            Err(_) => {
                warn!(runtime_ref, "graceful stop failed, sending SIGKILL");
                self.docker
                .kill_container(runtime_ref, None::<KillContainerOptions<String>>)
                .await?;
                Ok(())
            }
        }
    }

    async fn exec(&self, runtime_ref: &str, req: ExecRequest) -> Result<ExecResult> {
        let exec = self
        .docker
        .create_exec(
            runtime_ref,
            CreateExecOptions {
                cmd: Some(req.cmd),
                working_dir: req.workdir.clone(),
                attach_stdout: Some(true),
                attach_stderr: Some(true),
                ..Default::default()
            },
        )
        .await?;

        match req.mode {
            ExecMode::Capture => {
                let run = async {
                    let mut stdout = String::new();
                    let mut stderr = String::new();
                    if let StartExecResults::Attached { mut output, .. } =
                    self.docker.start_exec(&exec.id, None).await?
                    {
                        while let Some(chunk) = output.next().await {
                            match chunk? {
                                bollard::container::LogOutput::StdOut { message } => {
                                    stdout.push_str(&String::from_utf8_lossy(&message));
                                }
                                bollard::container::LogOutput::StdErr { message } => {
                                    stderr.push_str(&String::from_utf8_lossy(&message));
                                }
                                _ => {}
                            }
                        }
                    }
                    let inspect = self.docker.inspect_exec(&exec.id).await?;
                    Result::Ok((stdout, stderr, inspect.exit_code.unwrap_or(-1)))
                };

                match tokio::time::timeout(req.timeout, run).await {
                    Ok(Ok((stdout, stderr, exit_code))) => Ok(ExecResult::Captured(ExecOutcome {
                                stdout,
                                stderr,
                                exit_code,
                    })),
                    Ok(Err(e)) => Err(ContainerError::ExecFailed(e.to_string())),
                    Err(_) => Err(ContainerError::Timeout {
                                ms: req.timeout.as_millis() as u64,
                    }),
                }
            }
            ExecMode::Stream => {
                let docker = self.docker.clone();
                let exec_id = exec.id;
                let timeout = req.timeout;
                let (tx, rx) = tokio::sync::mpsc::channel(32);

                tokio::spawn(async move {
                    let deadline = tokio::time::sleep(timeout);
                    tokio::pin!(deadline);

                    let started = match docker.start_exec(&exec_id, None).await {
                        Ok(started) => started,
                        Err(e) => {
                            let _ = tx.send(Err(ContainerError::from(e))).await;
                            return;
                        }
                    };
                    if let StartExecResults::Attached { mut output, .. } = started {
                        loop {
                            tokio::select! {
                                _ = &mut deadline => {
                                    let _ = tx.send(Err(ContainerError::Timeout { ms: timeout.as_millis() as u64 })).await;
                                    return;
                                }
                                chunk = output.next() => {
                                    match chunk {
                                        Some(Ok(bollard::container::LogOutput::StdOut { message })) => {
                                            if tx.send(Ok(ExecChunk::Stdout(String::from_utf8_lossy(&message).into_owned()))).await.is_err() {
                                                return;
                                            }
                                        }
                                        Some(Ok(bollard::container::LogOutput::StdErr { message })) => {
                                            if tx.send(Ok(ExecChunk::Stderr(String::from_utf8_lossy(&message).into_owned()))).await.is_err() {
                                                return;
                                            }
                                        }
                                        Some(Ok(_)) => {}
                                        Some(Err(e)) => {
                                            let _ = tx.send(Err(ContainerError::from(e))).await;
                                            return;
                                        }
                                        None => break,
                                    }
                                }
                            }
                        }
                    }
                    let exit_code = docker
                    .inspect_exec(&exec_id)
                    .await
                    .ok()
                    .and_then(|i| i.exit_code)
                    .unwrap_or(-1);
                    let _ = tx.send(Ok(ExecChunk::Exit(exit_code))).await;
                });

                Ok(ExecResult::Streamed(Box::pin(ReceiverStream::new(rx))))
            }
        }
    }

    async fn commit(&self, runtime_ref: &str, tag: &str) -> Result<()> {
        let (repo, tag_part) = tag.split_once(':').unwrap_or((tag, "latest"));
        self.docker
        .commit_container(
            CommitContainerOptions {
                container: runtime_ref.to_string(),
                repo: repo.to_string(),
                tag: tag_part.to_string(),
                pause: true,
                ..Default::default()
            },
            ContainerConfig::<String>::default(),
        )
        .await?;
        Ok(())
    }

    async fn run_from_snapshot(&self, name: &str, tag: &str, host_path: &str) -> Result<String> {
        self.create(name, tag, host_path).await
    }

    async fn remove(&self, runtime_ref: &str) -> Result<()> {
        let opts = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        match self.docker.remove_container(runtime_ref, Some(opts)).await {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
            }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
