//! Per-bot container lifecycle : create/start/exec/snapshot/
//! version management over a `bollard`-backed `ContainerRuntime`, with the
//! snapshot DAG and version numbering held in `memoh-db` independent of the
//! runtime backend.

pub mod error;
pub mod runtime;
pub mod service;

pub use error::{ContainerError, Result};
pub use runtime::{
    BollardRuntime, ContainerRuntime, ExecChunk, ExecMode, ExecOutcome, ExecRequest, ExecResult,
    ExecStream,
};
pub use service::{ContainerService, ContainerSpec, DEFAULT_STOP_GRACE};

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;

    /// In-memory stand-in for `BollardRuntime` so `ContainerService` logic
    /// can be exercised without a Docker daemon.
    #[derive(Default)]
    struct FakeRuntime {
        next_id: Mutex<u64>,
        committed: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ContainerRuntime for FakeRuntime {
        async fn create(&self, name: &str, _image: &str, _host_path: &str) -> Result<String> {
            let mut n = self.next_id.lock().unwrap();
            *n += 1;
            Ok(format!("{name}-{n}"))
        }

        async fn start(&self, _runtime_ref: &str) -> Result<()> {
            Ok(())
        }

        async fn stop(&self, _runtime_ref: &str, _grace: Duration) -> Result<()> {
            Ok(())
        }

        async fn exec(&self, _runtime_ref: &str, req: ExecRequest) -> Result<ExecResult> {
            Ok(ExecResult::Captured(ExecOutcome {
                    stdout: req.cmd.join(" "),
                    stderr: String::new(),
                    exit_code: 0,
            }))
        }

        async fn commit(&self, runtime_ref: &str, tag: &str) -> Result<()> {
            self.committed
            .lock()
            .unwrap()
            .push((runtime_ref.to_string(), tag.to_string()));
            Ok(())
        }

        async fn run_from_snapshot(&self, name: &str, _tag: &str, _host_path: &str) -> Result<String> {
            Ok(format!("{name}-rollback"))
        }

        async fn remove(&self, _runtime_ref: &str) -> Result<()> {
            Ok(())
        }
    }

    fn fake_runtime() -> Arc<dyn ContainerRuntime> {
        Arc::new(FakeRuntime::default())
    }

    #[test]
    fn default_stop_grace_is_ten_seconds() {
        assert_eq!(DEFAULT_STOP_GRACE, Duration::from_secs(10));
    }

    #[test]
    fn container_spec_carries_host_path() {
        let spec = ContainerSpec {
            host_path: "/srv/memoh/bot-1".to_string(),
        };
        assert_eq!(spec.host_path, "/srv/memoh/bot-1");
    }

    #[tokio::test]
    async fn fake_runtime_exec_echoes_cmd() {
        let runtime = fake_runtime();
        let result = runtime
        .exec(
            "c1",
            ExecRequest::capture(vec!["echo".to_string(), "hi".to_string()], None, Duration::from_secs(1)),
        )
        .await
        .unwrap();
        let outcome = result.into_captured().unwrap();
        assert_eq!(outcome.stdout, "echo hi");
        assert_eq!(outcome.exit_code, 0);
    }
}
