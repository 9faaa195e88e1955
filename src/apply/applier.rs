//! Writing rendered configuration and reloading the gateway.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;

use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::compiler::plan::EmissionPlan;
use crate::render::{render_gateway, RenderOptions};

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start reload command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("reload command exited with {status}: {stderr}")]
    Reload { status: String, stderr: String },
}

/// Hands compiled plans to the gateway.
///
/// `apply` declares the desired state of the domains in `plans`; domains not
/// mentioned keep their last applied state.
pub trait Applier: Send + Sync {
    fn apply(&self, plans: &[EmissionPlan]) -> impl Future<Output = Result<(), ApplyError>> + Send;
}

/// Renders every known plan into one file, then runs a reload command.
#[derive(Debug)]
pub struct CommandApplier {
    output_path: PathBuf,
    reload_command: Vec<String>,
    options: RenderOptions,
    applied: Mutex<BTreeMap<String, EmissionPlan>>,
}

impl CommandApplier {
    pub fn new(output_path: impl Into<PathBuf>, reload_command: Vec<String>) -> Self {
        Self {
            output_path: output_path.into(),
            reload_command,
            options: RenderOptions::default(),
            applied: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the whole applied set, dropping domains not in `plans`.
    pub async fn replace_all(&self, plans: &[EmissionPlan]) -> Result<(), ApplyError> {
        let mut applied = self.applied.lock().await;
        let next: BTreeMap<String, EmissionPlan> = plans
            .iter()
            .map(|p| (p.domain.clone(), p.clone()))
            .collect();
        self.commit(&next).await?;
        *applied = next;
        Ok(())
    }

    /// Domains in the last successfully applied state.
    pub async fn applied_domains(&self) -> Vec<String> {
        self.applied.lock().await.keys().cloned().collect()
    }

    /// Write and reload. A refused reload puts the previous file back, so
    /// the file on disk always matches what the gateway last accepted.
    async fn commit(&self, state: &BTreeMap<String, EmissionPlan>) -> Result<(), ApplyError> {
        let plans: Vec<EmissionPlan> = state.values().cloned().collect();
        let text = render_gateway(&plans, &self.options);
        let previous = self.read_previous().await?;
        self.write(text.as_bytes()).await?;
        if let Err(e) = self.reload().await {
            self.restore(previous.as_deref()).await;
            return Err(e);
        }
        tracing::info!(
            path = ?self.output_path,
            domains = plans.len(),
            "Gateway configuration applied"
        );
        Ok(())
    }

    async fn read_previous(&self) -> Result<Option<Vec<u8>>, ApplyError> {
        match tokio::fs::read(&self.output_path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ApplyError::Write {
                path: self.output_path.clone(),
                source,
            }),
        }
    }

    async fn restore(&self, previous: Option<&[u8]>) {
        let restored = match previous {
            Some(bytes) => self.write(bytes).await,
            None => tokio::fs::remove_file(&self.output_path)
                .await
                .map_err(|source| ApplyError::Write {
                    path: self.output_path.clone(),
                    source,
                }),
        };
        match restored {
            Ok(()) => tracing::warn!(path = ?self.output_path, "Previous gateway configuration restored"),
            Err(e) => tracing::error!(error = %e, "Failed to restore previous gateway configuration"),
        }
    }

    // Write to a sibling temp file and rename, so readers never see half a file.
    async fn write(&self, text: &[u8]) -> Result<(), ApplyError> {
        let tmp = self.output_path.with_extension("tmp");
        let result = async {
            tokio::fs::write(&tmp, text).await?;
            tokio::fs::rename(&tmp, &self.output_path).await
        }
        .await;
        result.map_err(|source| ApplyError::Write {
            path: self.output_path.clone(),
            source,
        })
    }

    async fn reload(&self) -> Result<(), ApplyError> {
        let Some((program, args)) = self.reload_command.split_first() else {
            tracing::debug!("No reload command configured");
            return Ok(());
        };

        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|source| ApplyError::Spawn {
                command: self.reload_command.join(" "),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!(status = %output.status, stderr = %stderr, "Gateway reload failed");
            return Err(ApplyError::Reload {
                status: output.status.to_string(),
                stderr,
            });
        }
        Ok(())
    }
}

impl Applier for CommandApplier {
    async fn apply(&self, plans: &[EmissionPlan]) -> Result<(), ApplyError> {
        let mut applied = self.applied.lock().await;
        let mut next = applied.clone();
        for plan in plans {
            next.insert(plan.domain.clone(), plan.clone());
        }
        self.commit(&next).await?;
        *applied = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::certs::StaticCertificates;
    use crate::compiler::compile;
    use crate::model::DomainConfig;

    fn plan(domain: &str) -> EmissionPlan {
        compile(&DomainConfig::new(domain).unwrap(), &StaticCertificates::none()).unwrap()
    }

    #[tokio::test]
    async fn test_apply_merges_domains() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("domains.cfg");
        let applier = CommandApplier::new(&out, Vec::new());

        applier.apply(&[plan("a.example.com")]).await.unwrap();
        applier.apply(&[plan("b.example.com")]).await.unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.contains("# domain a.example.com"));
        assert!(text.contains("# domain b.example.com"));
        assert_eq!(applier.applied_domains().await.len(), 2);

        applier.replace_all(&[plan("b.example.com")]).await.unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert!(!text.contains("a.example.com"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_reload_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("domains.cfg");
        let applier = CommandApplier::new(&out, vec!["false".to_string()]);

        let err = applier.apply(&[plan("a.example.com")]).await.unwrap_err();
        assert!(matches!(err, ApplyError::Reload { .. }));
        assert!(applier.applied_domains().await.is_empty());
        // Nothing was accepted before, so nothing is left behind.
        assert!(!out.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_reload_restores_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("domains.cfg");

        CommandApplier::new(&out, vec!["true".to_string()])
            .apply(&[plan("old.example.com")])
            .await
            .unwrap();
        let accepted = std::fs::read_to_string(&out).unwrap();

        let refusing = CommandApplier::new(&out, vec!["false".to_string()]);
        let err = refusing.apply(&[plan("new.example.com")]).await.unwrap_err();
        assert!(matches!(err, ApplyError::Reload { .. }));

        let on_disk = std::fs::read_to_string(&out).unwrap();
        assert_eq!(on_disk, accepted);
        assert!(on_disk.contains("# domain old.example.com"));
        assert!(!on_disk.contains("new.example.com"));
    }

    #[tokio::test]
    async fn test_missing_reload_binary() {
        let dir = tempfile::tempdir().unwrap();
        let applier = CommandApplier::new(
            dir.path().join("domains.cfg"),
            vec!["/nonexistent/gateway-reload".to_string()],
        );
        let err = applier.apply(&[plan("a.example.com")]).await.unwrap_err();
        assert!(matches!(err, ApplyError::Spawn { .. }));
    }
}
