//! Image build and push
//!
//! Builds the per-service images with `docker build`, optionally logs in to
//! the registry and pushes them. Every step is recorded as a check so the
//! usual summary and exit code apply.

use crate::config::{Environment, ImageSettings, ImageSpec};
use crate::exec::{CommandRunner, ToolInvocation};
use crate::models::{CheckCategory, CheckStatus, ServiceKind, ServiceReport};
use crate::services::{Checklist, Verdict};
use crate::utils::ImageError;
use anyhow::{anyhow, Result};
use std::fmt;
use std::time::Instant;
use tracing::info;

pub const REGISTRY_PREFIX_VAR: &str = "REGISTRY_PREFIX";
pub const IMAGE_TAG_VAR: &str = "IMAGE_TAG";
pub const REGISTRY_USERNAME_VAR: &str = "REGISTRY_USERNAME";
pub const REGISTRY_PASSWORD_VAR: &str = "REGISTRY_PASSWORD";

/// Fully qualified image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub registry_prefix: String,
    pub repository: String,
    pub tag: String,
}

impl ImageRef {
    /// Registry host for `docker login`, if the prefix names one.
    ///
    /// As with Docker references, the first segment is a host only when it
    /// contains `.` or `:` or is `localhost`; `myuser/` is a Docker Hub
    /// namespace and yields `None`.
    pub fn registry(&self) -> Option<&str> {
        let prefix = self.registry_prefix.trim_end_matches('/');
        let (first, _) = prefix.split_once('/').unwrap_or((prefix, ""));
        let is_host = first.contains('.') || first.contains(':') || first == "localhost";
        is_host.then_some(first)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.registry_prefix.trim_end_matches('/');
        if prefix.is_empty() {
            write!(f, "{}:{}", self.repository, self.tag)
        } else {
            write!(f, "{}/{}:{}", prefix, self.repository, self.tag)
        }
    }
}

/// Command-line overrides for an image run
#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    pub registry_prefix: Option<String>,
    pub tag: Option<String>,
    pub push: bool,
    /// Empty means every configured image
    pub services: Vec<ServiceKind>,
}

/// Flag, then environment, then settings
pub fn resolve_prefix(options: &ImageOptions, env: &Environment, settings: &ImageSettings) -> String {
    options
        .registry_prefix
        .clone()
        .filter(|p| !p.is_empty())
        .or_else(|| env.get(REGISTRY_PREFIX_VAR))
        .unwrap_or_else(|| settings.registry_prefix.clone())
}

/// Flag, then environment, then settings (`latest` by default)
pub fn resolve_tag(options: &ImageOptions, env: &Environment, settings: &ImageSettings) -> String {
    options
        .tag
        .clone()
        .filter(|t| !t.is_empty())
        .or_else(|| env.get(IMAGE_TAG_VAR))
        .unwrap_or_else(|| settings.tag.clone())
}

/// Images selected for this run, in configuration order
pub fn selected_images<'a>(settings: &'a ImageSettings, services: &[ServiceKind]) -> Vec<&'a ImageSpec> {
    settings
        .images
        .iter()
        .filter(|spec| services.is_empty() || services.contains(&spec.service))
        .collect()
}

pub struct ImagePipeline<'a> {
    runner: &'a dyn CommandRunner,
    settings: &'a ImageSettings,
    env: &'a Environment,
    options: ImageOptions,
}

impl<'a> ImagePipeline<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        settings: &'a ImageSettings,
        env: &'a Environment,
        options: ImageOptions,
    ) -> Self {
        Self {
            runner,
            settings,
            env,
            options,
        }
    }

    pub fn image_ref(&self, spec: &ImageSpec) -> ImageRef {
        ImageRef {
            registry_prefix: resolve_prefix(&self.options, self.env, self.settings),
            repository: spec.repository.clone(),
            tag: resolve_tag(&self.options, self.env, self.settings),
        }
    }

    /// Build (and push) every selected image; one report per image, plus a
    /// registry report when logging in
    pub async fn run(&self) -> Vec<ServiceReport> {
        let mut reports = Vec::new();
        let mut can_push = self.options.push;

        if self.options.push {
            let prefix = resolve_prefix(&self.options, self.env, self.settings);
            let registry = ImageRef {
                registry_prefix: prefix,
                repository: String::new(),
                tag: String::new(),
            };
            if let Some(report) = self.login(registry.registry()).await {
                can_push = report.status() != CheckStatus::Fail;
                reports.push(report);
            }
        }

        for spec in selected_images(self.settings, &self.options.services) {
            let image = self.image_ref(spec);
            let start = Instant::now();
            let mut report = ServiceReport::named(image.to_string());
            report.service = Some(spec.service);

            let mut checks = Checklist::new();
            let built = checks
                .record("build", CheckCategory::Write, self.build(spec, &image))
                .await;

            if self.options.push {
                if !built {
                    checks.skip("push", CheckCategory::Write, "build failed");
                } else if !can_push {
                    checks.skip("push", CheckCategory::Write, "registry login failed");
                } else {
                    checks
                        .record("push", CheckCategory::Write, self.push(&image))
                        .await;
                }
            }

            report.checks = checks.into_outcomes();
            report.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            reports.push(report);
        }
        reports
    }

    async fn login(&self, registry: Option<&str>) -> Option<ServiceReport> {
        let username = self.env.get(REGISTRY_USERNAME_VAR)?;
        let password = self.env.get(REGISTRY_PASSWORD_VAR)?;

        let mut report = ServiceReport::named("Registry");
        let mut checks = Checklist::new();
        checks
            .record(
                "login",
                CheckCategory::Security,
                self.docker_login(registry, &username, &password),
            )
            .await;
        report.checks = checks.into_outcomes();
        Some(report)
    }

    async fn docker_login(
        &self,
        registry: Option<&str>,
        username: &str,
        password: &str,
    ) -> Result<Verdict> {
        let registry_name = registry.unwrap_or("Docker Hub");
        let mut invocation = ToolInvocation::new(&self.settings.docker).arg("login");
        if let Some(registry) = registry {
            invocation = invocation.arg(registry);
        }
        let invocation = invocation
            .args(["-u", username, "--password-stdin"])
            .stdin(password);

        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(ImageError::from)?;
        if output.success() {
            Ok(Verdict::pass(format!(
                "logged in to {} as {}",
                registry_name, username
            )))
        } else {
            Err(ImageError::LoginFailed {
                registry: registry_name.to_string(),
                message: output.error_text(),
            }
            .into())
        }
    }

    async fn build(&self, spec: &ImageSpec, image: &ImageRef) -> Result<Verdict> {
        if !spec.context.is_dir() {
            return Err(ImageError::ContextNotFound {
                service: spec.service.as_str().to_string(),
                path: spec.context.display().to_string(),
            }
            .into());
        }

        info!("Building {}", image);
        let mut invocation = ToolInvocation::new(&self.settings.docker)
            .args(["build", "-t"])
            .arg(image.to_string());
        if let Some(dockerfile) = &spec.dockerfile {
            invocation = invocation.arg("-f").arg(dockerfile.display().to_string());
        }
        let invocation = invocation
            .arg(spec.context.display().to_string())
            .timeout(self.settings.build_timeout());

        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(ImageError::from)?;
        if output.success() {
            Ok(Verdict::pass(format!("built {}", image)))
        } else {
            Err(anyhow!(output.error_text()))
        }
    }

    async fn push(&self, image: &ImageRef) -> Result<Verdict> {
        info!("Pushing {}", image);
        let invocation = ToolInvocation::new(&self.settings.docker)
            .arg("push")
            .arg(image.to_string())
            .timeout(self.settings.build_timeout());

        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(ImageError::from)?;
        if output.success() {
            Ok(Verdict::pass(format!("pushed {}", image)))
        } else {
            Err(anyhow!(output.error_text()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ExecError;

    fn image(prefix: &str) -> ImageRef {
        ImageRef {
            registry_prefix: prefix.to_string(),
            repository: "local-backend-kafka".to_string(),
            tag: "1.2.0".to_string(),
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(image("").to_string(), "local-backend-kafka:1.2.0");
        assert_eq!(
            image("registry.example.com/team/").to_string(),
            "registry.example.com/team/local-backend-kafka:1.2.0"
        );
    }

    #[test]
    fn test_registry_host() {
        assert_eq!(image("").registry(), None);
        assert_eq!(image("myuser").registry(), None);
        assert_eq!(image("myuser/").registry(), None);
        assert_eq!(image("localhost:5000").registry(), Some("localhost:5000"));
        assert_eq!(image("localhost/team").registry(), Some("localhost"));
        assert_eq!(
            image("registry.example.com/team").registry(),
            Some("registry.example.com")
        );
    }

    #[test]
    fn test_resolution_precedence() {
        let settings = ImageSettings {
            registry_prefix: "from-settings".to_string(),
            ..ImageSettings::default()
        };
        let env = Environment::from_pairs([("REGISTRY_PREFIX", "from-env"), ("IMAGE_TAG", "")]);

        let none = ImageOptions::default();
        assert_eq!(resolve_prefix(&none, &env, &settings), "from-env");
        // empty IMAGE_TAG counts as unset
        assert_eq!(resolve_tag(&none, &env, &settings), "latest");

        let flags = ImageOptions {
            registry_prefix: Some("from-flag".to_string()),
            tag: Some("v2".to_string()),
            ..ImageOptions::default()
        };
        assert_eq!(resolve_prefix(&flags, &env, &settings), "from-flag");
        assert_eq!(resolve_tag(&flags, &env, &settings), "v2");

        let empty = Environment::from_pairs(Vec::<(String, String)>::new());
        assert_eq!(resolve_prefix(&none, &empty, &settings), "from-settings");
    }

    struct MissingDocker;

    #[async_trait::async_trait]
    impl CommandRunner for MissingDocker {
        async fn run(
            &self,
            invocation: &ToolInvocation,
        ) -> std::result::Result<crate::exec::ToolOutput, ExecError> {
            Err(ExecError::Spawn {
                program: invocation.program.clone(),
                message: "No such file or directory".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_fails_build() {
        let dir = tempfile::tempdir().unwrap();
        let settings = ImageSettings {
            images: vec![ImageSpec {
                service: ServiceKind::Kafka,
                repository: "local-backend-kafka".to_string(),
                context: dir.path().to_path_buf(),
                dockerfile: None,
            }],
            ..ImageSettings::default()
        };
        let env = Environment::from_pairs(Vec::<(String, String)>::new());

        let reports = ImagePipeline::new(&MissingDocker, &settings, &env, ImageOptions::default())
            .run()
            .await;
        assert_eq!(reports[0].status(), CheckStatus::Fail);
        assert!(reports[0].checks[0].detail().contains("Failed to start docker"));
    }

    #[test]
    fn test_selected_images() {
        let settings = ImageSettings::default();
        assert_eq!(selected_images(&settings, &[]).len(), 6);
        let only = selected_images(&settings, &[ServiceKind::Mongodb]);
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].repository, "local-backend-mongodb");
    }
}
