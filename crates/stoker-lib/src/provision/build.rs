use crate::error::{Error, Result};
use crate::net::{download_to_path, MetadataClient};
use crate::provision::{LineCallback, ProgressCallback};
use crate::server::config::ServerConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncBufReadExt;

pub const BUILD_TOOL_JAR: &str = "build-tools.jar";

const DEFAULT_TOOL_URL: &str =
    "https://hub.spigotmc.org/jenkins/job/BuildTools/lastSuccessfulBuild/artifact/target/BuildTools.jar";
const DEFAULT_LISTING_URL: &str = "https://hub.spigotmc.org/versions/";

/// Version strings in the HTML listing, e.g. `1.21` or `1.20.4`.
static LISTED_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("version listing regex"));

/// Builds the server artifact locally by running a third-party build-tool jar
/// against the requested version.
pub struct BuildProvisioner {
    client: MetadataClient,
    tool_url: String,
    listing_url: String,
    on_line: Option<LineCallback>,
}

impl BuildProvisioner {
    pub fn new(client: MetadataClient) -> Self {
        Self {
            client,
            tool_url: DEFAULT_TOOL_URL.to_string(),
            listing_url: DEFAULT_LISTING_URL.to_string(),
            on_line: None,
        }
    }

    pub fn with_endpoints(
        mut self,
        tool_url: impl Into<String>,
        listing_url: impl Into<String>,
    ) -> Self {
        self.tool_url = tool_url.into();
        self.listing_url = listing_url.into();
        self
    }

    /// Stream build-tool output lines to the given callback.
    pub fn with_line_callback(mut self, on_line: LineCallback) -> Self {
        self.on_line = Some(on_line);
        self
    }

    /// Built artifacts are version-suffixed so rebuilds of other versions can
    /// coexist in the install directory.
    pub fn artifact_path(&self, config: &ServerConfig) -> PathBuf {
        match &config.version {
            Some(version) => config.install_dir.join(format!("server-{}.jar", version)),
            None => config.install_dir.join(crate::server::config::SERVER_JAR),
        }
    }

    /// Returns whether the artifact was (re)built.
    pub(crate) async fn ensure(
        &self,
        config: &mut ServerConfig,
        force: bool,
        on_progress: &ProgressCallback,
    ) -> Result<bool> {
        let version = match &config.version {
            Some(version) => version.clone(),
            None => self.latest_version().await?,
        };
        config.version = Some(version.clone());

        let target = self.artifact_path(config);
        if target.exists() && !force {
            log::debug!("Built artifact already present: {:?}", target);
            return Ok(false);
        }

        let workdir = config.install_dir.join("build");
        tokio::fs::create_dir_all(&workdir).await?;

        let tool_jar = workdir.join(BUILD_TOOL_JAR);
        if !tool_jar.exists() {
            log::info!("Downloading build tool -> {:?}", tool_jar);
            let progress_target = tool_jar.clone();
            download_to_path(
                self.client.http(),
                &self.tool_url,
                &tool_jar,
                None,
                |transferred, total| on_progress(&progress_target, transferred, total),
            )
            .await
            .map_err(|e| Error::Provisioning(format!("build tool download: {}", e)))?;
        }

        self.run_build(config, &tool_jar, &workdir, &version).await?;

        let built = workdir.join(format!("spigot-{}.jar", version));
        if !built.exists() {
            return Err(Error::Provisioning(format!(
                "build for {} exited cleanly but produced no {:?}",
                version, built
            )));
        }
        tokio::fs::rename(&built, &target).await?;
        log::info!("Built server {} -> {:?}", version, target);

        Ok(true)
    }

    async fn run_build(
        &self,
        config: &ServerConfig,
        tool_jar: &std::path::Path,
        workdir: &std::path::Path,
        version: &str,
    ) -> Result<()> {
        log::info!("Building server {} with {:?}", version, tool_jar);

        let mut child = tokio::process::Command::new(&config.java_path)
            .arg("-jar")
            .arg(tool_jar)
            .arg("--rev")
            .arg(version)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(Error::Spawn)?;

        // Both pipes need their own drain or the child blocks once one pipe
        // buffer fills; stderr is collected on a spawned task while stdout is
        // streamed here.
        let stderr_task = child.stderr.take().map(|stderr| {
            tokio::spawn(async move {
                let mut lines = tokio::io::BufReader::new(stderr).lines();
                let mut collected = String::new();
                while let Ok(Some(line)) = lines.next_line().await {
                    log::debug!("[build:err] {}", line);
                    collected.push_str(&line);
                    collected.push('\n');
                }
                collected
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = tokio::io::BufReader::new(stdout).lines();
            let on_line = self.on_line.clone();
            while let Ok(Some(line)) = lines.next_line().await {
                log::debug!("[build] {}", line);
                if let Some(cb) = &on_line {
                    cb(&line);
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::Provisioning(format!("build process wait failed: {}", e)))?;
        let stderr_text = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };
        if !status.success() {
            return Err(Error::Provisioning(format!(
                "build for {} failed with {}: {}",
                version,
                status,
                stderr_text.trim()
            )));
        }

        Ok(())
    }

    /// Latest version advertised by the HTML listing page: regex-extract
    /// version tuples and sort (major, minor, patch-or-zero) descending.
    pub async fn latest_version(&self) -> Result<String> {
        let html = self.client.get_text(&self.listing_url).await?;
        let latest = latest_listed_version(&html).ok_or_else(|| {
            Error::Metadata(format!("no versions found at {}", self.listing_url))
        })?;
        Ok(latest)
    }
}

fn latest_listed_version(html: &str) -> Option<String> {
    let mut versions: Vec<((u32, u32, u32), String)> = LISTED_VERSION
        .captures_iter(html)
        .filter_map(|caps| {
            let major: u32 = caps.get(1)?.as_str().parse().ok()?;
            let minor: u32 = caps.get(2)?.as_str().parse().ok()?;
            let patch: u32 = caps
                .get(3)
                .map(|m| m.as_str().parse().unwrap_or(0))
                .unwrap_or(0);
            Some(((major, minor, patch), caps.get(0)?.as_str().to_string()))
        })
        .collect();

    versions.sort_by(|a, b| b.0.cmp(&a.0));
    versions.dedup();
    versions.into_iter().next().map(|(_, raw)| raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[tokio::test]
    async fn stderr_heavy_build_completes() {
        use crate::provision::noop_progress;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::tempdir;

        let dir = tempdir().unwrap();

        // Stand-in build tool: floods stderr well past the pipe buffer size
        // before producing the jar, so an undrained stderr pipe would wedge
        // the child.
        let tool = dir.path().join("fake-build-tool.sh");
        tokio::fs::write(
            &tool,
            r#"#!/bin/sh
i=0
while [ $i -lt 4096 ]; do
  echo "build diagnostics line with enough padding to fill the pipe buffer" >&2
  i=$((i+1))
done
echo built > spigot-1.20.1.jar
"#,
        )
        .await
        .unwrap();
        let mut perms = tokio::fs::metadata(&tool).await.unwrap().permissions();
        perms.set_mode(0o755);
        tokio::fs::set_permissions(&tool, perms).await.unwrap();

        // Pre-seed the tool jar so no download happens; the unroutable
        // endpoints would fail loudly otherwise.
        let workdir = dir.path().join("build");
        tokio::fs::create_dir_all(&workdir).await.unwrap();
        tokio::fs::write(workdir.join(BUILD_TOOL_JAR), b"tool")
            .await
            .unwrap();

        let provisioner = BuildProvisioner::new(MetadataClient::new().unwrap()).with_endpoints(
            "http://127.0.0.1:1/tool.jar",
            "http://127.0.0.1:1/versions/",
        );
        let mut config = ServerConfig::new(dir.path())
            .with_version("1.20.1")
            .with_java_path(&tool);

        let obtained = tokio::time::timeout(
            std::time::Duration::from_secs(20),
            provisioner.ensure(&mut config, false, &noop_progress()),
        )
        .await
        .expect("build hung instead of draining stderr")
        .unwrap();

        assert!(obtained);
        assert!(provisioner.artifact_path(&config).exists());
    }

    #[test]
    fn listing_sorts_by_numeric_tuple_descending() {
        let html = r#"
            <a href="1.9.json">1.9.json</a>
            <a href="1.21.json">1.21.json</a>
            <a href="1.20.4.json">1.20.4.json</a>
            <a href="1.21.1.json">1.21.1.json</a>
        "#;
        assert_eq!(latest_listed_version(html).as_deref(), Some("1.21.1"));
    }

    #[test]
    fn missing_patch_sorts_as_zero() {
        let html = "1.20 1.20.6";
        assert_eq!(latest_listed_version(html).as_deref(), Some("1.20.6"));
    }

    #[test]
    fn empty_listing_yields_none() {
        assert_eq!(latest_listed_version("<html>no versions here</html>"), None);
    }
}
