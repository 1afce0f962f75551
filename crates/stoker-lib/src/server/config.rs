use std::path::PathBuf;

pub const SERVER_JAR: &str = "server.jar";
pub const SERVER_PROPERTIES: &str = "server.properties";

/// Static launch configuration for one supervised server.
///
/// Immutable after construction except `version`, which the provisioner fills
/// lazily with the resolved latest release when left unset.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Game version id; `None` means "latest release" at provisioning time.
    pub version: Option<String>,

    /// Initial heap size in MB (`-Xms`).
    pub min_memory_mb: u32,

    /// Soft heap ceiling in MB (`-XX:SoftMaxHeapSize`), emitted only when it
    /// differs from the hard maximum.
    pub soft_max_memory_mb: u32,

    /// Hard heap ceiling in MB (`-Xmx`).
    pub max_memory_mb: u32,

    /// Java executable used to launch the server.
    pub java_path: PathBuf,

    /// Working directory holding the jar, eula.txt and server.properties.
    pub install_dir: PathBuf,
}

impl ServerConfig {
    pub fn new(install_dir: impl Into<PathBuf>) -> Self {
        Self {
            version: None,
            min_memory_mb: 1024,
            soft_max_memory_mb: 2048,
            max_memory_mb: 2048,
            java_path: PathBuf::from("java"),
            install_dir: install_dir.into(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_java_path(mut self, java_path: impl Into<PathBuf>) -> Self {
        self.java_path = java_path.into();
        self
    }

    pub fn with_memory_mb(mut self, min: u32, soft_max: u32, max: u32) -> Self {
        self.min_memory_mb = min;
        self.soft_max_memory_mb = soft_max;
        self.max_memory_mb = max;
        self
    }

    /// Heap flags for the server JVM.
    pub fn jvm_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("-Xms{}M", self.min_memory_mb),
            format!("-Xmx{}M", self.max_memory_mb),
        ];
        if self.soft_max_memory_mb < self.max_memory_mb {
            args.push(format!("-XX:SoftMaxHeapSize={}M", self.soft_max_memory_mb));
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jvm_args_include_soft_max_only_when_lower() {
        let config = ServerConfig::new("/tmp/srv").with_memory_mb(512, 2048, 2048);
        assert_eq!(config.jvm_args(), vec!["-Xms512M", "-Xmx2048M"]);

        let config = ServerConfig::new("/tmp/srv").with_memory_mb(512, 1024, 2048);
        assert_eq!(
            config.jvm_args(),
            vec!["-Xms512M", "-Xmx2048M", "-XX:SoftMaxHeapSize=1024M"]
        );
    }
}
