use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// Process-wide settings the analysis engine reads while loading classpaths.
///
/// Module file contexts call [`EngineEnvironment::configure_platform_home`]
/// before they touch any classpath, so an implementation must be idempotent.
pub trait EngineEnvironment: Send + Sync + fmt::Debug {
    fn configure_platform_home(&self, home: &Path);
}

static PLATFORM_HOME: OnceLock<PathBuf> = OnceLock::new();

/// Records the platform home once for the lifetime of the process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessEnvironment;

impl ProcessEnvironment {
    pub fn platform_home() -> Option<&'static Path> {
        PLATFORM_HOME.get().map(PathBuf::as_path)
    }
}

impl EngineEnvironment for ProcessEnvironment {
    fn configure_platform_home(&self, home: &Path) {
        let stored = PLATFORM_HOME.get_or_init(|| {
            debug!(home = %home.display(), "platform home configured");
            home.to_path_buf()
        });
        if stored != home {
            debug!(
                configured = %stored.display(),
                requested = %home.display(),
                "platform home already set for this process"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_home_is_fixed_after_first_configuration() {
        let environment = ProcessEnvironment;
        environment.configure_platform_home(Path::new("/opt/jdk-21"));
        environment.configure_platform_home(Path::new("/opt/jdk-17"));
        assert_eq!(ProcessEnvironment::platform_home(), Some(Path::new("/opt/jdk-21")));
    }
}
