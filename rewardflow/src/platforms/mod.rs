use std::path::PathBuf;
use std::sync::Arc;

use crate::driver::SessionFactory;
use crate::errors::AutomationError;

/// Launch options shared by browser backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserOptions {
    /// Show the browser window instead of running headless
    pub headed: bool,
    /// Browser binary; the backend searches the usual locations when unset
    pub executable: Option<PathBuf>,
    pub window_size: (u32, u32),
    /// Extra command-line switches appended to the defaults
    pub extra_args: Vec<String>,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headed: false,
            executable: None,
            window_size: (1920, 1080),
            extra_args: Vec::new(),
        }
    }
}

#[cfg(feature = "chromium")]
pub mod chromium;

/// Create the session factory for the browser backend compiled into this build
pub fn create_session_factory(
    options: BrowserOptions,
) -> Result<Arc<dyn SessionFactory>, AutomationError> {
    #[cfg(feature = "chromium")]
    {
        Ok(Arc::new(chromium::ChromiumSessionFactory::new(options)))
    }
    #[cfg(not(feature = "chromium"))]
    {
        let _ = options;
        Err(AutomationError::PlatformError(
            "No browser backend compiled in; enable the `chromium` feature".to_string(),
        ))
    }
}
