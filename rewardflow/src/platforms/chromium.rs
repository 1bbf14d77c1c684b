//! Chrome DevTools Protocol backend.
//!
//! Elements are addressed through a `data-rewardflow-ref` attribute stamped
//! onto every node `find_all` returns, so later calls can find them again
//! with a plain attribute selector.

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::BrowserOptions;
use crate::config::Account;
use crate::driver::{AutomationDriver, ElementRef, ScriptArg, SessionFactory};
use crate::errors::AutomationError;
use crate::selector::Selector;

const REF_ATTRIBUTE: &str = "data-rewardflow-ref";

const DEFAULT_ARGS: &[&str] = &[
    "--disable-extensions",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--hide-scrollbars",
    "--force-device-scale-factor=1",
    "--lang=en-US",
];

/// Launches one Chrome process with a throwaway profile per account.
pub struct ChromiumSessionFactory {
    options: BrowserOptions,
}

impl ChromiumSessionFactory {
    pub fn new(options: BrowserOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessionFactory {
    async fn open(&self, account: &Account) -> Result<Box<dyn AutomationDriver>, AutomationError> {
        let profile = tempfile::Builder::new()
            .prefix("rewardflow-profile-")
            .tempdir()
            .map_err(|e| {
                AutomationError::PlatformError(format!("creating profile directory: {e}"))
            })?;

        let (width, height) = self.options.window_size;
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .window_size(width, height)
            .no_sandbox();
        if self.options.headed {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.options.executable {
            builder = builder.chrome_executable(executable);
        }
        for arg in DEFAULT_ARGS
            .iter()
            .map(|a| a.to_string())
            .chain(self.options.extra_args.iter().cloned())
        {
            builder = builder.arg(arg);
        }
        let config = builder
            .build()
            .map_err(|e| AutomationError::PlatformError(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AutomationError::PlatformError(format!("launching browser: {e}")))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("chromiumoxide handler event error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(AutomationError::PlatformError(format!("opening tab: {e}")));
            }
        };

        info!(
            account = %account.identifier,
            profile = %profile.path().display(),
            "Browser launched"
        );
        Ok(Box::new(ChromiumDriver {
            browser: Mutex::new(Some(browser)),
            page,
            handler_task,
            profile: Mutex::new(Some(profile)),
        }))
    }
}

pub struct ChromiumDriver {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler_task: JoinHandle<()>,
    profile: Mutex<Option<TempDir>>,
}

impl ChromiumDriver {
    async fn eval(&self, expression: String) -> Result<Value, AutomationError> {
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|e| AutomationError::ScriptError(e.to_string()))?;
        Ok(result.into_value::<Value>().unwrap_or(Value::Null))
    }

    async fn lookup(&self, element: &ElementRef) -> Result<chromiumoxide::Element, AutomationError> {
        self.page
            .find_element(ref_selector(element))
            .await
            .map_err(|e| AutomationError::ElementDetached(format!("{element}: {e}")))
    }

    async fn find_all_inner(&self, selector: &Selector) -> Result<Vec<ElementRef>, AutomationError> {
        let mut indices = Vec::new();
        let mut base = selector;
        while let Selector::Nth { inner, index } = base {
            indices.push(*index);
            base = inner.as_ref();
        }

        let query = match base {
            Selector::Nth { .. } => {
                return Err(AutomationError::Internal("unexpected nth layer".to_string()))
            }
            Selector::Invalid(reason) => {
                return Err(AutomationError::InvalidSelector(reason.clone()))
            }
            Selector::Css(css) => css_query(css),
            Selector::ClassName(class) => css_query(&format!(".{class}")),
            Selector::XPath(xpath) => xpath_query(xpath),
            Selector::LinkText(text) => xpath_query(&format!(
                "//a[normalize-space(.)={}]",
                xpath_literal(text)
            )),
            Selector::PartialLinkText(text) => xpath_query(&format!(
                "//a[contains(normalize-space(.), {})]",
                xpath_literal(text)
            )),
            Selector::Text(text) => xpath_query(&format!(
                "//*[contains(text(), {})]",
                xpath_literal(text)
            )),
        };

        let prefix = js_string(&uuid::Uuid::new_v4().to_string());
        let attr = js_string(REF_ATTRIBUTE);
        let script = format!(
            r#"(() => {{
                const nodes = {query};
                return nodes.map((el, i) => {{
                    let id = el.getAttribute({attr});
                    if (!id) {{
                        id = {prefix} + '-' + i;
                        el.setAttribute({attr}, id);
                    }}
                    return id;
                }});
            }})()"#
        );
        let value = self.eval(script).await?;
        let ids: Vec<String> = serde_json::from_value(value)
            .map_err(|e| AutomationError::ScriptError(format!("unexpected lookup result: {e}")))?;
        let mut found: Vec<ElementRef> = ids.into_iter().map(ElementRef::new).collect();
        for index in indices.into_iter().rev() {
            found = found.into_iter().nth(index).into_iter().collect();
        }
        Ok(found)
    }
}

#[async_trait]
impl AutomationDriver for ChromiumDriver {
    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| AutomationError::NavigationFailed(format!("{url}: {e}")))
    }

    async fn find_all(&self, selector: &Selector) -> Result<Vec<ElementRef>, AutomationError> {
        self.find_all_inner(selector).await
    }

    async fn is_visible(&self, element: &ElementRef) -> Result<bool, AutomationError> {
        let script = format!(
            r#"(() => {{
                const el = {lookup};
                if (!el) return null;
                const style = window.getComputedStyle(el);
                return style.display !== 'none' && style.visibility !== 'hidden' && el.offsetParent !== null;
            }})()"#,
            lookup = js_lookup(element)
        );
        match self.eval(script).await? {
            Value::Bool(visible) => Ok(visible),
            _ => Err(AutomationError::ElementDetached(element.to_string())),
        }
    }

    async fn click(&self, element: &ElementRef) -> Result<(), AutomationError> {
        let node = self.lookup(element).await?;
        node.click()
            .await
            .map(|_| ())
            .map_err(|e| AutomationError::ElementObscured(format!("{element}: {e}")))
    }

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<(), AutomationError> {
        let node = self.lookup(element).await?;
        node.click()
            .await
            .map_err(|e| AutomationError::ElementObscured(format!("{element}: {e}")))?;
        node.type_str(text)
            .await
            .map(|_| ())
            .map_err(|e| AutomationError::PlatformError(format!("typing into {element}: {e}")))
    }

    async fn execute_script(
        &self,
        script: &str,
        args: &[ScriptArg],
    ) -> Result<Value, AutomationError> {
        let args = args
            .iter()
            .map(|ScriptArg::Element(element)| js_lookup(element))
            .collect::<Vec<_>>()
            .join(", ");
        self.eval(format!("(function() {{ {script} }}).apply(null, [{args}])"))
            .await
    }

    async fn read_text(&self, element: &ElementRef) -> Result<String, AutomationError> {
        let script = format!(
            "(() => {{ const el = {}; return el ? el.innerText : null; }})()",
            js_lookup(element)
        );
        match self.eval(script).await? {
            Value::String(text) => Ok(text),
            _ => Err(AutomationError::ElementDetached(element.to_string())),
        }
    }

    async fn current_document_text(&self) -> Result<String, AutomationError> {
        self.page
            .content()
            .await
            .map_err(|e| AutomationError::PlatformError(format!("reading page source: {e}")))
    }

    async fn refresh(&self) -> Result<(), AutomationError> {
        self.page
            .reload()
            .await
            .map(|_| ())
            .map_err(|e| AutomationError::NavigationFailed(format!("reload: {e}")))
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AutomationError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page
            .screenshot(params)
            .await
            .map_err(|e| AutomationError::PlatformError(format!("screenshot failed: {e}")))
    }

    async fn close(&self) -> Result<(), AutomationError> {
        let browser = self.browser.lock().await.take();
        let Some(mut browser) = browser else {
            return Err(AutomationError::SessionClosed(
                "browser already closed".to_string(),
            ));
        };
        if let Err(e) = browser.close().await {
            warn!(error = %e, "Browser did not close cleanly");
        }
        if let Err(e) = browser.wait().await {
            warn!(error = %e, "Waiting for browser exit failed");
        }
        self.handler_task.abort();

        if let Some(profile) = self.profile.lock().await.take() {
            let path = profile.path().display().to_string();
            match profile.close() {
                Ok(()) => debug!(profile = %path, "Removed browser profile"),
                Err(e) => warn!(profile = %path, error = %e, "Failed to remove browser profile"),
            }
        }
        Ok(())
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

fn ref_selector(element: &ElementRef) -> String {
    format!("[{REF_ATTRIBUTE}=\"{}\"]", element.as_str())
}

fn js_lookup(element: &ElementRef) -> String {
    format!("document.querySelector({})", js_string(&ref_selector(element)))
}

/// JSON string literals are valid JavaScript string literals.
fn js_string(s: &str) -> String {
    Value::String(s.to_string()).to_string()
}

fn css_query(css: &str) -> String {
    format!("Array.from(document.querySelectorAll({}))", js_string(css))
}

fn xpath_query(xpath: &str) -> String {
    format!(
        r#"(() => {{
            const snapshot = document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
            const out = [];
            for (let i = 0; i < snapshot.snapshotLength; i++) out.push(snapshot.snapshotItem(i));
            return out.filter((n) => n.nodeType === Node.ELEMENT_NODE);
        }})()"#,
        js_string(xpath)
    )
}

/// Quote `s` as an XPath 1.0 string literal, which has no escape sequences.
fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts = s
            .split('\'')
            .map(|part| format!("'{part}'"))
            .collect::<Vec<_>>()
            .join(", \"'\", ");
        format!("concat({parts})")
    }
}
