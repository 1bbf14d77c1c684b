//! The browser automation capability the workflow is written against.
//!
//! Implementations wrap a real browser (see `platforms::chromium`) or an
//! in-memory page in tests. Every method is a single round-trip: waiting,
//! retrying and fallbacks live in the layers above.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Account;
use crate::errors::AutomationError;
use crate::selector::Selector;

/// Opaque handle to an element previously returned by [`AutomationDriver::find_all`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(String);

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ElementRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Argument passed to [`AutomationDriver::execute_script`]; scripts see them as `arguments[i]`.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArg {
    Element(ElementRef),
}

impl From<&ElementRef> for ScriptArg {
    fn from(element: &ElementRef) -> Self {
        ScriptArg::Element(element.clone())
    }
}

/// Interface for browser automation backends
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    /// All elements currently attached to the document that match `selector`, in document order.
    async fn find_all(&self, selector: &Selector) -> Result<Vec<ElementRef>, AutomationError>;

    /// Rendered and not hidden, as opposed to merely attached.
    async fn is_visible(&self, element: &ElementRef) -> Result<bool, AutomationError>;

    /// Direct UI click. Fails when the element is occluded or not yet interactable.
    async fn click(&self, element: &ElementRef) -> Result<(), AutomationError>;

    async fn type_text(&self, element: &ElementRef, text: &str) -> Result<(), AutomationError>;

    /// Run a script body (may `return` a value) with positional `arguments`.
    async fn execute_script(
        &self,
        script: &str,
        args: &[ScriptArg],
    ) -> Result<Value, AutomationError>;

    async fn read_text(&self, element: &ElementRef) -> Result<String, AutomationError>;

    /// Serialized markup of the current document.
    async fn current_document_text(&self) -> Result<String, AutomationError>;

    async fn refresh(&self) -> Result<(), AutomationError>;

    /// PNG bytes of the current viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, AutomationError>;

    /// Shut the browser down and destroy transient resources. Called exactly once per session.
    async fn close(&self) -> Result<(), AutomationError>;
}

/// Opens one fresh, exclusively owned driver per account.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self, account: &Account) -> Result<Box<dyn AutomationDriver>, AutomationError>;
}
