//! Automation driver seam.
//!
//! The orchestrator never talks to a browser directly; it consumes the
//! primitives below. A driver owns the shared [`ControlFlow`] queue, resolves
//! locators to element handles, runs scripts on the page, and grabs viewport
//! screenshots. Implementations typically adapt a WebDriver or DevTools
//! client.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::flow::ControlFlow;
use crate::geometry::{Point, RectSize};

/// Strategy for locating an element on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Locator {
    /// CSS selector (e.g. `button.primary`)
    Css(String),
    /// XPath expression
    XPath(String),
    /// `id` attribute
    Id(String),
    /// `name` attribute
    Name(String),
    /// Exact visible text
    Text(String),
}

impl Locator {
    /// Create a CSS selector locator
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create an XPath locator
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::XPath(expression.into())
    }

    /// Create an id locator
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    /// Create a name-attribute locator
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Create a visible-text locator
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={}", s),
            Locator::XPath(s) => write!(f, "xpath={}", s),
            Locator::Id(s) => write!(f, "id={}", s),
            Locator::Name(s) => write!(f, "name={}", s),
            Locator::Text(s) => write!(f, "text={}", s),
        }
    }
}

/// Result type for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Error types for driver operations
#[derive(Debug)]
pub enum DriverError {
    /// A locator matched no element
    NoSuchElement(String),
    /// Script execution failed on the page
    Script(String),
    /// Viewport size could not be read or applied
    Viewport(String),
    /// A screenshot could not be taken
    Screenshot(String),
    /// I/O error talking to the browser
    Io(std::io::Error),
}

impl std::fmt::Display for DriverError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverError::NoSuchElement(locator) => {
                write!(f, "No element matched locator: {}", locator)
            }
            DriverError::Script(msg) => write!(f, "Script error: {}", msg),
            DriverError::Viewport(msg) => write!(f, "Viewport error: {}", msg),
            DriverError::Screenshot(msg) => write!(f, "Screenshot error: {}", msg),
            DriverError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DriverError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DriverError {
    fn from(err: std::io::Error) -> Self {
        DriverError::Io(err)
    }
}

impl From<crate::flow::FlowInterrupted> for DriverError {
    fn from(err: crate::flow::FlowInterrupted) -> Self {
        DriverError::Io(std::io::Error::other(err.to_string()))
    }
}

/// A live element on the page.
///
/// Handles are resolved by [`Driver::find_element`] and stay bound to the
/// element for their lifetime. All operations are direct calls; queueing is
/// the responsibility of the layer above (see [`crate::wrapper`]).
pub trait ElementHandle: Send + Sync {
    /// Rendered size of the element
    fn size(&self) -> DriverResult<RectSize>;

    /// Location of the element's top-left corner in page coordinates
    fn location(&self) -> DriverResult<Point>;

    /// Click the element
    fn click(&self) -> DriverResult<()>;

    /// Type text into the element
    fn send_keys(&self, text: &str) -> DriverResult<()>;

    /// Visible text content
    fn text(&self) -> DriverResult<String>;

    /// Value of an attribute, if present
    fn attribute(&self, name: &str) -> DriverResult<Option<String>>;
}

/// Browser automation driver.
pub trait Driver: Send + Sync {
    /// The cooperative task queue all operations against this driver share
    fn control_flow(&self) -> Arc<ControlFlow>;

    /// Resolve a locator to the first matching element
    ///
    /// Fails with [`DriverError::NoSuchElement`] when nothing matches.
    fn find_element(&self, locator: &Locator) -> DriverResult<Arc<dyn ElementHandle>>;

    /// Resolve a locator to all matching elements (possibly empty)
    fn find_elements(&self, locator: &Locator) -> DriverResult<Vec<Arc<dyn ElementHandle>>>;

    /// Run a script on the page and return its JSON-ish result
    fn execute_script(&self, script: &str) -> DriverResult<serde_json::Value>;

    /// Current viewport size
    fn viewport_size(&self) -> DriverResult<RectSize>;

    /// Resize the viewport
    fn set_viewport_size(&self, size: RectSize) -> DriverResult<()>;

    /// PNG screenshot of the current viewport
    fn take_screenshot(&self) -> DriverResult<Vec<u8>>;

    /// Current page title
    fn title(&self) -> DriverResult<String>;
}
