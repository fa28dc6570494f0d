//! Checkpoint-capable driver and element wrappers.
//!
//! Explicit opt-in: construct a [`CheckedDriver`] from a driver handle and a
//! [`Vision`] clone, and every element it hands out carries a `check`
//! capability bound to that orchestrator. Nothing global is touched; code
//! that keeps using the raw driver sees no change.
//!
//! Wrapping adds capability only. A [`CheckedElement`] proxies the native
//! operations as queued units of work on the driver's own task queue, so
//! wrapped and unwrapped actions interleave in submission order.

use std::sync::Arc;
use std::time::Duration;

use crate::driver::{Driver, DriverError, ElementHandle, Locator};
use crate::engine::types::MatchResult;
use crate::flow::TaskHandle;
use crate::geometry::{Point, RectSize};
use crate::vision::{Vision, VisionResult};

/// Driver wrapper whose elements carry checkpoint capability
#[derive(Clone)]
pub struct CheckedDriver {
    driver: Arc<dyn Driver>,
    vision: Vision,
}

impl CheckedDriver {
    /// Wrap a driver; elements it returns check against `vision`
    pub fn new(driver: Arc<dyn Driver>, vision: Vision) -> Self {
        Self { driver, vision }
    }

    /// A lazy handle for the first element the locator matches.
    ///
    /// The locator is resolved inside each queued action, so a handle can be
    /// created before the element exists on the page.
    pub fn element(&self, locator: Locator) -> CheckedElement {
        CheckedElement {
            target: Target::Deferred {
                locator,
                driver: Arc::clone(&self.driver),
            },
            vision: self.vision.clone(),
        }
    }

    /// Resolve a locator now, wrapping every match.
    ///
    /// Runs as one queued unit of work; an empty result is not an error.
    pub fn elements(&self, locator: Locator) -> TaskHandle<Result<Vec<CheckedElement>, DriverError>> {
        let driver = Arc::clone(&self.driver);
        let vision = self.vision.clone();
        self.driver.control_flow().execute(move || {
            let handles = driver.find_elements(&locator)?;
            Ok(handles
                .into_iter()
                .map(|handle| CheckedElement::wrap(handle, vision.clone()))
                .collect())
        })
    }

    /// The wrapped driver
    pub fn raw(&self) -> &Arc<dyn Driver> {
        &self.driver
    }
}

/// What a [`CheckedElement`] is bound to
enum Target {
    /// Already resolved to a live handle
    Resolved(Arc<dyn ElementHandle>),
    /// Resolved against the driver on each queued action
    Deferred {
        locator: Locator,
        driver: Arc<dyn Driver>,
    },
}

/// An element handle with an attached checkpoint capability.
///
/// Native operations behave exactly as on the raw handle; they are merely
/// scheduled as units of work on the shared queue. `check` submits the
/// element's rendered region to the owning orchestrator.
pub struct CheckedElement {
    target: Target,
    vision: Vision,
}

impl CheckedElement {
    /// Attach checkpoint capability to an already-resolved handle
    pub fn wrap(handle: Arc<dyn ElementHandle>, vision: Vision) -> Self {
        Self {
            target: Target::Resolved(handle),
            vision,
        }
    }

    /// Submit this element's rendered region as a checkpoint
    pub fn check(
        &self,
        tag: Option<&str>,
        match_timeout: Option<Duration>,
    ) -> TaskHandle<VisionResult<MatchResult>> {
        match &self.target {
            Target::Resolved(handle) => {
                self.vision
                    .check_region_by_element(Arc::clone(handle), tag, match_timeout)
            }
            Target::Deferred { locator, .. } => {
                self.vision
                    .check_region_by(locator.clone(), tag, match_timeout)
            }
        }
    }

    /// Click the element
    pub fn click(&self) -> TaskHandle<Result<(), DriverError>> {
        self.run(|element| element.click())
    }

    /// Type text into the element
    pub fn send_keys(&self, text: &str) -> TaskHandle<Result<(), DriverError>> {
        let text = text.to_string();
        self.run(move |element| element.send_keys(&text))
    }

    /// Rendered size of the element
    pub fn size(&self) -> TaskHandle<Result<RectSize, DriverError>> {
        self.run(|element| element.size())
    }

    /// Location of the element's top-left corner
    pub fn location(&self) -> TaskHandle<Result<Point, DriverError>> {
        self.run(|element| element.location())
    }

    /// Visible text content
    pub fn text(&self) -> TaskHandle<Result<String, DriverError>> {
        self.run(|element| element.text())
    }

    /// Value of an attribute, if present
    pub fn attribute(&self, name: &str) -> TaskHandle<Result<Option<String>, DriverError>> {
        let name = name.to_string();
        self.run(move |element| element.attribute(&name))
    }

    /// Schedule one native operation, resolving the target first when lazy
    fn run<T, F>(&self, operation: F) -> TaskHandle<Result<T, DriverError>>
    where
        F: FnOnce(&dyn ElementHandle) -> Result<T, DriverError> + Send + 'static,
        T: Send + 'static,
    {
        match &self.target {
            Target::Resolved(handle) => {
                let handle = Arc::clone(handle);
                // Resolved handles ride the queue bound at open; before any
                // open there is no queue, so the operation runs in place.
                match self.vision.bound_flow() {
                    Some(flow) => flow.execute(move || operation(handle.as_ref())),
                    None => TaskHandle::ready(operation(handle.as_ref())),
                }
            }
            Target::Deferred { locator, driver } => {
                let locator = locator.clone();
                let driver_for_task = Arc::clone(driver);
                driver.control_flow().execute(move || {
                    let handle = driver_for_task.find_element(&locator)?;
                    operation(handle.as_ref())
                })
            }
        }
    }
}
