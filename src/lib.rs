//! Page runtime and UI behaviors for the DriveShare car-rental front end.
//!
//! A [`Page`] parses server-rendered markup into an in-memory DOM, runs the
//! DriveShare page behaviors on `DOMContentLoaded`, and is then driven through
//! user actions (`click`, `submit`, `change_value`), a virtual clock and mocked
//! platform services (fetch, confirm). Everything is deterministic.
//!
//! ```no_run
//! use driveshare_page::{Page, Result};
//!
//! fn main() -> Result<()> {
//!     let mut page = Page::from_html(r#"
//!         <form id="availability-form">
//!           <input name="car_id" value="42">
//!           <input type="date" name="start_date" value="2025-07-01">
//!           <input type="date" name="end_date" value="2025-07-05">
//!         </form>
//!         <div id="availability-result"></div>
//!     "#)?;
//!     page.set_fetch_mock(
//!         "/bookings/api/check-availability?car_id=42&start_date=2025-07-01&end_date=2025-07-05",
//!         r#"{"available": true}"#,
//!     );
//!     page.submit("#availability-form")?;
//!     page.assert_text(
//!         "#availability-result",
//!         "This car is available for the selected dates!",
//!     )?;
//!     Ok(())
//! }
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

use chrono::NaiveDate;

mod behaviors;
mod config;
mod dom;
mod events;
mod html;
mod page;
mod platform;
mod scheduler;
mod selector;
mod trace;
mod validity;

use dom::*;
use events::*;
use html::*;
use platform::*;
use scheduler::*;
use selector::*;
use trace::*;

pub use behaviors::{AvailabilityResponse, OutsideClickSubscription, PageBehaviors};
pub use config::PageConfig;
pub use dom::NodeId;
pub use events::{EventOutcome, ListenerId};
pub use page::Page;
pub use platform::{FetchError, FormSubmission, Navigation};
pub use scheduler::{PendingTimer, TimerHandle};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    Runtime(String),
    Config(String),
    SelectorNotFound(String),
    UnsupportedSelector(String),
    TypeMismatch {
        selector: String,
        expected: String,
        actual: String,
    },
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::Runtime(msg) => write!(f, "page runtime error: {msg}"),
            Self::Config(msg) => write!(f, "invalid page config: {msg}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::TypeMismatch {
                selector,
                expected,
                actual,
            } => write!(
                f,
                "type mismatch for {selector}: expected {expected}, actual {actual}"
            ),
            Self::AssertionFailed {
                selector,
                expected,
                actual,
                dom_snippet,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
            ),
        }
    }
}

impl StdError for Error {}

pub(crate) fn truncate_chars(value: &str, max_chars: usize) -> String {
    let mut it = value.chars();
    let mut out = String::new();
    for _ in 0..max_chars {
        let Some(ch) = it.next() else {
            return out;
        };
        out.push(ch);
    }
    if it.next().is_some() {
        out.push_str("...");
    }
    out
}
