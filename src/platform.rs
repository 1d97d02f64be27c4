use super::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FetchMock {
    Body { body: String, latency_ms: i64 },
    Failure { message: String, latency_ms: i64 },
}

impl FetchMock {
    fn latency_ms(&self) -> i64 {
        match self {
            Self::Body { latency_ms, .. } | Self::Failure { latency_ms, .. } => *latency_ms,
        }
    }
}

/// Why a mocked `fetch` did not produce a usable body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    NoMock { url: String },
    Network { url: String, message: String },
    InvalidBody { url: String, message: String },
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMock { url } => write!(f, "fetch mock not found for request: {url}"),
            Self::Network { url, message } => {
                write!(f, "network request to {url} failed: {message}")
            }
            Self::InvalidBody { url, message } => {
                write!(f, "invalid response body from {url}: {message}")
            }
        }
    }
}

impl StdError for FetchError {}

/// A link navigation requested by activating an `<a href>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub url: String,
}

/// A form submission that reached the network (its `submit` event was not
/// canceled).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormSubmission {
    pub form_id: Option<String>,
    pub action: String,
    pub method: String,
    pub entries: Vec<(String, String)>,
}

/// Scheduler label of a fetch response waiting on mock latency.
pub(crate) const FETCH_TASK_LABEL: &str = "fetch";

#[derive(Debug, Default)]
pub(crate) struct PlatformMockState {
    pub(crate) fetch_mocks: HashMap<String, FetchMock>,
    pub(crate) fetch_calls: Vec<String>,
    pub(crate) in_flight_fetches: usize,
    pub(crate) confirm_responses: VecDeque<bool>,
    pub(crate) default_confirm_response: bool,
    pub(crate) confirm_messages: Vec<String>,
    pub(crate) console_errors: Vec<String>,
    pub(crate) navigations: Vec<Navigation>,
    pub(crate) form_submissions: Vec<FormSubmission>,
}

impl PlatformMockState {
    /// Exact URL first, then the same URL without its query string.
    fn lookup_fetch_mock(&self, url: &str) -> Option<FetchMock> {
        if let Some(mock) = self.fetch_mocks.get(url) {
            return Some(mock.clone());
        }
        let (path, _) = url.split_once('?')?;
        self.fetch_mocks.get(path).cloned()
    }
}

impl Page {
    pub fn set_fetch_mock(&mut self, url: &str, body: &str) {
        self.set_fetch_mock_with_latency(url, body, 0);
    }

    /// Like [`Page::set_fetch_mock`], but the response settles on a timer
    /// `latency_ms` after the request instead of at the next microtask
    /// checkpoint.
    pub fn set_fetch_mock_with_latency(&mut self, url: &str, body: &str, latency_ms: i64) {
        self.platform.fetch_mocks.insert(
            url.to_string(),
            FetchMock::Body {
                body: body.to_string(),
                latency_ms: latency_ms.max(0),
            },
        );
    }

    pub fn set_fetch_failure(&mut self, url: &str, message: &str) {
        self.platform.fetch_mocks.insert(
            url.to_string(),
            FetchMock::Failure {
                message: message.to_string(),
                latency_ms: 0,
            },
        );
    }

    pub fn clear_fetch_mocks(&mut self) {
        self.platform.fetch_mocks.clear();
    }

    pub fn take_fetch_calls(&mut self) -> Vec<String> {
        std::mem::take(&mut self.platform.fetch_calls)
    }

    /// Requests issued whose response has not settled yet.
    pub fn pending_fetches(&self) -> usize {
        self.platform.in_flight_fetches
    }

    pub fn enqueue_confirm_response(&mut self, accepted: bool) {
        self.platform.confirm_responses.push_back(accepted);
    }

    pub fn set_default_confirm_response(&mut self, accepted: bool) {
        self.platform.default_confirm_response = accepted;
    }

    pub fn take_confirm_messages(&mut self) -> Vec<String> {
        std::mem::take(&mut self.platform.confirm_messages)
    }

    pub fn take_console_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.platform.console_errors)
    }

    pub fn take_navigations(&mut self) -> Vec<Navigation> {
        std::mem::take(&mut self.platform.navigations)
    }

    pub fn take_form_submissions(&mut self) -> Vec<FormSubmission> {
        std::mem::take(&mut self.platform.form_submissions)
    }

    /// Issues a GET for `url`. `on_settle` runs once the mocked response
    /// settles, as a microtask or as a timer task when the mock has latency.
    pub(crate) fn fetch_text<F>(&mut self, url: &str, on_settle: F)
    where
        F: FnOnce(&mut Page, std::result::Result<String, FetchError>) -> Result<()> + 'static,
    {
        self.platform.fetch_calls.push(url.to_string());
        self.platform.in_flight_fetches += 1;
        self.trace_line(format!("[fetch] request GET {url}"));

        let mock = self.platform.lookup_fetch_mock(url);
        let latency_ms = mock.as_ref().map_or(0, FetchMock::latency_ms);
        let outcome = match mock {
            Some(FetchMock::Body { body, .. }) => Ok(body),
            Some(FetchMock::Failure { message, .. }) => Err(FetchError::Network {
                url: url.to_string(),
                message,
            }),
            None => Err(FetchError::NoMock {
                url: url.to_string(),
            }),
        };

        let url = url.to_string();
        let settle = move |page: &mut Page| {
            page.platform.in_flight_fetches = page.platform.in_flight_fetches.saturating_sub(1);
            page.trace_line(format!(
                "[fetch] settle GET {url} ok={}",
                outcome.is_ok()
            ));
            on_settle(page, outcome)
        };

        if latency_ms > 0 {
            self.schedule_after(latency_ms, FETCH_TASK_LABEL, settle);
        } else {
            self.queue_microtask(settle);
        }
    }

    /// `window.confirm`: answers from the queue, then from the default.
    pub(crate) fn confirm(&mut self, message: &str) -> bool {
        self.platform.confirm_messages.push(message.to_string());
        let accepted = self
            .platform
            .confirm_responses
            .pop_front()
            .unwrap_or(self.platform.default_confirm_response);
        self.trace_line(format!("[behavior] confirm accepted={accepted}"));
        accepted
    }

    pub(crate) fn console_error(&mut self, message: String) {
        self.platform.console_errors.push(message);
    }
}
