use std::cell::Cell;

use serde::Deserialize;

use super::*;

/// Body of `GET /bookings/api/check-availability`.
///
/// The server reports bad parameters or an unknown car as
/// `{"available": false, "error": "..."}`. `available` must be a JSON
/// boolean; any other type fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AvailabilityResponse {
    #[serde(default)]
    pub available: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AvailabilityState {
    MissingDates,
    Available,
    Unavailable,
    Failed,
}

impl AvailabilityState {
    fn markup(self, config: &PageConfig) -> String {
        let (class, message) = match self {
            Self::MissingDates => ("alert-warning", &config.missing_dates_message),
            Self::Available => ("alert-success", &config.available_message),
            Self::Unavailable => ("alert-danger", &config.unavailable_message),
            Self::Failed => ("alert-danger", &config.availability_error_message),
        };
        format!(r#"<div class="alert {class}">{message}</div>"#)
    }
}

pub(crate) fn availability_url(endpoint: &str, car_id: &str, start: &str, end: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("car_id", car_id)
        .append_pair("start_date", start)
        .append_pair("end_date", end)
        .finish();
    format!("{endpoint}?{query}")
}

#[derive(Debug)]
pub(crate) struct AvailabilityCheck {
    submit_listener: ListenerId,
    token: Rc<Cell<u64>>,
}

impl AvailabilityCheck {
    pub(crate) fn install(page: &mut Page) -> Result<Option<Self>> {
        let (Some(form), Some(result)) = (
            page.dom.by_id("availability-form"),
            page.dom.by_id("availability-result"),
        ) else {
            return Ok(None);
        };

        let token = Rc::new(Cell::new(0u64));
        let listener_token = Rc::clone(&token);
        let submit_listener = page.add_event_listener(form, "submit", false, move |page, event| {
            event.prevent_default();

            // Taken before validation so an older in-flight answer cannot
            // overwrite the warning.
            let request = listener_token.get() + 1;
            listener_token.set(request);

            let car_id = field_value(page, form, "car_id")?;
            let start_date = field_value(page, form, "start_date")?;
            let end_date = field_value(page, form, "end_date")?;

            if start_date.is_empty() || end_date.is_empty() {
                return render(page, result, AvailabilityState::MissingDates);
            }

            let url = availability_url(
                &page.config.availability_endpoint,
                &car_id,
                &start_date,
                &end_date,
            );
            let settle_token = Rc::clone(&listener_token);
            let request_url = url.clone();
            page.fetch_text(&url, move |page, outcome| {
                let current = settle_token.get();
                if current != request {
                    page.trace_line(format!(
                        "[fetch] discard stale availability response token={request} current={current}"
                    ));
                    return Ok(());
                }

                let decoded = outcome.and_then(|body| {
                    serde_json::from_str::<AvailabilityResponse>(&body).map_err(|err| {
                        FetchError::InvalidBody {
                            url: request_url.clone(),
                            message: err.to_string(),
                        }
                    })
                });

                match decoded {
                    Ok(response) => {
                        if let Some(reason) = &response.error {
                            tracing::warn!(url = %request_url, reason = %reason, "availability check reported an error");
                            page.trace_line(format!("[fetch] availability server error: {reason}"));
                        }
                        let state = if response.available {
                            AvailabilityState::Available
                        } else {
                            AvailabilityState::Unavailable
                        };
                        render(page, result, state)
                    }
                    Err(err) => {
                        tracing::error!(url = %request_url, error = %err, "availability check failed");
                        page.console_error(format!("Error: {err}"));
                        render(page, result, AvailabilityState::Failed)
                    }
                }
            });
            Ok(())
        });

        Ok(Some(Self {
            submit_listener,
            token,
        }))
    }

    /// In-flight responses are discarded once detached.
    pub(crate) fn detach(self, page: &mut Page) {
        page.remove_event_listener(self.submit_listener);
        self.token.set(self.token.get() + 1);
    }
}

/// Raw value of the form's `[name=...]` control; a missing control reads as "".
fn field_value(page: &Page, form: NodeId, name: &str) -> Result<String> {
    match page
        .dom
        .query_selector_from(form, &format!(r#"[name="{name}"]"#))?
    {
        Some(control) => page.dom.value(control),
        None => Ok(String::new()),
    }
}

fn render(page: &mut Page, result: NodeId, state: AvailabilityState) -> Result<()> {
    let markup = state.markup(&page.config);
    page.dom.set_inner_html(result, &markup)?;
    page.trace_line(format!("[behavior] availability rendered {state:?}"));
    Ok(())
}
