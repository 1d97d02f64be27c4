use driveshare_page::{Page, PageConfig, Result};
use tracing_subscriber::EnvFilter;

const CAR_PAGE_HTML: &str = r#"
<div class="car-detail" id="car-42">
  <h2 id="car-name">Toyota Corolla</h2>
  <form id="availability-form">
    <input type="hidden" name="car_id" value="42">
    <input type="date" id="check-start" name="start_date">
    <input type="date" id="check-end" name="end_date">
    <button type="submit" id="check">Check availability</button>
  </form>
  <div id="availability-result"></div>
</div>
"#;

const ENDPOINT: &str = "/bookings/api/check-availability";
const JULY_QUERY: &str =
    "/bookings/api/check-availability?car_id=42&start_date=2025-07-01&end_date=2025-07-05";

const WARNING: &str =
    r#"<div class="alert alert-warning">Please select both start and end dates.</div>"#;
const AVAILABLE: &str =
    r#"<div class="alert alert-success">This car is available for the selected dates!</div>"#;
const UNAVAILABLE: &str =
    r#"<div class="alert alert-danger">Sorry, this car is not available for the selected dates.</div>"#;
const FAILED: &str =
    r#"<div class="alert alert-danger">Error checking availability. Please try again.</div>"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn car_page() -> Result<Page> {
    init_tracing();
    let mut page = Page::from_html(CAR_PAGE_HTML)?;
    page.set_trace_stderr(false);
    Ok(page)
}

fn pick_dates(page: &mut Page, start: &str, end: &str) -> Result<()> {
    page.change_value("#check-start", start)?;
    page.change_value("#check-end", end)
}

#[test]
fn missing_start_date_renders_warning_without_request() -> Result<()> {
    let mut page = car_page()?;
    page.change_value("#check-end", "2025-07-05")?;

    page.submit("#availability-form")?;
    assert_eq!(page.inner_html("#availability-result")?, WARNING);
    assert!(page.take_fetch_calls().is_empty());
    Ok(())
}

#[test]
fn missing_end_date_renders_warning_without_request() -> Result<()> {
    let mut page = car_page()?;
    page.change_value("#check-start", "2025-07-01")?;

    page.click("#check")?;
    assert_eq!(page.inner_html("#availability-result")?, WARNING);
    assert!(page.take_fetch_calls().is_empty());
    assert!(page.take_form_submissions().is_empty());
    Ok(())
}

#[test]
fn available_car_renders_success() -> Result<()> {
    let mut page = car_page()?;
    page.set_fetch_mock(JULY_QUERY, r#"{"available": true}"#);
    pick_dates(&mut page, "2025-07-01", "2025-07-05")?;

    page.click("#check")?;
    assert_eq!(page.take_fetch_calls(), vec![JULY_QUERY]);
    assert_eq!(page.inner_html("#availability-result")?, AVAILABLE);
    page.assert_text(
        "#availability-result",
        "This car is available for the selected dates!",
    )?;
    assert!(page.take_form_submissions().is_empty());
    Ok(())
}

#[test]
fn unavailable_car_renders_danger() -> Result<()> {
    let mut page = car_page()?;
    page.set_fetch_mock(JULY_QUERY, r#"{"available": false}"#);
    pick_dates(&mut page, "2025-07-01", "2025-07-05")?;

    page.submit("#availability-form")?;
    assert_eq!(page.inner_html("#availability-result")?, UNAVAILABLE);
    assert!(page.take_console_errors().is_empty());
    Ok(())
}

#[test]
fn network_failure_renders_error_and_logs_it() -> Result<()> {
    let mut page = car_page()?;
    page.set_fetch_failure(JULY_QUERY, "connection refused");
    pick_dates(&mut page, "2025-07-01", "2025-07-05")?;

    page.submit("#availability-form")?;
    assert_eq!(page.inner_html("#availability-result")?, FAILED);
    assert_eq!(
        page.take_console_errors(),
        vec![format!(
            "Error: network request to {JULY_QUERY} failed: connection refused"
        )]
    );
    Ok(())
}

#[test]
fn malformed_body_renders_error() -> Result<()> {
    let mut page = car_page()?;
    page.set_fetch_mock(JULY_QUERY, "<html>502 Bad Gateway</html>");
    pick_dates(&mut page, "2025-07-01", "2025-07-05")?;

    page.submit("#availability-form")?;
    assert_eq!(page.inner_html("#availability-result")?, FAILED);
    let errors = page.take_console_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].starts_with("Error: invalid response body from"));
    Ok(())
}

#[test]
fn unmocked_request_renders_error() -> Result<()> {
    let mut page = car_page()?;
    pick_dates(&mut page, "2025-07-01", "2025-07-05")?;

    page.submit("#availability-form")?;
    assert_eq!(page.inner_html("#availability-result")?, FAILED);
    assert_eq!(
        page.take_console_errors(),
        vec![format!("Error: fetch mock not found for request: {JULY_QUERY}")]
    );
    Ok(())
}

#[test]
fn server_reported_error_renders_unavailable_and_is_traced() -> Result<()> {
    let mut page = car_page()?;
    page.enable_trace(true);
    page.set_fetch_mock(ENDPOINT, r#"{"available": false, "error": "Car not found"}"#);
    pick_dates(&mut page, "2025-07-01", "2025-07-05")?;

    page.submit("#availability-form")?;
    assert_eq!(page.inner_html("#availability-result")?, UNAVAILABLE);
    let logs = page.take_trace_logs();
    assert!(
        logs.iter()
            .any(|line| line.contains("availability server error: Car not found"))
    );
    assert!(page.take_console_errors().is_empty());
    Ok(())
}

#[test]
fn missing_available_field_reads_as_unavailable() -> Result<()> {
    let mut page = car_page()?;
    page.set_fetch_mock(JULY_QUERY, "{}");
    pick_dates(&mut page, "2025-07-01", "2025-07-05")?;

    page.submit("#availability-form")?;
    assert_eq!(page.inner_html("#availability-result")?, UNAVAILABLE);
    Ok(())
}

#[test]
fn non_boolean_available_is_an_invalid_body() -> Result<()> {
    for body in [r#"{"available": 1}"#, r#"{"available": "yes"}"#] {
        let mut page = car_page()?;
        page.set_fetch_mock(JULY_QUERY, body);
        pick_dates(&mut page, "2025-07-01", "2025-07-05")?;

        page.submit("#availability-form")?;
        assert_eq!(page.inner_html("#availability-result")?, FAILED);
        let errors = page.take_console_errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Error: invalid response body from"));
    }
    Ok(())
}

#[test]
fn query_values_are_percent_encoded() -> Result<()> {
    let mut page = Page::from_html(
        r#"
        <form id="availability-form">
          <input name="car_id" value="4 2&amp;x=1">
          <input name="start_date" value="2025-07-01">
          <input name="end_date" value="2025-07-05">
        </form>
        <div id="availability-result"></div>
        "#,
    )?;
    page.set_fetch_mock(ENDPOINT, r#"{"available": true}"#);

    page.submit("#availability-form")?;
    assert_eq!(
        page.take_fetch_calls(),
        vec![
            "/bookings/api/check-availability?car_id=4+2%26x%3D1&start_date=2025-07-01&end_date=2025-07-05"
        ]
    );
    assert_eq!(page.inner_html("#availability-result")?, AVAILABLE);
    Ok(())
}

#[test]
fn missing_car_field_reads_as_empty() -> Result<()> {
    let mut page = Page::from_html(
        r#"
        <form id="availability-form">
          <input name="start_date" type="date" value="2025-07-01">
          <input name="end_date" type="date" value="2025-07-05">
        </form>
        <div id="availability-result"></div>
        "#,
    )?;
    page.set_fetch_mock(ENDPOINT, r#"{"available": false, "error": "Missing required parameters"}"#);

    page.submit("#availability-form")?;
    assert_eq!(
        page.take_fetch_calls(),
        vec!["/bookings/api/check-availability?car_id=&start_date=2025-07-01&end_date=2025-07-05"]
    );
    assert_eq!(page.inner_html("#availability-result")?, UNAVAILABLE);
    Ok(())
}

#[test]
fn stale_response_is_discarded() -> Result<()> {
    let mut page = car_page()?;
    page.enable_trace(true);
    let first = JULY_QUERY;
    let second =
        "/bookings/api/check-availability?car_id=42&start_date=2025-08-01&end_date=2025-08-03";
    page.set_fetch_mock_with_latency(first, r#"{"available": false}"#, 300);
    page.set_fetch_mock_with_latency(second, r#"{"available": true}"#, 100);

    pick_dates(&mut page, "2025-07-01", "2025-07-05")?;
    page.submit("#availability-form")?;
    pick_dates(&mut page, "2025-08-01", "2025-08-03")?;
    page.submit("#availability-form")?;
    assert_eq!(page.pending_fetches(), 2);
    assert_eq!(page.inner_html("#availability-result")?, "");

    page.advance_time(100)?;
    assert_eq!(page.inner_html("#availability-result")?, AVAILABLE);

    page.advance_time(200)?;
    assert_eq!(page.inner_html("#availability-result")?, AVAILABLE);
    assert_eq!(page.pending_fetches(), 0);
    let logs = page.take_trace_logs();
    assert!(
        logs.iter()
            .any(|line| line.contains("discard stale availability response token=1 current=2"))
    );
    Ok(())
}

#[test]
fn warning_is_not_overwritten_by_an_older_response() -> Result<()> {
    let mut page = car_page()?;
    page.set_fetch_mock_with_latency(JULY_QUERY, r#"{"available": true}"#, 50);
    pick_dates(&mut page, "2025-07-01", "2025-07-05")?;
    page.submit("#availability-form")?;

    page.change_value("#check-start", "")?;
    page.submit("#availability-form")?;
    assert_eq!(page.inner_html("#availability-result")?, WARNING);

    page.flush()?;
    assert_eq!(page.inner_html("#availability-result")?, WARNING);
    Ok(())
}

#[test]
fn result_replaces_previous_content() -> Result<()> {
    let mut page = car_page()?;
    page.set_fetch_mock(JULY_QUERY, r#"{"available": true}"#);

    page.submit("#availability-form")?;
    assert_eq!(page.inner_html("#availability-result")?, WARNING);

    pick_dates(&mut page, "2025-07-01", "2025-07-05")?;
    page.submit("#availability-form")?;
    assert_eq!(page.inner_html("#availability-result")?, AVAILABLE);
    assert_eq!(page.dump_dom("#availability-result")?.matches("alert ").count(), 1);
    Ok(())
}

#[test]
fn custom_endpoint_and_messages_come_from_config() -> Result<()> {
    let config = PageConfig {
        availability_endpoint: "/v2/availability".into(),
        available_message: "Free on those days.".into(),
        ..PageConfig::default()
    };
    let mut page = Page::from_html_with_config(CAR_PAGE_HTML, config)?;
    page.set_fetch_mock("/v2/availability", r#"{"available": true}"#);
    pick_dates(&mut page, "2025-07-01", "2025-07-05")?;

    page.submit("#availability-form")?;
    assert_eq!(
        page.take_fetch_calls(),
        vec!["/v2/availability?car_id=42&start_date=2025-07-01&end_date=2025-07-05"]
    );
    assert_eq!(
        page.inner_html("#availability-result")?,
        r#"<div class="alert alert-success">Free on those days.</div>"#
    );
    Ok(())
}

#[test]
fn detaching_discards_in_flight_responses() -> Result<()> {
    let mut page = car_page()?;
    page.set_fetch_mock_with_latency(JULY_QUERY, r#"{"available": true}"#, 20);
    pick_dates(&mut page, "2025-07-01", "2025-07-05")?;
    page.submit("#availability-form")?;

    page.detach_behaviors();
    page.flush()?;
    assert_eq!(page.inner_html("#availability-result")?, "");
    assert_eq!(page.pending_fetches(), 0);

    page.submit("#availability-form")?;
    assert_eq!(page.take_fetch_calls().len(), 1);
    assert_eq!(page.take_form_submissions().len(), 1);
    Ok(())
}
