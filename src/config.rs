use super::*;

/// Delays, endpoint and user-facing text used by the page behaviors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageConfig {
    /// Time an alert stays fully visible before it starts fading.
    pub dismiss_after_ms: i64,
    /// Time between the fade starting and the alert being removed.
    pub fade_out_ms: i64,
    pub availability_endpoint: String,
    pub payment_confirm_message: String,
    pub missing_dates_message: String,
    pub available_message: String,
    pub unavailable_message: String,
    pub availability_error_message: String,
    pub timer_step_limit: usize,
    /// Overrides the local calendar date used for `#start_date` constraints.
    pub today: Option<NaiveDate>,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            dismiss_after_ms: 5000,
            fade_out_ms: 500,
            availability_endpoint: "/bookings/api/check-availability".into(),
            payment_confirm_message: "Are you sure you want to proceed with this payment?".into(),
            missing_dates_message: "Please select both start and end dates.".into(),
            available_message: "This car is available for the selected dates!".into(),
            unavailable_message: "Sorry, this car is not available for the selected dates."
                .into(),
            availability_error_message: "Error checking availability. Please try again.".into(),
            timer_step_limit: 10_000,
            today: None,
        }
    }
}

impl PageConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dismiss_after_ms <= 0 {
            return Err(Error::Config(format!(
                "dismiss_after_ms must be positive, got {}",
                self.dismiss_after_ms
            )));
        }
        if self.fade_out_ms < 0 {
            return Err(Error::Config(format!(
                "fade_out_ms must not be negative, got {}",
                self.fade_out_ms
            )));
        }
        if self.availability_endpoint.is_empty() {
            return Err(Error::Config("availability_endpoint is empty".into()));
        }
        if !self.availability_endpoint.starts_with('/') {
            return Err(Error::Config(format!(
                "availability_endpoint must be an absolute path: {}",
                self.availability_endpoint
            )));
        }
        if self.timer_step_limit == 0 {
            return Err(Error::Config(
                "timer_step_limit requires at least 1 step".into(),
            ));
        }
        Ok(())
    }
}
