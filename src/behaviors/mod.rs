//! The DriveShare page behaviors.
//!
//! Each behavior is installed independently on `DOMContentLoaded`. A behavior
//! whose target elements are absent is skipped, so initialization succeeds on
//! every page. Installed behaviors keep the listener ids and timer handles
//! they own so [`Page::detach_behaviors`] can tear them down.

use super::*;

mod availability;
mod date_range;
mod dropdown;
mod flash;
mod payment;
mod validation;

pub use availability::AvailabilityResponse;
pub use dropdown::OutsideClickSubscription;

pub(crate) use availability::AvailabilityCheck;
pub(crate) use date_range::DateRangeConstraint;
pub(crate) use dropdown::DropdownToggle;
pub(crate) use flash::FlashMessages;
pub(crate) use payment::PaymentGuard;
pub(crate) use validation::ValidationGate;

/// The behaviors installed on a page.
#[derive(Debug, Default)]
pub struct PageBehaviors {
    pub(crate) dropdown: Option<DropdownToggle>,
    pub(crate) flash: Option<FlashMessages>,
    pub(crate) date_range: Option<DateRangeConstraint>,
    pub(crate) availability: Option<AvailabilityCheck>,
    pub(crate) payment: Option<PaymentGuard>,
    pub(crate) validation: Option<ValidationGate>,
}

impl PageBehaviors {
    pub(crate) fn initialize(page: &mut Page) -> Result<Self> {
        let behaviors = Self {
            dropdown: DropdownToggle::install(page)?,
            flash: FlashMessages::install(page)?,
            date_range: DateRangeConstraint::install(page)?,
            availability: AvailabilityCheck::install(page)?,
            payment: PaymentGuard::install(page)?,
            validation: ValidationGate::install(page)?,
        };
        let installed = behaviors.installed();
        tracing::debug!(behaviors = ?installed, "page behaviors initialized");
        page.trace_line(format!("[behavior] initialized {}", installed.join(",")));
        Ok(behaviors)
    }

    /// Names of the installed behaviors, in installation order.
    pub fn installed(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.dropdown.is_some() {
            out.push("dropdown");
        }
        if self.flash.is_some() {
            out.push("flash");
        }
        if self.date_range.is_some() {
            out.push("date_range");
        }
        if self.availability.is_some() {
            out.push("availability");
        }
        if self.payment.is_some() {
            out.push("payment");
        }
        if self.validation.is_some() {
            out.push("validation");
        }
        out
    }

    pub fn is_installed(&self, name: &str) -> bool {
        self.installed().contains(&name)
    }

    /// Alerts picked up by the flash scan, connected or not.
    pub fn tracked_alerts(&self) -> Vec<NodeId> {
        self.flash
            .as_ref()
            .map(FlashMessages::alerts)
            .unwrap_or_default()
    }

    pub(crate) fn detach(&mut self, page: &mut Page) {
        if let Some(mut dropdown) = self.dropdown.take() {
            dropdown.detach(page);
        }
        if let Some(flash) = self.flash.take() {
            flash.detach(page);
        }
        if let Some(date_range) = self.date_range.take() {
            date_range.detach(page);
        }
        if let Some(availability) = self.availability.take() {
            availability.detach(page);
        }
        if let Some(payment) = self.payment.take() {
            payment.detach(page);
        }
        if let Some(validation) = self.validation.take() {
            validation.detach(page);
        }
        page.trace_line("[behavior] detached".into());
    }
}
