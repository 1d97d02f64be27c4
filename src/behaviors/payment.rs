use super::*;

#[derive(Debug)]
pub(crate) struct PaymentGuard {
    click_listener: ListenerId,
}

impl PaymentGuard {
    pub(crate) fn install(page: &mut Page) -> Result<Option<Self>> {
        let Some(button) = page.dom.by_id("payment-button") else {
            return Ok(None);
        };

        let click_listener = page.add_event_listener(button, "click", false, |page, event| {
            let message = page.config.payment_confirm_message.clone();
            if !page.confirm(&message) {
                event.prevent_default();
                page.trace_line("[behavior] payment declined".into());
            }
            Ok(())
        });

        Ok(Some(Self { click_listener }))
    }

    pub(crate) fn detach(self, page: &mut Page) {
        page.remove_event_listener(self.click_listener);
    }
}
