use super::*;

#[derive(Debug)]
pub(crate) struct DateRangeConstraint {
    change_listener: ListenerId,
}

impl DateRangeConstraint {
    pub(crate) fn install(page: &mut Page) -> Result<Option<Self>> {
        let (Some(start), Some(end)) = (page.dom.by_id("start_date"), page.dom.by_id("end_date"))
        else {
            return Ok(None);
        };

        let today = page.today.format("%Y-%m-%d").to_string();
        page.dom.set_attr(start, "min", &today)?;

        let change_listener = page.add_event_listener(start, "change", false, move |page, _| {
            let start_value = page.dom.value(start)?;
            page.dom.set_attr(end, "min", &start_value)?;

            // ISO dates order the same as strings.
            let end_value = page.dom.value(end)?;
            if !end_value.is_empty() && end_value < start_value {
                page.dom.set_value(end, &start_value)?;
                page.trace_line(format!("[behavior] end_date clamped to {start_value}"));
            }
            Ok(())
        });

        Ok(Some(Self { change_listener }))
    }

    pub(crate) fn detach(self, page: &mut Page) {
        page.remove_event_listener(self.change_listener);
    }
}
