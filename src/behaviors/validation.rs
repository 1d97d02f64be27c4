use super::*;

const VALIDATED_CLASS: &str = "was-validated";

/// Submit gate for every `form.needs-validation` on the page.
#[derive(Debug)]
pub(crate) struct ValidationGate {
    submit_listeners: Vec<ListenerId>,
}

impl ValidationGate {
    pub(crate) fn install(page: &mut Page) -> Result<Option<Self>> {
        let forms = page.dom.query_selector_all("form.needs-validation")?;
        if forms.is_empty() {
            return Ok(None);
        }

        let submit_listeners = forms
            .into_iter()
            .map(|form| {
                page.add_event_listener(form, "submit", false, move |page, event| {
                    if !page.check_form_validity(form)? {
                        event.prevent_default();
                        event.stop_propagation();
                        let label = page.trace_node_label(form);
                        page.trace_line(format!("[behavior] submit canceled, invalid form={label}"));
                    }
                    page.dom.class_add(form, VALIDATED_CLASS)
                })
            })
            .collect();

        Ok(Some(Self { submit_listeners }))
    }

    pub(crate) fn detach(self, page: &mut Page) {
        for listener in self.submit_listeners {
            page.remove_event_listener(listener);
        }
    }
}
