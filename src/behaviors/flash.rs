use super::*;

#[derive(Debug, Default)]
struct FlashTimers {
    fade: Option<TimerHandle>,
    removal: Option<TimerHandle>,
}

impl FlashTimers {
    fn take_all(&mut self) -> Vec<TimerHandle> {
        self.fade.take().into_iter().chain(self.removal.take()).collect()
    }
}

#[derive(Debug)]
struct FlashMessage {
    alert: NodeId,
    timers: Rc<RefCell<FlashTimers>>,
    close_listener: Option<ListenerId>,
}

/// Alerts found at initialization. Alerts inserted later are not tracked.
#[derive(Debug)]
pub(crate) struct FlashMessages {
    messages: Vec<FlashMessage>,
}

impl FlashMessages {
    pub(crate) fn install(page: &mut Page) -> Result<Option<Self>> {
        let alerts = page.dom.query_selector_all(".alert")?;
        if alerts.is_empty() {
            return Ok(None);
        }

        let mut messages = Vec::with_capacity(alerts.len());
        for alert in alerts {
            messages.push(Self::track(page, alert)?);
        }
        Ok(Some(Self { messages }))
    }

    fn track(page: &mut Page, alert: NodeId) -> Result<FlashMessage> {
        let timers = Rc::new(RefCell::new(FlashTimers::default()));
        let dismiss_after_ms = page.config.dismiss_after_ms;
        let fade_out_ms = page.config.fade_out_ms;

        let fade_timers = Rc::clone(&timers);
        let fade = page.schedule_after(dismiss_after_ms, "flash-fade", move |page| {
            fade_timers.borrow_mut().fade = None;
            if !page.dom.is_connected(alert) {
                return Ok(());
            }
            page.dom.style_set(alert, "opacity", "0")?;

            let removal_timers = Rc::clone(&fade_timers);
            let removal = page.schedule_after(fade_out_ms, "flash-remove", move |page| {
                removal_timers.borrow_mut().removal = None;
                if page.dom.is_connected(alert) {
                    page.dom.remove_node(alert)?;
                    let label = page.trace_node_label(alert);
                    page.trace_line(format!("[behavior] flash dismissed {label}"));
                }
                Ok(())
            });
            fade_timers.borrow_mut().removal = Some(removal);
            Ok(())
        });
        timers.borrow_mut().fade = Some(fade);

        let close_listener = match page.dom.query_selector_from(alert, ".close")? {
            Some(close) => {
                let close_timers = Rc::clone(&timers);
                Some(page.add_event_listener(close, "click", false, move |page, _| {
                    let pending = close_timers.borrow_mut().take_all();
                    for handle in pending {
                        page.cancel_timer(handle);
                    }
                    page.dom.remove_node(alert)?;
                    let label = page.trace_node_label(alert);
                    page.trace_line(format!("[behavior] flash closed {label}"));
                    Ok(())
                }))
            }
            None => None,
        };

        Ok(FlashMessage {
            alert,
            timers,
            close_listener,
        })
    }

    pub(crate) fn alerts(&self) -> Vec<NodeId> {
        self.messages.iter().map(|message| message.alert).collect()
    }

    pub(crate) fn detach(self, page: &mut Page) {
        for message in self.messages {
            if let Some(listener) = message.close_listener {
                page.remove_event_listener(listener);
            }
            let pending = message.timers.borrow_mut().take_all();
            for handle in pending {
                page.cancel_timer(handle);
            }
        }
    }
}
