use super::*;

const ACTIVE_CLASS: &str = "active";

/// Document-level click listener that closes a dropdown panel when a click
/// lands outside both the toggle and the panel.
#[derive(Debug)]
pub struct OutsideClickSubscription {
    listener: Option<ListenerId>,
    root: NodeId,
}

impl OutsideClickSubscription {
    pub fn attach(page: &mut Page, root: NodeId, toggle: NodeId, panel: NodeId) -> Self {
        let listener = page.add_event_listener(root, "click", false, move |page, event| {
            if page.dom.contains(toggle, event.target) || page.dom.contains(panel, event.target) {
                return Ok(());
            }
            if page.dom.class_contains(panel, ACTIVE_CLASS)? {
                page.dom.class_remove(panel, ACTIVE_CLASS)?;
                page.trace_line("[behavior] dropdown closed by outside click".into());
            }
            Ok(())
        });
        Self {
            listener: Some(listener),
            root,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn is_attached(&self) -> bool {
        self.listener.is_some()
    }

    /// Returns false when the subscription was already detached.
    pub fn detach(&mut self, page: &mut Page) -> bool {
        match self.listener.take() {
            Some(listener) => page.remove_event_listener(listener),
            None => false,
        }
    }
}

#[derive(Debug)]
pub(crate) struct DropdownToggle {
    toggle_listener: ListenerId,
    outside_click: OutsideClickSubscription,
}

impl DropdownToggle {
    pub(crate) fn install(page: &mut Page) -> Result<Option<Self>> {
        let toggle = page.dom.query_selector(".user-menu-toggle")?;
        let panel = page.dom.query_selector(".user-menu-dropdown")?;
        let (Some(toggle), Some(panel)) = (toggle, panel) else {
            return Ok(None);
        };

        let toggle_listener = page.add_event_listener(toggle, "click", false, move |page, _| {
            let active = page.dom.class_toggle(panel, ACTIVE_CLASS)?;
            page.trace_line(format!("[behavior] dropdown toggled active={active}"));
            Ok(())
        });
        let root = page.dom.root;
        let outside_click = OutsideClickSubscription::attach(page, root, toggle, panel);

        Ok(Some(Self {
            toggle_listener,
            outside_click,
        }))
    }

    pub(crate) fn detach(&mut self, page: &mut Page) {
        page.remove_event_listener(self.toggle_listener);
        self.outside_click.detach(page);
    }
}
