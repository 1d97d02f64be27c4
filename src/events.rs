use super::*;

pub(crate) type ListenerCallback = Rc<dyn Fn(&mut Page, &mut EventState) -> Result<()>>;

/// Registration handle returned when a listener is added; used to remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Clone)]
pub(crate) struct Listener {
    pub(crate) id: ListenerId,
    pub(crate) capture: bool,
    pub(crate) callback: ListenerCallback,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("capture", &self.capture)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub(crate) struct ListenerStore {
    map: HashMap<NodeId, HashMap<String, Vec<Listener>>>,
    next_id: u64,
}

impl ListenerStore {
    pub(crate) fn add(
        &mut self,
        node_id: NodeId,
        event: &str,
        capture: bool,
        callback: ListenerCallback,
    ) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.map
            .entry(node_id)
            .or_default()
            .entry(event.to_string())
            .or_default()
            .push(Listener {
                id,
                capture,
                callback,
            });
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let mut emptied_node = None;
        let mut removed = false;
        for (node_id, events) in self.map.iter_mut() {
            let mut emptied_event = None;
            for (event, listeners) in events.iter_mut() {
                if let Some(pos) = listeners.iter().position(|listener| listener.id == id) {
                    listeners.remove(pos);
                    removed = true;
                    if listeners.is_empty() {
                        emptied_event = Some(event.clone());
                    }
                    break;
                }
            }
            if let Some(event) = emptied_event {
                events.remove(&event);
                if events.is_empty() {
                    emptied_node = Some(*node_id);
                }
            }
            if removed {
                break;
            }
        }
        if let Some(node_id) = emptied_node {
            self.map.remove(&node_id);
        }
        removed
    }

    pub(crate) fn get(&self, node_id: NodeId, event: &str, capture: bool) -> Vec<Listener> {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .map(|listeners| {
                listeners
                    .iter()
                    .filter(|listener| listener.capture == capture)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn is_registered(&self, id: ListenerId) -> bool {
        self.map
            .values()
            .flat_map(HashMap::values)
            .flatten()
            .any(|listener| listener.id == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.map
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventPhase {
    Capturing,
    AtTarget,
    Bubbling,
}

#[derive(Debug, Clone)]
pub(crate) struct EventState {
    pub(crate) event_type: String,
    pub(crate) target: NodeId,
    pub(crate) current_target: NodeId,
    pub(crate) phase: EventPhase,
    pub(crate) bubbles: bool,
    pub(crate) cancelable: bool,
    pub(crate) default_prevented: bool,
    pub(crate) propagation_stopped: bool,
}

impl EventState {
    pub(crate) fn new(event_type: &str, target: NodeId) -> Self {
        Self {
            event_type: event_type.to_string(),
            target,
            current_target: target,
            phase: EventPhase::AtTarget,
            bubbles: true,
            cancelable: true,
            default_prevented: false,
            propagation_stopped: false,
        }
    }

    pub(crate) fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    pub(crate) fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub(crate) fn outcome(&self) -> EventOutcome {
        EventOutcome {
            default_prevented: self.default_prevented,
            propagation_stopped: self.propagation_stopped,
        }
    }
}

/// What happened to an event dispatched through [`Page::dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventOutcome {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
}

impl Page {
    pub(crate) fn add_event_listener<F>(
        &mut self,
        node: NodeId,
        event: &str,
        capture: bool,
        callback: F,
    ) -> ListenerId
    where
        F: Fn(&mut Page, &mut EventState) -> Result<()> + 'static,
    {
        let id = self.listeners.add(node, event, capture, Rc::new(callback));
        let label = self.trace_node_label(node);
        self.trace_event_line(format!(
            "[event] listen {event} node={label} capture={capture} id={}",
            id.0
        ));
        id
    }

    pub(crate) fn remove_event_listener(&mut self, id: ListenerId) -> bool {
        let removed = self.listeners.remove(id);
        self.trace_event_line(format!("[event] unlisten id={} removed={removed}", id.0));
        removed
    }

    pub(crate) fn dispatch_event(&mut self, target: NodeId, event_type: &str) -> Result<EventState> {
        let event = EventState::new(event_type, target);
        self.dispatch_prepared_event(event)
    }

    pub(crate) fn dispatch_event_with_options(
        &mut self,
        target: NodeId,
        event_type: &str,
        bubbles: bool,
        cancelable: bool,
    ) -> Result<EventState> {
        let mut event = EventState::new(event_type, target);
        event.bubbles = bubbles;
        event.cancelable = cancelable;
        self.dispatch_prepared_event(event)
    }

    pub(crate) fn dispatch_prepared_event(&mut self, mut event: EventState) -> Result<EventState> {
        let target = event.target;
        self.run_in_task_context(|this| {
            // Path is fixed before any listener runs.
            let mut path = Vec::new();
            let mut cursor = Some(target);
            while let Some(node) = cursor {
                path.push(node);
                cursor = this.dom.parent(node);
            }
            path.reverse();

            // Capture phase.
            for node in &path[..path.len() - 1] {
                event.phase = EventPhase::Capturing;
                event.current_target = *node;
                this.invoke_listeners(*node, &mut event, true)?;
                if event.propagation_stopped {
                    this.trace_event_done(&event, "propagation_stopped");
                    return Ok(());
                }
            }

            // Target phase: capture listeners first.
            event.phase = EventPhase::AtTarget;
            event.current_target = target;
            this.invoke_listeners(target, &mut event, true)?;
            if event.propagation_stopped {
                this.trace_event_done(&event, "propagation_stopped");
                return Ok(());
            }

            // Target phase: bubble listeners.
            this.invoke_listeners(target, &mut event, false)?;
            if event.propagation_stopped {
                this.trace_event_done(&event, "propagation_stopped");
                return Ok(());
            }

            // Bubble phase.
            if event.bubbles {
                for node in path[..path.len() - 1].iter().rev() {
                    event.phase = EventPhase::Bubbling;
                    event.current_target = *node;
                    this.invoke_listeners(*node, &mut event, false)?;
                    if event.propagation_stopped {
                        this.trace_event_done(&event, "propagation_stopped");
                        return Ok(());
                    }
                }
            }

            this.trace_event_done(&event, "completed");
            Ok(())
        })?;
        Ok(event)
    }

    fn invoke_listeners(
        &mut self,
        node_id: NodeId,
        event: &mut EventState,
        capture: bool,
    ) -> Result<()> {
        let listeners = self.listeners.get(node_id, &event.event_type, capture);
        for listener in listeners {
            // A listener removed by an earlier one in the same pass is skipped.
            if !self.listeners.is_registered(listener.id) {
                continue;
            }
            if self.trace_state.accepts(TraceCategory::Event) {
                let target_label = self.trace_node_label(event.target);
                let current_label = self.trace_node_label(event.current_target);
                self.trace_event_line(format!(
                    "[event] {} target={} current={} phase={:?} capture={} default_prevented={}",
                    event.event_type,
                    target_label,
                    current_label,
                    event.phase,
                    capture,
                    event.default_prevented
                ));
            }
            (listener.callback)(self, event)?;
        }
        Ok(())
    }

    fn trace_event_done(&mut self, event: &EventState, outcome: &str) {
        if !self.trace_state.accepts(TraceCategory::Event) {
            return;
        }
        let target_label = self.trace_node_label(event.target);
        let current_label = self.trace_node_label(event.current_target);
        self.trace_event_line(format!(
            "[event] done {} target={} current={} outcome={} default_prevented={} propagation_stopped={}",
            event.event_type,
            target_label,
            current_label,
            outcome,
            event.default_prevented,
            event.propagation_stopped
        ));
    }
}
