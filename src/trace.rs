use super::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TraceCategory {
    Event,
    Timer,
    /// Fetch, confirm, navigation and behavior lines; never filtered.
    Behavior,
}

/// Bounded in-memory log of what the page runtime did, off by default.
#[derive(Debug)]
pub(crate) struct TraceState {
    enabled: bool,
    events: bool,
    timers: bool,
    echo_to_stderr: bool,
    capacity: usize,
    lines: VecDeque<String>,
}

impl Default for TraceState {
    fn default() -> Self {
        Self {
            enabled: false,
            events: true,
            timers: true,
            echo_to_stderr: true,
            capacity: 10_000,
            lines: VecDeque::new(),
        }
    }
}

impl TraceState {
    pub(crate) fn accepts(&self, category: TraceCategory) -> bool {
        self.enabled
            && match category {
                TraceCategory::Event => self.events,
                TraceCategory::Timer => self.timers,
                TraceCategory::Behavior => true,
            }
    }

    fn record(&mut self, line: String) {
        if self.echo_to_stderr {
            eprintln!("{line}");
        }
        self.lines.push_back(line);
        self.shrink_to_capacity();
    }

    fn shrink_to_capacity(&mut self) {
        let excess = self.lines.len().saturating_sub(self.capacity);
        self.lines.drain(..excess);
    }
}

impl Page {
    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace_state.enabled = enabled;
    }

    /// Drains the recorded trace lines, oldest first.
    pub fn take_trace_logs(&mut self) -> Vec<String> {
        self.trace_state.lines.drain(..).collect()
    }

    /// Whether recorded lines are also printed to stderr (on by default).
    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.trace_state.echo_to_stderr = enabled;
    }

    pub fn set_trace_events(&mut self, enabled: bool) {
        self.trace_state.events = enabled;
    }

    pub fn set_trace_timers(&mut self, enabled: bool) {
        self.trace_state.timers = enabled;
    }

    /// Keeps at most `max_entries` lines, dropping the oldest.
    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::Runtime(
                "trace log limit must be at least 1 entry".into(),
            ));
        }
        self.trace_state.capacity = max_entries;
        self.trace_state.shrink_to_capacity();
        Ok(())
    }

    pub(crate) fn trace(&mut self, category: TraceCategory, line: String) {
        if self.trace_state.accepts(category) {
            self.trace_state.record(line);
        }
    }

    pub(crate) fn trace_event_line(&mut self, line: String) {
        self.trace(TraceCategory::Event, line);
    }

    pub(crate) fn trace_timer_line(&mut self, line: String) {
        self.trace(TraceCategory::Timer, line);
    }

    pub(crate) fn trace_line(&mut self, line: String) {
        self.trace(TraceCategory::Behavior, line);
    }

    /// `document`, `#id`, or the tag name of `node`.
    pub(crate) fn trace_node_label(&self, node: NodeId) -> String {
        if node == self.dom.root {
            return "document".into();
        }
        match (self.dom.attr(node, "id"), self.dom.tag_name(node)) {
            (Some(id), _) if !id.is_empty() => format!("#{id}"),
            (_, Some(tag)) => tag.to_string(),
            _ => format!("node-{}", node.0),
        }
    }
}
