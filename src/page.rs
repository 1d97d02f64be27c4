use super::*;

/// A loaded DriveShare page.
///
/// Built from server-rendered markup, then driven through user actions, the
/// virtual clock and the platform mocks. Single-threaded: listeners and timer
/// callbacks run to completion on the caller's thread.
pub struct Page {
    pub(crate) dom: Dom,
    pub(crate) listeners: ListenerStore,
    pub(crate) scheduler: SchedulerState,
    pub(crate) platform: PlatformMockState,
    pub(crate) trace_state: TraceState,
    pub(crate) config: Rc<PageConfig>,
    pub(crate) today: NaiveDate,
    pub(crate) behaviors: Option<PageBehaviors>,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("nodes", &self.dom.nodes.len())
            .field("listeners", &self.listeners.len())
            .field("scheduler", &self.scheduler)
            .field("today", &self.today)
            .field("behaviors", &self.behaviors)
            .finish_non_exhaustive()
    }
}

impl Page {
    /// Parses `html` and runs the page behaviors on `DOMContentLoaded`.
    pub fn from_html(html: &str) -> Result<Self> {
        Self::from_html_with_config(html, PageConfig::default())
    }

    pub fn from_html_with_config(html: &str, config: PageConfig) -> Result<Self> {
        let mut page = Self::load(html, config)?;
        let root = page.dom.root;
        let loader = page.add_event_listener(root, "DOMContentLoaded", false, |page, _| {
            page.install_behaviors()
        });
        page.dispatch_event_with_options(root, "DOMContentLoaded", true, false)?;
        page.remove_event_listener(loader);
        Ok(page)
    }

    /// Parses `html` without installing any behavior; see
    /// [`Page::install_behaviors`].
    pub fn from_html_without_behaviors(html: &str) -> Result<Self> {
        Self::load(html, PageConfig::default())
    }

    fn load(html: &str, config: PageConfig) -> Result<Self> {
        config.validate()?;
        let dom = parse_html(html)?;
        let today = config
            .today
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        Ok(Self {
            dom,
            listeners: ListenerStore::default(),
            scheduler: SchedulerState::new(config.timer_step_limit),
            platform: PlatformMockState::default(),
            trace_state: TraceState::default(),
            config: Rc::new(config),
            today,
            behaviors: None,
        })
    }

    /// Installs the page behaviors once. Later calls are no-ops.
    pub fn install_behaviors(&mut self) -> Result<()> {
        if self.behaviors.is_some() {
            return Ok(());
        }
        let behaviors = PageBehaviors::initialize(self)?;
        self.behaviors = Some(behaviors);
        Ok(())
    }

    /// Removes every listener and cancels every timer the behaviors own.
    pub fn detach_behaviors(&mut self) {
        if let Some(mut behaviors) = self.behaviors.take() {
            behaviors.detach(self);
        }
    }

    pub fn behaviors(&self) -> Option<&PageBehaviors> {
        self.behaviors.as_ref()
    }

    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    /// Overrides the local calendar date seen by behaviors installed afterwards.
    pub fn set_today(&mut self, today: NaiveDate) {
        self.today = today;
    }

    pub fn document(&self) -> NodeId {
        self.dom.root
    }

    pub fn query(&self, selector: &str) -> Result<NodeId> {
        self.select_one(selector)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.click_node(target)
    }

    pub(crate) fn click_node(&mut self, target: NodeId) -> Result<()> {
        if self.is_effectively_disabled(target) {
            return Ok(());
        }

        self.run_in_task_context(|this| {
            let click = this.dispatch_event(target, "click")?;
            if click.default_prevented {
                return Ok(());
            }

            match this.dom.input_type(target).as_deref() {
                Some("checkbox") => {
                    let current = this.dom.checked(target)?;
                    this.dom.set_checked(target, !current)?;
                    this.dispatch_event(target, "input")?;
                    this.dispatch_event(target, "change")?;
                }
                Some("radio") if !this.dom.checked(target)? => {
                    this.dom.set_checked(target, true)?;
                    this.dispatch_event(target, "input")?;
                    this.dispatch_event(target, "change")?;
                }
                _ => {}
            }

            let anchor = if this.dom.is_tag(target, "a") {
                Some(target)
            } else {
                this.dom.find_ancestor_by_tag(target, "a")
            };
            if let Some(href) = anchor.and_then(|anchor| this.dom.attr(anchor, "href")) {
                this.trace_line(format!("[behavior] navigate {href}"));
                this.platform.navigations.push(Navigation { url: href });
                return Ok(());
            }

            if this.is_submit_control(target) {
                if let Some(form) = this.resolve_form_owner(target) {
                    this.request_form_submit(form)?;
                }
            }
            Ok(())
        })
    }

    /// `form.requestSubmit()` on the form at `selector` (or the form owning
    /// the control at `selector`).
    pub fn submit(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let form = if self.dom.is_tag(target, "form") {
            Some(target)
        } else {
            self.resolve_form_owner(target)
        };
        let Some(form) = form else {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "form or form control".into(),
                actual: self.dom.tag_name(target).unwrap_or("non-element").into(),
            });
        };
        self.run_in_task_context(|this| this.request_form_submit(form))
    }

    /// Interactive validation (unless `novalidate`), then the `submit` event.
    /// A submission that is not canceled is recorded.
    pub(crate) fn request_form_submit(&mut self, form: NodeId) -> Result<()> {
        if self.dom.attr(form, "novalidate").is_none() && !self.check_form_validity(form)? {
            let label = self.trace_node_label(form);
            self.trace_line(format!("[behavior] submit blocked by validation form={label}"));
            return Ok(());
        }

        let submit = self.dispatch_event(form, "submit")?;
        if submit.default_prevented {
            return Ok(());
        }

        let entries = self.form_data_entries(form)?;
        let method = self
            .dom
            .attr(form, "method")
            .map(|method| method.to_ascii_lowercase())
            .filter(|method| !method.is_empty())
            .unwrap_or_else(|| "get".into());
        self.platform.form_submissions.push(FormSubmission {
            form_id: self.dom.attr(form, "id").filter(|id| !id.is_empty()),
            action: self.dom.attr(form, "action").unwrap_or_default(),
            method,
            entries,
        });
        Ok(())
    }

    pub fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.is_effectively_disabled(target) || self.dom.readonly(target) {
            return Ok(());
        }

        let tag = self.control_tag(selector, target)?;
        if tag != "input" && tag != "textarea" {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input or textarea".into(),
                actual: tag,
            });
        }

        self.dom.set_value(target, text)?;
        self.dispatch_event(target, "input")?;
        Ok(())
    }

    /// Sets a control's value as a user would commit it: `input`, then `change`.
    pub fn change_value(&mut self, selector: &str, value: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        if self.is_effectively_disabled(target) || self.dom.readonly(target) {
            return Ok(());
        }

        let tag = self.control_tag(selector, target)?;
        if !matches!(tag.as_str(), "input" | "textarea" | "select") {
            return Err(Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "input, select or textarea".into(),
                actual: tag,
            });
        }

        self.run_in_task_context(|this| {
            this.dom.set_value(target, value)?;
            this.dispatch_event(target, "input")?;
            this.dispatch_event(target, "change")?;
            Ok(())
        })
    }

    /// Dispatches a bubbling, cancelable event of type `event` at `selector`.
    pub fn dispatch(&mut self, selector: &str, event: &str) -> Result<EventOutcome> {
        let target = self.select_one(selector)?;
        Ok(self.dispatch_event(target, event)?.outcome())
    }

    fn control_tag(&self, selector: &str, target: NodeId) -> Result<String> {
        self.dom
            .tag_name(target)
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| Error::TypeMismatch {
                selector: selector.to_string(),
                expected: "element".into(),
                actual: "non-element".into(),
            })
    }

    pub fn exists(&self, selector: &str) -> Result<bool> {
        Ok(self.dom.query_selector(selector)?.is_some())
    }

    pub fn text(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.text_content(target))
    }

    pub fn value(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.value(target)
    }

    pub fn attr(&self, selector: &str, name: &str) -> Result<Option<String>> {
        let target = self.select_one(selector)?;
        Ok(self.dom.attr(target, name))
    }

    pub fn has_class(&self, selector: &str, class_name: &str) -> Result<bool> {
        let target = self.select_one(selector)?;
        self.dom.class_contains(target, class_name)
    }

    /// Inline style property, `""` when unset. Accepts `camelCase` names.
    pub fn style(&self, selector: &str, property: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.style_get(target, property)
    }

    pub fn inner_html(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        self.dom.inner_html(target)
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.dump_node(target))
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.text_content(target);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_value(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.value(target)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_class(&self, selector: &str, class_name: &str, expected: bool) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.class_contains(target, class_name)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: format!("class {class_name} present={expected}"),
                actual: format!("class {class_name} present={actual}"),
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        let _ = self.select_one(selector)?;
        Ok(())
    }

    pub fn assert_missing(&self, selector: &str) -> Result<()> {
        if let Some(node) = self.dom.query_selector(selector)? {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: "no match".into(),
                actual: "element present".into(),
                dom_snippet: self.node_snippet(node),
            });
        }
        Ok(())
    }

    pub(crate) fn select_one(&self, selector: &str) -> Result<NodeId> {
        self.dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    pub(crate) fn node_snippet(&self, node_id: NodeId) -> String {
        truncate_chars(&self.dom.dump_node(node_id), 200)
    }
}
