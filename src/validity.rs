use super::*;

use fancy_regex::Regex;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct InputValidity {
    pub(crate) valid: bool,
    pub(crate) value_missing: bool,
    pub(crate) type_mismatch: bool,
    pub(crate) pattern_mismatch: bool,
    pub(crate) too_long: bool,
    pub(crate) too_short: bool,
    pub(crate) range_underflow: bool,
    pub(crate) range_overflow: bool,
    pub(crate) bad_input: bool,
}

impl InputValidity {
    fn settle(mut self) -> Self {
        self.valid = !(self.value_missing
            || self.type_mismatch
            || self.pattern_mismatch
            || self.too_long
            || self.too_short
            || self.range_underflow
            || self.range_overflow
            || self.bad_input);
        self
    }
}

pub(crate) fn is_form_control(dom: &Dom, node: NodeId) -> bool {
    dom.element(node).is_some_and(|element| {
        ["input", "select", "textarea", "button"]
            .iter()
            .any(|tag| element.is_tag(tag))
    })
}

fn input_supports_required(kind: &str) -> bool {
    !matches!(
        kind,
        "hidden" | "range" | "color" | "button" | "submit" | "reset" | "image"
    )
}

fn input_participates_in_constraint_validation(kind: &str) -> bool {
    !matches!(kind, "hidden" | "button" | "submit" | "reset" | "image")
}

fn is_simple_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty() && !domain.is_empty() && !domain.contains('@')
}

impl Page {
    /// The form owner of a control: its `form` attribute target, otherwise
    /// the nearest ancestor `<form>`.
    pub(crate) fn resolve_form_owner(&self, node: NodeId) -> Option<NodeId> {
        if let Some(form_id) = self.dom.attr(node, "form") {
            return self
                .dom
                .by_id(&form_id)
                .filter(|form| self.dom.is_tag(*form, "form"));
        }
        self.dom.find_ancestor_by_tag(node, "form")
    }

    pub(crate) fn form_controls(&self, form: NodeId) -> Result<Vec<NodeId>> {
        if !self.dom.is_tag(form, "form") {
            return Err(Error::Runtime(format!(
                "{} is not a form",
                self.trace_node_label(form)
            )));
        }
        Ok(self
            .dom
            .descendant_elements(self.dom.root)
            .into_iter()
            .filter(|node| is_form_control(&self.dom, *node))
            .filter(|node| self.resolve_form_owner(*node) == Some(form))
            .collect())
    }

    /// Disabled directly or through an ancestor `<fieldset disabled>`.
    pub(crate) fn is_effectively_disabled(&self, node: NodeId) -> bool {
        if self.dom.disabled(node) {
            return true;
        }
        let mut cursor = self.dom.parent(node);
        while let Some(current) = cursor {
            if self.dom.is_tag(current, "fieldset") && self.dom.disabled(current) {
                return true;
            }
            cursor = self.dom.parent(current);
        }
        false
    }

    pub(crate) fn is_submit_control(&self, node: NodeId) -> bool {
        if self.dom.is_tag(node, "button") {
            let kind = self
                .dom
                .attr(node, "type")
                .map(|kind| kind.to_ascii_lowercase())
                .unwrap_or_else(|| "submit".into());
            return kind == "submit";
        }
        matches!(self.dom.input_type(node).as_deref(), Some("submit" | "image"))
    }

    fn parse_attr_i64(&self, node: NodeId, name: &str) -> Option<i64> {
        self.dom.attr(node, name)?.trim().parse::<i64>().ok()
    }

    fn is_radio_group_checked(&self, node: NodeId) -> bool {
        let name = self.dom.attr(node, "name").unwrap_or_default();
        if name.is_empty() {
            return self.dom.checked(node).unwrap_or(false);
        }
        let owner = self.resolve_form_owner(node);
        self.dom.descendant_elements(self.dom.root).into_iter().any(|other| {
            self.dom.input_type(other).as_deref() == Some("radio")
                && self.dom.attr(other, "name").as_deref() == Some(name.as_str())
                && self.resolve_form_owner(other) == owner
                && self.dom.checked(other).unwrap_or(false)
        })
    }

    pub(crate) fn compute_input_validity(&self, node: NodeId) -> Result<InputValidity> {
        let mut validity = InputValidity {
            valid: true,
            ..InputValidity::default()
        };

        if self.is_effectively_disabled(node) {
            return Ok(validity);
        }

        let Some(element) = self.dom.element(node) else {
            return Ok(validity);
        };

        if element.is_tag("textarea") {
            let value = self.dom.value(node)?;
            if self.dom.required(node) && !self.dom.readonly(node) && value.is_empty() {
                validity.value_missing = true;
            }
            if !value.is_empty() {
                self.check_length(node, &value, &mut validity);
            }
            return Ok(validity.settle());
        }

        if element.is_tag("select") {
            if self.dom.required(node) && self.dom.value(node)?.is_empty() {
                validity.value_missing = true;
            }
            return Ok(validity.settle());
        }

        let Some(input_type) = self.dom.input_type(node) else {
            return Ok(validity);
        };
        if !input_participates_in_constraint_validation(&input_type) {
            return Ok(validity);
        }

        let value = self.dom.value(node)?;
        if self.dom.required(node)
            && !self.dom.readonly(node)
            && input_supports_required(&input_type)
        {
            validity.value_missing = match input_type.as_str() {
                "checkbox" => !self.dom.checked(node)?,
                "radio" => !self.is_radio_group_checked(node),
                _ => value.is_empty(),
            };
        }

        if value.is_empty() {
            return Ok(validity.settle());
        }

        match input_type.as_str() {
            "email" => validity.type_mismatch = !is_simple_email(&value),
            "url" => validity.type_mismatch = url::Url::parse(&value).is_err(),
            _ => {}
        }

        if matches!(
            input_type.as_str(),
            "text" | "search" | "url" | "tel" | "email" | "password"
        ) {
            self.check_length(node, &value, &mut validity);
            if let Some(pattern) = self.dom.attr(node, "pattern").filter(|p| !p.is_empty()) {
                // An uncompilable pattern is ignored, as browsers do.
                if let Ok(regex) = Regex::new(&format!("^(?:{pattern})$")) {
                    if let Ok(false) = regex.is_match(&value) {
                        validity.pattern_mismatch = true;
                    }
                }
            }
        }

        if input_type == "date" {
            match parse_date_input_value(&value) {
                Some(date) => {
                    let bound = |name: &str| {
                        self.dom
                            .attr(node, name)
                            .and_then(|raw| parse_date_input_value(&raw))
                    };
                    if bound("min").is_some_and(|min| date < min) {
                        validity.range_underflow = true;
                    }
                    if bound("max").is_some_and(|max| date > max) {
                        validity.range_overflow = true;
                    }
                }
                None => validity.bad_input = true,
            }
        }

        if input_type == "number" {
            match value.trim().parse::<f64>() {
                Ok(number) => {
                    let bound = |name: &str| {
                        self.dom
                            .attr(node, name)
                            .and_then(|raw| raw.trim().parse::<f64>().ok())
                    };
                    if bound("min").is_some_and(|min| number < min) {
                        validity.range_underflow = true;
                    }
                    if bound("max").is_some_and(|max| number > max) {
                        validity.range_overflow = true;
                    }
                }
                Err(_) => validity.bad_input = true,
            }
        }

        Ok(validity.settle())
    }

    fn check_length(&self, node: NodeId, value: &str, validity: &mut InputValidity) {
        let value_len = value.chars().count() as i64;
        if let Some(min_len) = self.parse_attr_i64(node, "minlength") {
            if min_len >= 0 && value_len < min_len {
                validity.too_short = true;
            }
        }
        if let Some(max_len) = self.parse_attr_i64(node, "maxlength") {
            if max_len >= 0 && value_len > max_len {
                validity.too_long = true;
            }
        }
    }

    /// `HTMLFormElement.checkValidity()`: fires a non-bubbling, cancelable
    /// `invalid` event at every invalid control.
    pub(crate) fn check_form_validity(&mut self, form: NodeId) -> Result<bool> {
        let mut all_valid = true;
        for control in self.form_controls(form)? {
            if self.compute_input_validity(control)?.valid {
                continue;
            }
            all_valid = false;
            self.dispatch_event_with_options(control, "invalid", false, true)?;
        }
        Ok(all_valid)
    }

    pub(crate) fn form_data_entries(&self, form: NodeId) -> Result<Vec<(String, String)>> {
        let mut out = Vec::new();
        for control in self.form_controls(form)? {
            if self.is_effectively_disabled(control) {
                continue;
            }
            let name = self.dom.attr(control, "name").unwrap_or_default();
            if name.is_empty() || self.dom.is_tag(control, "button") {
                continue;
            }
            match self.dom.input_type(control).as_deref() {
                Some("submit" | "image" | "button" | "reset") => continue,
                Some("checkbox" | "radio") => {
                    if !self.dom.checked(control)? {
                        continue;
                    }
                    let value = self
                        .dom
                        .attr(control, "value")
                        .unwrap_or_else(|| "on".into());
                    out.push((name, value));
                }
                _ => out.push((name, self.dom.value(control)?)),
            }
        }
        Ok(out)
    }
}
