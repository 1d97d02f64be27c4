use super::*;

/// Handle to a node of a page's DOM tree.
///
/// Ids stay valid after a node is removed from the document; a removed node is
/// simply no longer connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// Attributes plus the live state of form controls. `disabled`, `readonly`
/// and `required` are read straight from the attributes.
#[derive(Debug, Clone)]
pub(crate) struct Element {
    pub(crate) tag_name: String,
    pub(crate) attrs: BTreeMap<String, String>,
    value: String,
    checked: bool,
}

impl Element {
    fn new(tag_name: String, attrs: BTreeMap<String, String>) -> Self {
        Self {
            value: attrs.get("value").cloned().unwrap_or_default(),
            checked: attrs.contains_key("checked"),
            tag_name,
            attrs,
        }
    }

    pub(crate) fn is_tag(&self, tag: &str) -> bool {
        self.tag_name.eq_ignore_ascii_case(tag)
    }

    fn classes(&self) -> impl Iterator<Item = &str> {
        self.attrs
            .get("class")
            .map(String::as_str)
            .unwrap_or_default()
            .split_whitespace()
    }

    pub(crate) fn has_class(&self, class_name: &str) -> bool {
        self.classes().any(|class| class == class_name)
    }
}

/// Arena of nodes; index 0 is the document.
#[derive(Debug, Clone)]
pub(crate) struct Dom {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: NodeId,
}

impl Dom {
    pub(crate) fn new() -> Self {
        Self {
            nodes: vec![Node {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            root: NodeId(0),
        }
    }

    fn append(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: Some(parent),
            children: Vec::new(),
            kind,
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    pub(crate) fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: BTreeMap<String, String>,
    ) -> NodeId {
        self.append(parent, NodeKind::Element(Element::new(tag_name, attrs)))
    }

    pub(crate) fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.append(parent, NodeKind::Text(text))
    }

    pub(crate) fn element(&self, node: NodeId) -> Option<&Element> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(node.0)?.kind {
            NodeKind::Element(element) => Some(element),
            _ => None,
        }
    }

    /// `what` names the DOM API in the error, e.g. `classList`.
    fn require_element(&self, node: NodeId, what: &str) -> Result<&Element> {
        self.element(node)
            .ok_or_else(|| Error::Runtime(format!("{what} target is not an element")))
    }

    fn require_element_mut(&mut self, node: NodeId, what: &str) -> Result<&mut Element> {
        self.element_mut(node)
            .ok_or_else(|| Error::Runtime(format!("{what} target is not an element")))
    }

    pub(crate) fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|element| element.tag_name.as_str())
    }

    pub(crate) fn is_tag(&self, node: NodeId, tag: &str) -> bool {
        self.element(node).is_some_and(|element| element.is_tag(tag))
    }

    pub(crate) fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0)?.parent
    }

    /// Parent, grandparent and so on, up to the document.
    pub(crate) fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), |current| self.parent(*current))
    }

    /// Elements below `node` in document order, `node` itself excluded.
    pub(crate) fn descendant_elements(&self, node: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut pending: Vec<NodeId> = self.nodes[node.0].children.iter().rev().copied().collect();
        while let Some(next) = pending.pop() {
            if self.element(next).is_some() {
                found.push(next);
            }
            pending.extend(self.nodes[next.0].children.iter().rev());
        }
        found
    }

    /// `Node.contains`: true for the node itself and for every descendant.
    pub(crate) fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|current| current == ancestor)
    }

    pub(crate) fn is_connected(&self, node: NodeId) -> bool {
        self.contains(self.root, node)
    }

    /// First connected element with the given id, in document order.
    pub(crate) fn by_id(&self, id: &str) -> Option<NodeId> {
        if id.is_empty() {
            return None;
        }
        self.descendant_elements(self.root)
            .into_iter()
            .find(|node| self.attr(*node, "id").as_deref() == Some(id))
    }

    pub(crate) fn find_ancestor_by_tag(&self, node: NodeId, tag: &str) -> Option<NodeId> {
        self.ancestors(node).find(|current| self.is_tag(*current, tag))
    }

    pub(crate) fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            _ => {
                for child in &self.nodes[node.0].children {
                    self.collect_text(*child, out);
                }
            }
        }
    }

    pub(crate) fn inner_html(&self, node: NodeId) -> Result<String> {
        self.require_element(node, "innerHTML")?;
        let mut out = String::new();
        for child in &self.nodes[node.0].children {
            self.serialize(*child, &mut out);
        }
        Ok(out)
    }

    /// Replaces the children of `node` with the parsed `html`. The old
    /// children are detached, not destroyed.
    pub(crate) fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<()> {
        self.require_element(node, "innerHTML")?;
        let fragment = parse_html(html)?;

        for old in std::mem::take(&mut self.nodes[node.0].children) {
            self.nodes[old.0].parent = None;
        }
        for child in &fragment.nodes[fragment.root.0].children {
            self.adopt(&fragment, *child, node);
        }
        Ok(())
    }

    fn adopt(&mut self, source: &Dom, from: NodeId, parent: NodeId) {
        let copy = self.append(parent, source.nodes[from.0].kind.clone());
        for child in &source.nodes[from.0].children {
            self.adopt(source, *child, copy);
        }
    }

    /// `Element.remove`: detaching an already detached node is a no-op.
    pub(crate) fn remove_node(&mut self, node: NodeId) -> Result<()> {
        if node == self.root {
            return Err(Error::Runtime("cannot remove document root".into()));
        }
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|child| *child != node);
        }
        Ok(())
    }

    pub(crate) fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node)?
            .attrs
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    pub(crate) fn set_attr(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        let name = name.to_ascii_lowercase();
        let element = self.require_element_mut(node, "setAttribute")?;
        match name.as_str() {
            "value" => element.value = value.to_string(),
            "checked" => element.checked = true,
            _ => {}
        }
        element.attrs.insert(name, value.to_string());
        Ok(())
    }

    pub(crate) fn disabled(&self, node: NodeId) -> bool {
        self.attr(node, "disabled").is_some()
    }

    pub(crate) fn readonly(&self, node: NodeId) -> bool {
        self.attr(node, "readonly").is_some()
    }

    pub(crate) fn required(&self, node: NodeId) -> bool {
        self.attr(node, "required").is_some()
    }

    pub(crate) fn checked(&self, node: NodeId) -> Result<bool> {
        Ok(self.require_element(node, "checked")?.checked)
    }

    pub(crate) fn set_checked(&mut self, node: NodeId, checked: bool) -> Result<()> {
        self.require_element_mut(node, "checked")?.checked = checked;
        Ok(())
    }

    /// Lowercased `type` of an `<input>`, defaulting to `text`.
    pub(crate) fn input_type(&self, node: NodeId) -> Option<String> {
        let element = self.element(node).filter(|element| element.is_tag("input"))?;
        let kind = element
            .attrs
            .get("type")
            .map(|kind| kind.trim().to_ascii_lowercase())
            .unwrap_or_default();
        Some(if kind.is_empty() { "text".into() } else { kind })
    }

    pub(crate) fn value(&self, node: NodeId) -> Result<String> {
        Ok(self.require_element(node, "value")?.value.clone())
    }

    /// Sets a control's current value. Selects pick the matching option and
    /// date inputs drop anything that is not `YYYY-MM-DD`.
    pub(crate) fn set_value(&mut self, node: NodeId, value: &str) -> Result<()> {
        if self.is_tag(node, "select") {
            return self.choose_option(node, value);
        }
        let is_date = self.input_type(node).as_deref() == Some("date");
        let element = self.require_element_mut(node, "value")?;
        element.value = if is_date && parse_date_input_value(value).is_none() {
            String::new()
        } else {
            value.to_string()
        };
        Ok(())
    }

    /// Derives the initial value of textareas, selects and date inputs once
    /// the document is parsed.
    pub(crate) fn initialize_form_control_values(&mut self) -> Result<()> {
        for node in self.descendant_elements(self.root) {
            if self.is_tag(node, "textarea") {
                let text = self.text_content(node);
                self.require_element_mut(node, "textarea")?.value = text;
            } else if self.is_tag(node, "select") {
                let options = self.options(node);
                let initial = options
                    .iter()
                    .copied()
                    .find(|option| self.attr(*option, "selected").is_some())
                    .or_else(|| options.first().copied());
                let value = initial
                    .map(|option| self.option_value(option))
                    .unwrap_or_default();
                self.require_element_mut(node, "select")?.value = value;
            } else if self.input_type(node).as_deref() == Some("date") {
                let current = self.value(node)?;
                self.set_value(node, &current)?;
            }
        }
        Ok(())
    }

    fn options(&self, select: NodeId) -> Vec<NodeId> {
        self.descendant_elements(select)
            .into_iter()
            .filter(|node| self.is_tag(*node, "option"))
            .collect()
    }

    fn option_value(&self, option: NodeId) -> String {
        self.attr(option, "value")
            .unwrap_or_else(|| self.text_content(option).trim().to_string())
    }

    /// Selects the first option whose value is `requested`; with no match
    /// nothing is selected and the value becomes empty.
    fn choose_option(&mut self, select: NodeId, requested: &str) -> Result<()> {
        let options = self.options(select);
        let chosen = options
            .iter()
            .copied()
            .find(|option| self.option_value(*option) == requested);

        for option in options {
            let attrs = &mut self.require_element_mut(option, "option")?.attrs;
            if Some(option) == chosen {
                attrs.insert("selected".into(), String::new());
            } else {
                attrs.remove("selected");
            }
        }

        self.require_element_mut(select, "select")?.value = match chosen {
            Some(_) => requested.to_string(),
            None => String::new(),
        };
        Ok(())
    }

    /// Inline style property, `""` when unset. Accepts `camelCase` names.
    pub(crate) fn style_get(&self, node: NodeId, property: &str) -> Result<String> {
        let element = self.require_element(node, "style")?;
        let property = css_property_name(property);
        Ok(style_declarations(element.attrs.get("style"))
            .into_iter()
            .find(|(name, _)| *name == property)
            .map(|(_, value)| value)
            .unwrap_or_default())
    }

    /// Setting an empty value removes the property.
    pub(crate) fn style_set(&mut self, node: NodeId, property: &str, value: &str) -> Result<()> {
        let element = self.require_element_mut(node, "style")?;
        let property = css_property_name(property);
        let mut declarations = style_declarations(element.attrs.get("style"));

        match declarations.iter().position(|(name, _)| *name == property) {
            Some(at) if value.is_empty() => {
                declarations.remove(at);
            }
            Some(at) => declarations[at].1 = value.to_string(),
            None if value.is_empty() => {}
            None => declarations.push((property, value.to_string())),
        }

        if declarations.is_empty() {
            element.attrs.remove("style");
        } else {
            let style = declarations
                .iter()
                .map(|(name, value)| format!("{name}: {value};"))
                .collect::<Vec<_>>()
                .join(" ");
            element.attrs.insert("style".into(), style);
        }
        Ok(())
    }

    pub(crate) fn class_contains(&self, node: NodeId, class_name: &str) -> Result<bool> {
        Ok(self.require_element(node, "classList")?.has_class(class_name))
    }

    pub(crate) fn class_add(&mut self, node: NodeId, class_name: &str) -> Result<()> {
        self.edit_classes(node, |classes| {
            if !classes.iter().any(|class| class == class_name) {
                classes.push(class_name.to_string());
            }
        })
    }

    pub(crate) fn class_remove(&mut self, node: NodeId, class_name: &str) -> Result<()> {
        self.edit_classes(node, |classes| classes.retain(|class| class != class_name))
    }

    /// Returns whether the class is present afterwards.
    pub(crate) fn class_toggle(&mut self, node: NodeId, class_name: &str) -> Result<bool> {
        let present = self.class_contains(node, class_name)?;
        if present {
            self.class_remove(node, class_name)?;
        } else {
            self.class_add(node, class_name)?;
        }
        Ok(!present)
    }

    fn edit_classes(&mut self, node: NodeId, edit: impl FnOnce(&mut Vec<String>)) -> Result<()> {
        let element = self.require_element_mut(node, "classList")?;
        let mut classes: Vec<String> = element.classes().map(str::to_owned).collect();
        edit(&mut classes);
        if classes.is_empty() {
            element.attrs.remove("class");
        } else {
            element.attrs.insert("class".into(), classes.join(" "));
        }
        Ok(())
    }

    pub(crate) fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    pub(crate) fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let selector = Selector::parse(selector)?;
        if let Some(id) = selector.plain_id() {
            return Ok(self.by_id(id).into_iter().collect());
        }
        Ok(self.matching_descendants(self.root, &selector))
    }

    /// Matches below `scope` only; ancestors of `scope` may still satisfy the
    /// left-hand part of the selector, as with `Element.querySelector`.
    pub(crate) fn query_selector_from(
        &self,
        scope: NodeId,
        selector: &str,
    ) -> Result<Option<NodeId>> {
        let selector = Selector::parse(selector)?;
        Ok(self.matching_descendants(scope, &selector).into_iter().next())
    }

    fn matching_descendants(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendant_elements(scope)
            .into_iter()
            .filter(|node| selector.matches(self, *node))
            .collect()
    }

    /// Serializes `node` and its subtree; attributes come out sorted by name.
    pub(crate) fn dump_node(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.serialize(node, &mut out);
        out
    }

    fn serialize(&self, node: NodeId, out: &mut String) {
        let children = &self.nodes[node.0].children;
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => out.push_str(&escape_text(text)),
            NodeKind::Document => {
                for child in children {
                    self.serialize(*child, out);
                }
            }
            NodeKind::Element(element) => {
                out.push('<');
                out.push_str(&element.tag_name);
                for (name, value) in &element.attrs {
                    out.push_str(&format!(" {name}=\"{}\"", escape_attr(value)));
                }
                out.push('>');
                if is_void_tag(&element.tag_name) {
                    return;
                }
                for child in children {
                    self.serialize(*child, out);
                }
                out.push_str(&format!("</{}>", element.tag_name));
            }
        }
    }
}

/// Parses the value format of `<input type=date>`: exactly `YYYY-MM-DD`.
pub(crate) fn parse_date_input_value(value: &str) -> Option<NaiveDate> {
    let well_formed = value.len() == 10
        && value.char_indices().all(|(at, ch)| match at {
            4 | 7 => ch == '-',
            _ => ch.is_ascii_digit(),
        });
    if !well_formed {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

/// `backgroundColor` becomes `background-color`.
fn css_property_name(property: &str) -> String {
    property
        .chars()
        .flat_map(|ch| {
            let dash = ch.is_ascii_uppercase().then_some('-');
            dash.into_iter().chain(std::iter::once(ch.to_ascii_lowercase()))
        })
        .collect()
}

/// Later declarations of the same property win.
fn style_declarations(style: Option<&String>) -> Vec<(String, String)> {
    let mut declarations: Vec<(String, String)> = Vec::new();
    for declaration in style.map(String::as_str).unwrap_or_default().split(';') {
        let Some((name, value)) = declaration.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() {
            continue;
        }
        let value = value.trim().to_string();
        match declarations.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => declarations.push((name, value)),
        }
    }
    declarations
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
