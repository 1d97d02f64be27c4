use super::*;

/// A parsed selector: `#id`, `.class`, `tag`, `[name]` and `[name="value"]`
/// compounds joined by descendant (whitespace) or child (`>`) relations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Selector {
    subject: Compound,
    /// Compounds to the left of the subject, nearest first.
    context: Vec<(Relation, Compound)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relation {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrFilter {
    name: String,
    /// `None` only requires the attribute to be present.
    value: Option<String>,
}

impl Selector {
    pub(crate) fn parse(source: &str) -> Result<Self> {
        let mut cursor = Cursor::new(source);
        cursor.skip_ws();
        let mut compounds = vec![cursor.compound()?];
        let mut relations = Vec::new();

        loop {
            let spaced = cursor.skip_ws();
            match cursor.peek() {
                None => break,
                Some('>') => {
                    cursor.bump();
                    cursor.skip_ws();
                    relations.push(Relation::Child);
                }
                Some(_) if spaced => relations.push(Relation::Descendant),
                Some(_) => return Err(cursor.unsupported()),
            }
            compounds.push(cursor.compound()?);
        }

        let subject = compounds.pop().ok_or_else(|| cursor.unsupported())?;
        let context = relations.into_iter().rev().zip(compounds.into_iter().rev()).collect();
        Ok(Self { subject, context })
    }

    /// The id of a bare `#id` selector, which can be answered from the id index.
    pub(crate) fn plain_id(&self) -> Option<&str> {
        let Compound {
            tag: None,
            id: Some(id),
            classes,
            attrs,
        } = &self.subject
        else {
            return None;
        };
        (self.context.is_empty() && classes.is_empty() && attrs.is_empty()).then_some(id.as_str())
    }

    pub(crate) fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        self.subject.matches(dom, node) && self.context_matches(dom, node, 0)
    }

    fn context_matches(&self, dom: &Dom, node: NodeId, depth: usize) -> bool {
        let Some((relation, compound)) = self.context.get(depth) else {
            return true;
        };
        let fits = |candidate: NodeId| {
            compound.matches(dom, candidate) && self.context_matches(dom, candidate, depth + 1)
        };
        match relation {
            Relation::Child => dom.parent(node).is_some_and(fits),
            Relation::Descendant => dom.ancestors(node).any(fits),
        }
    }
}

impl Compound {
    fn matches(&self, dom: &Dom, node: NodeId) -> bool {
        let Some(element) = dom.element(node) else {
            return false;
        };
        self.tag.as_deref().map_or(true, |tag| element.is_tag(tag))
            && self
                .id
                .as_ref()
                .map_or(true, |id| element.attrs.get("id") == Some(id))
            && self.classes.iter().all(|class| element.has_class(class))
            && self.attrs.iter().all(|filter| match &filter.value {
                Some(value) => element.attrs.get(&filter.name) == Some(value),
                None => element.attrs.contains_key(&filter.name),
            })
    }
}

struct Cursor<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn unsupported(&self) -> Error {
        Error::UnsupportedSelector(self.source.to_string())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += 1;
        Some(ch)
    }

    /// Returns whether any whitespace was consumed.
    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(|ch| ch.is_ascii_whitespace()) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn take_while(&mut self, accept: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&accept) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn ident(&mut self) -> Result<String> {
        let ident = self.take_while(is_ident_char);
        if ident.is_empty() {
            return Err(self.unsupported());
        }
        Ok(ident)
    }

    fn compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let start = self.pos;

        if self.peek().is_some_and(is_ident_char) {
            compound.tag = Some(self.ident()?.to_ascii_lowercase());
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.bump();
                    let id = self.ident()?;
                    if compound.id.replace(id).is_some() {
                        return Err(self.unsupported());
                    }
                }
                Some('.') => {
                    self.bump();
                    let class = self.ident()?;
                    compound.classes.push(class);
                }
                Some('[') => {
                    self.bump();
                    let filter = self.attr_filter()?;
                    compound.attrs.push(filter);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(self.unsupported());
        }
        Ok(compound)
    }

    fn attr_filter(&mut self) -> Result<AttrFilter> {
        self.skip_ws();
        let name = self
            .take_while(|ch| is_ident_char(ch) || ch == ':')
            .to_ascii_lowercase();
        if name.is_empty() {
            return Err(self.unsupported());
        }
        self.skip_ws();

        let value = match self.bump() {
            Some(']') => return Ok(AttrFilter { name, value: None }),
            Some('=') => {
                self.skip_ws();
                let value = self.attr_value()?;
                self.skip_ws();
                value
            }
            _ => return Err(self.unsupported()),
        };
        if self.bump() != Some(']') {
            return Err(self.unsupported());
        }
        Ok(AttrFilter {
            name,
            value: Some(value),
        })
    }

    /// A quoted or bare attribute value; backslash escapes the next character.
    fn attr_value(&mut self) -> Result<String> {
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.bump();
                Some(q)
            }
            Some(_) => None,
            None => return Err(self.unsupported()),
        };

        let mut value = String::new();
        loop {
            match (self.peek(), quote) {
                (None, Some(_)) => return Err(self.unsupported()),
                (None, None) => break,
                (Some(ch), Some(q)) if ch == q => {
                    self.bump();
                    break;
                }
                (Some(ch), None) if ch == ']' || ch.is_ascii_whitespace() => break,
                (Some('\\'), _) => {
                    self.bump();
                    if let Some(escaped) = self.bump() {
                        value.push(escaped);
                    }
                }
                (Some(ch), _) => {
                    self.bump();
                    value.push(ch);
                }
            }
        }

        if quote.is_none() && value.is_empty() {
            return Err(self.unsupported());
        }
        Ok(value)
    }
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'
}
