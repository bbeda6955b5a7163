//! XML-flavored variant of the tree backend.
//!
//! Objects and arrays become elements; array elements are named `item`.
//! Named fields whose type is minimally serializable (scalars, strings,
//! bitsets) are written as attributes of their parent, everything else as a
//! child element. Null values carry `null="true"`. Loading accepts a field as
//! either an attribute or a child element.
//!
//! ```text
//! <tessera id="1" msg="hi"><numbers><item>1</item><item>2</item></numbers></tessera>
//! ```

use std::fmt::Write as _;
use std::str::FromStr;

use roxmltree::{Document, Node};
use tessera_core::{CodecError, Deserializer, FieldKey, Format, Load, Save, Serializer};

/// Name of the document element.
pub const ROOT: &str = "tessera";

/// Name of array elements.
pub const ITEM: &str = "item";

const NULL_ATTR: &str = "null";

#[derive(Debug)]
struct Element {
    name: &'static str,
    array: bool,
    attrs: Vec<(&'static str, String)>,
    children: Vec<Element>,
    text: Option<String>,
}

impl Element {
    fn new(name: &'static str, array: bool) -> Self {
        Self {
            name,
            array,
            attrs: Vec::new(),
            children: Vec::new(),
            text: None,
        }
    }

    fn write(&self, out: &mut String) {
        out.push('<');
        out.push_str(self.name);
        for (name, value) in &self.attrs {
            let _ = write!(out, " {name}=\"");
            escape(value, out);
            out.push('"');
        }
        if self.children.is_empty() && self.text.is_none() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if let Some(text) = &self.text {
            escape(text, out);
        }
        for child in &self.children {
            child.write(out);
        }
        let _ = write!(out, "</{}>", self.name);
    }
}

fn escape(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Attribute and line-end normalization would rewrite these.
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            '\t' => out.push_str("&#9;"),
            c => out.push(c),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Root,
    Child(&'static str),
    Attr(&'static str),
    Item,
}

/// Builds an element tree and renders it as XML text.
#[derive(Debug, Default)]
pub struct XmlSerializer {
    stack: Vec<Element>,
    slot: Option<Slot>,
    root: Option<Element>,
}

impl XmlSerializer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Render the finished document.
    pub fn finish(self) -> Result<String, CodecError> {
        if !self.stack.is_empty() {
            return Err(CodecError::structural(format!(
                "{} unclosed elements",
                self.stack.len()
            )));
        }
        let root = self
            .root
            .ok_or_else(|| CodecError::structural("nothing was serialized"))?;

        let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        root.write(&mut out);
        Ok(out)
    }

    fn take_slot(&mut self) -> Result<Slot, CodecError> {
        if let Some(slot) = self.slot.take() {
            return Ok(slot);
        }
        match self.stack.last() {
            Some(top) if top.array => Ok(Slot::Item),
            Some(_) => Err(CodecError::structural("object value without a field name")),
            None if self.root.is_some() => Err(CodecError::structural("more than one root value")),
            None => Ok(Slot::Root),
        }
    }

    fn element_name(slot: Slot) -> Result<&'static str, CodecError> {
        match slot {
            Slot::Root => Ok(ROOT),
            Slot::Child(name) => Ok(name),
            Slot::Item => Ok(ITEM),
            Slot::Attr(name) => Err(CodecError::format(format!(
                "`{name}` cannot be written as an attribute"
            ))),
        }
    }

    fn attach(&mut self, element: Element) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => self.root = Some(element),
        }
    }

    fn open(&mut self, array: bool) -> Result<(), CodecError> {
        let slot = self.take_slot()?;
        self.stack.push(Element::new(Self::element_name(slot)?, array));
        Ok(())
    }

    fn close(&mut self, array: bool) -> Result<(), CodecError> {
        match self.stack.pop() {
            Some(element) if element.array == array => {
                self.attach(element);
                Ok(())
            }
            _ => Err(CodecError::structural("mismatched region close")),
        }
    }

    fn leaf(&mut self, text: String) -> Result<(), CodecError> {
        match self.take_slot()? {
            Slot::Attr(name) => match self.stack.last_mut() {
                Some(parent) => {
                    parent.attrs.push((name, text));
                    Ok(())
                }
                None => Err(CodecError::structural("attribute without a parent element")),
            },
            slot => {
                let mut element = Element::new(Self::element_name(slot)?, false);
                element.text = Some(text);
                self.attach(element);
                Ok(())
            }
        }
    }

    fn in_object(&self) -> bool {
        matches!(self.stack.last(), Some(top) if !top.array)
    }
}

impl Serializer for XmlSerializer {
    fn start_object(&mut self, _len: usize) -> Result<(), CodecError> {
        self.open(false)
    }

    fn end_object(&mut self) -> Result<(), CodecError> {
        self.close(false)
    }

    fn start_array(&mut self, _len: usize) -> Result<(), CodecError> {
        self.open(true)
    }

    fn end_array(&mut self) -> Result<(), CodecError> {
        self.close(true)
    }

    fn save_name(&mut self, key: FieldKey) -> Result<(), CodecError> {
        self.slot = Some(Slot::Child(key.name));
        Ok(())
    }

    fn save_null(&mut self) -> Result<(), CodecError> {
        // A nested null under an attribute slot (`Some(None)`) needs an element.
        let slot = match self.take_slot()? {
            Slot::Attr(name) => Slot::Child(name),
            slot => slot,
        };
        let mut element = Element::new(Self::element_name(slot)?, false);
        element.attrs.push((NULL_ATTR, "true".to_owned()));
        self.attach(element);
        Ok(())
    }

    fn save_bool(&mut self, v: bool) -> Result<(), CodecError> {
        self.leaf(v.to_string())
    }

    fn save_i8(&mut self, v: i8) -> Result<(), CodecError> {
        self.leaf(v.to_string())
    }

    fn save_i16(&mut self, v: i16) -> Result<(), CodecError> {
        self.leaf(v.to_string())
    }

    fn save_i32(&mut self, v: i32) -> Result<(), CodecError> {
        self.leaf(v.to_string())
    }

    fn save_i64(&mut self, v: i64) -> Result<(), CodecError> {
        self.leaf(v.to_string())
    }

    fn save_u8(&mut self, v: u8) -> Result<(), CodecError> {
        self.leaf(v.to_string())
    }

    fn save_u16(&mut self, v: u16) -> Result<(), CodecError> {
        self.leaf(v.to_string())
    }

    fn save_u32(&mut self, v: u32) -> Result<(), CodecError> {
        self.leaf(v.to_string())
    }

    fn save_u64(&mut self, v: u64) -> Result<(), CodecError> {
        self.leaf(v.to_string())
    }

    fn save_f32(&mut self, v: f32) -> Result<(), CodecError> {
        self.leaf(v.to_string())
    }

    fn save_f64(&mut self, v: f64) -> Result<(), CodecError> {
        self.leaf(v.to_string())
    }

    fn save_str(&mut self, v: &str) -> Result<(), CodecError> {
        self.leaf(v.to_owned())
    }

    fn save_field<T: Save + ?Sized>(&mut self, key: FieldKey, value: &T) -> Result<(), CodecError> {
        if value.is_null() {
            return Ok(());
        }
        self.slot = Some(if T::MINIMAL && self.in_object() {
            Slot::Attr(key.name)
        } else {
            Slot::Child(key.name)
        });
        value.save(self)
    }
}

#[derive(Clone, Copy)]
enum XmlValue<'a, 'input> {
    Attr(&'a str),
    Element(Node<'a, 'input>),
}

struct Cursor<'a, 'input> {
    node: Node<'a, 'input>,
    items: Vec<Node<'a, 'input>>,
    next: usize,
}

/// Walks a parsed `roxmltree` document.
pub struct XmlDeserializer<'a, 'input> {
    stack: Vec<Cursor<'a, 'input>>,
    pending: Option<XmlValue<'a, 'input>>,
}

impl<'a, 'input> XmlDeserializer<'a, 'input> {
    /// Start at the document element.
    #[must_use]
    pub fn new(document: &'a Document<'input>) -> Self {
        Self {
            stack: Vec::new(),
            pending: Some(XmlValue::Element(document.root_element())),
        }
    }

    fn peek(&self) -> Option<XmlValue<'a, 'input>> {
        if self.pending.is_some() {
            return self.pending;
        }
        let cursor = self.stack.last()?;
        cursor.items.get(cursor.next).copied().map(XmlValue::Element)
    }

    fn next_value(&mut self) -> Result<XmlValue<'a, 'input>, CodecError> {
        if let Some(value) = self.pending.take() {
            return Ok(value);
        }
        let cursor = self
            .stack
            .last_mut()
            .ok_or_else(|| CodecError::structural("no value left to read"))?;
        let node = cursor
            .items
            .get(cursor.next)
            .copied()
            .ok_or_else(|| CodecError::structural(format!(
                "read past the last child of <{}>",
                cursor.node.tag_name().name()
            )))?;
        cursor.next += 1;
        Ok(XmlValue::Element(node))
    }

    fn text(&mut self) -> Result<&'a str, CodecError> {
        match self.next_value()? {
            XmlValue::Attr(value) => Ok(value),
            XmlValue::Element(node) => Ok(node.text().unwrap_or("")),
        }
    }

    fn parse<T: FromStr>(&mut self, what: &str) -> Result<T, CodecError> {
        let text = self.text()?;
        text.trim()
            .parse()
            .map_err(|_| CodecError::format(format!("expected {what}, found {text:?}")))
    }
}

impl Deserializer for XmlDeserializer<'_, '_> {
    fn start_node(&mut self) -> Result<(), CodecError> {
        match self.next_value()? {
            XmlValue::Element(node) => {
                let items = node.children().filter(Node::is_element).collect();
                self.stack.push(Cursor {
                    node,
                    items,
                    next: 0,
                });
                Ok(())
            }
            XmlValue::Attr(value) => Err(CodecError::format(format!(
                "attribute value {value:?} cannot hold a region"
            ))),
        }
    }

    fn finish_node(&mut self) -> Result<(), CodecError> {
        self.pending = None;
        self.stack
            .pop()
            .map(|_| ())
            .ok_or_else(|| CodecError::structural("finish_node without start_node"))
    }

    fn load_size_tag(&mut self) -> Result<usize, CodecError> {
        self.stack
            .last()
            .map(|cursor| cursor.items.len())
            .ok_or_else(|| CodecError::structural("size tag outside a node"))
    }

    fn load_name(&mut self, key: FieldKey) -> Result<bool, CodecError> {
        let cursor = self.stack.last().ok_or_else(|| {
            CodecError::structural(format!("field `{}` outside an element", key.name))
        })?;

        self.pending = match cursor.node.attribute(key.name) {
            Some(value) => Some(XmlValue::Attr(value)),
            None => cursor
                .items
                .iter()
                .find(|child| child.tag_name().name() == key.name)
                .copied()
                .map(XmlValue::Element),
        };
        Ok(self.pending.is_some())
    }

    fn load_null(&mut self) -> Result<bool, CodecError> {
        match self.peek() {
            Some(XmlValue::Element(node)) if node.attribute(NULL_ATTR) == Some("true") => {
                self.next_value()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn load_bool(&mut self) -> Result<bool, CodecError> {
        match self.text()?.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            other => Err(CodecError::format(format!("expected bool, found {other:?}"))),
        }
    }

    fn load_i8(&mut self) -> Result<i8, CodecError> {
        self.parse("i8")
    }

    fn load_i16(&mut self) -> Result<i16, CodecError> {
        self.parse("i16")
    }

    fn load_i32(&mut self) -> Result<i32, CodecError> {
        self.parse("i32")
    }

    fn load_i64(&mut self) -> Result<i64, CodecError> {
        self.parse("i64")
    }

    fn load_u8(&mut self) -> Result<u8, CodecError> {
        self.parse("u8")
    }

    fn load_u16(&mut self) -> Result<u16, CodecError> {
        self.parse("u16")
    }

    fn load_u32(&mut self) -> Result<u32, CodecError> {
        self.parse("u32")
    }

    fn load_u64(&mut self) -> Result<u64, CodecError> {
        self.parse("u64")
    }

    fn load_f32(&mut self) -> Result<f32, CodecError> {
        self.parse("f32")
    }

    fn load_f64(&mut self) -> Result<f64, CodecError> {
        self.parse("f64")
    }

    fn load_string(&mut self) -> Result<String, CodecError> {
        self.text().map(str::to_owned)
    }
}

/// The XML wire format.
#[derive(Debug, Clone, Copy, Default)]
pub struct Xml;

impl Xml {
    /// Render as an XML document string.
    pub fn to_string<T: Save + ?Sized>(value: &T) -> Result<String, CodecError> {
        let mut s = XmlSerializer::new();
        value.save(&mut s)?;
        s.finish()
    }

    /// Load from XML text.
    pub fn from_str<T: Load + ?Sized>(text: &str, value: &mut T) -> Result<(), CodecError> {
        let document = Document::parse(text).map_err(|e| CodecError::format(e.to_string()))?;
        let mut d = XmlDeserializer::new(&document);
        value.load(&mut d)
    }
}

impl Format for Xml {
    const NAME: &'static str = "xml";

    fn encode<T: Save + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
        let text = Self::to_string(value)?;
        tracing::trace!(len = text.len(), "xml encode");
        Ok(text.into_bytes())
    }

    fn decode<T: Load + ?Sized>(bytes: &[u8], value: &mut T) -> Result<(), CodecError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| CodecError::format(format!("invalid utf-8 in document: {e}")))?;
        Self::from_str(text, value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use tessera_core::{BitSet, MultiMap, Pair};

    use super::*;

    fn roundtrip<T: Save + Load + Default>(value: &T) -> T {
        let text = Xml::to_string(value).unwrap();
        let mut out = T::default();
        Xml::from_str(&text, &mut out).unwrap();
        out
    }

    #[test]
    fn test_layout() {
        let text = Xml::to_string(&Pair::new(3u8, vec!["a&b".to_string()])).unwrap();
        assert_eq!(
            text,
            r#"<?xml version="1.0" encoding="UTF-8"?><tessera first="3"><second><item>a&amp;b</item></second></tessera>"#
        );
    }

    #[test]
    fn test_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert(2u32, "two <2>".to_string());
        map.insert(3, String::new());
        assert_eq!(roundtrip(&map), map);

        let multi: MultiMap<i32, String> = [(1, "hello"), (2, "world"), (1, "world")]
            .into_iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect();
        assert_eq!(roundtrip(&multi).count(&1), 2);

        let pairs = vec![Pair::new(Some(1.5f64), BitSet::<2>::new()), Pair::default()];
        assert_eq!(roundtrip(&pairs), pairs);

        let nulls = vec![None, Some(4i8)];
        assert_eq!(roundtrip(&nulls), nulls);
    }

    #[test]
    fn test_control_whitespace_survives() {
        let text = "a\r\nb\tc\n".to_string();
        let pair = Pair::new(text.clone(), vec![text.clone(), " lead".to_string()]);

        let encoded = Xml::to_string(&pair).unwrap();
        assert!(encoded.contains(r#"first="a&#13;&#10;b&#9;c&#10;""#));
        assert_eq!(roundtrip(&pair), pair);
    }

    #[test]
    fn test_nested_null_in_attribute_position() {
        let pair = Pair::new(Some(None::<u8>), Some(Some(7u8)));
        let encoded = Xml::to_string(&pair).unwrap();
        assert!(encoded.contains(r#"<first null="true"/>"#));
        assert!(encoded.contains(r#"second="7""#));

        // Nested options share one null marker.
        assert_eq!(roundtrip(&pair), Pair::new(None, Some(Some(7))));
    }

    #[test]
    fn test_element_or_attribute() {
        let mut pair = Pair::<i32, i32>::default();
        Xml::from_str("<p second=\"2\"><first> 1 </first></p>", &mut pair).unwrap();
        assert_eq!(pair, Pair::new(1, 2));
    }

    #[test]
    fn test_tuple_arity_mismatch() {
        let mut t = (0u8, 0u8);
        let err = Xml::from_str("<t><item>1</item></t>", &mut t).unwrap_err();
        assert!(matches!(err, CodecError::StructuralMismatch(_)));
        assert_eq!(t, (0, 0));
    }

    #[test]
    fn test_malformed() {
        let mut v = 0i32;
        assert!(Xml::from_str("<a>", &mut v).is_err());
        assert!(Xml::from_str("<a>x</a>", &mut v).is_err());
    }
}
