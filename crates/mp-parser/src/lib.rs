mod writer;
mod xml;

pub use writer::{
    escape_attr, escape_text, make_indent, write_children, write_element, XmlBuilder,
};
pub use xml::{parse_xml_document, XmlDocument, XmlElementNode, XmlNode, XmlTextNode};
