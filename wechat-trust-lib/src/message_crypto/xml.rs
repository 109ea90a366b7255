//! XML wire form of encrypted push messages.
//!
//! The platform only ever exchanges flat `<xml>` documents with text or CDATA
//! elements, so elements are located by tag rather than with a full parser.

use crate::{Result, TrustError};

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// Text of the first `<tag>` element, with a CDATA wrapper removed.
pub fn element_text<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);

    let start = xml.find(&open)? + open.len();
    let end = start + xml[start..].find(&close)?;
    let text = xml[start..end].trim();

    match text
        .strip_prefix(CDATA_OPEN)
        .and_then(|inner| inner.strip_suffix(CDATA_CLOSE))
    {
        Some(inner) => Some(inner),
        None => Some(text),
    }
}

/// Like [`element_text`] but fails with `InvalidData` when the element is missing.
pub fn required_element<'a>(xml: &'a str, tag: &str) -> Result<&'a str> {
    element_text(xml, tag).ok_or_else(|| TrustError::invalid_data(tag, "element missing from XML"))
}

/// Wrap text in a CDATA section.
///
/// A literal `]]>` inside the text is split across two sections.
pub fn cdata(text: &str) -> String {
    format!(
        "{}{}{}",
        CDATA_OPEN,
        text.replace(CDATA_CLOSE, "]]]]><![CDATA[>"),
        CDATA_CLOSE
    )
}
