use serde::{Deserialize, Serialize};

/// Represents ways to locate an element in the page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Selector {
    /// Select using a CSS selector
    Css(String),
    /// Select using an XPath expression
    XPath(String),
    /// Select anchors whose whole text equals the value
    LinkText(String),
    /// Select anchors whose text contains the value
    PartialLinkText(String),
    /// Select elements whose own text contains the value
    Text(String),
    /// Select by class name
    ClassName(String),
    /// Select the n-th (zero based) match of the inner selector
    Nth { inner: Box<Selector>, index: usize },
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl Selector {
    pub fn css(s: impl Into<String>) -> Self {
        Selector::Css(s.into())
    }

    pub fn xpath(s: impl Into<String>) -> Self {
        Selector::XPath(s.into())
    }

    pub fn text(s: impl Into<String>) -> Self {
        Selector::Text(s.into())
    }

    /// Wrap this selector so only its `index`-th match is considered.
    pub fn nth(self, index: usize) -> Self {
        Selector::Nth {
            inner: Box::new(self),
            index,
        }
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Selector::Invalid(_) => false,
            Selector::Nth { inner, .. } => inner.is_valid(),
            _ => true,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Css(s) => write!(f, "css:{s}"),
            Selector::XPath(s) => write!(f, "xpath:{s}"),
            Selector::LinkText(s) => write!(f, "link:{s}"),
            Selector::PartialLinkText(s) => write!(f, "partiallink:{s}"),
            Selector::Text(s) => write!(f, "text:{s}"),
            Selector::ClassName(s) => write!(f, "classname:{s}"),
            Selector::Nth { inner, index } => write!(f, "{inner} >> nth={index}"),
            Selector::Invalid(reason) => write!(f, "invalid:{reason}"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let s = s.trim();

        // A trailing `>> nth=N` narrows whatever precedes it
        if let Some((head, tail)) = s.rsplit_once(">>") {
            let tail = tail.trim();
            if let Some(index_str) = strip_prefix_ignore_case(tail, "nth=")
                .or_else(|| strip_prefix_ignore_case(tail, "nth:"))
            {
                return match index_str.trim().parse::<usize>() {
                    Ok(index) => Selector::from(head).nth(index),
                    Err(_) => {
                        Selector::Invalid(format!("Invalid index for nth selector: '{index_str}'"))
                    }
                };
            }
        }

        if let Some(rest) = strip_prefix_ignore_case(s, "css:") {
            return Selector::Css(rest.trim().to_string());
        }
        if let Some(rest) = strip_prefix_ignore_case(s, "xpath:") {
            return Selector::XPath(rest.trim().to_string());
        }
        if let Some(rest) = strip_prefix_ignore_case(s, "partiallink:") {
            return Selector::PartialLinkText(rest.to_string());
        }
        if let Some(rest) = strip_prefix_ignore_case(s, "link:") {
            return Selector::LinkText(rest.to_string());
        }
        if let Some(rest) = strip_prefix_ignore_case(s, "text:") {
            return Selector::Text(rest.to_string());
        }
        if let Some(rest) = strip_prefix_ignore_case(s, "classname:") {
            return Selector::ClassName(rest.trim().to_string());
        }
        if let Some(rest) = strip_prefix_ignore_case(s, "invalid:") {
            return Selector::Invalid(rest.to_string());
        }
        match s {
            _ if s.starts_with('/') || s.starts_with("(/") => Selector::XPath(s.to_string()),
            _ if s.starts_with('.') || s.starts_with('#') || s.starts_with('[') => {
                Selector::Css(s.to_string())
            }
            _ => Selector::Invalid(format!(
                "Unknown selector format: \"{s}\". Use prefixes like 'css:', 'xpath:', 'link:', 'partiallink:', 'text:' or 'classname:' to specify the selector type."
            )),
        }
    }
}

/// ASCII case-insensitive `strip_prefix`; never slices inside a character.
fn strip_prefix_ignore_case<'s>(s: &'s str, prefix: &str) -> Option<&'s str> {
    s.get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .and_then(|_| s.get(prefix.len()..))
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}

impl From<Selector> for String {
    fn from(selector: Selector) -> Self {
        selector.to_string()
    }
}
