//! Fenced code block info-string parsing.
//!
//! The info string carries a language spec plus optional key/value argument
//! pairs: `{language}[:flag[,flag…]] [key="value"…]`. Examples seen in the
//! wild: `rust`, `csharp:xmldocid`, `csharp:xmldocid,bodyonly`,
//! `gbnf:xmldocid data="gbnf"`.

/// Parsed info string of a fenced code block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FenceInfo {
    /// Language token, lowercased (empty for a bare fence).
    pub language: String,
    /// Comma-separated flags after the colon, lowercased.
    pub flags: Vec<String>,
    /// `key="value"` argument pairs following the language spec.
    pub attrs: Vec<(String, String)>,
}

impl FenceInfo {
    pub fn parse(info: &str) -> FenceInfo {
        let mut tokens = info.split_whitespace();
        let mut fence = FenceInfo::default();

        if let Some(spec) = tokens.next() {
            if spec.contains('=') {
                // No language at all, straight into attributes.
                push_attr(&mut fence.attrs, spec);
            } else {
                let mut parts = spec.splitn(2, ':');
                fence.language = parts.next().unwrap_or_default().to_lowercase();
                if let Some(flags) = parts.next() {
                    fence.flags = flags
                        .split(',')
                        .map(|f| f.trim().to_lowercase())
                        .filter(|f| !f.is_empty())
                        .collect();
                }
            }
        }
        for token in tokens {
            push_attr(&mut fence.attrs, token);
        }
        fence
    }

    /// The fence references a code fragment by documentation ID.
    pub fn is_doc_id(&self) -> bool {
        self.flags.iter().any(|f| f == "xmldocid")
    }

    /// Only the body of the resolved declaration should be emitted.
    pub fn body_only(&self) -> bool {
        self.flags.iter().any(|f| f == "bodyonly")
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

fn push_attr(attrs: &mut Vec<(String, String)>, token: &str) {
    if let Some((key, value)) = token.split_once('=') {
        let value = value.trim_matches('"');
        attrs.push((key.to_string(), value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_language() {
        let fence = FenceInfo::parse("rust");
        assert_eq!(fence.language, "rust");
        assert!(fence.flags.is_empty());
        assert!(!fence.is_doc_id());
    }

    #[test]
    fn empty_info() {
        let fence = FenceInfo::parse("");
        assert_eq!(fence.language, "");
        assert!(fence.attrs.is_empty());
    }

    #[test]
    fn doc_id_with_body_only() {
        let fence = FenceInfo::parse("csharp:xmldocid,bodyonly");
        assert_eq!(fence.language, "csharp");
        assert!(fence.is_doc_id());
        assert!(fence.body_only());
    }

    #[test]
    fn doc_id_with_data_attribute() {
        let fence = FenceInfo::parse("gbnf:xmldocid data=\"gbnf\"");
        assert_eq!(fence.language, "gbnf");
        assert!(fence.is_doc_id());
        assert!(!fence.body_only());
        assert_eq!(fence.attr("data"), Some("gbnf"));
    }

    #[test]
    fn case_is_normalized() {
        let fence = FenceInfo::parse("CSharp:XmlDocId,BodyOnly");
        assert_eq!(fence.language, "csharp");
        assert!(fence.is_doc_id());
        assert!(fence.body_only());
    }
}
