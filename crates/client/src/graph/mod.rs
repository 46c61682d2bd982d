//! Minimal N-Triples reader for repository metadata.
//!
//! Only what the refresher needs: parse a document into triples, find the
//! subject carrying a predicate, restrict to one subject and read object
//! values by predicate URI.

pub mod describe;

use std::sync::LazyLock;

use regex::Regex;
use thumbs_core::Error;

pub use describe::describe_resource;

static TRIPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?:<(?P<s_iri>[^>]*)>|(?P<s_blank>_:\S+))\s+<(?P<p>[^>]*)>\s+(?:<(?P<o_iri>[^>]*)>|(?P<o_blank>_:\S+)|"(?P<lit>(?:[^"\\]|\\.)*)"(?:\^\^<(?P<dt>[^>]*)>|@(?P<lang>[A-Za-z][A-Za-z0-9-]*))?)\s*\.\s*$"#,
    )
    .expect("N-Triples pattern is valid")
});

/// Object position of a triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal { value: String, datatype: Option<String>, lang: Option<String> },
}

impl Term {
    /// IRI, blank node label or literal lexical form.
    pub fn value(&self) -> &str {
        match self {
            Term::Iri(v) | Term::Blank(v) => v,
            Term::Literal { value, .. } => value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

/// Parsed metadata graph. Never mutated after parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    triples: Vec<Triple>,
}

impl Graph {
    /// Parse an N-Triples document. Blank and comment lines are skipped.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let text = std::str::from_utf8(bytes).map_err(|e| Error::GraphParse(format!("not UTF-8: {e}")))?;

        let mut triples = Vec::new();
        for (n, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let caps = TRIPLE
                .captures(line)
                .ok_or_else(|| Error::GraphParse(format!("line {}: malformed triple", n + 1)))?;

            let subject = caps
                .name("s_iri")
                .or_else(|| caps.name("s_blank"))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            let predicate = caps.name("p").map(|m| m.as_str().to_string()).unwrap_or_default();

            let object = if let Some(iri) = caps.name("o_iri") {
                Term::Iri(iri.as_str().to_string())
            } else if let Some(blank) = caps.name("o_blank") {
                Term::Blank(blank.as_str().to_string())
            } else {
                let lexical = caps.name("lit").map_or("", |m| m.as_str());
                Term::Literal {
                    value: unescape(lexical).map_err(|e| Error::GraphParse(format!("line {}: {e}", n + 1)))?,
                    datatype: caps.name("dt").map(|m| m.as_str().to_string()),
                    lang: caps.name("lang").map(|m| m.as_str().to_string()),
                }
            };

            triples.push(Triple { subject, predicate, object });
        }

        Ok(Self { triples })
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// First subject having `predicate`.
    pub fn subject_with(&self, predicate: &str) -> Option<&str> {
        self.triples
            .iter()
            .find(|t| t.predicate == predicate)
            .map(|t| t.subject.as_str())
    }

    /// A new graph holding only the triples of `subject`.
    pub fn restrict_to(&self, subject: &str) -> Graph {
        Graph { triples: self.triples.iter().filter(|t| t.subject == subject).cloned().collect() }
    }

    /// First object value of `predicate`, whatever the subject.
    pub fn object_value<'a>(&'a self, predicate: &str) -> Option<&'a str> {
        self.triples
            .iter()
            .find(|t| t.predicate == predicate)
            .map(|t| t.object.value())
    }

    /// Every object of `predicate`, in document order.
    pub fn objects<'a, 'p>(&'a self, predicate: &'p str) -> impl Iterator<Item = &'a Term> + use<'a, 'p> {
        self.triples
            .iter()
            .filter(move |t| t.predicate == predicate)
            .map(|t| &t.object)
    }
}

fn unescape(lexical: &str) -> Result<String, String> {
    if !lexical.contains('\\') {
        return Ok(lexical.to_string());
    }

    let mut out = String::with_capacity(lexical.len());
    let mut chars = lexical.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{8}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some('\\') => out.push('\\'),
            Some(u @ ('u' | 'U')) => {
                let width = if u == 'u' { 4 } else { 8 };
                let hex: String = chars.by_ref().take(width).collect();
                let code = u32::from_str_radix(&hex, 16).map_err(|_| format!("bad escape \\{u}{hex}"))?;
                out.push(char::from_u32(code).ok_or_else(|| format!("invalid code point {code:#x}"))?);
            }
            Some(other) => return Err(format!("unknown escape \\{other}")),
            None => return Err("dangling backslash".into()),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
# search result
<https://repo/api/777> <https://vocab#isTitleImageOf> <https://repo/api/504945> .
<https://repo/api/777> <search://match> "true"^^<http://www.w3.org/2001/XMLSchema#boolean> .
<https://repo/api/777> <https://vocab#hasTitle> "Cover \"front\""@en .
<https://repo/api/504945> <https://vocab#hasTitle> "Book" .
_:b0 <https://vocab#note> _:b1 .
"#;

    #[test]
    fn test_parse_terms() {
        let graph = Graph::parse(DOC.as_bytes()).unwrap();
        assert_eq!(graph.triples.len(), 5);

        let title = &graph.triples[2].object;
        assert_eq!(
            title,
            &Term::Literal { value: "Cover \"front\"".into(), datatype: None, lang: Some("en".into()) }
        );
        assert_eq!(graph.triples[0].object, Term::Iri("https://repo/api/504945".into()));
        assert_eq!(graph.triples[4].subject, "_:b0");
        assert_eq!(graph.triples[4].object, Term::Blank("_:b1".into()));
    }

    #[test]
    fn test_subject_with_and_restrict() {
        let graph = Graph::parse(DOC.as_bytes()).unwrap();
        let subject = graph.subject_with("search://match").unwrap();
        assert_eq!(subject, "https://repo/api/777");

        let only = graph.restrict_to(subject);
        assert_eq!(only.triples.len(), 3);
        assert_eq!(only.object_value("https://vocab#hasTitle"), Some("Cover \"front\""));
        assert_eq!(graph.triples.len(), 5);
    }

    #[test]
    fn test_objects_in_order() {
        let doc = "<a:x> <p:acl> \"public\" .\n<a:x> <p:acl> \"academic\" .\n";
        let graph = Graph::parse(doc.as_bytes()).unwrap();
        let values: Vec<&str> = graph.objects("p:acl").map(Term::value).collect();
        assert_eq!(values, vec!["public", "academic"]);
    }

    #[test]
    fn test_values_outlive_predicate() {
        let graph = Graph::parse(DOC.as_bytes()).unwrap();
        let (title, titles) = {
            let predicate = String::from("https://vocab#hasTitle");
            let titles: Vec<&str> = graph.objects(&predicate).map(Term::value).collect();
            (graph.object_value(&predicate), titles)
        };
        assert_eq!(title, Some("Cover \"front\""));
        assert_eq!(titles, vec!["Cover \"front\"", "Book"]);
    }

    #[test]
    fn test_unicode_escapes() {
        let doc = "<a:x> <p:t> \"caf\\u00E9 \\U0001F600\" .";
        let graph = Graph::parse(doc.as_bytes()).unwrap();
        assert_eq!(graph.object_value("p:t"), Some("café 😀"));
    }

    #[test]
    fn test_malformed_line() {
        let err = Graph::parse(b"<a:x> <p:t> .").unwrap_err();
        assert!(matches!(err, Error::GraphParse(msg) if msg.starts_with("line 1")));
    }

    #[test]
    fn test_empty_document() {
        let graph = Graph::parse(b"\n# nothing\n").unwrap();
        assert!(graph.is_empty());
        assert_eq!(graph.subject_with("search://match"), None);
    }
}
