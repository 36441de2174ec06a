use std::path::Path;

/// Response body flavour inferred from a response file's extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentKind {
    Json,
    Xml,
    Html,
    Text,
}

impl ContentKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => ContentKind::Json,
            Some("xml") => ContentKind::Xml,
            Some("html") | Some("htm") => ContentKind::Html,
            _ => ContentKind::Text,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ContentKind::Json => "application/json; charset=utf-8",
            ContentKind::Xml => "application/xml; charset=utf-8",
            ContentKind::Html => "text/html; charset=utf-8",
            ContentKind::Text => "text/plain; charset=utf-8",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_decides_content_type() {
        let cases = [
            ("GET.200.json", "application/json; charset=utf-8"),
            ("ping.XML", "application/xml; charset=utf-8"),
            ("index.GET.htm", "text/html; charset=utf-8"),
            ("GET.200.txt", "text/plain; charset=utf-8"),
            ("GET.200.csv", "text/plain; charset=utf-8"),
            ("GET", "text/plain; charset=utf-8"),
        ];
        for (name, expected) in cases {
            assert_eq!(
                ContentKind::from_path(Path::new(name)).content_type(),
                expected,
                "{name}"
            );
        }
    }
}
