use scraper::node::Node;
use scraper::{ElementRef, Html};

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "caption", "dd", "div", "dl", "dt",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "ul",
];

const SKIPPED_ELEMENTS: &[&str] = &["head", "script", "style", "title", "noscript"];

/// Plain-text view of an HTML body: tags dropped, block elements on their own
/// lines, whitespace tidied. Always ends with a newline unless empty.
pub fn html_to_text(html: &str) -> String {
    let doc = Html::parse_document(html);
    let mut raw = String::new();
    walk(doc.root_element(), &mut raw);
    tidy(&raw)
}

fn walk(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_ELEMENTS.contains(&name) {
                    continue;
                }
                let block = BLOCK_ELEMENTS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    walk(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Collapse horizontal whitespace, trim lines, and squeeze blank lines.
pub fn tidy(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for line in raw.lines() {
        let line = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            continue;
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraph_becomes_line() {
        assert_eq!(html_to_text("<p>COUCHE-TARD # 1319 $3.62</p>"), "COUCHE-TARD # 1319 $3.62\n");
    }

    #[test]
    fn test_blocks_and_breaks_split_lines() {
        let html = "<html><head><title>Alerte</title><style>p{color:red}</style></head>\
                    <body><div>Montant de l&#39;achat :&nbsp;25,99$<br>Lieu de l'achat : <b>MAXI</b> #8634</div>\
                    <table><tr><td>Carte</td><td>Visa</td></tr></table></body></html>";
        let text = html_to_text(html);
        assert_eq!(
            text,
            "Montant de l'achat : 25,99$\nLieu de l'achat : MAXI #8634\nCarte\nVisa\n"
        );
    }

    #[test]
    fn test_inline_elements_do_not_split() {
        assert_eq!(html_to_text("<span>UBER</span> <span>EATS</span>"), "UBER EATS\n");
    }

    #[test]
    fn test_empty_document() {
        assert_eq!(html_to_text(""), "");
    }

    #[test]
    fn test_tidy_collapses_whitespace() {
        assert_eq!(tidy("  a \t b \n\n\n c\u{a0}d  "), "a b\nc d\n");
    }
}
