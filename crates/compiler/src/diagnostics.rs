//! Carat-annotated diagnostics.
//!
//! Every fatal compiler error renders the same way: a one-line message with
//! the source line number, followed by the offending line and a carat run
//! underneath the offending span. The rendered text travels as the `Err`
//! payload of each phase, so callers only ever print it.

/// Byte span of a token or expression in the module source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// 1-based source line.
    pub line: u32,
    /// Byte offset of the span start.
    pub offset: usize,
    /// Byte length; 0 renders a single carat.
    pub len: usize,
}

impl Span {
    pub fn new(line: u32, offset: usize, len: usize) -> Self {
        Span { line, offset, len }
    }

    /// A span pointing just past this one, for "expected X after Y" errors.
    pub fn after(&self) -> Span {
        Span {
            line: self.line,
            offset: self.offset + self.len,
            len: 0,
        }
    }
}

/// Render a fatal error with the offending source line and a carat run.
pub fn error_at(source: &str, span: Span, msg: &str) -> String {
    let line_start = source[..span.offset.min(source.len())]
        .rfind('\n')
        .map_or(0, |i| i + 1);
    let line_end = source[line_start..]
        .find('\n')
        .map_or(source.len(), |i| line_start + i);
    let line_text = &source[line_start..line_end];

    let col = span.offset.saturating_sub(line_start);
    let width = span.len.max(1).min(line_end.saturating_sub(span.offset).max(1));

    let mut out = format!("error at line {}: {}\n", span.line, msg);
    out.push_str("  ");
    out.push_str(line_text);
    out.push('\n');
    out.push_str("  ");
    for c in line_text[..col.min(line_text.len())].chars() {
        out.push(if c == '\t' { '\t' } else { ' ' });
    }
    for _ in 0..width {
        out.push('^');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carat_under_offending_token() {
        let source = "var x = 1;\nprint y;\n";
        let offset = source.find('y').unwrap();
        let rendered = error_at(source, Span::new(2, offset, 1), "name y is not defined");

        assert!(rendered.starts_with("error at line 2: name y is not defined\n"));
        assert!(rendered.contains("  print y;\n"));
        assert!(rendered.ends_with("        ^"));
    }

    #[test]
    fn test_zero_width_span_renders_one_carat() {
        let source = "print 1";
        let rendered = error_at(source, Span::new(1, source.len(), 0), "expected ';'");
        assert_eq!(rendered.matches('^').count(), 1);
    }

    #[test]
    fn test_tabs_preserved_in_carat_line() {
        let source = "\tprint z;";
        let offset = source.find('z').unwrap();
        let rendered = error_at(source, Span::new(1, offset, 1), "bad");
        let carat_line = rendered.lines().last().unwrap();
        assert!(carat_line.starts_with("  \t"));
        assert!(carat_line.ends_with('^'));
    }
}
