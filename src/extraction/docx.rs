use super::ExtractionError;
use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild};

/// Top-level paragraphs in document order, one line each.
pub(super) fn extract(bytes: &[u8]) -> Result<String, ExtractionError> {
    let docx = docx_rs::read_docx(bytes).map_err(|err| ExtractionError::Docx(err.to_string()))?;

    let lines: Vec<String> = docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
            _ => None,
        })
        .collect();

    Ok(lines.join("\n"))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    push_children(&paragraph.children, &mut text);
    text
}

/// Runs in order; hyperlink runs count as paragraph text.
fn push_children(children: &[ParagraphChild], text: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for run_child in &run.children {
                    match run_child {
                        RunChild::Text(t) => text.push_str(&t.text),
                        RunChild::Tab(_) => text.push('\t'),
                        RunChild::Break(_) => text.push('\n'),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => push_children(&link.children, text),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Hyperlink, HyperlinkType, Run};
    use std::io::Cursor;

    fn build(docx: Docx) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        docx.build().pack(&mut buffer).expect("pack docx");
        buffer.into_inner()
    }

    #[test]
    fn joins_paragraphs_and_keeps_empty_lines() {
        let bytes = build(
            Docx::new()
                .add_paragraph(Paragraph::new().add_run(Run::new().add_text("First line")))
                .add_paragraph(Paragraph::new())
                .add_paragraph(
                    Paragraph::new()
                        .add_run(Run::new().add_text("Bold"))
                        .add_run(Run::new().add_text("Tail")),
                ),
        );

        assert_eq!(extract(&bytes).unwrap(), "First line\n\nBoldTail");
    }

    #[test]
    fn includes_hyperlink_text() {
        let bytes = build(
            Docx::new().add_paragraph(
                Paragraph::new()
                    .add_run(Run::new().add_text("See "))
                    .add_hyperlink(
                        Hyperlink::new("https://example.com/report", HyperlinkType::External)
                            .add_run(Run::new().add_text("the report")),
                    )
                    .add_run(Run::new().add_text(" for details")),
            ),
        );

        assert_eq!(extract(&bytes).unwrap(), "See the report for details");
    }

    #[test]
    fn rejects_non_zip_input() {
        let error = extract(b"plain text, not a package").unwrap_err();
        assert!(matches!(error, ExtractionError::Docx(_)));
    }
}
