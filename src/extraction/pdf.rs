use super::ExtractionError;
use lopdf::Document;

/// Page text in page order, each page terminated by a newline.
///
/// Pages whose text is empty contribute nothing, not even a blank line.
pub(super) fn extract(bytes: &[u8]) -> Result<String, ExtractionError> {
    let document = Document::load_mem(bytes).map_err(|err| ExtractionError::Pdf(err.to_string()))?;

    let mut text = String::new();
    for page_number in document.get_pages().into_keys() {
        match document.extract_text(&[page_number]) {
            Ok(page_text) => {
                let page_text = page_text.trim_end_matches(['\r', '\n']);
                if page_text.is_empty() {
                    continue;
                }
                text.push_str(page_text);
                text.push('\n');
            }
            Err(err) => {
                tracing::debug!(page = page_number, error = %err, "No text extracted from page");
            }
        }
    }

    Ok(text)
}
