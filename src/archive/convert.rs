use crate::error::{AppError, Result};

const TEXT_WIDTH: usize = 100;

/// Turns a fetched HTML page into the readable text stored as an article's archive.
pub trait Converter: Send + Sync {
    fn convert(&self, html: &str, page_url: &str) -> Result<String>;
}

/// Readability extraction of the main content, rendered as Markdown-style text.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadableText;

impl Converter for ReadableText {
    fn convert(&self, html: &str, page_url: &str) -> Result<String> {
        let url = url::Url::parse(page_url)
            .map_err(|e| AppError::Conversion(format!("invalid page url {}: {}", page_url, e)))?;

        let main_content = readability::extractor::extract(&mut html.as_bytes(), &url)
            .map(|product| product.content)
            .unwrap_or_else(|err| {
                tracing::debug!(url = %page_url, error = ?err, "readability extraction failed");
                String::new()
            });

        let text = render(&main_content)?;
        if !text.trim().is_empty() {
            return Ok(text);
        }

        // Extraction found nothing worth keeping; keep the whole page instead
        let text = render(html)?;
        if text.trim().is_empty() {
            return Err(AppError::Conversion(format!("no readable text in {}", page_url)));
        }
        Ok(text)
    }
}

fn render(html: &str) -> Result<String> {
    html2text::from_read(html.as_bytes(), TEXT_WIDTH)
        .map_err(|e| AppError::Conversion(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_article_markup_to_text() {
        let html = r#"<html><head><title>Post</title></head><body>
            <article>
              <h1>Rust ownership</h1>
              <p>Ownership is a set of rules that govern how a Rust program manages memory.
                 All programs have to manage the way they use a computer's memory while running.</p>
              <p>Some languages have garbage collection that regularly looks for no-longer-used
                 memory as the program runs; in other languages, the programmer must explicitly
                 allocate and free the memory.</p>
            </article></body></html>"#;

        let text = ReadableText.convert(html, "https://example.com/post").unwrap();
        assert!(text.contains("Ownership"));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn empty_page_is_a_conversion_error() {
        let result = ReadableText.convert("<html><body></body></html>", "https://example.com/");
        assert!(matches!(result, Err(AppError::Conversion(_))));
    }

    #[test]
    fn relative_url_is_rejected() {
        let result = ReadableText.convert("<p>hi</p>", "/relative");
        assert!(matches!(result, Err(AppError::Conversion(_))));
    }
}
