//! The parse module converts crawled HTML into the readable text handed to the extractor.

use anyhow::{Result, bail};
use dom_smoothie::{Article, CandidateSelectMode, Config, Readability, TextMode};
use html2md;
use scraper::{Html, Selector as ScraperSelector};

use crate::TextBy;

/// Extracts readable text (markdown) from the given HTML content.
///
/// # Arguments
///
/// * `html` - A string slice that holds the HTML content of the webpage.
/// * `text_by` - The method to use for text extraction (dom_smoothie or fast_html2md).
/// * `selector` - An optional CSS selector to limit the HTML subset from which content is extracted.
///
/// # Errors
///
/// This function will return an error if:
///
/// - The selector matches nothing in the page.
/// - The chosen extraction method fails to extract the article from the HTML content.
pub fn extract_text(
    html: &str,
    text_by: &TextBy,
    selector: Option<&ScraperSelector>,
) -> Result<String> {
    let selected_html;
    let html = match selector {
        Some(sel) => {
            let document = Html::parse_document(html);
            let selected_content: Vec<String> = document.select(sel).map(|el| el.html()).collect();
            if selected_content.is_empty() {
                bail!("Selector matched no elements");
            }
            selected_html = selected_content.join("\n");
            selected_html.as_str()
        }
        None => html,
    };

    match text_by {
        TextBy::DomSmoothie => {
            let config = Config {
                text_mode: TextMode::Markdown,
                candidate_select_mode: CandidateSelectMode::DomSmoothie,
                ..Default::default()
            };

            let mut readability = Readability::new(html, None, Some(config))?;
            let article: Article = readability.parse()?;

            Ok(article.text_content.to_string())
        }
        TextBy::FastHtml2Md => Ok(html2md::parse_html(html, false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;

    const PAGE: &str = r#"<html><head><title>Termine</title></head><body>
        <nav>Startseite | Kontakt</nav>
        <div id="termine"><h2>Weihnachtsmarkt</h2><p>24.12.2025 auf dem Marktplatz</p></div>
        </body></html>"#;

    #[test]
    fn html2md_keeps_page_text() {
        let text = extract_text(PAGE, &TextBy::FastHtml2Md, None).expect("extracted text");
        assert_that(&text).contains("Weihnachtsmarkt");
    }

    #[test]
    fn selector_limits_extracted_html() {
        let selector = ScraperSelector::parse("#termine").expect("valid selector");
        let text =
            extract_text(PAGE, &TextBy::FastHtml2Md, Some(&selector)).expect("extracted text");

        assert_that(&text).contains("Marktplatz");
        assert_that(&text.contains("Startseite")).is_false();
    }

    #[test]
    fn selector_without_match_fails() {
        let selector = ScraperSelector::parse("#missing").expect("valid selector");
        assert_that(&extract_text(PAGE, &TextBy::FastHtml2Md, Some(&selector)).is_err()).is_true();
    }
}
