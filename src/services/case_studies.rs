use scraper::{Html, Selector};

/// A third-party case study page, ready to become a Remixable.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseStudy {
    pub title: String,
    pub markdown_content: String,
    pub image_urls: Vec<String>,
}

/// The outbound link on a case-study index page (`<a class="llm-link">`).
/// Falls back to the link text when there is no href.
pub fn extract_example_link(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a.llm-link").ok()?;
    let link = document.select(&selector).next()?;

    link.value()
        .attr("href")
        .map(|href| href.trim().to_string())
        .filter(|href| !href.is_empty())
        .or_else(|| {
            let text = link.text().collect::<String>().trim().to_string();
            (!text.is_empty()).then_some(text)
        })
}

pub fn is_video_link(url: &str) -> bool {
    url.contains("youtube") || url.contains("youtu.be")
}

/// Title (from `og:title`), markdown text and absolute image URLs of an
/// example page. Pages without `og:title` are not usable.
pub fn extract_case_study(html: &str) -> Option<CaseStudy> {
    let document = Html::parse_document(html);

    let og_title = Selector::parse(r#"meta[property="og:title"]"#).ok()?;
    let title = document
        .select(&og_title)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())?;

    let img = Selector::parse("img").ok()?;
    let mut image_urls: Vec<String> = Vec::new();
    for src in document.select(&img).filter_map(|el| el.value().attr("src")) {
        if (src.starts_with("http://") || src.starts_with("https://"))
            && !image_urls.iter().any(|u| u == src)
        {
            image_urls.push(src.to_string());
        }
    }

    let markdown_content = match html2text::from_read(html.as_bytes(), 100) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            tracing::debug!("Failed to convert case study to markdown: {}", e);
            String::new()
        }
    };

    Some(CaseStudy {
        title,
        markdown_content,
        image_urls,
    })
}
