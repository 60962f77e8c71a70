use super::client::{ChatModel, ChatRequest};
use crate::error::Result;
use crate::models::{Remixable, SitemapUrl, Story};

const HOUSE_STYLE: &str = r#"Do not use hashtags or emojis.
Write in simple, concise language, with a conversational tone.
If you use bullet points, just use simple -.
The tone should be valuable, teaching, and with a non-salesy, non-promotional tone
with a straightforward connection between the news story and the page content.
When referencing the news article, don't say 'the article', just say 'this'.
Add a learn more link at the end of the post, linking to the page on our website.
This will be shared on LinkedIn, so add the plain anchor text of the link as the link text,
for example 'Learn more: https://www.clickworker.com/...'
Do not use the words 'evolving', 'transforming', 'disrupting' or 'revolutionizing'."#;

// Case studies can be long; keep the prompt well inside the context window.
const MAX_SOURCE_CHARS: usize = 12000;

pub async fn generate_post_content(
    model: &impl ChatModel,
    story: &Story,
    page: &SitemapUrl,
) -> Result<String> {
    let system = "You are a social media manager that generates content for a news story based on a page on a website.";

    let user = format!(
        "Here is the news story: {}\n{}\n\nHere is the page on the website ({}): {}\n{}\n\n{}.\nWrite in this style: {}",
        story.title,
        story.description.as_deref().unwrap_or(""),
        page.url,
        page.title.as_deref().unwrap_or(""),
        page.meta_desc.as_deref().unwrap_or(""),
        truncate(page.content.as_deref().unwrap_or(""), MAX_SOURCE_CHARS),
        HOUSE_STYLE
    );

    let reply = model
        .complete(ChatRequest::new(system, user).temperature(0.7))
        .await?;
    Ok(reply.trim().to_string())
}

/// Rewrite a crawled case study as a post in the house style.
pub async fn remix_content(model: &impl ChatModel, remixable: &Remixable) -> Result<String> {
    let system = "You are a social media manager that turns case studies into short, useful LinkedIn posts.";

    let user = format!(
        "Here is the case study: {}\nSource: {}\n\n{}\n\nWrite a post that teaches the key lesson of this case study. Follow this style, but link to the source instead of our website: {}",
        remixable.title.as_deref().unwrap_or(""),
        remixable.url,
        truncate(remixable.markdown_content.as_deref().unwrap_or(""), MAX_SOURCE_CHARS),
        HOUSE_STYLE
    );

    let reply = model
        .complete(ChatRequest::new(system, user).temperature(0.7))
        .await?;
    Ok(reply.trim().to_string())
}

/// Prompt for the illustration that goes with a post.
pub fn poster_prompt(story: &Story, page: &SitemapUrl) -> String {
    format!(
        "A clean, modern editorial illustration for a LinkedIn post about \"{}\", connected to the theme \"{}\". No text, no logos, no watermarks.",
        story.title,
        page.title.as_deref().unwrap_or(&page.url)
    )
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
