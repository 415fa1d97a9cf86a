//! System-prompt composition shared by every dialect.
//!
//! Runs before translation: the configured prompt gets the user's language
//! substituted in, webpage context is appended as labelled blocks, and the
//! result is prepended to the conversation as a system message.

use super::canonical::{Message, PageInfo, Role, WebpageInfo};

/// Literal placeholder replaced with the caller's language tag.
pub const USER_LANGUAGE_PLACEHOLDER: &str = "{{userLanguage}}";

const PAGE_SEPARATOR: &str = "\n\n---\n\n";

/// Build the system prompt text for one call.
#[must_use]
pub fn compose_system_prompt(
    template: &str,
    user_language: &str,
    webpage_info: Option<&WebpageInfo>,
) -> String {
    let mut prompt = template.replace(USER_LANGUAGE_PLACEHOLDER, user_language);

    let pages = webpage_info.map_or(&[][..], |info| info.pages.as_slice());
    if pages.is_empty() {
        return prompt;
    }

    let blocks: Vec<String> = pages.iter().map(render_page).collect();
    if !prompt.trim().is_empty() {
        prompt.push_str("\n\n");
    }
    prompt.push_str(&blocks.join(PAGE_SEPARATOR));
    prompt
}

fn render_page(page: &PageInfo) -> String {
    let label = if page.is_current {
        "[Current page]"
    } else {
        "[Open page]"
    };
    format!(
        "{label}\nTitle: {}\nURL: {}\nContent:\n{}",
        page.title, page.url, page.content
    )
}

/// Prepend `system_prompt` as a system message unless it is blank or the
/// conversation already opens with one.
pub fn prepend_system_message(messages: &mut Vec<Message>, system_prompt: String) {
    if system_prompt.trim().is_empty() {
        return;
    }
    if messages.first().is_some_and(|m| m.role == Role::System) {
        return;
    }
    messages.insert(0, Message::system(system_prompt));
}
