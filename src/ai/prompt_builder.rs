//! Builds the extraction prompt sent to the language model.

use chrono::NaiveDate;
use openai_api_rs::v1::chat_completion::{ChatCompletionMessage, Content, MessageRole};

use crate::core::models::DirectoryContext;
use crate::utils::text::sanitize_user_text;

/// Longest message we embed in a prompt.
pub const MAX_MESSAGE_CHARS: usize = 4_000;

/// Cap on how many directory entries are enumerated in the prompt.
pub const MAX_CONTEXT_ENTRIES: usize = 200;

const INSTRUCTIONS: &str = "You are TaskBot, an assistant that turns chat messages into to-do items. \
─────────────── RULES ─────────────── \
1. Decide whether the message describes ONE task or SEVERAL tasks. \
2. For ONE task reply with exactly this JSON object: \
   {\"title\": string, \"description\": string, \"project_name\": string|null, \"assignee_names\": [string], \"due_date\": string|null} \
3. For SEVERAL tasks reply with exactly: {\"tasks\": [ <one object per task, same shape as rule 2> ]} \
4. A line of the form \"Name - task one. task two.\" assigns EVERY task on that line to Name, until the next line that starts with another \"Name -\". \
5. title: short imperative summary (max 80 characters). description: the full details of that task in the user's words. Both are required and must not be empty. \
6. project_name and assignee_names: use the exact spelling from the KNOWN PROJECTS / KNOWN PEOPLE lists when one matches; otherwise copy what the user wrote; use null / [] when nothing is mentioned. \
7. due_date: copy the user's wording (\"tomorrow\", \"in 3 days\", \"friday\") or a YYYY-MM-DD date; null when no due date is mentioned. \
8. Output ONLY the JSON. No markdown, no code fences, no commentary.";

fn message(role: MessageRole, text: String) -> ChatCompletionMessage {
    ChatCompletionMessage {
        role,
        content: Content::Text(text),
        name: None,
        tool_calls: None,
        tool_call_id: None,
    }
}

/// Enumerates directory context as plain lists the model can match against.
#[must_use]
pub fn render_context(context: &DirectoryContext) -> String {
    let mut out = String::from("KNOWN PROJECTS:\n");
    if context.projects.is_empty() {
        out.push_str("(none)\n");
    }
    for project in context.projects.iter().take(MAX_CONTEXT_ENTRIES) {
        out.push_str("- ");
        out.push_str(&sanitize_user_text(&project.name, 120));
        out.push('\n');
    }

    out.push_str("\nKNOWN PEOPLE:\n");
    if context.people.is_empty() {
        out.push_str("(none)\n");
    }
    for person in context.people.iter().take(MAX_CONTEXT_ENTRIES) {
        out.push_str("- ");
        out.push_str(&sanitize_user_text(&person.name, 120));
        if !person.email.is_empty() {
            out.push_str(" <");
            out.push_str(&sanitize_user_text(&person.email, 120));
            out.push('>');
        }
        out.push('\n');
    }
    out
}

/// Builds the complete prompt as chat messages ready for the completion call.
#[must_use]
pub fn build_extraction_prompt(
    user_message: &str,
    context: &DirectoryContext,
    today: NaiveDate,
) -> Vec<ChatCompletionMessage> {
    let system = format!(
        "{INSTRUCTIONS}\n\nToday is {} ({}).\n\n{}",
        today.format("%Y-%m-%d"),
        today.format("%A"),
        render_context(context)
    );
    let user = format!(
        "MESSAGE:\n{}",
        sanitize_user_text(user_message, MAX_MESSAGE_CHARS)
    );

    vec![
        message(MessageRole::system, system),
        message(MessageRole::user, user),
    ]
}
