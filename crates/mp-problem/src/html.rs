use mp_parser::escape_attr;

use crate::instance::{InstanceKind, ProblemInstance};

/// Inserts `text` immediately before the first occurrence of `marker`.
pub(crate) fn splice_before(html: &str, marker: &str, text: &str) -> Option<String> {
    let index = html.find(marker)?;
    let mut out = String::with_capacity(html.len() + text.len());
    out.push_str(&html[..index]);
    out.push_str(text);
    out.push_str(&html[index..]);
    Some(out)
}

/// Renders the answer form for an instance.
///
/// The field ids follow the conventions that answer extraction and insertion rely on:
/// `ANSWER` for numeric entry, `CHOICE` radios and `CHOICE_<id>` checkboxes for choice
/// problems, and `INP_` inputs inside the question for embedded-input problems.
pub fn render_problem_html(instance: &ProblemInstance) -> String {
    let mut html = String::new();
    html.push_str(&format!(
        "<div class='problem' data-ref='{}' data-iteration='{}'>\n",
        escape_attr(instance.ref_base()),
        escape_attr(instance.iteration_id())
    ));
    html.push_str(&format!(
        "<div class='question'>{}</div>\n",
        instance.question()
    ));

    match instance.kind() {
        InstanceKind::Numeric { .. } => {
            html.push_str(
                "<div class='answer'><input type='text' size='12' name='ANSWER' id='ANSWER'></div>\n",
            );
        }
        InstanceKind::MultipleChoice { choices } => {
            for choice in choices {
                let id = choice.choice_id();
                html.push_str(&format!(
                    "<div class='choice'><input type='radio' name='CHOICE' value='{}' id='CHOICE_{}'> <label for='CHOICE_{}'>{}</label></div>\n",
                    id,
                    id,
                    id,
                    choice.content()
                ));
            }
        }
        InstanceKind::MultipleSelection { choices } => {
            for choice in choices {
                let id = choice.choice_id();
                html.push_str(&format!(
                    "<div class='choice'><input type='checkbox' name='CHOICE_{}' id='CHOICE_{}'> <label for='CHOICE_{}'>{}</label></div>\n",
                    id,
                    id,
                    id,
                    choice.content()
                ));
            }
        }
        InstanceKind::EmbeddedInput { .. } | InstanceKind::AutoCorrect | InstanceKind::Dummy => {}
    }

    html.push_str("</div>\n");
    html
}
