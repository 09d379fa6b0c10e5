//! Prompt construction: system prompt, sheet context and history

use magic_sheets_core::Grid;

use crate::completion::{ChatMessage, CompletionRequest};
use crate::workflow::ChatTurn;

pub const SYSTEM_PROMPT: &str = "You are a spreadsheet automation assistant focused on data operations and visualization. Use the available tools to execute tasks efficiently.

TOOLS AVAILABLE:
1. set_spreadsheet_cells: Update cells with data or formulas
2. create_chart: Generate visualizations
3. execute_python_code: Analyze the sheet with pandas; printed comma-separated rows are written back starting at start_cell

RESPONSE GUIDELINES:
1. Keep explanations under 20 words, focusing on what you're doing rather than why
2. Always use tool calls for data operations, never return raw JSON

TOOL USAGE RULES:
For set_spreadsheet_cells:
- Use clear column headers in row 1
- Start data from row 2
- Never reuse cell references
- Formulas start with '=', anything else is stored as a literal

For create_chart:
- Choose chart type based on data relationship:
  * bar: comparisons across categories
  * line: trends over time/sequence
  * pie: parts of a whole
  * scatter: correlations
- Always include headers in data array
- Structure data as [headers, ...values]

Keep responses brief and focused on actions being taken.";

/// A canned prompt offered in the prompt library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredefinedPrompt {
    pub id: &'static str,
    pub title: &'static str,
    pub content: &'static str,
}

pub const PREDEFINED_PROMPTS: [PredefinedPrompt; 5] = [
    PredefinedPrompt {
        id: "data-analysis",
        title: "Data Analysis",
        content: "Analyze this data and provide insights on trends, patterns, and outliers. Create appropriate visualizations to help understand the data better.",
    },
    PredefinedPrompt {
        id: "sales-forecast",
        title: "Sales Forecast",
        content: "Based on the historical sales data in this spreadsheet, create a forecast for the next 3 months. Include a chart visualization of the forecast.",
    },
    PredefinedPrompt {
        id: "data-cleanup",
        title: "Data Cleanup",
        content: "Clean up this dataset by removing duplicates, handling missing values, and standardizing formats. Explain what issues were found and how they were resolved.",
    },
    PredefinedPrompt {
        id: "pivot-table",
        title: "Create Pivot Table",
        content: "Create a pivot table from this data that summarizes the information by [category] and shows the total [value] for each. Include appropriate calculations like sum, average, or count.",
    },
    PredefinedPrompt {
        id: "chart-creation",
        title: "Create Chart",
        content: "Create a [chart type] chart using this data to visualize the relationship between [variable 1] and [variable 2]. Make sure the chart has appropriate labels and formatting.",
    },
];

/// Look up a library prompt by id
pub fn predefined_prompt(id: &str) -> Option<&'static PredefinedPrompt> {
    PREDEFINED_PROMPTS.iter().find(|prompt| prompt.id == id)
}

/// Render displayed values as `<A1>value</A1>` tags, one line per row
///
/// Only cells holding a value are visited; blank rows produce no line.
pub fn format_sheet_context(grid: &Grid) -> String {
    let mut context = String::new();
    let mut current = None;

    for (addr, value) in grid.iter() {
        if current != Some(addr.row) {
            if current.is_some() {
                context.push('\n');
            }
            current = Some(addr.row);
        }
        let reference = addr.encode();
        context.push_str(&format!("<{0}>{1}</{0}>", reference, value));
    }
    if current.is_some() {
        context.push('\n');
    }

    context
}

/// The user message for one turn, with the sheet context when there is one
pub fn user_message(grid: &Grid, question: &str) -> String {
    let context = format_sheet_context(grid);
    if context.is_empty() {
        format!("User question: {}", question)
    } else {
        format!("Current spreadsheet data:\n{}\nUser question: {}", context, question)
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

/// The last `max_turns` finished turns as user/assistant message pairs
///
/// Each message is cut to `max_chars` characters. Turns still streaming
/// are left out.
pub fn history_messages(turns: &[ChatTurn], max_turns: usize, max_chars: usize) -> Vec<ChatMessage> {
    let finished: Vec<&ChatTurn> = turns.iter().filter(|turn| !turn.streaming).collect();
    let start = finished.len().saturating_sub(max_turns);

    finished[start..]
        .iter()
        .flat_map(|turn| {
            [
                ChatMessage::user(truncate_chars(&turn.user_text, max_chars)),
                ChatMessage::assistant(truncate_chars(&turn.assistant_text, max_chars)),
            ]
        })
        .collect()
}

/// Assemble the full request for one turn
pub fn build_request(
    grid: &Grid,
    history: &[ChatTurn],
    question: &str,
    max_turns: usize,
    max_chars: usize,
) -> CompletionRequest {
    CompletionRequest {
        system_prompt: SYSTEM_PROMPT.to_string(),
        history: history_messages(history, max_turns, max_chars),
        user_prompt: user_message(grid, question),
    }
}
