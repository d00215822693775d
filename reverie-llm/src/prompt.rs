//! Prompt templates for every cognition task.
//!
//! The output formats requested here are parsed by fixed grammars in
//! `reverie_core::parse`; changing a template's answer format means changing
//! the matching parser.

/// Poignancy rating for a new memory. Answer: a single integer.
pub const IMPORTANCE_RATING: &str = r"On the scale of 1 to 10, where 1 is purely mundane (e.g., brushing teeth, making bed) and 10 is extremely poignant (e.g., a break up, college acceptance), rate the likely poignancy of the following piece of memory.
Memory: {memory}
Respond with a single integer between 1 and 10.
Rating:";

/// Salient questions over recent memories. Answer: one question per line.
pub const REFLECTION_QUESTIONS: &str = r"You are {name}.
Recent memories:
{memories}

Given only the information above, what are the 3 most salient high-level questions we can answer about the subjects in the statements?
Write exactly 3 questions, one per line, each ending with a question mark.";

/// Cited insights for one question. Answer: 3–5 lines citing memory indices.
pub const REFLECTION_INSIGHTS: &str = r"You are {name}.
Question: {question}

Statements:
{memories}

What 3 to 5 high-level insights can you infer from the above statements that help answer the question?
Write one insight per line and cite the statement numbers you relied on, in the format:
insight text (because of 1, 5, 3)";

/// Topic tags for a block of insights. Answer: 3–5 short tags, one per line.
pub const REFLECTION_TOPICS: &str = r"Extract 3 to 5 short topic tags (one to three words each) that describe the following insights.
Write one tag per line with no numbering or explanation.

Insights:
{insights}";

/// Current focus topics. Answer: 3–5 topics, one per line.
pub const FOCUS_TOPICS: &str = r"You are {name}.
Your most recent memories:
{memories}

What 3 to 5 topics are you currently most focused on or interested in?
Write one short topic per line.";

/// Third-person character summary.
pub const CHARACTER_SUMMARY: &str = r"Character: {name}
Background: {persona}

Most important reflections and observations:
{memories}

Write a 3 to 4 paragraph summary of {name} in the third person, covering personality traits, goals, relationships, and recent events.";

/// Synthesis of the previous day's memories.
pub const DAY_SYNTHESIS: &str = r"You are {name}. These are your memories from {date}:
{memories}

Summarize what happened on that day in a short paragraph, written in the first person.";

/// Daily schedule. Answer: 5–8 lines in the plan line grammar.
pub const DAILY_PLAN: &str = r"{summary}

Yesterday: {yesterday}

Today is {date}. Plan {name}'s day as 5 to 8 activities in chronological order.
Write each activity on its own line using exactly this format:
- <start time> - <description> (Duration: <N> hours, Priority: <1-10>, Location: <place>)
The Location part is optional. Example:
- 8:00 AM - Eat breakfast and read the news (Duration: 1 hours, Priority: 4, Location: Kitchen)";

/// Sub-behaviors for one plan. Answer: 3–7 lines in the behavior grammar.
pub const BEHAVIOR_DECOMPOSITION: &str = r"You are {name}.
You plan to: {plan}
Time window: {start} to {end} ({duration_minutes} minutes){location}

Relevant memories:
{memories}

Break this activity into 3 to 7 concrete behaviors in chronological order.
Write each behavior on its own line using exactly this format:
- <minutes from start> - <description> (Duration: <M> minutes)
Example:
- 0 - Gather the ingredients (Duration: 10 minutes)";

/// Location choice for an activity. Answer: one location name.
pub const LOCATION_SELECTION: &str = r"You are {name} and you want to: {activity}
Places you know:
{locations}

Which one of these places is best for this activity? Answer with the place name only.";

/// New object status after an interaction. Answer: a short status string.
pub const OBJECT_INTERACTION: &str = r"{name} performs the action '{action}' on {object} ({object_type}), which is currently '{status}'.
Describe the new status of {object} in a few words. Answer with the status only.";

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value in one pass over the
/// template, so braces inside substituted values are never expanded.
/// Unknown keys and unmatched braces are copied through.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after
            .find('}')
            .and_then(|close| vars.iter().find(|(key, _)| *key == &after[..close]).map(|(_, v)| (close, *v)));
        match value {
            Some((close, value)) => {
                result.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                result.push('{');
                rest = after;
            }
        }
    }
    result.push_str(rest);
    result
}
