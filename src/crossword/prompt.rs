//! Crossword prompt template rendering (spec §6.1, bit-exact for reproducibility).

use super::Clue;
use crate::normalize::OutputRule;

const JSON_TEMPLATE: &str = "You are playing Crossword Sprint. Return ONLY valid JSON matching this schema:\n\
{\"answer\": \"<single word, lowercase, no spaces or punctuation>\"}\n\n\
Rules:\n\
- Answer must be exactly {length} letters.\n\
- Use lowercase only.\n\
- Do not include spaces, hyphens, periods, quotes, or extra text.\n\
- If multiple candidates, choose the most common crossword answer.\n\
- If unsure, guess the most likely, but still output valid JSON.\n\n\
Clue: \"{clue}\"\n\
Length: {length}\n\n\
Return only: {\"answer\":\"<word>\"}";

const PLAIN_TEMPLATE: &str = "Return only the answer word, lowercase, no punctuation, no extra text.\n\n\
Clue: \"{clue}\"\n\
Length: {length}";

pub fn render(clue: &Clue, output_rule: OutputRule) -> String {
    let template = match output_rule {
        OutputRule::Json => JSON_TEMPLATE,
        OutputRule::Plain => PLAIN_TEMPLATE,
    };
    template.replace("{clue}", &clue.prompt).replace("{length}", &clue.length.to_string())
}
