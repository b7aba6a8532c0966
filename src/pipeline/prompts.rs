//! Prompt library: pure functions from (tier, inputs) to prompt text.
//!
//! Nothing here touches runtime state. Any edit to prompt text or to an
//! output schema must bump `PROMPT_VERSION`; the tag participates in every
//! input hash, so stale caches invalidate themselves.

use chrono::NaiveDate;

use crate::models::{Extraction, MonthlySummary, QuarterlyNotepad, WeeklySummary};

/// Bumped on every prompt or schema change.
pub const PROMPT_VERSION: &str = "v3";

/// Stable author context shared by every tier. Kept short: it frames scores
/// and names, it does not summarize the corpus.
const AUTHOR_CONTEXT: &str = "\
Context about the author of this journal:
- The journal spans 2024-01-01 through 2025-12-31, written near-daily.
- The author went through a major identity milestone in this period: coming
  out as a trans woman in early 2024 and starting hormone therapy
  (estradiol + spironolactone) on 2024-03-15.
- Guanfacine appears from 2025-02 onward; sertraline throughout 2024.
- Recurring people are referred to by first name only.
- Scores are conservative: 5 is an ordinary day, 8+ and 3- are rare.";

fn escape_xml_tags(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ───────────────────────────────────────────────
// Extraction
// ───────────────────────────────────────────────

pub fn extraction_system_prompt() -> &'static str {
    r#"You are a journal analyst. Your ONLY role is to convert one raw journal
entry into a structured JSON record.

RULES:
1. Extract ONLY what is written in the entry. Never infer events that are not
   described, never invent people, medications, or feelings.
2. Scores are integers 1-10. Be conservative; 5 is an ordinary day.
3. If sleep is not mentioned, set "mentioned" false and "quality" null.
4. Nullable fields are null when the entry is silent, never empty strings.
5. "dominant_themes" holds at most 5 items; "key_quotes" at most 3, verbatim.
6. Sentiment is a number from -1.0 (hostile) to 1.0 (warm).
7. Output a single JSON object and nothing else."#
}

pub fn extraction_prompt(date: NaiveDate, content: &str) -> String {
    let escaped = escape_xml_tags(content);
    format!(
        r#"{AUTHOR_CONTEXT}

<entry date="{date}">
{escaped}
</entry>

Extract the entry above into this exact JSON shape. Use null for anything the
entry does not say. "date" must be "{date}".

{{
  "date": "YYYY-MM-DD",
  "mood_score": 1-10,
  "energy_level": 1-10,
  "sleep": {{ "mentioned": true/false, "quality": 1-10 or null }},
  "medication_mentions": ["..."],
  "hormone_mentions": ["..."],
  "people": [
    {{ "name": "...", "relationship": "partner | friend | family | coworker | other",
       "sentiment": -1.0 to 1.0, "interaction": "in_person | call | text | mentioned_only" }}
  ],
  "activities": ["..."],
  "events": ["..."],
  "dominant_themes": ["... at most 5 ..."],
  "identity_markers": ["..."],
  "key_quotes": ["... at most 3, verbatim ..."],
  "summary": "2-3 sentences."
}}"#,
        date = date.format("%Y-%m-%d"),
    )
}

// ───────────────────────────────────────────────
// Weekly
// ───────────────────────────────────────────────

pub fn weekly_system_prompt() -> &'static str {
    r#"You are a journal analyst producing a weekly roll-up from per-day
structured extractions.

RULES:
1. Work ONLY from the extractions given. Days may be missing; summarize what
   is present and never pad gaps with speculation.
2. Averages are computed over the days present.
3. "trend" is exactly one of: improving, declining, stable, volatile.
4. "people_seen" aggregates per person: entry count and mean sentiment.
5. Output a single JSON object and nothing else."#
}

pub fn weekly_prompt(week_start: NaiveDate, extractions: &[Extraction]) -> String {
    let inputs = serde_json::to_string_pretty(extractions).unwrap_or_else(|_| "[]".into());
    format!(
        r#"{AUTHOR_CONTEXT}

Daily extractions for the week starting {week_start} (Monday), in date order:

```json
{inputs}
```

Produce the weekly summary as this exact JSON shape. "week_start" must be
"{week_start}".

{{
  "week_start": "YYYY-MM-DD",
  "avg_mood": number,
  "avg_energy": number,
  "trend": "improving | declining | stable | volatile",
  "people_seen": [ {{ "name": "...", "count": n, "avg_sentiment": -1.0 to 1.0 }} ],
  "dominant_themes": ["..."],
  "notable_events": ["..."],
  "cycle_patterns": "one observation about recurring patterns, or null",
  "narrative": "One paragraph."
}}"#,
        week_start = week_start.format("%Y-%m-%d"),
    )
}

// ───────────────────────────────────────────────
// Monthly
// ───────────────────────────────────────────────

pub fn monthly_system_prompt() -> &'static str {
    r#"You are a journal analyst producing a monthly summary from weekly
roll-ups.

RULES:
1. Work ONLY from the weekly summaries given; weeks may be missing.
2. "happiness_index" is 1-10, conservative.
3. "relationship_health" scores each relationship category 1-10; include only
   categories the weeks actually mention.
4. "medication_notes" and "sleep_summary" are null when the weeks are silent.
5. Output a single JSON object and nothing else."#
}

pub fn monthly_prompt(month: &str, weeklies: &[WeeklySummary]) -> String {
    let inputs = serde_json::to_string_pretty(weeklies).unwrap_or_else(|_| "[]".into());
    format!(
        r#"{AUTHOR_CONTEXT}

Weekly summaries for {month}, in week order:

```json
{inputs}
```

Produce the monthly summary as this exact JSON shape. "month" must be
"{month}".

{{
  "month": "YYYY-MM",
  "happiness_index": 1-10,
  "trajectory": "improving | declining | stable | volatile",
  "relationship_health": {{ "category": 1-10 }},
  "top_themes": ["..."],
  "milestones": ["..."],
  "challenges": ["..."],
  "wins": ["..."],
  "medication_notes": "... or null",
  "sleep_summary": "... or null",
  "narrative": "2-3 paragraphs."
}}"#
    )
}

// ───────────────────────────────────────────────
// Quarterly
// ───────────────────────────────────────────────

pub fn quarterly_system_prompt() -> &'static str {
    r#"You are a journal analyst writing a quarterly chapter from monthly
summaries.

RULES:
1. Work ONLY from the monthly summaries given.
2. Trajectory arrays carry one number per month given, in calendar order.
3. "chapter_title" names the quarter the way a memoir chapter would.
4. "key_people" lists the most-mentioned people with how their presence moved
   across the quarter.
5. Output a single JSON object and nothing else."#
}

pub fn quarterly_prompt(quarter: &str, monthlies: &[MonthlySummary]) -> String {
    let inputs = serde_json::to_string_pretty(monthlies).unwrap_or_else(|_| "[]".into());
    format!(
        r#"{AUTHOR_CONTEXT}

Monthly summaries for {quarter}, in month order:

```json
{inputs}
```

Produce the quarterly notepad as this exact JSON shape. "quarter" must be
"{quarter}"; trajectory arrays carry exactly one value per month above.

{{
  "quarter": "YYYY-QN",
  "chapter_title": "...",
  "mood_trajectory": [number per month],
  "energy_trajectory": [number per month],
  "opening_state": "Where the author stood entering the quarter.",
  "closing_state": "Where the author stood leaving it.",
  "key_people": [ {{ "name": "...", "mentions": n, "trajectory": "..." }} ],
  "dominant_themes": ["..."],
  "narrative": "4-6 paragraphs."
}}"#
    )
}

// ───────────────────────────────────────────────
// Synthesis
// ───────────────────────────────────────────────

pub fn synthesis_system_prompt() -> &'static str {
    r#"You are a journal analyst writing the final synthesis of a two-year
record from quarterly chapters.

RULES:
1. Work ONLY from the quarterly notepads given. Quarters may be missing; a
   metric you cannot compute is null, never invented and never placeholder
   prose.
2. "quarter_metrics" carries one element per notepad given, in order.
3. Medication correlation blocks cover only periods the notepads actually
   describe; unknown periods stay null.
4. The narrative is the centerpiece: specific, chronological, unsentimental.
5. Output a single JSON object and nothing else."#
}

pub fn synthesis_prompt(notepads: &[QuarterlyNotepad]) -> String {
    let inputs = serde_json::to_string_pretty(notepads).unwrap_or_else(|_| "[]".into());
    format!(
        r#"{AUTHOR_CONTEXT}

All quarterly notepads, in calendar order:

```json
{inputs}
```

Produce the two-year synthesis as this exact JSON shape.

{{
  "thesis": "One sentence.",
  "identity_before": "Who the author was before the milestone.",
  "identity_after": "Who the author became after it.",
  "quarter_metrics": [
    {{ "quarter": "YYYY-QN", "avg_mood": number or null,
       "avg_energy": number or null, "happiness_index": number or null }}
  ],
  "weekly_patterns": "... or null",
  "seasonal_patterns": "... or null",
  "medication_correlations": [
    {{ "medication": "...", "period": "... or null",
       "observed_effects": "... or null", "mood_shift": number or null }}
  ],
  "relationship_arcs": [ {{ "name": "...", "relationship": "...", "arc": "..." }} ],
  "milestones": [ {{ "date": "YYYY-MM-DD or YYYY-MM", "title": "...", "significance": "..." }} ],
  "strengths": ["..."],
  "challenges": ["..."],
  "growth_areas": ["..."],
  "executive_summary": "One tight paragraph.",
  "narrative": "The full story, several paragraphs."
}}"#
    )
}
